const CONDITION_SUFFIX: &str = "_condition";

/// Convert a CamelCase type name into lower snake case.
///
/// `::` path separators become `/` and dashes become underscores. Runs of
/// capitals are kept together until the last capital that starts a new word,
/// so `HTTPRequest` becomes `http_request`.
///
/// ```
/// use stepwise_saga::underscore;
///
/// assert_eq!(underscore("ChargeCard"), "charge_card");
/// assert_eq!(underscore("Billing::ChargeCard"), "billing/charge_card");
/// ```
#[must_use]
pub fn underscore(name: &str) -> String {
    let chars: Vec<char> = name.replace("::", "/").chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (index, &ch) in chars.iter().enumerate() {
        if ch.is_ascii_uppercase() && index > 0 {
            let prev = chars[index - 1];
            let next_is_lower = chars
                .get(index + 1)
                .is_some_and(char::is_ascii_lowercase);
            let starts_word = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if starts_word {
                out.push('_');
            }
        }
        match ch {
            '-' => out.push('_'),
            _ => out.push(ch.to_ascii_lowercase()),
        }
    }

    out
}

/// Name of the predicate a [`ConditionOrganizer`](crate::ConditionOrganizer)
/// consults before running a step called `step_name`.
///
/// ```
/// use stepwise_saga::condition_name;
///
/// assert_eq!(condition_name("InteractorOne"), "interactor_one_condition");
/// ```
#[must_use]
pub fn condition_name(step_name: &str) -> String {
    let mut name = underscore(step_name);
    name.push_str(CONDITION_SUFFIX);
    name
}

/// Last path segment of a type name, without generic arguments.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
