use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ContextError;
use crate::failure::Failure;

/// Mutable state shared by every step of one invocation tree.
///
/// Fields are caller-defined and added on demand; they keep insertion order.
/// The failed marker is one-way: once [`fail`](Self::fail) or
/// [`fail_with`](Self::fail_with) has been called the context stays failed.
///
/// The type is not `Clone`. A single instance is created by the outermost
/// caller and lent as `&mut Context` to every nested step.
#[derive(Debug, Default)]
pub struct Context {
    fields: IndexMap<String, Value>,
    failed: bool,
    failure_payload: Option<Value>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context pre-populated with the given fields.
    #[must_use]
    pub fn with_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    /// Decode a field into a concrete type.
    ///
    /// Returns `Ok(None)` when the field is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Decode`] if the stored value does not match `T`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ContextError> {
        self.fields
            .get(name)
            .map(|value| {
                T::deserialize(value).map_err(|source| ContextError::Decode {
                    name: name.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Set a field, returning the previous value if there was one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Serialize `value` and store it under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Encode`] if `value` cannot be represented as JSON.
    pub fn set_serialized<T: Serialize + ?Sized>(
        &mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<(), ContextError> {
        let name = name.into();
        let encoded = serde_json::to_value(value).map_err(|source| ContextError::Encode {
            name: name.clone(),
            source,
        })?;
        self.fields.insert(name, encoded);
        Ok(())
    }

    /// Append `value` to the array stored under `name`.
    ///
    /// A missing field starts as an empty array. A field holding a non-array
    /// value is turned into an array whose first element is that value.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let slot = self
            .fields
            .entry(name.into())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            let previous = slot.take();
            *slot = Value::Array(vec![previous]);
        }
        if let Value::Array(items) = slot {
            items.push(value.into());
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate over fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Mark the context failed and return the signal that interrupts the
    /// current step.
    ///
    /// ```
    /// use stepwise_context::{Context, Failure};
    ///
    /// fn reserve(ctx: &mut Context) -> Result<(), Failure> {
    ///     if !ctx.contains("sku") {
    ///         return Err(ctx.fail());
    ///     }
    ///     Ok(())
    /// }
    ///
    /// let mut ctx = Context::new();
    /// assert!(reserve(&mut ctx).is_err());
    /// assert!(ctx.is_failed());
    /// ```
    #[must_use = "return the failure as an error to interrupt the step"]
    pub fn fail(&mut self) -> Failure {
        self.failed = true;
        Failure::new(self.failure_payload.clone())
    }

    /// Mark the context failed with a payload.
    ///
    /// When the payload is a JSON object its entries are also merged into the
    /// context fields, so callers can inspect them after a tolerant call. A
    /// later payload replaces an earlier one.
    #[must_use = "return the failure as an error to interrupt the step"]
    pub fn fail_with(&mut self, payload: impl Into<Value>) -> Failure {
        let payload = payload.into();
        if let Value::Object(entries) = &payload {
            for (name, value) in entries {
                self.fields.insert(name.clone(), value.clone());
            }
        }
        self.failure_payload = Some(payload);
        self.fail()
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.failed
    }

    /// The failure signal for this context, if it has been marked failed.
    #[must_use]
    pub fn failure(&self) -> Option<Failure> {
        self.failed.then(|| Failure::new(self.failure_payload.clone()))
    }

    #[must_use]
    pub fn failure_payload(&self) -> Option<&Value> {
        self.failure_payload.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Reservation {
        sku: String,
        quantity: u32,
    }

    #[test]
    fn new_context_is_empty_and_successful() {
        let ctx = Context::new();

        assert!(ctx.is_empty());
        assert!(ctx.is_success());
        assert!(!ctx.is_failed());
        assert!(ctx.failure().is_none());
    }

    #[test]
    fn with_fields_preserves_insertion_order() {
        let ctx = Context::with_fields([("b", json!(2)), ("a", json!(1)), ("c", json!(3))]);

        let names: Vec<&str> = ctx.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn set_returns_previous_value() {
        let mut ctx = Context::new();

        assert!(ctx.set("amount", 10).is_none());
        assert_eq!(ctx.set("amount", 20), Some(json!(10)));
        assert_eq!(ctx.get("amount"), Some(&json!(20)));
    }

    #[test]
    fn get_as_decodes_typed_values() -> anyhow::Result<()> {
        let mut ctx = Context::new();
        let reservation = Reservation {
            sku: "sku-1".to_string(),
            quantity: 3,
        };
        ctx.set_serialized("reservation", &reservation)?;

        let decoded: Option<Reservation> = ctx.get_as("reservation")?;

        assert_eq!(decoded, Some(reservation));
        Ok(())
    }

    #[test]
    fn get_as_returns_none_for_missing_field() -> anyhow::Result<()> {
        let ctx = Context::new();

        let decoded: Option<u32> = ctx.get_as("missing")?;

        assert!(decoded.is_none());
        Ok(())
    }

    #[test]
    fn get_as_reports_field_name_on_type_mismatch() {
        let mut ctx = Context::new();
        ctx.set("quantity", "three");

        let err = ctx
            .get_as::<u32>("quantity")
            .expect_err("string should not decode as u32");

        assert!(matches!(err, ContextError::Decode { ref name, .. } if name == "quantity"));
    }

    #[test]
    fn push_creates_and_extends_array() {
        let mut ctx = Context::new();
        ctx.push("steps", "charge");
        ctx.push("steps", "reserve");

        assert_eq!(ctx.get("steps"), Some(&json!(["charge", "reserve"])));
    }

    #[test]
    fn push_wraps_existing_scalar() {
        let mut ctx = Context::new();
        ctx.set("steps", "charge");
        ctx.push("steps", "reserve");

        assert_eq!(ctx.get("steps"), Some(&json!(["charge", "reserve"])));
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut ctx = Context::with_fields([("a", 1), ("b", 2), ("c", 3)]);

        assert_eq!(ctx.remove("a"), Some(json!(1)));

        let names: Vec<&str> = ctx.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn fail_marks_context_failed() {
        let mut ctx = Context::new();

        let failure = ctx.fail();

        assert!(ctx.is_failed());
        assert!(!ctx.is_success());
        assert!(failure.payload().is_none());
        assert_eq!(ctx.failure(), Some(failure));
    }

    #[test]
    fn fail_with_object_merges_fields_and_keeps_payload() {
        let mut ctx = Context::new();

        let failure = ctx.fail_with(json!({"error": "card declined"}));

        assert_eq!(ctx.get("error"), Some(&json!("card declined")));
        assert_eq!(failure.payload(), Some(&json!({"error": "card declined"})));
        assert_eq!(ctx.failure_payload(), Some(&json!({"error": "card declined"})));
    }

    #[test]
    fn fail_with_scalar_does_not_touch_fields() {
        let mut ctx = Context::new();

        let _ = ctx.fail_with("out of stock");

        assert!(ctx.is_empty());
        assert_eq!(ctx.failure_payload(), Some(&json!("out of stock")));
    }

    #[test]
    fn failed_marker_survives_further_writes() {
        let mut ctx = Context::new();
        let _ = ctx.fail();

        ctx.set("retried", true);
        let again = ctx.fail();

        assert!(ctx.is_failed());
        assert!(again.payload().is_none());
    }
}
