/// Sub-steps whose core operation completed during one organizer invocation.
///
/// Entries hold the declaration index of the sub-step together with the
/// sub-step's own record, so compensating an organizer can cascade into the
/// organizers nested inside it. Leaf steps produce an empty record.
#[derive(Debug, Default)]
pub struct ExecutionRecord {
    completed: Vec<(usize, ExecutionRecord)>,
}

impl ExecutionRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the sub-step declared at `index` completed.
    pub(crate) fn push(&mut self, index: usize, record: ExecutionRecord) {
        self.completed.push((index, record));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.completed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    /// Declaration indices in completion order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.completed.iter().map(|(index, _)| *index)
    }

    /// Entries in rollback order: last completed first.
    pub(crate) fn into_rollback_order(self) -> impl Iterator<Item = (usize, ExecutionRecord)> {
        self.completed.into_iter().rev()
    }
}
