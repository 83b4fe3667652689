use serde_json::Value;

/// Expected-failure signal raised by marking a [`Context`](crate::Context) failed.
///
/// Returned by [`Context::fail`](crate::Context::fail) and
/// [`Context::fail_with`](crate::Context::fail_with). Steps return it as an
/// error to interrupt their hook chain at the point of failure. It carries a
/// snapshot of the failure payload as it was when the signal was raised.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("context marked as failed")]
pub struct Failure {
    payload: Option<Value>,
}

impl Failure {
    pub(crate) fn new(payload: Option<Value>) -> Self {
        Self { payload }
    }

    /// Payload passed to [`Context::fail_with`](crate::Context::fail_with), if any.
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    #[must_use]
    pub fn into_payload(self) -> Option<Value> {
        self.payload
    }
}
