use stepwise_context::Failure;
use thiserror::Error;

/// A compensating action that failed during a best-effort rollback pass.
#[derive(Debug, Error)]
#[error("compensation failed for step '{step}': {description}")]
pub struct CompensationError<E> {
    /// Name of the step whose compensation failed.
    pub step: String,
    /// Description of what the compensation was trying to do.
    pub description: String,
    /// The error returned by the compensating action.
    #[source]
    pub error: StepError<E>,
}

/// Signal that interrupts a step's hook chain.
///
/// `Failed` is the expected tier: it comes from marking the context failed
/// and is swallowed by [`StepExt::call`](crate::StepExt::call). Every other
/// variant is unexpected and always reaches the caller unchanged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StepError<E> {
    /// The context was marked failed.
    #[error(transparent)]
    Failed(#[from] Failure),

    /// A step, hook or compensating action returned its own error.
    #[error(transparent)]
    Raised(E),

    /// A conditional organizer has no predicate for a declared step.
    #[error("no condition '{condition}' registered for step '{step}'")]
    MissingCondition {
        /// Name of the declared step.
        step: String,
        /// Condition name derived from the step name.
        condition: String,
    },

    /// Compensations failed during a best-effort rollback pass.
    #[error("{} compensation(s) failed while rolling back '{step}'", compensation_errors.len())]
    CompensationFailed {
        /// Step or organizer whose rollback pass this was.
        step: String,
        /// The signal that triggered the rollback, if the pass was triggered
        /// by one rather than by an enclosing organizer's compensation.
        original: Option<Box<StepError<E>>>,
        /// Errors from failed compensations, in the order they occurred.
        compensation_errors: Vec<CompensationError<E>>,
    },
}

impl<E> StepError<E> {
    /// Whether this is an expected failure raised through the context marker.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    #[must_use]
    pub fn is_unexpected(&self) -> bool {
        !self.is_failure()
    }

    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    #[must_use]
    pub fn raised(&self) -> Option<&E> {
        match self {
            Self::Raised(error) => Some(error),
            _ => None,
        }
    }
}
