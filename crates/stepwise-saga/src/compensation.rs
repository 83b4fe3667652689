use tracing::{debug, warn};

use crate::config::RollbackPolicy;
use crate::error::{CompensationError, StepError};

/// Bookkeeping for one rollback pass over completed steps.
pub(crate) struct RollbackPass<E> {
    owner: String,
    policy: RollbackPolicy,
    errors: Vec<CompensationError<E>>,
}

impl<E> RollbackPass<E> {
    pub(crate) fn new(owner: &str, policy: RollbackPolicy) -> Self {
        Self {
            owner: owner.to_string(),
            policy,
            errors: Vec::new(),
        }
    }

    /// Account for the outcome of one compensating action.
    ///
    /// Under [`RollbackPolicy::Abort`] a failed compensation is returned as
    /// `Err` and supersedes the signal that started the pass. Under
    /// [`RollbackPolicy::BestEffort`] it is collected and the pass continues.
    pub(crate) fn record(
        &mut self,
        step: &str,
        description: String,
        result: Result<(), StepError<E>>,
    ) -> Result<(), StepError<E>> {
        let error = match result {
            Ok(()) => {
                debug!(owner = %self.owner, step, "compensated step");
                return Ok(());
            }
            Err(error) => error,
        };

        warn!(
            owner = %self.owner,
            step,
            compensation = %description,
            "compensation failed"
        );

        match (self.policy, error) {
            (RollbackPolicy::Abort, error) => Err(error),
            (
                RollbackPolicy::BestEffort,
                StepError::CompensationFailed {
                    original: None,
                    compensation_errors,
                    ..
                },
            ) => {
                self.errors.extend(compensation_errors);
                Ok(())
            }
            (RollbackPolicy::BestEffort, error) => {
                self.errors.push(CompensationError {
                    step: step.to_string(),
                    description,
                    error,
                });
                Ok(())
            }
        }
    }

    /// Close a pass started by `original`, returning the signal the caller
    /// should see.
    pub(crate) fn finish(self, original: StepError<E>) -> StepError<E> {
        if self.errors.is_empty() {
            original
        } else {
            StepError::CompensationFailed {
                step: self.owner,
                original: Some(Box::new(original)),
                compensation_errors: self.errors,
            }
        }
    }

    /// Close a pass requested by an enclosing organizer.
    pub(crate) fn into_result(self) -> Result<(), StepError<E>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(StepError::CompensationFailed {
                step: self.owner,
                original: None,
                compensation_errors: self.errors,
            })
        }
    }
}
