use stepwise_context::Context;
use tracing::debug;

use crate::config::RollbackPolicy;
use crate::error::StepError;
use crate::record::ExecutionRecord;

/// A unit of work an organizer can run and compensate.
///
/// Implemented by [`HookedStep`](crate::HookedStep), [`Organizer`](crate::Organizer)
/// and [`ConditionOrganizer`](crate::ConditionOrganizer). The trait is
/// object-safe so heterogeneous steps can be declared together as
/// `Box<dyn Step<E>>`.
///
/// # Type Parameters
///
/// - `E`: the error type carried by [`StepError::Raised`]
pub trait Step<E> {
    /// Human-readable name for logging, errors and condition lookup.
    fn name(&self) -> &str;

    /// Run the step's hook chain.
    ///
    /// Returns `Ok(Some(record))` when the core operation completed,
    /// `Ok(None)` when an around hook skipped it. The record is handed back
    /// to [`compensate`](Self::compensate) if an enclosing organizer rolls
    /// back.
    ///
    /// # Errors
    ///
    /// Returns the signal that interrupted the chain. A step whose core
    /// completed before the interruption has already compensated itself.
    fn invoke(&self, ctx: &mut Context) -> Result<Option<ExecutionRecord>, StepError<E>>;

    /// Undo a completed invocation described by `record`.
    ///
    /// # Errors
    ///
    /// Returns an error if a compensating action fails.
    fn compensate(&self, ctx: &mut Context, record: ExecutionRecord) -> Result<(), StepError<E>>;

    /// Human-readable description of what compensation will do.
    fn compensation_description(&self) -> String {
        format!("undo {}", self.name())
    }

    /// Adopt the rollback policy of an enclosing organizer.
    ///
    /// Organizers forward the policy to every declared sub-step, so one
    /// setting at the top governs the whole tree. Steps that never
    /// compensate anything keep the default no-op.
    fn apply_rollback_policy(&mut self, _policy: RollbackPolicy) {}
}

impl<E, S: Step<E> + ?Sized> Step<E> for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn invoke(&self, ctx: &mut Context) -> Result<Option<ExecutionRecord>, StepError<E>> {
        (**self).invoke(ctx)
    }

    fn compensate(&self, ctx: &mut Context, record: ExecutionRecord) -> Result<(), StepError<E>> {
        (**self).compensate(ctx, record)
    }

    fn compensation_description(&self) -> String {
        (**self).compensation_description()
    }

    fn apply_rollback_policy(&mut self, policy: RollbackPolicy) {
        (**self).apply_rollback_policy(policy);
    }
}

/// Box a step for declaration inside an organizer.
pub fn boxed<E, S>(step: S) -> Box<dyn Step<E>>
where
    S: Step<E> + 'static,
{
    Box::new(step)
}

/// Entry points for running a step from outside any organizer.
pub trait StepExt<E>: Step<E> {
    /// Run the step, treating an expected failure as success.
    ///
    /// Inspect [`Context::is_failed`] afterwards to tell whether the step
    /// failed.
    ///
    /// # Errors
    ///
    /// Returns unexpected errors unchanged.
    fn call(&self, ctx: &mut Context) -> Result<(), StepError<E>> {
        match self.invoke(ctx) {
            Ok(_) => Ok(()),
            Err(StepError::Failed(_)) => {
                debug!(step = self.name(), "step failed");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Run the step, returning an expected failure as
    /// [`StepError::Failed`].
    ///
    /// # Errors
    ///
    /// Returns every signal that interrupted the step.
    fn call_strict(&self, ctx: &mut Context) -> Result<(), StepError<E>> {
        self.invoke(ctx).map(|_| ())
    }
}

impl<E, S: Step<E> + ?Sized> StepExt<E> for S {}
