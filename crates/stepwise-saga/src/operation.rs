use stepwise_context::Context;

use crate::error::StepError;
use crate::naming::short_type_name;

/// Business logic of a leaf step: a core operation and an optional
/// compensating action.
///
/// Wrap an operation in [`HookedStep`](crate::HookedStep) to attach hooks and
/// to declare it inside an organizer.
///
/// # Type Parameters
///
/// - `Error`: the error type returned for unexpected errors
pub trait Operation {
    /// Error type for unexpected errors raised by this operation.
    type Error;

    /// Human-readable name used in logs, errors and condition names.
    ///
    /// Defaults to the type name without its module path, so a type
    /// `ChargeCard` is named `ChargeCard` and guarded by the condition
    /// `charge_card_condition` inside a condition organizer.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Execute the operation against the shared context.
    ///
    /// Return `Err(ctx.fail().into())` for an expected failure and
    /// `Err(StepError::Raised(..))` for an unexpected error.
    ///
    /// # Errors
    ///
    /// Returns the signal that interrupts the step.
    fn call(&self, ctx: &mut Context) -> Result<(), StepError<Self::Error>>;

    /// Undo the effects of [`call`](Self::call).
    ///
    /// Called during rollback when a later step fails. The default
    /// implementation is a no-op, suitable for read-only steps.
    ///
    /// # Errors
    ///
    /// Returns an error if compensation fails.
    fn rollback(&self, ctx: &mut Context) -> Result<(), StepError<Self::Error>> {
        let _ = ctx;
        Ok(())
    }

    /// Human-readable description of what compensation will do.
    fn compensation_description(&self) -> String {
        format!("undo {}", self.name())
    }
}
