//! Step orchestration with lifecycle hooks and automatic rollback.
//!
//! A [`HookedStep`] wraps a leaf [`Operation`] in before/after/around hooks.
//! An [`Organizer`] runs a declared sequence of steps against one shared
//! [`Context`] and, when a step fails, compensates every step that already
//! completed in reverse order, cascading into nested organizers. A
//! [`ConditionOrganizer`] gates each of its steps behind a predicate and keeps
//! no rollback bookkeeping of its own.
//!
//! Steps signal an expected failure by marking the context failed
//! ([`Context::fail`]) and an unexpected error by returning
//! [`StepError::Raised`]. Both trigger the same rollback; they differ only at
//! the entry points of [`StepExt`]: [`call`](StepExt::call) swallows expected
//! failures while [`call_strict`](StepExt::call_strict) returns them.

mod compensation;
mod condition;
mod config;
mod error;
mod hooked;
mod hooks;
mod naming;
mod operation;
mod organizer;
mod record;
mod step;

pub use condition::{ConditionFn, ConditionOrganizer};
pub use config::{ConfigError, EngineConfig, RollbackPolicy};
pub use error::{CompensationError, StepError};
pub use hooked::HookedStep;
pub use hooks::{AroundFn, HookFn, Hookable, Hooks, Next};
pub use naming::{condition_name, underscore};
pub use operation::Operation;
pub use organizer::Organizer;
pub use record::ExecutionRecord;
pub use step::{Step, StepExt, boxed};
pub use stepwise_context::{Context, ContextError, Failure};

/// Build an ordered collection of boxed steps for
/// [`Organizer::organize`] or [`ConditionOrganizer::condition_organize`].
///
/// ```
/// use stepwise_saga::{Context, HookedStep, Operation, Organizer, StepError, steps};
///
/// struct Charge;
///
/// impl Operation for Charge {
///     type Error = std::io::Error;
///
///     fn call(&self, ctx: &mut Context) -> Result<(), StepError<Self::Error>> {
///         ctx.set("charged", true);
///         Ok(())
///     }
/// }
///
/// let organizer = Organizer::new("checkout").organize(steps![HookedStep::new(Charge)]);
/// assert_eq!(organizer.organized().len(), 1);
/// ```
#[macro_export]
macro_rules! steps {
    () => {
        ::std::vec::Vec::new()
    };
    ($($step:expr),+ $(,)?) => {
        ::std::vec![$($crate::boxed($step)),+]
    };
}
