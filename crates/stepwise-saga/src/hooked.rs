use stepwise_context::Context;
use tracing::debug;

use crate::compensation::RollbackPass;
use crate::config::{EngineConfig, RollbackPolicy};
use crate::error::StepError;
use crate::hooks::{Hookable, Hooks, settle};
use crate::operation::Operation;
use crate::record::ExecutionRecord;
use crate::step::Step;

/// A leaf [`Operation`] wrapped in its own hook chain.
///
/// ```
/// use stepwise_saga::{Context, Hookable, HookedStep, Operation, StepError, StepExt};
///
/// struct Greet;
///
/// impl Operation for Greet {
///     type Error = std::io::Error;
///
///     fn call(&self, ctx: &mut Context) -> Result<(), StepError<Self::Error>> {
///         ctx.push("log", "hello");
///         Ok(())
///     }
/// }
///
/// let step = HookedStep::new(Greet).before(|ctx| {
///     ctx.push("log", "before");
///     Ok(())
/// });
///
/// let mut ctx = Context::new();
/// step.call_strict(&mut ctx).unwrap();
/// assert_eq!(ctx.get("log"), Some(&serde_json::json!(["before", "hello"])));
/// ```
pub struct HookedStep<O: Operation> {
    operation: O,
    hooks: Hooks<O::Error>,
    policy: RollbackPolicy,
}

impl<O: Operation> HookedStep<O> {
    #[must_use]
    pub fn new(operation: O) -> Self {
        Self {
            operation,
            hooks: Hooks::new(),
            policy: RollbackPolicy::default(),
        }
    }

    #[must_use]
    pub fn operation(&self) -> &O {
        &self.operation
    }

    /// Set how a failing rollback is reported when this step compensates
    /// itself after its own hooks failed.
    #[must_use]
    pub fn rollback_policy(mut self, policy: RollbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn configure(self, config: &EngineConfig) -> Self {
        self.rollback_policy(config.rollback_policy())
    }

    fn roll_back_self(&self, ctx: &mut Context, original: StepError<O::Error>) -> StepError<O::Error> {
        debug!(step = self.name(), "rolling back step interrupted after its operation");
        let mut pass = RollbackPass::new(self.name(), self.policy);
        let result = self.operation.rollback(ctx);
        match pass.record(self.name(), self.compensation_description(), result) {
            Ok(()) => pass.finish(original),
            Err(err) => err,
        }
    }
}

impl<O: Operation> Hookable<O::Error> for HookedStep<O> {
    fn hooks_mut(&mut self) -> &mut Hooks<O::Error> {
        &mut self.hooks
    }
}

impl<O: Operation> Step<O::Error> for HookedStep<O> {
    fn name(&self) -> &str {
        self.operation.name()
    }

    fn invoke(&self, ctx: &mut Context) -> Result<Option<ExecutionRecord>, StepError<O::Error>> {
        let mut completed = false;
        let result = self.hooks.run(ctx, &mut |ctx: &mut Context| -> Result<(), StepError<O::Error>> {
            settle(self.operation.call(ctx), ctx)?;
            completed = true;
            Ok(())
        });

        match result {
            Ok(()) => Ok(completed.then(ExecutionRecord::new)),
            Err(err) if completed => Err(self.roll_back_self(ctx, err)),
            Err(err) => Err(err),
        }
    }

    fn compensate(
        &self,
        ctx: &mut Context,
        _record: ExecutionRecord,
    ) -> Result<(), StepError<O::Error>> {
        self.operation.rollback(ctx)
    }

    fn compensation_description(&self) -> String {
        self.operation.compensation_description()
    }

    fn apply_rollback_policy(&mut self, policy: RollbackPolicy) {
        self.policy = policy;
    }
}
