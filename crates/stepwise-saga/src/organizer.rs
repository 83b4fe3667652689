use stepwise_context::Context;
use tracing::{debug, warn};

use crate::compensation::RollbackPass;
use crate::config::{EngineConfig, RollbackPolicy};
use crate::error::StepError;
use crate::hooks::{Hookable, Hooks};
use crate::record::ExecutionRecord;
use crate::step::Step;

/// Runs a declared sequence of steps and rolls back the completed ones when
/// any of them is interrupted.
///
/// Rollback walks the completed steps in reverse order. A completed step
/// that is itself an organizer rolls back its own completed steps before the
/// walk moves on to earlier siblings. After the rollback the interrupting
/// signal is returned unchanged, unless a compensation failed (see
/// [`RollbackPolicy`]).
///
/// A policy set with [`rollback_policy`](Self::rollback_policy) or
/// [`configure`](Self::configure) applies to every step nested below the
/// organizer, including steps declared after it was set.
///
/// # Example
///
/// ```
/// use stepwise_saga::{Context, HookedStep, Operation, Organizer, StepError, StepExt};
///
/// struct Reserve;
/// struct Charge;
///
/// impl Operation for Reserve {
///     type Error = std::io::Error;
///
///     fn call(&self, ctx: &mut Context) -> Result<(), StepError<Self::Error>> {
///         ctx.set("reserved", true);
///         Ok(())
///     }
///
///     fn rollback(&self, ctx: &mut Context) -> Result<(), StepError<Self::Error>> {
///         ctx.set("reserved", false);
///         Ok(())
///     }
/// }
///
/// impl Operation for Charge {
///     type Error = std::io::Error;
///
///     fn call(&self, ctx: &mut Context) -> Result<(), StepError<Self::Error>> {
///         Err(ctx.fail_with(serde_json::json!({"error": "card declined"})).into())
///     }
/// }
///
/// let checkout = Organizer::new("checkout")
///     .step(HookedStep::new(Reserve))
///     .step(HookedStep::new(Charge));
///
/// let mut ctx = Context::new();
/// checkout.call(&mut ctx).unwrap();
///
/// assert!(ctx.is_failed());
/// assert_eq!(ctx.get("reserved"), Some(&serde_json::json!(false)));
/// assert_eq!(ctx.get("error"), Some(&serde_json::json!("card declined")));
/// ```
pub struct Organizer<E> {
    name: String,
    hooks: Hooks<E>,
    steps: Vec<Box<dyn Step<E>>>,
    policy: Option<RollbackPolicy>,
}

impl<E> Organizer<E> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: Hooks::new(),
            steps: Vec::new(),
            policy: None,
        }
    }

    /// Declare the steps to run, replacing any earlier declaration.
    #[must_use]
    pub fn organize<I>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Step<E>>>,
    {
        self.steps = steps.into_iter().collect();
        if let Some(policy) = self.policy {
            self.apply_rollback_policy(policy);
        }
        self
    }

    /// Append one step to the declaration.
    #[must_use]
    pub fn step<S>(mut self, mut step: S) -> Self
    where
        S: Step<E> + 'static,
    {
        if let Some(policy) = self.policy {
            step.apply_rollback_policy(policy);
        }
        self.steps.push(Box::new(step));
        self
    }

    /// The declared steps, in order.
    #[must_use]
    pub fn organized(&self) -> &[Box<dyn Step<E>>] {
        &self.steps
    }

    #[must_use]
    pub fn rollback_policy(mut self, policy: RollbackPolicy) -> Self {
        self.apply_rollback_policy(policy);
        self
    }

    #[must_use]
    pub fn configure(self, config: &EngineConfig) -> Self {
        self.rollback_policy(config.rollback_policy())
    }

    fn run_steps(&self, ctx: &mut Context) -> Result<ExecutionRecord, StepError<E>> {
        let mut record = ExecutionRecord::new();

        for (index, step) in self.steps.iter().enumerate() {
            debug!(organizer = %self.name, step = step.name(), "invoking step");
            match step.invoke(ctx) {
                Ok(Some(nested)) => record.push(index, nested),
                Ok(None) => {
                    debug!(
                        organizer = %self.name,
                        step = step.name(),
                        "step skipped by around hook"
                    );
                }
                Err(err) => return Err(self.roll_back(ctx, record, err)),
            }
        }

        Ok(record)
    }

    fn roll_back(
        &self,
        ctx: &mut Context,
        record: ExecutionRecord,
        original: StepError<E>,
    ) -> StepError<E> {
        debug!(
            organizer = %self.name,
            completed = record.len(),
            failure = original.is_failure(),
            "rolling back completed steps"
        );
        let mut pass = RollbackPass::new(&self.name, self.policy.unwrap_or_default());
        match self.compensate_record(ctx, record, &mut pass) {
            Ok(()) => pass.finish(original),
            Err(err) => err,
        }
    }

    fn compensate_record(
        &self,
        ctx: &mut Context,
        record: ExecutionRecord,
        pass: &mut RollbackPass<E>,
    ) -> Result<(), StepError<E>> {
        for (index, nested) in record.into_rollback_order() {
            let Some(step) = self.steps.get(index) else {
                warn!(organizer = %self.name, index, "no declared step for record entry");
                continue;
            };
            let result = step.compensate(ctx, nested);
            pass.record(step.name(), step.compensation_description(), result)?;
        }
        Ok(())
    }
}

impl<E> Hookable<E> for Organizer<E> {
    fn hooks_mut(&mut self) -> &mut Hooks<E> {
        &mut self.hooks
    }
}

impl<E> Step<E> for Organizer<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, ctx: &mut Context) -> Result<Option<ExecutionRecord>, StepError<E>> {
        let mut completed = None;
        let result = self.hooks.run(ctx, &mut |ctx: &mut Context| -> Result<(), StepError<E>> {
            completed = Some(self.run_steps(ctx)?);
            Ok(())
        });

        match (result, completed) {
            (Ok(()), record) => Ok(record),
            (Err(err), Some(record)) => Err(self.roll_back(ctx, record, err)),
            (Err(err), None) => Err(err),
        }
    }

    fn compensate(&self, ctx: &mut Context, record: ExecutionRecord) -> Result<(), StepError<E>> {
        debug!(organizer = %self.name, completed = record.len(), "compensating organizer");
        let mut pass = RollbackPass::new(&self.name, self.policy.unwrap_or_default());
        self.compensate_record(ctx, record, &mut pass)?;
        pass.into_result()
    }

    fn apply_rollback_policy(&mut self, policy: RollbackPolicy) {
        self.policy = Some(policy);
        for step in &mut self.steps {
            step.apply_rollback_policy(policy);
        }
    }
}
