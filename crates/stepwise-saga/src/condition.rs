use indexmap::IndexMap;
use stepwise_context::Context;
use tracing::debug;

use crate::config::{EngineConfig, RollbackPolicy};
use crate::error::StepError;
use crate::hooks::{Hookable, Hooks};
use crate::naming::condition_name;
use crate::record::ExecutionRecord;
use crate::step::Step;

/// Predicate consulted before a conditional step runs.
pub type ConditionFn = Box<dyn Fn(&Context) -> bool>;

/// Runs each declared step only when its predicate holds.
///
/// A step named `T` is guarded by the predicate registered under
/// [`condition_name`]`(T)`. Running a step without a registered predicate
/// fails with [`StepError::MissingCondition`].
///
/// Steps that ran are not compensated when a later one fails, and
/// compensating a `ConditionOrganizer` nested inside an
/// [`Organizer`](crate::Organizer) does nothing. A configured rollback
/// policy is still handed down to the declared steps, which use it when
/// they roll themselves back.
pub struct ConditionOrganizer<E> {
    name: String,
    hooks: Hooks<E>,
    steps: Vec<Box<dyn Step<E>>>,
    conditions: IndexMap<String, ConditionFn>,
    policy: Option<RollbackPolicy>,
}

impl<E> ConditionOrganizer<E> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: Hooks::new(),
            steps: Vec::new(),
            conditions: IndexMap::new(),
            policy: None,
        }
    }

    /// Declare the steps to run, replacing any earlier declaration.
    /// Registered predicates are kept.
    #[must_use]
    pub fn condition_organize<I>(mut self, steps: I) -> Self
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

    /// Append one step together with the predicate that guards it.
    #[must_use]
    pub fn step_when<S, F>(self, step: S, predicate: F) -> Self
    where
        S: Step<E> + 'static,
        F: Fn(&Context) -> bool + 'static,
    {
        let name = condition_name(step.name());
        self.condition(name, predicate).step(step)
    }

    /// Register a predicate under an explicit condition name, replacing any
    /// predicate already registered under it.
    #[must_use]
    pub fn condition<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + 'static,
    {
        self.conditions.insert(name.into(), Box::new(predicate));
        self
    }

    #[must_use]
    pub fn has_condition(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    /// The declared steps, in order.
    #[must_use]
    pub fn condition_organized(&self) -> &[Box<dyn Step<E>>] {
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

    fn run_steps(&self, ctx: &mut Context) -> Result<(), StepError<E>> {
        for step in &self.steps {
            let condition = condition_name(step.name());
            let Some(predicate) = self.conditions.get(&condition) else {
                return Err(StepError::MissingCondition {
                    step: step.name().to_string(),
                    condition,
                });
            };

            if predicate(ctx) {
                debug!(organizer = %self.name, step = step.name(), %condition, "condition met");
                step.invoke(ctx)?;
            } else {
                debug!(
                    organizer = %self.name,
                    step = step.name(),
                    %condition,
                    "condition not met, skipping step"
                );
            }
        }
        Ok(())
    }
}

impl<E> Hookable<E> for ConditionOrganizer<E> {
    fn hooks_mut(&mut self) -> &mut Hooks<E> {
        &mut self.hooks
    }
}

impl<E> Step<E> for ConditionOrganizer<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, ctx: &mut Context) -> Result<Option<ExecutionRecord>, StepError<E>> {
        let mut ran = false;
        self.hooks
            .run(ctx, &mut |ctx: &mut Context| -> Result<(), StepError<E>> {
                self.run_steps(ctx)?;
                ran = true;
                Ok(())
            })?;
        Ok(ran.then(ExecutionRecord::new))
    }

    fn compensate(&self, _ctx: &mut Context, _record: ExecutionRecord) -> Result<(), StepError<E>> {
        Ok(())
    }

    fn apply_rollback_policy(&mut self, policy: RollbackPolicy) {
        self.policy = Some(policy);
        for step in &mut self.steps {
            step.apply_rollback_policy(policy);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::hooked::HookedStep;
    use crate::operation::Operation;
    use crate::steps;

    use super::*;

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(&'static str);

    struct ShipOrder;
    struct SendReceipt;
    struct PrintLabel;

    impl Operation for ShipOrder {
        type Error = TestError;

        fn call(&self, ctx: &mut Context) -> Result<(), StepError<Self::Error>> {
            ctx.push("steps", "ship");
            Ok(())
        }
    }

    impl Operation for SendReceipt {
        type Error = TestError;

        fn call(&self, ctx: &mut Context) -> Result<(), StepError<Self::Error>> {
            ctx.push("steps", "receipt");
            Ok(())
        }
    }

    impl Operation for PrintLabel {
        type Error = TestError;

        fn call(&self, ctx: &mut Context) -> Result<(), StepError<Self::Error>> {
            ctx.push("steps", "label");
            Ok(())
        }

        fn rollback(&self, _ctx: &mut Context) -> Result<(), StepError<Self::Error>> {
            Err(StepError::Raised(TestError("label printer jammed")))
        }
    }

    fn trace(ctx: &Context) -> Vec<String> {
        ctx.get_as("steps")
            .expect("steps decode")
            .unwrap_or_default()
    }

    #[test]
    fn condition_organized_is_empty_by_default() {
        let organizer: ConditionOrganizer<TestError> = ConditionOrganizer::new("fulfil");

        assert!(organizer.condition_organized().is_empty());
    }

    #[test]
    fn condition_organize_replaces_steps_and_keeps_conditions() {
        let organizer = ConditionOrganizer::new("fulfil")
            .step_when(HookedStep::new(ShipOrder), |_| true)
            .condition_organize(steps![HookedStep::new(SendReceipt)]);

        let names: Vec<&str> = organizer
            .condition_organized()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["SendReceipt"]);
        assert!(organizer.has_condition("ship_order_condition"));
    }

    #[test]
    fn step_when_registers_derived_condition_name() {
        let organizer = ConditionOrganizer::new("fulfil")
            .step_when(HookedStep::new(ShipOrder), |_| true);

        assert!(organizer.has_condition("ship_order_condition"));
        assert!(!organizer.has_condition("send_receipt_condition"));
    }

    #[test]
    fn runs_only_steps_whose_condition_holds() -> anyhow::Result<()> {
        let organizer = ConditionOrganizer::new("fulfil")
            .step(HookedStep::new(ShipOrder))
            .step(HookedStep::new(SendReceipt))
            .condition("ship_order_condition", |ctx| ctx.contains("address"))
            .condition("send_receipt_condition", |ctx| ctx.contains("email"));
        let mut ctx = Context::with_fields([("email", "a@example.com")]);

        let record = organizer.invoke(&mut ctx)?;

        assert!(record.is_some_and(|r| r.is_empty()));
        assert_eq!(trace(&ctx), vec!["receipt"]);
        Ok(())
    }

    #[test]
    fn missing_condition_aborts_iteration() {
        let organizer = ConditionOrganizer::new("fulfil")
            .step_when(HookedStep::new(ShipOrder), |_| true)
            .step(HookedStep::new(SendReceipt));
        let mut ctx = Context::new();

        let err = organizer.invoke(&mut ctx).expect_err("no predicate for SendReceipt");

        assert!(matches!(
            err,
            StepError::MissingCondition { ref step, ref condition }
                if step == "SendReceipt" && condition == "send_receipt_condition"
        ));
        assert_eq!(trace(&ctx), vec!["ship"]);
    }

    #[test]
    fn compensate_is_a_no_op() -> anyhow::Result<()> {
        let organizer = ConditionOrganizer::new("fulfil")
            .step_when(HookedStep::new(ShipOrder), |_| true);
        let mut ctx = Context::new();
        let record = organizer.invoke(&mut ctx)?.expect("core completed");

        organizer.compensate(&mut ctx, record)?;

        assert_eq!(trace(&ctx), vec!["ship"]);
        Ok(())
    }

    #[test]
    fn configured_policy_governs_self_rollback_of_steps() {
        let config = EngineConfig::new().with_rollback_policy(RollbackPolicy::BestEffort);
        let organizer = ConditionOrganizer::new("fulfil")
            .configure(&config)
            .step_when(
                HookedStep::new(PrintLabel).after(|ctx| Err(ctx.fail().into())),
                |_| true,
            );
        let mut ctx = Context::new();

        let err = organizer.invoke(&mut ctx).expect_err("label rollback fails");

        match err {
            StepError::CompensationFailed {
                step,
                original,
                compensation_errors,
            } => {
                assert_eq!(step, "PrintLabel");
                assert!(original.is_some_and(|o| o.is_failure()));
                assert_eq!(compensation_errors.len(), 1);
            }
            other => panic!("expected CompensationFailed, got {other:?}"),
        }
    }

    #[test]
    fn unconfigured_steps_abort_on_failing_self_rollback() {
        let organizer = ConditionOrganizer::new("fulfil").step_when(
            HookedStep::new(PrintLabel).after(|ctx| Err(ctx.fail().into())),
            |_| true,
        );
        let mut ctx = Context::new();

        let err = organizer.invoke(&mut ctx).expect_err("label rollback fails");

        assert_eq!(err.raised(), Some(&TestError("label printer jammed")));
    }
}
