use stepwise_context::Context;
use tracing::trace;

use crate::error::StepError;

/// A before or after hook.
pub type HookFn<E> = Box<dyn Fn(&mut Context) -> Result<(), StepError<E>>>;

/// An around hook. It receives a [`Next`] handle for everything nested
/// inside it and decides whether and when to run it.
pub type AroundFn<E> = Box<dyn Fn(&mut Context, Next<'_, E>) -> Result<(), StepError<E>>>;

type Inner<'a, E> = dyn FnMut(&mut Context) -> Result<(), StepError<E>> + 'a;

/// The remainder of a hook chain, as seen by an around hook.
///
/// Running it consumes the handle, so the inner chain runs at most once per
/// around hook. Dropping it without running skips the inner hooks and the
/// core operation; that is not an error.
pub struct Next<'a, E> {
    inner: &'a mut Inner<'a, E>,
}

impl<E> Next<'_, E> {
    /// Run the inner around hooks, the before hooks, the core operation and
    /// the after hooks.
    ///
    /// # Errors
    ///
    /// Returns the signal that interrupted the inner chain. Propagate it with
    /// `?` so the enclosing step sees the failure.
    pub fn run(self, ctx: &mut Context) -> Result<(), StepError<E>> {
        (self.inner)(ctx)
    }
}

/// Lifecycle hooks of one step, in declaration order.
///
/// Hooks compose around a core operation as
/// `around[0]( around[1]( ... before* -> core -> after* ... ) )`:
/// the first-declared around hook is outermost, before and after hooks run
/// in the order they were declared.
pub struct Hooks<E> {
    before: Vec<HookFn<E>>,
    after: Vec<HookFn<E>>,
    around: Vec<AroundFn<E>>,
}

impl<E> Default for Hooks<E> {
    fn default() -> Self {
        Self {
            before: Vec::new(),
            after: Vec::new(),
            around: Vec::new(),
        }
    }
}

impl<E> std::fmt::Debug for Hooks<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("around", &self.around.len())
            .finish()
    }
}

impl<E> Hooks<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_before<F>(&mut self, hook: F)
    where
        F: Fn(&mut Context) -> Result<(), StepError<E>> + 'static,
    {
        self.before.push(Box::new(hook));
    }

    pub fn push_after<F>(&mut self, hook: F)
    where
        F: Fn(&mut Context) -> Result<(), StepError<E>> + 'static,
    {
        self.after.push(Box::new(hook));
    }

    pub fn push_around<F>(&mut self, hook: F)
    where
        F: Fn(&mut Context, Next<'_, E>) -> Result<(), StepError<E>> + 'static,
    {
        self.around.push(Box::new(hook));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty() && self.around.is_empty()
    }

    /// Run `core` wrapped in these hooks.
    ///
    /// A context that is already failed runs nothing. The failed marker is
    /// checked after every hook and after `core`, so a hook that marks the
    /// context failed interrupts the chain even if it returns `Ok`.
    pub(crate) fn run(
        &self,
        ctx: &mut Context,
        core: &mut Inner<'_, E>,
    ) -> Result<(), StepError<E>> {
        settle(Ok(()), ctx)?;
        trace!(
            before = self.before.len(),
            after = self.after.len(),
            around = self.around.len(),
            "running hook chain"
        );

        let mut body = |ctx: &mut Context| -> Result<(), StepError<E>> {
            for hook in &self.before {
                settle(hook(ctx), ctx)?;
            }
            settle(core(ctx), ctx)?;
            for hook in &self.after {
                settle(hook(ctx), ctx)?;
            }
            Ok(())
        };

        wrap(&self.around, ctx, &mut body)
    }
}

fn wrap<E>(
    around: &[AroundFn<E>],
    ctx: &mut Context,
    inner: &mut Inner<'_, E>,
) -> Result<(), StepError<E>> {
    let Some((hook, rest)) = around.split_first() else {
        return inner(ctx);
    };
    let mut remainder = |ctx: &mut Context| wrap(rest, ctx, &mut *inner);
    let result = hook(
        ctx,
        Next {
            inner: &mut remainder,
        },
    );
    settle(result, ctx)
}

/// Turn a hook's result into the chain's verdict, treating a context that
/// was marked failed as an interruption.
pub(crate) fn settle<E>(result: Result<(), StepError<E>>, ctx: &Context) -> Result<(), StepError<E>> {
    result?;
    match ctx.failure() {
        Some(failure) => Err(StepError::Failed(failure)),
        None => Ok(()),
    }
}

/// Builder access to a step's hooks.
///
/// Implemented by every step type that carries hooks, so hooks can be
/// declared the same way on leaves and organizers.
pub trait Hookable<E>: Sized {
    fn hooks_mut(&mut self) -> &mut Hooks<E>;

    #[must_use]
    fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), StepError<E>> + 'static,
    {
        self.hooks_mut().push_before(hook);
        self
    }

    #[must_use]
    fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), StepError<E>> + 'static,
    {
        self.hooks_mut().push_after(hook);
        self
    }

    #[must_use]
    fn around<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Context, Next<'_, E>) -> Result<(), StepError<E>> + 'static,
    {
        self.hooks_mut().push_around(hook);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(&'static str);

    fn trace(ctx: &Context) -> Vec<String> {
        ctx.get_as("steps")
            .expect("steps decode")
            .unwrap_or_default()
    }

    fn run_core(hooks: &Hooks<TestError>, ctx: &mut Context) -> Result<(), StepError<TestError>> {
        hooks.run(ctx, &mut |ctx: &mut Context| -> Result<(), StepError<TestError>> {
            ctx.push("steps", "call");
            Ok(())
        })
    }

    #[test]
    fn empty_hooks_run_core_only() {
        let hooks: Hooks<TestError> = Hooks::new();
        let mut ctx = Context::new();

        run_core(&hooks, &mut ctx).expect("core should succeed");

        assert!(hooks.is_empty());
        assert_eq!(trace(&ctx), vec!["call"]);
    }

    #[test]
    fn first_declared_around_is_outermost() {
        let mut hooks: Hooks<TestError> = Hooks::new();
        hooks.push_before(|ctx| {
            ctx.push("steps", "before1");
            Ok(())
        });
        hooks.push_before(|ctx| {
            ctx.push("steps", "before2");
            Ok(())
        });
        hooks.push_after(|ctx| {
            ctx.push("steps", "after1");
            Ok(())
        });
        hooks.push_after(|ctx| {
            ctx.push("steps", "after2");
            Ok(())
        });
        hooks.push_around(|ctx, next| {
            ctx.push("steps", "around_before1");
            next.run(ctx)?;
            ctx.push("steps", "around_after1");
            Ok(())
        });
        hooks.push_around(|ctx, next| {
            ctx.push("steps", "around_before2");
            next.run(ctx)?;
            ctx.push("steps", "around_after2");
            Ok(())
        });
        let mut ctx = Context::new();

        run_core(&hooks, &mut ctx).expect("chain should succeed");

        assert_eq!(
            trace(&ctx),
            vec![
                "around_before1",
                "around_before2",
                "before1",
                "before2",
                "call",
                "after1",
                "after2",
                "around_after2",
                "around_after1",
            ]
        );
    }

    #[test]
    fn around_that_skips_next_aborts_inner_chain_without_error() {
        let mut hooks: Hooks<TestError> = Hooks::new();
        hooks.push_around(|ctx, _next| {
            ctx.push("steps", "around");
            Ok(())
        });
        hooks.push_before(|ctx| {
            ctx.push("steps", "before");
            Ok(())
        });
        let mut ctx = Context::new();

        run_core(&hooks, &mut ctx).expect("skipping is not an error");

        assert_eq!(trace(&ctx), vec!["around"]);
        assert!(ctx.is_success());
    }

    #[test]
    fn before_error_stops_core_and_after() {
        let mut hooks: Hooks<TestError> = Hooks::new();
        hooks.push_before(|_ctx| Err(StepError::Raised(TestError("foo"))));
        hooks.push_after(|ctx| {
            ctx.push("steps", "after");
            Ok(())
        });
        let mut ctx = Context::new();

        let err = run_core(&hooks, &mut ctx).expect_err("before hook errors");

        assert_eq!(err.raised(), Some(&TestError("foo")));
        assert!(trace(&ctx).is_empty());
    }

    #[test]
    fn marker_set_without_error_still_interrupts() {
        let mut hooks: Hooks<TestError> = Hooks::new();
        hooks.push_before(|ctx| {
            let _ = ctx.fail();
            Ok(())
        });
        let mut ctx = Context::new();

        let err = run_core(&hooks, &mut ctx).expect_err("marker interrupts");

        assert!(err.is_failure());
        assert!(trace(&ctx).is_empty());
    }

    #[test]
    fn failed_context_runs_nothing() {
        let calls = Rc::new(Cell::new(0));
        let mut hooks: Hooks<TestError> = Hooks::new();
        let seen = Rc::clone(&calls);
        hooks.push_before(move |_ctx| {
            seen.set(seen.get() + 1);
            Ok(())
        });
        let mut ctx = Context::new();
        let _ = ctx.fail();

        let err = run_core(&hooks, &mut ctx).expect_err("already failed");

        assert!(err.is_failure());
        assert_eq!(calls.get(), 0);
        assert!(trace(&ctx).is_empty());
    }
}
