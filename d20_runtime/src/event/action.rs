//! Deferred dispatch.

use tracing::{debug, trace, warn};

use super::{EventId, EventToken, Handler, HandlerReturn};
use crate::context::Context;
use crate::{Result, RuntimeError};

/// A resolved handler chain bound to a context, waiting to run.
///
/// Invoking consumes the action, so it can run at most once. When the action
/// owns a dispatch-scoped context, that context is disposed when the action
/// is dropped, whether or not it ran.
#[must_use = "an action does nothing until it is invoked"]
pub struct Action<A: 'static, R: 'static> {
    ctx: Context,
    event: EventId,
    handlers: Vec<Handler<A, R>>,
    args: A,
    owns_context: bool,
}

/// Bind `handlers` to `ctx` without running them.
///
/// The handlers may come from any registry; `token` only ties the argument
/// and return types together.
pub fn call_handlers<A: 'static, R: 'static>(
    ctx: Context,
    token: EventToken<A, R>,
    handlers: Vec<Handler<A, R>>,
    args: A,
) -> Action<A, R> {
    Action::new(ctx, token, handlers, args, false)
}

impl<A: 'static, R: 'static> Action<A, R> {
    pub(crate) fn new(
        ctx: Context,
        token: EventToken<A, R>,
        handlers: Vec<Handler<A, R>>,
        args: A,
        owns_context: bool,
    ) -> Self {
        Self {
            ctx,
            event: token.id(),
            handlers,
            args,
            owns_context,
        }
    }

    /// The context handlers will receive.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn event(&self) -> EventId {
        self.event
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Register a patch on this action's context before it runs.
    ///
    /// The resolved chain is already fixed; the patch applies to dispatches
    /// the handlers start from the context they are given.
    pub fn add_patch<PA, PR, F>(self, token: EventToken<PA, PR>, callback: F) -> Result<Self>
    where
        PA: 'static,
        PR: 'static,
        F: Fn(&Context, &PA) -> Result<HandlerReturn<PR>> + 'static,
    {
        self.ctx.add_patch(token, callback)?;
        Ok(self)
    }

    /// Run the chain.
    ///
    /// Each handler's value replaces the previous one, so the last handler
    /// wins. A handler returning a cancellation stops the chain and its
    /// wrapped value is the result. Errors propagate unchanged.
    pub fn invoke(self) -> Result<Option<R>> {
        debug!(
            event = %self.event,
            handlers = self.handlers.len(),
            context = %self.ctx.key(),
            "invoking action"
        );

        let mut result = None;

        for (step, handler) in self.handlers.iter().enumerate() {
            trace!(event = %self.event, step, order = handler.order(), "running handler");
            match handler.call(&self.ctx, &self.args)? {
                HandlerReturn::Value(value) => result = Some(value),
                HandlerReturn::Empty => result = None,
                HandlerReturn::Cancel(cancel) => {
                    trace!(event = %self.event, step, "handler canceled the chain");
                    return Ok(Some(cancel.value));
                }
            }
        }

        Ok(result)
    }

    /// Run the chain and fail if it produced no value.
    pub fn invoke_checked(self) -> Result<R> {
        let event = self.event;
        self.invoke()?.ok_or(RuntimeError::EmptyResult { event })
    }
}

impl<A: 'static, R: 'static> Drop for Action<A, R> {
    fn drop(&mut self) {
        if !self.owns_context || !self.ctx.is_alive() {
            return;
        }

        if let Err(err) = self.ctx.dispose() {
            warn!(event = %self.event, error = %err, "failed to dispose dispatch context");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Game;
    use std::cell::Cell;
    use std::rc::Rc;

    const PING: EventToken<i64, i64> = EventToken::new("test.ping");

    fn chain(game: &Game, returns: Vec<HandlerReturn<i64>>, calls: Rc<Cell<usize>>) {
        for value in returns {
            let calls = Rc::clone(&calls);
            game.register_handler(PING, move |_, _| {
                calls.set(calls.get() + 1);
                Ok(value.clone())
            })
            .unwrap();
        }
    }

    #[test]
    fn test_last_handler_wins() {
        let game = Game::new();
        let calls = Rc::new(Cell::new(0));
        chain(
            &game,
            vec![HandlerReturn::Value(1), HandlerReturn::Value(2), HandlerReturn::Value(3)],
            Rc::clone(&calls),
        );

        let result = game.root_context().call_root_event(PING, 0).unwrap().invoke().unwrap();
        assert_eq!(result, Some(3));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_trailing_empty_clears_result() {
        let game = Game::new();
        let calls = Rc::new(Cell::new(0));
        chain(
            &game,
            vec![HandlerReturn::Value(1), HandlerReturn::Empty],
            Rc::clone(&calls),
        );

        let action = game.root_context().call_root_event(PING, 0).unwrap();
        assert_eq!(action.invoke().unwrap(), None);
    }

    #[test]
    fn test_cancel_short_circuits() {
        let game = Game::new();
        let calls = Rc::new(Cell::new(0));
        chain(
            &game,
            vec![
                HandlerReturn::Value(1),
                HandlerReturn::cancel(42),
                HandlerReturn::Value(3),
            ],
            Rc::clone(&calls),
        );

        let result = game.root_context().call_root_event(PING, 0).unwrap().invoke().unwrap();
        assert_eq!(result, Some(42));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_invoke_checked() {
        let game = Game::new();
        let ctx = game.root_context();

        let err = ctx.call_root_event(PING, 0).unwrap().invoke_checked().unwrap_err();
        assert!(matches!(err, RuntimeError::EmptyResult { .. }));

        game.register_handler(PING, |_, x| Ok(HandlerReturn::Value(*x * 2)))
            .unwrap();
        assert_eq!(ctx.call_root_event(PING, 21).unwrap().invoke_checked().unwrap(), 42);
    }

    #[test]
    fn test_handler_error_propagates() {
        let game = Game::new();
        game.register_handler(PING, |_, _| Err(anyhow::anyhow!("boom").into()))
            .unwrap();
        game.register_handler(PING, |_, _| Ok(HandlerReturn::Value(1)))
            .unwrap();

        let err = game.root_context().call_root_event(PING, 0).unwrap().invoke().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_call_handlers_with_foreign_list() {
        let game = Game::new();
        let ctx = game.root_context();
        let registry = crate::EventRegistry::new();
        registry
            .register_handler(PING, |_, x| Ok(HandlerReturn::Value(*x + 1)))
            .unwrap();

        let action = call_handlers(ctx.clone(), PING, registry.handlers(PING).unwrap(), 1);
        assert_eq!(action.handler_count(), 1);
        assert_eq!(action.event(), PING.id());
        assert_eq!(action.invoke().unwrap(), Some(2));
        assert!(ctx.is_alive());
    }
}
