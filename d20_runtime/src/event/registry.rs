//! Handler storage.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{EventId, EventToken, Handler, HandlerReturn};
use crate::context::Context;
use crate::{Result, RuntimeError};

/// Type-erased view of a handler list, so registries can hold lists of
/// different signatures side by side.
trait ErasedHandlerList {
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct HandlerList<A, R> {
    handlers: Vec<Handler<A, R>>,
}

impl<A: 'static, R: 'static> ErasedHandlerList for HandlerList<A, R> {
    fn len(&self) -> usize {
        self.handlers.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Default)]
struct RegistryInner {
    lists: HashMap<EventId, Box<dyn ErasedHandlerList>>,
    next_order: u64,
}

/// Maps event identity to an ordered list of handlers.
///
/// Every entity, component, context and game owns exactly one. Registries
/// are expected to be filled during setup; handlers are snapshotted before
/// they run, so a handler that registers more handlers only affects later
/// dispatches.
#[derive(Default)]
pub struct EventRegistry {
    inner: RefCell<RegistryInner>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `token`. Registration order is preserved and
    /// duplicates are not detected.
    pub fn register_handler<A, R, F>(&self, token: EventToken<A, R>, callback: F) -> Result<()>
    where
        A: 'static,
        R: 'static,
        F: Fn(&Context, &A) -> Result<HandlerReturn<R>> + 'static,
    {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;

        let order = inner.next_order;
        inner.next_order += 1;

        let list = inner.lists.entry(token.id()).or_insert_with(|| {
            Box::new(HandlerList::<A, R> {
                handlers: Vec::new(),
            })
        });

        let list = list
            .as_any_mut()
            .downcast_mut::<HandlerList<A, R>>()
            .ok_or(RuntimeError::SignatureMismatch { event: token.id() })?;

        list.handlers.push(Handler::new(Rc::new(callback), order));
        Ok(())
    }

    /// Snapshot of the handlers for `token`, empty when none are registered.
    pub fn handlers<A: 'static, R: 'static>(
        &self,
        token: EventToken<A, R>,
    ) -> Result<Vec<Handler<A, R>>> {
        let inner = self.inner.borrow();

        match inner.lists.get(&token.id()) {
            None => Ok(Vec::new()),
            Some(list) => list
                .as_any()
                .downcast_ref::<HandlerList<A, R>>()
                .map(|list| list.handlers.clone())
                .ok_or(RuntimeError::SignatureMismatch { event: token.id() }),
        }
    }

    /// Number of handlers registered for `event`, regardless of signature.
    pub fn handler_count(&self, event: EventId) -> usize {
        self.inner
            .borrow()
            .lists
            .get(&event)
            .map_or(0, |list| list.len())
    }

    /// Every event with at least one handler, with its handler count, sorted by id.
    pub fn summary(&self) -> Vec<(EventId, usize)> {
        let inner = self.inner.borrow();
        let mut summary: Vec<_> = inner
            .lists
            .iter()
            .map(|(id, list)| (*id, list.len()))
            .filter(|(_, count)| *count > 0)
            .collect();
        summary.sort();
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().lists.values().all(|list| list.len() == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Game;

    const HIT: EventToken<i64, i64> = EventToken::new("test.hit");
    const HIT_TEXT: EventToken<String, String> = EventToken::new("test.hit");
    const MISS: EventToken<(), bool> = EventToken::new("test.miss");

    #[test]
    fn test_registration_order_preserved() {
        let registry = EventRegistry::new();
        registry
            .register_handler(HIT, |_, x| Ok(HandlerReturn::Value(*x + 1)))
            .unwrap();
        registry
            .register_handler(HIT, |_, x| Ok(HandlerReturn::Value(*x + 2)))
            .unwrap();

        let game = Game::new();
        let ctx = game.root_context();
        let handlers = registry.handlers(HIT).unwrap();

        assert_eq!(handlers.len(), 2);
        assert!(handlers[0].order() < handlers[1].order());
        assert_eq!(handlers[0].call(&ctx, &10).unwrap(), HandlerReturn::Value(11));
        assert_eq!(handlers[1].call(&ctx, &10).unwrap(), HandlerReturn::Value(12));
    }

    #[test]
    fn test_unknown_event_is_empty() {
        let registry = EventRegistry::new();
        assert!(registry.handlers(MISS).unwrap().is_empty());
        assert!(registry.is_empty());
        assert_eq!(registry.handler_count(MISS.id()), 0);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let registry = EventRegistry::new();
        registry
            .register_handler(MISS, |_, _| Ok(HandlerReturn::Empty))
            .unwrap();

        let snapshot = registry.handlers(MISS).unwrap();
        registry
            .register_handler(MISS, |_, _| Ok(HandlerReturn::Empty))
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.handlers(MISS).unwrap().len(), 2);
    }

    #[test]
    fn test_signature_mismatch() {
        let registry = EventRegistry::new();
        registry
            .register_handler(HIT, |_, x| Ok(HandlerReturn::Value(*x)))
            .unwrap();

        let err = registry
            .register_handler(HIT_TEXT, |_, s| Ok(HandlerReturn::Value(s.clone())))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::SignatureMismatch { .. }));
        assert!(registry.handlers(HIT_TEXT).is_err());
    }

    #[test]
    fn test_summary() {
        let registry = EventRegistry::new();
        registry
            .register_handler(MISS, |_, _| Ok(HandlerReturn::Empty))
            .unwrap();
        registry
            .register_handler(HIT, |_, _| Ok(HandlerReturn::Empty))
            .unwrap();
        registry
            .register_handler(HIT, |_, _| Ok(HandlerReturn::Empty))
            .unwrap();

        assert_eq!(
            registry.summary(),
            vec![(HIT.id(), 2), (MISS.id(), 1)]
        );
    }
}
