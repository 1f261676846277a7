//! Typed events.
//!
//! An event is identified at runtime by an [`EventId`] and at compile time by
//! the argument and return types of its [`EventToken`]. Dispatch happens in
//! two stages: a [`Context`] collects the relevant handlers from the object
//! hierarchy, then an [`Action`] runs them until one cancels or the list is
//! exhausted.

mod action;
mod registry;

pub use action::*;
pub use registry::*;

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::context::Context;
use crate::Result;

/// Runtime identity of an event. Only used for registry keying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(&'static str);

impl EventId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// An event declaration. `A` is the argument type handlers receive and `R`
/// the value they produce.
///
/// ```
/// use d20_runtime::EventToken;
///
/// pub const DAMAGE_TAKEN: EventToken<i64, i64> = EventToken::new("creature.damageTaken");
/// assert_eq!(DAMAGE_TAKEN.id().name(), "creature.damageTaken");
/// ```
pub struct EventToken<A, R> {
    id: EventId,
    _signature: PhantomData<fn(&A) -> R>,
}

impl<A, R> EventToken<A, R> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            id: EventId::new(name),
            _signature: PhantomData,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }
}

impl<A, R> Clone for EventToken<A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, R> Copy for EventToken<A, R> {}

impl<A, R> fmt::Debug for EventToken<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventToken").field(&self.id).finish()
    }
}

/// Wraps the value that ends a handler chain early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCancel<R> {
    pub value: R,
}

impl<R> EventCancel<R> {
    pub fn new(value: R) -> Self {
        Self { value }
    }
}

/// What a handler hands back to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerReturn<R> {
    /// Replaces the running result and continues.
    Value(R),
    /// Clears the running result and continues.
    Empty,
    /// Stops the chain; the wrapped value becomes the result.
    Cancel(EventCancel<R>),
}

impl<R> HandlerReturn<R> {
    pub fn cancel(value: R) -> Self {
        HandlerReturn::Cancel(EventCancel::new(value))
    }

    pub fn is_cancel(&self) -> bool {
        matches!(self, HandlerReturn::Cancel(_))
    }
}

impl<R> From<EventCancel<R>> for HandlerReturn<R> {
    fn from(cancel: EventCancel<R>) -> Self {
        HandlerReturn::Cancel(cancel)
    }
}

pub type HandlerCallback<A, R> = dyn Fn(&Context, &A) -> Result<HandlerReturn<R>>;

/// A stored callback together with its registration order.
pub struct Handler<A, R> {
    callback: Rc<HandlerCallback<A, R>>,
    order: u64,
}

impl<A, R> Handler<A, R> {
    pub(crate) fn new(callback: Rc<HandlerCallback<A, R>>, order: u64) -> Self {
        Self { callback, order }
    }

    /// Position in the owning registry's registration sequence.
    pub fn order(&self) -> u64 {
        self.order
    }

    pub fn call(&self, ctx: &Context, args: &A) -> Result<HandlerReturn<R>> {
        (self.callback)(ctx, args)
    }
}

impl<A, R> Clone for Handler<A, R> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
            order: self.order,
        }
    }
}

impl<A, R> fmt::Debug for Handler<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("order", &self.order).finish()
    }
}
