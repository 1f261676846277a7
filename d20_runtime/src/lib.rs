//! # d20 Runtime
//!
//! The object and event runtime that rules content is written against.
//! Entities gain behavior by attaching components; components register
//! typed event handlers and named commands; every dispatch runs inside a
//! context tree that scopes patches, interactions and transient objects.
//!
//! ## Core Pieces
//!
//! - **game**: owner of entities, modules, root handlers and the context tree
//! - **context**: dispatch scopes, patches, interaction delegation
//! - **event**: typed tokens, handler registries and deferred actions
//! - **entity** / **component**: the object model and its persistence
//! - **rpc**: case-insensitive command tables, aliasing, help and the server
//!
//! ## Dispatch Order
//!
//! For `ctx.call_event(&entity, token, args)` handlers run in this order:
//! the parent context's patches, the context's own patches, the entity's
//! handlers, then each component's handlers in attach order. A handler that
//! returns a value replaces the running result; one that cancels stops the
//! chain with its value.

pub mod component;
pub mod context;
pub mod entity;
pub mod error;
pub mod event;
pub mod game;
pub mod interaction;
pub mod rpc;
pub mod testing;

pub use component::*;
pub use context::*;
pub use entity::Entity;
pub use error::*;
pub use event::*;
pub use game::*;
pub use interaction::*;
pub use rpc::*;

pub use d20_state;
