//! Dispatch contexts.
//!
//! Contexts form a tree rooted at the game's root context. Every dispatch
//! runs against one: it decides which patch handlers apply, where
//! interactions are delegated, and which transient objects live for how long.
//! Root, module and server contexts last as long as the game; entity and
//! scoped contexts are disposed at the end of the work that created them.

mod graph;
mod tree;

pub use graph::*;
pub use tree::{ContextKey, ContextKind};

pub(crate) use tree::ContextTree;

use d20_state::{DiceGenerator, RuntimeConfig};
use std::ops::Deref;
use std::rc::Rc;
use tracing::{debug, warn};

use crate::component::{AnyComponent, Component, ComponentNode, ComponentRef};
use crate::entity::Entity;
use crate::event::{Action, EventRegistry, EventToken, HandlerReturn};
use crate::game::{Game, Module};
use crate::interaction::{Interaction, InteractionDelegate};
use crate::{Result, RuntimeError};

/// Handle to a node in the context tree. Cheap to clone.
#[derive(Clone)]
pub struct Context {
    game: Game,
    key: ContextKey,
}

impl Context {
    pub(crate) fn from_key(game: Game, key: ContextKey) -> Self {
        Self { game, key }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn key(&self) -> ContextKey {
        self.key
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.game.config()
    }

    /// The opaque dice collaborator installed on the game.
    pub fn dice_generator(&self) -> Rc<dyn DiceGenerator> {
        self.game.dice_generator()
    }

    /// False once the context has been disposed.
    pub fn is_alive(&self) -> bool {
        self.game.contexts().borrow().contains(self.key)
    }

    pub fn kind(&self) -> Result<ContextKind> {
        Ok(self.game.contexts().borrow().get(self.key)?.kind.clone())
    }

    pub fn parent(&self) -> Result<Option<Context>> {
        let parent = self.game.contexts().borrow().get(self.key)?.parent;
        Ok(parent.map(|key| Context::from_key(self.game.clone(), key)))
    }

    pub fn children(&self) -> Result<Vec<Context>> {
        let children = self.game.contexts().borrow().get(self.key)?.children.clone();
        Ok(children
            .into_iter()
            .map(|key| Context::from_key(self.game.clone(), key))
            .collect())
    }

    /// The entity an entity context is bound to. `None` for every other kind.
    pub fn entity(&self) -> Option<Entity> {
        match self.kind() {
            Ok(ContextKind::Entity(entity)) => Some(entity),
            _ => None,
        }
    }

    fn patches(&self) -> Result<Rc<EventRegistry>> {
        Ok(Rc::clone(&self.game.contexts().borrow().get(self.key)?.patches))
    }

    /// Register a patch handler on this context. Patches run before the
    /// handlers of any entity dispatched from this context or its children.
    pub fn add_patch<A, R, F>(&self, token: EventToken<A, R>, callback: F) -> Result<()>
    where
        A: 'static,
        R: 'static,
        F: Fn(&Context, &A) -> Result<HandlerReturn<R>> + 'static,
    {
        self.patches()?.register_handler(token, callback)
    }

    /// Register a handler on the game's root registry.
    pub fn register_root_handler<A, R, F>(&self, token: EventToken<A, R>, callback: F) -> Result<()>
    where
        A: 'static,
        R: 'static,
        F: Fn(&Context, &A) -> Result<HandlerReturn<R>> + 'static,
    {
        self.game.register_handler(token, callback)
    }

    pub fn register_entity_handler<A, R, F>(
        &self,
        entity: &Entity,
        token: EventToken<A, R>,
        callback: F,
    ) -> Result<()>
    where
        A: 'static,
        R: 'static,
        F: Fn(&Context, &A) -> Result<HandlerReturn<R>> + 'static,
    {
        entity.register_handler(token, callback)
    }

    pub fn register_component_handler<C, A, R, F>(
        &self,
        component: &ComponentRef<C>,
        token: EventToken<A, R>,
        callback: F,
    ) -> Result<()>
    where
        C: Component,
        A: 'static,
        R: 'static,
        F: Fn(&ComponentNode<C>, &Context, &A) -> Result<HandlerReturn<R>> + 'static,
    {
        component.register_handler(token, callback)
    }

    /// Resolve `token` against `entity` and return the pending action.
    ///
    /// The chain is: the parent context's patches, this context's patches,
    /// the entity's own handlers, then each component's handlers in attach
    /// order. Handlers receive a fresh entity context below this one.
    pub fn call_event<A: 'static, R: 'static>(
        &self,
        entity: &Entity,
        token: EventToken<A, R>,
        args: A,
    ) -> Result<Action<A, R>> {
        let (parent_patches, patches) = {
            let tree = self.game.contexts().borrow();
            let node = tree.get(self.key)?;
            let parent_patches = match node.parent {
                Some(parent) => Some(Rc::clone(&tree.get(parent)?.patches)),
                None => None,
            };
            (parent_patches, Rc::clone(&node.patches))
        };

        let mut handlers = Vec::new();
        if let Some(parent_patches) = parent_patches {
            handlers.extend(parent_patches.handlers(token)?);
        }
        handlers.extend(patches.handlers(token)?);
        handlers.extend(entity.handlers(token)?);

        let child = self.spawn_child(ContextKind::Entity(entity.clone()))?;

        debug!(
            event = %token.id(),
            entity = %entity.id(),
            handlers = handlers.len(),
            context = %child.key,
            "resolved event"
        );

        let owns_context = !self.config().retain_dispatch_contexts;
        Ok(Action::new(child, token, handlers, args, owns_context))
    }

    /// Resolve `token` against the game's root handlers only. Handlers
    /// receive this context.
    pub fn call_root_event<A: 'static, R: 'static>(
        &self,
        token: EventToken<A, R>,
        args: A,
    ) -> Result<Action<A, R>> {
        let handlers = self.game.handlers(token)?;

        debug!(
            event = %token.id(),
            handlers = handlers.len(),
            context = %self.key,
            "resolved root event"
        );

        Ok(Action::new(self.clone(), token, handlers, args, false))
    }

    /// Create an entity that lives as long as the game.
    pub fn create_entity(&self) -> Entity {
        self.game.create_entity()
    }

    /// Create an entity tracked only until this context is disposed, or
    /// until it is released explicitly.
    pub fn create_transient_entity(&self) -> Result<Entity> {
        self.game.create_transient_entity_in(self.key)
    }

    /// Attach `component` to `entity` and run its one-time setup.
    pub fn add_component<C: Component>(&self, entity: &Entity, component: C) -> Result<ComponentRef<C>> {
        let node = Rc::new(ComponentNode::new(component));
        node.set_owner(entity);
        let erased: Rc<dyn AnyComponent> = node.clone();
        entity.attach(erased);

        debug!(entity = %entity.id(), component = C::NAME, "component attached");

        C::on_create(&node, self)?;
        Ok(node)
    }

    /// Register a module with the game. Lets a root module install others.
    pub fn register_module<M: Module>(&self, module: M) -> Result<()> {
        self.game.register_module(module)
    }

    /// Spawn a plain child context for one unit of work. The child and its
    /// subtree are disposed when the returned guard drops.
    pub fn create_child_context(&self) -> Result<ScopedContext> {
        Ok(ScopedContext {
            ctx: self.spawn_child(ContextKind::Scoped)?,
        })
    }

    /// Install the delegate that answers interactions for this subtree.
    pub fn set_interaction_delegate<D>(&self, delegate: D) -> Result<()>
    where
        D: InteractionDelegate + 'static,
    {
        self.game.contexts().borrow_mut().get_mut(self.key)?.delegate = Some(Rc::new(delegate));
        Ok(())
    }

    /// Hand `interaction` to the nearest context, starting with this one,
    /// that has a delegate installed.
    pub fn call_interaction(&self, interaction: &Interaction) -> Result<()> {
        let delegate = {
            let tree = self.game.contexts().borrow();
            tree.get(self.key)?;
            tree.ancestry(self.key)
                .into_iter()
                .find_map(|key| tree.get(key).ok().and_then(|node| node.delegate.clone()))
        };

        match delegate {
            Some(delegate) => delegate.present(self, interaction),
            None => Err(RuntimeError::NoInteractionInterface),
        }
    }

    /// Build the value a handler returns to stop its chain.
    pub fn cancel<R>(&self, value: R) -> HandlerReturn<R> {
        HandlerReturn::cancel(value)
    }

    pub(crate) fn spawn_child(&self, kind: ContextKind) -> Result<Context> {
        let key = self.game.contexts().borrow_mut().spawn(self.key, kind)?;
        Ok(Context::from_key(self.game.clone(), key))
    }

    /// Remove this context and its subtree, releasing the transient entities
    /// they created.
    pub(crate) fn dispose(&self) -> Result<()> {
        let released = self.game.contexts().borrow_mut().dispose(self.key)?;
        self.game.release_transient_slots(released);
        Ok(())
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.game.ptr_eq(&other.game)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("key", &self.key).finish()
    }
}

/// A child context that is disposed, with its subtree, when dropped.
pub struct ScopedContext {
    ctx: Context,
}

impl ScopedContext {
    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

impl Deref for ScopedContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.ctx
    }
}

impl Drop for ScopedContext {
    fn drop(&mut self) {
        if !self.ctx.is_alive() {
            return;
        }

        if let Err(err) = self.ctx.dispose() {
            warn!(context = %self.ctx.key, error = %err, "failed to dispose scoped context");
        }
    }
}
