//! Components: behavior plus serializable state, attached to an entity.

use d20_state::{StateError, StatefulObject, Value};
use std::any::Any;
use std::cell::{OnceCell, Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

use crate::context::Context;
use crate::entity::{Entity, EntityInner};
use crate::event::{EventRegistry, EventToken, Handler, HandlerReturn};
use crate::rpc::{MarshalTable, RpcCall, RpcTarget};
use crate::Result;

/// A kind of component.
///
/// `on_create` runs once, right after the component is attached; it is where
/// handlers and marshals get registered.
pub trait Component: Sized + 'static {
    /// Stable name used in save bundles and help output.
    const NAME: &'static str;

    type State: StatefulObject;

    fn on_create(this: &ComponentRef<Self>, ctx: &Context) -> Result<()> {
        let _ = (this, ctx);
        Ok(())
    }
}

pub type ComponentRef<C> = Rc<ComponentNode<C>>;

/// An attached component: the behavior value, its state and its registries.
pub struct ComponentNode<C: Component> {
    behavior: C,
    state: RefCell<C::State>,
    owner: OnceCell<Weak<EntityInner>>,
    events: EventRegistry,
    marshals: MarshalTable,
}

impl<C: Component> ComponentNode<C> {
    pub(crate) fn new(behavior: C) -> Self {
        Self {
            behavior,
            state: RefCell::new(C::State::default()),
            owner: OnceCell::new(),
            events: EventRegistry::new(),
            marshals: MarshalTable::new(),
        }
    }

    pub fn behavior(&self) -> &C {
        &self.behavior
    }

    /// Borrow the current state. Do not hold the guard across a dispatch
    /// that may update it.
    pub fn state(&self) -> Ref<'_, C::State> {
        self.state.borrow()
    }

    /// Mutate the state in place.
    pub fn set_state<T>(&self, ctx: &Context, update: impl FnOnce(&mut C::State) -> T) -> T {
        trace!(component = C::NAME, context = %ctx.key(), "state updated");
        update(&mut *self.state.borrow_mut())
    }

    /// The entity this component is attached to, while it is alive.
    pub fn owner(&self) -> Option<Entity> {
        self.owner.get()?.upgrade().map(Entity::from_inner)
    }

    pub(crate) fn set_owner(&self, entity: &Entity) {
        let _ = self.owner.set(entity.downgrade());
    }

    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    pub fn marshals(&self) -> &MarshalTable {
        &self.marshals
    }

    /// Register a handler that receives this component.
    pub fn register_handler<A, R, F>(self: &Rc<Self>, token: EventToken<A, R>, callback: F) -> Result<()>
    where
        A: 'static,
        R: 'static,
        F: Fn(&ComponentNode<C>, &Context, &A) -> Result<HandlerReturn<R>> + 'static,
    {
        let weak = Rc::downgrade(self);
        self.events.register_handler(token, move |ctx, args| match weak.upgrade() {
            Some(this) => callback(&this, ctx, args),
            None => Ok(HandlerReturn::Empty),
        })
    }

    pub fn handlers<A: 'static, R: 'static>(&self, token: EventToken<A, R>) -> Result<Vec<Handler<A, R>>> {
        self.events.handlers(token)
    }

    /// Register a command that receives this component.
    pub fn add_rpc_marshal<F>(self: &Rc<Self>, name: impl Into<String>, help: impl Into<String>, callback: F)
    where
        F: Fn(&ComponentNode<C>, &Context, &mut RpcCall<'_>, &[Value]) -> Result<()> + 'static,
    {
        let weak = Rc::downgrade(self);
        self.marshals.add_marshal(name, help, move |ctx, rpc, chain| match weak.upgrade() {
            Some(this) => callback(&this, ctx, rpc, chain),
            None => Ok(()),
        });
    }

    /// Register `name` as shorthand for `target` on this component's own
    /// table, followed by the alias's arguments.
    pub fn add_rpc_alias(self: &Rc<Self>, name: impl Into<String>, help: impl Into<String>, target: Vec<Value>) {
        let weak = Rc::downgrade(self);
        self.marshals.add_marshal(name, help, move |ctx, rpc, chain| {
            let Some(this) = weak.upgrade() else {
                return Ok(());
            };
            let mut forwarded = target.clone();
            forwarded.extend_from_slice(chain);
            rpc.chain_rpc(ctx, &*this, &forwarded)
        });
    }

    pub fn has_rpc_marshal(&self, chain: &[Value]) -> bool {
        self.marshals.has_marshal(chain)
    }

    pub fn execute_rpc(&self, ctx: &Context, rpc: &mut RpcCall<'_>, chain: &[Value]) -> Result<()> {
        self.marshals.execute(ctx, rpc, chain)
    }
}

impl<C: Component> RpcTarget for ComponentNode<C> {
    fn execute_rpc(&self, ctx: &Context, rpc: &mut RpcCall<'_>, chain: &[Value]) -> Result<()> {
        ComponentNode::execute_rpc(self, ctx, rpc, chain)
    }

    fn has_rpc_marshal(&self, chain: &[Value]) -> bool {
        ComponentNode::has_rpc_marshal(self, chain)
    }
}

impl<C: Component> fmt::Debug for ComponentNode<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentNode")
            .field("name", &C::NAME)
            .field("marshals", &self.marshals.names())
            .finish()
    }
}

/// Type-erased view of an attached component, used by entities to walk
/// their components without knowing their types.
pub trait AnyComponent {
    fn name(&self) -> &'static str;

    fn events(&self) -> &EventRegistry;

    fn marshals(&self) -> &MarshalTable;

    fn save_state(&self) -> Result<Value, StateError>;

    /// Decode a blob without applying it.
    fn decode_state(&self, data: &Value) -> Result<Box<dyn Any>, StateError>;

    /// Apply a value produced by [`AnyComponent::decode_state`].
    fn commit_state(&self, state: Box<dyn Any>);

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<C: Component> AnyComponent for ComponentNode<C> {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn events(&self) -> &EventRegistry {
        &self.events
    }

    fn marshals(&self) -> &MarshalTable {
        &self.marshals
    }

    fn save_state(&self) -> Result<Value, StateError> {
        self.state.borrow().save()
    }

    fn decode_state(&self, data: &Value) -> Result<Box<dyn Any>, StateError> {
        Ok(Box::new(C::State::load(data)?))
    }

    fn commit_state(&self, state: Box<dyn Any>) {
        if let Ok(state) = state.downcast::<C::State>() {
            *self.state.borrow_mut() = *state;
        }
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRpcContext;
    use crate::Game;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    const GREET: EventToken<String, String> = EventToken::new("test.greet");

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    #[serde(default)]
    struct Greeting {
        greeting: String,
    }

    impl StatefulObject for Greeting {
        const NAME: &'static str = "Greeting";
    }

    struct Greeter {
        punctuation: char,
    }

    impl Component for Greeter {
        const NAME: &'static str = "Greeter";
        type State = Greeting;

        fn on_create(this: &ComponentRef<Self>, ctx: &Context) -> Result<()> {
            this.set_state(ctx, |state| state.greeting = "Hello".into());
            this.register_handler(GREET, |this, _, name| {
                let greeting = format!("{}, {}{}", this.state().greeting, name, this.behavior().punctuation);
                Ok(HandlerReturn::Value(greeting))
            })?;
            this.add_rpc_marshal("greet", "Greet someone", |this, ctx, rpc, chain| {
                let name = chain.first().map(d20_state::value::render).unwrap_or_default();
                let entity = this.owner().ok_or(crate::RuntimeError::StaleContext)?;
                let greeting = ctx.call_event(&entity, GREET, name)?.invoke()?.unwrap_or_default();
                rpc.reply(&greeting)
            });
            this.add_rpc_alias("hi", "Greet the world", vec![json!("greet"), json!("world")]);
            Ok(())
        }
    }

    struct Silent;

    impl Component for Silent {
        const NAME: &'static str = "Silent";
        type State = d20_state::NoState;
    }

    #[test]
    fn test_on_create_and_handler() {
        let game = Game::new();
        let ctx = game.root_context();
        let entity = ctx.create_entity();
        let greeter = ctx.add_component(&entity, Greeter { punctuation: '!' }).unwrap();

        assert_eq!(greeter.state().greeting, "Hello");
        let result = ctx
            .call_event(&entity, GREET, "Ada".to_string())
            .unwrap()
            .invoke()
            .unwrap();
        assert_eq!(result.as_deref(), Some("Hello, Ada!"));
    }

    #[test]
    fn test_component_marshal_and_alias() {
        let game = Game::new();
        let ctx = game.root_context();
        let entity = ctx.create_entity();
        let greeter = ctx.add_component(&entity, Greeter { punctuation: '.' }).unwrap();

        let mut transport = RecordingRpcContext::new("user");
        let mut rpc = RpcCall::new(&mut transport);
        greeter.execute_rpc(&ctx, &mut rpc, &[json!("GREET"), json!("Bob")]).unwrap();
        greeter.execute_rpc(&ctx, &mut rpc, &[json!("hi")]).unwrap();

        assert_eq!(transport.replies(), vec!["Hello, Bob.", "Hello, world."]);
    }

    #[test]
    fn test_default_on_create_registers_nothing() {
        let game = Game::new();
        let ctx = game.root_context();
        let entity = ctx.create_entity();
        let silent = ctx.add_component(&entity, Silent).unwrap();

        assert!(silent.events().is_empty());
        assert!(silent.marshals().is_empty());
        assert!(!silent.has_rpc_marshal(&[json!("anything")]));
    }

    #[test]
    fn test_decode_does_not_apply() {
        let game = Game::new();
        let ctx = game.root_context();
        let entity = ctx.create_entity();
        let greeter = ctx.add_component(&entity, Greeter { punctuation: '!' }).unwrap();

        let staged = greeter.decode_state(&json!({ "greeting": "Hey" })).unwrap();
        assert_eq!(greeter.state().greeting, "Hello");

        greeter.commit_state(staged);
        assert_eq!(greeter.state().greeting, "Hey");
        assert_eq!(greeter.save_state().unwrap(), json!({ "greeting": "Hey" }));
    }
}
