//! Entities: identities that gain behavior from the components they own.

use d20_state::{ComponentBlob, EntityId, SaveBundle, StateError, Value};
use generational_arena::Index;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

use crate::component::{AnyComponent, Component, ComponentNode, ComponentRef};
use crate::context::Context;
use crate::event::{EventRegistry, EventToken, Handler, HandlerReturn};
use crate::rpc::{MarshalTable, RpcCall, RpcTarget};
use crate::{Result, RuntimeError};

pub(crate) struct EntityInner {
    id: EntityId,
    transient_slot: Option<Index>,
    events: EventRegistry,
    marshals: MarshalTable,
    /// Append-only, in attach order.
    components: RefCell<Vec<Rc<dyn AnyComponent>>>,
}

/// Shared handle to an entity. Cloning is cheap and every clone refers to
/// the same entity.
#[derive(Clone)]
pub struct Entity {
    inner: Rc<EntityInner>,
}

impl Entity {
    pub(crate) fn new(transient_slot: Option<Index>) -> Self {
        Self {
            inner: Rc::new(EntityInner {
                id: EntityId::new(),
                transient_slot,
                events: EventRegistry::new(),
                marshals: MarshalTable::new(),
                components: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<EntityInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<EntityInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn transient_slot(&self) -> Option<Index> {
        self.inner.transient_slot
    }

    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    /// The entity's own handler registry.
    pub fn events(&self) -> &EventRegistry {
        &self.inner.events
    }

    /// The entity's own marshal table.
    pub fn marshals(&self) -> &MarshalTable {
        &self.inner.marshals
    }

    /// Register a handler on the entity itself. Prefer
    /// [`Context::register_entity_handler`] from module code.
    pub fn register_handler<A, R, F>(&self, token: EventToken<A, R>, callback: F) -> Result<()>
    where
        A: 'static,
        R: 'static,
        F: Fn(&Context, &A) -> Result<HandlerReturn<R>> + 'static,
    {
        self.inner.events.register_handler(token, callback)
    }

    /// The entity's own handlers for `token`, followed by each component's
    /// handlers in attach order.
    pub fn handlers<A: 'static, R: 'static>(&self, token: EventToken<A, R>) -> Result<Vec<Handler<A, R>>> {
        let mut handlers = self.inner.events.handlers(token)?;
        for component in self.components() {
            handlers.extend(component.events().handlers(token)?);
        }
        Ok(handlers)
    }

    pub(crate) fn attach(&self, component: Rc<dyn AnyComponent>) {
        self.inner.components.borrow_mut().push(component);
    }

    /// Snapshot of the attached components, in attach order.
    pub fn components(&self) -> Vec<Rc<dyn AnyComponent>> {
        self.inner.components.borrow().clone()
    }

    pub fn component_count(&self) -> usize {
        self.inner.components.borrow().len()
    }

    pub fn component_names(&self) -> Vec<&'static str> {
        self.inner.components.borrow().iter().map(|c| c.name()).collect()
    }

    /// The first attached component of type `C`.
    pub fn component<C: Component>(&self) -> Option<ComponentRef<C>> {
        self.components()
            .into_iter()
            .find_map(|component| component.into_any().downcast::<ComponentNode<C>>().ok())
    }

    pub fn add_rpc_marshal<F>(&self, name: impl Into<String>, help: impl Into<String>, callback: F)
    where
        F: Fn(&Context, &mut RpcCall<'_>, &[Value]) -> Result<()> + 'static,
    {
        self.inner.marshals.add_marshal(name, help, callback);
    }

    /// Register `name` as shorthand for `target` followed by whatever
    /// arguments the alias is invoked with.
    pub fn add_rpc_alias(&self, name: impl Into<String>, help: impl Into<String>, target: Vec<Value>) {
        let weak = self.downgrade();
        self.inner.marshals.add_marshal(name, help, move |ctx, rpc, chain| {
            let Some(inner) = weak.upgrade() else {
                return Ok(());
            };
            let entity = Entity::from_inner(inner);
            let mut forwarded = target.clone();
            forwarded.extend_from_slice(chain);
            rpc.chain_rpc(ctx, &entity, &forwarded)
        });
    }

    /// Whether the entity or any component recognizes the chain's head.
    pub fn has_rpc_marshal(&self, chain: &[Value]) -> bool {
        self.inner.marshals.has_marshal(chain)
            || self.components().iter().any(|c| c.marshals().has_marshal(chain))
    }

    /// Run a command chain against this entity.
    ///
    /// An empty chain prints help for the entity and then for each component.
    /// Otherwise the entity's own table is tried first, then each component
    /// in attach order; the first table that recognizes the head handles it.
    pub fn execute_rpc(&self, ctx: &Context, rpc: &mut RpcCall<'_>, chain: &[Value]) -> Result<()> {
        if chain.is_empty() {
            return self.help(rpc);
        }

        if self.inner.marshals.has_marshal(chain) {
            return self.inner.marshals.execute(ctx, rpc, chain);
        }

        for component in self.components() {
            if component.marshals().has_marshal(chain) {
                return component.marshals().execute(ctx, rpc, chain);
            }
        }

        Err(RuntimeError::MarshalNotFound {
            name: d20_state::value::render(&chain[0]),
        })
    }

    /// Send help for the entity's table and every component's table. A
    /// failed delivery does not stop the remaining tables; the first error is
    /// returned once all have been tried.
    fn help(&self, rpc: &mut RpcCall<'_>) -> Result<()> {
        let mut first_error = None;

        let mut deliver = |result: Result<()>| {
            if let Err(err) = result {
                warn!(entity = %self.id(), error = %err, "failed to deliver help");
                first_error.get_or_insert(err);
            }
        };

        deliver(self.inner.marshals.help(rpc));
        for component in self.components() {
            deliver(component.marshals().help(rpc));
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Serialize every component's state into a version-stamped bundle.
    pub fn save(&self) -> Result<SaveBundle> {
        let components = self
            .components()
            .iter()
            .map(|component| {
                Ok(ComponentBlob {
                    name: component.name().to_string(),
                    data: component.save_state()?,
                })
            })
            .collect::<Result<Vec<_>, StateError>>()?;

        Ok(SaveBundle::new(self.id(), components))
    }

    /// Restore component state from a bundle.
    ///
    /// The version stamp is checked and every blob decoded before anything is
    /// written, so a failed load leaves the entity untouched.
    pub fn load(&self, bundle: &SaveBundle) -> Result<()> {
        bundle.verify_version()?;

        let components = self.components();
        if components.len() != bundle.components.len() {
            return Err(StateError::ComponentMismatch {
                expected: format!("{} components", components.len()),
                found: format!("{} components", bundle.components.len()),
            }
            .into());
        }

        let mut staged = Vec::with_capacity(components.len());
        for (component, blob) in components.iter().zip(&bundle.components) {
            if component.name() != blob.name {
                return Err(StateError::ComponentMismatch {
                    expected: component.name().to_string(),
                    found: blob.name.clone(),
                }
                .into());
            }
            staged.push(component.decode_state(&blob.data)?);
        }

        for (component, state) in components.iter().zip(staged) {
            component.commit_state(state);
        }

        debug!(entity = %self.id(), components = components.len(), "entity loaded");
        Ok(())
    }

    pub fn ptr_eq(&self, other: &Entity) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl RpcTarget for Entity {
    fn execute_rpc(&self, ctx: &Context, rpc: &mut RpcCall<'_>, chain: &[Value]) -> Result<()> {
        Entity::execute_rpc(self, ctx, rpc, chain)
    }

    fn has_rpc_marshal(&self, chain: &[Value]) -> bool {
        Entity::has_rpc_marshal(self, chain)
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Entity {}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.inner.id)
            .field("components", &self.component_names())
            .finish()
    }
}
