//! Arena storage for the context tree.

use generational_arena::{Arena, Index};
use std::fmt;
use std::rc::Rc;

use crate::entity::Entity;
use crate::event::EventRegistry;
use crate::interaction::InteractionDelegate;
use crate::{Result, RuntimeError};

/// Generation-tagged handle to a context slot. A key whose slot was freed
/// never resolves again, even if the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey(pub(crate) Index);

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (index, generation) = self.0.into_raw_parts();
        write!(f, "{index}v{generation}")
    }
}

/// What a context was created for.
#[derive(Debug, Clone)]
pub enum ContextKind {
    /// The game's root context.
    Root,
    /// Handed to a module at registration; lives as long as the game.
    Module(String),
    /// Dedicated context of an RPC server; lives as long as the game.
    Server,
    /// Spawned by event dispatch and bound to the target entity.
    Entity(Entity),
    /// One unit of work, disposed when its scope ends.
    Scoped,
}

impl ContextKind {
    /// Whether the context is disposed at the end of the work that created it.
    pub fn is_transient(&self) -> bool {
        matches!(self, ContextKind::Entity(_) | ContextKind::Scoped)
    }

    pub fn label(&self) -> String {
        match self {
            ContextKind::Root => "root".to_string(),
            ContextKind::Module(name) => format!("module {name}"),
            ContextKind::Server => "server".to_string(),
            ContextKind::Entity(entity) => format!("entity {}", entity.id()),
            ContextKind::Scoped => "scoped".to_string(),
        }
    }
}

pub(crate) struct ContextNode {
    pub kind: ContextKind,
    pub parent: Option<ContextKey>,
    pub children: Vec<ContextKey>,
    pub patches: Rc<EventRegistry>,
    pub delegate: Option<Rc<dyn InteractionDelegate>>,
    /// Transient entities released when this context is disposed.
    pub transients: Vec<Index>,
}

impl ContextNode {
    fn new(kind: ContextKind, parent: Option<ContextKey>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            patches: Rc::new(EventRegistry::new()),
            delegate: None,
            transients: Vec::new(),
        }
    }
}

pub(crate) struct ContextTree {
    nodes: Arena<ContextNode>,
}

impl ContextTree {
    /// Create a tree holding only a root node.
    pub fn with_root() -> (Self, ContextKey) {
        let mut nodes = Arena::new();
        let root = ContextKey(nodes.insert(ContextNode::new(ContextKind::Root, None)));
        (Self { nodes }, root)
    }

    pub fn contains(&self, key: ContextKey) -> bool {
        self.nodes.contains(key.0)
    }

    pub fn get(&self, key: ContextKey) -> Result<&ContextNode> {
        self.nodes.get(key.0).ok_or(RuntimeError::StaleContext)
    }

    pub fn get_mut(&mut self, key: ContextKey) -> Result<&mut ContextNode> {
        self.nodes.get_mut(key.0).ok_or(RuntimeError::StaleContext)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Add a child below `parent`.
    pub fn spawn(&mut self, parent: ContextKey, kind: ContextKind) -> Result<ContextKey> {
        if !self.contains(parent) {
            return Err(RuntimeError::StaleContext);
        }

        let key = ContextKey(self.nodes.insert(ContextNode::new(kind, Some(parent))));
        self.get_mut(parent)?.children.push(key);
        Ok(key)
    }

    /// Remove `key` and its whole subtree, detaching it from its parent.
    ///
    /// Returns the transient entities the removed contexts owned.
    pub fn dispose(&mut self, key: ContextKey) -> Result<Vec<Index>> {
        let parent = self.get(key)?.parent;

        if let Some(parent) = parent {
            if let Ok(parent) = self.get_mut(parent) {
                parent.children.retain(|child| *child != key);
            }
        }

        let mut released = Vec::new();
        let mut pending = vec![key];

        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(next.0) {
                pending.extend(node.children);
                released.extend(node.transients);
            }
        }

        Ok(released)
    }

    /// Walk from `key` up to the root, yielding each key on the way.
    pub fn ancestry(&self, key: ContextKey) -> Vec<ContextKey> {
        let mut chain = Vec::new();
        let mut cursor = Some(key);

        while let Some(current) = cursor {
            match self.nodes.get(current.0) {
                Some(node) => {
                    chain.push(current);
                    cursor = node.parent;
                }
                None => break,
            }
        }

        chain
    }
}
