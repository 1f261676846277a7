//! Marshal tables.

use d20_state::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

use super::RpcCall;
use crate::context::Context;
use crate::{Result, RuntimeError};

pub type MarshalCallback = dyn Fn(&Context, &mut RpcCall<'_>, &[Value]) -> Result<()>;

struct Marshal {
    name: String,
    /// Lowercased name used for lookup.
    key: String,
    help: String,
    callback: Rc<MarshalCallback>,
}

/// Named commands with help text, matched case-insensitively.
///
/// Names keep insertion order. When two names differ only by case, the one
/// added first wins.
#[derive(Default)]
pub struct MarshalTable {
    marshals: RefCell<Vec<Marshal>>,
}

impl MarshalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command. Adding an existing name again replaces its help and
    /// callback in place.
    pub fn add_marshal<F>(&self, name: impl Into<String>, help: impl Into<String>, callback: F)
    where
        F: Fn(&Context, &mut RpcCall<'_>, &[Value]) -> Result<()> + 'static,
    {
        let name = name.into();
        let marshal = Marshal {
            key: name.to_lowercase(),
            name,
            help: help.into(),
            callback: Rc::new(callback),
        };

        let mut marshals = self.marshals.borrow_mut();
        match marshals.iter_mut().find(|m| m.name == marshal.name) {
            Some(existing) => *existing = marshal,
            None => marshals.push(marshal),
        }
    }

    fn resolve(&self, chain: &[Value]) -> Option<(String, Rc<MarshalCallback>)> {
        let head = chain.first()?.as_str()?.to_lowercase();
        self.marshals
            .borrow()
            .iter()
            .find(|m| m.key == head)
            .map(|m| (m.name.clone(), Rc::clone(&m.callback)))
    }

    /// Whether the chain's head names a command here. Non-string heads
    /// never match.
    pub fn has_marshal(&self, chain: &[Value]) -> bool {
        self.resolve(chain).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.marshals.borrow().iter().map(|m| m.name.clone()).collect()
    }

    pub fn help_lines(&self) -> Vec<String> {
        self.marshals
            .borrow()
            .iter()
            .map(|m| format!("`{}` - {}", m.name, m.help))
            .collect()
    }

    /// Send the help listing to the user. Empty tables send nothing.
    pub fn help(&self, rpc: &mut RpcCall<'_>) -> Result<()> {
        let lines = self.help_lines();
        if lines.is_empty() {
            return Ok(());
        }
        rpc.reply_user(&lines.join("\n"))
    }

    /// Run a chain: help for an empty chain, otherwise the command named by
    /// the head with the rest of the chain as its arguments.
    pub fn execute(&self, ctx: &Context, rpc: &mut RpcCall<'_>, chain: &[Value]) -> Result<()> {
        let Some(head) = chain.first() else {
            return self.help(rpc);
        };

        let Some((name, callback)) = self.resolve(chain) else {
            return Err(RuntimeError::MarshalNotFound {
                name: d20_state::value::render(head),
            });
        };

        debug!(marshal = %name, args = chain.len() - 1, user = %rpc.user_id(), "executing marshal");
        callback(ctx, rpc, &chain[1..])
    }

    pub fn len(&self) -> usize {
        self.marshals.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.marshals.borrow().is_empty()
    }
}

impl fmt::Debug for MarshalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarshalTable").field("names", &self.names()).finish()
    }
}
