//! Command routing.
//!
//! A command chain is a list of JSON values whose head names a marshal.
//! Entities, components and interactions each own a [`MarshalTable`]; a
//! [`Server`] is the entry point that transports call with a chain and an
//! [`RpcContext`] of their own.

mod router;
mod server;

pub use router::*;
pub use server::*;

use d20_state::{RuntimeConfig, Value};
use tracing::trace;

use crate::context::Context;
use crate::game::Game;
use crate::{Result, RuntimeError};

/// Transport-side collaborator. Delivery and permission policy are up to the
/// implementor.
pub trait RpcContext {
    /// Reply in the channel the command came from.
    fn reply(&mut self, text: &str) -> Result<()>;

    /// Reply to the user directly.
    fn reply_user(&mut self, text: &str) -> Result<()>;

    fn user_id(&self) -> String;

    /// Fail unless the caller is an administrator.
    fn validate_admin(&mut self) -> Result<()>;
}

/// Anything a command chain can be executed against.
pub trait RpcTarget {
    fn execute_rpc(&self, ctx: &Context, rpc: &mut RpcCall<'_>, chain: &[Value]) -> Result<()>;

    fn has_rpc_marshal(&self, chain: &[Value]) -> bool;
}

/// One command execution: the transport plus what the runtime binds to it.
pub struct RpcCall<'a> {
    transport: &'a mut dyn RpcContext,
    game: Option<Game>,
    server: Option<&'a Server>,
    depth: usize,
    max_depth: usize,
}

impl<'a> RpcCall<'a> {
    /// An unbound call, for driving targets directly.
    pub fn new(transport: &'a mut dyn RpcContext) -> Self {
        Self {
            transport,
            game: None,
            server: None,
            depth: 0,
            max_depth: RuntimeConfig::default().max_rpc_depth,
        }
    }

    pub(crate) fn bind(mut self, server: &'a Server) -> Self {
        let game = server.game().clone();
        self.max_depth = game.config().max_rpc_depth;
        self.game = Some(game);
        self.server = Some(server);
        self
    }

    /// The game of the server handling this call.
    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn server(&self) -> Option<&'a Server> {
        self.server
    }

    pub fn reply(&mut self, text: &str) -> Result<()> {
        self.transport.reply(text)
    }

    pub fn reply_user(&mut self, text: &str) -> Result<()> {
        self.transport.reply_user(text)
    }

    pub fn user_id(&self) -> String {
        self.transport.user_id()
    }

    pub fn validate_admin(&mut self) -> Result<()> {
        self.transport.validate_admin()
    }

    /// Current forwarding depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Forward `chain` into another target, as aliases and parent entities do.
    pub fn chain_rpc(&mut self, ctx: &Context, target: &dyn RpcTarget, chain: &[Value]) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(RuntimeError::ChainTooDeep { depth: self.depth });
        }

        trace!(depth = self.depth, "forwarding command chain");
        self.depth += 1;
        let result = target.execute_rpc(ctx, self, chain);
        self.depth -= 1;
        result
    }
}
