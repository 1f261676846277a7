//! The command entry point.

use d20_state::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

use super::{RpcCall, RpcContext};
use crate::context::Context;
use crate::entity::Entity;
use crate::game::Game;
use crate::interaction::Interaction;
use crate::Result;

/// Runs command chains from a transport against one root entity.
///
/// Each call gets its own child of the server's context, torn down when the
/// call returns. Interactions raised during the call are collected and sent
/// to the user afterwards.
#[derive(Debug)]
pub struct Server {
    context: Context,
    root_entity: Entity,
}

impl Server {
    pub(crate) fn new(context: Context, root_entity: Entity) -> Self {
        Self { context, root_entity }
    }

    pub fn game(&self) -> &Game {
        self.context.game()
    }

    pub fn root_entity(&self) -> &Entity {
        &self.root_entity
    }

    /// The server's own context. Patches added here apply to every call.
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn execute(&self, transport: &mut dyn RpcContext, chain: &[Value]) -> Result<()> {
        let mut rpc = RpcCall::new(transport).bind(self);
        let prompts = Rc::new(RefCell::new(Vec::new()));

        let result = {
            let scope = self.context.create_child_context()?;
            let collected = Rc::clone(&prompts);
            scope.set_interaction_delegate(
                move |_: &Context, interaction: &Interaction| -> Result<()> {
                    collected.borrow_mut().push(interaction.render());
                    Ok(())
                },
            )?;

            debug!(
                entity = %self.root_entity.id(),
                context = %scope.key(),
                user = %rpc.user_id(),
                "executing command chain"
            );
            self.root_entity.execute_rpc(&scope, &mut rpc, chain)
        };

        // A failed flush never masks the dispatch result.
        let mut flush_error = None;
        for prompt in prompts.take() {
            if let Err(err) = rpc.reply_user(&prompt) {
                warn!(
                    entity = %self.root_entity.id(),
                    error = %err,
                    "failed to deliver interaction prompt"
                );
                flush_error.get_or_insert(err);
            }
        }

        match (result, flush_error) {
            (Ok(()), Some(err)) => Err(err),
            (result, _) => result,
        }
    }
}
