//! Interactions: prompts that ask the user to pick one of a set of commands.

use d20_state::Value;
use std::fmt;

use crate::context::Context;
use crate::rpc::{MarshalTable, RpcCall, RpcTarget};
use crate::Result;

/// Receives interactions raised below the context it is installed on.
pub trait InteractionDelegate {
    fn present(&self, ctx: &Context, interaction: &Interaction) -> Result<()>;
}

impl<F> InteractionDelegate for F
where
    F: Fn(&Context, &Interaction) -> Result<()>,
{
    fn present(&self, ctx: &Context, interaction: &Interaction) -> Result<()> {
        self(ctx, interaction)
    }
}

/// A prompt plus the commands that answer it.
pub struct Interaction {
    prompt: String,
    options: MarshalTable,
}

impl Interaction {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            options: MarshalTable::new(),
        }
    }

    /// Builder-style [`Interaction::add_option`].
    pub fn with_option<F>(self, name: impl Into<String>, help: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Context, &mut RpcCall<'_>, &[Value]) -> Result<()> + 'static,
    {
        self.add_option(name, help, callback);
        self
    }

    pub fn add_option<F>(&self, name: impl Into<String>, help: impl Into<String>, callback: F)
    where
        F: Fn(&Context, &mut RpcCall<'_>, &[Value]) -> Result<()> + 'static,
    {
        self.options.add_marshal(name, help, callback);
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn options(&self) -> &MarshalTable {
        &self.options
    }

    /// The prompt followed by one line per option.
    pub fn render(&self) -> String {
        let mut lines = vec![self.prompt.clone()];
        lines.extend(self.options.help_lines());
        lines.join("\n")
    }
}

impl RpcTarget for Interaction {
    fn execute_rpc(&self, ctx: &Context, rpc: &mut RpcCall<'_>, chain: &[Value]) -> Result<()> {
        self.options.execute(ctx, rpc, chain)
    }

    fn has_rpc_marshal(&self, chain: &[Value]) -> bool {
        self.options.has_marshal(chain)
    }
}

impl fmt::Debug for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interaction")
            .field("prompt", &self.prompt)
            .field("options", &self.options.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRpcContext;
    use crate::{Game, RuntimeError};
    use serde_json::json;

    fn choice() -> Interaction {
        Interaction::new("Pick a door")
            .with_option("left", "The left door", |_, rpc, _| rpc.reply("left"))
            .with_option("right", "The right door", |_, rpc, _| rpc.reply("right"))
    }

    #[test]
    fn test_render() {
        assert_eq!(
            choice().render(),
            "Pick a door\n`left` - The left door\n`right` - The right door"
        );
    }

    #[test]
    fn test_answer_option() {
        let game = Game::new();
        let ctx = game.root_context();
        let interaction = choice();

        let mut transport = RecordingRpcContext::new("user");
        let mut rpc = RpcCall::new(&mut transport);
        interaction.execute_rpc(&ctx, &mut rpc, &[json!("Right")]).unwrap();

        assert_eq!(transport.replies(), vec!["right"]);
        assert!(!interaction.has_rpc_marshal(&[json!("up")]));
    }

    #[test]
    fn test_no_delegate() {
        let game = Game::new();
        let ctx = game.root_context();

        let err = ctx.call_interaction(&choice()).unwrap_err();
        assert!(matches!(err, RuntimeError::NoInteractionInterface));
    }
}
