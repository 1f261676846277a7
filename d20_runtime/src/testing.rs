//! In-memory collaborators for tests and embedders.

use crate::rpc::RpcContext;
use crate::{Result, RuntimeError};

/// An [`RpcContext`] that records every reply.
#[derive(Debug, Clone, Default)]
pub struct RecordingRpcContext {
    user_id: String,
    admin: bool,
    user_reply_failures: usize,
    replies: Vec<String>,
    user_replies: Vec<String>,
}

impl RecordingRpcContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// A caller that passes [`RpcContext::validate_admin`].
    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            admin: true,
            ..Self::new(user_id)
        }
    }

    /// Make the next `count` calls to [`RpcContext::reply_user`] fail, as a
    /// user with closed direct messages would.
    pub fn failing_user_replies(mut self, count: usize) -> Self {
        self.user_reply_failures = count;
        self
    }

    /// Channel replies, oldest first.
    pub fn replies(&self) -> &[String] {
        &self.replies
    }

    /// Direct replies to the user, oldest first.
    pub fn user_replies(&self) -> &[String] {
        &self.user_replies
    }

    pub fn clear(&mut self) {
        self.replies.clear();
        self.user_replies.clear();
    }
}

impl RpcContext for RecordingRpcContext {
    fn reply(&mut self, text: &str) -> Result<()> {
        self.replies.push(text.to_string());
        Ok(())
    }

    fn reply_user(&mut self, text: &str) -> Result<()> {
        if self.user_reply_failures > 0 {
            self.user_reply_failures -= 1;
            return Err(RuntimeError::PermissionDenied(format!(
                "{} does not accept direct messages",
                self.user_id
            )));
        }
        self.user_replies.push(text.to_string());
        Ok(())
    }

    fn user_id(&self) -> String {
        self.user_id.clone()
    }

    fn validate_admin(&mut self) -> Result<()> {
        if self.admin {
            Ok(())
        } else {
            Err(RuntimeError::PermissionDenied(format!(
                "{} is not an administrator",
                self.user_id
            )))
        }
    }
}
