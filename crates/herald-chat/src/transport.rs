//! The transport trait the runtime consumes, plus inbound event shapes.

use anyhow::Result;
use async_trait::async_trait;

use crate::action::TaskAction;

/// Reference to a delivered message, sufficient to edit it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub channel: String,
    pub id: String,
}

/// One inline button attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineControl {
    pub label: String,
    pub action: TaskAction,
}

impl InlineControl {
    pub fn new(label: impl Into<String>, action: TaskAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Inbound chat activity relevant to the action coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// An inline button was pressed; the payload already passed boundary
    /// validation.
    ActionInvoked {
        actor_chat_id: String,
        message: MessageRef,
        action: TaskAction,
    },
    /// A free-text message arrived; only meaningful while the actor has an
    /// open comment dialog.
    ReplyReceived { actor_chat_id: String, text: String },
}

/// Outbound chat operations. One implementation per chat backend; the
/// runtime never sees wire shapes.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Delivers a message to the configured channel, with optional inline
    /// controls, returning a reference usable for later edits.
    async fn send_message(&self, text: &str, controls: &[InlineControl]) -> Result<MessageRef>;

    /// Replaces the body of a previously delivered message.
    async fn edit_message(&self, message: &MessageRef, text: &str) -> Result<()>;

    /// Plain notice without controls (errors, dialog prompts, reminders).
    async fn send_notice(&self, text: &str) -> Result<()>;
}
