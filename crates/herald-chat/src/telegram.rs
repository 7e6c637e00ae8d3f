//! Telegram Bot API implementation of the chat transport.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::action::TaskAction;
use crate::transport::{ChatEvent, ChatTransport, InlineControl, MessageRef};

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct TelegramEnvelope<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct TgUser {
    id: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct TgMessage {
    message_id: i64,
    chat: TgChat,
    #[serde(default)]
    from: Option<TgUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TgCallbackQuery {
    id: String,
    from: TgUser,
    #[serde(default)]
    message: Option<TgMessage>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TgUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
    #[serde(default)]
    callback_query: Option<TgCallbackQuery>,
}

pub struct TelegramTransport {
    http: reqwest::Client,
    api_base: String,
    token: String,
    channel_id: String,
    poll_timeout_s: u64,
}

impl TelegramTransport {
    pub fn new(
        api_base: String,
        token: String,
        channel_id: String,
        request_timeout_ms: u64,
        poll_timeout_s: u64,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            // The long poll holds the connection open for poll_timeout_s.
            .timeout(Duration::from_millis(
                request_timeout_ms.max(1) + poll_timeout_s.saturating_mul(1_000),
            ))
            .build()
            .context("failed to create telegram client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            channel_id,
            poll_timeout_s,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> Result<T> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            .with_context(|| format!("telegram {method} request failed"))?;
        let status = response.status();
        let envelope: TelegramEnvelope<T> = response
            .json()
            .await
            .with_context(|| format!("telegram {method} returned unparsable body (status {status})"))?;
        if !envelope.ok {
            bail!(
                "telegram {method} failed: {}",
                envelope
                    .description
                    .unwrap_or_else(|| format!("status {status}"))
            );
        }
        envelope
            .result
            .ok_or_else(|| anyhow!("telegram {method} returned ok without a result"))
    }

    /// Long-polls for updates, translating them into validated chat events.
    /// Returns the events plus the offset to use for the next poll.
    pub async fn poll_events(&self, offset: i64) -> Result<(Vec<ChatEvent>, i64)> {
        let payload = json!({
            "offset": offset,
            "timeout": self.poll_timeout_s,
            "allowed_updates": ["message", "callback_query"],
        });
        let updates: Vec<TgUpdate> = self.call("getUpdates", &payload).await?;
        let mut next_offset = offset;
        let mut events = Vec::new();
        for update in updates {
            next_offset = next_offset.max(update.update_id + 1);
            if let Some(callback) = update.callback_query {
                self.acknowledge_callback(&callback.id).await;
                let Some(message) = callback.message else {
                    warn!(callback_id = %callback.id, "callback without originating message");
                    continue;
                };
                let raw = callback.data.unwrap_or_default();
                let action = match TaskAction::parse(&raw) {
                    Ok(action) => action,
                    Err(error) => {
                        warn!(payload = %raw, %error, "rejected malformed action callback");
                        continue;
                    }
                };
                events.push(ChatEvent::ActionInvoked {
                    actor_chat_id: callback.from.id.to_string(),
                    message: MessageRef {
                        channel: message.chat.id.to_string(),
                        id: message.message_id.to_string(),
                    },
                    action,
                });
            } else if let Some(message) = update.message {
                let (Some(from), Some(text)) = (message.from, message.text) else {
                    continue;
                };
                events.push(ChatEvent::ReplyReceived {
                    actor_chat_id: from.id.to_string(),
                    text,
                });
            }
        }
        Ok((events, next_offset))
    }

    /// Best effort: a failed acknowledgement only leaves a spinner on the
    /// button, so it is logged and not propagated.
    async fn acknowledge_callback(&self, callback_id: &str) {
        let payload = json!({ "callback_query_id": callback_id });
        if let Err(error) = self.call::<Value>("answerCallbackQuery", &payload).await {
            warn!(%error, "failed to acknowledge callback");
        }
    }

    fn inline_keyboard(controls: &[InlineControl]) -> Value {
        let row: Vec<Value> = controls
            .iter()
            .map(|control| {
                json!({
                    "text": control.label,
                    "callback_data": control.action.encode(),
                })
            })
            .collect();
        json!({ "inline_keyboard": [row] })
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_message(&self, text: &str, controls: &[InlineControl]) -> Result<MessageRef> {
        let mut payload = json!({
            "chat_id": self.channel_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if !controls.is_empty() {
            payload["reply_markup"] = Self::inline_keyboard(controls);
        }
        let message: TgMessage = self.call("sendMessage", &payload).await?;
        Ok(MessageRef {
            channel: message.chat.id.to_string(),
            id: message.message_id.to_string(),
        })
    }

    async fn edit_message(&self, message: &MessageRef, text: &str) -> Result<()> {
        let message_id: i64 = message
            .id
            .parse()
            .with_context(|| format!("message reference '{}' is not editable", message.id))?;
        let payload = json!({
            "chat_id": message.channel,
            "message_id": message_id,
            "text": text,
        });
        let _: TgMessage = self.call("editMessageText", &payload).await?;
        Ok(())
    }

    async fn send_notice(&self, text: &str) -> Result<()> {
        let payload = json!({
            "chat_id": self.channel_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        let _: TgMessage = self.call("sendMessage", &payload).await?;
        Ok(())
    }
}
