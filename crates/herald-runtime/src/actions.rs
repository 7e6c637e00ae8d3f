//! Interactive action protocol: take / comment / complete.
//!
//! Every failure path here is contained: the actor gets a notice, the log
//! gets the detail, and nothing propagates. No lock is held on a task
//! between lookup and remote mutation; two actors racing on one
//! notification both pass identity resolution and the last successful edit
//! owns the visible summary.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use herald_chat::{ActionKind, ChatEvent, ChatTransport, MessageRef, TaskAction};
use herald_core::IdentityDirectory;
use herald_store::TaskStore;

use crate::AdapterMap;

const DEFAULT_DIALOG_TIMEOUT_MS: i64 = 10 * 60 * 1_000;

/// An open comment dialog: the actor pressed Comment and the coordinator is
/// suspended until their next free-text reply (or the timeout).
#[derive(Debug, Clone)]
struct PendingComment {
    task_id: String,
    source: String,
    login: String,
    display_name: String,
    department: String,
    message: MessageRef,
    requested_unix_ms: i64,
}

pub struct ActionCoordinator {
    store: Arc<TaskStore>,
    adapters: AdapterMap,
    identities: Arc<IdentityDirectory>,
    transport: Arc<dyn ChatTransport>,
    pending: Mutex<HashMap<String, PendingComment>>,
    dialog_timeout_ms: i64,
}

impl ActionCoordinator {
    pub fn new(
        store: Arc<TaskStore>,
        adapters: AdapterMap,
        identities: Arc<IdentityDirectory>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            store,
            adapters,
            identities,
            transport,
            pending: Mutex::new(HashMap::new()),
            dialog_timeout_ms: DEFAULT_DIALOG_TIMEOUT_MS,
        }
    }

    pub fn with_dialog_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.dialog_timeout_ms = timeout_ms.max(1);
        self
    }

    pub async fn handle_event(&self, event: ChatEvent, now_unix_ms: i64) {
        match event {
            ChatEvent::ActionInvoked {
                actor_chat_id,
                message,
                action,
            } => {
                self.handle_action(&actor_chat_id, message, action, now_unix_ms)
                    .await;
            }
            ChatEvent::ReplyReceived {
                actor_chat_id,
                text,
            } => {
                self.handle_reply(&actor_chat_id, &text, now_unix_ms).await;
            }
        }
    }

    /// Steps 1-3 of the action protocol: resolve the task, resolve the
    /// acting identity's login for its source, then dispatch. A missing
    /// login is a hard stop before any remote call.
    pub async fn handle_action(
        &self,
        actor_chat_id: &str,
        message: MessageRef,
        action: TaskAction,
        now_unix_ms: i64,
    ) {
        let task = match self.store.task_by_id(&action.task_id) {
            Ok(Some(task)) => task,
            Ok(None) => {
                self.notice(&format!("Task {} not found.", action.task_id)).await;
                return;
            }
            Err(error) => {
                warn!(task = %action.task_id, %error, "task lookup failed");
                self.notice("Task lookup failed, please try again.").await;
                return;
            }
        };

        let Some(identity) = self.identities.by_chat_id(actor_chat_id) else {
            self.notice(&format!(
                "You have no mapped tracker login for {}; action skipped.",
                task.source
            ))
            .await;
            return;
        };
        let Some(login) = identity.tracker_logins.get(&task.source) else {
            self.notice(&format!(
                "{} has no mapped tracker login for {}; action skipped.",
                identity.display_name, task.source
            ))
            .await;
            return;
        };
        let Some(adapter) = self.adapters.get(&task.source) else {
            warn!(source = %task.source, "no adapter configured for task source");
            self.notice(&format!("Source {} is not configured.", task.source)).await;
            return;
        };

        match action.kind {
            ActionKind::Take => {
                match adapter.assign(&task.id, login).await {
                    Ok(()) => {
                        self.finalize(
                            ActionKind::Take,
                            &task.id,
                            &task.department,
                            &identity.display_name,
                            &message,
                            now_unix_ms,
                        )
                        .await;
                    }
                    Err(error) => {
                        warn!(task = %task.id, %error, "assign failed");
                        self.notice(&format!("Failed to assign {}.", task.id)).await;
                    }
                }
            }
            ActionKind::Complete => {
                match adapter.complete(&task.id).await {
                    Ok(()) => {
                        self.finalize(
                            ActionKind::Complete,
                            &task.id,
                            &task.department,
                            &identity.display_name,
                            &message,
                            now_unix_ms,
                        )
                        .await;
                    }
                    Err(error) => {
                        warn!(task = %task.id, %error, "complete transition failed");
                        self.notice(&format!("Failed to complete {}.", task.id)).await;
                    }
                }
            }
            ActionKind::Comment => {
                let dialog = PendingComment {
                    task_id: task.id.clone(),
                    source: task.source.clone(),
                    login: login.clone(),
                    display_name: identity.display_name.clone(),
                    department: task.department.clone(),
                    message,
                    requested_unix_ms: now_unix_ms,
                };
                if let Ok(mut pending) = self.pending.lock() {
                    // A fresh Comment press replaces any stale dialog.
                    pending.insert(actor_chat_id.to_string(), dialog);
                }
                self.notice(&format!(
                    "{}: reply with your comment for {}.",
                    identity.display_name, task.id
                ))
                .await;
            }
        }
    }

    /// Resumes a suspended comment dialog with the actor's reply. Returns
    /// whether the reply was consumed by a dialog.
    pub async fn handle_reply(&self, actor_chat_id: &str, text: &str, now_unix_ms: i64) -> bool {
        let dialog = match self.pending.lock() {
            Ok(mut pending) => pending.remove(actor_chat_id),
            Err(_) => None,
        };
        let Some(dialog) = dialog else {
            return false;
        };

        if now_unix_ms - dialog.requested_unix_ms > self.dialog_timeout_ms {
            self.notice(&format!(
                "Comment dialog for {} expired; press Comment again.",
                dialog.task_id
            ))
            .await;
            return true;
        }

        let Some(adapter) = self.adapters.get(&dialog.source) else {
            warn!(source = %dialog.source, "no adapter configured for pending dialog");
            self.notice(&format!("Source {} is not configured.", dialog.source)).await;
            return true;
        };
        match adapter.add_comment(&dialog.task_id, &dialog.login, text).await {
            Ok(()) => {
                self.finalize(
                    ActionKind::Comment,
                    &dialog.task_id,
                    &dialog.department,
                    &dialog.display_name,
                    &dialog.message,
                    now_unix_ms,
                )
                .await;
            }
            Err(error) => {
                warn!(task = %dialog.task_id, %error, "comment submission failed");
                self.notice(&format!("Failed to comment on {}.", dialog.task_id)).await;
            }
        }
        true
    }

    /// Cancels dialogs older than the timeout, notifying their actors.
    pub async fn expire_stale_dialogs(&self, now_unix_ms: i64) -> usize {
        let expired: Vec<(String, PendingComment)> = match self.pending.lock() {
            Ok(mut pending) => {
                let cutoff = now_unix_ms - self.dialog_timeout_ms;
                let stale: Vec<String> = pending
                    .iter()
                    .filter(|(_, dialog)| dialog.requested_unix_ms < cutoff)
                    .map(|(actor, _)| actor.clone())
                    .collect();
                stale
                    .into_iter()
                    .filter_map(|actor| pending.remove(&actor).map(|dialog| (actor, dialog)))
                    .collect()
            }
            Err(_) => Vec::new(),
        };
        for (_, dialog) in &expired {
            self.notice(&format!(
                "Comment dialog for {} timed out; press Comment again.",
                dialog.task_id
            ))
            .await;
        }
        expired.len()
    }

    /// Step 4: record the audit and rewrite the originating notification.
    /// An edit failure falls back to a fresh message with the same body.
    async fn finalize(
        &self,
        kind: ActionKind,
        task_id: &str,
        department: &str,
        display_name: &str,
        message: &MessageRef,
        now_unix_ms: i64,
    ) {
        if let Err(error) = self
            .store
            .record_action(task_id, kind.as_str(), display_name, now_unix_ms)
        {
            warn!(task = %task_id, %error, "failed to record action audit");
        }
        let body = format!("{department}\n\n{} {display_name}", kind.summary_label());
        if let Err(error) = self.transport.edit_message(message, &body).await {
            warn!(task = %task_id, %error, "message edit failed; sending replacement");
            if let Err(error) = self.transport.send_message(&body, &[]).await {
                warn!(task = %task_id, %error, "replacement message failed too");
            }
        }
    }

    async fn notice(&self, text: &str) {
        if let Err(error) = self.transport.send_notice(text).await {
            warn!(%error, "failed to send notice");
        }
    }
}
