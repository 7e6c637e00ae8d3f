//! Per-source adapters: field mapping and normalization live here, never in
//! shared logic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use herald_core::IdentityDirectory;
use herald_store::{FetchedTask, Priority, UNSPECIFIED_DEPARTMENT};

use crate::jira_client::{JiraClient, JiraIssue, RemoteComment};
use crate::TrackerError;

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_retry_max_attempts() -> usize {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

/// Static configuration for one tracker instance.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub base_url: String,
    pub token: String,
    /// Fixed project + status filter for the fetch query.
    pub jql: String,
    /// Field holding the department category on this instance, e.g.
    /// `customfield_10400`.
    pub department_field: String,
    /// Workflow transition applied by the "complete" action.
    pub complete_transition_id: String,
    #[serde(default)]
    pub user_tokens: HashMap<String, String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: usize,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

/// One remote tracker instance, selected by source id at fetch and action
/// time.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &str;

    /// Web link for a task on this instance.
    fn browse_url(&self, task_id: &str) -> String;

    /// Current open/relevant issues, normalized but not yet merged with
    /// local state.
    async fn fetch_open_tasks(&self) -> Result<Vec<FetchedTask>, TrackerError>;

    async fn assign(&self, task_id: &str, login: &str) -> Result<(), TrackerError>;

    async fn add_comment(&self, task_id: &str, login: &str, body: &str)
        -> Result<(), TrackerError>;

    /// Transitions the issue to this instance's terminal workflow state.
    async fn complete(&self, task_id: &str) -> Result<(), TrackerError>;

    async fn list_comments(&self, task_id: &str) -> Result<Vec<RemoteComment>, TrackerError>;
}

pub struct JiraSourceAdapter {
    config: SourceConfig,
    client: JiraClient,
    identities: Arc<IdentityDirectory>,
}

impl JiraSourceAdapter {
    pub fn new(
        config: SourceConfig,
        identities: Arc<IdentityDirectory>,
    ) -> Result<Self, TrackerError> {
        let client = JiraClient::new(
            config.base_url.clone(),
            config.token.clone(),
            config.user_tokens.clone(),
            config.request_timeout_ms,
            config.retry_max_attempts,
            config.retry_base_delay_ms,
        )?;
        Ok(Self {
            config,
            client,
            identities,
        })
    }

    fn normalize_issue(&self, issue: JiraIssue) -> FetchedTask {
        let fields = &issue.fields;
        let title = string_field(fields, "summary");
        let priority = Priority::parse(&nested_name(fields, "priority"));
        let issue_type = nested_name(fields, "issuetype");
        let resolution = nested_name(fields, "resolution");
        let assignee_login = fields
            .get("assignee")
            .and_then(|value| value.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let assignee = if assignee_login.is_empty() {
            String::new()
        } else {
            self.identities
                .display_name_for_login(&self.config.id, assignee_login)
                .unwrap_or_default()
                .to_string()
        };
        let department = department_field_value(fields, &self.config.department_field);
        FetchedTask {
            id: issue.key,
            title,
            priority,
            department,
            issue_type,
            resolution,
            assignee,
        }
    }
}

#[async_trait]
impl SourceAdapter for JiraSourceAdapter {
    fn source_id(&self) -> &str {
        &self.config.id
    }

    fn browse_url(&self, task_id: &str) -> String {
        format!("{}/browse/{task_id}", self.config.base_url.trim_end_matches('/'))
    }

    async fn fetch_open_tasks(&self) -> Result<Vec<FetchedTask>, TrackerError> {
        let issues = self.client.search_issues(&self.config.jql).await?;
        Ok(issues
            .into_iter()
            .map(|issue| self.normalize_issue(issue))
            .collect())
    }

    async fn assign(&self, task_id: &str, login: &str) -> Result<(), TrackerError> {
        self.client.assign_issue(task_id, login).await
    }

    async fn add_comment(
        &self,
        task_id: &str,
        login: &str,
        body: &str,
    ) -> Result<(), TrackerError> {
        self.client.add_comment(task_id, login, body).await
    }

    async fn complete(&self, task_id: &str) -> Result<(), TrackerError> {
        self.client
            .transition_issue(task_id, &self.config.complete_transition_id)
            .await
    }

    async fn list_comments(&self, task_id: &str) -> Result<Vec<RemoteComment>, TrackerError> {
        self.client.list_comments(task_id).await
    }
}

fn string_field(fields: &Value, name: &str) -> String {
    fields
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn nested_name(fields: &Value, name: &str) -> String {
    fields
        .get(name)
        .and_then(|value| value.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Department custom fields come back either as an option object with a
/// `value` member or as a bare string; anything else maps to the sentinel.
fn department_field_value(fields: &Value, field: &str) -> String {
    let raw = fields.get(field);
    let value = match raw {
        Some(Value::String(text)) => text.trim(),
        Some(Value::Object(_)) => raw
            .and_then(|value| value.get("value"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim(),
        _ => "",
    };
    if value.is_empty() {
        UNSPECIFIED_DEPARTMENT.to_string()
    } else {
        value.to_string()
    }
}
