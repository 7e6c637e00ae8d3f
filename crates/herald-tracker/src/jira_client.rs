//! Typed Jira REST v2 client used by the per-source adapters.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::retry::{
    is_retryable_transport_error, retry_delay_ms, should_retry_status, truncate_for_error,
};
use crate::TrackerError;

const SEARCH_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    #[serde(default)]
    pub fields: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraSearchResponse {
    #[serde(rename = "startAt")]
    start_at: u32,
    #[serde(default)]
    total: u32,
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraCommentAuthor {
    #[serde(rename = "displayName", default)]
    display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraComment {
    id: String,
    #[serde(default)]
    author: Option<JiraCommentAuthor>,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraCommentListResponse {
    #[serde(default)]
    comments: Vec<JiraComment>,
}

/// One remote comment, with its identifier already parsed for numeric
/// watermark comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteComment {
    pub id: i64,
    pub author: String,
    pub body: String,
}

#[derive(Clone)]
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    /// Per-login API tokens; comments submitted by a mapped login are
    /// authored under that login's credentials.
    user_tokens: HashMap<String, String>,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl JiraClient {
    pub fn new(
        base_url: String,
        token: String,
        user_tokens: HashMap<String, String>,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self, TrackerError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("herald-tracker-bridge"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            user_tokens,
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    /// Runs the configured project/status query, following pagination.
    pub async fn search_issues(&self, jql: &str) -> Result<Vec<JiraIssue>, TrackerError> {
        let mut start_at = 0_u32;
        let mut rows = Vec::new();
        loop {
            let start_value = start_at.to_string();
            let page_value = SEARCH_PAGE_SIZE.to_string();
            let response: JiraSearchResponse = self
                .request_json("search issues", || {
                    self.http
                        .get(format!("{}/rest/api/2/search", self.base_url))
                        .bearer_auth(&self.token)
                        .query(&[
                            ("jql", jql),
                            ("startAt", start_value.as_str()),
                            ("maxResults", page_value.as_str()),
                        ])
                })
                .await?;
            let fetched = response.issues.len() as u32;
            rows.extend(response.issues);
            let next = response.start_at.saturating_add(fetched);
            if fetched == 0 || next >= response.total {
                break;
            }
            start_at = next;
        }
        Ok(rows)
    }

    pub async fn assign_issue(&self, key: &str, login: &str) -> Result<(), TrackerError> {
        let payload = json!({ "name": login });
        self.request_unit("assign issue", || {
            self.http
                .put(format!("{}/rest/api/2/issue/{key}/assignee", self.base_url))
                .bearer_auth(&self.token)
                .json(&payload)
        })
        .await
    }

    /// Adds a comment. When `login` has a configured token the call is
    /// authenticated as that user so the comment carries their authorship;
    /// otherwise the service credentials are used.
    pub async fn add_comment(&self, key: &str, login: &str, body: &str) -> Result<(), TrackerError> {
        let payload = json!({ "body": body });
        let user_token = self.user_tokens.get(login).cloned();
        self.request_unit("add comment", || {
            let request = self
                .http
                .post(format!("{}/rest/api/2/issue/{key}/comment", self.base_url))
                .json(&payload);
            match user_token.as_deref() {
                Some(token) => request.basic_auth(login, Some(token)),
                None => request.bearer_auth(&self.token),
            }
        })
        .await
    }

    pub async fn transition_issue(&self, key: &str, transition_id: &str) -> Result<(), TrackerError> {
        let payload = json!({ "transition": { "id": transition_id } });
        self.request_unit("transition issue", || {
            self.http
                .post(format!("{}/rest/api/2/issue/{key}/transitions", self.base_url))
                .bearer_auth(&self.token)
                .json(&payload)
        })
        .await
    }

    /// Lists an issue's comments with identifiers parsed to integers;
    /// comments with non-numeric identifiers are logged and skipped so one
    /// malformed row never stalls the watcher.
    pub async fn list_comments(&self, key: &str) -> Result<Vec<RemoteComment>, TrackerError> {
        let response: JiraCommentListResponse = self
            .request_json("list comments", || {
                self.http
                    .get(format!("{}/rest/api/2/issue/{key}/comment", self.base_url))
                    .bearer_auth(&self.token)
            })
            .await?;
        let mut comments = Vec::with_capacity(response.comments.len());
        for comment in response.comments {
            let Ok(id) = comment.id.parse::<i64>() else {
                warn!(issue = key, comment_id = %comment.id, "skipping comment with non-numeric id");
                continue;
            };
            let author = comment
                .author
                .and_then(|author| author.display_name.or(author.name))
                .unwrap_or_default();
            comments.push(RemoteComment {
                id,
                author,
                body: comment.body,
            });
        }
        Ok(comments)
    }

    async fn request_json<T, F>(&self, operation: &str, request_builder: F) -> Result<T, TrackerError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let body = self.request_text(operation, request_builder).await?;
        serde_json::from_str(&body).map_err(|error| TrackerError::InvalidResponse {
            operation: operation.to_string(),
            detail: error.to_string(),
        })
    }

    async fn request_unit<F>(&self, operation: &str, request_builder: F) -> Result<(), TrackerError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        self.request_text(operation, request_builder).await.map(|_| ())
    }

    async fn request_text<F>(&self, operation: &str, request_builder: F) -> Result<String, TrackerError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder().send().await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if status.is_success() {
                        return Ok(body);
                    }
                    if should_retry_status(status.as_u16()) && attempt < self.retry_max_attempts {
                        let delay = retry_delay_ms(attempt - 1, self.retry_base_delay_ms);
                        warn!(operation, status = status.as_u16(), attempt, "retrying tracker call");
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        continue;
                    }
                    return Err(TrackerError::HttpStatus {
                        operation: operation.to_string(),
                        status: status.as_u16(),
                        body: truncate_for_error(&body),
                    });
                }
                Err(error) => {
                    if is_retryable_transport_error(&error) && attempt < self.retry_max_attempts {
                        let delay = retry_delay_ms(attempt - 1, self.retry_base_delay_ms);
                        warn!(operation, attempt, "retrying tracker call after transport error");
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        continue;
                    }
                    return Err(TrackerError::Http(error));
                }
            }
        }
    }
}
