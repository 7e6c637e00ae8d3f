//! Tests for the Jira client and source adapter normalization.

use std::collections::HashMap;
use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;

use herald_core::{Identity, IdentityDirectory};
use herald_store::{Priority, UNSPECIFIED_DEPARTMENT};

use super::adapter::{JiraSourceAdapter, SourceAdapter, SourceConfig};
use super::jira_client::JiraClient;
use super::TrackerError;

fn directory() -> Arc<IdentityDirectory> {
    Arc::new(IdentityDirectory::new(vec![Identity {
        chat_id: "chat-7".to_string(),
        display_name: "Casey Larkin".to_string(),
        tracker_logins: HashMap::from([("ops".to_string(), "clarkin".to_string())]),
    }]))
}

fn source_config(base_url: &str) -> SourceConfig {
    SourceConfig {
        id: "ops".to_string(),
        base_url: base_url.to_string(),
        token: "service-token".to_string(),
        jql: "project = OPS AND status in (Open, \"In Progress\")".to_string(),
        department_field: "customfield_10400".to_string(),
        complete_transition_id: "31".to_string(),
        user_tokens: HashMap::new(),
        request_timeout_ms: 2_000,
        retry_max_attempts: 1,
        retry_base_delay_ms: 1,
    }
}

fn client(base_url: &str, user_tokens: HashMap<String, String>, attempts: usize) -> JiraClient {
    JiraClient::new(
        base_url.to_string(),
        "service-token".to_string(),
        user_tokens,
        2_000,
        attempts,
        1,
    )
    .expect("client")
}

#[tokio::test]
async fn fetch_normalizes_fields_and_resolves_assignee() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/rest/api/2/search")
            .header("authorization", "Bearer service-token");
        then.status(200).json_body(json!({
            "startAt": 0,
            "maxResults": 50,
            "total": 2,
            "issues": [
                {
                    "key": "OPS-1",
                    "fields": {
                        "summary": "VPN access for new hire",
                        "priority": { "name": "High" },
                        "issuetype": { "name": "Service Request" },
                        "resolution": { "name": "Done" },
                        "assignee": { "name": "clarkin" },
                        "customfield_10400": { "value": "support" }
                    }
                },
                {
                    "key": "OPS-2",
                    "fields": {
                        "summary": "Rack power audit",
                        "priority": { "name": "Mysterious" },
                        "issuetype": { "name": "Task" },
                        "resolution": null,
                        "assignee": { "name": "unmapped-login" },
                        "customfield_10400": null
                    }
                }
            ]
        }));
    });

    let adapter =
        JiraSourceAdapter::new(source_config(&server.base_url()), directory()).expect("adapter");
    let tasks = adapter.fetch_open_tasks().await.expect("fetch");
    assert_eq!(tasks.len(), 2);

    assert_eq!(tasks[0].id, "OPS-1");
    assert_eq!(tasks[0].title, "VPN access for new hire");
    assert_eq!(tasks[0].priority, Priority::High);
    assert_eq!(tasks[0].resolution, "Done");
    assert_eq!(tasks[0].assignee, "Casey Larkin");
    assert_eq!(tasks[0].department, "support");

    assert_eq!(tasks[1].priority, Priority::Unknown);
    assert_eq!(tasks[1].resolution, "");
    assert_eq!(tasks[1].assignee, "", "unmatched login is empty, not an error");
    assert_eq!(tasks[1].department, UNSPECIFIED_DEPARTMENT);
}

#[tokio::test]
async fn search_follows_pagination() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/rest/api/2/search")
            .query_param("startAt", "0");
        then.status(200).json_body(json!({
            "startAt": 0, "maxResults": 50, "total": 2,
            "issues": [ { "key": "OPS-1", "fields": {} } ]
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/rest/api/2/search")
            .query_param("startAt", "1");
        then.status(200).json_body(json!({
            "startAt": 1, "maxResults": 50, "total": 2,
            "issues": [ { "key": "OPS-2", "fields": {} } ]
        }));
    });

    let client = client(&server.base_url(), HashMap::new(), 1);
    let issues = client.search_issues("project = OPS").await.expect("search");
    let keys: Vec<_> = issues.iter().map(|issue| issue.key.as_str()).collect();
    assert_eq!(keys, vec!["OPS-1", "OPS-2"]);
}

#[tokio::test]
async fn assign_puts_login_and_surfaces_failures() {
    let server = MockServer::start();
    let ok = server.mock(|when, then| {
        when.method(PUT)
            .path("/rest/api/2/issue/OPS-1/assignee")
            .json_body(json!({ "name": "clarkin" }));
        then.status(204);
    });
    server.mock(|when, then| {
        when.method(PUT).path("/rest/api/2/issue/OPS-9/assignee");
        then.status(400).body("cannot assign");
    });

    let client = client(&server.base_url(), HashMap::new(), 1);
    client.assign_issue("OPS-1", "clarkin").await.expect("assign");
    ok.assert();

    let error = client
        .assign_issue("OPS-9", "clarkin")
        .await
        .expect_err("assignment should fail");
    match error {
        TrackerError::HttpStatus { status, .. } => assert_eq!(status, 400),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn comments_use_the_acting_logins_credentials_when_mapped() {
    let server = MockServer::start();
    let as_user = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/api/2/issue/OPS-1/comment")
            .header("authorization", "Basic amRvZTp0b2stMTIz");
        then.status(201).json_body(json!({ "id": "10001" }));
    });
    let as_service = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/api/2/issue/OPS-2/comment")
            .header("authorization", "Bearer service-token");
        then.status(201).json_body(json!({ "id": "10002" }));
    });

    let tokens = HashMap::from([("jdoe".to_string(), "tok-123".to_string())]);
    let client = client(&server.base_url(), tokens, 1);
    client
        .add_comment("OPS-1", "jdoe", "checking now")
        .await
        .expect("comment as user");
    client
        .add_comment("OPS-2", "unmapped", "checking now")
        .await
        .expect("comment as service");
    as_user.assert();
    as_service.assert();
}

#[tokio::test]
async fn transition_posts_configured_id() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/api/2/issue/OPS-1/transitions")
            .json_body(json!({ "transition": { "id": "31" } }));
        then.status(204);
    });

    let adapter =
        JiraSourceAdapter::new(source_config(&server.base_url()), directory()).expect("adapter");
    adapter.complete("OPS-1").await.expect("transition");
    mock.assert();
}

#[tokio::test]
async fn list_comments_parses_ids_and_skips_non_numeric() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/rest/api/2/issue/OPS-1/comment");
        then.status(200).json_body(json!({
            "comments": [
                { "id": "101", "author": { "displayName": "Casey Larkin" }, "body": "first" },
                { "id": "not-a-number", "body": "garbled" },
                { "id": "105", "author": { "name": "jdoe" }, "body": "second" }
            ]
        }));
    });

    let client = client(&server.base_url(), HashMap::new(), 1);
    let comments = client.list_comments("OPS-1").await.expect("comments");
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].id, 101);
    assert_eq!(comments[0].author, "Casey Larkin");
    assert_eq!(comments[1].id, 105);
    assert_eq!(comments[1].author, "jdoe");
}

#[tokio::test]
async fn retryable_status_is_retried_before_surfacing() {
    let server = MockServer::start();
    let error_mock = server.mock(|when, then| {
        when.method(GET).path("/rest/api/2/issue/OPS-1/comment");
        then.status(503);
    });

    let client = client(&server.base_url(), HashMap::new(), 2);
    let error = client.list_comments("OPS-1").await.expect_err("exhausts retries");
    assert!(matches!(error, TrackerError::HttpStatus { status: 503, .. }));
    assert_eq!(error_mock.hits(), 2, "one retry before surfacing the failure");
}

#[tokio::test]
async fn browse_url_points_at_the_issue() {
    let adapter =
        JiraSourceAdapter::new(source_config("https://tracker.example.com/"), directory())
            .expect("adapter");
    assert_eq!(
        adapter.browse_url("OPS-7"),
        "https://tracker.example.com/browse/OPS-7"
    );
}
