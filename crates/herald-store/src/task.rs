//! Canonical task model shared by the store, tracker adapters, and runtime.

use serde::{Deserialize, Serialize};

/// Sentinel department assigned when a source adapter cannot map the field.
pub const UNSPECIFIED_DEPARTMENT: &str = "unspecified";

/// Tracker priority normalized across sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Blocker,
    High,
    Medium,
    Low,
    Unknown,
}

impl Priority {
    /// Parses a source-reported priority name; anything unrecognized maps
    /// to `Unknown` rather than failing the fetch.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "blocker" => Self::Blocker,
            "high" | "critical" => Self::High,
            "medium" | "normal" => Self::Medium,
            "low" | "minor" | "trivial" => Self::Low,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocker => "blocker",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Unknown => "unknown",
        }
    }

    /// Fixed per-level marker rendered into notifications; empty when the
    /// source reported nothing we recognize.
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Blocker => "🚨",
            Self::High => "🔴",
            Self::Medium => "🟡",
            Self::Low => "🟢",
            Self::Unknown => "",
        }
    }

    /// Sort rank used to keep notification batches stable (most urgent first).
    pub fn rank(&self) -> u8 {
        match self {
            Self::Blocker => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
            Self::Unknown => 4,
        }
    }
}

/// One normalized issue as returned by a source adapter, not yet merged
/// with local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTask {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub department: String,
    pub issue_type: String,
    pub resolution: String,
    /// Display name resolved through the identity directory; empty when the
    /// remote login had no mapping or the issue is unassigned.
    pub assignee: String,
}

/// One stored task row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: String,
    pub source: String,
    pub title: String,
    pub priority: Priority,
    pub department: String,
    pub issue_type: String,
    pub resolution: String,
    pub assignee: String,
    pub date_added_unix_ms: i64,
    pub last_sent_unix_ms: Option<i64>,
    pub archived: bool,
    pub archived_date_unix_ms: Option<i64>,
}

impl TaskRecord {
    pub fn is_resolved_done(&self) -> bool {
        self.resolution.eq_ignore_ascii_case("done")
    }
}
