//! Inline-action encoding, validated at the transport boundary.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionParseError {
    #[error("malformed action payload '{0}'")]
    Malformed(String),
    #[error("unknown action kind '{0}'")]
    UnknownKind(String),
    #[error("action payload is missing a task id")]
    MissingTaskId,
}

/// The three interactive actions a notification can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Take,
    Comment,
    Complete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Take => "take",
            Self::Comment => "comment",
            Self::Complete => "complete",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ActionParseError> {
        match raw {
            "take" => Ok(Self::Take),
            "comment" => Ok(Self::Comment),
            "complete" => Ok(Self::Complete),
            other => Err(ActionParseError::UnknownKind(other.to_string())),
        }
    }

    /// One-line summary written into the edited notification after the
    /// action succeeds.
    pub fn summary_label(&self) -> &'static str {
        match self {
            Self::Take => "Taken by",
            Self::Comment => "Comment added by",
            Self::Complete => "Completed by",
        }
    }
}

/// A validated action invocation: kind plus the target task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskAction {
    pub kind: ActionKind,
    pub task_id: String,
}

impl TaskAction {
    pub fn new(kind: ActionKind, task_id: impl Into<String>) -> Self {
        Self {
            kind,
            task_id: task_id.into(),
        }
    }

    /// Wire form carried in the inline-button callback payload.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.task_id)
    }

    /// Parses and validates the callback payload. Anything that does not
    /// decode to a known kind and a non-empty task id is rejected here, at
    /// the boundary, before it can reach the action coordinator.
    pub fn parse(raw: &str) -> Result<Self, ActionParseError> {
        let (kind_raw, task_id) = raw
            .split_once(':')
            .ok_or_else(|| ActionParseError::Malformed(raw.to_string()))?;
        let kind = ActionKind::parse(kind_raw)?;
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(ActionParseError::MissingTaskId);
        }
        Ok(Self::new(kind, task_id))
    }
}
