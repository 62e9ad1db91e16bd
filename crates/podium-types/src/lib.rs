//! Shared types for the Podium Q&A dashboard.
//!
//! This crate provides the domain types used across all Podium crates:
//! the question status enum, question/answer/user records, and the
//! lifecycle events broadcast to connected observers.
//!
//! No crate in the workspace depends on anything *except* `podium-types`
//! for cross-cutting type definitions. This keeps the dependency graph
//! clean and prevents circular dependencies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a question message, in characters.
pub const MAX_QUESTION_LEN: usize = 1_000;

/// Maximum length of an answer message, in characters.
pub const MAX_ANSWER_LEN: usize = 2_000;

/// Triage status of a question.
///
/// Every question starts as `Pending`. Moderators may move it to any
/// status at any time; there are no forbidden transitions. `Answered` is
/// the only status that carries an answered timestamp on the question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionStatus {
    /// Newly submitted, awaiting triage.
    Pending,
    /// Raised for priority attention; sorts before everything else.
    Escalated,
    /// Resolved by a moderator.
    Answered,
}

impl QuestionStatus {
    /// Returns the canonical string label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Escalated => "Escalated",
            Self::Answered => "Answered",
        }
    }
}

impl std::fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Escalated" => Ok(Self::Escalated),
            "Answered" => Ok(Self::Answered),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized status string.
#[derive(Debug, Clone, Error)]
#[error("unrecognized question status: {0}")]
pub struct ParseStatusError(pub String);

/// The author of a question or answer.
///
/// Identified users carry their user id; guests have only a display
/// name. The display name is always present so read views never need a
/// join against the users table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// User id when the author is an identified user, `None` for guests.
    pub user_id: Option<i64>,
    /// Display name shown on the dashboard.
    pub display_name: String,
}

impl Author {
    /// An identified user.
    pub fn user(user_id: i64, display_name: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            display_name: display_name.into(),
        }
    }

    /// An anonymous guest with a display name.
    pub fn guest(display_name: impl Into<String>) -> Self {
        Self {
            user_id: None,
            display_name: display_name.into(),
        }
    }
}

/// A question record as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Opaque id, assigned at creation, never reused.
    pub id: i64,
    /// Id of the authoring user, `None` for guest submissions.
    pub user_id: Option<i64>,
    /// Display name of the author.
    pub username: String,
    /// Question text.
    pub message: String,
    /// Free-form category label.
    pub category: String,
    /// Current triage status.
    pub status: QuestionStatus,
    /// Creation timestamp (ISO 8601), immutable.
    pub created_at: String,
    /// Set exactly while the question is `Answered`, `None` otherwise.
    pub answered_at: Option<String>,
}

/// A question annotated with its live answer count, as returned by the
/// triage listing. The count is computed at read time and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    #[serde(flatten)]
    pub question: Question,
    /// Number of answers currently persisted for this question.
    pub answer_count: i64,
}

/// An answer record. Answers are append-only: never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Opaque id, assigned at creation, never reused.
    pub id: i64,
    /// Id of the question this answer belongs to.
    pub question_id: i64,
    /// Id of the authoring user, `None` for guest submissions.
    pub user_id: Option<i64>,
    /// Display name of the author.
    pub username: String,
    /// Answer text.
    pub message: String,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// A registered dashboard user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Whether this user may change question status.
    pub is_moderator: bool,
    pub created_at: String,
}

/// A self-contained notification of a question or answer change.
///
/// Serialized on the wire as `{"type": ..., "data": ...}`. Each event
/// carries the full resulting record rather than a delta, so observers
/// never need to reconcile ordering across racing mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LifecycleEvent {
    /// A new question was submitted.
    #[serde(rename = "new_question")]
    QuestionCreated(Question),
    /// A question's status changed.
    #[serde(rename = "question_updated")]
    QuestionUpdated(Question),
    /// A new answer was submitted.
    #[serde(rename = "new_answer")]
    AnswerCreated(Answer),
}

impl LifecycleEvent {
    /// Returns the wire type string for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::QuestionCreated(_) => "new_question",
            Self::QuestionUpdated(_) => "question_updated",
            Self::AnswerCreated(_) => "new_answer",
        }
    }
}
