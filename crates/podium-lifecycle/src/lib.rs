//! Question lifecycle management.
//!
//! The [`LifecycleManager`] is the authority over question and answer
//! mutations: it validates input, persists through the store, and
//! publishes a lifecycle event for every successful mutation. Events are
//! emitted only after the store write commits, so observers never see a
//! record that failed to persist.
//!
//! Mutations to a single question are serialized through a per-question
//! async lock, which keeps the answered-timestamp invariant intact under
//! concurrent status updates. Mutations to different questions proceed
//! in parallel.

use podium_broadcast::Broadcaster;
use podium_db::DbPool;
use podium_store::{self as store, NewAnswer, NewQuestion, StoreError};
use podium_types::{
    Answer, Author, LifecycleEvent, Question, QuestionStatus, QuestionView, User,
    MAX_ANSWER_LEN, MAX_QUESTION_LEN,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Category assigned when the submitter leaves it blank.
pub const DEFAULT_CATEGORY: &str = "General";

/// Extra attempts for idempotent reads that hit a transient SQLite
/// busy/locked condition. Writes are never retried.
const READ_RETRIES: u32 = 2;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The input failed validation; nothing was persisted.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The referenced question does not exist.
    #[error("question not found: {0}")]
    NotFound(i64),
    /// The actor lacks the moderator privilege the operation requires.
    #[error("user {0} is not a moderator")]
    Unauthorized(String),
    /// The store could not hand out a connection.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A store operation failed.
    #[error("store error: {0}")]
    Store(StoreError),
    /// A background task failed unexpectedly.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::QuestionNotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

impl LifecycleError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Coordinates question and answer mutations against the store and
/// publishes the resulting lifecycle events.
///
/// Holds the connection pool and the broadcaster; handlers share one
/// instance behind an `Arc`.
pub struct LifecycleManager {
    pool: DbPool,
    broadcaster: Broadcaster,
    // One async mutex per question id. Entries are never removed; the
    // set of questions ever mutated in one process stays small enough
    // that reclaiming entries is not worth the bookkeeping.
    question_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl LifecycleManager {
    pub fn new(pool: DbPool, broadcaster: Broadcaster) -> Self {
        Self {
            pool,
            broadcaster,
            question_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Validates and persists a new question, then announces it.
    ///
    /// The message is trimmed before validation; an empty or oversized
    /// message is rejected with no store write and no event. A blank
    /// category falls back to [`DEFAULT_CATEGORY`]. New questions always
    /// start `Pending` with no answered timestamp.
    pub async fn submit_question(
        &self,
        author: Author,
        message: &str,
        category: Option<String>,
    ) -> Result<Question, LifecycleError> {
        let message = validate_message(message, MAX_QUESTION_LEN, "question")?;
        let category = normalize_category(category);

        let new = NewQuestion {
            author,
            message,
            category,
        };
        let question = self
            .with_conn(move |conn| store::create_question(conn, &new).map_err(Into::into))
            .await?;

        tracing::info!(
            question = question.id,
            category = %question.category,
            "question submitted"
        );
        self.broadcaster
            .publish(&LifecycleEvent::QuestionCreated(question.clone()))
            .await;
        Ok(question)
    }

    /// Validates and persists an answer to an existing question, then
    /// announces it.
    ///
    /// Fails with [`LifecycleError::NotFound`] when the question does not
    /// exist; no event is emitted on any failure.
    pub async fn submit_answer(
        &self,
        question_id: i64,
        author: Author,
        message: &str,
    ) -> Result<Answer, LifecycleError> {
        let message = validate_message(message, MAX_ANSWER_LEN, "answer")?;

        let new = NewAnswer {
            question_id,
            author,
            message,
        };
        let answer = self
            .with_conn(move |conn| store::create_answer(conn, &new).map_err(Into::into))
            .await?;

        tracing::info!(question = question_id, answer = answer.id, "answer submitted");
        self.broadcaster
            .publish(&LifecycleEvent::AnswerCreated(answer.clone()))
            .await;
        Ok(answer)
    }

    /// Transitions a question to a new status and announces the update.
    ///
    /// Moderator-only. Entering `Answered` stamps the current time as the
    /// answered timestamp; entering any other status clears it. The
    /// transition is applied even when the status is unchanged, which
    /// refreshes the timestamp on a repeated `Answered`, and still emits
    /// an update event so observers converge on the persisted record.
    pub async fn update_status(
        &self,
        question_id: i64,
        new_status: QuestionStatus,
        actor: &User,
    ) -> Result<Question, LifecycleError> {
        if !actor.is_moderator {
            tracing::warn!(
                question = question_id,
                actor = %actor.username,
                "status update rejected, actor is not a moderator"
            );
            return Err(LifecycleError::Unauthorized(actor.username.clone()));
        }

        // Serialize concurrent updates to the same question so the
        // status and answered timestamp always move together.
        let lock = self.question_lock(question_id);
        let _guard = lock.lock().await;

        let answered_at = (new_status == QuestionStatus::Answered).then(now_iso);
        let question = self
            .with_conn(move |conn| {
                store::update_question_status(conn, question_id, new_status, answered_at.as_deref())
                    .map_err(Into::into)
            })
            .await?;

        tracing::info!(
            question = question_id,
            status = %question.status,
            actor = %actor.username,
            "question status updated"
        );
        self.broadcaster
            .publish(&LifecycleEvent::QuestionUpdated(question.clone()))
            .await;
        Ok(question)
    }

    /// Lists questions in triage order with live answer counts,
    /// optionally restricted to one category.
    pub async fn list_questions(
        &self,
        category: Option<String>,
    ) -> Result<Vec<QuestionView>, LifecycleError> {
        self.with_read_retry("list_questions", || {
            let cat = category.clone();
            self.with_conn(move |conn| {
                store::list_questions(conn, cat.as_deref()).map_err(Into::into)
            })
        })
        .await
    }

    /// Retrieves one question by id.
    pub async fn get_question(&self, question_id: i64) -> Result<Question, LifecycleError> {
        self.with_read_retry("get_question", || {
            self.with_conn(move |conn| store::get_question(conn, question_id).map_err(Into::into))
        })
        .await
    }

    /// Lists a question's answers in conversation order.
    ///
    /// Fails with [`LifecycleError::NotFound`] for a missing question, to
    /// distinguish it from a question with no answers yet.
    pub async fn list_answers(&self, question_id: i64) -> Result<Vec<Answer>, LifecycleError> {
        self.with_read_retry("list_answers", || {
            self.with_conn(move |conn| {
                if !store::question_exists(conn, question_id).map_err(LifecycleError::from)? {
                    return Err(LifecycleError::NotFound(question_id));
                }
                store::list_answers(conn, question_id).map_err(Into::into)
            })
        })
        .await
    }

    /// Runs a store operation on a pooled connection off the async
    /// runtime's worker threads.
    async fn with_conn<T, F>(&self, op: F) -> Result<T, LifecycleError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, LifecycleError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| LifecycleError::Unavailable(e.to_string()))?;
            op(&conn)
        })
        .await
        .map_err(|e| LifecycleError::Internal(format!("blocking task failed: {e}")))?
    }

    /// Retries an idempotent read a bounded number of times when it hits
    /// a transient busy/locked condition.
    async fn with_read_retry<T, F, Fut>(
        &self,
        operation: &str,
        mut attempt_fn: F,
    ) -> Result<T, LifecycleError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, LifecycleError>>,
    {
        let mut attempt = 0;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < READ_RETRIES => {
                    attempt += 1;
                    tracing::warn!(operation, attempt, error = %e, "transient store error, retrying read");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn question_lock(&self, question_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.question_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // A panic while holding the map lock cannot leave the map
                // itself inconsistent; recover and continue.
                tracing::error!("question lock map was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        locks.entry(question_id).or_default().clone()
    }
}

/// Current UTC time as an ISO 8601 string with millisecond precision,
/// matching the store's own timestamp format.
fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn validate_message(message: &str, max_len: usize, what: &str) -> Result<String, LifecycleError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::Validation(format!(
            "{what} message must not be empty"
        )));
    }
    let len = trimmed.chars().count();
    if len > max_len {
        return Err(LifecycleError::Validation(format!(
            "{what} message is {len} characters, maximum is {max_len}"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_category(category: Option<String>) -> String {
    match category {
        Some(cat) if !cat.trim().is_empty() => cat.trim().to_string(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}
