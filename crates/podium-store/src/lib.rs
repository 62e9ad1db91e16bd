//! Persistence operations for users, questions, and answers.
//!
//! Implements the store contract the lifecycle manager consumes: plain
//! functions over a `rusqlite::Connection`, one per operation. The store
//! owns the canonical records; callers hold no private copies across
//! calls — every operation re-reads or re-writes through here.
//!
//! Two contracts are enforced at this layer:
//!
//! - **Triage ordering**: [`list_questions`] returns escalated questions
//!   before all others, newest first within each partition.
//! - **Live answer counts**: the count attached to each listed question
//!   is computed from the answers table at read time, never cached.

use podium_types::{Answer, Author, Question, QuestionStatus, QuestionView, User};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("question not found: {0}")]
    QuestionNotFound(i64),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("duplicate record: {0}")]
    Duplicate(String),
}

impl StoreError {
    /// Whether this error is a transient SQLite condition (busy/locked)
    /// that an idempotent read may retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(code, _)) => matches!(
                code.code,
                rusqlite::ffi::ErrorCode::DatabaseBusy | rusqlite::ffi::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Parameters for creating a new question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
    pub author: Author,
    pub message: String,
    pub category: String,
}

/// Parameters for creating a new answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAnswer {
    pub question_id: i64,
    pub author: Author,
    pub message: String,
}

/// Creates a new question with status `Pending` and returns the full
/// persisted record, including the generated id and timestamp.
pub fn create_question(conn: &Connection, new: &NewQuestion) -> Result<Question, StoreError> {
    let question = conn.query_row(
        "INSERT INTO questions (user_id, username, message, category)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id, user_id, username, message, category, status, created_at, answered_at",
        params![
            new.author.user_id,
            new.author.display_name,
            new.message,
            new.category,
        ],
        map_row_to_question,
    )?;
    Ok(question)
}

/// Retrieves a question by id.
pub fn get_question(conn: &Connection, id: i64) -> Result<Question, StoreError> {
    conn.query_row(
        "SELECT id, user_id, username, message, category, status, created_at, answered_at
         FROM questions WHERE id = ?1",
        [id],
        map_row_to_question,
    )
    .optional()?
    .ok_or(StoreError::QuestionNotFound(id))
}

/// Returns whether a question with the given id exists.
pub fn question_exists(conn: &Connection, id: i64) -> Result<bool, StoreError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM questions WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Sets a question's status and answered timestamp in one statement and
/// returns the updated record.
///
/// The caller decides `answered_at`: the current time when entering
/// `Answered`, `None` otherwise. Writing both columns together keeps the
/// answered-timestamp invariant a single-row, single-statement affair.
pub fn update_question_status(
    conn: &Connection,
    id: i64,
    status: QuestionStatus,
    answered_at: Option<&str>,
) -> Result<Question, StoreError> {
    conn.query_row(
        "UPDATE questions SET status = ?1, answered_at = ?2 WHERE id = ?3
         RETURNING id, user_id, username, message, category, status, created_at, answered_at",
        params![status.as_str(), answered_at, id],
        map_row_to_question,
    )
    .optional()?
    .ok_or(StoreError::QuestionNotFound(id))
}

/// Lists questions in triage order, each with its live answer count.
///
/// Ordering contract: all `Escalated` questions first, then by creation
/// time descending within each partition (id descending breaks ties).
/// An optional category restricts the result without changing the
/// ordering.
pub fn list_questions(
    conn: &Connection,
    category: Option<&str>,
) -> Result<Vec<QuestionView>, StoreError> {
    let base = "SELECT q.id, q.user_id, q.username, q.message, q.category, q.status,
                       q.created_at, q.answered_at,
                       COUNT(a.id) AS answer_count
                FROM questions q
                LEFT JOIN answers a ON a.question_id = q.id";
    let order = "GROUP BY q.id
                 ORDER BY CASE q.status WHEN 'Escalated' THEN 0 ELSE 1 END,
                          q.created_at DESC,
                          q.id DESC";

    let mut views = Vec::new();
    match category {
        Some(cat) => {
            let sql = format!("{base} WHERE q.category = ?1 {order}");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([cat], map_row_to_question_view)?;
            for row in rows {
                views.push(row?);
            }
        }
        None => {
            let sql = format!("{base} {order}");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], map_row_to_question_view)?;
            for row in rows {
                views.push(row?);
            }
        }
    }
    Ok(views)
}

/// Creates a new answer and returns the full persisted record.
///
/// Fails with [`StoreError::QuestionNotFound`] if the referenced
/// question does not exist; the foreign key constraint backstops this
/// check at the SQLite level.
pub fn create_answer(conn: &Connection, new: &NewAnswer) -> Result<Answer, StoreError> {
    if !question_exists(conn, new.question_id)? {
        return Err(StoreError::QuestionNotFound(new.question_id));
    }

    let answer = conn.query_row(
        "INSERT INTO answers (question_id, user_id, username, message)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id, question_id, user_id, username, message, created_at",
        params![
            new.question_id,
            new.author.user_id,
            new.author.display_name,
            new.message,
        ],
        map_row_to_answer,
    )?;
    Ok(answer)
}

/// Lists all answers for a question in conversation order (creation time
/// ascending, id ascending on ties).
pub fn list_answers(conn: &Connection, question_id: i64) -> Result<Vec<Answer>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, question_id, user_id, username, message, created_at
         FROM answers WHERE question_id = ?1
         ORDER BY created_at ASC, id ASC",
    )?;

    let rows = stmt.query_map([question_id], map_row_to_answer)?;
    let mut answers = Vec::new();
    for row in rows {
        answers.push(row?);
    }
    Ok(answers)
}

/// Creates a new user.
///
/// Fails with [`StoreError::Duplicate`] if the username or email is
/// already registered.
pub fn create_user(
    conn: &Connection,
    username: &str,
    email: &str,
    is_moderator: bool,
) -> Result<User, StoreError> {
    conn.query_row(
        "INSERT INTO users (username, email, is_moderator)
         VALUES (?1, ?2, ?3)
         RETURNING id, username, email, is_moderator, created_at",
        params![username, email, is_moderator],
        map_row_to_user,
    )
    .map_err(|e| {
        if let rusqlite::Error::SqliteFailure(code, _) = &e {
            if code.code == rusqlite::ffi::ErrorCode::ConstraintViolation {
                return StoreError::Duplicate(username.to_string());
            }
        }
        StoreError::Database(e)
    })
}

/// Looks up a user by username or email.
pub fn get_user_by_identifier(conn: &Connection, identifier: &str) -> Result<User, StoreError> {
    conn.query_row(
        "SELECT id, username, email, is_moderator, created_at
         FROM users WHERE username = ?1 OR email = ?1",
        [identifier],
        map_row_to_user,
    )
    .optional()?
    .ok_or_else(|| StoreError::UserNotFound(identifier.to_string()))
}

fn parse_status(idx: usize, row: &Row) -> rusqlite::Result<QuestionStatus> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn map_row_to_question(row: &Row) -> rusqlite::Result<Question> {
    Ok(Question {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        message: row.get(3)?,
        category: row.get(4)?,
        status: parse_status(5, row)?,
        created_at: row.get(6)?,
        answered_at: row.get(7)?,
    })
}

fn map_row_to_question_view(row: &Row) -> rusqlite::Result<QuestionView> {
    Ok(QuestionView {
        question: map_row_to_question(row)?,
        answer_count: row.get(8)?,
    })
}

fn map_row_to_answer(row: &Row) -> rusqlite::Result<Answer> {
    Ok(Answer {
        id: row.get(0)?,
        question_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        message: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        is_moderator: row.get(3)?,
        created_at: row.get(4)?,
    })
}
