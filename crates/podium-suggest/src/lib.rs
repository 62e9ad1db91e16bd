//! Answer suggestion gateway.
//!
//! Given question text, a [`Suggester`] produces a confidence-scored
//! answer suggestion. The gateway is stateless and has no ordering or
//! consistency concerns; its one hard requirement is that it never
//! blocks the question/answer flow: the HTTP-backed implementation runs
//! under a bounded timeout and degrades to a deterministic mock response
//! on any failure, so callers never see an error from this path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout for the remote suggestion service.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A confidence-scored answer suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// The question the suggestion answers.
    pub question: String,
    /// Suggested answer text.
    pub suggested_answer: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Where the suggestion came from.
    pub sources: Vec<String>,
}

/// Produces answer suggestions for question text.
#[async_trait]
pub trait Suggester: Send + Sync {
    /// Returns a suggestion for the given question. Infallible by
    /// contract: implementations degrade to a fallback rather than
    /// propagate errors.
    async fn suggest(&self, question: &str) -> Suggestion;
}

/// Deterministic suggester used as the fallback and in tests.
///
/// Picks a canned response by question keyword with a fixed confidence,
/// so repeated calls with the same question always yield the same
/// suggestion.
#[derive(Debug, Clone, Default)]
pub struct MockSuggester;

/// Keyword-keyed canned responses, matched against the start of the
/// lowercased question.
const CANNED: &[(&str, &str)] = &[
    (
        "how",
        "To accomplish this, work through it in stages: research the \
         requirements, plan an approach, implement it, and test \
         thoroughly. Adapt the framework to your specific situation.",
    ),
    (
        "what",
        "The answer depends on the core concepts involved and how they \
         apply to your context. Start from an authoritative reference \
         on the specific topic you are asking about.",
    ),
    (
        "why",
        "There are usually several contributing reasons: historical \
         context, technical requirements, and established practice in \
         the field. Understanding those factors clarifies the reasoning.",
    ),
    (
        "when",
        "The timing depends on your requirements and constraints. \
         Consider the surrounding context and plan accordingly.",
    ),
    (
        "where",
        "The right placement depends on your use case. Weigh \
         accessibility, performance, and maintainability.",
    ),
];

/// Confidence for a keyword match.
const KEYWORD_CONFIDENCE: f64 = 0.75;
/// Confidence for the generic fallback response.
const GENERIC_CONFIDENCE: f64 = 0.60;

#[async_trait]
impl Suggester for MockSuggester {
    async fn suggest(&self, question: &str) -> Suggestion {
        let lowered = question.to_lowercase();

        for (keyword, response) in CANNED {
            if lowered.starts_with(keyword) {
                return Suggestion {
                    question: question.to_string(),
                    suggested_answer: (*response).to_string(),
                    confidence: KEYWORD_CONFIDENCE,
                    sources: vec!["canned-knowledge-base".to_string()],
                };
            }
        }

        Suggestion {
            question: question.to_string(),
            suggested_answer: "Thank you for your question. For an accurate answer, \
                 consult an authoritative source or a domain expert; adding more \
                 context to the question will also help a responder."
                .to_string(),
            confidence: GENERIC_CONFIDENCE,
            sources: vec!["canned-knowledge-base".to_string()],
        }
    }
}

/// Wire shape expected from the remote suggestion service.
#[derive(Debug, Deserialize)]
struct RemoteSuggestion {
    suggested_answer: String,
    confidence: f64,
    #[serde(default)]
    sources: Vec<String>,
}

/// HTTP-backed suggester with a bounded timeout and mock fallback.
pub struct HttpSuggester {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    fallback: MockSuggester,
}

impl HttpSuggester {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout,
            fallback: MockSuggester,
        }
    }

    async fn fetch(&self, question: &str) -> Result<Suggestion, String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "question": question }))
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("service returned error status: {e}"))?;

        let remote: RemoteSuggestion = response
            .json()
            .await
            .map_err(|e| format!("invalid response body: {e}"))?;

        Ok(Suggestion {
            question: question.to_string(),
            suggested_answer: remote.suggested_answer,
            confidence: remote.confidence.clamp(0.0, 1.0),
            sources: remote.sources,
        })
    }
}

#[async_trait]
impl Suggester for HttpSuggester {
    async fn suggest(&self, question: &str) -> Suggestion {
        match tokio::time::timeout(self.timeout, self.fetch(question)).await {
            Ok(Ok(suggestion)) => suggestion,
            Ok(Err(e)) => {
                tracing::warn!("suggestion service failed, using fallback: {}", e);
                self.fallback.suggest(question).await
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "suggestion service timed out, using fallback"
                );
                self.fallback.suggest(question).await
            }
        }
    }
}
