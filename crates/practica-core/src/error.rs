//! Engine error types.
//!
//! Every failure an operation can surface is one of these variants. Planner
//! and sampler errors are synchronous and deterministic, so callers can match
//! on the variant instead of the message to decide between aborting, retrying
//! a best-effort plan, or reporting a configuration problem to an operator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A topic whose eligible pool could not cover its quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicShortfall {
    /// Topic identifier.
    pub topic_id: String,
    /// Quota the topic was asked for before capping.
    pub requested: usize,
    /// Number of eligible questions actually available.
    pub available: usize,
    /// `requested - available`.
    pub shortfall: usize,
}

/// Errors produced by the allocation, sampling, session and replica layers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operator-fixable catalog problem (zero weight, bad request, broken frozen plan).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The eligible pool cannot satisfy the requested total.
    #[error("insufficient questions: requested {requested}, achievable {achievable}")]
    InsufficientQuestions {
        requested: usize,
        achievable: usize,
        shortfalls: Vec<TopicShortfall>,
    },

    /// A topic restriction named a topic or block the position does not have.
    #[error("topic not found: {0}")]
    TopicNotFound(String),

    /// A topic's scope resolves to zero articles.
    #[error("topic '{topic_id}' has no eligible questions: {reason}")]
    NoEligibleQuestions { topic_id: String, reason: String },

    /// The caller does not own the session.
    #[error("forbidden: session {0} belongs to another user")]
    Forbidden(String),

    /// Unknown session, question, ordinal, position or exam.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The session was already completed; its score is immutable.
    #[error("session {0} is already completed")]
    AlreadyCompleted(String),

    /// The backing store failed. Safe to retry for idempotent operations.
    #[error("storage error: {0}")]
    Storage(String),

    /// The store is in a state a retry cannot repair (poisoned lock,
    /// inconsistent rows).
    #[error("internal storage failure: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable machine-readable name of the variant, for logs and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Configuration(_) => "configuration",
            EngineError::InsufficientQuestions { .. } => "insufficient_questions",
            EngineError::TopicNotFound(_) => "topic_not_found",
            EngineError::NoEligibleQuestions { .. } => "no_eligible_questions",
            EngineError::Forbidden(_) => "forbidden",
            EngineError::NotFound { .. } => "not_found",
            EngineError::AlreadyCompleted(_) => "already_completed",
            EngineError::Storage(_) => "storage",
            EngineError::Internal(_) => "internal",
        }
    }

    /// Returns `true` if repeating the same call may succeed.
    ///
    /// Only storage failures qualify: allocation and sampling are pure
    /// functions of their input and reproduce the same error every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Storage(_))
    }

    /// Returns `true` for errors an operator fixes by editing the catalog.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::Configuration(_)
                | EngineError::TopicNotFound(_)
                | EngineError::NoEligibleQuestions { .. }
        )
    }

    /// Per-topic shortfall detail, if this is an `InsufficientQuestions` error.
    pub fn shortfalls(&self) -> &[TopicShortfall] {
        match self {
            EngineError::InsufficientQuestions { shortfalls, .. } => shortfalls,
            _ => &[],
        }
    }
}
