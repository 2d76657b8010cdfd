//! Core trait definitions for the question repository and session storage.
//!
//! These async traits are implemented by the `practica-store` crate (SQLite
//! and in-memory backends). The engine only talks to them through
//! `Arc<dyn ...>`, so backends can be swapped without touching the planner,
//! sampler or session logic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::BankSnapshot;
use crate::error::EngineError;
use crate::model::{
    AnswerOption, OfficialExam, Question, Score, Session, SessionQuestion, UserQuestionHistory,
};

// ---------------------------------------------------------------------------
// Question repository trait
// ---------------------------------------------------------------------------

/// Read access to the scope catalog, question pool and frozen exams.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Read snapshot of one position: its curriculum tree, the laws its
    /// scopes reference, and every question tagged with one of those laws.
    async fn snapshot(&self, position_id: &str) -> Result<BankSnapshot, EngineError>;

    /// Fetch questions by id regardless of eligibility. Unknown ids are
    /// omitted from the result.
    async fn questions(&self, ids: &[String]) -> Result<Vec<Question>, EngineError>;

    /// Load a frozen official exam.
    async fn official_exam(&self, exam_id: &str) -> Result<OfficialExam, EngineError>;
}

// ---------------------------------------------------------------------------
// Session store trait
// ---------------------------------------------------------------------------

/// Outcome of one question in a completed session, fed into the history aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: String,
    pub correct: bool,
}

/// What `SessionStore::complete_session` graded and stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedSession {
    pub score: Score,
    /// Session questions in ordinal order, with `is_correct` filled in.
    pub questions: Vec<SessionQuestion>,
}

/// Write-heavy session state.
///
/// Implementations must make `insert_session` all-or-nothing, make
/// `upsert_answer` an atomic write keyed by (session, ordinal), and make
/// `complete_session` succeed at most once per session. Completion reads
/// the answers it grades under the same lock or transaction that marks the
/// session completed, so no answer can land between grading and the write.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a session and its ordered questions in one transaction.
    async fn insert_session(
        &self,
        session: &Session,
        questions: &[SessionQuestion],
    ) -> Result<(), EngineError>;

    async fn session(&self, id: Uuid) -> Result<Option<Session>, EngineError>;

    /// Session questions ordered by ordinal, with recorded answers.
    async fn session_questions(&self, id: Uuid) -> Result<Vec<SessionQuestion>, EngineError>;

    /// Record or overwrite the answer at `ordinal`.
    ///
    /// Fails with `NotFound` for an unknown session or ordinal and with
    /// `AlreadyCompleted` once the session has been scored.
    async fn upsert_answer(
        &self,
        id: Uuid,
        ordinal: u32,
        answer: AnswerOption,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError>;

    /// Grade the recorded answers against `questions`, store per-ordinal
    /// correctness and the score, and mark the session completed. Fails with
    /// `AlreadyCompleted` if it already was.
    async fn complete_session(
        &self,
        id: Uuid,
        questions: &HashMap<String, Question>,
        at: DateTime<Utc>,
    ) -> Result<GradedSession, EngineError>;

    /// A user's history keyed by question id.
    async fn user_history(
        &self,
        user_id: &str,
    ) -> Result<HashMap<String, UserQuestionHistory>, EngineError>;

    /// Fold a completed session's outcomes into the user's history.
    async fn record_history(
        &self,
        user_id: &str,
        outcomes: &[QuestionOutcome],
        at: DateTime<Utc>,
    ) -> Result<(), EngineError>;
}

impl UserQuestionHistory {
    /// Fold one more attempt into this aggregate.
    pub fn record(&mut self, correct: bool, at: DateTime<Utc>) {
        self.attempts += 1;
        if correct {
            self.correct += 1;
        }
        if at > self.last_seen_at {
            self.last_seen_at = at;
        }
    }

    /// Aggregate for a first attempt.
    pub fn first(user_id: &str, outcome: &QuestionOutcome, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            question_id: outcome.question_id.clone(),
            attempts: 1,
            correct: u32::from(outcome.correct),
            last_seen_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn history_accumulates_attempts() {
        let t0 = Utc::now();
        let outcome = QuestionOutcome {
            question_id: "q1".into(),
            correct: true,
        };
        let mut h = UserQuestionHistory::first("u1", &outcome, t0);
        assert_eq!(h.attempts, 1);
        assert_eq!(h.correct, 1);

        h.record(false, t0 + Duration::minutes(5));
        assert_eq!(h.attempts, 2);
        assert_eq!(h.correct, 1);
        assert!((h.success_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(h.last_seen_at, t0 + Duration::minutes(5));

        // An older timestamp never moves last_seen_at backwards.
        h.record(true, t0);
        assert_eq!(h.last_seen_at, t0 + Duration::minutes(5));
    }
}
