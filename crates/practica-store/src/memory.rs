//! In-memory backend for tests and embedding.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use practica_core::catalog::{Bank, BankSnapshot};
use practica_core::error::EngineError;
use practica_core::model::{
    AnswerOption, OfficialExam, Question, Session, SessionQuestion, UserQuestionHistory,
};
use practica_core::scoring::grade;
use practica_core::traits::{GradedSession, QuestionOutcome, QuestionRepository, SessionStore};

use crate::error::StoreError;

#[derive(Debug, Default)]
struct SessionState {
    sessions: HashMap<Uuid, Session>,
    questions: HashMap<Uuid, Vec<SessionQuestion>>,
    history: HashMap<(String, String), UserQuestionHistory>,
}

/// Bank and sessions held in process memory.
///
/// One mutex guards all session state, so every write is atomic with
/// respect to every other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bank: RwLock<Bank>,
    state: Mutex<SessionState>,
}

impl MemoryStore {
    pub fn new(bank: Bank) -> Self {
        Self {
            bank: RwLock::new(bank),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Replace the whole bank.
    pub async fn load_bank(&self, bank: Bank) {
        *self.bank.write().await = bank;
    }

    /// Insert or replace a question by id.
    pub async fn upsert_question(&self, question: Question) {
        let mut bank = self.bank.write().await;
        match bank.questions.iter_mut().find(|q| q.id == question.id) {
            Some(existing) => *existing = question,
            None => bank.questions.push(question),
        }
    }

    pub async fn remove_question(&self, question_id: &str) -> bool {
        let mut bank = self.bank.write().await;
        let before = bank.questions.len();
        bank.questions.retain(|q| q.id != question_id);
        bank.questions.len() != before
    }

    pub async fn set_question_active(
        &self,
        question_id: &str,
        active: bool,
    ) -> Result<(), StoreError> {
        let mut bank = self.bank.write().await;
        let question = bank
            .questions
            .iter_mut()
            .find(|q| q.id == question_id)
            .ok_or_else(|| StoreError::not_found("question", question_id))?;
        question.active = active;
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }
}

#[async_trait]
impl QuestionRepository for MemoryStore {
    async fn snapshot(&self, position_id: &str) -> Result<BankSnapshot, EngineError> {
        self.bank.read().await.snapshot(position_id)
    }

    async fn questions(&self, ids: &[String]) -> Result<Vec<Question>, EngineError> {
        let bank = self.bank.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| bank.questions.iter().find(|q| &q.id == id).cloned())
            .collect())
    }

    async fn official_exam(&self, exam_id: &str) -> Result<OfficialExam, EngineError> {
        self.bank
            .read()
            .await
            .exam(exam_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("exam", exam_id))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(
        &self,
        session: &Session,
        questions: &[SessionQuestion],
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        if state.sessions.contains_key(&session.id) {
            return Err(StoreError::Corrupt(format!("session {} already exists", session.id)).into());
        }
        let mut ordinals = HashSet::new();
        if let Some(dup) = questions.iter().find(|sq| !ordinals.insert(sq.ordinal)) {
            return Err(StoreError::Corrupt(format!(
                "session {} pins ordinal {} twice",
                session.id, dup.ordinal
            ))
            .into());
        }
        state.sessions.insert(session.id, session.clone());
        state.questions.insert(session.id, questions.to_vec());
        Ok(())
    }

    async fn session(&self, id: Uuid) -> Result<Option<Session>, EngineError> {
        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }

    async fn session_questions(&self, id: Uuid) -> Result<Vec<SessionQuestion>, EngineError> {
        let state = self.state.lock().await;
        let mut questions = state
            .questions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("session", id.to_string()))?;
        questions.sort_by_key(|sq| sq.ordinal);
        Ok(questions)
    }

    async fn upsert_answer(
        &self,
        id: Uuid,
        ordinal: u32,
        answer: AnswerOption,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("session", id.to_string()))?;
        if session.is_completed() {
            return Err(StoreError::AlreadyCompleted(id.to_string()).into());
        }
        let slot = state
            .questions
            .get_mut(&id)
            .and_then(|qs| qs.iter_mut().find(|sq| sq.ordinal == ordinal))
            .ok_or_else(|| StoreError::not_found("ordinal", format!("{id}#{ordinal}")))?;

        slot.answer = Some(answer);
        slot.answered_at = Some(at);
        session.last_activity_at = Some(at);
        Ok(())
    }

    async fn complete_session(
        &self,
        id: Uuid,
        questions: &HashMap<String, Question>,
        at: DateTime<Utc>,
    ) -> Result<GradedSession, EngineError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("session", id.to_string()))?;
        if session.is_completed() {
            return Err(StoreError::AlreadyCompleted(id.to_string()).into());
        }
        let pinned = state
            .questions
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("session", id.to_string()))?;
        pinned.sort_by_key(|sq| sq.ordinal);

        let (graded, score) = grade(pinned.as_slice(), questions);
        for (sq, (_, correct)) in pinned.iter_mut().zip(graded) {
            sq.is_correct = Some(correct);
        }
        session.completed_at = Some(at);
        session.score = Some(score);
        Ok(GradedSession {
            score,
            questions: pinned.clone(),
        })
    }

    async fn user_history(
        &self,
        user_id: &str,
    ) -> Result<HashMap<String, UserQuestionHistory>, EngineError> {
        let state = self.state.lock().await;
        Ok(state
            .history
            .values()
            .filter(|h| h.user_id == user_id)
            .map(|h| (h.question_id.clone(), h.clone()))
            .collect())
    }

    async fn record_history(
        &self,
        user_id: &str,
        outcomes: &[QuestionOutcome],
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        for outcome in outcomes {
            state
                .history
                .entry((user_id.to_string(), outcome.question_id.clone()))
                .and_modify(|h| h.record(outcome.correct, at))
                .or_insert_with(|| UserQuestionHistory::first(user_id, outcome, at));
        }
        Ok(())
    }
}
