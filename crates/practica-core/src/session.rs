//! Session manager.
//!
//! Coordinates planning, sampling and persistence of a session, answer
//! autosave, progress reads and the one-shot completion that scores it.
//! Lifecycle: `created` → `in_progress` (first answer) → `completed`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PracticaConfig;
use crate::error::{EngineError, TopicShortfall};
use crate::model::{
    AnswerOption, ExamRef, Question, Score, Session, SessionMode, SessionQuestion, SessionStatus,
};
use crate::planner::{plan_allocation, AllocationPlan, PlanRequest, Restriction, ShortfallPolicy};
use crate::sampler::{sample, ExclusionPolicy};
use crate::traits::{QuestionOutcome, QuestionRepository, SessionStore};

/// Configuration for the session manager.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle time after which an in-progress session reads as abandoned.
    pub staleness: Duration,
    /// Default shortfall policy when the request does not override it.
    pub shortfall_policy: ShortfallPolicy,
    /// History bias for practice sampling.
    pub exclusion: ExclusionPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            staleness: Duration::days(7),
            shortfall_policy: ShortfallPolicy::Strict,
            exclusion: ExclusionPolicy::PreferUnseen,
        }
    }
}

impl From<&PracticaConfig> for SessionConfig {
    fn from(config: &PracticaConfig) -> Self {
        Self {
            staleness: config.staleness(),
            shortfall_policy: config.shortfall_policy,
            exclusion: config.sampling,
        }
    }
}

/// Request to create a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub position_id: String,
    /// Requested question count. Ignored for replicas, whose size is fixed.
    pub total: usize,
    pub mode: SessionMode,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Exam to replay; required for `official-replica`.
    #[serde(default)]
    pub exam: Option<ExamRef>,
    #[serde(default)]
    pub restriction: Option<Restriction>,
    /// Overrides the configured shortfall policy.
    #[serde(default)]
    pub policy: Option<ShortfallPolicy>,
    /// Seed for a reproducible practice draw.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl CreateSessionRequest {
    pub fn practice(position_id: impl Into<String>, total: usize) -> Self {
        Self {
            position_id: position_id.into(),
            total,
            mode: SessionMode::Practice,
            user_id: None,
            exam: None,
            restriction: None,
            policy: None,
            seed: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_policy(mut self, policy: ShortfallPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

/// One question as handed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetQuestion {
    pub ordinal: u32,
    pub question_id: String,
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default)]
    pub part: Option<String>,
    pub text: String,
    pub options: [String; 4],
    #[serde(default)]
    pub answer: Option<AnswerOption>,
    /// Withheld while an official replica is in progress.
    #[serde(default)]
    pub correct: Option<AnswerOption>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub is_correct: Option<bool>,
}

/// A session with its ordered questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSheet {
    pub session: Session,
    pub questions: Vec<SheetQuestion>,
    /// Shortfalls accepted under a best-effort policy.
    #[serde(default)]
    pub shortfalls: Vec<TopicShortfall>,
}

/// Answered/total counts for one topic or exam part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressGroup {
    pub label: String,
    pub answered: usize,
    pub total: usize,
}

/// Resume information for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub session_id: Uuid,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub answered: usize,
    pub total: usize,
    /// Where a resumed client should continue. `None` when everything is answered.
    pub first_unanswered: Option<u32>,
    /// Per-part counts for replicas, per-topic counts for practice.
    pub groups: Vec<ProgressGroup>,
    #[serde(default)]
    pub score: Option<Score>,
}

/// The session manager.
pub struct SessionManager {
    pub(crate) bank: Arc<dyn QuestionRepository>,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        bank: Arc<dyn QuestionRepository>,
        store: Arc<dyn SessionStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            bank,
            store,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Dry-run allocation against the current bank. Nothing is sampled or stored.
    pub async fn plan(&self, request: &PlanRequest) -> Result<AllocationPlan, EngineError> {
        let snapshot = self.bank.snapshot(&request.position_id).await?;
        plan_allocation(&snapshot, request)
    }

    /// Create a session and persist it with its ordered questions.
    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<SessionSheet, EngineError> {
        match request.mode {
            SessionMode::Practice => self.create_practice_session(request).await,
            SessionMode::OfficialReplica => {
                let exam = request.exam.clone().ok_or_else(|| {
                    EngineError::Configuration(
                        "official-replica sessions need an exam reference".into(),
                    )
                })?;
                let sheet = self
                    .create_replica_session(exam, request.user_id.clone())
                    .await?;
                if sheet.session.position_id != request.position_id {
                    tracing::warn!(
                        "exam {} belongs to position '{}', request named '{}'",
                        sheet.session.exam.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                        sheet.session.position_id,
                        request.position_id
                    );
                }
                Ok(sheet)
            }
        }
    }

    async fn create_practice_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<SessionSheet, EngineError> {
        let policy = request.policy.unwrap_or(self.config.shortfall_policy);
        let user_id = request.user_id.clone();

        let (snapshot, history) = futures::try_join!(
            self.bank.snapshot(&request.position_id),
            async {
                match user_id.as_deref() {
                    Some(user) => self.store.user_history(user).await,
                    None => Ok(HashMap::new()),
                }
            }
        )?;

        let plan = plan_allocation(
            &snapshot,
            &PlanRequest {
                position_id: request.position_id.clone(),
                total: request.total,
                restriction: request.restriction.clone(),
                policy,
            },
        )?;

        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let drawn = sample(
            &snapshot,
            &plan,
            &history,
            self.config.exclusion,
            &mut rng,
        )?;

        if drawn.drawn.is_empty()
            || (!drawn.shortfalls.is_empty() && policy == ShortfallPolicy::Strict)
        {
            let mut shortfalls = plan.shortfalls.clone();
            shortfalls.extend(drawn.shortfalls.clone());
            return Err(EngineError::InsufficientQuestions {
                requested: request.total,
                achievable: drawn.drawn.len(),
                shortfalls,
            });
        }

        let session = Session {
            id: Uuid::new_v4(),
            position_id: request.position_id.clone(),
            target_count: request.total,
            mode: SessionMode::Practice,
            user_id,
            exam: None,
            review_of: None,
            started_at: Utc::now(),
            last_activity_at: None,
            completed_at: None,
            score: None,
        };
        let session_questions: Vec<SessionQuestion> = drawn
            .drawn
            .iter()
            .enumerate()
            .map(|(i, d)| SessionQuestion {
                session_id: session.id,
                ordinal: i as u32 + 1,
                question_id: d.question_id.clone(),
                topic_id: Some(d.topic_id.clone()),
                part: None,
                answer: None,
                is_correct: None,
                answered_at: None,
            })
            .collect();

        self.store
            .insert_session(&session, &session_questions)
            .await?;
        tracing::info!(
            "created practice session {} for position '{}' ({} of {} questions)",
            session.id,
            session.position_id,
            session_questions.len(),
            request.total
        );

        let questions: HashMap<String, Question> = snapshot
            .questions
            .into_iter()
            .map(|q| (q.id.clone(), q))
            .collect();
        let mut shortfalls = plan.shortfalls;
        shortfalls.extend(drawn.shortfalls);
        Ok(build_sheet(session, &session_questions, &questions, shortfalls))
    }

    /// Persist an already ordered question list as a new session.
    pub(crate) async fn persist_fixed_session(
        &self,
        session: Session,
        session_questions: Vec<SessionQuestion>,
        questions: &HashMap<String, Question>,
    ) -> Result<SessionSheet, EngineError> {
        self.store
            .insert_session(&session, &session_questions)
            .await?;
        Ok(build_sheet(session, &session_questions, questions, Vec::new()))
    }

    /// Load a session and check that `caller` may touch it.
    pub(crate) async fn authorized_session(
        &self,
        session_id: Uuid,
        caller: Option<&str>,
    ) -> Result<Session, EngineError> {
        let session = self
            .store
            .session(session_id)
            .await?
            .ok_or_else(|| EngineError::not_found("session", session_id.to_string()))?;
        if !session.is_accessible_by(caller) {
            return Err(EngineError::Forbidden(session_id.to_string()));
        }
        Ok(session)
    }

    /// Record (or overwrite) the answer at `ordinal`. Safe to retry verbatim.
    pub async fn record_answer(
        &self,
        session_id: Uuid,
        ordinal: u32,
        answer: AnswerOption,
        caller: Option<&str>,
    ) -> Result<(), EngineError> {
        let session = self.authorized_session(session_id, caller).await?;
        if session.is_completed() {
            return Err(EngineError::AlreadyCompleted(session_id.to_string()));
        }
        self.store
            .upsert_answer(session_id, ordinal, answer, Utc::now())
            .await?;
        tracing::debug!("session {session_id}: ordinal {ordinal} = {answer}");
        Ok(())
    }

    /// Answered counts, resume point and per-group breakdown.
    pub async fn get_progress(
        &self,
        session_id: Uuid,
        caller: Option<&str>,
    ) -> Result<Progress, EngineError> {
        let session = self.authorized_session(session_id, caller).await?;
        let session_questions = self.store.session_questions(session_id).await?;

        let answered = session_questions
            .iter()
            .filter(|sq| sq.answer.is_some())
            .count();
        let first_unanswered = session_questions
            .iter()
            .find(|sq| sq.answer.is_none())
            .map(|sq| sq.ordinal);

        let mut groups: Vec<ProgressGroup> = Vec::new();
        for sq in &session_questions {
            let label = match session.mode {
                SessionMode::OfficialReplica => sq.part.clone(),
                SessionMode::Practice => sq.topic_id.clone(),
            }
            .unwrap_or_else(|| "-".to_string());
            let idx = match groups.iter().position(|g| g.label == label) {
                Some(idx) => idx,
                None => {
                    groups.push(ProgressGroup {
                        label,
                        answered: 0,
                        total: 0,
                    });
                    groups.len() - 1
                }
            };
            groups[idx].total += 1;
            if sq.answer.is_some() {
                groups[idx].answered += 1;
            }
        }

        Ok(Progress {
            session_id,
            mode: session.mode,
            status: session.status(Utc::now(), self.config.staleness),
            answered,
            total: session_questions.len(),
            first_unanswered,
            groups,
            score: session.score,
        })
    }

    /// Score and close the session. Call-once: a second call fails with
    /// `AlreadyCompleted` and leaves the stored score untouched.
    pub async fn complete_session(
        &self,
        session_id: Uuid,
        caller: Option<&str>,
    ) -> Result<Score, EngineError> {
        let session = self.authorized_session(session_id, caller).await?;
        if session.is_completed() {
            return Err(EngineError::AlreadyCompleted(session_id.to_string()));
        }

        // Pinned question ids never change, so the content can be loaded up
        // front; the answers themselves are read inside the store's completion.
        let pinned = self.store.session_questions(session_id).await?;
        let questions = self.questions_for(&pinned).await?;
        let graded = self
            .store
            .complete_session(session_id, &questions, Utc::now())
            .await?;
        let score = graded.score;
        tracing::info!(
            "completed session {session_id}: {}/{} correct ({}%)",
            score.correct_count,
            score.total,
            score.percentage
        );

        if let Some(user) = &session.user_id {
            let outcomes: Vec<QuestionOutcome> = graded
                .questions
                .iter()
                .map(|sq| QuestionOutcome {
                    question_id: sq.question_id.clone(),
                    correct: sq.is_correct == Some(true),
                })
                .collect();
            // The history aggregate is best effort; the score is already final.
            if let Err(e) = self
                .store
                .record_history(user, &outcomes, Utc::now())
                .await
            {
                tracing::warn!("history refresh failed for session {session_id}: {e}");
            }
        }

        Ok(score)
    }

    /// The ordered sheet with recorded answers, for resume or post-completion review.
    pub async fn review_session(
        &self,
        session_id: Uuid,
        caller: Option<&str>,
    ) -> Result<SessionSheet, EngineError> {
        let session = self.authorized_session(session_id, caller).await?;
        let session_questions = self.store.session_questions(session_id).await?;
        let questions = self.questions_for(&session_questions).await?;
        Ok(build_sheet(session, &session_questions, &questions, Vec::new()))
    }

    pub(crate) async fn questions_for(
        &self,
        session_questions: &[SessionQuestion],
    ) -> Result<HashMap<String, Question>, EngineError> {
        let ids: Vec<String> = session_questions
            .iter()
            .map(|sq| sq.question_id.clone())
            .collect();
        Ok(self
            .bank
            .questions(&ids)
            .await?
            .into_iter()
            .map(|q| (q.id.clone(), q))
            .collect())
    }
}

/// Join session questions with their question content.
///
/// Correct answers and explanations are withheld while an official replica
/// is still open.
fn build_sheet(
    session: Session,
    session_questions: &[SessionQuestion],
    questions: &HashMap<String, Question>,
    shortfalls: Vec<TopicShortfall>,
) -> SessionSheet {
    let reveal = !(session.mode == SessionMode::OfficialReplica && !session.is_completed());
    let sheet_questions = session_questions
        .iter()
        .map(|sq| {
            let question = questions.get(&sq.question_id);
            SheetQuestion {
                ordinal: sq.ordinal,
                question_id: sq.question_id.clone(),
                topic_id: sq.topic_id.clone(),
                part: sq.part.clone(),
                text: question.map(|q| q.text.clone()).unwrap_or_default(),
                options: question.map(|q| q.options.clone()).unwrap_or_default(),
                answer: sq.answer,
                correct: question.filter(|_| reveal).map(|q| q.correct),
                explanation: question
                    .filter(|_| reveal)
                    .map(|q| q.explanation.clone()),
                is_correct: sq.is_correct,
            }
        })
        .collect();
    SessionSheet {
        session,
        questions: sheet_questions,
        shortfalls,
    }
}
