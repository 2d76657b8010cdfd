//! Official exam replicas and failures-only review sessions.
//!
//! A replica reproduces a frozen exam (or one of its parts) question for
//! question, in recorded order. Nothing here is sampled or weighted, so two
//! replicas of the same exam part always carry the same ordered id list.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{ExamRef, OfficialExam, Question, Session, SessionMode, SessionQuestion};
use crate::session::{SessionManager, SessionSheet};

/// One frozen question slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenEntry {
    pub ordinal: u32,
    pub question_id: String,
    pub part: String,
}

/// The ordered question list of an exam (or exam part).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenPlan {
    pub exam: ExamRef,
    pub position_id: String,
    pub entries: Vec<FrozenEntry>,
}

impl FrozenPlan {
    pub fn question_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.question_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flatten an exam into its frozen plan. `part = None` takes every part in
/// recorded order; ordinals are contiguous across parts.
pub fn freeze(exam: &OfficialExam, part: Option<&str>) -> Result<FrozenPlan, EngineError> {
    let parts: Vec<_> = match part {
        Some(name) => {
            let found = exam
                .parts
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| EngineError::not_found("exam part", format!("{}/{name}", exam.id)))?;
            vec![found]
        }
        None => exam.parts.iter().collect(),
    };

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for p in parts {
        for id in &p.question_ids {
            if !seen.insert(id.as_str()) {
                return Err(EngineError::Configuration(format!(
                    "exam {} lists question '{id}' more than once",
                    exam.id
                )));
            }
            entries.push(FrozenEntry {
                ordinal: entries.len() as u32 + 1,
                question_id: id.clone(),
                part: p.name.clone(),
            });
        }
    }

    if entries.is_empty() {
        return Err(EngineError::Configuration(format!(
            "exam {} has no questions",
            exam.id
        )));
    }

    Ok(FrozenPlan {
        exam: ExamRef {
            exam_id: exam.id.clone(),
            part: part.map(str::to_string),
        },
        position_id: exam.position_id.clone(),
        entries,
    })
}

/// Result of checking a frozen plan against the current question repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub exam: Option<ExamRef>,
    pub total: usize,
    /// Referenced ids that no longer exist.
    pub missing: Vec<String>,
    /// Referenced questions that have been deactivated.
    pub inactive: Vec<String>,
    /// Referenced questions whose review status is not approved. Informational.
    pub unapproved: Vec<String>,
}

impl IntegrityReport {
    /// `true` when every referenced question exists and is active.
    pub fn is_intact(&self) -> bool {
        self.missing.is_empty() && self.inactive.is_empty()
    }
}

pub fn check_integrity(plan: &FrozenPlan, questions: &[Question]) -> IntegrityReport {
    let by_id: HashMap<&str, &Question> = questions.iter().map(|q| (q.id.as_str(), q)).collect();
    let mut report = IntegrityReport {
        exam: Some(plan.exam.clone()),
        total: plan.entries.len(),
        ..Default::default()
    };
    for entry in &plan.entries {
        match by_id.get(entry.question_id.as_str()) {
            None => report.missing.push(entry.question_id.clone()),
            Some(q) if !q.active => report.inactive.push(entry.question_id.clone()),
            Some(q) if !q.review_status.is_approved() => {
                report.unapproved.push(entry.question_id.clone())
            }
            Some(_) => {}
        }
    }
    report
}

impl SessionManager {
    /// Load, freeze and integrity-check an exam part without creating a session.
    pub async fn verify_replica(
        &self,
        exam_id: &str,
        part: Option<&str>,
    ) -> Result<(FrozenPlan, IntegrityReport), EngineError> {
        let exam = self.bank.official_exam(exam_id).await?;
        let plan = freeze(&exam, part)?;
        let questions = self.bank.questions(&plan.question_ids()).await?;
        let report = check_integrity(&plan, &questions);
        Ok((plan, report))
    }

    /// Create an `official-replica` session reproducing the exam part exactly.
    ///
    /// Fails with a configuration error if any referenced question is
    /// missing or inactive; a replica is never silently patched.
    pub async fn create_replica_session(
        &self,
        exam: ExamRef,
        user_id: Option<String>,
    ) -> Result<SessionSheet, EngineError> {
        let official = self.bank.official_exam(&exam.exam_id).await?;
        let plan = freeze(&official, exam.part.as_deref())?;
        let questions = self.bank.questions(&plan.question_ids()).await?;
        let report = check_integrity(&plan, &questions);
        if !report.is_intact() {
            tracing::warn!(
                "replica {} broken: {} missing, {} inactive",
                plan.exam,
                report.missing.len(),
                report.inactive.len()
            );
            return Err(EngineError::Configuration(format!(
                "exam {} references unavailable questions: missing [{}], inactive [{}]",
                plan.exam,
                report.missing.join(", "),
                report.inactive.join(", ")
            )));
        }

        let session = Session {
            id: Uuid::new_v4(),
            position_id: plan.position_id.clone(),
            target_count: plan.len(),
            mode: SessionMode::OfficialReplica,
            user_id,
            exam: Some(plan.exam.clone()),
            review_of: None,
            started_at: Utc::now(),
            last_activity_at: None,
            completed_at: None,
            score: None,
        };
        let session_questions: Vec<SessionQuestion> = plan
            .entries
            .iter()
            .map(|e| SessionQuestion {
                session_id: session.id,
                ordinal: e.ordinal,
                question_id: e.question_id.clone(),
                topic_id: None,
                part: Some(e.part.clone()),
                answer: None,
                is_correct: None,
                answered_at: None,
            })
            .collect();
        let by_id: HashMap<String, Question> =
            questions.into_iter().map(|q| (q.id.clone(), q)).collect();

        tracing::info!(
            "created replica session {} for {} ({} questions)",
            session.id,
            plan.exam,
            session_questions.len()
        );
        self.persist_fixed_session(session, session_questions, &by_id)
            .await
    }

    /// Create a new replica session holding only the questions the caller got
    /// wrong or left blank in a completed replica. Parts are kept; ordinals
    /// are renumbered from 1.
    pub async fn create_failure_review(
        &self,
        source_id: Uuid,
        caller: Option<&str>,
    ) -> Result<SessionSheet, EngineError> {
        let source = self.authorized_session(source_id, caller).await?;
        if source.mode != SessionMode::OfficialReplica {
            return Err(EngineError::Configuration(format!(
                "session {source_id} is not an official replica"
            )));
        }
        if !source.is_completed() {
            return Err(EngineError::Configuration(format!(
                "session {source_id} has not been completed"
            )));
        }

        let failed: Vec<SessionQuestion> = self
            .store
            .session_questions(source_id)
            .await?
            .into_iter()
            .filter(|sq| sq.is_correct != Some(true))
            .collect();
        if failed.is_empty() {
            return Err(EngineError::not_found(
                "failed question",
                source_id.to_string(),
            ));
        }

        let session = Session {
            id: Uuid::new_v4(),
            position_id: source.position_id.clone(),
            target_count: failed.len(),
            mode: SessionMode::OfficialReplica,
            user_id: source.user_id.clone(),
            exam: source.exam.clone(),
            review_of: Some(source_id),
            started_at: Utc::now(),
            last_activity_at: None,
            completed_at: None,
            score: None,
        };
        let session_questions: Vec<SessionQuestion> = failed
            .iter()
            .enumerate()
            .map(|(i, sq)| SessionQuestion {
                session_id: session.id,
                ordinal: i as u32 + 1,
                question_id: sq.question_id.clone(),
                topic_id: sq.topic_id.clone(),
                part: sq.part.clone(),
                answer: None,
                is_correct: None,
                answered_at: None,
            })
            .collect();
        let questions = self.questions_for(&session_questions).await?;

        tracing::info!(
            "created failure review {} of session {source_id} ({} questions)",
            session.id,
            session_questions.len()
        );
        self.persist_fixed_session(session, session_questions, &questions)
            .await
    }
}
