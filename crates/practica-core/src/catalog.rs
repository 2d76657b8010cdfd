//! Read snapshot of the scope catalog and question repository.
//!
//! The planner and sampler are pure functions of a `BankSnapshot`: one
//! position's curriculum tree, the laws its scopes reference, and the
//! questions tagged with those laws.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::{
    ArticleSelection, Law, OfficialExam, Position, Question, Topic, WHOLE_LAW_ARTICLE,
};

/// Everything allocation and sampling need for one position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankSnapshot {
    pub position: Position,
    pub laws: HashMap<String, Law>,
    pub questions: Vec<Question>,
}

/// A topic's scope after checking it against the law catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedScope {
    /// Laws covered in full.
    pub whole_laws: BTreeSet<String>,
    /// Explicit (law, article number) pairs that exist in the catalog.
    pub articles: BTreeSet<(String, String)>,
}

impl ResolvedScope {
    pub fn is_empty(&self) -> bool {
        self.whole_laws.is_empty() && self.articles.is_empty()
    }

    pub fn matches(&self, question: &Question) -> bool {
        let Some(article) = &question.article else {
            return false;
        };
        if self.whole_laws.contains(&article.law) {
            return true;
        }
        if article.number == WHOLE_LAW_ARTICLE {
            return false;
        }
        self.articles
            .contains(&(article.law.clone(), article.number.clone()))
    }
}

impl BankSnapshot {
    /// Resolve a topic's scope entries against the law catalog.
    ///
    /// Article numbers missing from a law are logged and skipped. A scope that
    /// ends up covering no article at all is a configuration error.
    pub fn resolve_scope(&self, topic: &Topic) -> Result<ResolvedScope, EngineError> {
        if topic.scopes.is_empty() {
            return Err(EngineError::NoEligibleQuestions {
                topic_id: topic.id.clone(),
                reason: "topic has no scope entries".into(),
            });
        }

        let mut resolved = ResolvedScope::default();
        for scope in &topic.scopes {
            let Some(law) = self.laws.get(&scope.law) else {
                tracing::warn!(
                    "topic '{}' references unknown law '{}'",
                    topic.id,
                    scope.law
                );
                continue;
            };
            match &scope.articles {
                ArticleSelection::WholeLaw => {
                    if law.articles.is_empty() {
                        tracing::warn!(
                            "topic '{}' covers law '{}' which has no articles",
                            topic.id,
                            law.id
                        );
                    } else {
                        resolved.whole_laws.insert(law.id.clone());
                    }
                }
                ArticleSelection::Numbers(numbers) => {
                    for number in numbers {
                        if law.has_article(number) {
                            resolved.articles.insert((law.id.clone(), number.clone()));
                        } else {
                            tracing::warn!(
                                "topic '{}' scope lists {} art. {} which does not exist",
                                topic.id,
                                law.id,
                                number
                            );
                        }
                    }
                }
            }
        }

        if resolved.is_empty() {
            return Err(EngineError::NoEligibleQuestions {
                topic_id: topic.id.clone(),
                reason: "scope resolves to zero articles".into(),
            });
        }
        Ok(resolved)
    }

    /// Eligible questions for a topic, ordered by question id.
    pub fn eligible_questions(&self, topic: &Topic) -> Result<Vec<&Question>, EngineError> {
        let scope = self.resolve_scope(topic)?;
        let mut eligible: Vec<&Question> = self
            .questions
            .iter()
            .filter(|q| q.is_eligible() && scope.matches(q))
            .collect();
        eligible.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(eligible)
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// A whole question bank as loaded from disk or imported into a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bank {
    pub laws: Vec<Law>,
    pub positions: Vec<Position>,
    pub questions: Vec<Question>,
    pub exams: Vec<OfficialExam>,
}

impl Bank {
    /// Append another bank's content. Duplicate ids are kept and reported
    /// by validation.
    pub fn merge(&mut self, other: Bank) {
        self.laws.extend(other.laws);
        self.positions.extend(other.positions);
        self.questions.extend(other.questions);
        self.exams.extend(other.exams);
    }

    pub fn is_empty(&self) -> bool {
        self.laws.is_empty()
            && self.positions.is_empty()
            && self.questions.is_empty()
            && self.exams.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn exam(&self, id: &str) -> Option<&OfficialExam> {
        self.exams.iter().find(|e| e.id == id)
    }

    /// Snapshot of one position: the laws its scopes reference and every
    /// question tagged with one of those laws.
    pub fn snapshot(&self, position_id: &str) -> Result<BankSnapshot, EngineError> {
        let position = self
            .position(position_id)
            .ok_or_else(|| EngineError::not_found("position", position_id))?
            .clone();
        let law_ids: BTreeSet<&str> = position
            .topics()
            .flat_map(|(_, t)| t.scopes.iter().map(|s| s.law.as_str()))
            .collect();
        let laws: HashMap<String, Law> = self
            .laws
            .iter()
            .filter(|l| law_ids.contains(l.id.as_str()))
            .map(|l| (l.id.clone(), l.clone()))
            .collect();
        let questions = self
            .questions
            .iter()
            .filter(|q| {
                q.article
                    .as_ref()
                    .is_some_and(|a| law_ids.contains(a.law.as_str()))
            })
            .cloned()
            .collect();
        Ok(BankSnapshot {
            position,
            laws,
            questions,
        })
    }
}
