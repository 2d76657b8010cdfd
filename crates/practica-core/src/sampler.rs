//! Sampler: draws each topic's quota from its eligible pool.
//!
//! Candidates are split into preference tiers by the user's history (unseen
//! first, then weak, then the rest) and drawn tier by tier, uniformly at
//! random within a tier. Lower tiers are only touched when the preferred
//! ones run out, so the exclusion bias never starves a topic.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::BankSnapshot;
use crate::error::{EngineError, TopicShortfall};
use crate::model::{Question, UserQuestionHistory};
use crate::planner::AllocationPlan;

/// How strongly the user's history biases selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ExclusionPolicy {
    /// Ignore history.
    None,
    /// Prefer questions the user has never seen.
    #[default]
    PreferUnseen,
    /// Prefer unseen questions, then those answered correctly less than
    /// `threshold` of the time.
    PreferWeak { threshold: f64 },
}

/// One drawn question and the topic it was drawn for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnQuestion {
    pub topic_id: String,
    pub question_id: String,
}

/// Sampler output: the ordered draw plus anything that could not be filled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub drawn: Vec<DrawnQuestion>,
    /// Topics left short after overlap refill.
    pub shortfalls: Vec<TopicShortfall>,
}

impl Sample {
    pub fn question_ids(&self) -> Vec<String> {
        self.drawn.iter().map(|d| d.question_id.clone()).collect()
    }
}

fn tier(policy: ExclusionPolicy, history: Option<&UserQuestionHistory>) -> u8 {
    match (policy, history) {
        (ExclusionPolicy::None, _) | (_, None) => 0,
        (ExclusionPolicy::PreferUnseen, Some(_)) => 1,
        (ExclusionPolicy::PreferWeak { threshold }, Some(h)) => {
            if h.success_rate() < threshold {
                1
            } else {
                2
            }
        }
    }
}

/// Order candidates by preference tier, shuffling within each tier.
fn order_candidates<'a, R: Rng + ?Sized>(
    candidates: Vec<&'a Question>,
    history: &HashMap<String, UserQuestionHistory>,
    policy: ExclusionPolicy,
    rng: &mut R,
) -> Vec<&'a Question> {
    let mut tiers: [Vec<&Question>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for q in candidates {
        tiers[tier(policy, history.get(&q.id)) as usize].push(q);
    }
    let mut ordered = Vec::new();
    for mut t in tiers {
        t.shuffle(rng);
        ordered.extend(t);
    }
    ordered
}

/// Draw the plan's quotas from the snapshot.
///
/// A question drawn for an earlier topic is never drawn again for a later
/// one, even when scopes overlap. Any deficit that causes is refilled from
/// the topics' remaining eligible questions in declared order; what still
/// cannot be filled is reported in `Sample::shortfalls`.
pub fn sample<R: Rng + ?Sized>(
    snapshot: &BankSnapshot,
    plan: &AllocationPlan,
    history: &HashMap<String, UserQuestionHistory>,
    policy: ExclusionPolicy,
    rng: &mut R,
) -> Result<Sample, EngineError> {
    let mut used: HashSet<String> = HashSet::new();
    let mut per_topic: Vec<(String, Vec<String>, Vec<&Question>)> = Vec::new();
    let mut deficits: Vec<TopicShortfall> = Vec::new();

    for quota in &plan.quotas {
        let topic = snapshot
            .position
            .topic(&quota.topic_id)
            .ok_or_else(|| EngineError::TopicNotFound(quota.topic_id.clone()))?;
        let candidates: Vec<&Question> = snapshot
            .eligible_questions(topic)?
            .into_iter()
            .filter(|q| !used.contains(&q.id))
            .collect();
        let mut ordered = order_candidates(candidates, history, policy, rng);

        let take = quota.quota.min(ordered.len());
        let rest = ordered.split_off(take);
        let picked: Vec<String> = ordered.iter().map(|q| q.id.clone()).collect();
        used.extend(picked.iter().cloned());

        if take < quota.quota {
            deficits.push(TopicShortfall {
                topic_id: quota.topic_id.clone(),
                requested: quota.quota,
                available: take,
                shortfall: quota.quota - take,
            });
        }
        per_topic.push((quota.topic_id.clone(), picked, rest));
    }

    let mut missing: usize = deficits.iter().map(|d| d.shortfall).sum();
    if missing > 0 {
        tracing::debug!("refilling {missing} slot(s) lost to overlapping scopes");
        for (_, picked, rest) in &mut per_topic {
            for q in rest.iter() {
                if missing == 0 {
                    break;
                }
                if used.insert(q.id.clone()) {
                    picked.push(q.id.clone());
                    missing -= 1;
                }
            }
        }
    }

    let shortfalls = if missing == 0 {
        Vec::new()
    } else {
        // Attribute what is still missing to the topics that came up short, in order.
        let mut remaining = missing;
        deficits
            .into_iter()
            .filter_map(|mut d| {
                if remaining == 0 {
                    return None;
                }
                let s = d.shortfall.min(remaining);
                remaining -= s;
                d.shortfall = s;
                d.available = d.requested - s;
                Some(d)
            })
            .collect()
    };

    let drawn = per_topic
        .into_iter()
        .flat_map(|(topic_id, picked, _)| {
            picked.into_iter().map(move |question_id| DrawnQuestion {
                topic_id: topic_id.clone(),
                question_id,
            })
        })
        .collect();

    Ok(Sample { drawn, shortfalls })
}
