//! Allocation planner: per-topic quotas by largest-remainder apportionment.
//!
//! Quotas are computed with the Hamilton method over the effective topic
//! weights of a position. Topics whose eligible pool is smaller than their
//! quota are capped and the deficit is re-apportioned over the remaining
//! topics with the same ranking, until demand is met or the pool runs dry.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::BankSnapshot;
use crate::error::{EngineError, TopicShortfall};
use crate::model::{Block, Position, Topic};

/// Remainders closer than this are treated as tied.
const REMAINDER_EPSILON: f64 = 1e-9;

/// What to do when the eligible pool cannot cover the requested total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy {
    /// Fail with `InsufficientQuestions`.
    #[default]
    Strict,
    /// Proceed with the achievable total.
    BestEffort,
}

impl fmt::Display for ShortfallPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShortfallPolicy::Strict => write!(f, "strict"),
            ShortfallPolicy::BestEffort => write!(f, "best_effort"),
        }
    }
}

impl FromStr for ShortfallPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "strict" => Ok(ShortfallPolicy::Strict),
            "best_effort" => Ok(ShortfallPolicy::BestEffort),
            other => Err(format!("unknown shortfall policy: {other}")),
        }
    }
}

/// Optional narrowing of a position to some topics and/or blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub blocks: Vec<String>,
}

impl Restriction {
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.blocks.is_empty()
    }

    fn admits(&self, block: &Block, topic: &Topic) -> bool {
        self.is_empty() || self.blocks.contains(&block.id) || self.topics.contains(&topic.id)
    }
}

/// Input to `plan_allocation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub position_id: String,
    pub total: usize,
    #[serde(default)]
    pub restriction: Option<Restriction>,
    #[serde(default)]
    pub policy: ShortfallPolicy,
}

/// A topic ready for apportionment.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTopic {
    pub topic_id: String,
    pub block_id: String,
    /// Effective weight, normalized across the position.
    pub weight: f64,
    /// Eligible question count; `None` means unlimited.
    pub capacity: Option<usize>,
}

/// The quota assigned to one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicQuota {
    pub topic_id: String,
    pub block_id: String,
    pub weight: f64,
    pub quota: usize,
    pub available: Option<usize>,
}

/// Result of the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub position_id: String,
    /// Total the caller asked for.
    pub requested: usize,
    /// Quotas in declared topic order.
    pub quotas: Vec<TopicQuota>,
    /// Topics that received less than their ideal share: their own pool was
    /// too small, or the distinct pool across overlapping scopes ran out.
    pub shortfalls: Vec<TopicShortfall>,
    /// Distinct eligible questions across all planned topics, when known.
    #[serde(default)]
    pub pool: Option<usize>,
}

impl AllocationPlan {
    /// Sum of all quotas.
    pub fn total(&self) -> usize {
        self.quotas.iter().map(|q| q.quota).sum()
    }

    /// `true` when the plan delivers the requested total.
    pub fn is_complete(&self) -> bool {
        self.total() == self.requested
    }

    pub fn quota_for(&self, topic_id: &str) -> Option<usize> {
        self.quotas
            .iter()
            .find(|q| q.topic_id == topic_id)
            .map(|q| q.quota)
    }
}

/// Largest-remainder apportionment of `total` over `weights`.
///
/// Weights need not be normalized. Ties on the fractional remainder go to
/// the earlier index. The result always sums to `total` when at least one
/// weight is positive, and is all zeros otherwise.
pub fn apportion(weights: &[f64], total: usize) -> Vec<usize> {
    let sum: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if weights.is_empty() || sum <= 0.0 {
        return vec![0; weights.len()];
    }

    let raw: Vec<f64> = weights
        .iter()
        .map(|w| if *w > 0.0 { total as f64 * w / sum } else { 0.0 })
        .collect();
    let mut quotas: Vec<usize> = raw
        .iter()
        .map(|r| (r + REMAINDER_EPSILON).floor() as usize)
        .collect();
    let remainders: Vec<f64> = raw
        .iter()
        .zip(&quotas)
        .map(|(r, q)| (r - *q as f64).max(0.0))
        .collect();

    let mut ranking: Vec<usize> = (0..weights.len()).filter(|i| weights[*i] > 0.0).collect();
    ranking.sort_by(|&a, &b| compare_remainders(remainders[a], remainders[b]).then(a.cmp(&b)));

    let assigned: usize = quotas.iter().sum();
    if assigned <= total {
        for &i in ranking.iter().cycle().take(total - assigned) {
            quotas[i] += 1;
        }
    } else {
        // Float drift pushed a floor over; take back from the smallest remainders.
        let mut excess = assigned - total;
        for &i in ranking.iter().rev() {
            if excess == 0 {
                break;
            }
            if quotas[i] > 0 {
                quotas[i] -= 1;
                excess -= 1;
            }
        }
    }
    quotas
}

/// Larger remainder first; near-equal remainders compare equal.
fn compare_remainders(a: f64, b: f64) -> Ordering {
    if (a - b).abs() < REMAINDER_EPSILON {
        Ordering::Equal
    } else {
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    }
}

/// Apportion `total`, capping each index at its capacity and re-apportioning
/// the deficit over the uncapped indices until nothing changes.
pub fn apportion_with_capacity(
    weights: &[f64],
    capacities: &[Option<usize>],
    total: usize,
) -> Vec<usize> {
    let n = weights.len();
    let mut quotas = vec![0usize; n];
    let mut capped = vec![false; n];

    loop {
        let fixed: usize = (0..n).filter(|i| capped[*i]).map(|i| quotas[i]).sum();
        let remaining = total.saturating_sub(fixed);
        let open: Vec<usize> = (0..n).filter(|i| !capped[*i]).collect();
        if open.is_empty() {
            break;
        }

        let open_weights: Vec<f64> = open.iter().map(|i| weights[*i]).collect();
        let shares = apportion(&open_weights, remaining);

        let mut newly_capped = false;
        for (share, &i) in shares.into_iter().zip(&open) {
            match capacities[i] {
                Some(cap) if share > cap => {
                    quotas[i] = cap;
                    capped[i] = true;
                    newly_capped = true;
                }
                _ => quotas[i] = share,
            }
        }
        if !newly_capped {
            break;
        }
    }
    quotas
}

/// Compute effective topic weights for a position, in declared order.
///
/// When any block declares a weight, every admitted block must, and a topic's
/// effective weight is its share of the block times the block's share of the
/// position. Otherwise topic weights are normalized across the position.
pub fn effective_weights(
    position: &Position,
    restriction: Option<&Restriction>,
) -> Result<Vec<WeightedTopic>, EngineError> {
    if let Some(r) = restriction {
        for id in &r.topics {
            if position.topic(id).is_none() {
                return Err(EngineError::TopicNotFound(id.clone()));
            }
        }
        for id in &r.blocks {
            if !position.blocks.iter().any(|b| &b.id == id) {
                return Err(EngineError::TopicNotFound(format!("block {id}")));
            }
        }
    }

    let admitted: Vec<(&Block, Vec<&Topic>)> = position
        .blocks
        .iter()
        .map(|b| {
            let topics = b
                .topics
                .iter()
                .filter(|t| restriction.map_or(true, |r| r.admits(b, t)))
                .collect::<Vec<_>>();
            (b, topics)
        })
        .filter(|(_, topics)| !topics.is_empty())
        .collect();

    if admitted.is_empty() {
        return Err(EngineError::TopicNotFound(format!(
            "position '{}' has no topics to allocate",
            position.id
        )));
    }

    for (block, topics) in &admitted {
        for topic in topics {
            if !(topic.weight.is_finite() && topic.weight > 0.0) {
                return Err(EngineError::Configuration(format!(
                    "topic '{}' in block '{}' has non-positive weight {}",
                    topic.id, block.id, topic.weight
                )));
            }
        }
        if let Some(w) = block.weight {
            if !(w.is_finite() && w > 0.0) {
                return Err(EngineError::Configuration(format!(
                    "block '{}' has non-positive weight {w}",
                    block.id
                )));
            }
        }
    }

    let block_weighted = admitted.iter().any(|(b, _)| b.weight.is_some());
    if block_weighted {
        if let Some((b, _)) = admitted.iter().find(|(b, _)| b.weight.is_none()) {
            return Err(EngineError::Configuration(format!(
                "block '{}' has no weight while other blocks of position '{}' do",
                b.id, position.id
            )));
        }
    }

    let mut weighted = Vec::new();
    if block_weighted {
        let block_sum: f64 = admitted.iter().filter_map(|(b, _)| b.weight).sum();
        for (block, topics) in &admitted {
            let block_share = block.weight.unwrap_or(0.0) / block_sum;
            let topic_sum: f64 = topics.iter().map(|t| t.weight).sum();
            for topic in topics {
                weighted.push(WeightedTopic {
                    topic_id: topic.id.clone(),
                    block_id: block.id.clone(),
                    weight: block_share * topic.weight / topic_sum,
                    capacity: None,
                });
            }
        }
    } else {
        let sum: f64 = admitted
            .iter()
            .flat_map(|(_, topics)| topics.iter().map(|t| t.weight))
            .sum();
        for (block, topics) in &admitted {
            for topic in topics {
                weighted.push(WeightedTopic {
                    topic_id: topic.id.clone(),
                    block_id: block.id.clone(),
                    weight: topic.weight / sum,
                    capacity: None,
                });
            }
        }
    }
    Ok(weighted)
}

/// Allocate `total` over already-weighted topics.
pub fn allocate(
    position_id: &str,
    topics: &[WeightedTopic],
    total: usize,
    policy: ShortfallPolicy,
) -> Result<AllocationPlan, EngineError> {
    allocate_within_pool(position_id, topics, total, None, policy)
}

/// Allocate `total` over weighted topics that draw from a shared pool.
///
/// Per-topic capacities count a question once per topic whose scope covers
/// it, so with overlapping scopes their sum can exceed what a session can
/// hold. `pool` is the number of distinct eligible questions across the
/// topics; the planned total never exceeds it.
pub fn allocate_within_pool(
    position_id: &str,
    topics: &[WeightedTopic],
    total: usize,
    pool: Option<usize>,
    policy: ShortfallPolicy,
) -> Result<AllocationPlan, EngineError> {
    if total == 0 {
        return Err(EngineError::Configuration(
            "requested question count must be positive".into(),
        ));
    }

    let weights: Vec<f64> = topics.iter().map(|t| t.weight).collect();
    let capacities: Vec<Option<usize>> = topics.iter().map(|t| t.capacity).collect();

    let ideal = apportion(&weights, total);
    let target = pool.map_or(total, |p| total.min(p));
    let final_quotas = apportion_with_capacity(&weights, &capacities, target);

    let mut shortfalls: Vec<TopicShortfall> = topics
        .iter()
        .zip(&ideal)
        .filter_map(|(t, &requested)| match t.capacity {
            Some(available) if requested > available => Some(TopicShortfall {
                topic_id: t.topic_id.clone(),
                requested,
                available,
                shortfall: requested - available,
            }),
            _ => None,
        })
        .collect();
    if target < total {
        for ((t, &requested), &quota) in topics.iter().zip(&ideal).zip(&final_quotas) {
            if quota < requested && !shortfalls.iter().any(|s| s.topic_id == t.topic_id) {
                shortfalls.push(TopicShortfall {
                    topic_id: t.topic_id.clone(),
                    requested,
                    available: quota,
                    shortfall: requested - quota,
                });
            }
        }
    }

    let plan = AllocationPlan {
        position_id: position_id.to_string(),
        requested: total,
        quotas: topics
            .iter()
            .zip(final_quotas)
            .map(|(t, quota)| TopicQuota {
                topic_id: t.topic_id.clone(),
                block_id: t.block_id.clone(),
                weight: t.weight,
                quota,
                available: t.capacity,
            })
            .collect(),
        shortfalls,
        pool,
    };

    for s in &plan.shortfalls {
        tracing::debug!(
            "topic '{}' short by {} (requested {}, available {})",
            s.topic_id,
            s.shortfall,
            s.requested,
            s.available
        );
    }

    if !plan.is_complete() {
        let achievable = plan.total();
        match policy {
            ShortfallPolicy::Strict => {
                return Err(EngineError::InsufficientQuestions {
                    requested: total,
                    achievable,
                    shortfalls: plan.shortfalls,
                });
            }
            ShortfallPolicy::BestEffort => {
                tracing::info!(
                    "position '{}': best-effort plan delivers {achievable} of {total} questions",
                    position_id
                );
            }
        }
    }
    Ok(plan)
}

/// Plan a position against a bank snapshot, using eligible pool sizes as
/// capacities and the distinct eligible questions as the overall ceiling.
pub fn plan_allocation(
    snapshot: &BankSnapshot,
    request: &PlanRequest,
) -> Result<AllocationPlan, EngineError> {
    if snapshot.position.id != request.position_id {
        return Err(EngineError::not_found("position", &request.position_id));
    }

    let mut topics = effective_weights(&snapshot.position, request.restriction.as_ref())?;
    let mut distinct: HashSet<&str> = HashSet::new();
    for wt in &mut topics {
        let topic = snapshot
            .position
            .topic(&wt.topic_id)
            .ok_or_else(|| EngineError::TopicNotFound(wt.topic_id.clone()))?;
        let eligible = snapshot.eligible_questions(topic)?;
        wt.capacity = Some(eligible.len());
        distinct.extend(eligible.iter().map(|q| q.id.as_str()));
    }

    allocate_within_pool(
        &request.position_id,
        &topics,
        request.total,
        Some(distinct.len()),
        request.policy,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::*;

    fn weighted(weights: &[f64], capacities: &[Option<usize>]) -> Vec<WeightedTopic> {
        weights
            .iter()
            .zip(capacities)
            .enumerate()
            .map(|(i, (w, c))| WeightedTopic {
                topic_id: format!("t{}", i + 1),
                block_id: "b1".into(),
                weight: *w,
                capacity: *c,
            })
            .collect()
    }

    #[test]
    fn scenario_a_sixty_forty() {
        assert_eq!(apportion(&[0.6, 0.4], 5), vec![3, 2]);
    }

    #[test]
    fn scenario_b_ties_follow_declared_order() {
        assert_eq!(apportion(&[0.34, 0.33, 0.33], 3), vec![1, 1, 1]);
        // Equal weights, one leftover unit: the first topic wins the tie.
        assert_eq!(apportion(&[1.0, 1.0, 1.0], 4), vec![2, 1, 1]);
        assert_eq!(apportion(&[1.0, 1.0, 1.0], 5), vec![2, 2, 1]);
    }

    #[test]
    fn quotas_always_sum_to_total() {
        let weight_sets: [&[f64]; 4] = [
            &[0.5, 0.3, 0.2],
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            &[0.1; 7],
            &[0.333, 0.333, 0.334],
        ];
        for weights in weight_sets {
            for total in 1..=120 {
                let quotas = apportion(weights, total);
                assert_eq!(quotas.iter().sum::<usize>(), total, "{weights:?} T={total}");
            }
        }
    }

    #[test]
    fn apportionment_is_deterministic() {
        let weights = [0.17, 0.29, 0.31, 0.23];
        assert_eq!(apportion(&weights, 37), apportion(&weights, 37));
    }

    #[test]
    fn zero_weights_get_nothing() {
        assert_eq!(apportion(&[0.0, 1.0], 3), vec![0, 3]);
        assert_eq!(apportion(&[0.0, 0.0], 3), vec![0, 0]);
    }

    #[test]
    fn scenario_c_best_effort_proceeds_with_available() {
        let topics = weighted(&[1.0], &[Some(3)]);
        let plan = allocate("aux", &topics, 5, ShortfallPolicy::BestEffort).unwrap();
        assert_eq!(plan.total(), 3);
        assert!(!plan.is_complete());
        assert_eq!(plan.shortfalls.len(), 1);
        assert_eq!(plan.shortfalls[0].shortfall, 2);
        assert_eq!(plan.shortfalls[0].requested, 5);
        assert_eq!(plan.shortfalls[0].available, 3);
    }

    #[test]
    fn scenario_c_strict_fails_with_detail() {
        let topics = weighted(&[1.0], &[Some(3)]);
        let err = allocate("aux", &topics, 5, ShortfallPolicy::Strict).unwrap_err();
        match err {
            EngineError::InsufficientQuestions {
                requested,
                achievable,
                shortfalls,
            } => {
                assert_eq!(requested, 5);
                assert_eq!(achievable, 3);
                assert_eq!(shortfalls[0].shortfall, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn shortfall_is_redistributed_to_other_topics() {
        // Ideal (5, 3, 2); t1 can only give 2, so 3 units move to t2/t3.
        let topics = weighted(&[0.5, 0.3, 0.2], &[Some(2), None, None]);
        let plan = allocate("aux", &topics, 10, ShortfallPolicy::Strict).unwrap();
        assert!(plan.is_complete());
        assert_eq!(plan.quota_for("t1"), Some(2));
        // 8 units over 0.3/0.2 -> 4.8 / 3.2 -> (5, 3)
        assert_eq!(plan.quota_for("t2"), Some(5));
        assert_eq!(plan.quota_for("t3"), Some(3));
        assert_eq!(plan.shortfalls.len(), 1);
        assert_eq!(plan.shortfalls[0].topic_id, "t1");
    }

    #[test]
    fn redistribution_cascades() {
        let topics = weighted(&[0.4, 0.4, 0.2], &[Some(1), Some(3), Some(100)]);
        let plan = allocate("aux", &topics, 10, ShortfallPolicy::Strict).unwrap();
        assert_eq!(plan.quota_for("t1"), Some(1));
        assert_eq!(plan.quota_for("t2"), Some(3));
        assert_eq!(plan.quota_for("t3"), Some(6));
        assert_eq!(plan.total(), 10);
    }

    #[test]
    fn exhausted_pool_caps_every_topic() {
        let topics = weighted(&[0.5, 0.5], &[Some(1), Some(2)]);
        let plan = allocate("aux", &topics, 10, ShortfallPolicy::BestEffort).unwrap();
        assert_eq!(plan.total(), 3);
        assert_eq!(plan.quota_for("t1"), Some(1));
        assert_eq!(plan.quota_for("t2"), Some(2));
    }

    #[test]
    fn zero_total_is_rejected() {
        let topics = weighted(&[1.0], &[None]);
        assert!(matches!(
            allocate("aux", &topics, 0, ShortfallPolicy::Strict),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn block_weights_scale_topic_shares() {
        let mut pos = position(vec![
            topic("t1", 1.0, "CE", &["1"]),
            topic("t2", 3.0, "CE", &["2"]),
        ]);
        pos.blocks[0].weight = Some(1.0);
        pos.blocks.push(Block {
            id: "b2".into(),
            name: "Block 2".into(),
            weight: Some(1.0),
            topics: vec![topic("t3", 0.5, "CE", &["3"])],
        });
        let weights = effective_weights(&pos, None).unwrap();
        let w: Vec<f64> = weights.iter().map(|t| t.weight).collect();
        assert!((w[0] - 0.125).abs() < 1e-12);
        assert!((w[1] - 0.375).abs() < 1e-12);
        assert!((w[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn mixed_block_weights_are_a_configuration_error() {
        let mut pos = position(vec![topic("t1", 1.0, "CE", &["1"])]);
        pos.blocks[0].weight = Some(1.0);
        pos.blocks.push(Block {
            id: "b2".into(),
            name: "Block 2".into(),
            weight: None,
            topics: vec![topic("t2", 1.0, "CE", &["2"])],
        });
        assert!(matches!(
            effective_weights(&pos, None),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn zero_weight_topic_is_a_configuration_error() {
        let pos = position(vec![
            topic("t1", 1.0, "CE", &["1"]),
            topic("t2", 0.0, "CE", &["2"]),
        ]);
        assert!(matches!(
            effective_weights(&pos, None),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn restriction_filters_and_rejects_unknown_topics() {
        let pos = position(vec![
            topic("t1", 1.0, "CE", &["1"]),
            topic("t2", 1.0, "CE", &["2"]),
        ]);
        let only_t2 = Restriction {
            topics: vec!["t2".into()],
            blocks: vec![],
        };
        let weights = effective_weights(&pos, Some(&only_t2)).unwrap();
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].topic_id, "t2");
        assert!((weights[0].weight - 1.0).abs() < 1e-12);

        let unknown = Restriction {
            topics: vec!["nope".into()],
            blocks: vec![],
        };
        assert!(matches!(
            effective_weights(&pos, Some(&unknown)),
            Err(EngineError::TopicNotFound(_))
        ));
    }

    #[test]
    fn plan_uses_eligible_pool_as_capacity() {
        let snap = snapshot(
            position(vec![
                topic("t1", 0.6, "CE", &["1"]),
                topic("t2", 0.4, "CE", &["2"]),
            ]),
            vec![law("CE", &["1", "2"])],
            vec![
                question("q1", "CE", "1"),
                question("q2", "CE", "2"),
                question("q3", "CE", "2"),
                question("q4", "CE", "2"),
            ],
        );
        let request = PlanRequest {
            position_id: "aux".into(),
            total: 4,
            restriction: None,
            policy: ShortfallPolicy::Strict,
        };
        let plan = plan_allocation(&snap, &request).unwrap();
        // Ideal (2, 2) but t1 has one question: t2 takes the slack.
        assert_eq!(plan.quota_for("t1"), Some(1));
        assert_eq!(plan.quota_for("t2"), Some(3));
        assert_eq!(plan.quotas[0].available, Some(1));
    }

    #[test]
    fn overlapping_scopes_cap_the_plan_at_distinct_questions() {
        // Both topics cover the same ten articles: 20 by capacity, 10 in truth.
        let articles: Vec<String> = (1..=10).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = articles.iter().map(String::as_str).collect();
        let snap = snapshot(
            position(vec![
                topic("t1", 0.5, "CE", &refs),
                topic("t2", 0.5, "CE", &refs),
            ]),
            vec![law("CE", &refs)],
            (1..=10)
                .map(|i| question(&format!("q{i}"), "CE", &i.to_string()))
                .collect(),
        );
        let mut request = PlanRequest {
            position_id: "aux".into(),
            total: 15,
            restriction: None,
            policy: ShortfallPolicy::Strict,
        };

        match plan_allocation(&snap, &request).unwrap_err() {
            EngineError::InsufficientQuestions {
                requested,
                achievable,
                shortfalls,
            } => {
                assert_eq!(requested, 15);
                assert_eq!(achievable, 10);
                let short: usize = shortfalls.iter().map(|s| s.shortfall).sum();
                assert_eq!(short, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        request.policy = ShortfallPolicy::BestEffort;
        let plan = plan_allocation(&snap, &request).unwrap();
        assert_eq!(plan.total(), 10);
        assert_eq!(plan.pool, Some(10));
        assert!(!plan.is_complete());
        assert_eq!(plan.quota_for("t1"), Some(5));
        assert_eq!(plan.quota_for("t2"), Some(5));

        request.total = 10;
        request.policy = ShortfallPolicy::Strict;
        let plan = plan_allocation(&snap, &request).unwrap();
        assert!(plan.is_complete());
        assert!(plan.shortfalls.is_empty());
    }

    #[test]
    fn policy_parsing() {
        assert_eq!(
            "best-effort".parse::<ShortfallPolicy>().unwrap(),
            ShortfallPolicy::BestEffort
        );
        assert_eq!(ShortfallPolicy::default(), ShortfallPolicy::Strict);
        assert!("lenient".parse::<ShortfallPolicy>().is_err());
    }
}
