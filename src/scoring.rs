use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngagementError;
use crate::models::{
    clamp_score, InteractionRecord, InteractionSentiment, RelationshipStatus, Stakeholder,
    StakeholderScores,
};

pub const ENGAGEMENT_WINDOW_DAYS: i64 = 30;
pub const HEALTH_WINDOW_DAYS: i64 = 90;
pub const PRIORITY_WINDOW_DAYS: i64 = 30;
pub const PRIORITY_INFLUENCE_THRESHOLD: f64 = 7.0;
pub const PRIORITY_REASON: &str = "High influence, no recent interaction";

/// Source of "now" for window computation.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Longest look-back any command accepts, roughly a century.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Start of a look-back window of `days` ending at `now`.
pub fn window_start(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, EngagementError> {
    if !(0..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(EngagementError::invalid(format!(
            "window must be between 0 and {MAX_WINDOW_DAYS} days, got {days}"
        )));
    }
    TimeDelta::try_days(days)
        .and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| EngagementError::invalid(format!("a {days}-day window reaches before the calendar")))
}

type Rule = (fn(f64, f64) -> bool, RelationshipStatus);

// Evaluated top to bottom; the first matching predicate wins. Arguments are
// (influence, interest).
const CLASSIFICATION_RULES: [Rule; 8] = [
    (|inf, int| int >= 5.0 && inf >= 5.0, RelationshipStatus::StrategicPartner),
    (|inf, int| int >= 5.0 && inf >= 2.0, RelationshipStatus::HighValueRelationship),
    (|inf, int| int >= 2.0 && inf >= 5.0, RelationshipStatus::Collaborate),
    (|inf, int| int >= 0.0 && inf >= 5.0, RelationshipStatus::Protect),
    (|inf, int| int <= -5.0 && inf >= 5.0, RelationshipStatus::ProactivelyDefend),
    (|inf, int| int <= -2.0 && inf >= 5.0, RelationshipStatus::Defend),
    (|_, int| int >= 2.0, RelationshipStatus::Commit),
    (|_, int| int >= 0.0, RelationshipStatus::Connect),
];

pub fn classify(influence: f64, interest: f64) -> RelationshipStatus {
    CLASSIFICATION_RULES
        .iter()
        .find(|(matches, _)| matches(influence, interest))
        .map(|(_, status)| *status)
        .unwrap_or(RelationshipStatus::Monitor)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EngagementBreakdown {
    pub interaction_count: usize,
    pub frequency: f64,
    pub sentiment: f64,
    pub variety: f64,
    pub follow_up: f64,
    pub total: f64,
}

pub fn engagement_breakdown(
    interactions: &[InteractionRecord],
    window_start: DateTime<Utc>,
) -> EngagementBreakdown {
    let in_window: Vec<&InteractionRecord> = interactions
        .iter()
        .filter(|record| record.date >= window_start)
        .collect();

    if in_window.is_empty() {
        return EngagementBreakdown::default();
    }

    let count = in_window.len() as f64;
    let frequency = (count * 0.5).min(4.0);

    let positive = in_window
        .iter()
        .filter(|record| record.sentiment == InteractionSentiment::Positive)
        .count() as f64;
    let sentiment = positive / count * 3.0;

    let types: HashSet<&str> = in_window
        .iter()
        .map(|record| record.interaction_type.as_str())
        .collect();
    let variety = (types.len() as f64 * 0.5).min(2.0);

    let required: Vec<&&InteractionRecord> = in_window
        .iter()
        .filter(|record| record.follow_up_required)
        .collect();
    let follow_up = if required.is_empty() {
        0.0
    } else {
        let completed = required
            .iter()
            .filter(|record| record.follow_up_completed)
            .count() as f64;
        completed / required.len() as f64
    };

    EngagementBreakdown {
        interaction_count: in_window.len(),
        frequency,
        sentiment,
        variety,
        follow_up,
        total: round2(frequency + sentiment + variety + follow_up),
    }
}

/// Composite 0-10 engagement over the interactions dated at or after
/// `window_start`.
pub fn engagement_score(interactions: &[InteractionRecord], window_start: DateTime<Utc>) -> f64 {
    engagement_breakdown(interactions, window_start).total
}

/// Nudges interest by recent sentiment and impact, then re-derives the label.
/// An empty window returns the scores untouched, label included.
pub fn update_health(
    scores: StakeholderScores,
    interactions: &[InteractionRecord],
) -> StakeholderScores {
    if interactions.is_empty() {
        return scores;
    }

    let count = interactions.len() as f64;
    let avg_impact = interactions
        .iter()
        .map(|record| record.impact_on_relationship.unwrap_or(0.0))
        .sum::<f64>()
        / count;
    let positive_ratio = interactions
        .iter()
        .filter(|record| record.sentiment == InteractionSentiment::Positive)
        .count() as f64
        / count;
    let delta = (positive_ratio - 0.5) * 2.0 + avg_impact;

    let interest_score = clamp_score(scores.interest_score + delta);
    StakeholderScores {
        influence_score: scores.influence_score,
        interest_score,
        sentiment: classify(scores.influence_score, interest_score),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PriorityStakeholder {
    pub stakeholder: Stakeholder,
    pub reason: &'static str,
    pub priority_score: f64,
}

/// High-influence stakeholders nobody has talked to since `window_start`,
/// most influential first. Equal scores keep their input order.
pub fn select_priority(
    stakeholders: &[Stakeholder],
    interactions_by_stakeholder: &HashMap<Uuid, Vec<InteractionRecord>>,
    window_start: DateTime<Utc>,
    limit: usize,
) -> Vec<PriorityStakeholder> {
    let mut selected: Vec<PriorityStakeholder> = stakeholders
        .iter()
        .filter(|stakeholder| stakeholder.scores.influence_score >= PRIORITY_INFLUENCE_THRESHOLD)
        .filter(|stakeholder| {
            interactions_by_stakeholder
                .get(&stakeholder.id)
                .map(|records| records.iter().all(|record| record.date < window_start))
                .unwrap_or(true)
        })
        .map(|stakeholder| PriorityStakeholder {
            stakeholder: stakeholder.clone(),
            reason: PRIORITY_REASON,
            priority_score: stakeholder.scores.influence_score,
        })
        .collect();

    selected.sort_by(|a, b| {
        b.priority_score
            .partial_cmp(&a.priority_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    selected.truncate(limit);
    selected
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn record(days_ago: i64, sentiment: InteractionSentiment, kind: &str) -> InteractionRecord {
        InteractionRecord {
            sentiment,
            interaction_type: kind.to_string(),
            impact_on_relationship: None,
            date: now() - Duration::days(days_ago),
            follow_up_required: false,
            follow_up_completed: false,
        }
    }

    fn stakeholder(name: &str, influence: f64) -> Stakeholder {
        Stakeholder::new(name, StakeholderScores::with_scores(influence, 0.0), now())
    }

    #[test]
    fn classification_examples() {
        assert_eq!(classify(6.0, 6.0), RelationshipStatus::StrategicPartner);
        assert_eq!(classify(3.0, 6.0), RelationshipStatus::HighValueRelationship);
        assert_eq!(classify(6.0, 3.0), RelationshipStatus::Collaborate);
        assert_eq!(classify(6.0, 0.0), RelationshipStatus::Protect);
        assert_eq!(classify(8.0, -8.0), RelationshipStatus::ProactivelyDefend);
        assert_eq!(classify(8.0, -3.0), RelationshipStatus::Defend);
        assert_eq!(classify(0.0, 3.0), RelationshipStatus::Commit);
        assert_eq!(classify(-1.0, -1.0), RelationshipStatus::Monitor);
    }

    #[test]
    fn classification_matches_examples_in_interest_influence_order() {
        // Listed as (interest, influence).
        let cases = [
            (-8.0, 8.0, RelationshipStatus::ProactivelyDefend),
            (-3.0, 8.0, RelationshipStatus::Defend),
            (3.0, 0.0, RelationshipStatus::Commit),
        ];
        for (interest, influence, expected) in cases {
            assert_eq!(classify(influence, interest), expected);
        }
    }

    #[test]
    fn classification_boundaries_are_inclusive() {
        assert_eq!(classify(5.0, 5.0), RelationshipStatus::StrategicPartner);
        assert_eq!(classify(2.0, 5.0), RelationshipStatus::HighValueRelationship);
        assert_eq!(classify(5.0, -2.0), RelationshipStatus::Defend);
        assert_eq!(classify(5.0, -5.0), RelationshipStatus::ProactivelyDefend);
        assert_eq!(classify(0.0, 0.0), RelationshipStatus::Connect);
        // Mild negative interest with high influence falls past rule 6.
        assert_eq!(classify(9.0, -1.0), RelationshipStatus::Monitor);
    }

    #[test]
    fn classification_is_total() {
        let values = [-10.0, -5.5, -5.0, -2.0, -0.1, 0.0, 1.9, 2.0, 4.9, 5.0, 10.0, f64::NAN];
        for influence in values {
            for interest in values {
                let status = classify(influence, interest);
                assert!(RelationshipStatus::ALL.contains(&status));
                assert_eq!(status, classify(influence, interest));
            }
        }
        assert_eq!(classify(f64::NAN, f64::NAN), RelationshipStatus::Monitor);
    }

    #[test]
    fn empty_window_scores_zero() {
        let start = window_start(now(), ENGAGEMENT_WINDOW_DAYS).unwrap();
        assert_eq!(engagement_score(&[], start), 0.0);
    }

    #[test]
    fn eight_positive_meetings_score_seven_and_a_half() {
        let records: Vec<InteractionRecord> = (0..8)
            .map(|day| record(day, InteractionSentiment::Positive, "meeting"))
            .collect();
        let breakdown = engagement_breakdown(&records, window_start(now(), ENGAGEMENT_WINDOW_DAYS).unwrap());
        assert_eq!(breakdown.frequency, 4.0);
        assert_eq!(breakdown.sentiment, 3.0);
        assert_eq!(breakdown.variety, 0.5);
        assert_eq!(breakdown.follow_up, 0.0);
        assert_eq!(breakdown.total, 7.5);
    }

    #[test]
    fn engagement_mixes_components_and_rounds() {
        let mut records = vec![
            record(1, InteractionSentiment::Positive, "meeting"),
            record(2, InteractionSentiment::Neutral, "email"),
            record(3, InteractionSentiment::Negative, "phone_call"),
        ];
        records[0].follow_up_required = true;
        records[0].follow_up_completed = true;
        records[1].follow_up_required = true;

        let score = engagement_score(&records, window_start(now(), ENGAGEMENT_WINDOW_DAYS).unwrap());
        // 1.5 + 1.0 + 1.5 + 0.5
        assert_eq!(score, 4.5);

        let records = vec![
            record(1, InteractionSentiment::Positive, "meeting"),
            record(2, InteractionSentiment::Neutral, "meeting"),
            record(3, InteractionSentiment::Neutral, "meeting"),
        ];
        // 1.5 + 1.0 + 0.5 = 3.0
        assert_eq!(engagement_score(&records, window_start(now(), 30).unwrap()), 3.0);
    }

    #[test]
    fn engagement_ignores_records_before_the_window() {
        let records = vec![
            record(5, InteractionSentiment::Positive, "meeting"),
            record(45, InteractionSentiment::Positive, "email"),
        ];
        let breakdown = engagement_breakdown(&records, window_start(now(), ENGAGEMENT_WINDOW_DAYS).unwrap());
        assert_eq!(breakdown.interaction_count, 1);
        assert_eq!(breakdown.total, 4.0);
    }

    #[test]
    fn frequency_and_variety_are_capped() {
        let kinds = ["meeting", "email", "phone_call", "video_call", "event", "note"];
        let records: Vec<InteractionRecord> = (0..12)
            .map(|i| record(i, InteractionSentiment::Negative, kinds[i as usize % kinds.len()]))
            .collect();
        let breakdown = engagement_breakdown(&records, window_start(now(), 30).unwrap());
        assert_eq!(breakdown.frequency, 4.0);
        assert_eq!(breakdown.variety, 2.0);
        assert_eq!(breakdown.total, 6.0);
    }

    #[test]
    fn update_health_with_no_interactions_is_identity() {
        let scores = StakeholderScores::with_scores(3.0, 4.0)
            .with_override(RelationshipStatus::StrategicPartner);
        let updated = update_health(scores, &[]);
        assert_eq!(updated, scores);
        assert_eq!(updated.sentiment, RelationshipStatus::StrategicPartner);
    }

    #[test]
    fn update_health_applies_positive_delta() {
        let scores = StakeholderScores::with_scores(0.0, 0.0);
        let records = vec![
            record(3, InteractionSentiment::Positive, "meeting"),
            record(10, InteractionSentiment::Positive, "email"),
        ];
        let updated = update_health(scores, &records);
        assert_eq!(updated.interest_score, 1.0);
        assert_eq!(updated.influence_score, 0.0);
        assert_eq!(updated.sentiment, RelationshipStatus::Connect);
    }

    #[test]
    fn update_health_clamps_at_the_top() {
        let scores = StakeholderScores::with_scores(6.0, 9.5);
        let mut boosted = record(1, InteractionSentiment::Positive, "meeting");
        boosted.impact_on_relationship = Some(1.0);
        let updated = update_health(scores, &[boosted]);
        assert_eq!(updated.interest_score, 10.0);
        assert_eq!(updated.sentiment, RelationshipStatus::StrategicPartner);
    }

    #[test]
    fn update_health_averages_impact_and_overwrites_override() {
        let scores = StakeholderScores::with_scores(8.0, 1.0).with_override(RelationshipStatus::Commit);
        let mut first = record(1, InteractionSentiment::Negative, "meeting");
        first.impact_on_relationship = Some(-2.0);
        let second = record(2, InteractionSentiment::Negative, "email");
        // ratio 0 -> -1.0, avg impact -1.0 -> delta -2.0
        let updated = update_health(scores, &[first, second]);
        assert_eq!(updated.interest_score, -1.0);
        assert_eq!(updated.influence_score, 8.0);
        assert_eq!(updated.sentiment, RelationshipStatus::Monitor);
    }

    #[test]
    fn priority_requires_high_influence_and_silence() {
        let quiet_high = stakeholder("Quiet High", 8.0);
        let busy_high = stakeholder("Busy High", 9.0);
        let quiet_low = stakeholder("Quiet Low", 6.9);
        let stale_high = stakeholder("Stale High", 7.0);

        let mut by_stakeholder = HashMap::new();
        by_stakeholder.insert(busy_high.id, vec![record(3, InteractionSentiment::Neutral, "email")]);
        by_stakeholder.insert(stale_high.id, vec![record(45, InteractionSentiment::Neutral, "email")]);

        let stakeholders = vec![quiet_high.clone(), busy_high, quiet_low, stale_high.clone()];
        let selected = select_priority(
            &stakeholders,
            &by_stakeholder,
            window_start(now(), PRIORITY_WINDOW_DAYS).unwrap(),
            10,
        );

        let names: Vec<&str> = selected.iter().map(|p| p.stakeholder.name.as_str()).collect();
        assert_eq!(names, vec!["Quiet High", "Stale High"]);
        assert_eq!(selected[0].priority_score, 8.0);
        assert_eq!(selected[0].reason, PRIORITY_REASON);
    }

    #[test]
    fn priority_ties_keep_input_order_and_limit_truncates() {
        let stakeholders = vec![
            stakeholder("First", 7.5),
            stakeholder("Second", 7.5),
            stakeholder("Top", 9.5),
            stakeholder("Third", 7.5),
        ];
        let selected = select_priority(&stakeholders, &HashMap::new(), window_start(now(), 30).unwrap(), 3);
        let names: Vec<&str> = selected.iter().map(|p| p.stakeholder.name.as_str()).collect();
        assert_eq!(names, vec!["Top", "First", "Second"]);
    }

    #[test]
    fn fixed_clock_drives_windows() {
        let clock = FixedClock(now());
        let start = window_start(clock.now(), HEALTH_WINDOW_DAYS).unwrap();
        assert_eq!((clock.now() - start).num_days(), 90);
    }

    #[test]
    fn oversized_windows_are_rejected_instead_of_overflowing() {
        assert!(matches!(
            window_start(now(), 1_000_000_000),
            Err(EngagementError::InvalidInput(_))
        ));
        assert!(window_start(now(), -1).is_err());
        assert!(window_start(DateTime::<Utc>::MIN_UTC, 1).is_err());

        let oldest = window_start(now(), MAX_WINDOW_DAYS).unwrap();
        assert_eq!((now() - oldest).num_days(), MAX_WINDOW_DAYS);
        assert_eq!(window_start(now(), 0).unwrap(), now());
    }
}
