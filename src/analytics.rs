use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    Campaign, CampaignStatus, Interaction, RelationshipStatus, Stakeholder,
};
use crate::scoring::round2;

pub const HIGH_PRIORITY_INFLUENCE: f64 = 7.0;
pub const HIGH_PRIORITY_INTEREST: f64 = 5.0;

#[derive(Debug, Clone, Serialize)]
pub struct MapPoint {
    pub id: Uuid,
    pub name: String,
    pub organization: Option<String>,
    pub influence: f64,
    pub interest: f64,
    pub sentiment: RelationshipStatus,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StakeholderMap {
    pub quadrants: BTreeMap<String, Vec<MapPoint>>,
    pub all_stakeholders: Vec<MapPoint>,
}

/// Influence/interest matrix grouped by status key. Every status has a
/// bucket, empty or not.
pub fn stakeholder_map(stakeholders: &[Stakeholder]) -> StakeholderMap {
    let mut quadrants: BTreeMap<String, Vec<MapPoint>> = RelationshipStatus::ALL
        .iter()
        .map(|status| (status.key(), Vec::new()))
        .collect();
    let mut all_stakeholders = Vec::with_capacity(stakeholders.len());

    for stakeholder in stakeholders {
        let point = MapPoint {
            id: stakeholder.id,
            name: stakeholder.name.clone(),
            organization: stakeholder.organization.clone(),
            influence: stakeholder.scores.influence_score,
            interest: stakeholder.scores.interest_score,
            sentiment: stakeholder.scores.sentiment,
            tags: stakeholder.tags.clone(),
        };
        quadrants
            .entry(stakeholder.scores.sentiment.key())
            .or_default()
            .push(point.clone());
        all_stakeholders.push(point);
    }

    StakeholderMap {
        quadrants,
        all_stakeholders,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngagementTrends {
    pub period_days: i64,
    pub by_type: BTreeMap<String, usize>,
    pub by_sentiment: BTreeMap<String, usize>,
    pub total_interactions: usize,
}

pub fn engagement_trends(
    interactions: &[Interaction],
    since: DateTime<Utc>,
    period_days: i64,
) -> EngagementTrends {
    let mut by_type = BTreeMap::new();
    let mut by_sentiment = BTreeMap::new();
    let mut total_interactions = 0;

    for interaction in interactions.iter().filter(|i| i.record.date >= since) {
        *by_type
            .entry(interaction.record.interaction_type.clone())
            .or_insert(0) += 1;
        *by_sentiment
            .entry(interaction.record.sentiment.to_string())
            .or_insert(0) += 1;
        total_interactions += 1;
    }

    EngagementTrends {
        period_days,
        by_type,
        by_sentiment,
        total_interactions,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    pub total_stakeholders: usize,
    pub sentiment_distribution: BTreeMap<String, usize>,
    pub average_influence: f64,
    pub average_interest: f64,
    pub high_priority_count: usize,
    pub high_priority_percentage: f64,
}

pub fn health_summary(stakeholders: &[Stakeholder]) -> HealthSummary {
    let total = stakeholders.len();
    let mut sentiment_distribution = BTreeMap::new();
    for stakeholder in stakeholders {
        *sentiment_distribution
            .entry(stakeholder.scores.sentiment.to_string())
            .or_insert(0) += 1;
    }

    let mean = |value: fn(&Stakeholder) -> f64| {
        if total == 0 {
            0.0
        } else {
            round2(stakeholders.iter().map(value).sum::<f64>() / total as f64)
        }
    };

    let high_priority_count = stakeholders
        .iter()
        .filter(|s| {
            s.scores.influence_score >= HIGH_PRIORITY_INFLUENCE
                && s.scores.interest_score >= HIGH_PRIORITY_INTEREST
        })
        .count();

    HealthSummary {
        total_stakeholders: total,
        sentiment_distribution,
        average_influence: mean(|s| s.scores.influence_score),
        average_interest: mean(|s| s.scores.interest_score),
        high_priority_count,
        high_priority_percentage: if total == 0 {
            0.0
        } else {
            round2(high_priority_count as f64 / total as f64 * 100.0)
        },
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignMetrics {
    pub active_campaigns: usize,
    pub completed_campaigns: usize,
    pub by_phase: BTreeMap<String, usize>,
}

pub fn campaign_metrics(campaigns: &[Campaign]) -> CampaignMetrics {
    let mut by_phase = BTreeMap::new();
    for campaign in campaigns {
        *by_phase.entry(campaign.phase.to_string()).or_insert(0) += 1;
    }
    CampaignMetrics {
        active_campaigns: campaigns
            .iter()
            .filter(|c| c.status == CampaignStatus::Active)
            .count(),
        completed_campaigns: campaigns
            .iter()
            .filter(|c| c.status == CampaignStatus::Completed)
            .count(),
        by_phase,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CampaignPhase, InteractionRecord, InteractionSentiment, StakeholderScores};
    use chrono::Duration;

    fn stakeholder(name: &str, influence: f64, interest: f64) -> Stakeholder {
        Stakeholder::new(name, StakeholderScores::with_scores(influence, interest), Utc::now())
    }

    fn interaction(kind: &str, sentiment: InteractionSentiment, days_ago: i64) -> Interaction {
        Interaction {
            id: Uuid::new_v4(),
            stakeholder_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            subject: None,
            description: None,
            outcome: None,
            duration_minutes: None,
            follow_up_date: None,
            tags: Vec::new(),
            attachments: Vec::new(),
            record: InteractionRecord {
                sentiment,
                interaction_type: kind.to_string(),
                impact_on_relationship: None,
                date: Utc::now() - Duration::days(days_ago),
                follow_up_required: false,
                follow_up_completed: false,
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn map_groups_by_status_key() {
        let map = stakeholder_map(&[
            stakeholder("Mayor", 9.0, 8.0),
            stakeholder("Union Rep", 8.0, -6.0),
            stakeholder("Blogger", 1.0, -1.0),
        ]);
        assert_eq!(map.quadrants.len(), 9);
        assert_eq!(map.quadrants["strategic_partner"][0].name, "Mayor");
        assert_eq!(map.quadrants["proactively_defend"][0].name, "Union Rep");
        assert_eq!(map.quadrants["monitor"].len(), 1);
        assert!(map.quadrants["commit"].is_empty());
        assert_eq!(map.all_stakeholders.len(), 3);
    }

    #[test]
    fn trends_count_within_the_period() {
        let since = Utc::now() - Duration::days(90);
        let trends = engagement_trends(
            &[
                interaction("meeting", InteractionSentiment::Positive, 3),
                interaction("meeting", InteractionSentiment::Negative, 20),
                interaction("email", InteractionSentiment::Positive, 40),
                interaction("email", InteractionSentiment::Positive, 120),
            ],
            since,
            90,
        );
        assert_eq!(trends.total_interactions, 3);
        assert_eq!(trends.by_type["meeting"], 2);
        assert_eq!(trends.by_type["email"], 1);
        assert_eq!(trends.by_sentiment["positive"], 2);
    }

    #[test]
    fn health_summary_averages_and_counts() {
        let summary = health_summary(&[
            stakeholder("A", 8.0, 6.0),
            stakeholder("B", 2.0, 1.0),
            stakeholder("C", 7.0, 5.0),
        ]);
        assert_eq!(summary.total_stakeholders, 3);
        assert_eq!(summary.average_influence, 5.67);
        assert_eq!(summary.average_interest, 4.0);
        assert_eq!(summary.high_priority_count, 2);
        assert_eq!(summary.high_priority_percentage, 66.67);
        assert_eq!(summary.sentiment_distribution["Strategic Partner"], 2);
    }

    #[test]
    fn empty_health_summary_is_zeroed() {
        let summary = health_summary(&[]);
        assert_eq!(summary.average_influence, 0.0);
        assert_eq!(summary.high_priority_percentage, 0.0);
    }

    #[test]
    fn campaign_metrics_count_statuses_and_phases() {
        let owner = Uuid::new_v4();
        let mut active = Campaign::new("Active", owner, Utc::now());
        active.status = CampaignStatus::Active;
        let mut done = Campaign::new("Done", owner, Utc::now());
        done.status = CampaignStatus::Completed;
        done.phase = CampaignPhase::Execute;
        let planning = Campaign::new("Planning", owner, Utc::now());

        let metrics = campaign_metrics(&[active, done, planning]);
        assert_eq!(metrics.active_campaigns, 1);
        assert_eq!(metrics.completed_campaigns, 1);
        assert_eq!(metrics.by_phase["purpose"], 2);
        assert_eq!(metrics.by_phase["execute"], 1);
    }
}
