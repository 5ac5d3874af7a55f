use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::analytics;
use crate::error::EngagementError;
use crate::models::{Interaction, InteractionRecord, Stakeholder};
use crate::scoring::{self, ENGAGEMENT_WINDOW_DAYS, PRIORITY_WINDOW_DAYS};

const TOP_ENGAGED: usize = 10;
const PRIORITY_LIMIT: usize = 10;
const RECENT_NOTES: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct EngagementRow {
    pub stakeholder_id: Uuid,
    pub name: String,
    pub organization: Option<String>,
    pub score: f64,
    pub interaction_count: usize,
}

/// Groups the interactions dated no later than `now`.
fn records_by_stakeholder(
    interactions: &[Interaction],
    now: DateTime<Utc>,
) -> HashMap<Uuid, Vec<InteractionRecord>> {
    let mut grouped: HashMap<Uuid, Vec<InteractionRecord>> = HashMap::new();
    for interaction in interactions.iter().filter(|i| i.record.date <= now) {
        grouped
            .entry(interaction.stakeholder_id)
            .or_default()
            .push(interaction.record.clone());
    }
    grouped
}

/// Engagement scores over the 30-day window, highest first. Stakeholders
/// without interactions in the window are left out.
pub fn rank_engagement(
    stakeholders: &[Stakeholder],
    interactions: &[Interaction],
    now: DateTime<Utc>,
) -> Result<Vec<EngagementRow>, EngagementError> {
    let start = scoring::window_start(now, ENGAGEMENT_WINDOW_DAYS)?;
    let grouped = records_by_stakeholder(interactions, now);

    let mut rows: Vec<EngagementRow> = stakeholders
        .iter()
        .filter_map(|stakeholder| {
            let records = grouped.get(&stakeholder.id)?;
            let breakdown = scoring::engagement_breakdown(records, start);
            if breakdown.interaction_count == 0 {
                return None;
            }
            Some(EngagementRow {
                stakeholder_id: stakeholder.id,
                name: stakeholder.name.clone(),
                organization: stakeholder.organization.clone(),
                score: breakdown.total,
                interaction_count: breakdown.interaction_count,
            })
        })
        .collect();

    rows.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(rows)
}

pub fn build_report(
    scope: Option<&str>,
    since_days: i64,
    now: DateTime<Utc>,
    stakeholders: &[Stakeholder],
    interactions: &[Interaction],
) -> Result<String, EngagementError> {
    let cutoff = scoring::window_start(now, since_days)?;
    let interactions: Vec<Interaction> = interactions
        .iter()
        .filter(|interaction| interaction.record.date <= now)
        .cloned()
        .collect();
    let summary = analytics::health_summary(stakeholders);
    let trends = analytics::engagement_trends(&interactions, cutoff, since_days);
    let engagement = rank_engagement(stakeholders, &interactions, now)?;
    let priority = scoring::select_priority(
        stakeholders,
        &records_by_stakeholder(&interactions, now),
        scoring::window_start(now, PRIORITY_WINDOW_DAYS)?,
        PRIORITY_LIMIT,
    );

    let mut output = String::new();
    let scope_label = scope.unwrap_or("all stakeholders");

    let _ = writeln!(output, "# Stakeholder Engagement Report");
    let _ = writeln!(
        output,
        "Generated for {} on {} (interactions since {})",
        scope_label,
        now.date_naive(),
        cutoff.date_naive()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Relationship Health");
    let _ = writeln!(
        output,
        "- {} stakeholders, average influence {:.2}, average interest {:.2}",
        summary.total_stakeholders, summary.average_influence, summary.average_interest
    );
    let _ = writeln!(
        output,
        "- {} high priority ({:.2}%)",
        summary.high_priority_count, summary.high_priority_percentage
    );
    for (status, count) in summary.sentiment_distribution.iter() {
        let _ = writeln!(output, "- {}: {}", status, count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Interaction Mix");
    if trends.total_interactions == 0 {
        let _ = writeln!(output, "No interactions recorded for this window.");
    } else {
        for (kind, count) in trends.by_type.iter() {
            let _ = writeln!(output, "- {}: {}", kind, count);
        }
        let sentiments: Vec<String> = trends
            .by_sentiment
            .iter()
            .map(|(sentiment, count)| format!("{sentiment} {count}"))
            .collect();
        let _ = writeln!(output, "- sentiment: {}", sentiments.join(", "));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Engaged ({} days)", ENGAGEMENT_WINDOW_DAYS);
    if engagement.is_empty() {
        let _ = writeln!(output, "No stakeholders engaged in this window.");
    } else {
        for row in engagement.iter().take(TOP_ENGAGED) {
            let _ = writeln!(
                output,
                "- {} ({}) score {:.2} across {} interactions",
                row.name,
                row.organization.as_deref().unwrap_or("independent"),
                row.score,
                row.interaction_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Attention");
    if priority.is_empty() {
        let _ = writeln!(output, "Every high-influence stakeholder was contacted recently.");
    } else {
        for entry in priority.iter() {
            let _ = writeln!(
                output,
                "- {} (influence {:.1}): {}",
                entry.stakeholder.name, entry.priority_score, entry.reason
            );
        }
    }

    let names: HashMap<Uuid, &str> = stakeholders
        .iter()
        .map(|stakeholder| (stakeholder.id, stakeholder.name.as_str()))
        .collect();
    let mut recent: Vec<&Interaction> = interactions
        .iter()
        .filter(|interaction| interaction.record.date >= cutoff)
        .collect();
    recent.sort_by(|a, b| b.record.date.cmp(&a.record.date));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Interactions");
    if recent.is_empty() {
        let _ = writeln!(output, "No interactions recorded for this window.");
    } else {
        for interaction in recent.iter().take(RECENT_NOTES) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) on {}: {}",
                names
                    .get(&interaction.stakeholder_id)
                    .copied()
                    .unwrap_or("unknown stakeholder"),
                interaction.record.interaction_type,
                interaction.record.sentiment,
                interaction.record.date.date_naive(),
                interaction.subject.as_deref().unwrap_or("(no subject)")
            );
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InteractionSentiment, StakeholderScores};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 20, 8, 0, 0).unwrap()
    }

    fn interaction(stakeholder: &Stakeholder, days_ago: i64, subject: &str) -> Interaction {
        Interaction {
            id: Uuid::new_v4(),
            stakeholder_id: stakeholder.id,
            user_id: Uuid::new_v4(),
            subject: Some(subject.to_string()),
            description: None,
            outcome: None,
            duration_minutes: None,
            follow_up_date: None,
            tags: Vec::new(),
            attachments: Vec::new(),
            record: InteractionRecord {
                sentiment: InteractionSentiment::Positive,
                interaction_type: "meeting".to_string(),
                impact_on_relationship: None,
                date: now() - Duration::days(days_ago),
                follow_up_required: false,
                follow_up_completed: false,
            },
            created_at: now(),
        }
    }

    #[test]
    fn report_lists_sections_and_attention_items() {
        let engaged = Stakeholder::new("Aiko Tanaka", StakeholderScores::with_scores(8.0, 6.0), now());
        let silent = Stakeholder::new("Marcus Bell", StakeholderScores::with_scores(9.0, -6.0), now());
        let interactions = vec![
            interaction(&engaged, 2, "Zoning briefing"),
            interaction(&engaged, 60, "Old lunch"),
        ];

        let report = build_report(None, 90, now(), &[engaged, silent], &interactions).unwrap();
        assert!(report.starts_with("# Stakeholder Engagement Report"));
        assert!(report.contains("Generated for all stakeholders on 2026-05-20"));
        assert!(report.contains("- Aiko Tanaka (independent) score 4.00 across 1 interactions"));
        assert!(report.contains("- Marcus Bell (influence 9.0): High influence, no recent interaction"));
        assert!(report.contains("Zoning briefing"));
        assert!(report.contains("- meeting: 2"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = build_report(Some("Harbor"), 30, now(), &[], &[]).unwrap();
        assert!(report.contains("Generated for Harbor"));
        assert!(report.contains("No interactions recorded for this window."));
        assert!(report.contains("No stakeholders engaged in this window."));
    }

    #[test]
    fn engagement_ranking_skips_quiet_stakeholders() {
        let busy = Stakeholder::new("Busy", StakeholderScores::default(), now());
        let quiet = Stakeholder::new("Quiet", StakeholderScores::default(), now());
        let rows = rank_engagement(
            &[busy.clone(), quiet],
            &[interaction(&busy, 1, "a"), interaction(&busy, 3, "b")],
            now(),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Busy");
        assert_eq!(rows[0].score, 4.5);
    }

    #[test]
    fn interactions_after_the_evaluation_time_are_ignored() {
        let stakeholder = Stakeholder::new("Later", StakeholderScores::with_scores(8.0, 1.0), now());
        let future = interaction(&stakeholder, -5, "Next week's site visit");

        let rows = rank_engagement(&[stakeholder.clone()], &[future.clone()], now()).unwrap();
        assert!(rows.is_empty());

        let report = build_report(None, 30, now(), &[stakeholder], &[future]).unwrap();
        assert!(report.contains("- Later (influence 8.0): High influence, no recent interaction"));
        assert!(!report.contains("site visit"));
    }

    #[test]
    fn report_rejects_oversized_windows() {
        assert!(build_report(None, i64::MAX, now(), &[], &[]).is_err());
    }
}
