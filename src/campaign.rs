use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngagementError;
use crate::models::{
    Campaign, CampaignPhase, CampaignStatus, Stakeholder, Task, TaskPriority, TaskStatus,
};
use crate::scoring::round2;

pub const FRAMEWORK_TAG: &str = "framework";
pub const RECOMMENDATION_LIMIT: usize = 20;
pub const DEFAULT_MIN_INFLUENCE: f64 = 5.0;
pub const DEFAULT_MIN_INTEREST: f64 = 0.0;

pub struct FrameworkStep {
    pub step: u8,
    pub phase: CampaignPhase,
    pub name: &'static str,
    pub description: &'static str,
}

pub const FRAMEWORK_STEPS: [FrameworkStep; 12] = [
    FrameworkStep {
        step: 1,
        phase: CampaignPhase::Purpose,
        name: "Set Goals",
        description: "Define how stakeholder relations will support organizational goals",
    },
    FrameworkStep {
        step: 2,
        phase: CampaignPhase::Purpose,
        name: "Issue Identification",
        description: "Assess current status and identify key issues",
    },
    FrameworkStep {
        step: 3,
        phase: CampaignPhase::Purpose,
        name: "Stakeholder Identification",
        description: "Identify those with influence over business",
    },
    FrameworkStep {
        step: 4,
        phase: CampaignPhase::Purpose,
        name: "Stakeholder Prioritization",
        description: "Prioritize by opportunity or risk",
    },
    FrameworkStep {
        step: 5,
        phase: CampaignPhase::Plan,
        name: "Landscape Analysis",
        description: "Map complete stakeholder landscape",
    },
    FrameworkStep {
        step: 6,
        phase: CampaignPhase::Plan,
        name: "Team Alignment",
        description: "Align internal teams and establish governance",
    },
    FrameworkStep {
        step: 7,
        phase: CampaignPhase::Plan,
        name: "Research & Listening",
        description: "Conduct research and listening sessions",
    },
    FrameworkStep {
        step: 8,
        phase: CampaignPhase::Plan,
        name: "Stakeholder Analysis",
        description: "Analyze data and create predictive models",
    },
    FrameworkStep {
        step: 9,
        phase: CampaignPhase::Execute,
        name: "Launch Campaign",
        description: "Launch purposeful communication",
    },
    FrameworkStep {
        step: 10,
        phase: CampaignPhase::Execute,
        name: "Ongoing Analysis",
        description: "Continuously analyze stakeholder sentiment",
    },
    FrameworkStep {
        step: 11,
        phase: CampaignPhase::Execute,
        name: "Collaborate",
        description: "Engage directly with stakeholders",
    },
    FrameworkStep {
        step: 12,
        phase: CampaignPhase::Execute,
        name: "Realize Value",
        description: "Create and measure shared value outcomes",
    },
];

/// One task per framework step, tagged with its phase. The first four steps
/// are high priority.
pub fn framework_tasks(campaign: &Campaign, now: DateTime<Utc>) -> Vec<Task> {
    FRAMEWORK_STEPS
        .iter()
        .map(|step| {
            let priority = if step.step <= 4 {
                TaskPriority::High
            } else {
                TaskPriority::Medium
            };
            let mut task = Task::new(
                format!("Step {}: {}", step.step, step.name),
                campaign.owner_id,
                priority,
                now,
            );
            task.description = Some(step.description.to_string());
            task.campaign_id = Some(campaign.id);
            task.add_tag(step.phase.as_str());
            task.add_tag(FRAMEWORK_TAG);
            task
        })
        .collect()
}

/// Moves to the next phase and escalates the open tasks tagged with it.
/// Returns the ids of escalated tasks; at `execute` nothing changes.
pub fn advance_phase(campaign: &mut Campaign, tasks: &mut [Task]) -> Vec<Uuid> {
    let Some(next) = campaign.phase.next() else {
        return Vec::new();
    };
    campaign.phase = next;

    let mut escalated = Vec::new();
    for task in tasks.iter_mut() {
        if task.status == TaskStatus::Open && task.tags.iter().any(|tag| tag == next.as_str()) {
            task.priority = TaskPriority::Urgent;
            escalated.push(task.id);
        }
    }
    escalated
}

pub fn activate(campaign: &mut Campaign, now: DateTime<Utc>) {
    campaign.status = CampaignStatus::Active;
    if campaign.start_date.is_none() {
        campaign.start_date = Some(now);
    }
}

pub fn complete(campaign: &mut Campaign, now: DateTime<Utc>) {
    campaign.status = CampaignStatus::Completed;
    if campaign.end_date.is_none() {
        campaign.end_date = Some(now);
    }
}

pub fn pause(campaign: &mut Campaign) {
    campaign.status = CampaignStatus::Paused;
}

/// Field changes for an existing campaign. The phase only moves through
/// [`advance_phase`], so it is not part of an update.
#[derive(Debug, Clone, Default)]
pub struct CampaignUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<CampaignStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub goals: Option<Vec<String>>,
    pub key_messages: Option<Vec<String>>,
    pub target_audience: Option<String>,
}

/// Applies `update` in full or not at all. Status changes go through the same
/// transitions as the dedicated commands; explicit dates win over the ones
/// those transitions fill in.
pub fn apply_update(
    campaign: &mut Campaign,
    update: CampaignUpdate,
    now: DateTime<Utc>,
) -> Result<(), EngagementError> {
    let mut next = campaign.clone();
    if let Some(name) = update.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngagementError::invalid("campaign name must not be empty"));
        }
        next.name = name.to_string();
    }
    if update.description.is_some() {
        next.description = update.description;
    }
    match update.status {
        Some(CampaignStatus::Active) => activate(&mut next, now),
        Some(CampaignStatus::Completed) => complete(&mut next, now),
        Some(CampaignStatus::Paused) => pause(&mut next),
        Some(status) => next.status = status,
        None => {}
    }
    if update.start_date.is_some() {
        next.start_date = update.start_date;
    }
    if update.end_date.is_some() {
        next.end_date = update.end_date;
    }
    if let Some(goals) = update.goals {
        next.goals = goals;
    }
    if let Some(messages) = update.key_messages {
        next.key_messages = messages;
    }
    if update.target_audience.is_some() {
        next.target_audience = update.target_audience;
    }

    if let (Some(start), Some(end)) = (next.start_date, next.end_date) {
        if end < start {
            return Err(EngagementError::invalid("campaign end date is before its start date"));
        }
    }
    *campaign = next;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignProgress {
    pub campaign_id: Uuid,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub progress_percentage: f64,
    pub current_phase: CampaignPhase,
    pub status: CampaignStatus,
}

pub fn progress(campaign: &Campaign, tasks: &[Task]) -> CampaignProgress {
    let total_tasks = tasks.len();
    let completed_tasks = tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Completed)
        .count();
    let progress_percentage = if total_tasks == 0 {
        0.0
    } else {
        round2(completed_tasks as f64 / total_tasks as f64 * 100.0)
    };

    CampaignProgress {
        campaign_id: campaign.id,
        total_tasks,
        completed_tasks,
        progress_percentage,
        current_phase: campaign.phase,
        status: campaign.status,
    }
}

/// Non-member stakeholders above both thresholds, strongest influence first.
pub fn recommend_stakeholders(
    stakeholders: &[Stakeholder],
    member_ids: &HashSet<Uuid>,
    min_influence: f64,
    min_interest: f64,
) -> Vec<Stakeholder> {
    let mut candidates: Vec<Stakeholder> = stakeholders
        .iter()
        .filter(|s| !member_ids.contains(&s.id))
        .filter(|s| s.scores.influence_score >= min_influence)
        .filter(|s| s.scores.interest_score >= min_interest)
        .cloned()
        .collect();

    candidates.sort_by(|a, b| {
        b.scores
            .influence_score
            .partial_cmp(&a.scores.influence_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.scores
                    .interest_score
                    .partial_cmp(&a.scores.interest_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
    candidates.truncate(RECOMMENDATION_LIMIT);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StakeholderScores;

    fn campaign() -> Campaign {
        Campaign::new("Harbor Expansion", Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn framework_creates_twelve_tagged_tasks() {
        let campaign = campaign();
        let tasks = framework_tasks(&campaign, Utc::now());
        assert_eq!(tasks.len(), 12);
        assert_eq!(tasks[0].title, "Step 1: Set Goals");
        assert_eq!(tasks[3].priority, TaskPriority::High);
        assert_eq!(tasks[4].priority, TaskPriority::Medium);
        assert_eq!(tasks[4].tags, vec!["plan".to_string(), "framework".to_string()]);
        assert!(tasks.iter().all(|t| t.campaign_id == Some(campaign.id)));
        assert!(tasks.iter().all(|t| t.created_by == campaign.owner_id));
    }

    #[test]
    fn advancing_escalates_open_tasks_of_the_new_phase() {
        let mut campaign = campaign();
        let mut tasks = framework_tasks(&campaign, Utc::now());
        tasks[5].status = TaskStatus::Completed;

        let escalated = advance_phase(&mut campaign, &mut tasks);
        assert_eq!(campaign.phase, CampaignPhase::Plan);
        assert_eq!(escalated.len(), 3);
        assert_eq!(tasks[4].priority, TaskPriority::Urgent);
        assert_eq!(tasks[5].priority, TaskPriority::Medium);
        assert_eq!(tasks[0].priority, TaskPriority::High);
    }

    #[test]
    fn advancing_past_execute_is_a_no_op() {
        let mut campaign = campaign();
        campaign.phase = CampaignPhase::Execute;
        let mut tasks = framework_tasks(&campaign, Utc::now());
        assert!(advance_phase(&mut campaign, &mut tasks).is_empty());
        assert_eq!(campaign.phase, CampaignPhase::Execute);
    }

    #[test]
    fn status_transitions_keep_first_dates() {
        let mut campaign = campaign();
        let first = Utc::now();
        activate(&mut campaign, first);
        pause(&mut campaign);
        assert_eq!(campaign.status, CampaignStatus::Paused);
        activate(&mut campaign, first + chrono::Duration::days(3));
        assert_eq!(campaign.start_date, Some(first));
        complete(&mut campaign, first + chrono::Duration::days(9));
        assert_eq!(campaign.status, CampaignStatus::Completed);
        assert!(campaign.end_date.is_some());
    }

    #[test]
    fn update_runs_status_transitions_and_keeps_phase() {
        let mut campaign = campaign();
        let start = Utc::now();
        apply_update(
            &mut campaign,
            CampaignUpdate {
                name: Some(" Harbor Expansion II ".to_string()),
                status: Some(CampaignStatus::Active),
                goals: Some(vec!["Secure council vote".to_string()]),
                ..CampaignUpdate::default()
            },
            start,
        )
        .unwrap();
        assert_eq!(campaign.name, "Harbor Expansion II");
        assert_eq!(campaign.status, CampaignStatus::Active);
        assert_eq!(campaign.start_date, Some(start));
        assert_eq!(campaign.phase, CampaignPhase::Purpose);
        assert_eq!(campaign.goals, vec!["Secure council vote".to_string()]);
    }

    #[test]
    fn update_rejects_an_end_before_the_start() {
        let mut campaign = campaign();
        let start = Utc::now();
        campaign.start_date = Some(start);
        let result = apply_update(
            &mut campaign,
            CampaignUpdate {
                name: Some("Renamed".to_string()),
                end_date: Some(start - chrono::Duration::days(1)),
                ..CampaignUpdate::default()
            },
            start,
        );
        assert!(result.is_err());
        assert_eq!(campaign.name, "Harbor Expansion");
        assert!(campaign.end_date.is_none());
    }

    #[test]
    fn progress_is_a_rounded_percentage() {
        let campaign = campaign();
        let empty = progress(&campaign, &[]);
        assert_eq!(empty.progress_percentage, 0.0);

        let mut tasks = framework_tasks(&campaign, Utc::now());
        tasks.truncate(3);
        tasks[0].status = TaskStatus::Completed;
        let report = progress(&campaign, &tasks);
        assert_eq!(report.completed_tasks, 1);
        assert_eq!(report.total_tasks, 3);
        assert_eq!(report.progress_percentage, 33.33);
    }

    #[test]
    fn recommendations_skip_members_and_sort_by_influence_then_interest() {
        let now = Utc::now();
        let a = Stakeholder::new("A", StakeholderScores::with_scores(6.0, 1.0), now);
        let b = Stakeholder::new("B", StakeholderScores::with_scores(8.0, 0.0), now);
        let c = Stakeholder::new("C", StakeholderScores::with_scores(6.0, 4.0), now);
        let low = Stakeholder::new("Low", StakeholderScores::with_scores(4.0, 9.0), now);
        let hostile = Stakeholder::new("Hostile", StakeholderScores::with_scores(9.0, -3.0), now);
        let member = Stakeholder::new("Member", StakeholderScores::with_scores(9.5, 9.5), now);

        let members: HashSet<Uuid> = [member.id].into_iter().collect();
        let picked = recommend_stakeholders(
            &[a, b, c, low, hostile, member],
            &members,
            DEFAULT_MIN_INFLUENCE,
            DEFAULT_MIN_INTEREST,
        );
        let names: Vec<&str> = picked.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C", "A"]);
    }
}
