use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::Context;
use crate::auth::Permission;
use crate::cli::ScoreCommand;
use crate::db;
use crate::models::{RelationshipStatus, Stakeholder};
use crate::scoring::{
    self, EngagementBreakdown, ENGAGEMENT_WINDOW_DAYS, HEALTH_WINDOW_DAYS, PRIORITY_WINDOW_DAYS,
};

#[derive(Serialize)]
struct EngagementOutput {
    stakeholder_id: Uuid,
    name: String,
    period_days: i64,
    #[serde(flatten)]
    breakdown: EngagementBreakdown,
}

#[derive(Serialize)]
struct HealthChange {
    stakeholder_id: Uuid,
    name: String,
    interactions: usize,
    previous_interest: f64,
    interest_score: f64,
    previous_status: RelationshipStatus,
    status: RelationshipStatus,
}

pub async fn execute(command: ScoreCommand, ctx: &Context) -> anyhow::Result<()> {
    match command {
        ScoreCommand::Engagement { stakeholder } => {
            ctx.authorize(&[Permission::Read])?;
            let found = db::get_stakeholder(&ctx.pool, stakeholder).await?;
            let start = scoring::window_start(ctx.now, ENGAGEMENT_WINDOW_DAYS)?;
            let records =
                db::interaction_records_since(&ctx.pool, stakeholder, start, ctx.now).await?;
            let output = EngagementOutput {
                stakeholder_id: found.id,
                name: found.name,
                period_days: ENGAGEMENT_WINDOW_DAYS,
                breakdown: scoring::engagement_breakdown(&records, start),
            };
            ctx.emit(&output, |o| {
                let b = &o.breakdown;
                println!("{}: engagement {:.2} over {} days", o.name, b.total, o.period_days);
                println!("  interactions: {}", b.interaction_count);
                println!("  frequency:    {:.2}", b.frequency);
                println!("  sentiment:    {:.2}", b.sentiment);
                println!("  variety:      {:.2}", b.variety);
                println!("  follow-up:    {:.2}", b.follow_up);
            })
        }
        ScoreCommand::Health { stakeholder, all } => {
            ctx.authorize(&[Permission::Update])?;
            let targets = match stakeholder {
                Some(id) if !all => vec![db::get_stakeholder(&ctx.pool, id).await?],
                _ => db::all_stakeholders(&ctx.pool).await?,
            };
            let mut changes = Vec::with_capacity(targets.len());
            for target in targets {
                changes.push(refresh_health(ctx, target).await?);
            }
            info!(refreshed = changes.len(), "relationship health refreshed");
            ctx.emit(&changes[..], |changes| {
                for c in changes {
                    println!(
                        "{:<30} interest {:>5.1} -> {:>5.1}  {} -> {}  ({} interactions)",
                        c.name,
                        c.previous_interest,
                        c.interest_score,
                        c.previous_status,
                        c.status,
                        c.interactions
                    );
                }
            })
        }
        ScoreCommand::Priority { limit } => {
            ctx.authorize(&[Permission::Read])?;
            let start = scoring::window_start(ctx.now, PRIORITY_WINDOW_DAYS)?;
            let stakeholders = db::all_stakeholders(&ctx.pool).await?;
            let recent = db::recent_records_by_stakeholder(&ctx.pool, start, ctx.now).await?;
            let selected = scoring::select_priority(&stakeholders, &recent, start, limit);
            ctx.emit(&selected[..], |selected| {
                if selected.is_empty() {
                    println!("Every high-influence stakeholder was contacted in the last {PRIORITY_WINDOW_DAYS} days.");
                    return;
                }
                for entry in selected {
                    println!(
                        "{}  {:<30} influence {:.1}  {}",
                        entry.stakeholder.id, entry.stakeholder.name, entry.priority_score, entry.reason
                    );
                }
            })
        }
    }
}

async fn refresh_health(ctx: &Context, stakeholder: Stakeholder) -> anyhow::Result<HealthChange> {
    let start = scoring::window_start(ctx.now, HEALTH_WINDOW_DAYS)?;
    let records = db::interaction_records_since(&ctx.pool, stakeholder.id, start, ctx.now).await?;
    let updated = scoring::update_health(stakeholder.scores, &records);
    if updated != stakeholder.scores {
        db::save_scores(&ctx.pool, stakeholder.id, &updated, ctx.now).await?;
    } else {
        debug!(stakeholder_id = %stakeholder.id, "health unchanged");
    }
    Ok(HealthChange {
        stakeholder_id: stakeholder.id,
        name: stakeholder.name,
        interactions: records.len(),
        previous_interest: stakeholder.scores.interest_score,
        interest_score: updated.interest_score,
        previous_status: stakeholder.scores.sentiment,
        status: updated.sentiment,
    })
}
