use super::{or_dash, Context};
use crate::analytics;
use crate::auth::Permission;
use crate::cli::AnalyticsCommand;
use crate::db;
use crate::scoring;

pub async fn execute(command: AnalyticsCommand, ctx: &Context) -> anyhow::Result<()> {
    ctx.authorize(&[Permission::Read])?;
    match command {
        AnalyticsCommand::Map => {
            let stakeholders = db::all_stakeholders(&ctx.pool).await?;
            let map = analytics::stakeholder_map(&stakeholders);
            ctx.emit(&map, |map| {
                for (key, points) in &map.quadrants {
                    println!("{key} ({})", points.len());
                    for point in points {
                        println!(
                            "  {:<30} inf {:>5.1}  int {:>5.1}",
                            point.name, point.influence, point.interest
                        );
                    }
                }
            })
        }
        AnalyticsCommand::Trends { days } => {
            let since = scoring::window_start(ctx.now, days)?;
            let interactions = db::interactions_since(&ctx.pool, since, ctx.now).await?;
            let trends = analytics::engagement_trends(&interactions, since, days);
            ctx.emit(&trends, |trends| {
                println!(
                    "{} interactions in the last {} days",
                    trends.total_interactions, trends.period_days
                );
                for (kind, count) in &trends.by_type {
                    println!("  {kind:<14} {count}");
                }
                for (sentiment, count) in &trends.by_sentiment {
                    println!("  {sentiment:<14} {count}");
                }
            })
        }
        AnalyticsCommand::Health => {
            let stakeholders = db::all_stakeholders(&ctx.pool).await?;
            let summary = analytics::health_summary(&stakeholders);
            ctx.emit(&summary, |s| {
                println!("Stakeholders:       {}", s.total_stakeholders);
                println!("Average influence:  {:.2}", s.average_influence);
                println!("Average interest:   {:.2}", s.average_interest);
                println!(
                    "High priority:      {} ({:.2}%)",
                    s.high_priority_count, s.high_priority_percentage
                );
                for (status, count) in &s.sentiment_distribution {
                    println!("  {status:<26} {count}");
                }
            })
        }
        AnalyticsCommand::Campaigns => {
            let campaigns = db::list_campaigns(&ctx.pool, None).await?;
            let metrics = analytics::campaign_metrics(&campaigns);
            ctx.emit(&metrics, |m| {
                println!("Active campaigns:     {}", m.active_campaigns);
                println!("Completed campaigns:  {}", m.completed_campaigns);
                for (phase, count) in &m.by_phase {
                    println!("  {phase:<10} {count}");
                }
            })
        }
        AnalyticsCommand::Shared { first, second } => {
            let shared = db::shared_stakeholders(&ctx.pool, first, second).await?;
            ctx.emit(&shared[..], |shared| {
                if shared.is_empty() {
                    println!("No stakeholders in common.");
                }
                for s in shared {
                    println!(
                        "{}  {:<30} {}",
                        s.id,
                        s.name,
                        or_dash(s.organization.as_deref())
                    );
                }
            })
        }
    }
}
