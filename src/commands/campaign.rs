use serde::Serialize;
use tracing::info;

use super::stakeholder::print_summary;
use super::{or_dash, Context};
use crate::auth::Permission;
use crate::campaign::{self as framework, CampaignProgress, CampaignUpdate};
use crate::cli::CampaignCommand;
use crate::db;
use crate::error::EngagementError;
use crate::models::{Campaign, Stakeholder};

const CAMPAIGN_WRITE: &[Permission] = &[Permission::ManageCampaigns, Permission::Update];
const ACTIVITY_MAX: i64 = 100;

#[derive(Serialize)]
struct CampaignDetail {
    #[serde(flatten)]
    campaign: Campaign,
    stakeholders: Vec<Stakeholder>,
    progress: CampaignProgress,
}

#[derive(Serialize)]
struct AdvanceOutcome {
    campaign: Campaign,
    escalated_tasks: Vec<uuid::Uuid>,
}

pub async fn execute(command: CampaignCommand, ctx: &Context) -> anyhow::Result<()> {
    match command {
        CampaignCommand::Create {
            name,
            description,
            goals,
            key_messages,
            audience,
        } => {
            let identity = ctx.authorize(CAMPAIGN_WRITE)?;
            let name = name.trim();
            if name.is_empty() {
                return Err(EngagementError::invalid("campaign name must not be empty").into());
            }
            let mut campaign = Campaign::new(name, identity.user_id, ctx.now);
            campaign.description = description;
            campaign.goals = goals;
            campaign.key_messages = key_messages;
            campaign.target_audience = audience;

            let tasks = framework::framework_tasks(&campaign, ctx.now);
            db::create_campaign(&ctx.pool, &campaign, &tasks).await?;
            ctx.emit(&campaign, |c| {
                println!(
                    "Created campaign {} ({}) with {} framework tasks.",
                    c.name,
                    c.id,
                    tasks.len()
                );
            })
        }
        CampaignCommand::Show { id } => {
            ctx.authorize(&[Permission::Read])?;
            let campaign = db::get_campaign(&ctx.pool, id).await?;
            let tasks = db::tasks_for_campaign(&ctx.pool, id).await?;
            let progress = framework::progress(&campaign, &tasks);
            let stakeholders = db::campaign_members(&ctx.pool, id).await?;
            let detail = CampaignDetail {
                campaign,
                stakeholders,
                progress,
            };
            ctx.emit(&detail, |detail| {
                let c = &detail.campaign;
                println!("{} ({})", c.name, c.id);
                println!("  status:    {}", c.status);
                println!("  phase:     {}", c.phase);
                println!("  audience:  {}", or_dash(c.target_audience.as_deref()));
                for goal in &c.goals {
                    println!("  goal:      {goal}");
                }
                for message in &c.key_messages {
                    println!("  message:   {message}");
                }
                print_progress(&detail.progress);
                println!("  stakeholders ({}):", detail.stakeholders.len());
                for s in &detail.stakeholders {
                    println!("    {}  {} ({})", s.id, s.name, s.scores.sentiment);
                }
            })
        }
        CampaignCommand::List { status } => {
            ctx.authorize(&[Permission::Read])?;
            let campaigns = db::list_campaigns(&ctx.pool, status).await?;
            ctx.emit(&campaigns[..], |campaigns| {
                if campaigns.is_empty() {
                    println!("No campaigns yet.");
                }
                for c in campaigns {
                    println!("{}  {:<32} {:<10} {}", c.id, c.name, c.status, c.phase);
                }
            })
        }
        CampaignCommand::Update {
            id,
            name,
            description,
            status,
            start,
            end,
            goals,
            key_messages,
            audience,
        } => {
            ctx.authorize(CAMPAIGN_WRITE)?;
            let mut campaign = db::get_campaign(&ctx.pool, id).await?;
            let update = CampaignUpdate {
                name,
                description,
                status,
                start_date: start,
                end_date: end,
                goals: (!goals.is_empty()).then_some(goals),
                key_messages: (!key_messages.is_empty()).then_some(key_messages),
                target_audience: audience,
            };
            framework::apply_update(&mut campaign, update, ctx.now)?;
            db::save_campaign(&ctx.pool, &campaign).await?;
            info!(campaign_id = %id, status = %campaign.status, "campaign updated");
            ctx.emit(&campaign, |c| println!("Updated {} ({}, {}).", c.name, c.status, c.phase))
        }
        CampaignCommand::Delete { id } => {
            ctx.authorize(&[Permission::Delete])?;
            db::delete_campaign(&ctx.pool, id).await?;
            ctx.emit(&id, |id| println!("Deleted campaign {id} and its tasks."))
        }
        CampaignCommand::Activate { id } => {
            update_status(ctx, id, |c, now| framework::activate(c, now)).await
        }
        CampaignCommand::Pause { id } => {
            update_status(ctx, id, |c, _| framework::pause(c)).await
        }
        CampaignCommand::Complete { id } => {
            update_status(ctx, id, |c, now| framework::complete(c, now)).await
        }
        CampaignCommand::Advance { id } => {
            ctx.authorize(CAMPAIGN_WRITE)?;
            let (campaign, escalated_tasks) = db::advance_campaign_phase(&ctx.pool, id).await?;
            let outcome = AdvanceOutcome {
                campaign,
                escalated_tasks,
            };
            ctx.emit(&outcome, |outcome| {
                println!(
                    "{} is in the {} phase; {} tasks escalated to urgent.",
                    outcome.campaign.name,
                    outcome.campaign.phase,
                    outcome.escalated_tasks.len()
                );
            })
        }
        CampaignCommand::Progress { id } => {
            ctx.authorize(&[Permission::Read])?;
            let campaign = db::get_campaign(&ctx.pool, id).await?;
            let tasks = db::tasks_for_campaign(&ctx.pool, id).await?;
            let progress = framework::progress(&campaign, &tasks);
            ctx.emit(&progress, print_progress)
        }
        CampaignCommand::AddStakeholder { id, stakeholder } => {
            ctx.authorize(CAMPAIGN_WRITE)?;
            db::get_campaign(&ctx.pool, id).await?;
            db::get_stakeholder(&ctx.pool, stakeholder).await?;
            let added = db::add_campaign_stakeholder(&ctx.pool, id, stakeholder).await?;
            ctx.emit(&added, |added| {
                if *added {
                    println!("Added {stakeholder} to the campaign.");
                } else {
                    println!("{stakeholder} is already part of the campaign.");
                }
            })
        }
        CampaignCommand::RemoveStakeholder { id, stakeholder } => {
            ctx.authorize(CAMPAIGN_WRITE)?;
            let removed = db::remove_campaign_stakeholder(&ctx.pool, id, stakeholder).await?;
            ctx.emit(&removed, |removed| {
                if *removed {
                    println!("Removed {stakeholder} from the campaign.");
                } else {
                    println!("{stakeholder} was not part of the campaign.");
                }
            })
        }
        CampaignCommand::Recommend {
            id,
            min_influence,
            min_interest,
        } => {
            ctx.authorize(&[Permission::Read])?;
            db::get_campaign(&ctx.pool, id).await?;
            let members = db::campaign_member_ids(&ctx.pool, id).await?;
            let stakeholders = db::all_stakeholders(&ctx.pool).await?;
            let recommended =
                framework::recommend_stakeholders(&stakeholders, &members, min_influence, min_interest);
            ctx.emit(&recommended[..], |recommended| {
                if recommended.is_empty() {
                    println!("No stakeholders meet the thresholds.");
                }
                for s in recommended {
                    println!(
                        "{}  {:<30} inf {:>5.1}  int {:>5.1}  {}",
                        s.id,
                        s.name,
                        s.scores.influence_score,
                        s.scores.interest_score,
                        s.scores.sentiment
                    );
                }
            })
        }
        CampaignCommand::Activity { id, limit } => {
            ctx.authorize(&[Permission::Read])?;
            db::get_campaign(&ctx.pool, id).await?;
            let activity =
                db::campaign_activity(&ctx.pool, id, limit.clamp(1, ACTIVITY_MAX)).await?;
            ctx.emit(&activity[..], |activity| {
                if activity.is_empty() {
                    println!("No interactions with campaign stakeholders yet.");
                }
                for item in activity {
                    print_summary(item);
                }
            })
        }
    }
}

async fn update_status<F>(ctx: &Context, id: uuid::Uuid, change: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut Campaign, chrono::DateTime<chrono::Utc>),
{
    ctx.authorize(CAMPAIGN_WRITE)?;
    let mut campaign = db::get_campaign(&ctx.pool, id).await?;
    change(&mut campaign, ctx.now);
    db::save_campaign(&ctx.pool, &campaign).await?;
    info!(campaign_id = %id, status = %campaign.status, "campaign status changed");
    ctx.emit(&campaign, |c| println!("{} is now {}.", c.name, c.status))
}

fn print_progress(progress: &CampaignProgress) {
    println!(
        "  progress:  {}/{} tasks ({:.2}%), phase {}, {}",
        progress.completed_tasks,
        progress.total_tasks,
        progress.progress_percentage,
        progress.current_phase,
        progress.status
    );
}
