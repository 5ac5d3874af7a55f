use tracing::{info, warn};
use uuid::Uuid;

use super::stakeholder::print_summary;
use super::{or_dash, Context};
use crate::auth::Permission;
use crate::cli::InteractionCommand;
use crate::db::{self, InteractionFilter};
use crate::models::{
    add_unique_tag, normalize_interaction_type, Interaction, InteractionRecord,
    InteractionUpdate, KNOWN_INTERACTION_TYPES,
};

pub async fn execute(command: InteractionCommand, ctx: &Context) -> anyhow::Result<()> {
    match command {
        InteractionCommand::Log {
            stakeholder,
            interaction_type,
            subject,
            description,
            outcome,
            sentiment,
            impact,
            date,
            duration_minutes,
            follow_up,
            follow_up_date,
            tags,
            attachments,
        } => {
            let identity = ctx.authorize(&[Permission::CreateInteraction, Permission::Create])?;
            db::get_stakeholder(&ctx.pool, stakeholder).await?;

            let interaction_type = normalize_interaction_type(&interaction_type)?;
            warn_if_unknown(&interaction_type);

            let mut interaction = Interaction {
                id: Uuid::new_v4(),
                stakeholder_id: stakeholder,
                user_id: identity.user_id,
                subject,
                description,
                outcome,
                duration_minutes,
                follow_up_date,
                tags: Vec::new(),
                attachments: Vec::new(),
                record: InteractionRecord {
                    sentiment,
                    interaction_type,
                    impact_on_relationship: impact,
                    date: date.unwrap_or(ctx.now),
                    follow_up_required: follow_up || follow_up_date.is_some(),
                    follow_up_completed: false,
                },
                created_at: ctx.now,
            };
            for tag in &tags {
                add_unique_tag(&mut interaction.tags, tag);
            }
            for reference in attachments {
                interaction.add_attachment(reference, ctx.now);
            }

            db::insert_interaction(&ctx.pool, &interaction, None).await?;
            info!(interaction_id = %interaction.id, stakeholder_id = %stakeholder, "interaction logged");
            ctx.emit(&interaction, |i| {
                println!(
                    "Logged {} ({}) on {}.",
                    i.record.interaction_type,
                    i.record.sentiment,
                    i.record.date.format("%Y-%m-%d")
                );
            })
        }
        InteractionCommand::Show { id } => {
            ctx.authorize(&[Permission::Read])?;
            let interaction = db::get_interaction(&ctx.pool, id).await?;
            ctx.emit(&interaction, print_detail)
        }
        InteractionCommand::Update {
            id,
            interaction_type,
            subject,
            description,
            outcome,
            sentiment,
            impact,
            date,
            duration_minutes,
            follow_up_required,
            follow_up_date,
            follow_up_completed,
            tags,
            attachments,
        } => {
            let identity = ctx.authorize(&[Permission::Update, Permission::CreateInteraction])?;
            let mut interaction = db::get_interaction(&ctx.pool, id).await?;
            identity.require_owner_or(interaction.user_id, Permission::Update)?;

            let update = InteractionUpdate {
                interaction_type,
                subject,
                description,
                outcome,
                sentiment,
                impact_on_relationship: impact,
                date,
                duration_minutes,
                follow_up_required,
                follow_up_date,
                follow_up_completed,
                tags: (!tags.is_empty()).then_some(tags),
                attachments,
            };
            interaction.apply_update(update, ctx.now)?;
            warn_if_unknown(&interaction.record.interaction_type);
            db::update_interaction(&ctx.pool, &interaction).await?;
            info!(interaction_id = %id, "interaction updated");
            ctx.emit(&interaction, print_detail)
        }
        InteractionCommand::List {
            stakeholder,
            interaction_type,
            page,
            per_page,
        } => {
            ctx.authorize(&[Permission::Read])?;
            let filter = InteractionFilter {
                stakeholder_id: stakeholder,
                interaction_type: interaction_type.map(|kind| kind.trim().to_lowercase()),
                page,
                per_page: ctx.settings.per_page(per_page),
            };
            let page = db::list_interactions(&ctx.pool, &filter).await?;
            ctx.emit(&page, |page| {
                if page.items.is_empty() {
                    println!("No interactions match.");
                    return;
                }
                for item in &page.items {
                    print_summary(item);
                }
                println!(
                    "Page {} of {} ({} interactions).",
                    page.current_page, page.pages, page.total
                );
            })
        }
        InteractionCommand::CompleteFollowUp { id } => {
            ctx.authorize(&[Permission::CreateInteraction, Permission::Update])?;
            db::complete_follow_up(&ctx.pool, id).await?;
            ctx.emit(&id, |id| println!("Follow-up on {id} marked complete."))
        }
        InteractionCommand::Delete { id } => {
            ctx.authorize(&[Permission::Delete])?;
            db::delete_interaction(&ctx.pool, id).await?;
            ctx.emit(&id, |id| println!("Deleted interaction {id}."))
        }
        InteractionCommand::Import { csv } => {
            let identity = ctx.authorize(&[Permission::CreateInteraction, Permission::Create])?;
            let outcome = db::import_csv(&ctx.pool, &csv, identity.user_id, ctx.now).await?;
            ctx.emit(&outcome, |outcome| {
                println!(
                    "Inserted {} interactions from {} ({} duplicates, {} skipped).",
                    outcome.inserted,
                    csv.display(),
                    outcome.duplicates,
                    outcome.skipped
                );
            })
        }
        InteractionCommand::Feed { limit } => {
            ctx.authorize(&[Permission::Read])?;
            let feed = db::activity_feed(&ctx.pool, limit.clamp(1, 500)).await?;
            ctx.emit(&feed[..], |feed| {
                if feed.is_empty() {
                    println!("No activity yet.");
                }
                for item in feed {
                    println!("{} by {}", item.date.format("%Y-%m-%d %H:%M"), item.user_name);
                    print!("    ");
                    print_summary(item);
                }
            })
        }
    }
}

fn warn_if_unknown(interaction_type: &str) {
    if !KNOWN_INTERACTION_TYPES.contains(&interaction_type) {
        warn!(interaction_type = %interaction_type, "unrecognised interaction type");
    }
}

fn print_detail(interaction: &Interaction) {
    let record = &interaction.record;
    println!("{} ({})", or_dash(interaction.subject.as_deref()), interaction.id);
    println!("  stakeholder:  {}", interaction.stakeholder_id);
    println!("  type:         {}", record.interaction_type);
    println!("  date:         {}", record.date.format("%Y-%m-%d %H:%M"));
    println!("  sentiment:    {}", record.sentiment);
    if let Some(impact) = record.impact_on_relationship {
        println!("  impact:       {impact:+.1}");
    }
    if let Some(minutes) = interaction.duration_minutes {
        println!("  duration:     {minutes} min");
    }
    println!("  outcome:      {}", or_dash(interaction.outcome.as_deref()));
    if record.follow_up_required {
        let due = interaction
            .follow_up_date
            .map(|due| due.format("%Y-%m-%d").to_string());
        println!(
            "  follow-up:    {} (due {})",
            if record.follow_up_completed { "done" } else { "open" },
            or_dash(due.as_deref())
        );
    }
    if !interaction.tags.is_empty() {
        println!("  tags:         {}", interaction.tags.join(", "));
    }
    for attachment in &interaction.attachments {
        println!("  attachment:   {} <{}>", attachment.filename, attachment.url);
    }
    if let Some(description) = interaction.description.as_deref() {
        println!("  {description}");
    }
}
