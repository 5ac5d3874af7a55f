use serde::Serialize;
use tracing::info;

use super::{or_dash, Context};
use crate::auth::Permission;
use crate::cli::{StakeholderCommand, StakeholderFields};
use crate::db::{self, StakeholderFilter};
use crate::error::EngagementError;
use crate::models::{InteractionSummary, Stakeholder, StakeholderScores};
use crate::scoring;

const SHOW_RECENT_INTERACTIONS: i64 = 10;
const HISTORY_LIMIT: i64 = 500;

#[derive(Serialize)]
struct StakeholderDetail {
    #[serde(flatten)]
    stakeholder: Stakeholder,
    interaction_count: i64,
    recent_interactions: Vec<InteractionSummary>,
}

pub async fn execute(command: StakeholderCommand, ctx: &Context) -> anyhow::Result<()> {
    match command {
        StakeholderCommand::Add {
            name,
            fields,
            influence,
            interest,
            tags,
        } => {
            ctx.authorize(&[Permission::Create])?;
            let name = required_name(name)?;
            let mut stakeholder =
                Stakeholder::new(name, StakeholderScores::with_scores(influence, interest), ctx.now);
            apply_fields(&mut stakeholder, fields);
            for tag in &tags {
                stakeholder.add_tag(tag);
            }
            db::insert_stakeholder(&ctx.pool, &stakeholder).await?;
            info!(stakeholder_id = %stakeholder.id, status = %stakeholder.scores.sentiment, "stakeholder created");
            ctx.emit(&stakeholder, |s| {
                println!("Created {} ({}) as {}.", s.name, s.id, s.scores.sentiment);
            })
        }
        StakeholderCommand::Show { id } => {
            ctx.authorize(&[Permission::Read])?;
            let stakeholder = db::get_stakeholder(&ctx.pool, id).await?;
            let interaction_count = db::interaction_count(&ctx.pool, id).await?;
            let recent_interactions =
                db::engagement_history(&ctx.pool, id, None, SHOW_RECENT_INTERACTIONS).await?;
            let detail = StakeholderDetail {
                stakeholder,
                interaction_count,
                recent_interactions,
            };
            ctx.emit(&detail, print_detail)
        }
        StakeholderCommand::List {
            search,
            tag,
            status,
            page,
            per_page,
        } => {
            ctx.authorize(&[Permission::Read])?;
            let filter = StakeholderFilter {
                search,
                tag,
                status,
                page,
                per_page: ctx.settings.per_page(per_page),
            };
            let page = db::list_stakeholders(&ctx.pool, &filter).await?;
            ctx.emit(&page, |page| {
                if page.items.is_empty() {
                    println!("No stakeholders match.");
                    return;
                }
                for s in &page.items {
                    println!(
                        "{}  {:<30} {:<28} inf {:>5.1}  int {:>5.1}  {}",
                        s.id,
                        s.name,
                        or_dash(s.organization.as_deref()),
                        s.scores.influence_score,
                        s.scores.interest_score,
                        s.scores.sentiment
                    );
                }
                println!(
                    "Page {} of {} ({} stakeholders).",
                    page.current_page, page.pages, page.total
                );
            })
        }
        StakeholderCommand::Update {
            id,
            name,
            fields,
            influence,
            interest,
            status,
        } => {
            ctx.authorize(&[Permission::Update, Permission::Create])?;
            let mut stakeholder = db::get_stakeholder(&ctx.pool, id).await?;
            if let Some(name) = name {
                stakeholder.name = required_name(name)?;
            }
            apply_fields(&mut stakeholder, fields);
            stakeholder.scores.set_scores(influence, interest);
            if let Some(status) = status {
                stakeholder.scores = stakeholder.scores.with_override(status);
            }
            stakeholder.updated_at = ctx.now;
            db::update_stakeholder(&ctx.pool, &stakeholder).await?;
            ctx.emit(&stakeholder, |s| {
                println!(
                    "Updated {}: influence {:.1}, interest {:.1}, {}.",
                    s.name, s.scores.influence_score, s.scores.interest_score, s.scores.sentiment
                );
            })
        }
        StakeholderCommand::Delete { id } => {
            ctx.authorize(&[Permission::Delete])?;
            db::delete_stakeholder(&ctx.pool, id).await?;
            ctx.emit(&id, |id| println!("Deleted stakeholder {id}."))
        }
        StakeholderCommand::Tag { ids, add, remove } => {
            ctx.authorize(&[Permission::Update, Permission::Create])?;
            let updated = db::bulk_update_tags(&ctx.pool, &ids, &add, &remove, ctx.now).await?;
            ctx.emit(&updated, |updated| {
                println!("Updated tags on {updated} of {} stakeholders.", ids.len());
            })
        }
        StakeholderCommand::History { id, days } => {
            ctx.authorize(&[Permission::Read])?;
            db::get_stakeholder(&ctx.pool, id).await?;
            let since = scoring::window_start(ctx.now, days)?;
            let history = db::engagement_history(&ctx.pool, id, Some(since), HISTORY_LIMIT).await?;
            ctx.emit(&history[..], |history| {
                if history.is_empty() {
                    println!("No interactions in the last {days} days.");
                }
                for item in history {
                    print_summary(item);
                }
            })
        }
    }
}

fn required_name(name: String) -> Result<String, EngagementError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EngagementError::invalid("stakeholder name must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn apply_fields(stakeholder: &mut Stakeholder, fields: StakeholderFields) {
    let StakeholderFields {
        title,
        organization,
        email,
        phone,
        stakeholder_type,
        priority,
        notes,
        linkedin_url,
        twitter_handle,
        address,
    } = fields;
    if title.is_some() {
        stakeholder.title = title;
    }
    if organization.is_some() {
        stakeholder.organization = organization;
    }
    if let Some(email) = email {
        stakeholder.email = Some(email.trim().to_lowercase());
    }
    if phone.is_some() {
        stakeholder.phone = phone;
    }
    if stakeholder_type.is_some() {
        stakeholder.stakeholder_type = stakeholder_type;
    }
    if let Some(priority) = priority {
        stakeholder.priority = priority;
    }
    if notes.is_some() {
        stakeholder.notes = notes;
    }
    if linkedin_url.is_some() {
        stakeholder.linkedin_url = linkedin_url;
    }
    if let Some(handle) = twitter_handle {
        stakeholder.twitter_handle = Some(handle.trim().trim_start_matches('@').to_string());
    }
    if address.is_some() {
        stakeholder.address = address;
    }
}

pub(crate) fn print_summary(item: &InteractionSummary) {
    println!(
        "{}  {}  {:<24} {:<12} {:<8} {}{}",
        item.interaction_id,
        item.date.format("%Y-%m-%d"),
        item.stakeholder_name,
        item.interaction_type,
        item.sentiment,
        or_dash(item.subject.as_deref()),
        if item.follow_up_required { "  [follow-up]" } else { "" }
    );
}

fn print_detail(detail: &StakeholderDetail) {
    let s = &detail.stakeholder;
    println!("{} ({})", s.name, s.id);
    println!("  title:         {}", or_dash(s.title.as_deref()));
    println!("  organization:  {}", or_dash(s.organization.as_deref()));
    println!("  email:         {}", or_dash(s.email.as_deref()));
    println!("  phone:         {}", or_dash(s.phone.as_deref()));
    println!("  type:          {}", or_dash(s.stakeholder_type.as_deref()));
    println!("  linkedin:      {}", or_dash(s.linkedin_url.as_deref()));
    println!("  twitter:       {}", or_dash(s.twitter_handle.as_deref()));
    println!("  address:       {}", or_dash(s.address.as_deref()));
    println!("  priority:      {}", s.priority);
    println!("  influence:     {:.1}", s.scores.influence_score);
    println!("  interest:      {:.1}", s.scores.interest_score);
    println!("  status:        {}", s.scores.sentiment);
    if !s.tags.is_empty() {
        println!("  tags:          {}", s.tags.join(", "));
    }
    if let Some(notes) = s.notes.as_deref() {
        println!("  notes:         {notes}");
    }
    println!("  interactions:  {}", detail.interaction_count);
    for item in &detail.recent_interactions {
        print!("    ");
        print_summary(item);
    }
}
