use tracing::info;

use super::{or_dash, Context};
use crate::auth::Permission;
use crate::cli::RelationshipCommand;
use crate::db;
use crate::models::{Relationship, RelationshipUpdate};

pub async fn execute(command: RelationshipCommand, ctx: &Context) -> anyhow::Result<()> {
    match command {
        RelationshipCommand::Add {
            stakeholder,
            related,
            relationship_type,
            strength,
            notes,
        } => {
            ctx.authorize(&[Permission::Update, Permission::Create])?;
            let mut relationship = Relationship::new(stakeholder, related, relationship_type, strength)?;
            relationship.notes = notes;
            let related = db::get_stakeholder(&ctx.pool, related).await?;
            let origin = db::get_stakeholder(&ctx.pool, stakeholder).await?;
            relationship.stakeholder_name = Some(origin.name);
            relationship.related_name = Some(related.name);
            db::insert_relationship(&ctx.pool, &relationship).await?;
            info!(relationship_id = %relationship.id, "relationship recorded");
            ctx.emit(&relationship, |r| {
                println!(
                    "Recorded {} link to {} (strength {:.1}).",
                    r.relationship_type,
                    or_dash(r.related_name.as_deref()),
                    r.strength
                );
            })
        }
        RelationshipCommand::List { stakeholder } => {
            ctx.authorize(&[Permission::Read])?;
            db::get_stakeholder(&ctx.pool, stakeholder).await?;
            let links = db::relationships_for(&ctx.pool, stakeholder).await?;
            ctx.emit(&links[..], |links| {
                if links.is_empty() {
                    println!("No relationships recorded.");
                }
                for link in links {
                    let r = &link.relationship;
                    println!(
                        "{}  {:<12} {:<8} {:<30} strength {:>4.1}{}",
                        r.id,
                        r.relationship_type,
                        link.direction,
                        or_dash(link.other_name.as_deref()),
                        r.strength,
                        if r.is_active { "" } else { "  (inactive)" }
                    );
                }
            })
        }
        RelationshipCommand::Show { id } => {
            ctx.authorize(&[Permission::Read])?;
            let relationship = db::get_relationship(&ctx.pool, id).await?;
            ctx.emit(&relationship, print_detail)
        }
        RelationshipCommand::Update {
            id,
            relationship_type,
            strength,
            notes,
            active,
        } => {
            ctx.authorize(&[Permission::Update, Permission::Create])?;
            let mut relationship = db::get_relationship(&ctx.pool, id).await?;
            relationship.apply_update(RelationshipUpdate {
                relationship_type,
                strength,
                notes,
                is_active: active,
            });
            db::update_relationship(&ctx.pool, &relationship).await?;
            info!(relationship_id = %id, "relationship updated");
            ctx.emit(&relationship, print_detail)
        }
        RelationshipCommand::Delete { id } => {
            ctx.authorize(&[Permission::Delete])?;
            db::delete_relationship(&ctx.pool, id).await?;
            ctx.emit(&id, |id| println!("Deleted relationship {id}."))
        }
    }
}

fn print_detail(r: &Relationship) {
    println!(
        "{} -> {} ({})",
        or_dash(r.stakeholder_name.as_deref()),
        or_dash(r.related_name.as_deref()),
        r.id
    );
    println!("  type:      {}", r.relationship_type);
    println!("  strength:  {:.1}", r.strength);
    println!("  active:    {}", if r.is_active { "yes" } else { "no" });
    if let Some(notes) = r.notes.as_deref() {
        println!("  notes:     {notes}");
    }
}
