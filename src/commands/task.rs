use tracing::info;

use super::{or_dash, Context};
use crate::auth::Permission;
use crate::cli::TaskCommand;
use crate::db::{self, TaskFilter};
use crate::error::EngagementError;
use crate::models::Task;
use crate::tasks::{self, TaskUpdate};

const TASK_STATE_CHANGE: &[Permission] = &[Permission::Update, Permission::Create];

pub async fn execute(command: TaskCommand, ctx: &Context) -> anyhow::Result<()> {
    match command {
        TaskCommand::Add {
            title,
            description,
            priority,
            assign,
            stakeholder,
            campaign,
            due,
            tags,
        } => {
            let identity = ctx.authorize(&[Permission::CreateTask, Permission::Create])?;
            let title = title.trim();
            if title.is_empty() {
                return Err(EngagementError::invalid("task title must not be empty").into());
            }
            if let Some(id) = stakeholder {
                db::get_stakeholder(&ctx.pool, id).await?;
            }
            if let Some(id) = campaign {
                db::get_campaign(&ctx.pool, id).await?;
            }

            let mut task = Task::new(title, identity.user_id, priority, ctx.now);
            task.description = description;
            task.assigned_to = assign;
            task.stakeholder_id = stakeholder;
            task.campaign_id = campaign;
            task.due_date = due;
            for tag in &tags {
                task.add_tag(tag);
            }
            db::insert_task(&ctx.pool, &task).await?;
            info!(task_id = %task.id, "task created");
            ctx.emit(&task, |task| println!("Created task '{}' ({}).", task.title, task.id))
        }
        TaskCommand::List {
            status,
            priority,
            assignee,
            mine,
            campaign,
            stakeholder,
            limit,
        } => {
            let identity = ctx.authorize(&[Permission::Read])?;
            let filter = TaskFilter {
                status,
                priority,
                assigned_to: if mine { Some(identity.user_id) } else { assignee },
                campaign_id: campaign,
                stakeholder_id: stakeholder,
                limit: limit.clamp(1, 1000),
            };
            let tasks = db::list_tasks(&ctx.pool, &filter).await?;
            ctx.emit(&tasks[..], |tasks| {
                if tasks.is_empty() {
                    println!("No tasks match.");
                }
                for task in tasks {
                    print_task(task, ctx);
                }
            })
        }
        TaskCommand::Show { id } => {
            ctx.authorize(&[Permission::Read])?;
            let task = db::get_task(&ctx.pool, id).await?;
            ctx.emit(&task, |task| {
                print_task(task, ctx);
                if let Some(description) = task.description.as_deref() {
                    println!("  {description}");
                }
                if !task.tags.is_empty() {
                    println!("  tags: {}", task.tags.join(", "));
                }
            })
        }
        TaskCommand::Update {
            id,
            title,
            description,
            status,
            priority,
            assign,
            stakeholder,
            campaign,
            due,
            tags,
        } => {
            ctx.authorize(TASK_STATE_CHANGE)?;
            if let Some(id) = stakeholder {
                db::get_stakeholder(&ctx.pool, id).await?;
            }
            if let Some(id) = campaign {
                db::get_campaign(&ctx.pool, id).await?;
            }
            let mut task = db::get_task(&ctx.pool, id).await?;
            let update = TaskUpdate {
                title,
                description,
                status,
                priority,
                assigned_to: assign,
                stakeholder_id: stakeholder,
                campaign_id: campaign,
                due_date: due,
                tags: (!tags.is_empty()).then_some(tags),
            };
            tasks::apply_update(&mut task, update, ctx.now)?;
            db::save_task(&ctx.pool, &task).await?;
            info!(task_id = %id, status = %task.status, "task updated");
            ctx.emit(&task, |task| print_task(task, ctx))
        }
        TaskCommand::Delete { id } => {
            ctx.authorize(&[Permission::Delete])?;
            db::delete_task(&ctx.pool, id).await?;
            ctx.emit(&id, |id| println!("Deleted task {id}."))
        }
        TaskCommand::Complete { ids } => {
            ctx.authorize(TASK_STATE_CHANGE)?;
            let now = ctx.now;
            let updated = db::bulk_update_tasks(&ctx.pool, &ids, |task| tasks::complete(task, now)).await?;
            info!(updated, "tasks completed");
            ctx.emit(&updated, |updated| {
                println!("Completed {updated} of {} tasks.", ids.len());
            })
        }
        TaskCommand::Cancel { id } => {
            ctx.authorize(TASK_STATE_CHANGE)?;
            let mut task = db::get_task(&ctx.pool, id).await?;
            tasks::cancel(&mut task);
            db::save_task(&ctx.pool, &task).await?;
            ctx.emit(&task, |task| println!("Cancelled '{}'.", task.title))
        }
        TaskCommand::Reopen { id } => {
            ctx.authorize(TASK_STATE_CHANGE)?;
            let mut task = db::get_task(&ctx.pool, id).await?;
            tasks::reopen(&mut task);
            db::save_task(&ctx.pool, &task).await?;
            ctx.emit(&task, |task| println!("Reopened '{}'.", task.title))
        }
        TaskCommand::Assign { user, ids } => {
            ctx.authorize(TASK_STATE_CHANGE)?;
            let updated =
                db::bulk_update_tasks(&ctx.pool, &ids, |task| task.assigned_to = Some(user)).await?;
            info!(updated, assignee = %user, "tasks assigned");
            ctx.emit(&updated, |updated| {
                println!("Assigned {updated} of {} tasks to {user}.", ids.len());
            })
        }
        TaskCommand::Dashboard => {
            let identity = ctx.authorize(&[Permission::Read])?;
            let filter = TaskFilter {
                assigned_to: Some(identity.user_id),
                limit: 1000,
                ..TaskFilter::default()
            };
            let mine = db::list_tasks(&ctx.pool, &filter).await?;
            let board = tasks::dashboard(&mine, ctx.now);
            ctx.emit(&board, |board| {
                for (heading, bucket) in [
                    ("Overdue", &board.overdue),
                    ("Due today", &board.today),
                    ("Due this week", &board.this_week),
                    ("Recently completed", &board.recently_completed),
                ] {
                    println!("{heading} ({})", bucket.len());
                    for task in bucket {
                        print!("  ");
                        print_task(task, ctx);
                    }
                }
            })
        }
        TaskCommand::Workload => {
            ctx.authorize(&[Permission::Read])?;
            let users = db::list_users(&ctx.pool).await?;
            let assigned = db::assigned_tasks(&ctx.pool).await?;
            let rows = tasks::workload(&users, &assigned, ctx.now);
            ctx.emit(&rows[..], |rows| {
                for row in rows {
                    println!(
                        "{:<28} {:>3} open  {:>3} overdue",
                        row.full_name, row.open_tasks, row.overdue_tasks
                    );
                }
            })
        }
    }
}

fn print_task(task: &Task, ctx: &Context) {
    let due = task
        .due_date
        .map(|due| due.format("%Y-%m-%d").to_string());
    println!(
        "{}  {:<11} {:<7} due {:<10} {}{}",
        task.id,
        task.status,
        task.priority,
        or_dash(due.as_deref()),
        task.title,
        if tasks::is_overdue(task, ctx.now) { "  [overdue]" } else { "" }
    );
}
