use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngagementError;
use crate::models::{add_unique_tag, Task, TaskPriority, TaskStatus, User};

pub const RECENTLY_COMPLETED_LIMIT: usize = 10;

pub fn complete(task: &mut Task, now: DateTime<Utc>) {
    task.status = TaskStatus::Completed;
    task.completed_at = Some(now);
}

pub fn cancel(task: &mut Task) {
    task.status = TaskStatus::Cancelled;
}

pub fn reopen(task: &mut Task) {
    task.status = TaskStatus::Open;
    task.completed_at = None;
}

/// Field changes for an existing task; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Uuid>,
    pub stakeholder_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
}

/// Applies `update`, keeping `completed_at` in step with the status.
pub fn apply_update(
    task: &mut Task,
    update: TaskUpdate,
    now: DateTime<Utc>,
) -> Result<(), EngagementError> {
    if let Some(title) = update.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(EngagementError::invalid("task title must not be empty"));
        }
        task.title = title.to_string();
    }
    if update.description.is_some() {
        task.description = update.description;
    }
    match update.status {
        Some(TaskStatus::Completed) if task.status != TaskStatus::Completed => complete(task, now),
        Some(TaskStatus::Cancelled) => cancel(task),
        Some(status) if status.is_active() => {
            task.status = status;
            task.completed_at = None;
        }
        _ => {}
    }
    if let Some(priority) = update.priority {
        task.priority = priority;
    }
    if update.assigned_to.is_some() {
        task.assigned_to = update.assigned_to;
    }
    if update.stakeholder_id.is_some() {
        task.stakeholder_id = update.stakeholder_id;
    }
    if update.campaign_id.is_some() {
        task.campaign_id = update.campaign_id;
    }
    if update.due_date.is_some() {
        task.due_date = update.due_date;
    }
    if let Some(tags) = update.tags {
        task.tags.clear();
        for tag in &tags {
            add_unique_tag(&mut task.tags, tag);
        }
    }
    Ok(())
}

pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    match task.due_date {
        Some(due) => task.status.is_active() && now > due,
        None => false,
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskDashboard {
    pub overdue: Vec<Task>,
    pub today: Vec<Task>,
    pub this_week: Vec<Task>,
    pub recently_completed: Vec<Task>,
}

/// Buckets a user's tasks by due date relative to `now`.
pub fn dashboard(tasks: &[Task], now: DateTime<Utc>) -> TaskDashboard {
    let end_of_day = now
        .date_naive()
        .and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
        .and_utc();
    let week_end = now + Duration::days(7);

    let mut board = TaskDashboard::default();
    for task in tasks {
        if task.status == TaskStatus::Completed {
            board.recently_completed.push(task.clone());
            continue;
        }
        if !task.status.is_active() {
            continue;
        }
        let Some(due) = task.due_date else {
            continue;
        };
        if due < now {
            board.overdue.push(task.clone());
        } else if due <= end_of_day {
            board.today.push(task.clone());
        } else if due <= week_end {
            board.this_week.push(task.clone());
        }
    }

    board.overdue.sort_by_key(|task| task.due_date);
    board
        .today
        .sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank()));
    board.this_week.sort_by_key(|task| task.due_date);
    board
        .recently_completed
        .sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    board.recently_completed.truncate(RECENTLY_COMPLETED_LIMIT);
    board
}

#[derive(Debug, Clone, Serialize)]
pub struct Workload {
    pub user_id: Uuid,
    pub full_name: String,
    pub open_tasks: usize,
    pub overdue_tasks: usize,
}

pub fn workload(users: &[User], tasks: &[Task], now: DateTime<Utc>) -> Vec<Workload> {
    users
        .iter()
        .filter(|user| user.is_active)
        .map(|user| {
            let assigned: Vec<&Task> = tasks
                .iter()
                .filter(|task| task.assigned_to == Some(user.id) && task.status.is_active())
                .collect();
            Workload {
                user_id: user.id,
                full_name: user.full_name(),
                open_tasks: assigned.len(),
                overdue_tasks: assigned.iter().filter(|task| is_overdue(task, now)).count(),
            }
        })
        .collect()
}
