use std::collections::{HashMap, HashSet};

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::campaign;
use crate::error::EngagementError;
use crate::models::{
    normalize_interaction_type, Attachment, Campaign, CampaignStatus, Interaction,
    InteractionRecord, InteractionSentiment, InteractionSummary, Relationship, RelationshipLink,
    RelationshipStatus, Stakeholder, StakeholderScores, Task, TaskPriority, TaskStatus, User,
};

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, role, is_active, created_at";

const STAKEHOLDER_COLUMNS: &str = "id, name, title, organization, email, phone, \
     stakeholder_type, priority, tags, notes, linkedin_url, twitter_handle, address, \
     influence_score, interest_score, sentiment, created_at, updated_at";

const INTERACTION_COLUMNS: &str = "id, stakeholder_id, user_id, interaction_type, subject, \
     description, outcome, sentiment, impact_on_relationship, occurred_at, duration_minutes, \
     follow_up_required, follow_up_date, follow_up_completed, tags, attachments, created_at";

const RELATIONSHIP_SELECT: &str = "SELECT r.id, r.stakeholder_id, r.related_stakeholder_id, \
     a.name AS stakeholder_name, b.name AS related_name, r.relationship_type, r.strength, \
     r.notes, r.is_active \
     FROM stakeholder_engagement.relationships r \
     JOIN stakeholder_engagement.stakeholders a ON a.id = r.stakeholder_id \
     JOIN stakeholder_engagement.stakeholders b ON b.id = r.related_stakeholder_id";

const INTERACTION_SUMMARY_SELECT: &str = "SELECT i.id, i.stakeholder_id, s.name AS stakeholder_name, \
     u.first_name || ' ' || u.last_name AS user_name, i.interaction_type, i.subject, \
     i.sentiment, i.follow_up_required, i.occurred_at \
     FROM stakeholder_engagement.interactions i \
     JOIN stakeholder_engagement.stakeholders s ON s.id = i.stakeholder_id \
     JOIN stakeholder_engagement.users u ON u.id = i.user_id";

const TASK_COLUMNS: &str = "id, title, description, status, priority, assigned_to, created_by, \
     stakeholder_id, campaign_id, due_date, completed_at, tags, created_at";

const CAMPAIGN_COLUMNS: &str = "id, name, description, phase, status, owner_id, start_date, \
     end_date, goals, key_messages, target_audience, created_at";

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
}

impl<T> Page<T> {
    fn new(items: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        Self {
            items,
            total,
            pages: (total + per_page - 1) / per_page.max(1),
            current_page: page,
        }
    }
}

/// Rows to skip before `page`. Pages past the addressable range are rejected
/// rather than wrapped.
fn offset(page: i64, per_page: i64) -> Result<i64, EngagementError> {
    (page.max(1) - 1)
        .checked_mul(per_page)
        .ok_or_else(|| EngagementError::invalid(format!("page {page} is out of range")))
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("schema migrations applied");
    Ok(())
}

// ---------------------------------------------------------------------------
// users

fn user_from_row(row: &PgRow) -> anyhow::Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        role: row.try_get::<String, _>("role")?.parse()?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn count_users(pool: &PgPool) -> anyhow::Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM stakeholder_engagement.users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn insert_user(pool: &PgPool, user: &User) -> anyhow::Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO stakeholder_engagement.users
        (id, email, password_hash, first_name, last_name, role, is_active, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(user.role.as_str())
    .bind(user.is_active)
    .bind(user.created_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EngagementError::Conflict(format!(
            "a user with email {} already exists",
            user.email
        ))
        .into());
    }
    info!(user_id = %user.id, role = %user.role, "user registered");
    Ok(())
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {USER_COLUMNS} FROM stakeholder_engagement.users WHERE lower(email) = lower($1)"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> anyhow::Result<User> {
    let row = sqlx::query(&format!(
        "SELECT {USER_COLUMNS} FROM stakeholder_engagement.users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| EngagementError::not_found("user", id))?;
    user_from_row(&row)
}

/// Writes the profile names and password hash of a user.
pub async fn save_user(pool: &PgPool, user: &User) -> anyhow::Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE stakeholder_engagement.users
        SET first_name = $2, last_name = $3, password_hash = $4
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(EngagementError::not_found("user", user.id).into());
    }
    debug!(user_id = %user.id, "user saved");
    Ok(())
}

pub async fn list_users(pool: &PgPool) -> anyhow::Result<Vec<User>> {
    let rows = sqlx::query(&format!(
        "SELECT {USER_COLUMNS} FROM stakeholder_engagement.users ORDER BY last_name, first_name"
    ))
    .fetch_all(pool)
    .await?;
    rows.iter().map(user_from_row).collect()
}

// ---------------------------------------------------------------------------
// stakeholders

fn stakeholder_from_row(row: &PgRow) -> anyhow::Result<Stakeholder> {
    let sentiment: RelationshipStatus = row.try_get::<String, _>("sentiment")?.parse()?;
    Ok(Stakeholder {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        title: row.try_get("title")?,
        organization: row.try_get("organization")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        stakeholder_type: row.try_get("stakeholder_type")?,
        priority: row.try_get("priority")?,
        tags: row.try_get("tags")?,
        notes: row.try_get("notes")?,
        linkedin_url: row.try_get("linkedin_url")?,
        twitter_handle: row.try_get("twitter_handle")?,
        address: row.try_get("address")?,
        scores: StakeholderScores {
            influence_score: row.try_get("influence_score")?,
            interest_score: row.try_get("interest_score")?,
            sentiment,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn insert_stakeholder<'e, E>(executor: E, stakeholder: &Stakeholder) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO stakeholder_engagement.stakeholders
        (id, name, title, organization, email, phone, stakeholder_type, priority, tags, notes,
         linkedin_url, twitter_handle, address, influence_score, interest_score, sentiment,
         created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(stakeholder.id)
    .bind(&stakeholder.name)
    .bind(&stakeholder.title)
    .bind(&stakeholder.organization)
    .bind(&stakeholder.email)
    .bind(&stakeholder.phone)
    .bind(&stakeholder.stakeholder_type)
    .bind(&stakeholder.priority)
    .bind(&stakeholder.tags)
    .bind(&stakeholder.notes)
    .bind(&stakeholder.linkedin_url)
    .bind(&stakeholder.twitter_handle)
    .bind(&stakeholder.address)
    .bind(stakeholder.scores.influence_score)
    .bind(stakeholder.scores.interest_score)
    .bind(stakeholder.scores.sentiment.as_str())
    .bind(stakeholder.created_at)
    .bind(stakeholder.updated_at)
    .execute(executor)
    .await
    .with_context(|| format!("failed to insert stakeholder {}", stakeholder.name))?;
    debug!(stakeholder_id = %stakeholder.id, "stakeholder inserted");
    Ok(())
}

pub async fn get_stakeholder(pool: &PgPool, id: Uuid) -> anyhow::Result<Stakeholder> {
    let row = sqlx::query(&format!(
        "SELECT {STAKEHOLDER_COLUMNS} FROM stakeholder_engagement.stakeholders WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| EngagementError::not_found("stakeholder", id))?;
    stakeholder_from_row(&row)
}

pub async fn find_stakeholder_id_by_email(
    pool: &PgPool,
    email: &str,
) -> anyhow::Result<Option<Uuid>> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM stakeholder_engagement.stakeholders WHERE lower(email) = lower($1)",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

/// Writes every mutable column of the stakeholder.
pub async fn update_stakeholder<'e, E>(executor: E, stakeholder: &Stakeholder) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE stakeholder_engagement.stakeholders
        SET name = $2, title = $3, organization = $4, email = $5, phone = $6,
            stakeholder_type = $7, priority = $8, tags = $9, notes = $10,
            linkedin_url = $11, twitter_handle = $12, address = $13,
            influence_score = $14, interest_score = $15, sentiment = $16, updated_at = $17
        WHERE id = $1
        "#,
    )
    .bind(stakeholder.id)
    .bind(&stakeholder.name)
    .bind(&stakeholder.title)
    .bind(&stakeholder.organization)
    .bind(&stakeholder.email)
    .bind(&stakeholder.phone)
    .bind(&stakeholder.stakeholder_type)
    .bind(&stakeholder.priority)
    .bind(&stakeholder.tags)
    .bind(&stakeholder.notes)
    .bind(&stakeholder.linkedin_url)
    .bind(&stakeholder.twitter_handle)
    .bind(&stakeholder.address)
    .bind(stakeholder.scores.influence_score)
    .bind(stakeholder.scores.interest_score)
    .bind(stakeholder.scores.sentiment.as_str())
    .bind(stakeholder.updated_at)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EngagementError::not_found("stakeholder", stakeholder.id).into());
    }
    Ok(())
}

/// Persists a scores snapshot in one statement; concurrent writers race with
/// last-write-wins.
pub async fn save_scores(
    pool: &PgPool,
    id: Uuid,
    scores: &StakeholderScores,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE stakeholder_engagement.stakeholders
        SET influence_score = $2, interest_score = $3, sentiment = $4, updated_at = $5
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(scores.influence_score)
    .bind(scores.interest_score)
    .bind(scores.sentiment.as_str())
    .bind(now)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EngagementError::not_found("stakeholder", id).into());
    }
    debug!(stakeholder_id = %id, sentiment = %scores.sentiment, "scores saved");
    Ok(())
}

pub async fn delete_stakeholder(pool: &PgPool, id: Uuid) -> anyhow::Result<()> {
    let result = sqlx::query("DELETE FROM stakeholder_engagement.stakeholders WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(EngagementError::not_found("stakeholder", id).into());
    }
    info!(stakeholder_id = %id, "stakeholder deleted");
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct StakeholderFilter {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub status: Option<RelationshipStatus>,
    pub page: i64,
    pub per_page: i64,
}

fn push_stakeholder_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &StakeholderFilter) {
    builder.push(" WHERE TRUE");
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR organization ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(tag) = &filter.tag {
        builder.push(" AND ").push_bind(tag.clone()).push(" = ANY(tags)");
    }
    if let Some(status) = filter.status {
        builder.push(" AND sentiment = ").push_bind(status.as_str());
    }
}

pub async fn list_stakeholders(
    pool: &PgPool,
    filter: &StakeholderFilter,
) -> anyhow::Result<Page<Stakeholder>> {
    let mut count = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM stakeholder_engagement.stakeholders",
    );
    push_stakeholder_filters(&mut count, filter);
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {STAKEHOLDER_COLUMNS} FROM stakeholder_engagement.stakeholders"
    ));
    push_stakeholder_filters(&mut query, filter);
    query
        .push(" ORDER BY name LIMIT ")
        .push_bind(filter.per_page)
        .push(" OFFSET ")
        .push_bind(offset(filter.page, filter.per_page)?);
    let rows = query.build().fetch_all(pool).await?;
    let items = rows
        .iter()
        .map(stakeholder_from_row)
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Page::new(items, total, filter.page.max(1), filter.per_page))
}

pub async fn all_stakeholders(pool: &PgPool) -> anyhow::Result<Vec<Stakeholder>> {
    let rows = sqlx::query(&format!(
        "SELECT {STAKEHOLDER_COLUMNS} FROM stakeholder_engagement.stakeholders ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;
    rows.iter().map(stakeholder_from_row).collect()
}

/// Adds then removes tags on every listed stakeholder in one transaction.
/// Returns how many stakeholders were found.
pub async fn bulk_update_tags(
    pool: &PgPool,
    ids: &[Uuid],
    add: &[String],
    remove: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    let rows = sqlx::query(&format!(
        "SELECT {STAKEHOLDER_COLUMNS} FROM stakeholder_engagement.stakeholders \
         WHERE id = ANY($1) FOR UPDATE"
    ))
    .bind(ids)
    .fetch_all(&mut *tx)
    .await?;

    let mut updated = 0usize;
    for row in rows.iter() {
        let mut stakeholder = stakeholder_from_row(row)?;
        for tag in add {
            stakeholder.add_tag(tag);
        }
        for tag in remove {
            stakeholder.remove_tag(tag);
        }
        stakeholder.updated_at = now;
        update_stakeholder(&mut *tx, &stakeholder).await?;
        updated += 1;
    }

    tx.commit().await?;
    info!(updated, "bulk tag update committed");
    Ok(updated)
}

// ---------------------------------------------------------------------------
// interactions

fn record_from_row(row: &PgRow) -> anyhow::Result<InteractionRecord> {
    Ok(InteractionRecord {
        sentiment: row.try_get::<String, _>("sentiment")?.parse()?,
        interaction_type: row.try_get("interaction_type")?,
        impact_on_relationship: row.try_get("impact_on_relationship")?,
        date: row.try_get("occurred_at")?,
        follow_up_required: row.try_get("follow_up_required")?,
        follow_up_completed: row.try_get("follow_up_completed")?,
    })
}

fn interaction_from_row(row: &PgRow) -> anyhow::Result<Interaction> {
    Ok(Interaction {
        id: row.try_get("id")?,
        stakeholder_id: row.try_get("stakeholder_id")?,
        user_id: row.try_get("user_id")?,
        subject: row.try_get("subject")?,
        description: row.try_get("description")?,
        outcome: row.try_get("outcome")?,
        duration_minutes: row.try_get("duration_minutes")?,
        follow_up_date: row.try_get("follow_up_date")?,
        tags: row.try_get("tags")?,
        attachments: row.try_get::<Json<Vec<Attachment>>, _>("attachments")?.0,
        record: record_from_row(row)?,
        created_at: row.try_get("created_at")?,
    })
}

fn summary_from_row(row: &PgRow) -> anyhow::Result<InteractionSummary> {
    Ok(InteractionSummary {
        interaction_id: row.try_get("id")?,
        stakeholder_id: row.try_get("stakeholder_id")?,
        stakeholder_name: row.try_get("stakeholder_name")?,
        user_name: row.try_get("user_name")?,
        interaction_type: row.try_get("interaction_type")?,
        subject: row.try_get("subject")?,
        sentiment: row.try_get::<String, _>("sentiment")?.parse()?,
        follow_up_required: row.try_get("follow_up_required")?,
        date: row.try_get("occurred_at")?,
    })
}

/// Returns false when `source_key` was already imported.
pub async fn insert_interaction(
    pool: &PgPool,
    interaction: &Interaction,
    source_key: Option<&str>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO stakeholder_engagement.interactions
        (id, stakeholder_id, user_id, interaction_type, subject, description, outcome,
         sentiment, impact_on_relationship, occurred_at, duration_minutes, follow_up_required,
         follow_up_date, follow_up_completed, tags, attachments, source_key, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(interaction.id)
    .bind(interaction.stakeholder_id)
    .bind(interaction.user_id)
    .bind(&interaction.record.interaction_type)
    .bind(&interaction.subject)
    .bind(&interaction.description)
    .bind(&interaction.outcome)
    .bind(interaction.record.sentiment.as_str())
    .bind(interaction.record.impact_on_relationship)
    .bind(interaction.record.date)
    .bind(interaction.duration_minutes)
    .bind(interaction.record.follow_up_required)
    .bind(interaction.follow_up_date)
    .bind(interaction.record.follow_up_completed)
    .bind(&interaction.tags)
    .bind(Json(&interaction.attachments))
    .bind(source_key)
    .bind(interaction.created_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_interaction(pool: &PgPool, id: Uuid) -> anyhow::Result<Interaction> {
    let row = sqlx::query(&format!(
        "SELECT {INTERACTION_COLUMNS} FROM stakeholder_engagement.interactions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| EngagementError::not_found("interaction", id))?;
    interaction_from_row(&row)
}

/// Writes every mutable column of the interaction.
pub async fn update_interaction(pool: &PgPool, interaction: &Interaction) -> anyhow::Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE stakeholder_engagement.interactions
        SET interaction_type = $2, subject = $3, description = $4, outcome = $5,
            sentiment = $6, impact_on_relationship = $7, occurred_at = $8,
            duration_minutes = $9, follow_up_required = $10, follow_up_date = $11,
            follow_up_completed = $12, tags = $13, attachments = $14
        WHERE id = $1
        "#,
    )
    .bind(interaction.id)
    .bind(&interaction.record.interaction_type)
    .bind(&interaction.subject)
    .bind(&interaction.description)
    .bind(&interaction.outcome)
    .bind(interaction.record.sentiment.as_str())
    .bind(interaction.record.impact_on_relationship)
    .bind(interaction.record.date)
    .bind(interaction.duration_minutes)
    .bind(interaction.record.follow_up_required)
    .bind(interaction.follow_up_date)
    .bind(interaction.record.follow_up_completed)
    .bind(&interaction.tags)
    .bind(Json(&interaction.attachments))
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(EngagementError::not_found("interaction", interaction.id).into());
    }
    debug!(interaction_id = %interaction.id, "interaction updated");
    Ok(())
}

pub async fn complete_follow_up(pool: &PgPool, id: Uuid) -> anyhow::Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE stakeholder_engagement.interactions
        SET follow_up_completed = TRUE
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(EngagementError::not_found("interaction", id).into());
    }
    Ok(())
}

pub async fn delete_interaction(pool: &PgPool, id: Uuid) -> anyhow::Result<()> {
    let result = sqlx::query("DELETE FROM stakeholder_engagement.interactions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(EngagementError::not_found("interaction", id).into());
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct InteractionFilter {
    pub stakeholder_id: Option<Uuid>,
    pub interaction_type: Option<String>,
    pub page: i64,
    pub per_page: i64,
}

fn push_interaction_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &InteractionFilter) {
    builder.push(" WHERE TRUE");
    if let Some(id) = filter.stakeholder_id {
        builder.push(" AND i.stakeholder_id = ").push_bind(id);
    }
    if let Some(kind) = &filter.interaction_type {
        builder.push(" AND i.interaction_type = ").push_bind(kind.clone());
    }
}

pub async fn list_interactions(
    pool: &PgPool,
    filter: &InteractionFilter,
) -> anyhow::Result<Page<InteractionSummary>> {
    let mut count = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM stakeholder_engagement.interactions i",
    );
    push_interaction_filters(&mut count, filter);
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Postgres>::new(INTERACTION_SUMMARY_SELECT);
    push_interaction_filters(&mut query, filter);
    query
        .push(" ORDER BY i.occurred_at DESC LIMIT ")
        .push_bind(filter.per_page)
        .push(" OFFSET ")
        .push_bind(offset(filter.page, filter.per_page)?);
    let rows = query.build().fetch_all(pool).await?;
    let items = rows
        .iter()
        .map(summary_from_row)
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Page::new(items, total, filter.page.max(1), filter.per_page))
}

/// Scoring records dated inside `[since, until]`.
pub async fn interaction_records_since(
    pool: &PgPool,
    stakeholder_id: Uuid,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> anyhow::Result<Vec<InteractionRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT sentiment, interaction_type, impact_on_relationship, occurred_at,
               follow_up_required, follow_up_completed
        FROM stakeholder_engagement.interactions
        WHERE stakeholder_id = $1 AND occurred_at >= $2 AND occurred_at <= $3
        "#,
    )
    .bind(stakeholder_id)
    .bind(since)
    .bind(until)
    .fetch_all(pool)
    .await?;
    rows.iter().map(record_from_row).collect()
}

pub async fn recent_records_by_stakeholder(
    pool: &PgPool,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> anyhow::Result<HashMap<Uuid, Vec<InteractionRecord>>> {
    let rows = sqlx::query(
        r#"
        SELECT stakeholder_id, sentiment, interaction_type, impact_on_relationship, occurred_at,
               follow_up_required, follow_up_completed
        FROM stakeholder_engagement.interactions
        WHERE occurred_at >= $1 AND occurred_at <= $2
        "#,
    )
    .bind(since)
    .bind(until)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<InteractionRecord>> = HashMap::new();
    for row in rows.iter() {
        let stakeholder_id: Uuid = row.try_get("stakeholder_id")?;
        grouped
            .entry(stakeholder_id)
            .or_default()
            .push(record_from_row(row)?);
    }
    Ok(grouped)
}

pub async fn interactions_since(
    pool: &PgPool,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> anyhow::Result<Vec<Interaction>> {
    let rows = sqlx::query(&format!(
        "SELECT {INTERACTION_COLUMNS} FROM stakeholder_engagement.interactions \
         WHERE occurred_at >= $1 AND occurred_at <= $2 ORDER BY occurred_at DESC"
    ))
    .bind(since)
    .bind(until)
    .fetch_all(pool)
    .await?;
    rows.iter().map(interaction_from_row).collect()
}

pub async fn interaction_count(pool: &PgPool, stakeholder_id: Uuid) -> anyhow::Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM stakeholder_engagement.interactions WHERE stakeholder_id = $1",
    )
    .bind(stakeholder_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Interactions with one stakeholder since `since`, newest first.
pub async fn engagement_history(
    pool: &PgPool,
    stakeholder_id: Uuid,
    since: Option<DateTime<Utc>>,
    limit: i64,
) -> anyhow::Result<Vec<InteractionSummary>> {
    let mut query = QueryBuilder::<Postgres>::new(INTERACTION_SUMMARY_SELECT);
    query
        .push(" WHERE i.stakeholder_id = ")
        .push_bind(stakeholder_id);
    if let Some(since) = since {
        query.push(" AND i.occurred_at >= ").push_bind(since);
    }
    query.push(" ORDER BY i.occurred_at DESC LIMIT ").push_bind(limit);
    let rows = query.build().fetch_all(pool).await?;
    rows.iter().map(summary_from_row).collect()
}

/// Most recently logged interactions across the team.
pub async fn activity_feed(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<InteractionSummary>> {
    let rows = sqlx::query(&format!(
        "{INTERACTION_SUMMARY_SELECT} ORDER BY i.created_at DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(summary_from_row).collect()
}

pub async fn campaign_activity(
    pool: &PgPool,
    campaign_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<InteractionSummary>> {
    let rows = sqlx::query(&format!(
        "{INTERACTION_SUMMARY_SELECT} \
         JOIN stakeholder_engagement.campaign_stakeholders cs ON cs.stakeholder_id = i.stakeholder_id \
         WHERE cs.campaign_id = $1 \
         ORDER BY i.occurred_at DESC LIMIT $2"
    ))
    .bind(campaign_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(summary_from_row).collect()
}

/// Stakeholders both users have logged interactions with.
pub async fn shared_stakeholders(
    pool: &PgPool,
    first_user: Uuid,
    second_user: Uuid,
) -> anyhow::Result<Vec<Stakeholder>> {
    let rows = sqlx::query(&format!(
        "SELECT {STAKEHOLDER_COLUMNS} FROM stakeholder_engagement.stakeholders \
         WHERE id IN (SELECT stakeholder_id FROM stakeholder_engagement.interactions WHERE user_id = $1) \
           AND id IN (SELECT stakeholder_id FROM stakeholder_engagement.interactions WHERE user_id = $2) \
         ORDER BY name"
    ))
    .bind(first_user)
    .bind(second_user)
    .fetch_all(pool)
    .await?;
    rows.iter().map(stakeholder_from_row).collect()
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

pub async fn import_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<ImportOutcome> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        stakeholder_email: String,
        interaction_type: String,
        sentiment: Option<String>,
        impact_on_relationship: Option<f64>,
        occurred_at: DateTime<Utc>,
        subject: Option<String>,
        follow_up_required: Option<bool>,
        follow_up_completed: Option<bool>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut outcome = ImportOutcome::default();
    let mut stakeholder_ids: HashMap<String, Option<Uuid>> = HashMap::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV record {}", line + 1))?;

        let Ok(interaction_type) = normalize_interaction_type(&row.interaction_type) else {
            warn!(record = line + 1, "interaction type is empty; row skipped");
            outcome.skipped += 1;
            continue;
        };

        let email = row.stakeholder_email.trim().to_lowercase();
        let stakeholder_id = match stakeholder_ids.get(&email) {
            Some(cached) => *cached,
            None => {
                let found = find_stakeholder_id_by_email(pool, &email).await?;
                stakeholder_ids.insert(email.clone(), found);
                found
            }
        };
        let Some(stakeholder_id) = stakeholder_id else {
            warn!(email = %email, record = line + 1, "no stakeholder with this email; row skipped");
            outcome.skipped += 1;
            continue;
        };

        let sentiment = match row.sentiment.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => value.parse()?,
            _ => InteractionSentiment::default(),
        };

        let interaction = Interaction {
            id: Uuid::new_v4(),
            stakeholder_id,
            user_id,
            subject: row.subject.filter(|s| !s.is_empty()),
            description: None,
            outcome: None,
            duration_minutes: None,
            follow_up_date: None,
            tags: Vec::new(),
            attachments: Vec::new(),
            record: InteractionRecord {
                sentiment,
                interaction_type,
                impact_on_relationship: row.impact_on_relationship,
                date: row.occurred_at,
                follow_up_required: row.follow_up_required.unwrap_or(false),
                follow_up_completed: row.follow_up_completed.unwrap_or(false),
            },
            created_at: now,
        };

        let source_key = row
            .source_key
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_interaction(pool, &interaction, Some(&source_key)).await? {
            outcome.inserted += 1;
        } else {
            outcome.duplicates += 1;
        }
    }

    info!(
        inserted = outcome.inserted,
        duplicates = outcome.duplicates,
        skipped = outcome.skipped,
        "interaction import finished"
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// tasks

fn task_from_row(row: &PgRow) -> anyhow::Result<Task> {
    Ok(Task {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        priority: row.try_get::<String, _>("priority")?.parse()?,
        assigned_to: row.try_get("assigned_to")?,
        created_by: row.try_get("created_by")?,
        stakeholder_id: row.try_get("stakeholder_id")?,
        campaign_id: row.try_get("campaign_id")?,
        due_date: row.try_get("due_date")?,
        completed_at: row.try_get("completed_at")?,
        tags: row.try_get("tags")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn insert_task<'e, E>(executor: E, task: &Task) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO stakeholder_engagement.tasks
        (id, title, description, status, priority, assigned_to, created_by, stakeholder_id,
         campaign_id, due_date, completed_at, tags, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(task.id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(task.priority.as_str())
    .bind(task.assigned_to)
    .bind(task.created_by)
    .bind(task.stakeholder_id)
    .bind(task.campaign_id)
    .bind(task.due_date)
    .bind(task.completed_at)
    .bind(&task.tags)
    .bind(task.created_at)
    .execute(executor)
    .await
    .with_context(|| format!("failed to insert task '{}'", task.title))?;
    Ok(())
}

/// Writes every mutable column of a task.
pub async fn save_task<'e, E>(executor: E, task: &Task) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE stakeholder_engagement.tasks
        SET status = $2, priority = $3, assigned_to = $4, due_date = $5, completed_at = $6,
            tags = $7, title = $8, description = $9, stakeholder_id = $10, campaign_id = $11
        WHERE id = $1
        "#,
    )
    .bind(task.id)
    .bind(task.status.as_str())
    .bind(task.priority.as_str())
    .bind(task.assigned_to)
    .bind(task.due_date)
    .bind(task.completed_at)
    .bind(&task.tags)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.stakeholder_id)
    .bind(task.campaign_id)
    .execute(executor)
    .await?;
    if result.rows_affected() == 0 {
        return Err(EngagementError::not_found("task", task.id).into());
    }
    Ok(())
}

pub async fn get_task(pool: &PgPool, id: Uuid) -> anyhow::Result<Task> {
    let row = sqlx::query(&format!(
        "SELECT {TASK_COLUMNS} FROM stakeholder_engagement.tasks WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| EngagementError::not_found("task", id))?;
    task_from_row(&row)
}

pub async fn delete_task(pool: &PgPool, id: Uuid) -> anyhow::Result<()> {
    let result = sqlx::query("DELETE FROM stakeholder_engagement.tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(EngagementError::not_found("task", id).into());
    }
    info!(task_id = %id, "task deleted");
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
    pub stakeholder_id: Option<Uuid>,
    pub limit: i64,
}

pub async fn list_tasks(pool: &PgPool, filter: &TaskFilter) -> anyhow::Result<Vec<Task>> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {TASK_COLUMNS} FROM stakeholder_engagement.tasks WHERE TRUE"
    ));
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(priority) = filter.priority {
        query.push(" AND priority = ").push_bind(priority.as_str());
    }
    if let Some(user) = filter.assigned_to {
        query.push(" AND assigned_to = ").push_bind(user);
    }
    if let Some(campaign) = filter.campaign_id {
        query.push(" AND campaign_id = ").push_bind(campaign);
    }
    if let Some(stakeholder) = filter.stakeholder_id {
        query.push(" AND stakeholder_id = ").push_bind(stakeholder);
    }
    query
        .push(" ORDER BY due_date ASC NULLS LAST, created_at ASC LIMIT ")
        .push_bind(filter.limit);
    let rows = query.build().fetch_all(pool).await?;
    rows.iter().map(task_from_row).collect()
}

pub async fn tasks_for_campaign<'e, E>(executor: E, campaign_id: Uuid) -> anyhow::Result<Vec<Task>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(&format!(
        "SELECT {TASK_COLUMNS} FROM stakeholder_engagement.tasks \
         WHERE campaign_id = $1 ORDER BY created_at, title"
    ))
    .bind(campaign_id)
    .fetch_all(executor)
    .await?;
    rows.iter().map(task_from_row).collect()
}

pub async fn assigned_tasks(pool: &PgPool) -> anyhow::Result<Vec<Task>> {
    let rows = sqlx::query(&format!(
        "SELECT {TASK_COLUMNS} FROM stakeholder_engagement.tasks WHERE assigned_to IS NOT NULL"
    ))
    .fetch_all(pool)
    .await?;
    rows.iter().map(task_from_row).collect()
}

/// Applies `change` to every listed task inside one transaction. Returns how
/// many tasks were found.
pub async fn bulk_update_tasks<F>(pool: &PgPool, ids: &[Uuid], mut change: F) -> anyhow::Result<usize>
where
    F: FnMut(&mut Task),
{
    let mut tx = pool.begin().await?;
    let rows = sqlx::query(&format!(
        "SELECT {TASK_COLUMNS} FROM stakeholder_engagement.tasks WHERE id = ANY($1) FOR UPDATE"
    ))
    .bind(ids)
    .fetch_all(&mut *tx)
    .await?;

    for row in rows.iter() {
        let mut task = task_from_row(row)?;
        change(&mut task);
        save_task(&mut *tx, &task).await?;
    }
    tx.commit().await?;
    Ok(rows.len())
}

// ---------------------------------------------------------------------------
// campaigns

fn campaign_from_row(row: &PgRow) -> anyhow::Result<Campaign> {
    Ok(Campaign {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        phase: row.try_get::<String, _>("phase")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        owner_id: row.try_get("owner_id")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        goals: row.try_get("goals")?,
        key_messages: row.try_get("key_messages")?,
        target_audience: row.try_get("target_audience")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Inserts the campaign together with its framework tasks.
pub async fn create_campaign(
    pool: &PgPool,
    campaign: &Campaign,
    tasks: &[Task],
) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO stakeholder_engagement.campaigns
        (id, name, description, phase, status, owner_id, start_date, end_date, goals,
         key_messages, target_audience, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(campaign.id)
    .bind(&campaign.name)
    .bind(&campaign.description)
    .bind(campaign.phase.as_str())
    .bind(campaign.status.as_str())
    .bind(campaign.owner_id)
    .bind(campaign.start_date)
    .bind(campaign.end_date)
    .bind(&campaign.goals)
    .bind(&campaign.key_messages)
    .bind(&campaign.target_audience)
    .bind(campaign.created_at)
    .execute(&mut *tx)
    .await
    .with_context(|| format!("failed to insert campaign {}", campaign.name))?;

    for task in tasks {
        insert_task(&mut *tx, task).await?;
    }
    tx.commit().await?;
    info!(campaign_id = %campaign.id, tasks = tasks.len(), "campaign created");
    Ok(())
}

pub async fn save_campaign<'e, E>(executor: E, campaign: &Campaign) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE stakeholder_engagement.campaigns
        SET name = $2, description = $3, phase = $4, status = $5, start_date = $6,
            end_date = $7, goals = $8, key_messages = $9, target_audience = $10
        WHERE id = $1
        "#,
    )
    .bind(campaign.id)
    .bind(&campaign.name)
    .bind(&campaign.description)
    .bind(campaign.phase.as_str())
    .bind(campaign.status.as_str())
    .bind(campaign.start_date)
    .bind(campaign.end_date)
    .bind(&campaign.goals)
    .bind(&campaign.key_messages)
    .bind(&campaign.target_audience)
    .execute(executor)
    .await?;
    if result.rows_affected() == 0 {
        return Err(EngagementError::not_found("campaign", campaign.id).into());
    }
    Ok(())
}

pub async fn get_campaign(pool: &PgPool, id: Uuid) -> anyhow::Result<Campaign> {
    let row = sqlx::query(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM stakeholder_engagement.campaigns WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| EngagementError::not_found("campaign", id))?;
    campaign_from_row(&row)
}

/// Deletes the campaign; its tasks and memberships go with it.
pub async fn delete_campaign(pool: &PgPool, id: Uuid) -> anyhow::Result<()> {
    let result = sqlx::query("DELETE FROM stakeholder_engagement.campaigns WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(EngagementError::not_found("campaign", id).into());
    }
    info!(campaign_id = %id, "campaign deleted");
    Ok(())
}

pub async fn list_campaigns(
    pool: &PgPool,
    status: Option<CampaignStatus>,
) -> anyhow::Result<Vec<Campaign>> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM stakeholder_engagement.campaigns"
    ));
    if let Some(status) = status {
        query.push(" WHERE status = ").push_bind(status.as_str());
    }
    query.push(" ORDER BY created_at DESC");
    let rows = query.build().fetch_all(pool).await?;
    rows.iter().map(campaign_from_row).collect()
}

/// Advances the phase and escalates the matching open tasks atomically.
pub async fn advance_campaign_phase(
    pool: &PgPool,
    id: Uuid,
) -> anyhow::Result<(Campaign, Vec<Uuid>)> {
    let mut tx = pool.begin().await?;
    let row = sqlx::query(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM stakeholder_engagement.campaigns WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| EngagementError::not_found("campaign", id))?;
    let mut current = campaign_from_row(&row)?;
    let mut tasks = tasks_for_campaign(&mut *tx, id).await?;

    let escalated = campaign::advance_phase(&mut current, &mut tasks);
    save_campaign(&mut *tx, &current).await?;
    for task in tasks.iter().filter(|task| escalated.contains(&task.id)) {
        save_task(&mut *tx, task).await?;
    }
    tx.commit().await?;
    info!(campaign_id = %id, phase = %current.phase, escalated = escalated.len(), "campaign phase advanced");
    Ok((current, escalated))
}

/// Returns false when the stakeholder was already a member.
pub async fn add_campaign_stakeholder(
    pool: &PgPool,
    campaign_id: Uuid,
    stakeholder_id: Uuid,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO stakeholder_engagement.campaign_stakeholders (campaign_id, stakeholder_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(campaign_id)
    .bind(stakeholder_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn remove_campaign_stakeholder(
    pool: &PgPool,
    campaign_id: Uuid,
    stakeholder_id: Uuid,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "DELETE FROM stakeholder_engagement.campaign_stakeholders \
         WHERE campaign_id = $1 AND stakeholder_id = $2",
    )
    .bind(campaign_id)
    .bind(stakeholder_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn campaign_member_ids(pool: &PgPool, campaign_id: Uuid) -> anyhow::Result<HashSet<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT stakeholder_id FROM stakeholder_engagement.campaign_stakeholders WHERE campaign_id = $1",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    Ok(ids.into_iter().collect())
}

pub async fn campaign_members(pool: &PgPool, campaign_id: Uuid) -> anyhow::Result<Vec<Stakeholder>> {
    let rows = sqlx::query(&format!(
        "SELECT {STAKEHOLDER_COLUMNS} FROM stakeholder_engagement.stakeholders \
         WHERE id IN (SELECT stakeholder_id FROM stakeholder_engagement.campaign_stakeholders \
                      WHERE campaign_id = $1) \
         ORDER BY name"
    ))
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(stakeholder_from_row).collect()
}

// ---------------------------------------------------------------------------
// relationships

pub async fn insert_relationship(pool: &PgPool, relationship: &Relationship) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO stakeholder_engagement.relationships
        (id, stakeholder_id, related_stakeholder_id, relationship_type, strength, notes, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(relationship.id)
    .bind(relationship.stakeholder_id)
    .bind(relationship.related_stakeholder_id)
    .bind(relationship.relationship_type.as_str())
    .bind(relationship.strength)
    .bind(&relationship.notes)
    .bind(relationship.is_active)
    .execute(pool)
    .await
    .context("failed to insert relationship")?;
    Ok(())
}

fn relationship_from_row(row: &PgRow) -> anyhow::Result<Relationship> {
    Ok(Relationship {
        id: row.try_get("id")?,
        stakeholder_id: row.try_get("stakeholder_id")?,
        related_stakeholder_id: row.try_get("related_stakeholder_id")?,
        stakeholder_name: row.try_get("stakeholder_name")?,
        related_name: row.try_get("related_name")?,
        relationship_type: row.try_get::<String, _>("relationship_type")?.parse()?,
        strength: row.try_get("strength")?,
        notes: row.try_get("notes")?,
        is_active: row.try_get("is_active")?,
    })
}

pub async fn get_relationship(pool: &PgPool, id: Uuid) -> anyhow::Result<Relationship> {
    let row = sqlx::query(&format!("{RELATIONSHIP_SELECT} WHERE r.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| EngagementError::not_found("relationship", id))?;
    relationship_from_row(&row)
}

/// Every relationship the stakeholder is on either end of, each seen from
/// the stakeholder's side. Strongest first.
pub async fn relationships_for(
    pool: &PgPool,
    stakeholder_id: Uuid,
) -> anyhow::Result<Vec<RelationshipLink>> {
    let rows = sqlx::query(&format!(
        "{RELATIONSHIP_SELECT} \
         WHERE r.stakeholder_id = $1 OR r.related_stakeholder_id = $1 \
         ORDER BY r.strength DESC, \
                  CASE WHEN r.stakeholder_id = $1 THEN b.name ELSE a.name END"
    ))
    .bind(stakeholder_id)
    .fetch_all(pool)
    .await?;

    let mut links = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        if let Some(link) = relationship_from_row(row)?.link_for(stakeholder_id) {
            links.push(link);
        }
    }
    Ok(links)
}

pub async fn update_relationship(pool: &PgPool, relationship: &Relationship) -> anyhow::Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE stakeholder_engagement.relationships
        SET relationship_type = $2, strength = $3, notes = $4, is_active = $5
        WHERE id = $1
        "#,
    )
    .bind(relationship.id)
    .bind(relationship.relationship_type.as_str())
    .bind(relationship.strength)
    .bind(&relationship.notes)
    .bind(relationship.is_active)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(EngagementError::not_found("relationship", relationship.id).into());
    }
    Ok(())
}

pub async fn delete_relationship(pool: &PgPool, id: Uuid) -> anyhow::Result<()> {
    let result = sqlx::query("DELETE FROM stakeholder_engagement.relationships WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(EngagementError::not_found("relationship", id).into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// seed data

pub async fn seed(pool: &PgPool, user_id: Uuid, now: DateTime<Utc>) -> anyhow::Result<()> {
    let stakeholders = vec![
        ("Councillor Aiko Tanaka", "City Council", "aiko.tanaka@harborcity.gov", 8.5, 6.0, "government"),
        ("Marcus Bell", "Dockworkers Union Local 12", "m.bell@dwu12.org", 7.5, -6.0, "labor"),
        ("Priya Raman", "Harbor Residents Association", "priya@harborresidents.org", 3.0, 7.0, "community"),
        ("Tomasz Nowak", "Port Logistics Group", "tnowak@portlogistics.com", 6.0, 2.5, "industry"),
        ("Elena Vargas", "Coastal Herald", "evargas@coastalherald.com", 4.0, -1.0, "media"),
    ];

    let mut ids = HashMap::new();
    for (name, organization, email, influence, interest, tag) in stakeholders {
        if let Some(existing) = find_stakeholder_id_by_email(pool, email).await? {
            ids.insert(email, existing);
            continue;
        }
        let mut stakeholder = Stakeholder::new(name, StakeholderScores::with_scores(influence, interest), now);
        stakeholder.organization = Some(organization.to_string());
        stakeholder.email = Some(email.to_string());
        stakeholder.add_tag(tag);
        insert_stakeholder(pool, &stakeholder).await?;
        ids.insert(email, stakeholder.id);
    }

    let interactions = vec![
        ("seed-001", "aiko.tanaka@harborcity.gov", "meeting", InteractionSentiment::Positive, 0.5, 3, "Zoning briefing"),
        ("seed-002", "aiko.tanaka@harborcity.gov", "email", InteractionSentiment::Neutral, 0.0, 12, "Follow-up materials"),
        ("seed-003", "priya@harborresidents.org", "event", InteractionSentiment::Positive, 1.0, 6, "Town hall"),
        ("seed-004", "tnowak@portlogistics.com", "phone_call", InteractionSentiment::Negative, -0.5, 20, "Scheduling dispute"),
        ("seed-005", "evargas@coastalherald.com", "video_call", InteractionSentiment::Neutral, 0.0, 75, "Background interview"),
    ];

    for (source_key, email, kind, sentiment, impact, days_ago, subject) in interactions {
        let Some(stakeholder_id) = ids.get(email).copied() else {
            continue;
        };
        let interaction = Interaction {
            id: Uuid::new_v4(),
            stakeholder_id,
            user_id,
            subject: Some(subject.to_string()),
            description: None,
            outcome: None,
            duration_minutes: None,
            follow_up_date: None,
            tags: Vec::new(),
            attachments: Vec::new(),
            record: InteractionRecord {
                sentiment,
                interaction_type: kind.to_string(),
                impact_on_relationship: Some(impact),
                date: now - Duration::days(days_ago),
                follow_up_required: kind == "meeting",
                follow_up_completed: false,
            },
            created_at: now,
        };
        insert_interaction(pool, &interaction, Some(source_key)).await?;
    }

    info!(stakeholders = ids.len(), "seed data inserted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_skips_whole_pages() {
        assert_eq!(offset(1, 50).unwrap(), 0);
        assert_eq!(offset(0, 50).unwrap(), 0);
        assert_eq!(offset(-4, 50).unwrap(), 0);
        assert_eq!(offset(3, 25).unwrap(), 50);
    }

    #[test]
    fn offset_rejects_pages_that_would_overflow() {
        let err = offset(i64::MAX, 50).unwrap_err();
        assert_eq!(
            err,
            EngagementError::invalid(format!("page {} is out of range", i64::MAX))
        );
    }

    #[test]
    fn page_count_rounds_up() {
        let page = Page::new(vec![1, 2, 3], 101, 2, 50);
        assert_eq!(page.pages, 3);
        assert_eq!(page.current_page, 2);
        assert_eq!(Page::<i32>::new(Vec::new(), 0, 1, 50).pages, 0);
    }
}
