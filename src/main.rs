use std::collections::HashSet;

use anyhow::Context as _;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod analytics;
mod auth;
mod campaign;
mod cli;
mod commands;
mod config;
mod db;
mod error;
mod models;
mod report;
mod scoring;
mod tasks;

use auth::Permission;
use cli::{Cli, Commands};
use commands::Context;
use config::Settings;
use scoring::{Clock, FixedClock, SystemClock, ENGAGEMENT_WINDOW_DAYS, PRIORITY_WINDOW_DAYS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    let filter = EnvFilter::try_new(&settings.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let now = match cli.as_of {
        Some(instant) => FixedClock(instant).now(),
        None => SystemClock.now(),
    };
    debug!(%now, "evaluation time");

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let ctx = Context::new(pool, settings, now, cli.json, cli.token);

    match cli.command {
        Commands::InitDb => {
            db::init_db(&ctx.pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let identity = ctx.authorize(&[Permission::Create])?;
            db::seed(&ctx.pool, identity.user_id, ctx.now).await?;
            println!("Seed data inserted.");
        }
        Commands::User(command) => commands::user::execute(command, &ctx).await?,
        Commands::Stakeholder(command) => commands::stakeholder::execute(command, &ctx).await?,
        Commands::Interaction(command) => commands::interaction::execute(command, &ctx).await?,
        Commands::Task(command) => commands::task::execute(command, &ctx).await?,
        Commands::Campaign(command) => commands::campaign::execute(command, &ctx).await?,
        Commands::Relationship(command) => {
            commands::relationship::execute(command, &ctx).await?
        }
        Commands::Score(command) => commands::score::execute(command, &ctx).await?,
        Commands::Analytics(command) => commands::analytics::execute(command, &ctx).await?,
        Commands::Report {
            tag,
            since_days,
            out,
        } => {
            ctx.authorize(&[Permission::Read])?;
            let horizon = since_days.max(ENGAGEMENT_WINDOW_DAYS).max(PRIORITY_WINDOW_DAYS);
            let mut stakeholders = db::all_stakeholders(&ctx.pool).await?;
            let since = scoring::window_start(ctx.now, horizon)?;
            let mut interactions = db::interactions_since(&ctx.pool, since, ctx.now).await?;
            if let Some(tag) = tag.as_deref() {
                stakeholders.retain(|s| s.tags.iter().any(|t| t == tag));
                let ids: HashSet<Uuid> = stakeholders.iter().map(|s| s.id).collect();
                interactions.retain(|i| ids.contains(&i.stakeholder_id));
            }
            let report =
                report::build_report(tag.as_deref(), since_days, ctx.now, &stakeholders, &interactions)?;
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
