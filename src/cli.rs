use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{ArgGroup, Args, Parser, Subcommand};
use uuid::Uuid;

use crate::models::{
    AttachmentRef, CampaignStatus, InteractionSentiment, RelationshipStatus, RelationshipType,
    Role, TaskPriority, TaskStatus,
};
use crate::scoring::MAX_WINDOW_DAYS;

#[derive(Parser)]
#[command(name = "stakeholder-engagement")]
#[command(about = "Stakeholder relationship tracker with engagement scoring", long_about = None)]
pub struct Cli {
    /// Bearer token issued by `user login`
    #[arg(long, env = "SRM_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Evaluate time windows as of this RFC 3339 timestamp instead of now
    #[arg(long, global = true)]
    pub as_of: Option<DateTime<Utc>>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Register users and obtain tokens
    #[command(subcommand)]
    User(UserCommand),
    /// Manage stakeholder profiles
    #[command(subcommand)]
    Stakeholder(StakeholderCommand),
    /// Log and browse interactions
    #[command(subcommand)]
    Interaction(InteractionCommand),
    /// Team task tracking
    #[command(subcommand)]
    Task(TaskCommand),
    /// Engagement campaigns
    #[command(subcommand)]
    Campaign(CampaignCommand),
    /// Connections between stakeholders
    #[command(subcommand)]
    Relationship(RelationshipCommand),
    /// Engagement and relationship-health scoring
    #[command(subcommand)]
    Score(ScoreCommand),
    /// Portfolio-wide analytics
    #[command(subcommand)]
    Analytics(AnalyticsCommand),
    /// Generate a markdown report
    Report {
        /// Only cover stakeholders carrying this tag
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(i64).range(0..=MAX_WINDOW_DAYS))]
        since_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Register a user (the first user becomes an admin)
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        role: Option<Role>,
        #[arg(long, env = "SRM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Exchange credentials for a token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SRM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// List registered users
    List,
    /// Show who the current token belongs to
    Whoami,
    /// Change the caller's first or last name
    #[command(group(
        ArgGroup::new("profile")
            .args(["first_name", "last_name"])
            .required(true)
            .multiple(true)
    ))]
    Update {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Change the caller's password
    ChangePassword {
        #[arg(long, env = "SRM_PASSWORD", hide_env_values = true)]
        current_password: String,
        #[arg(long, env = "SRM_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
}

#[derive(Args)]
pub struct StakeholderFields {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub organization: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long = "type")]
    pub stakeholder_type: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub linkedin_url: Option<String>,
    #[arg(long)]
    pub twitter_handle: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
}

#[derive(Subcommand)]
pub enum StakeholderCommand {
    /// Create a stakeholder; the relationship status is derived from the scores
    Add {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        fields: StakeholderFields,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        influence: f64,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        interest: f64,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Show a stakeholder with its most recent interactions
    Show { id: Uuid },
    /// List stakeholders
    List {
        /// Match against name or organization
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        status: Option<RelationshipStatus>,
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..))]
        page: i64,
        #[arg(long)]
        per_page: Option<i64>,
    },
    /// Update profile fields or scores
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: StakeholderFields,
        #[arg(long, allow_hyphen_values = true)]
        influence: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        interest: Option<f64>,
        /// Override the derived relationship status
        #[arg(long)]
        status: Option<RelationshipStatus>,
    },
    /// Delete a stakeholder and its interactions
    Delete { id: Uuid },
    /// Add or remove tags on several stakeholders at once
    #[command(group(
        ArgGroup::new("change")
            .args(["add", "remove"])
            .required(true)
            .multiple(true)
    ))]
    Tag {
        #[arg(long = "id", required = true)]
        ids: Vec<Uuid>,
        #[arg(long)]
        add: Vec<String>,
        #[arg(long)]
        remove: Vec<String>,
    },
    /// Interaction history for one stakeholder
    History {
        id: Uuid,
        #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(i64).range(0..=MAX_WINDOW_DAYS))]
        days: i64,
    },
}

#[derive(Subcommand)]
pub enum InteractionCommand {
    /// Log an interaction with a stakeholder
    Log {
        #[arg(long)]
        stakeholder: Uuid,
        /// meeting, phone_call, email, video_call, social_media, note, event, other
        #[arg(long = "type")]
        interaction_type: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        outcome: Option<String>,
        #[arg(long, default_value = "neutral")]
        sentiment: InteractionSentiment,
        #[arg(long, allow_hyphen_values = true)]
        impact: Option<f64>,
        /// When it happened (defaults to now)
        #[arg(long)]
        date: Option<DateTime<Utc>>,
        #[arg(long)]
        duration_minutes: Option<i32>,
        #[arg(long)]
        follow_up: bool,
        #[arg(long)]
        follow_up_date: Option<DateTime<Utc>>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// File reference as name=url; repeatable
        #[arg(long = "attach")]
        attachments: Vec<AttachmentRef>,
    },
    /// Show one interaction in full
    Show { id: Uuid },
    /// Change fields of a logged interaction
    Update {
        id: Uuid,
        #[arg(long = "type")]
        interaction_type: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        outcome: Option<String>,
        #[arg(long)]
        sentiment: Option<InteractionSentiment>,
        #[arg(long, allow_hyphen_values = true)]
        impact: Option<f64>,
        #[arg(long)]
        date: Option<DateTime<Utc>>,
        #[arg(long)]
        duration_minutes: Option<i32>,
        #[arg(long = "follow-up")]
        follow_up_required: Option<bool>,
        #[arg(long)]
        follow_up_date: Option<DateTime<Utc>>,
        #[arg(long)]
        follow_up_completed: Option<bool>,
        /// Replaces the existing tags
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Adds a file reference as name=url; repeatable
        #[arg(long = "attach")]
        attachments: Vec<AttachmentRef>,
    },
    /// List interactions, newest first
    List {
        #[arg(long)]
        stakeholder: Option<Uuid>,
        #[arg(long = "type")]
        interaction_type: Option<String>,
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..))]
        page: i64,
        #[arg(long)]
        per_page: Option<i64>,
    },
    /// Mark the follow-up of an interaction as done
    CompleteFollowUp { id: Uuid },
    /// Delete an interaction
    Delete { id: Uuid },
    /// Import interactions from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Recent team activity
    Feed {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Create a task
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "medium")]
        priority: TaskPriority,
        #[arg(long)]
        assign: Option<Uuid>,
        #[arg(long)]
        stakeholder: Option<Uuid>,
        #[arg(long)]
        campaign: Option<Uuid>,
        #[arg(long)]
        due: Option<DateTime<Utc>>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List tasks
    List {
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        priority: Option<TaskPriority>,
        #[arg(long, conflicts_with = "mine")]
        assignee: Option<Uuid>,
        /// Only tasks assigned to the caller
        #[arg(long)]
        mine: bool,
        #[arg(long)]
        campaign: Option<Uuid>,
        #[arg(long)]
        stakeholder: Option<Uuid>,
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
    /// Show one task
    Show { id: Uuid },
    /// Change fields of a task
    Update {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        priority: Option<TaskPriority>,
        #[arg(long)]
        assign: Option<Uuid>,
        #[arg(long)]
        stakeholder: Option<Uuid>,
        #[arg(long)]
        campaign: Option<Uuid>,
        #[arg(long)]
        due: Option<DateTime<Utc>>,
        /// Replaces the existing tags
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Delete a task
    Delete { id: Uuid },
    /// Complete one or more tasks
    Complete {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Cancel a task
    Cancel { id: Uuid },
    /// Reopen a completed or cancelled task
    Reopen { id: Uuid },
    /// Assign one or more tasks to a user
    Assign {
        #[arg(long)]
        user: Uuid,
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Overdue, today, this week and recently completed tasks for the caller
    Dashboard,
    /// Open and overdue task counts per active user
    Workload,
}

#[derive(Subcommand)]
pub enum CampaignCommand {
    /// Create a campaign with the 12 framework tasks
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "goal")]
        goals: Vec<String>,
        #[arg(long = "message")]
        key_messages: Vec<String>,
        #[arg(long)]
        audience: Option<String>,
    },
    /// Show a campaign with its members and progress
    Show { id: Uuid },
    /// List campaigns
    List {
        #[arg(long)]
        status: Option<CampaignStatus>,
    },
    /// Change campaign details or status
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<CampaignStatus>,
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        /// Replaces the existing goals
        #[arg(long = "goal")]
        goals: Vec<String>,
        /// Replaces the existing key messages
        #[arg(long = "message")]
        key_messages: Vec<String>,
        #[arg(long)]
        audience: Option<String>,
    },
    /// Delete a campaign with its tasks
    Delete { id: Uuid },
    /// Mark a campaign active
    Activate { id: Uuid },
    /// Pause a campaign
    Pause { id: Uuid },
    /// Mark a campaign completed
    Complete { id: Uuid },
    /// Move to the next framework phase
    Advance { id: Uuid },
    /// Task completion progress
    Progress { id: Uuid },
    /// Add a stakeholder to the campaign
    AddStakeholder {
        id: Uuid,
        #[arg(long)]
        stakeholder: Uuid,
    },
    /// Remove a stakeholder from the campaign
    RemoveStakeholder {
        id: Uuid,
        #[arg(long)]
        stakeholder: Uuid,
    },
    /// Suggest stakeholders to add
    Recommend {
        id: Uuid,
        #[arg(long, default_value_t = crate::campaign::DEFAULT_MIN_INFLUENCE, allow_hyphen_values = true)]
        min_influence: f64,
        #[arg(long, default_value_t = crate::campaign::DEFAULT_MIN_INTEREST, allow_hyphen_values = true)]
        min_interest: f64,
    },
    /// Interactions with the campaign's stakeholders
    Activity {
        id: Uuid,
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum RelationshipCommand {
    /// Record a connection between two stakeholders
    Add {
        #[arg(long)]
        stakeholder: Uuid,
        #[arg(long)]
        related: Uuid,
        #[arg(long = "type")]
        relationship_type: RelationshipType,
        #[arg(long)]
        strength: Option<f64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Connections of one stakeholder, in either direction
    List { stakeholder: Uuid },
    /// Show one connection
    Show { id: Uuid },
    /// Change type, strength, notes or activity of a connection
    Update {
        id: Uuid,
        #[arg(long = "type")]
        relationship_type: Option<RelationshipType>,
        #[arg(long)]
        strength: Option<f64>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Delete a connection
    Delete { id: Uuid },
}

#[derive(Subcommand)]
pub enum ScoreCommand {
    /// 30-day engagement score for a stakeholder
    Engagement { stakeholder: Uuid },
    /// Recompute interest and status from the last 90 days of interactions
    #[command(group(
        ArgGroup::new("scope")
            .args(["stakeholder", "all"])
            .required(true)
            .multiple(false)
    ))]
    Health {
        #[arg(long)]
        stakeholder: Option<Uuid>,
        #[arg(long)]
        all: bool,
    },
    /// High-influence stakeholders without recent contact
    Priority {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum AnalyticsCommand {
    /// Influence/interest map grouped by relationship status
    Map,
    /// Interaction counts by type and sentiment
    Trends {
        #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(i64).range(0..=MAX_WINDOW_DAYS))]
        days: i64,
    },
    /// Portfolio relationship health
    Health,
    /// Campaign status and phase counts
    Campaigns,
    /// Stakeholders two users have both engaged
    Shared {
        #[arg(long)]
        first: Uuid,
        #[arg(long)]
        second: Uuid,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_negative_scores_and_labels() {
        let cli = Cli::try_parse_from([
            "stakeholder-engagement",
            "stakeholder",
            "add",
            "--name",
            "Marcus Bell",
            "--influence",
            "7.5",
            "--interest",
            "-6",
            "--tag",
            "labor",
        ])
        .unwrap();
        match cli.command {
            Commands::Stakeholder(StakeholderCommand::Add {
                name,
                influence,
                interest,
                tags,
                ..
            }) => {
                assert_eq!(name, "Marcus Bell");
                assert_eq!(influence, 7.5);
                assert_eq!(interest, -6.0);
                assert_eq!(tags, vec!["labor".to_string()]);
            }
            _ => panic!("expected stakeholder add"),
        }

        let cli = Cli::try_parse_from([
            "stakeholder-engagement",
            "stakeholder",
            "list",
            "--status",
            "Strategic Partner",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Stakeholder(StakeholderCommand::List {
                status: Some(RelationshipStatus::StrategicPartner),
                ..
            })
        ));
    }

    #[test]
    fn health_requires_exactly_one_scope() {
        assert!(Cli::try_parse_from(["stakeholder-engagement", "score", "health"]).is_err());
        assert!(Cli::try_parse_from(["stakeholder-engagement", "score", "health", "--all"]).is_ok());
    }

    #[test]
    fn out_of_range_pages_and_windows_are_rejected() {
        for args in [
            &["stakeholder-engagement", "stakeholder", "list", "--page", "0"][..],
            &["stakeholder-engagement", "interaction", "list", "--page", "-3"][..],
            &["stakeholder-engagement", "analytics", "trends", "--days", "1000000000"][..],
            &["stakeholder-engagement", "report", "--since-days", "-1"][..],
            &[
                "stakeholder-engagement",
                "stakeholder",
                "history",
                "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2",
                "--days",
                "36501",
            ][..],
        ] {
            assert!(Cli::try_parse_from(args).is_err(), "{args:?} should be rejected");
        }
        assert!(Cli::try_parse_from(["stakeholder-engagement", "analytics", "trends", "--days", "36500"]).is_ok());
    }

    #[test]
    fn interaction_update_takes_attachments_and_optional_flags() {
        let cli = Cli::try_parse_from([
            "stakeholder-engagement",
            "interaction",
            "update",
            "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2",
            "--follow-up-completed",
            "true",
            "--attach",
            "minutes.pdf=https://files.example.org/minutes.pdf",
        ])
        .unwrap();
        match cli.command {
            Commands::Interaction(InteractionCommand::Update {
                follow_up_completed,
                attachments,
                sentiment,
                ..
            }) => {
                assert_eq!(follow_up_completed, Some(true));
                assert_eq!(attachments.len(), 1);
                assert_eq!(attachments[0].filename, "minutes.pdf");
                assert!(sentiment.is_none());
            }
            _ => panic!("expected interaction update"),
        }

        assert!(Cli::try_parse_from([
            "stakeholder-engagement",
            "interaction",
            "update",
            "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2",
            "--attach",
            "no-url-here",
        ])
        .is_err());
    }

    #[test]
    fn profile_update_needs_a_field() {
        assert!(Cli::try_parse_from(["stakeholder-engagement", "user", "update"]).is_err());
        assert!(Cli::try_parse_from(["stakeholder-engagement", "user", "update", "--last-name", "Reyes"]).is_ok());
    }

    #[test]
    fn rejects_unknown_sentiment() {
        let result = Cli::try_parse_from([
            "stakeholder-engagement",
            "interaction",
            "log",
            "--stakeholder",
            "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2",
            "--type",
            "meeting",
            "--sentiment",
            "ecstatic",
        ]);
        assert!(result.is_err());
    }
}
