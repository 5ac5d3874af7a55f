use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::error::EngagementError;
use crate::scoring;

/// Declares a closed set of text labels stored as TEXT columns and accepted
/// on the command line.
macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = EngagementError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let trimmed = value.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| {
                        EngagementError::invalid(format!("unknown {}: '{}'", $kind, value))
                    })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

labelled_enum!(
    /// Relationship status derived from influence and interest.
    RelationshipStatus, "relationship status", {
        StrategicPartner => "Strategic Partner",
        HighValueRelationship => "High Value Relationship",
        Collaborate => "Collaborate",
        Protect => "Protect",
        ProactivelyDefend => "Proactively Defend",
        Defend => "Defend",
        Commit => "Commit",
        Connect => "Connect",
        Monitor => "Monitor",
    }
);

impl RelationshipStatus {
    /// Snake-case key used to group stakeholders on the influence/interest map.
    pub fn key(&self) -> String {
        self.as_str().to_lowercase().replace(' ', "_")
    }
}

labelled_enum!(InteractionSentiment, "interaction sentiment", {
    Positive => "positive",
    Neutral => "neutral",
    Negative => "negative",
});

impl Default for InteractionSentiment {
    fn default() -> Self {
        InteractionSentiment::Neutral
    }
}

labelled_enum!(TaskStatus, "task status", {
    Open => "open",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl TaskStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Open | TaskStatus::InProgress)
    }
}

labelled_enum!(TaskPriority, "task priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

impl TaskPriority {
    pub fn rank(&self) -> u8 {
        match self {
            TaskPriority::Low => 0,
            TaskPriority::Medium => 1,
            TaskPriority::High => 2,
            TaskPriority::Urgent => 3,
        }
    }
}

labelled_enum!(CampaignPhase, "campaign phase", {
    Purpose => "purpose",
    Plan => "plan",
    Execute => "execute",
});

impl CampaignPhase {
    pub fn next(&self) -> Option<CampaignPhase> {
        match self {
            CampaignPhase::Purpose => Some(CampaignPhase::Plan),
            CampaignPhase::Plan => Some(CampaignPhase::Execute),
            CampaignPhase::Execute => None,
        }
    }
}

labelled_enum!(CampaignStatus, "campaign status", {
    Planning => "planning",
    Active => "active",
    Paused => "paused",
    Completed => "completed",
    Cancelled => "cancelled",
});

labelled_enum!(RelationshipType, "relationship type", {
    Colleague => "colleague",
    Supervisor => "supervisor",
    Subordinate => "subordinate",
    Ally => "ally",
    Competitor => "competitor",
    Partner => "partner",
    Influencer => "influencer",
    Advisor => "advisor",
    Family => "family",
    Friend => "friend",
    Neutral => "neutral",
    Opponent => "opponent",
    Other => "other",
});

labelled_enum!(
    /// Which end of a stored relationship the viewing stakeholder sits on.
    LinkDirection, "link direction", {
        Outgoing => "outgoing",
        Incoming => "incoming",
    }
);

/// Interaction types the logging workflow knows about. The column itself is
/// free-form; this list only feeds help text and warnings.
pub const KNOWN_INTERACTION_TYPES: &[&str] = &[
    "meeting",
    "phone_call",
    "email",
    "video_call",
    "social_media",
    "note",
    "event",
    "other",
];

/// Trims and lowercases an interaction type so "Email" and "email" count as
/// one type.
pub fn normalize_interaction_type(raw: &str) -> Result<String, EngagementError> {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(EngagementError::invalid("interaction type must not be empty"));
    }
    Ok(normalized)
}

pub const SCORE_MIN: f64 = -10.0;
pub const SCORE_MAX: f64 = 10.0;

pub fn clamp_score(value: f64) -> f64 {
    value.clamp(SCORE_MIN, SCORE_MAX)
}

/// Influence, interest and the status label derived from them.
///
/// Build through [`StakeholderScores::with_scores`] or update through
/// [`StakeholderScores::set_scores`]; both clamp and re-derive the label, so a
/// score change can never leave a stale status behind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StakeholderScores {
    pub influence_score: f64,
    pub interest_score: f64,
    pub sentiment: RelationshipStatus,
}

impl StakeholderScores {
    pub fn with_scores(influence: f64, interest: f64) -> Self {
        let influence_score = clamp_score(influence);
        let interest_score = clamp_score(interest);
        Self {
            influence_score,
            interest_score,
            sentiment: scoring::classify(influence_score, interest_score),
        }
    }

    /// Applies whichever scores are given and re-derives the label when
    /// either one was supplied.
    pub fn set_scores(&mut self, influence: Option<f64>, interest: Option<f64>) {
        if influence.is_none() && interest.is_none() {
            return;
        }
        *self = Self::with_scores(
            influence.unwrap_or(self.influence_score),
            interest.unwrap_or(self.interest_score),
        );
    }

    pub fn with_override(mut self, status: RelationshipStatus) -> Self {
        self.sentiment = status;
        self
    }
}

impl Default for StakeholderScores {
    fn default() -> Self {
        Self::with_scores(0.0, 0.0)
    }
}

/// The slice of an interaction the scoring engine reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionRecord {
    pub sentiment: InteractionSentiment,
    pub interaction_type: String,
    pub impact_on_relationship: Option<f64>,
    pub date: DateTime<Utc>,
    pub follow_up_required: bool,
    pub follow_up_completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stakeholder {
    pub id: Uuid,
    pub name: String,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub stakeholder_type: Option<String>,
    pub priority: String,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub linkedin_url: Option<String>,
    pub twitter_handle: Option<String>,
    pub address: Option<String>,
    #[serde(flatten)]
    pub scores: StakeholderScores,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stakeholder {
    pub fn new(name: impl Into<String>, scores: StakeholderScores, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            title: None,
            organization: None,
            email: None,
            phone: None,
            stakeholder_type: None,
            priority: "Medium".to_string(),
            tags: Vec::new(),
            notes: None,
            linkedin_url: None,
            twitter_handle: None,
            address: None,
            scores,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true when the tag was not already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        add_unique_tag(&mut self.tags, tag)
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|existing| existing != tag);
        before != self.tags.len()
    }
}

pub(crate) fn add_unique_tag(tags: &mut Vec<String>, tag: &str) -> bool {
    if tags.iter().any(|existing| existing == tag) {
        return false;
    }
    tags.push(tag.to_string());
    true
}

/// A file reference stored with an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// `filename=url` as given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRef {
    pub filename: String,
    pub url: String,
}

impl FromStr for AttachmentRef {
    type Err = EngagementError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (filename, url) = value
            .split_once('=')
            .map(|(filename, url)| (filename.trim(), url.trim()))
            .filter(|(filename, url)| !filename.is_empty() && !url.is_empty())
            .ok_or_else(|| {
                EngagementError::invalid(format!("attachment must look like name=url, got '{value}'"))
            })?;
        Ok(Self {
            filename: filename.to_string(),
            url: url.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Interaction {
    pub id: Uuid,
    pub stakeholder_id: Uuid,
    pub user_id: Uuid,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub outcome: Option<String>,
    pub duration_minutes: Option<i32>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub attachments: Vec<Attachment>,
    #[serde(flatten)]
    pub record: InteractionRecord,
    pub created_at: DateTime<Utc>,
}

/// Field changes for an existing interaction; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct InteractionUpdate {
    pub interaction_type: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub outcome: Option<String>,
    pub sentiment: Option<InteractionSentiment>,
    pub impact_on_relationship: Option<f64>,
    pub date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub follow_up_required: Option<bool>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub follow_up_completed: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub attachments: Vec<AttachmentRef>,
}

impl Interaction {
    pub fn add_attachment(&mut self, reference: AttachmentRef, now: DateTime<Utc>) {
        self.attachments.push(Attachment {
            filename: reference.filename,
            url: reference.url,
            uploaded_at: now,
        });
    }

    /// Applies `update` in full or not at all.
    pub fn apply_update(
        &mut self,
        update: InteractionUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), EngagementError> {
        let interaction_type = update
            .interaction_type
            .as_deref()
            .map(normalize_interaction_type)
            .transpose()?;
        if update.duration_minutes.is_some_and(|minutes| minutes < 0) {
            return Err(EngagementError::invalid("duration must not be negative"));
        }

        if let Some(interaction_type) = interaction_type {
            self.record.interaction_type = interaction_type;
        }
        if update.subject.is_some() {
            self.subject = update.subject;
        }
        if update.description.is_some() {
            self.description = update.description;
        }
        if update.outcome.is_some() {
            self.outcome = update.outcome;
        }
        if let Some(sentiment) = update.sentiment {
            self.record.sentiment = sentiment;
        }
        if update.impact_on_relationship.is_some() {
            self.record.impact_on_relationship = update.impact_on_relationship;
        }
        if let Some(date) = update.date {
            self.record.date = date;
        }
        if update.duration_minutes.is_some() {
            self.duration_minutes = update.duration_minutes;
        }
        if let Some(required) = update.follow_up_required {
            self.record.follow_up_required = required;
        }
        if update.follow_up_date.is_some() {
            self.follow_up_date = update.follow_up_date;
            self.record.follow_up_required = true;
        }
        if let Some(completed) = update.follow_up_completed {
            self.record.follow_up_completed = completed;
        }
        if let Some(tags) = update.tags {
            self.tags.clear();
            for tag in &tags {
                add_unique_tag(&mut self.tags, tag);
            }
        }
        for reference in update.attachments {
            self.add_attachment(reference, now);
        }
        Ok(())
    }
}

/// An interaction joined with the names needed to display it.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionSummary {
    pub interaction_id: Uuid,
    pub stakeholder_id: Uuid,
    pub stakeholder_name: String,
    pub user_name: String,
    pub interaction_type: String,
    pub subject: Option<String>,
    pub sentiment: InteractionSentiment,
    pub follow_up_required: bool,
    pub date: DateTime<Utc>,
}

labelled_enum!(Role, "role", {
    Admin => "admin",
    Manager => "manager",
    Member => "member",
    Viewer => "viewer",
});

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Replaces whichever name parts are given. Blank names are rejected.
    pub fn update_profile(
        &mut self,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<(), EngagementError> {
        let first = first_name.map(|name| required_text("first name", name)).transpose()?;
        let last = last_name.map(|name| required_text("last name", name)).transpose()?;
        if let Some(first) = first {
            self.first_name = first;
        }
        if let Some(last) = last {
            self.last_name = last;
        }
        Ok(())
    }
}

fn required_text(field: &str, value: &str) -> Result<String, EngagementError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngagementError::invalid(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
    pub stakeholder_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        title: impl Into<String>,
        created_by: Uuid,
        priority: TaskPriority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            status: TaskStatus::Open,
            priority,
            assigned_to: None,
            created_by,
            stakeholder_id: None,
            campaign_id: None,
            due_date: None,
            completed_at: None,
            tags: Vec::new(),
            created_at: now,
        }
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        add_unique_tag(&mut self.tags, tag)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub phase: CampaignPhase,
    pub status: CampaignStatus,
    pub owner_id: Uuid,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub goals: Vec<String>,
    pub key_messages: Vec<String>,
    pub target_audience: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(name: impl Into<String>, owner_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            phase: CampaignPhase::Purpose,
            status: CampaignStatus::Planning,
            owner_id,
            start_date: None,
            end_date: None,
            goals: Vec::new(),
            key_messages: Vec::new(),
            target_audience: None,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Relationship {
    pub id: Uuid,
    pub stakeholder_id: Uuid,
    pub related_stakeholder_id: Uuid,
    pub stakeholder_name: Option<String>,
    pub related_name: Option<String>,
    pub relationship_type: RelationshipType,
    pub strength: f64,
    pub notes: Option<String>,
    pub is_active: bool,
}

pub const STRENGTH_MIN: f64 = 0.0;
pub const STRENGTH_MAX: f64 = 10.0;
pub const DEFAULT_STRENGTH: f64 = 5.0;

impl Relationship {
    pub fn new(
        stakeholder_id: Uuid,
        related_stakeholder_id: Uuid,
        relationship_type: RelationshipType,
        strength: Option<f64>,
    ) -> Result<Self, EngagementError> {
        if stakeholder_id == related_stakeholder_id {
            return Err(EngagementError::invalid(
                "a stakeholder cannot have a relationship with itself",
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            stakeholder_id,
            related_stakeholder_id,
            stakeholder_name: None,
            related_name: None,
            relationship_type,
            strength: strength
                .unwrap_or(DEFAULT_STRENGTH)
                .clamp(STRENGTH_MIN, STRENGTH_MAX),
            notes: None,
            is_active: true,
        })
    }

    /// Views the relationship from `viewer`'s side, whichever column it was
    /// stored in. `None` when `viewer` is on neither end.
    pub fn link_for(self, viewer: Uuid) -> Option<RelationshipLink> {
        let (direction, other_stakeholder_id, other_name) = if self.stakeholder_id == viewer {
            (LinkDirection::Outgoing, self.related_stakeholder_id, self.related_name.clone())
        } else if self.related_stakeholder_id == viewer {
            (LinkDirection::Incoming, self.stakeholder_id, self.stakeholder_name.clone())
        } else {
            return None;
        };
        Some(RelationshipLink {
            relationship: self,
            direction,
            other_stakeholder_id,
            other_name,
        })
    }

    pub fn apply_update(&mut self, update: RelationshipUpdate) {
        if let Some(kind) = update.relationship_type {
            self.relationship_type = kind;
        }
        if let Some(strength) = update.strength {
            self.strength = strength.clamp(STRENGTH_MIN, STRENGTH_MAX);
        }
        if update.notes.is_some() {
            self.notes = update.notes;
        }
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelationshipUpdate {
    pub relationship_type: Option<RelationshipType>,
    pub strength: Option<f64>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

/// A relationship as seen from one of its two stakeholders.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipLink {
    #[serde(flatten)]
    pub relationship: Relationship,
    pub direction: LinkDirection,
    pub other_stakeholder_id: Uuid,
    pub other_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!(
            "strategic partner".parse::<RelationshipStatus>().unwrap(),
            RelationshipStatus::StrategicPartner
        );
        assert_eq!("POSITIVE".parse::<InteractionSentiment>().unwrap(), InteractionSentiment::Positive);
        assert!("Identify".parse::<RelationshipStatus>().is_err());
    }

    #[test]
    fn status_keys_are_snake_case() {
        assert_eq!(RelationshipStatus::ProactivelyDefend.key(), "proactively_defend");
        assert_eq!(RelationshipStatus::Monitor.key(), "monitor");
    }

    #[test]
    fn with_scores_clamps_and_classifies() {
        let scores = StakeholderScores::with_scores(14.0, -22.0);
        assert_eq!(scores.influence_score, 10.0);
        assert_eq!(scores.interest_score, -10.0);
        assert_eq!(scores.sentiment, RelationshipStatus::ProactivelyDefend);
    }

    #[test]
    fn set_scores_rederives_after_override() {
        let mut scores = StakeholderScores::with_scores(6.0, 6.0).with_override(RelationshipStatus::Monitor);
        assert_eq!(scores.sentiment, RelationshipStatus::Monitor);

        scores.set_scores(None, None);
        assert_eq!(scores.sentiment, RelationshipStatus::Monitor);

        scores.set_scores(None, Some(3.0));
        assert_eq!(scores.interest_score, 3.0);
        assert_eq!(scores.influence_score, 6.0);
        assert_eq!(scores.sentiment, RelationshipStatus::Collaborate);
    }

    #[test]
    fn tags_behave_like_a_set() {
        let mut stakeholder = Stakeholder::new("Dana Ortiz", StakeholderScores::default(), Utc::now());
        assert!(stakeholder.add_tag("government"));
        assert!(!stakeholder.add_tag("government"));
        assert_eq!(stakeholder.tags, vec!["government".to_string()]);
        assert!(stakeholder.remove_tag("government"));
        assert!(!stakeholder.remove_tag("government"));
    }

    #[test]
    fn relationship_strength_is_clamped_and_self_links_rejected() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let rel = Relationship::new(a, b, RelationshipType::Ally, Some(14.0)).unwrap();
        assert_eq!(rel.strength, 10.0);
        let rel = Relationship::new(a, b, RelationshipType::Ally, None).unwrap();
        assert_eq!(rel.strength, 5.0);
        assert!(Relationship::new(a, a, RelationshipType::Colleague, None).is_err());
    }

    #[test]
    fn relationships_read_from_either_end() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rel = Relationship::new(a, b, RelationshipType::Advisor, Some(7.0)).unwrap();
        rel.stakeholder_name = Some("Aiko Tanaka".to_string());
        rel.related_name = Some("Marcus Bell".to_string());

        let outgoing = rel.clone().link_for(a).unwrap();
        assert_eq!(outgoing.direction, LinkDirection::Outgoing);
        assert_eq!(outgoing.other_stakeholder_id, b);
        assert_eq!(outgoing.other_name.as_deref(), Some("Marcus Bell"));

        let incoming = rel.clone().link_for(b).unwrap();
        assert_eq!(incoming.direction, LinkDirection::Incoming);
        assert_eq!(incoming.other_stakeholder_id, a);
        assert_eq!(incoming.other_name.as_deref(), Some("Aiko Tanaka"));

        assert!(rel.link_for(Uuid::new_v4()).is_none());
    }

    #[test]
    fn relationship_update_clamps_strength() {
        let mut rel =
            Relationship::new(Uuid::new_v4(), Uuid::new_v4(), RelationshipType::Ally, None).unwrap();
        rel.apply_update(RelationshipUpdate {
            relationship_type: Some(RelationshipType::Opponent),
            strength: Some(-3.0),
            is_active: Some(false),
            ..RelationshipUpdate::default()
        });
        assert_eq!(rel.relationship_type, RelationshipType::Opponent);
        assert_eq!(rel.strength, 0.0);
        assert!(!rel.is_active);
        assert!(rel.notes.is_none());
    }

    #[test]
    fn interaction_types_are_lowercased() {
        assert_eq!(normalize_interaction_type("  Email ").unwrap(), "email");
        assert_eq!(normalize_interaction_type("PHONE_CALL").unwrap(), "phone_call");
        assert!(normalize_interaction_type("   ").is_err());
    }

    fn interaction() -> Interaction {
        let now = Utc::now();
        Interaction {
            id: Uuid::new_v4(),
            stakeholder_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            subject: Some("Zoning briefing".to_string()),
            description: None,
            outcome: None,
            duration_minutes: Some(30),
            follow_up_date: None,
            tags: vec!["zoning".to_string()],
            attachments: Vec::new(),
            record: InteractionRecord {
                sentiment: InteractionSentiment::Neutral,
                interaction_type: "meeting".to_string(),
                impact_on_relationship: None,
                date: now,
                follow_up_required: false,
                follow_up_completed: false,
            },
            created_at: now,
        }
    }

    #[test]
    fn interaction_update_changes_only_given_fields() {
        let mut item = interaction();
        let later = item.created_at + chrono::Duration::days(2);
        item.apply_update(
            InteractionUpdate {
                interaction_type: Some("Video_Call".to_string()),
                sentiment: Some(InteractionSentiment::Positive),
                follow_up_date: Some(later),
                tags: Some(vec!["budget".to_string(), "budget".to_string()]),
                attachments: vec!["minutes.pdf=https://files.example.org/minutes.pdf".parse().unwrap()],
                ..InteractionUpdate::default()
            },
            later,
        )
        .unwrap();

        assert_eq!(item.record.interaction_type, "video_call");
        assert_eq!(item.record.sentiment, InteractionSentiment::Positive);
        assert!(item.record.follow_up_required);
        assert_eq!(item.follow_up_date, Some(later));
        assert_eq!(item.subject.as_deref(), Some("Zoning briefing"));
        assert_eq!(item.duration_minutes, Some(30));
        assert_eq!(item.tags, vec!["budget".to_string()]);
        assert_eq!(item.attachments.len(), 1);
        assert_eq!(item.attachments[0].filename, "minutes.pdf");
        assert_eq!(item.attachments[0].uploaded_at, later);
    }

    #[test]
    fn rejected_interaction_update_leaves_the_record_untouched() {
        let mut item = interaction();
        let result = item.apply_update(
            InteractionUpdate {
                subject: Some("Changed".to_string()),
                duration_minutes: Some(-5),
                ..InteractionUpdate::default()
            },
            Utc::now(),
        );
        assert!(result.is_err());
        assert_eq!(item.subject.as_deref(), Some("Zoning briefing"));
    }

    #[test]
    fn attachment_refs_need_a_name_and_a_url() {
        let parsed: AttachmentRef = "brief.docx = https://files.example.org/brief.docx".parse().unwrap();
        assert_eq!(parsed.filename, "brief.docx");
        assert_eq!(parsed.url, "https://files.example.org/brief.docx");
        assert!("brief.docx".parse::<AttachmentRef>().is_err());
        assert!("=https://files.example.org/x".parse::<AttachmentRef>().is_err());
    }

    #[test]
    fn profile_update_trims_and_rejects_blank_names() {
        let mut user = User {
            id: Uuid::new_v4(),
            email: "sam@example.org".to_string(),
            password_hash: String::new(),
            first_name: "Sam".to_string(),
            last_name: "Okafor".to_string(),
            role: Role::Member,
            is_active: true,
            created_at: Utc::now(),
        };
        user.update_profile(Some("  Samira "), None).unwrap();
        assert_eq!(user.full_name(), "Samira Okafor");
        assert!(user.update_profile(Some("Sam"), Some("  ")).is_err());
        assert_eq!(user.full_name(), "Samira Okafor");
    }

    #[test]
    fn campaign_phase_stops_at_execute() {
        assert_eq!(CampaignPhase::Purpose.next(), Some(CampaignPhase::Plan));
        assert_eq!(CampaignPhase::Execute.next(), None);
    }
}
