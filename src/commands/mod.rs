//! Command implementations.

pub mod analytics;
pub mod campaign;
pub mod interaction;
pub mod relationship;
pub mod score;
pub mod stakeholder;
pub mod task;
pub mod user;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::debug;

use crate::auth::{Identity, Permission, TokenManager};
use crate::config::Settings;
use crate::error::EngagementError;

/// What every command needs: the pool, settings, the evaluation instant and
/// the caller's bearer token.
pub struct Context {
    pub pool: PgPool,
    pub settings: Settings,
    pub now: DateTime<Utc>,
    pub json: bool,
    token: Option<String>,
}

impl Context {
    pub fn new(
        pool: PgPool,
        settings: Settings,
        now: DateTime<Utc>,
        json: bool,
        token: Option<String>,
    ) -> Self {
        Self {
            pool,
            settings,
            now,
            json,
            token,
        }
    }

    pub fn tokens(&self) -> anyhow::Result<TokenManager> {
        Ok(TokenManager::new(
            self.settings.jwt_secret()?,
            self.settings.token_ttl(),
        ))
    }

    /// Verifies the bearer token and checks that its role holds any of
    /// `accepted`.
    pub fn authorize(&self, accepted: &[Permission]) -> anyhow::Result<Identity> {
        let token = self.token.as_deref().ok_or_else(|| {
            EngagementError::Unauthorized(
                "a token is required; run `user login` and export SRM_TOKEN".to_string(),
            )
        })?;
        let identity = self.tokens()?.verify(token)?;
        identity.require(accepted)?;
        debug!(user_id = %identity.user_id, role = %identity.role, "caller authorized");
        Ok(identity)
    }

    /// Prints `value` as JSON when `--json` was given, otherwise runs `text`.
    pub fn emit<T, F>(&self, value: &T, text: F) -> anyhow::Result<()>
    where
        T: Serialize + ?Sized,
        F: FnOnce(&T),
    {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text(value);
        }
        Ok(())
    }
}

pub(crate) fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}
