use anyhow::Context;
use chrono::Duration;

pub const DEFAULT_LOG_FILTER: &str = "stakeholder_engagement=info";
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub max_connections: u32,
    pub page_size: i64,
    pub max_page_size: i64,
    pub log_filter: String,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let jwt_secret = lookup("JWT_SECRET_KEY").filter(|value| !value.trim().is_empty());

        let log_filter = lookup("SRM_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let settings = Self {
            database_url,
            jwt_secret,
            token_ttl_hours: parse_or(&lookup, "SRM_TOKEN_TTL_HOURS", 1)?,
            max_connections: parse_or(&lookup, "SRM_MAX_CONNECTIONS", 5)?,
            page_size: parse_or(&lookup, "SRM_PAGE_SIZE", 50)?,
            max_page_size: parse_or(&lookup, "SRM_MAX_PAGE_SIZE", 100)?,
            log_filter,
        };

        anyhow::ensure!(
            (1..=MAX_TOKEN_TTL_HOURS).contains(&settings.token_ttl_hours),
            "SRM_TOKEN_TTL_HOURS must be between 1 and {MAX_TOKEN_TTL_HOURS}"
        );
        anyhow::ensure!(settings.max_connections > 0, "SRM_MAX_CONNECTIONS must be positive");
        anyhow::ensure!(settings.max_page_size > 0, "SRM_MAX_PAGE_SIZE must be positive");
        Ok(settings)
    }

    pub fn jwt_secret(&self) -> anyhow::Result<&str> {
        self.jwt_secret
            .as_deref()
            .context("JWT_SECRET_KEY must be set to issue or verify tokens")
    }

    /// Token lifetime, capped at [`MAX_TOKEN_TTL_HOURS`].
    pub fn token_ttl(&self) -> Duration {
        Duration::try_hours(self.token_ttl_hours.clamp(1, MAX_TOKEN_TTL_HOURS))
            .unwrap_or_else(|| Duration::hours(1))
    }

    /// Requested page size, falling back to the default and capped at the max.
    pub fn per_page(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.page_size)
            .clamp(1, self.max_page_size)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{key} has invalid value '{raw}': {err}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_is_set() {
        let settings = settings(&[("DATABASE_URL", "postgres://localhost/srm")]).unwrap();
        assert_eq!(settings.token_ttl_hours, 1);
        assert_eq!(settings.max_connections, 5);
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.max_page_size, 100);
        assert_eq!(settings.log_filter, DEFAULT_LOG_FILTER);
        assert!(settings.jwt_secret().is_err());
    }

    #[test]
    fn database_url_is_required() {
        assert!(settings(&[]).is_err());
        assert!(settings(&[("DATABASE_URL", "  ")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let settings = settings(&[
            ("DATABASE_URL", "postgres://localhost/srm"),
            ("JWT_SECRET_KEY", "s3cret"),
            ("SRM_TOKEN_TTL_HOURS", "8"),
            ("SRM_MAX_CONNECTIONS", "12"),
            ("SRM_LOG", "debug"),
        ])
        .unwrap();
        assert_eq!(settings.jwt_secret().unwrap(), "s3cret");
        assert_eq!(settings.token_ttl(), Duration::hours(8));
        assert_eq!(settings.max_connections, 12);
        assert_eq!(settings.log_filter, "debug");
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let err = settings(&[
            ("DATABASE_URL", "postgres://localhost/srm"),
            ("SRM_MAX_CONNECTIONS", "many"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("SRM_MAX_CONNECTIONS"));
    }

    #[test]
    fn oversized_token_ttl_is_rejected() {
        let err = settings(&[
            ("DATABASE_URL", "postgres://localhost/srm"),
            ("SRM_TOKEN_TTL_HOURS", "9223372036854775807"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("SRM_TOKEN_TTL_HOURS"));
        assert!(settings(&[
            ("DATABASE_URL", "postgres://localhost/srm"),
            ("SRM_TOKEN_TTL_HOURS", "0"),
        ])
        .is_err());
    }

    #[test]
    fn token_ttl_never_overflows() {
        let mut settings = settings(&[("DATABASE_URL", "postgres://localhost/srm")]).unwrap();
        settings.token_ttl_hours = i64::MAX;
        assert_eq!(settings.token_ttl(), Duration::hours(MAX_TOKEN_TTL_HOURS));
    }

    #[test]
    fn page_size_is_clamped() {
        let settings = settings(&[("DATABASE_URL", "postgres://localhost/srm")]).unwrap();
        assert_eq!(settings.per_page(None), 50);
        assert_eq!(settings.per_page(Some(500)), 100);
        assert_eq!(settings.per_page(Some(0)), 1);
    }
}
