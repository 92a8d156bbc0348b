use std::env;
use std::time::Duration;

use uuid::Uuid;

use crate::error::FuturykonError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Auth (tokens are issued by the hosted backend; we only verify them)
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub admin_user_ids: Vec<Uuid>,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Refresh policy for reads from the event store
    pub refresh_max_attempts: u32,
    pub refresh_backoff: Duration,
    /// How often the server catches up with facts written by other instances.
    pub refresh_interval: Duration,
    /// A sequence hole older than this is an aborted insert, not an
    /// in-flight one, and refresh reads past it.
    pub log_gap_grace: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, FuturykonError> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: required_env("DATABASE_URL")?,
            jwt_secret: required_env("JWT_SECRET")?,
            jwt_issuer: env::var("JWT_ISSUER").ok().filter(|s| !s.is_empty()),
            admin_user_ids: parse_admin_ids(&env::var("ADMIN_USER_IDS").unwrap_or_default())?,
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: parsed_env("WEB_PORT", 3000)?,
            refresh_max_attempts: parsed_env("REFRESH_MAX_ATTEMPTS", 3)?,
            refresh_backoff: Duration::from_millis(parsed_env("REFRESH_BACKOFF_MS", 200)?),
            refresh_interval: Duration::from_secs(parsed_env("REFRESH_INTERVAL_SECS", 30)?),
            log_gap_grace: Duration::from_secs(parsed_env("LOG_GAP_GRACE_SECS", 60)?),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let head: String = val.chars().take(5).collect();
            format!("{head}...({} chars)", val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", preview(&self.database_url));
        tracing::info!("  JWT_SECRET: {}", preview(&self.jwt_secret));
        tracing::info!("  ADMIN_USER_IDS: {} configured", self.admin_user_ids.len());
        tracing::info!(
            "  refresh: every {}s, {} attempts, {}ms backoff",
            self.refresh_interval.as_secs(),
            self.refresh_max_attempts,
            self.refresh_backoff.as_millis()
        );
        tracing::info!("  LOG_GAP_GRACE_SECS: {}", self.log_gap_grace.as_secs());
    }
}

fn required_env(key: &str) -> Result<String, FuturykonError> {
    env::var(key).map_err(|_| FuturykonError::Config(format!("{key} environment variable is required")))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, FuturykonError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| FuturykonError::Config(format!("{key} must be a number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}

/// Parse a comma-separated list of admin user ids. Blank entries are skipped.
pub fn parse_admin_ids(raw: &str) -> Result<Vec<Uuid>, FuturykonError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s)
                .map_err(|_| FuturykonError::Config(format!("ADMIN_USER_IDS contains invalid id {s:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_ids_skip_blanks() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = parse_admin_ids(&format!(" {a}, ,{b},")).unwrap();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn admin_ids_empty_is_empty() {
        assert!(parse_admin_ids("").unwrap().is_empty());
    }

    #[test]
    fn admin_ids_reject_garbage() {
        let err = parse_admin_ids("not-a-uuid").unwrap_err();
        assert!(matches!(err, FuturykonError::Config(_)));
    }
}
