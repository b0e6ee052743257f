//! Server configuration from flags, environment, and `.env`.

use crate::middleware::RateLimitConfig;
use clap::Parser;
use std::time::Duration;

const DEV_JWT_SECRET: &str = "dev-secret-change-in-production-minimum-32-characters";

#[derive(Parser, Debug, Clone)]
#[command(name = "portfolio")]
#[command(about = "Portfolio backend - auth, contact messages, and media memories")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:5000")]
    pub bind_addr: String,

    /// SQLite database file shared by all stores
    #[arg(long, env = "DATABASE_PATH", default_value = "portfolio.db")]
    pub database_path: String,

    /// Token signing secret. Falls back to a development secret when unset.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Token lifetime in hours
    #[arg(
        long,
        env = "JWT_EXPIRE_HOURS",
        default_value = "24",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub jwt_expire_hours: u32,

    /// Message submission window, in seconds
    #[arg(long, env = "MESSAGE_RATE_WINDOW_SECS", default_value = "3600")]
    pub message_rate_window_secs: u64,

    /// Message submissions allowed per window and address
    #[arg(long, env = "MESSAGE_RATE_MAX", default_value = "5")]
    pub message_rate_max: u32,

    /// Upper bound on a single identity lookup, in milliseconds
    #[arg(long, env = "IDENTITY_LOOKUP_TIMEOUT_MS", default_value = "2000")]
    pub identity_lookup_timeout_ms: u64,

    /// Bootstrap admin account, created on startup if missing
    #[arg(long, env = "ADMIN_USERNAME", requires = "admin_password")]
    pub admin_username: Option<String>,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,
}

impl ServerConfig {
    /// The configured secret, or the development fallback and `true` when
    /// none was supplied.
    pub fn jwt_secret(&self) -> (String, bool) {
        match self.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => (secret.to_string(), false),
            None => (DEV_JWT_SECRET.to_string(), true),
        }
    }

    pub fn message_rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::new(
            Duration::from_secs(self.message_rate_window_secs),
            self.message_rate_max,
        )
    }

    pub fn identity_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.identity_lookup_timeout_ms)
    }

    pub fn admin_account(&self) -> Option<(&str, &str)> {
        match (&self.admin_username, &self.admin_password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["portfolio"]).unwrap();

        assert_eq!(config.jwt_expire_hours, 24);
        let limit = config.message_rate_limit();
        assert_eq!(limit.max_requests, 5);
        assert_eq!(limit.window, Duration::from_secs(3600));
        assert_eq!(config.identity_lookup_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "portfolio",
            "--jwt-secret",
            "s3cret",
            "--message-rate-max",
            "10",
            "--admin-username",
            "root",
            "--admin-password",
            "hunter22",
        ])
        .unwrap();

        assert_eq!(config.jwt_secret(), ("s3cret".to_string(), false));
        assert_eq!(config.message_rate_limit().max_requests, 10);
        assert_eq!(config.admin_account(), Some(("root", "hunter22")));
    }

    #[test]
    fn test_token_lifetime_must_be_positive() {
        for hours in ["0", "-1"] {
            let result = ServerConfig::try_parse_from([
                "portfolio",
                "--jwt-expire-hours",
                hours,
            ]);
            assert!(result.is_err(), "accepted {}", hours);
        }

        let config =
            ServerConfig::try_parse_from(["portfolio", "--jwt-expire-hours", "48"]).unwrap();
        assert_eq!(config.jwt_expire_hours, 48);
    }

    #[test]
    fn test_admin_username_requires_password() {
        let result = ServerConfig::try_parse_from(["portfolio", "--admin-username", "root"]);
        assert!(result.is_err());
    }
}
