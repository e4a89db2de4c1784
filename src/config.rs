use dotenvy::dotenv;
use std::env;

/// Outbound mail gateway settings. Mail delivery is fire-and-forget; the
/// service runs fine without a gateway configured.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub endpoint: String,
    pub from_address: String,
}

/// Timing knobs for presence tracking and session liveness.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// A participant with no heartbeat for this long is considered offline.
    pub ttl_secs: i64,
    /// How often the reaper closes abandoned participant rows.
    pub reaper_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub mail: Option<MailConfig>,
    pub presence: PresenceConfig,
    /// Maximum nesting depth for comment replies.
    pub max_reply_depth: i32,
    /// TTL for cached reaction summaries.
    pub summary_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let port = parse_env("PORT", 3000);

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| crate::error::AppError::Config("JWT_SECRET missing".into()))?;

        // Mail gateway is optional; without it, preference-gated mail is skipped.
        let mail = match env::var("MAIL_GATEWAY_URL") {
            Ok(endpoint) if !endpoint.trim().is_empty() => Some(MailConfig {
                endpoint,
                from_address: env::var("MAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| "no-reply@lumen.social".to_string()),
            }),
            _ => None,
        };

        let presence = PresenceConfig {
            ttl_secs: parse_env("PRESENCE_TTL_SECS", 120),
            reaper_interval_secs: parse_env("PRESENCE_REAPER_INTERVAL_SECS", 60),
        };

        Ok(Self {
            database_url,
            redis_url,
            port,
            jwt_secret,
            mail,
            presence,
            max_reply_depth: parse_env("MAX_REPLY_DEPTH", 3),
            summary_cache_ttl_secs: parse_env("SUMMARY_CACHE_TTL_SECS", 600),
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_defaults_are_consistent() {
        let presence = PresenceConfig {
            ttl_secs: 120,
            reaper_interval_secs: 60,
        };
        // The reaper must run at least as often as the liveness window,
        // otherwise abandoned sessions linger past the TTL.
        assert!(presence.reaper_interval_secs as i64 <= presence.ttl_secs);
    }

    #[test]
    fn parse_env_falls_back_to_default() {
        // Key chosen to not exist in any environment running the tests.
        let value: u16 = parse_env("LUMEN_TEST_UNSET_KEY_7F3A", 42);
        assert_eq!(value, 42);
    }
}
