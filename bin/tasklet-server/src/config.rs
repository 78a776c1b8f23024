//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

/// Upper bound on the idempotency TTL: one year.
pub const MAX_IDEMPOTENCY_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Runtime configuration for tasklet-server.
///
/// Every field has a default so the server runs without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://tasklet.db?mode=rwc"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins. `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,

    /// How long an admitted idempotency key blocks repeats.
    pub idempotency_ttl: Duration,

    /// Interval of the expired-key sweeper.
    pub idempotency_sweep_interval: Duration,

    /// Requests per client per minute. `0` disables rate limiting.
    pub rate_limit_per_minute: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            database_url: "sqlite://tasklet.db?mode=rwc".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            cors_allowed_origins: None,
            enable_swagger: true,
            idempotency_ttl: Duration::from_secs(30 * 60),
            idempotency_sweep_interval: Duration::from_secs(60),
            rate_limit_per_minute: 60,
        }
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env_or("TASKLET_BIND", &defaults.bind_address),
            database_url: env_or("TASKLET_DATABASE_URL", &defaults.database_url),
            log_level: env_or("TASKLET_LOG", &defaults.log_level),
            log_json: parse_bool("TASKLET_LOG_JSON", defaults.log_json),
            cors_allowed_origins: std::env::var("TASKLET_CORS_ORIGINS")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            enable_swagger: parse_bool("TASKLET_ENABLE_SWAGGER", defaults.enable_swagger),
            idempotency_ttl: idempotency_ttl_from_secs(parse_env(
                "TASKLET_IDEMPOTENCY_TTL_SECS",
                defaults.idempotency_ttl.as_secs(),
            )),
            // A zero interval would make tokio::time::interval panic.
            idempotency_sweep_interval: Duration::from_secs(
                parse_env(
                    "TASKLET_IDEMPOTENCY_SWEEP_SECS",
                    defaults.idempotency_sweep_interval.as_secs(),
                )
                .max(1),
            ),
            rate_limit_per_minute: parse_env(
                "TASKLET_RATE_LIMIT_PER_MINUTE",
                defaults.rate_limit_per_minute,
            ),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// A zero TTL would never block a repeat; cap the other end at a year.
fn idempotency_ttl_from_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(1, MAX_IDEMPOTENCY_TTL_SECS))
}

fn parse_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
