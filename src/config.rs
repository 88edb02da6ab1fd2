//! Runtime configuration, read once from the process environment at startup and
//! passed explicitly into every component.

use std::time::Duration;

use tracing::warn;

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_SWEEP_SECS: u64 = 300;
/// Longest accepted session lifetime (ten years).
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 366 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub users_table: String,
    pub sessions_table: String,
    pub teams_table: String,
    pub tasks_table: String,
    pub http_port: u16,
    /// Lifetime of a freshly issued session.
    pub session_ttl: Duration,
    /// Interval of the expired-session sweeper; `None` disables it.
    pub sweep_interval: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            users_table: "Users".to_string(),
            sessions_table: "Sessions".to_string(),
            teams_table: "Teams".to_string(),
            tasks_table: "Tasks".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            sweep_interval: Some(Duration::from_secs(DEFAULT_SWEEP_SECS)),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> Self {
        let d = Self::default();
        let text = |k: &str, fallback: String| get(k).filter(|v| !v.trim().is_empty()).unwrap_or(fallback);
        let sweep_secs = parse_num(&get, "AGENDUM_SESSION_SWEEP_SECS", DEFAULT_SWEEP_SECS);
        let ttl_secs = match parse_num(&get, "AGENDUM_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS) {
            secs if secs > MAX_SESSION_TTL_SECS => {
                warn!(target: "agendum::config", value = secs, max = MAX_SESSION_TTL_SECS, fallback = DEFAULT_SESSION_TTL_SECS, "session ttl too large");
                DEFAULT_SESSION_TTL_SECS
            }
            secs => secs,
        };
        Self {
            users_table: text("USERS_TABLE_NAME", d.users_table),
            sessions_table: text("SESSIONS_TABLE_NAME", d.sessions_table),
            teams_table: text("TEAMS_TABLE_NAME", d.teams_table),
            tasks_table: text("TASKS_TABLE_NAME", d.tasks_table),
            http_port: parse_num(&get, "AGENDUM_HTTP_PORT", DEFAULT_HTTP_PORT),
            session_ttl: Duration::from_secs(ttl_secs),
            sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
        }
    }
}

fn parse_num<T, F>(get: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => default,
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!(target: "agendum::config", key, value = %raw, fallback = %default, "unparsable numeric setting");
            default
        }),
    }
}
