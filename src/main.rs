use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use agendum::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "agendum",
        "agendum starting: RUST_LOG='{}', http_port={}, users='{}', sessions='{}', teams='{}', tasks='{}', session_ttl_secs={}",
        rust_log, config.http_port, config.users_table, config.sessions_table, config.teams_table, config.tasks_table,
        config.session_ttl.as_secs()
    );

    agendum::server::run(config).await
}
