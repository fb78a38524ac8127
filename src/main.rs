use std::sync::Arc;

use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;

use adserver::config::AppConfig;
use adserver::server::run_server;
use adserver::shared::state::AppState;
use adserver::shared::utils::{create_conn, DbPool};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("migrations failed: {e}"))?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    let pool = create_conn(&config.database)?;
    run_migrations(&pool)?;
    info!("Database connected, migrations applied");

    let state = Arc::new(AppState::new(config, pool)?);
    run_server(state).await
}
