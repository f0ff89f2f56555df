mod app;
mod config;
mod db;
mod entries;
mod error;
mod foods;
mod identity;
mod ledger;
mod nutrition;
mod state;
mod summary;

use tracing::info;

use crate::{ledger::engine, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "nutrilog=debug,axum=info,tower_http=info,sqlx=warn".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = AppState::init().await?;

    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => {
            let bind = state.config.bind_addr();
            app::serve(app::build_app(state), &bind).await
        }
        Some("backfill") => {
            let results = engine::reconcile_all(state.ledger.as_ref(), None).await?;
            info!(keys = results.len(), "backfill complete");
            Ok(())
        }
        Some(other) => anyhow::bail!("unknown command '{other}' (expected serve or backfill)"),
    }
}
