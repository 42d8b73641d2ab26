use anyhow::Context;
use tokio::sync::watch;

mod app;
mod auth;
mod carts;
mod catalog;
mod categories;
mod config;
mod error;
mod products;
mod ratings;
mod recipes;
mod search;
mod state;
mod validate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "foocipe=debug,axum=info,tower_http=info".to_string());
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

    let app_state = state::AppState::init().await?;

    sqlx::migrate!("./migrations")
        .run(&app_state.db)
        .await
        .context("run migrations")?;

    let (stop_relay, relay_shutdown) = watch::channel(false);
    let relay = tokio::spawn(search::sync::run_relay(app_state.clone(), relay_shutdown));

    let host = app_state.config.host.clone();
    let port = app_state.config.port;
    let router = app::build_app(app_state);
    app::serve(router, &host, port, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
        tracing::info!("shutdown requested");
    })
    .await?;

    stop_relay.send(true).ok();
    relay.await.context("join search relay")?;
    Ok(())
}
