// Equipment Registry - Web Server
// Serves the registry over HTTP; snapshot is loaded at start and saved on Ctrl+C

use anyhow::{Context, Result};
use equipment_registry::{api, load_registry, save_registry, setup_database, Config};
use rusqlite::Connection;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    equipment_registry::init_tracing("info,equipment_registry=debug,tower_http=debug");

    let config = Config::from_env();

    // Open database
    let mut conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    setup_database(&conn)?;

    let mut stored = load_registry(&mut conn)?;
    tracing::info!(
        db = %config.db_path.display(),
        records = stored.registry.get_equipment_count(),
        revision = stored.revision(),
        "registry loaded"
    );

    let app = api::router(stored.registry.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    tracing::info!("Server running on http://{}", config.bind_addr);
    tracing::info!("API: http://{}/api/equipment", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Refused if the file was written by someone else while we were serving
    save_registry(&mut conn, &mut stored)?;
    tracing::info!("registry saved, bye");

    Ok(())
}
