use anyhow::Context;
use care_chat_service::{
    build_router,
    config::{Config, StoreBackend},
    db, logging,
    state::AppState,
    store::{ConversationStore, MemoryConversationStore, PgConversationStore, SharedStore},
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let cfg = Config::from_env()?;
    tracing::info!(config = ?cfg, "configuration loaded");

    let store: SharedStore = match (cfg.store_backend, cfg.database.as_ref()) {
        (StoreBackend::Postgres, Some(db_cfg)) => {
            let pool = db::create_pool(db_cfg).await.context("database pool")?;
            db::run_migrations(&pool)
                .await
                .context("database migrations failed")?;
            Arc::new(PgConversationStore::new(pool))
        }
        (StoreBackend::Postgres, None) => anyhow::bail!("DATABASE_URL missing"),
        (StoreBackend::Memory, _) => {
            tracing::warn!("using in-memory store; data is lost on restart");
            Arc::new(MemoryConversationStore::new())
        }
    };

    for user in &cfg.seed_users {
        store.upsert_user(user).await.context("seeding users")?;
    }
    if !cfg.seed_users.is_empty() {
        tracing::info!(count = cfg.seed_users.len(), "seed users loaded");
    }

    tokio::fs::create_dir_all(&cfg.upload_dir)
        .await
        .with_context(|| format!("create upload dir {}", cfg.upload_dir.display()))?;

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    let app = build_router(AppState::new(cfg, store));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("bind {bind_addr}"))?;
    tracing::info!(%bind_addr, "starting care-chat-service");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("care-chat-service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
