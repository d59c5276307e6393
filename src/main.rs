use std::sync::Arc;

use matchbot::config::Config;
use matchbot::dispatch::Dispatcher;
use matchbot::engine::RegistrationEngine;
use matchbot::publish::Publisher;
use matchbot::server;
use matchbot::session::{self, SessionStore};
use matchbot::store::{GameStore, LibSqlBackend};
use matchbot::telegram::{self, BotApi, TelegramApi, Update};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    eprintln!("🏸 Match Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Channel: {}", config.channel_id);
    eprintln!("   HTTP: http://0.0.0.0:{}", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn GameStore> = Arc::new(
        LibSqlBackend::new_local(&config.database_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {e}",
                    config.database_path.display()
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.database_path.display());

    // ── Telegram + publisher + engine ────────────────────────────────────
    let api: Arc<dyn BotApi> = Arc::new(TelegramApi::new(config.bot_token.clone()));
    let publisher = Arc::new(Publisher::new(
        Arc::clone(&store),
        Arc::clone(&api),
        config.channel_id.clone(),
    ));

    let sessions = SessionStore::new();
    let _eviction_handle =
        session::spawn_eviction_task(sessions.clone(), config.session_idle_timeout);

    let engine = Arc::new(RegistrationEngine::new(
        Arc::clone(&store),
        sessions,
        publisher,
        Arc::clone(&api),
    ));
    let dispatcher = Arc::new(Dispatcher::new(engine, Arc::clone(&api)));

    // Both delivery modes feed the same pipe.
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Update>();

    // ── HTTP server (health + webhook) ───────────────────────────────────
    let app = server::routes(tx.clone());
    let port = config.port;
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error: Failed to bind port {port}: {e}");
                std::process::exit(1);
            }
        };
        tracing::info!(port, "HTTP server started");
        axum::serve(listener, app).await.ok();
    });

    // ── Update delivery: webhook in production, long-poll otherwise ──────
    match config.webhook_url() {
        Some(url) => {
            api.set_webhook(&url).await?;
            eprintln!("   Updates: webhook at {url}");
        }
        None => {
            // A leftover webhook blocks getUpdates.
            api.delete_webhook().await?;
            telegram::spawn_polling(config.bot_token.clone(), tx);
            eprintln!("   Updates: long-polling");
        }
    }

    dispatcher.run(rx).await;

    Ok(())
}
