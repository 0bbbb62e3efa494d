use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use order_assist::api::{AppState, app_router};
use order_assist::config::AppConfig;
use order_assist::conversation::{Dispatcher, LlmExtractor};
use order_assist::llm::create_provider;
use order_assist::orders::OrderService;
use order_assist::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export GROQ_API_KEY=gsk_...");
        std::process::exit(1);
    });

    // Initialize tracing; the guard flushes the file writer on exit.
    let (file_layer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "order-assist.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    eprintln!("🛒 Order Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {} ({:?})", config.llm.model, config.llm.backend);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Chat UI: http://0.0.0.0:{}/", config.port);
    eprintln!("   Admin: http://0.0.0.0:{}/admin\n", config.port);

    // ── Database ────────────────────────────────────────────────────
    let backend = LibSqlBackend::new_local(&config.db_path)
        .await
        .with_context(|| format!("opening database at {}", config.db_path.display()))?;
    let db: Arc<dyn Database> = Arc::new(backend);

    if config.seed_sample_data && db.seed_sample_data().await.context("seeding sample data")? {
        eprintln!("   Seeded sample customers and products");
    }

    // ── Conversation ────────────────────────────────────────────────
    let llm = create_provider(&config.llm).context("creating LLM provider")?;
    let service = OrderService::new(Arc::clone(&db));
    let dispatcher = Arc::new(Dispatcher::new(
        service.clone(),
        Arc::new(LlmExtractor::new(llm)),
    ));

    // ── HTTP ────────────────────────────────────────────────────────
    let app = app_router(
        AppState {
            dispatcher,
            service,
        },
        &config.static_dir,
    );

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    tracing::info!(port = config.port, "HTTP server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}
