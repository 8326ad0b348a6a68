//! Command runners: serve HTTP, reconcile the index, seed synthetic data.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use message_store::{
    KvMessageStore, MemoryBackend, Message, MessageRepository, ReconcileReport, RedisBackend,
    SqliteMessageStore,
};
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::net::TcpListener;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::{ServiceConfig, StoreBackend};
use crate::http::{router, AppState};

async fn connect_redis(config: &ServiceConfig) -> Result<KvMessageStore<RedisBackend>> {
    let backend = RedisBackend::connect(&config.redis)
        .await
        .with_context(|| format!("Failed to connect to redis at {}", config.redis.address))?;
    Ok(KvMessageStore::with_options(backend, config.store_options()))
}

fn memory_store(config: &ServiceConfig) -> KvMessageStore<MemoryBackend> {
    KvMessageStore::with_options(MemoryBackend::new(), config.store_options())
}

/// Opens the store selected by `STORE_BACKEND`.
pub async fn build_store(config: &ServiceConfig) -> Result<Arc<dyn MessageRepository>> {
    info!(backend = %config.store_backend, "Opening message store");

    let store: Arc<dyn MessageRepository> = match config.store_backend {
        StoreBackend::Redis => Arc::new(connect_redis(config).await?),
        StoreBackend::Memory => Arc::new(memory_store(config)),
        StoreBackend::Sqlite => Arc::new(
            SqliteMessageStore::with_options(&config.database_url, config.store_options())
                .await
                .with_context(|| format!("Failed to open SQLite at {}", config.database_url))?,
        ),
    };
    Ok(store)
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}

/// Serves the router on `listener` until `shutdown` resolves, then closes the store.
///
/// The store is closed exactly once, whether serving stopped cleanly or failed.
pub async fn serve<F>(
    listener: TcpListener,
    store: Arc<dyn MessageRepository>,
    page_size: u64,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(AppState {
        store: Arc::clone(&store),
        page_size,
    });
    info!(addr = %listener.local_addr()?, "Server started");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;
    let closed = store.close().await;

    served.context("HTTP server failed")?;
    closed.context("Failed to close message store")?;
    info!("Server stopped");
    Ok(())
}

/// Runs the HTTP service: open the store, check it answers, serve until a shutdown signal.
#[instrument(skip(config), fields(backend = %config.store_backend))]
pub async fn run_server(config: ServiceConfig) -> Result<()> {
    let store = build_store(&config).await?;
    if let Err(e) = store.ping().await {
        // Release whatever was opened before bailing.
        let _ = store.close().await;
        return Err(e).context("Failed to connect to message store");
    }

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    serve(listener, store, config.page_size, shutdown_signal()).await
}

/// The memory backend lives inside one process, so a separate command run
/// against it would only ever see an empty store.
fn require_shared_backend(config: &ServiceConfig, command: &str) -> Result<()> {
    if config.store_backend == StoreBackend::Memory {
        anyhow::bail!(
            "{} needs a shared store; STORE_BACKEND=memory is process-local and starts empty",
            command
        );
    }
    Ok(())
}

/// Repairs the index set of the Redis backend.
pub async fn run_reconcile(config: &ServiceConfig, batch_size: u64) -> Result<ReconcileReport> {
    require_shared_backend(config, "reconcile")?;
    if !config.store_backend.is_key_value() {
        anyhow::bail!(
            "reconcile only applies to key-value backends; STORE_BACKEND={} has no index to repair",
            config.store_backend
        );
    }

    let store = connect_redis(config).await?;
    let report = store.reconcile(batch_size).await;
    store.close().await.context("Failed to close message store")?;
    Ok(report?)
}

const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua",
];

fn sentence<R: Rng>(rng: &mut R) -> String {
    let len = rng.gen_range(4..12);
    let text = (0..len)
        .filter_map(|_| WORDS.choose(rng).copied())
        .collect::<Vec<_>>()
        .join(" ");
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_ascii_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

/// Inserts `count` synthetic messages spread over `users` random senders.
pub async fn seed_messages(store: &dyn MessageRepository, count: u64, users: usize) -> Result<u64> {
    let users: Vec<Uuid> = (0..users.max(1)).map(|_| Uuid::now_v7()).collect();

    let mut inserted = 0;
    for _ in 0..count {
        // ThreadRng is not Send, so it must not live across the await below.
        let message = {
            let mut rng = rand::thread_rng();
            let user = *users.choose(&mut rng).context("no senders to pick from")?;
            Message::new(user, sentence(&mut rng))
        };
        store
            .insert(&message)
            .await
            .with_context(|| format!("Failed to insert message {}", message.id))?;
        inserted += 1;
    }
    info!(inserted, users = users.len(), "Seeding finished");
    Ok(inserted)
}

/// Seeds the configured store, then closes it.
pub async fn run_seed(config: &ServiceConfig, count: u64, users: usize) -> Result<u64> {
    require_shared_backend(config, "seed")?;
    let store = build_store(config).await?;
    let seeded = seed_messages(store.as_ref(), count, users).await;
    store.close().await.context("Failed to close message store")?;
    seeded
}
