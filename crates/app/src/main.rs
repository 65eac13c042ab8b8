/// Storefront Order Backend
///
/// Entry point of the storefront backend service. It serves the HTTP API for
/// placing orders, managing carts and maintaining the catalog.
///
/// # Architecture
///
/// - `repository`: PostgreSQL access behind transaction-aware traits
/// - `service`: order creation, cascading catalog deletes, carts
/// - `server`: thin HTTP layer with prometheus metrics
///
/// Start-up order: configuration, logging, database pool and migrations,
/// services, HTTP server. Ctrl+C or SIGTERM stops the server, which then has
/// `shutdown_timeout` to drain in-flight requests.
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use app_config::AppConfig;
use repository::{
    PgCartRepository, PgCatalogRepository, PgDatabase, PgOrdersRepository, PgProductsRepository,
};
use server::{Server, Services, shutdown_signal};
use service::{CartServiceImpl, CatalogServiceImpl, OrderServiceImpl};

/// Initialize the tracing subscriber. `RUST_LOG` takes precedence over the
/// configured level.
fn init_logger(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logger: {e}"))
}

fn build_services(db: PgDatabase) -> Services {
    Services {
        orders: Arc::new(OrderServiceImpl::new(
            db.clone(),
            PgProductsRepository::new(),
            PgOrdersRepository::new(),
            PgCartRepository::new(),
        )),
        cart: Arc::new(CartServiceImpl::new(
            db.clone(),
            PgProductsRepository::new(),
            PgCartRepository::new(),
        )),
        catalog: Arc::new(CatalogServiceImpl::new(
            db,
            PgProductsRepository::new(),
            PgCatalogRepository::new(),
            PgCartRepository::new(),
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logger(&config.log_level)?;

    info!("Storefront backend starting...");

    let db_pool = db::init_db_pool(&config)
        .await
        .context("Failed to initialize database")?;
    info!("Database initialized successfully");

    let services = build_services(PgDatabase::new(db_pool));
    let http_server = Server::new(config.http_port, services)?;

    let shutdown = Arc::new(Notify::new());
    let mut tasks = JoinSet::new();

    let server_shutdown = shutdown.clone();
    tasks.spawn(async move {
        let stop = async move { server_shutdown.notified().await };
        if let Err(err) = http_server.start(stop).await {
            error!("HTTP server error: {:#}", err);
        }
    });

    tokio::select! {
        _ = shutdown_signal() => {
            // The permit is stored if the server has not started waiting yet.
            shutdown.notify_one();
        }
        Some(res) = tasks.join_next() => {
            if let Err(err) = res {
                error!("Task error: {}", err);
            }
            return Err(anyhow!("HTTP server stopped unexpectedly"));
        }
    }

    let drain = async {
        while let Some(res) = tasks.join_next().await {
            if let Err(err) = res {
                error!("Task error: {}", err);
            }
        }
    };
    if tokio::time::timeout(config.shutdown_timeout, drain).await.is_err() {
        warn!(
            "Shutdown timed out after {:?}, aborting remaining tasks",
            config.shutdown_timeout
        );
        tasks.abort_all();
    }

    info!("Application stopped");
    Ok(())
}
