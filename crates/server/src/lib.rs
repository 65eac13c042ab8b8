//! Server crate provides the HTTP surface of the storefront backend.
//!
//! A thin axum controller: handlers normalize request bodies, resolve the
//! caller from gateway headers and delegate to the order, cart and catalog
//! services. Every request is counted in a prometheus registry exposed on
//! `/metrics`.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{MatchedPath, State},
    response::Response,
    routing::{delete, get, patch},
};
use service::{CartService, CatalogService, OrderService};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

mod error;
mod extract;
mod handlers;
mod metrics;

pub use error::{ApiError, ApiResponse};

use metrics::Metrics;

/// The services the HTTP layer delegates to.
#[derive(Clone)]
pub struct Services {
    pub orders: Arc<dyn OrderService>,
    pub cart: Arc<dyn CartService>,
    pub catalog: Arc<dyn CatalogService>,
}

/// Application state shared between request handlers
#[derive(Clone)]
pub(crate) struct AppState {
    orders: Arc<dyn OrderService>,
    cart: Arc<dyn CartService>,
    catalog: Arc<dyn CatalogService>,
    metrics: Arc<Metrics>,
}

/// Server represents the HTTP server of the storefront.
pub struct Server {
    port: u16,
    state: AppState,
}

impl Server {
    /// Creates a new Server instance.
    ///
    /// # Errors
    /// Fails when the metrics registry cannot be set up.
    pub fn new(port: u16, services: Services) -> Result<Self> {
        info!("Initializing HTTP server on port {}", port);
        let metrics = Metrics::new().context("Failed to create metrics registry")?;

        Ok(Self {
            port,
            state: AppState {
                orders: services.orders,
                cart: services.cart,
                catalog: services.catalog,
                metrics: Arc::new(metrics),
            },
        })
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();

        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .with_context(|| format!("Failed to bind to port {}", self.port))?;

        info!("HTTP server listening on port {}", self.port);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Server error")?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }

    /// Builds the router with every route and the metrics middleware.
    pub fn router(&self) -> Router {
        let state = self.state.clone();

        Router::new()
            .route(
                "/api/orders",
                get(handlers::list_user_orders).post(handlers::create_order),
            )
            .route(
                "/api/orders/{id}",
                get(handlers::get_order).delete(handlers::delete_order),
            )
            .route("/api/admin/orders", get(handlers::list_all_orders))
            .route(
                "/api/admin/orders/{id}/status",
                patch(handlers::update_order_status),
            )
            .route(
                "/api/cart",
                get(handlers::view_cart).post(handlers::add_to_cart),
            )
            .route(
                "/api/cart/{id}",
                patch(handlers::update_cart_item).delete(handlers::remove_cart_item),
            )
            .route("/api/products/{id}/price", get(handlers::quote_product))
            .route("/api/admin/categories/{id}", delete(handlers::delete_category))
            .route(
                "/api/admin/subcategories/{id}",
                delete(handlers::delete_subcategory),
            )
            .route("/api/admin/products/{id}", delete(handlers::delete_product))
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics))
            .fallback(handlers::not_found)
            .layer(axum::middleware::from_fn_with_state(
                state.metrics.clone(),
                metrics_middleware,
            ))
            .with_state(state)
    }
}

/// Middleware for collecting metrics on HTTP requests.
///
/// Requests are labelled with the route template rather than the raw path,
/// so ids do not multiply label sets.
async fn metrics_middleware(
    State(metrics): State<Arc<Metrics>>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = req.method().to_string();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());

    let request_size = content_length(req.headers());
    if request_size > 0 {
        metrics.record_network_traffic("in", request_size);
    }

    let start = std::time::Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed();

    let status = response.status().as_u16();
    metrics.record_request(&method, &endpoint, status, duration);
    if status >= 400 {
        metrics.record_error("http", &endpoint);
    }

    let response_size = content_length(response.headers());
    if response_size > 0 {
        metrics.record_network_traffic("out", response_size);
    }

    response
}

fn content_length(headers: &axum::http::HeaderMap) -> usize {
    headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0)
}

/// Waits for Ctrl+C or SIGTERM.
///
/// A signal handler that cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}
