//! Superkey forge worker.
//!
//! Consumes `create_application` events, forges the superkey's cloud
//! resources, and records the resulting credential with the system of
//! record. Events arrive over HTTP and are handled by a bounded pool;
//! health and Prometheus metrics are served alongside.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod pool;
pub mod reporter;
pub mod routes;

pub use config::{Config, LogFormat, ProviderMode};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{DispatchError, IngestError, ReportError};
pub use event::{EVENT_TYPE_HEADER, EventKind, InboundEvent};
pub use pool::WorkerPool;
pub use reporter::{
    ApplicationRecord, HttpSystemOfRecord, InMemorySystemOfRecord, SystemOfRecord,
};

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use routes::events::IngestState;

/// Creates the Axum router feeding `queue`.
pub fn create_app(queue: mpsc::Sender<InboundEvent>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/events", post(routes::events::ingest))
        .with_state(IngestState { queue })
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
}
