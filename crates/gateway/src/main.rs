//! AutoMarks API Gateway
//!
//! The HTTP entry point for the results dashboard.
//! Handles:
//! - Student and result lookups
//! - Semester analytics and exports
//! - Extracted result uploads
//! - Administration (purges, credits, notifications)
//! - Observability (logging, metrics)

mod handlers;
mod middleware;
mod telemetry;

use automarks_analytics::{Analyzer, GradingPolicy};
use automarks_common::{config::AppConfig, db::DbPool, metrics, Repository};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub analyzer: Analyzer<Repository>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    telemetry::init_tracing(&config.observability)?;

    info!("Starting AutoMarks API Gateway v{}", automarks_common::VERSION);

    // Initialize metrics
    telemetry::install_metrics_exporter(&config.observability)?;
    metrics::register_metrics();

    // Grading policy is validated before anything touches the database
    let policy = GradingPolicy::from_config(&config.grading)?;

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.apply_schema {
        db.apply_schema().await?;
    }
    let repo = Repository::new(db);

    let state = AppState {
        config: config.clone(),
        analyzer: Analyzer::new(repo.clone(), policy),
        repo,
    };

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (draining, shutdown_started) = oneshot::channel();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = draining.send(());
        })
        .into_future();

    serve_until_drained(server, shutdown_started, config.shutdown_timeout()).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = TimeoutLayer::new(state.config.request_timeout());

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Students
        .route("/students", get(handlers::students::list_students))
        .route(
            "/students/{usn}",
            get(handlers::students::get_student).delete(handlers::students::delete_student),
        )

        // Results
        .route("/results", get(handlers::results::list_results))
        .route("/results/{id}", delete(handlers::results::delete_result))

        // Analytics
        .route("/analytics/subject-stats/{semester}", get(handlers::analytics::subject_stats))
        .route("/analytics/student-summary/{usn}", get(handlers::analytics::student_summary))
        .route("/analytics/student-gpa/{usn}", get(handlers::analytics::student_gpa))
        .route("/analytics/semester-sgpa/{semester}", get(handlers::analytics::semester_sgpa))
        .route("/analytics/top-performers/{semester}", get(handlers::analytics::top_performers))
        .route("/analytics/failure-analysis/{semester}", get(handlers::analytics::failure_analysis))
        .route("/analytics/semester-overview", get(handlers::analytics::semester_overview))
        .route("/analytics/overall-statistics", get(handlers::analytics::overall_statistics))

        // Exports
        .route("/export/csv", get(handlers::export::export_csv))
        .route("/export/excel", get(handlers::export::export_excel))

        // Uploads
        .route("/upload/extracted", post(handlers::upload::upload_extracted))
        .route("/upload/status/{batch_id}", get(handlers::upload::upload_status))
        .route("/upload/batch/{batch_id}", delete(handlers::upload::delete_batch))

        // Metadata
        .route("/meta/branches", get(handlers::meta::branches))
        .route("/meta/batches", get(handlers::meta::batches))
        .route("/meta/subjects", get(handlers::meta::subjects))
        .route("/meta/subjects/credits", put(handlers::meta::update_credits))

        // Notifications
        .route("/notifications", get(handlers::notifications::list_notifications))
        .route("/notifications/clear", delete(handlers::notifications::clear_all))
        .route("/notifications/{id}", delete(handlers::notifications::clear_one))

        // Administration
        .route("/admin/purge/candidate/{usn}", delete(handlers::admin::purge_candidate))
        .route("/admin/purge/semester/{semester}", delete(handlers::admin::purge_semester))
        .route("/admin/purge/all", delete(handlers::admin::purge_all))

        .layer(
            ServiceBuilder::new()
                .layer(request_id)
                .layer(TraceLayer::new_for_http())
                .layer(propagate_id)
                .layer(cors)
                .layer(axum::middleware::from_fn(middleware::metrics::track_requests))
                .layer(CompressionLayer::new())
                .layer(timeout),
        )
        .with_state(state)
}

/// Run the server, giving in-flight requests at most `deadline` to finish
/// once shutdown has started.
async fn serve_until_drained<F>(
    server: F,
    shutdown_started: oneshot::Receiver<()>,
    deadline: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => return res,
        Ok(()) = shutdown_started => {}
    }

    match tokio::time::timeout(deadline, server).await {
        Ok(res) => res,
        Err(_) => {
            warn!(
                timeout_secs = deadline.as_secs(),
                "Shutdown deadline elapsed, dropping open connections"
            );
            Ok(())
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_stops_at_deadline() {
        let (tx, rx) = oneshot::channel();
        tx.send(()).unwrap();

        let stuck = std::future::pending::<std::io::Result<()>>();
        let res = tokio_test::block_on(serve_until_drained(stuck, rx, Duration::from_millis(20)));
        assert!(res.is_ok());
    }

    #[test]
    fn test_server_error_returned_before_shutdown() {
        let (_tx, rx) = oneshot::channel();

        let failed = async { Err(std::io::Error::other("bind lost")) };
        let res = tokio_test::block_on(serve_until_drained(failed, rx, Duration::from_secs(30)));
        assert!(res.is_err());
    }

    #[test]
    fn test_shutdown_deadline_follows_config() {
        let mut config = AppConfig::default();
        config.server.shutdown_timeout_secs = 5;
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
    }
}
