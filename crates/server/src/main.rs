//! formdesk server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};
use formdesk_api::{AppState, router as api_router};
use formdesk_common::{Config, LocalStorage, StorageService};
use formdesk_core::{FormService, SubmissionService};
use formdesk_db::repositories::{FormRepository, FormSubmissionRepository};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// A handler that fails to install never resolves, so the other one still
/// triggers shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formdesk=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting formdesk server...");

    let config = Config::load()?;

    let db = formdesk_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    formdesk_db::migrate(&db).await?;
    info!("Migrations completed");

    if config.admin.token.is_empty() {
        warn!("admin.token is empty; admin endpoints will reject every request");
    }

    let storage: StorageService = Arc::new(LocalStorage::new(
        config.storage.base_path.clone(),
        config.storage.base_url.clone(),
    ));

    let db = Arc::new(db);
    let form_repo = FormRepository::new(Arc::clone(&db));
    let submission_repo = FormSubmissionRepository::new(Arc::clone(&db));

    let form_service = FormService::new(
        form_repo.clone(),
        submission_repo.clone(),
        Arc::clone(&storage),
    );
    let submission_service =
        SubmissionService::new(form_repo, submission_repo, Arc::clone(&storage))
            .with_max_upload_bytes(config.forms.max_upload_bytes);

    let state = AppState {
        form_service,
        submission_service,
        admin_token: Arc::from(config.admin.token.as_str()),
    };

    let body_limit = usize::try_from(config.forms.max_request_bytes).unwrap_or(usize::MAX);

    let mut app = Router::new().merge(api_router().with_state(state));

    // Uploaded files are served from disk when storage lives under this host.
    let mount = config.storage.base_url.trim_end_matches('/');
    if mount.starts_with('/') {
        app = app.nest_service(mount, ServeDir::new(&config.storage.base_path));
    }

    let app = app
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}
