use soaplab_service::{
    DefaultAppState,
    auth::SupabaseIdentityResolver,
    config::Settings,
    db::establish_connection,
    news::NewsService,
    ratelimit::RateLimiter,
    repositories::{SqliteNewsRepository, SqliteProfileRepository},
    routes::create_router,
};
use std::sync::{Arc, Mutex};
use axum::http::StatusCode;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,soaplab_service=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::load().unwrap_or_else(|err| {
        error!(error = %err, "Invalid configuration");
        std::process::exit(1);
    });

    let database_url = settings.database.url.clone();
    let connection = establish_connection(&database_url).unwrap_or_else(|err| {
        error!(database_url = %database_url, error = %err, "Failed to open database");
        std::process::exit(1);
    });

    info!(database_url = %database_url, "Connected to database");

    let identity = SupabaseIdentityResolver::new(
        &settings.auth.supabase_url,
        settings.auth.supabase_anon_key.clone(),
    );
    let db = Arc::new(Mutex::new(connection));
    let news = NewsService::new(SqliteNewsRepository::new(db.clone())).with_page_sizes(
        settings.news.default_page_size,
        settings.news.max_page_size,
    );
    let app_state = DefaultAppState::new(news, SqliteProfileRepository::new(db), identity);

    let limiter = RateLimiter::new(
        settings.rate_limit.max_requests,
        settings.rate_limit_window(),
    );
    limiter.spawn_pruner(settings.rate_limit_window());

    let app = create_router(limiter)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    settings.request_timeout(),
                )),
        )
        .with_state(app_state);

    let bind_address = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .unwrap_or_else(|err| {
            error!(bind_address = %bind_address, error = %err, "Failed to bind to address");
            std::process::exit(1);
        });

    info!(bind_address = %bind_address, "Server running");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    if let Err(err) = server.await {
        error!(error = %err, "Server error");
        std::process::exit(1);
    }

    info!("Graceful shutdown completed");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, draining in-flight requests");
}
