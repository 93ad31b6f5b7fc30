use crate::auth::{
    spawn_sweeper, AuthConfig, AuthService, GoogleConfig, GoogleProvider, OAuthFlow,
    OAuthStateStore, PgUserRepository, SessionCodec, SessionKeys,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    Extension, Router,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Everything the server needs besides the listening port.
#[derive(Debug)]
pub struct ServerConfig {
    pub dsn: String,
    pub auth: AuthConfig,
    pub session_keys: SessionKeys,
    pub google: Option<GoogleConfig>,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, config: ServerConfig) -> Result<()> {
    let ServerConfig {
        dsn,
        auth,
        session_keys,
        google,
    } = config;

    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let users = PgUserRepository::new(pool.clone());
    users.ensure_schema().await?;

    let shutdown = CancellationToken::new();

    let (oauth, sweeper) = match google {
        Some(google) => {
            let provider = GoogleProvider::new(google.with_timeout(auth.oauth_http_timeout()))
                .context("Failed to build Google OAuth client")?;
            let states = Arc::new(OAuthStateStore::new(auth.oauth_state_ttl()));
            let sweeper = spawn_sweeper(
                states.clone(),
                auth.oauth_sweep_interval(),
                shutdown.clone(),
            );
            info!("Google OAuth enabled");
            (Some(OAuthFlow::new(Arc::new(provider), states)), Some(sweeper))
        }
        None => {
            info!("Google OAuth not configured");
            (None, None)
        }
    };

    let codec = SessionCodec::new(session_keys, auth.session_ttl());
    let service = Arc::new(AuthService::new(auth, Arc::new(users), codec, oauth));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    let signal = shutdown.clone();
    axum::serve(listener, app(service, pool).into_make_service())
        .with_graceful_shutdown(async move {
            tokio::select! {
                () = shutdown_signal() => {}
                () = signal.cancelled() => {}
            }
            info!("Gracefully shutdown");
        })
        .await?;

    shutdown.cancel();
    if let Some(sweeper) = sweeper {
        sweeper.await.context("OAuth state sweeper failed")?;
    }

    Ok(())
}

/// Router with documentation, middleware and shared state attached.
pub fn app(service: Arc<AuthService>, pool: PgPool) -> Router {
    let (router, openapi) = router().split_for_parts();
    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(service))
                .layer(Extension(pool)),
        )
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
