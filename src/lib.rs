//! pcbook - laptop catalog over gRPC with role-based call authorization.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod grpc;
pub mod handlers;
pub mod middleware;
pub mod telemetry;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server as TonicServer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

use auth::password::run_blocking;
use auth::{
    Access, AccessPolicy, InMemoryUserStore, PasswordHasher, PasswordPolicy, TokenManager, User, UserStore,
};
use catalog::CatalogServices;
use error::{AuthResult, StartupError};
use grpc::proto::auth_service_server::AuthServiceServer;
use grpc::proto::laptop_service_server::LaptopServiceServer;
use grpc::{AuthServiceImpl, LaptopServiceImpl};
use grpc::methods;
use middleware::{AuthInterceptor, AuthLayer};
use telemetry::MetricsState;

/// Accounts created at startup when demo seeding is enabled.
pub const DEMO_USERS: &[(&str, &str, &str)] =
    &[("admin1", "secret", "admin"), ("user1", "secret", "user")];

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<TokenManager>,
    pub interceptor: AuthInterceptor,
    pub catalog: CatalogServices,
    pub password_hasher: PasswordHasher,
    pub password_policy: PasswordPolicy,
    pub max_image_size: usize,
    pub metrics: MetricsState,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, StartupError> {
        let policy = match &config.security.access_policy_file {
            Some(path) => {
                let policy = AccessPolicy::from_file(path)?;
                info!(path = %path, methods = policy.len(), "Loaded access policy");
                policy
            }
            None => grpc::default_access_policy(),
        };

        Self::with_policy(config, policy)
    }

    /// Login is always reachable, whatever `policy` lists for it.
    pub fn with_policy(config: &Config, policy: AccessPolicy) -> Result<Self, StartupError> {
        let ttl = Duration::from_secs(config.token.ttl_secs);
        let tokens = match &config.token.secret {
            Some(secret) => TokenManager::new(secret.as_bytes(), ttl)?,
            None => {
                warn!("TOKEN_SECRET not set, using a random signing key");
                TokenManager::generate(ttl)
            }
        };
        let tokens = match &config.token.issuer {
            Some(issuer) => tokens.with_issuer(issuer.clone()),
            None => tokens,
        };
        let tokens = Arc::new(tokens);

        if matches!(policy.roles_for(methods::LOGIN), Access::Restricted(_)) {
            warn!(method = methods::LOGIN, "Access policy lists Login, ignoring that entry");
        }
        let interceptor =
            AuthInterceptor::new(tokens.clone(), Arc::new(policy)).exempt(methods::LOGIN);

        Ok(Self {
            users: Arc::new(InMemoryUserStore::new()),
            interceptor,
            tokens,
            catalog: CatalogServices::new(),
            password_hasher: PasswordHasher::new(config.security.password_hash_cost),
            password_policy: PasswordPolicy::new(config.security.min_password_length),
            max_image_size: config.catalog.max_image_size,
            metrics: MetricsState::new(config.telemetry.metrics_enabled),
        })
    }
}

/// Registers [`DEMO_USERS`] in the store.
pub async fn seed_demo_users(state: &AppState) -> AuthResult<()> {
    for &(username, password, role) in DEMO_USERS {
        let hasher = state.password_hasher;
        let user = run_blocking(move || User::new(username, password, role, &hasher)).await?;
        state.users.save(user).await?;
        info!(username, role, "Seeded demo user");
    }
    Ok(())
}

/// Serves both gRPC services on `listener` until `shutdown` resolves.
pub async fn serve_grpc<F>(
    state: &AppState,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send,
{
    let auth_service = AuthServiceImpl::new(
        state.users.clone(),
        state.tokens.clone(),
        state.password_hasher,
        state.password_policy.clone(),
    )?;
    let laptop_service = LaptopServiceImpl::new(state.catalog.clone(), state.max_image_size);
    let auth_layer = AuthLayer::new(
        state.interceptor.clone(),
        methods::STREAMING.iter().copied(),
    );

    TonicServer::builder()
        .layer(TraceLayer::new_for_grpc())
        .layer(auth_layer)
        .add_service(AuthServiceServer::new(auth_service))
        .add_service(LaptopServiceServer::new(laptop_service))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;

    Ok(())
}

/// HTTP side router: health and Prometheus metrics.
pub fn create_http_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let metrics_state = state.metrics.clone();

    Router::new()
        .route("/health", get(handlers::health::health_check_simple))
        .route("/health/status", get(handlers::health::health_check))
        .route(
            "/metrics",
            get(telemetry::metrics::metrics_handler).with_state(metrics_state),
        )
        .with_state(state)
        .fallback(fallback_handler)
        .layer(trace_layer)
}

async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Not found", "code": "NOT_FOUND"})),
    )
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}

pub use telemetry::shutdown_telemetry;

pub use config::Config;
