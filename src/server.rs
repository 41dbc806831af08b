use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::config::{AppConfig, Environment};
use crate::database::{HelpdeskStore, MySqlStore};
use crate::error::ApiError;
use crate::handlers::{protected, public};
use crate::middleware::{optional_auth, rate_limit, require_auth, ApiRateLimiter};
use crate::services::{AuthService, TicketIntake, TicketNumberSource};

/// Shared handles passed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn HelpdeskStore>,
    pub auth: Arc<AuthService>,
    pub intake: Arc<TicketIntake>,
    pub limiter: Arc<ApiRateLimiter>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn HelpdeskStore>) -> Self {
        let intake = TicketIntake::new(store.clone());
        Self::assemble(config, store, intake)
    }

    /// State whose ticket numbers come from `numbers`
    pub fn with_numbers(config: AppConfig, store: Arc<dyn HelpdeskStore>, numbers: Arc<dyn TicketNumberSource>) -> Self {
        let intake = TicketIntake::with_numbers(store.clone(), numbers);
        Self::assemble(config, store, intake)
    }

    fn assemble(config: AppConfig, store: Arc<dyn HelpdeskStore>, intake: TicketIntake) -> Self {
        let auth = AuthService::new(store.clone(), config.security.clone());
        let limiter = ApiRateLimiter::from_config(&config.api);
        Self {
            config: Arc::new(config),
            store,
            auth: Arc::new(auth),
            intake: Arc::new(intake),
            limiter: Arc::new(limiter),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let body_limit = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config);

    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/api/tickets.json", post(public::legacy_create))
        .merge(api_v1_routes(state.clone()))
        .fallback(endpoint_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Everything under `/api/v1`, behind the per-address rate limit
fn api_v1_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(auth_public_routes())
        .merge(catalog_routes(state.clone()))
        .merge(protected_routes(state.clone()))
        .route_layer(middleware::from_fn_with_state(state, rate_limit))
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/refresh", post(auth::refresh))
}

/// Topic and FAQ browsing works anonymously; staff callers see more.
fn catalog_routes(state: AppState) -> Router<AppState> {
    use public::{faq, topics};

    Router::new()
        .route("/api/v1/topics", get(topics::list))
        .route("/api/v1/topics/:id", get(topics::get))
        .route("/api/v1/faq", get(faq::list))
        .route("/api/v1/faq/categories", get(faq::categories))
        .route("/api/v1/faq/:id", get(faq::get))
        .route_layer(middleware::from_fn_with_state(state, optional_auth))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::{departments, organizations, session, sla, staff, system, tasks, teams, tickets, users};

    Router::new()
        .route("/api/v1/auth/me", get(session::me))
        .route("/api/v1/auth/logout", post(session::logout))
        .route("/api/v1/tickets", get(tickets::list).post(tickets::create))
        .route("/api/v1/tickets/:id", get(tickets::get).put(tickets::update))
        .route("/api/v1/tickets/:id/thread", get(tickets::thread))
        .route("/api/v1/tickets/:id/events", get(tickets::events))
        .route("/api/v1/tickets/:id/reply", post(tickets::reply))
        .route("/api/v1/tickets/:id/note", post(tickets::note))
        .route("/api/v1/departments", get(departments::list))
        .route("/api/v1/departments/:id", get(departments::get))
        .route("/api/v1/departments/:id/staff", get(departments::staff))
        .route("/api/v1/departments/:id/tickets", get(departments::tickets))
        .route("/api/v1/users", get(users::list))
        .route("/api/v1/users/:id", get(users::get))
        .route("/api/v1/users/:id/tickets", get(users::tickets))
        .route("/api/v1/users/:id/organizations", get(users::organizations))
        .route("/api/v1/staff", get(staff::list))
        .route("/api/v1/staff/:id", get(staff::get))
        .route("/api/v1/staff/:id/tickets", get(staff::tickets))
        .route("/api/v1/staff/:id/departments", get(staff::departments))
        .route("/api/v1/staff/:id/teams", get(staff::teams))
        .route("/api/v1/teams", get(teams::list))
        .route("/api/v1/teams/:id", get(teams::get))
        .route("/api/v1/teams/:id/members", get(teams::members))
        .route("/api/v1/organizations", get(organizations::list))
        .route("/api/v1/organizations/:id", get(organizations::get))
        .route("/api/v1/organizations/:id/users", get(organizations::users))
        .route("/api/v1/organizations/:id/tickets", get(organizations::tickets))
        .route("/api/v1/sla", get(sla::list))
        .route("/api/v1/sla/:id", get(sla::get))
        .route("/api/v1/tasks", get(tasks::list))
        .route("/api/v1/tasks/:id", get(tasks::get))
        .route("/api/v1/tasks/:id/thread", get(tasks::thread))
        .route("/api/v1/statuses", get(system::statuses))
        .route("/api/v1/priorities", get(system::priorities))
        .route("/api/v1/system/config", get(system::config))
        .route("/api/v1/system/stats", get(system::stats))
        .route("/api/v1/cron", post(system::cron))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.security.enable_cors || config.environment == Environment::Development {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static("x-api-key"),
        ])
}

async fn endpoint_not_found() -> ApiError {
    ApiError::not_found("Endpoint not found")
}

/// Open the database, bind and serve until SIGINT/SIGTERM, then close the pool.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;
    info!("Starting helpdesk API in {:?} mode", config.environment);

    let store: Arc<dyn HelpdeskStore> = Arc::new(MySqlStore::connect(&config.database).await?);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::new(config, store.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    info!("Helpdesk API listening on http://{}", bind_addr);

    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    info!("Database pool closed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
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
