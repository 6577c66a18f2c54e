//! # permctl: Group Permission Administration Service
//!
//! `permctl` answers the question administrators of a code-quality analysis
//! platform keep asking: which groups hold which permissions, either across
//! the whole instance or on a single project or portfolio? It exposes one
//! management endpoint (`GET /admin/api/v1/permissions/groups`) returning a
//! paginated, deterministically ordered list of groups annotated with the
//! permissions they hold in the queried scope and, when an external identity
//! provider is configured, whether that provider manages each group.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer. Storage sits behind the trait objects in [`store`], with
//! a PostgreSQL backend for deployments and an in-memory backend used by the
//! test suite and embeddable in single-process setups. The core query logic
//! lives in [`permission`] and is storage-agnostic: it selects candidate
//! groups from the scope's grants and the optional permission/text filters,
//! sorts them (permission holders first, the virtual Anyone group leading its
//! tier, then case-insensitive name), counts the total before pagination,
//! and slices out the requested page.
//!
//! Authentication is delegated to an upstream SSO proxy that injects a login
//! header; see [`auth`]. The optional managed-instance oracle in [`managed`]
//! is queried once per result page.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use permctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = permctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     permctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod managed;
pub mod permission;
pub mod store;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use bon::Builder;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{debug, info, instrument, Level};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

use crate::api::ApiDoc;
use crate::config::CorsOrigin;
use crate::managed::{HttpManagedInstanceService, ManagedInstanceService};
use crate::store::postgres::PostgresStore;
use crate::store::{ComponentStore, PermissionStore, UserStore};

pub use config::Config;
pub use types::{ComponentId, GroupId, UserId};

/// Application state shared across all request handlers.
///
/// Stores are held as trait objects so the same handlers run over PostgreSQL
/// in production and over the in-memory backend in tests. The managed oracle
/// is optional; without it, results carry no managed annotations.
#[derive(Clone, Builder)]
pub struct AppState {
    pub components: Arc<dyn ComponentStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub users: Arc<dyn UserStore>,
    pub managed: Option<Arc<dyn ManagedInstanceService>>,
    pub config: Config,
}

/// Get the permctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial global admin user if it doesn't exist.
///
/// Idempotent: called on every startup, creates the user only on first run.
/// Returns the user id either way.
#[instrument(skip_all)]
pub async fn ensure_admin_user(login: &str, store: &PostgresStore) -> errors::Result<UserId> {
    if let Some(user) = store.user_by_login(login).await? {
        return Ok(user.uuid);
    }
    let user = store.create_user(login, None, true).await?;
    info!(login, "Created initial admin user");
    Ok(user.uuid)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.cors.allow_credentials);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// Mounts the admin API under `/admin/api/v1`, a health probe at `/healthz`,
/// and RapiDoc-rendered OpenAPI docs at `/admin/docs`, then applies CORS and
/// request tracing.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route(
            "/permissions/groups",
            get(api::handlers::permissions::search_groups),
        )
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/admin/api/v1", api_routes)
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/admin/docs"));

    let cors_layer = create_cors_layer(&state.config)?;

    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::DEBUG))
            .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
    );

    Ok(router)
}

/// The assembled service: database pool, router, and bound configuration.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to PostgreSQL, runs
///    migrations, and seeds the initial admin user
/// 2. **Serve**: [`Application::serve`] binds the TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting permission service with configuration: {:#?}", config);

        let database_url = config.database_url.clone().ok_or_else(|| {
            anyhow::anyhow!("database_url is not configured (set database_url or DATABASE_URL)")
        })?;
        let pool = PgPool::connect(&database_url).await?;
        migrator().run(&pool).await?;

        let store = Arc::new(PostgresStore::new(pool.clone()));
        ensure_admin_user(&config.admin_login, store.as_ref())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {e}"))?;

        let managed: Option<Arc<dyn ManagedInstanceService>> = match &config.managed_instance {
            Some(managed_config) => Some(Arc::new(HttpManagedInstanceService::new(managed_config)?)),
            None => None,
        };

        let state = AppState::builder()
            .components(store.clone())
            .permissions(store.clone())
            .users(store)
            .maybe_managed(managed)
            .config(config.clone())
            .build();

        let router = build_router(&state)?;

        Ok(Self {
            router,
            config,
            pool,
        })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Permission service listening on http://{}", bind_addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
