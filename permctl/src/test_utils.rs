//! Shared helpers for building a fully wired test server.
//!
//! Tests run the real router over the in-memory store backend, so the whole
//! HTTP stack (extractors, handlers, error mapping) is exercised without a
//! database.

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;

use crate::config::Config;
use crate::managed::ManagedInstanceService;
use crate::store::in_memory::InMemoryStore;
use crate::{build_router, AppState};

/// Default configuration used by tests.
pub fn create_test_config() -> Config {
    Config::default()
}

/// Build a test server over the given in-memory store, optionally wired to a
/// managed-instance oracle.
pub async fn create_test_server(
    store: Arc<InMemoryStore>,
    managed: Option<Arc<dyn ManagedInstanceService>>,
) -> TestServer {
    let state = AppState::builder()
        .components(store.clone())
        .permissions(store.clone())
        .users(store)
        .maybe_managed(managed)
        .config(create_test_config())
        .build();

    let router = build_router(&state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// Proxy auth header for the given login, matching the test config's
/// default header name.
pub fn auth_header(login: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-forwarded-login"),
        HeaderValue::from_str(login).expect("valid header value"),
    )
}
