use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::instrument;

use crate::errors::{Error, Result};
use crate::types::UserId;
use crate::AppState;

/// The authenticated caller, resolved from the proxy login header.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub login: String,
    pub name: Option<String>,
    pub global_admin: bool,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let header_name = &state.config.auth.proxy_header.header_name;
        let login = parts
            .headers
            .get(header_name.as_str())
            .and_then(|h| h.to_str().ok())
            .ok_or(Error::Unauthenticated { message: None })?;

        let user = state
            .users
            .user_by_login(login)
            .await?
            .ok_or_else(|| Error::Unauthenticated {
                message: Some(format!("Unknown user '{login}'")),
            })?;

        Ok(CurrentUser {
            id: user.uuid,
            login: user.login,
            name: user.name,
            global_admin: user.global_admin,
        })
    }
}
