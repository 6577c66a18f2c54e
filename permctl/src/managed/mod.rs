//! Managed-instance integration.
//!
//! When group provisioning is delegated to an external identity-management
//! system, query results annotate each real group with whether that system
//! manages it. The oracle is queried once per result page with the page's
//! group uuids; the Anyone group is never sent.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::ManagedInstanceConfig;
use crate::types::GroupId;

#[derive(Error, Debug)]
pub enum ManagedError {
    #[error("managed instance request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("managed instance returned status {0}")]
    Status(StatusCode),

    #[error("managed instance unavailable: {0}")]
    Unavailable(String),
}

/// Oracle answering "is this group provisioned by the external system?".
#[async_trait]
pub trait ManagedInstanceService: Send + Sync {
    /// Resolve managed status for a batch of group uuids. Every requested
    /// uuid is present in the returned map.
    async fn group_uuid_to_managed(
        &self,
        group_uuids: &[GroupId],
    ) -> Result<HashMap<GroupId, bool>, ManagedError>;
}

/// HTTP-backed oracle. Posts the uuid batch as JSON and expects a
/// `{uuid: bool}` object back.
pub struct HttpManagedInstanceService {
    client: reqwest::Client,
    url: Url,
}

impl HttpManagedInstanceService {
    pub fn new(config: &ManagedInstanceConfig) -> Result<Self, ManagedError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl ManagedInstanceService for HttpManagedInstanceService {
    #[instrument(skip_all, fields(count = group_uuids.len()), err)]
    async fn group_uuid_to_managed(
        &self,
        group_uuids: &[GroupId],
    ) -> Result<HashMap<GroupId, bool>, ManagedError> {
        if group_uuids.is_empty() {
            return Ok(HashMap::new());
        }

        let response = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({ "group_uuids": group_uuids }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ManagedError::Status(response.status()));
        }

        Ok(response.json().await?)
    }
}

/// Fixed-answer oracle: groups in the set are managed, everything else is
/// not. Used by tests and single-node setups without an identity provider.
#[derive(Default)]
pub struct StaticManagedInstanceService {
    managed: HashSet<GroupId>,
}

impl StaticManagedInstanceService {
    pub fn new(managed: impl IntoIterator<Item = GroupId>) -> Self {
        Self {
            managed: managed.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ManagedInstanceService for StaticManagedInstanceService {
    async fn group_uuid_to_managed(
        &self,
        group_uuids: &[GroupId],
    ) -> Result<HashMap<GroupId, bool>, ManagedError> {
        Ok(group_uuids
            .iter()
            .map(|uuid| (*uuid, self.managed.contains(uuid)))
            .collect())
    }
}
