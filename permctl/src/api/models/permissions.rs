//! Request and response models for the group permission endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::pagination::Pagination;
use crate::permission::GroupWithPermissions;

/// Query parameters for searching groups and their permissions.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct GroupsSearchQuery {
    /// Only return groups holding this permission in the selected scope
    pub permission: Option<String>,

    /// Project or portfolio uuid selecting a component scope
    pub project_id: Option<String>,

    /// Project or portfolio key selecting a component scope
    pub project_key: Option<String>,

    /// Case-insensitive substring filter on group names
    pub q: Option<String>,

    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// One group with its permissions in the queried scope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupPermissionsResponse {
    /// Group name; the virtual everyone-group is reported as "Anyone"
    pub name: String,

    /// Group description, omitted when the group has none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Every permission the group holds in the queried scope, sorted
    pub permissions: Vec<String>,

    /// Whether the external identity system manages this group. Omitted for
    /// the Anyone group and when no managed instance is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed: Option<bool>,
}

impl GroupPermissionsResponse {
    /// Build from a query result entry plus its resolved managed status.
    pub fn from_result(entry: GroupWithPermissions, managed: Option<bool>) -> Self {
        Self {
            name: entry.group.name().to_string(),
            description: entry.group.description().map(String::from),
            permissions: entry.permissions.into_iter().collect(),
            managed,
        }
    }
}
