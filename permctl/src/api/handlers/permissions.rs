//! Group permission query endpoints.

use axum::extract::{Query, State};
use axum::Json;
use uuid::Uuid;

use crate::api::models::pagination::PaginatedResponse;
use crate::api::models::permissions::{GroupPermissionsResponse, GroupsSearchQuery};
use crate::auth::CurrentUser;
use crate::errors::{Error, Result};
use crate::managed::ManagedError;
use crate::permission::{self, PermissionQuery};
use crate::store::{Component, Scope};
use crate::AppState;

/// Resolve the optional project selector into a scope.
///
/// Exactly one of `project_id` / `project_key` may be given; neither means
/// the global scope. A selector that matches nothing, or matches a branch,
/// is reported as not found.
async fn resolve_scope(
    state: &AppState,
    project_id: Option<&str>,
    project_key: Option<&str>,
) -> Result<Option<Component>> {
    let component = match (project_id, project_key) {
        (Some(_), Some(_)) => {
            return Err(Error::BadRequest {
                message: "Project id and project key can't be provided at the same time".to_string(),
            });
        }
        (Some(id), None) => {
            let component = match Uuid::parse_str(id) {
                Ok(uuid) => state.components.by_uuid(uuid).await?,
                Err(_) => None,
            };
            let component = component
                .filter(Component::is_root)
                .ok_or_else(|| Error::NotFound {
                    resource: "Project id".to_string(),
                    id: id.to_string(),
                })?;
            Some(component)
        }
        (None, Some(key)) => {
            let component = state
                .components
                .by_key(key)
                .await?
                .filter(Component::is_root)
                .ok_or_else(|| Error::NotFound {
                    resource: "Project key".to_string(),
                    id: key.to_string(),
                })?;
            Some(component)
        }
        (None, None) => None,
    };
    Ok(component)
}

/// Reject callers without admin rights on the resolved scope.
async fn check_admin_rights(
    state: &AppState,
    current_user: &CurrentUser,
    component: Option<&Component>,
) -> Result<()> {
    if current_user.global_admin {
        return Ok(());
    }
    if let Some(component) = component {
        if state
            .users
            .is_project_admin(current_user.id, component.uuid)
            .await?
        {
            return Ok(());
        }
        return Err(Error::InsufficientPermissions {
            action: "administer".to_string(),
            resource: format!("project '{}'", component.key),
        });
    }
    Err(Error::InsufficientPermissions {
        action: "administer".to_string(),
        resource: "instance".to_string(),
    })
}

/// Search groups and the permissions they hold
#[utoipa::path(
    get,
    path = "/permissions/groups",
    tag = "permissions",
    summary = "Search groups and their permissions",
    description = "Returns a paginated list of groups with the permissions they hold in the global scope or in a single project/portfolio. Requires admin rights on the queried scope.",
    params(GroupsSearchQuery),
    responses(
        (status = 200, description = "Matching groups with their permissions", body = PaginatedResponse<GroupPermissionsResponse>),
        (status = 400, description = "Conflicting project selectors"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing admin rights on the queried scope"),
        (status = 404, description = "Project not found"),
        (status = 502, description = "Managed instance unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn search_groups(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<GroupsSearchQuery>,
) -> Result<Json<PaginatedResponse<GroupPermissionsResponse>>> {
    let component = resolve_scope(
        &state,
        query.project_id.as_deref(),
        query.project_key.as_deref(),
    )
    .await?;

    check_admin_rights(&state, &current_user, component.as_ref()).await?;

    let scope = match &component {
        Some(component) => Scope::Component(component.uuid),
        None => Scope::Global,
    };

    let (page, page_size) = query.pagination.params();
    let result = permission::search(
        state.permissions.as_ref(),
        &scope,
        &PermissionQuery {
            permission: query.permission,
            text_query: query.q,
            page,
            page_size,
        },
    )
    .await?;

    // One oracle round-trip per page; Anyone has no uuid and is skipped
    let managed_statuses = match &state.managed {
        Some(oracle) => {
            let uuids: Vec<_> = result.groups.iter().filter_map(|g| g.group.uuid()).collect();
            Some(oracle.group_uuid_to_managed(&uuids).await?)
        }
        None => None,
    };

    let mut data = Vec::with_capacity(result.groups.len());
    for entry in result.groups {
        let managed = match (&managed_statuses, entry.group.uuid()) {
            // The oracle must answer for every uuid it was asked about; a
            // missing entry is a broken response, not an unmanaged group
            (Some(statuses), Some(uuid)) => {
                Some(statuses.get(&uuid).copied().ok_or_else(|| {
                    ManagedError::Unavailable(format!(
                        "no managed status returned for group '{uuid}'"
                    ))
                })?)
            }
            _ => None,
        };
        data.push(GroupPermissionsResponse::from_result(entry, managed));
    }

    Ok(Json(PaginatedResponse::new(data, result.total, page, page_size)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managed::{ManagedError, ManagedInstanceService, StaticManagedInstanceService};
    use crate::store::in_memory::InMemoryStore;
    use crate::store::{GrantHolder, Qualifier};
    use crate::test_utils::{auth_header, create_test_server};
    use crate::types::GroupId;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use std::collections::HashMap;
    use std::sync::Arc;

    const GROUPS_URL: &str = "/admin/api/v1/permissions/groups";

    struct FailingOracle;

    #[async_trait]
    impl ManagedInstanceService for FailingOracle {
        async fn group_uuid_to_managed(
            &self,
            _group_uuids: &[GroupId],
        ) -> std::result::Result<HashMap<GroupId, bool>, ManagedError> {
            Err(ManagedError::Unavailable("connection refused".to_string()))
        }
    }

    /// Succeeds but leaves every requested uuid out of its answer.
    struct SilentOracle;

    #[async_trait]
    impl ManagedInstanceService for SilentOracle {
        async fn group_uuid_to_managed(
            &self,
            _group_uuids: &[GroupId],
        ) -> std::result::Result<HashMap<GroupId, bool>, ManagedError> {
            Ok(HashMap::new())
        }
    }

    /// Store with an admin user plus the three-group global scan fixture.
    fn scan_fixture() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.insert_user("admin", true);
        let g1 = store.insert_group("group-1-name", Some("first group"));
        let g2 = store.insert_group("group-2-name", None);
        let g3 = store.insert_group("group-3-name", None);
        store.grant_global(GrantHolder::Group(g1.uuid), "scan");
        store.grant_global(GrantHolder::Group(g2.uuid), "scan");
        store.grant_global(GrantHolder::Group(g3.uuid), "admin");
        store.grant_global(GrantHolder::Anyone, "scan");
        store
    }

    async fn get_as(
        server: &TestServer,
        login: &str,
        url: &str,
    ) -> axum_test::TestResponse {
        let (name, value) = auth_header(login);
        server.get(url).add_header(name, value).await
    }

    #[test_log::test(tokio::test)]
    async fn test_anonymous_is_unauthorized() {
        let server = create_test_server(scan_fixture(), None).await;
        let response = server.get(GROUPS_URL).await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_unknown_login_is_unauthorized() {
        let server = create_test_server(scan_fixture(), None).await;
        let response = get_as(&server, "ghost", GROUPS_URL).await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert!(response.text().contains("ghost"));
    }

    #[test_log::test(tokio::test)]
    async fn test_non_admin_is_forbidden_globally() {
        let store = scan_fixture();
        store.insert_user("plain", false);
        let server = create_test_server(store, None).await;

        let response = get_as(&server, "plain", GROUPS_URL).await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    }

    #[test_log::test(tokio::test)]
    async fn test_global_scan_ordering_and_total() {
        let server = create_test_server(scan_fixture(), None).await;

        let response = get_as(&server, "admin", &format!("{GROUPS_URL}?permission=scan")).await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: PaginatedResponse<GroupPermissionsResponse> = response.json();
        assert_eq!(body.total, 3);
        assert_eq!(body.page, 1);
        assert_eq!(body.page_size, 20);

        let names: Vec<&str> = body.data.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Anyone", "group-1-name", "group-2-name"]);
        assert_eq!(body.data[1].description.as_deref(), Some("first group"));
        assert_eq!(body.data[1].permissions, vec!["scan"]);
    }

    #[test_log::test(tokio::test)]
    async fn test_pagination_via_string_params() {
        let server = create_test_server(scan_fixture(), None).await;

        let response = get_as(
            &server,
            "admin",
            &format!("{GROUPS_URL}?permission=scan&page=3&page_size=1"),
        )
        .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: PaginatedResponse<GroupPermissionsResponse> = response.json();
        assert_eq!(body.total, 3);
        assert_eq!(body.page, 3);
        assert_eq!(body.page_size, 1);
        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0].name, "group-2-name");
    }

    #[test_log::test(tokio::test)]
    async fn test_page_beyond_range_is_empty() {
        let server = create_test_server(scan_fixture(), None).await;

        let response = get_as(
            &server,
            "admin",
            &format!("{GROUPS_URL}?permission=scan&page=10"),
        )
        .await;
        let body: PaginatedResponse<GroupPermissionsResponse> = response.json();
        assert_eq!(body.total, 3);
        assert!(body.data.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_conflicting_project_selectors_are_rejected() {
        let store = scan_fixture();
        let project = store.insert_component("proj", "Project", Qualifier::Project);
        let server = create_test_server(store, None).await;

        let response = get_as(
            &server,
            "admin",
            &format!("{GROUPS_URL}?project_id={}&project_key=proj", project.uuid),
        )
        .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test_log::test(tokio::test)]
    async fn test_unknown_project_id_is_not_found() {
        let server = create_test_server(scan_fixture(), None).await;
        let missing = uuid::Uuid::new_v4();

        let response = get_as(&server, "admin", &format!("{GROUPS_URL}?project_id={missing}")).await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(response.text(), format!("Project id '{missing}' not found"));
    }

    #[test_log::test(tokio::test)]
    async fn test_unknown_project_key_is_not_found() {
        let server = create_test_server(scan_fixture(), None).await;

        let response = get_as(&server, "admin", &format!("{GROUPS_URL}?project_key=nope")).await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(response.text(), "Project key 'nope' not found");
    }

    #[test_log::test(tokio::test)]
    async fn test_branch_id_is_not_found() {
        let store = scan_fixture();
        let branch = store.insert_component("proj:branch", "feature", Qualifier::Branch);
        let server = create_test_server(store, None).await;

        let response = get_as(
            &server,
            "admin",
            &format!("{GROUPS_URL}?project_id={}", branch.uuid),
        )
        .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert!(response.text().contains(&branch.uuid.to_string()));
    }

    #[test_log::test(tokio::test)]
    async fn test_project_admin_rights_are_scoped() {
        let store = scan_fixture();
        let user = store.insert_user("carol", false);
        let project = store.insert_component("proj", "Project", Qualifier::Project);
        let other = store.insert_component("other", "Other", Qualifier::Project);
        store.make_project_admin(user.uuid, project.uuid);
        let group = store.insert_group("project-ops", None);
        store.grant_on(project.uuid, GrantHolder::Group(group.uuid), "issue_admin");
        let server = create_test_server(store, None).await;

        // Admin of the project can query it
        let response = get_as(
            &server,
            "carol",
            &format!("{GROUPS_URL}?project_id={}", project.uuid),
        )
        .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: PaginatedResponse<GroupPermissionsResponse> = response.json();
        assert_eq!(body.total, 1);
        assert_eq!(body.data[0].name, "project-ops");
        assert_eq!(body.data[0].permissions, vec!["issue_admin"]);

        // But not other projects, and not the global scope
        let response = get_as(
            &server,
            "carol",
            &format!("{GROUPS_URL}?project_id={}", other.uuid),
        )
        .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

        let response = get_as(&server, "carol", GROUPS_URL).await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    }

    #[test_log::test(tokio::test)]
    async fn test_portfolio_scope_by_key() {
        let store = scan_fixture();
        let portfolio = store.insert_component("folio", "Portfolio", Qualifier::Portfolio);
        let group = store.insert_group("viewers", None);
        store.grant_on(portfolio.uuid, GrantHolder::Group(group.uuid), "user");
        let server = create_test_server(store, None).await;

        let response = get_as(&server, "admin", &format!("{GROUPS_URL}?project_key=folio")).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: PaginatedResponse<GroupPermissionsResponse> = response.json();
        assert_eq!(body.total, 1);
        assert_eq!(body.data[0].name, "viewers");
    }

    #[test_log::test(tokio::test)]
    async fn test_managed_status_per_page() {
        let store = scan_fixture();
        let managed_group = store.group_by_name("group-1-name").expect("fixture group");
        let oracle = Arc::new(StaticManagedInstanceService::new([managed_group.uuid]));
        let server = create_test_server(store, Some(oracle)).await;

        let response = get_as(&server, "admin", &format!("{GROUPS_URL}?permission=scan")).await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: PaginatedResponse<GroupPermissionsResponse> = response.json();
        // Anyone never carries a managed flag
        assert_eq!(body.data[0].name, "Anyone");
        assert_eq!(body.data[0].managed, None);
        assert_eq!(body.data[1].managed, Some(true));
        assert_eq!(body.data[2].managed, Some(false));
    }

    #[test_log::test(tokio::test)]
    async fn test_no_oracle_omits_managed_field() {
        let server = create_test_server(scan_fixture(), None).await;

        let response = get_as(&server, "admin", &format!("{GROUPS_URL}?permission=scan")).await;
        let body: serde_json::Value = response.json();
        let first_group = &body["data"][1];
        assert_eq!(first_group["name"], "group-1-name");
        assert!(first_group.get("managed").is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_oracle_failure_aborts_request() {
        let server = create_test_server(scan_fixture(), Some(Arc::new(FailingOracle))).await;

        let response = get_as(&server, "admin", &format!("{GROUPS_URL}?permission=scan")).await;
        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test_log::test(tokio::test)]
    async fn test_oracle_omitting_groups_aborts_request() {
        let server = create_test_server(scan_fixture(), Some(Arc::new(SilentOracle))).await;

        let response = get_as(&server, "admin", &format!("{GROUPS_URL}?permission=scan")).await;
        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test_log::test(tokio::test)]
    async fn test_huge_page_param_returns_empty_page() {
        let server = create_test_server(scan_fixture(), None).await;

        let response = get_as(
            &server,
            "admin",
            &format!("{GROUPS_URL}?permission=scan&page={}", i64::MAX),
        )
        .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: PaginatedResponse<GroupPermissionsResponse> = response.json();
        assert_eq!(body.total, 3);
        assert!(body.data.is_empty());
    }
}
