//! HTTP API surface: request/response models, handlers, and OpenAPI docs.

use utoipa::OpenApi;

pub mod handlers;
pub mod models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "permctl API",
        description = "Group permission administration API. All endpoints require a login injected by the upstream SSO proxy."
    ),
    paths(handlers::permissions::search_groups),
    components(schemas(
        models::permissions::GroupPermissionsResponse,
        models::pagination::PaginatedResponse<models::permissions::GroupPermissionsResponse>,
    )),
    tags(
        (name = "permissions", description = "Group permission queries")
    )
)]
pub struct ApiDoc;
