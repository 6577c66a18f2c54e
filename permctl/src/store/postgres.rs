//! PostgreSQL storage backend.
//!
//! Queries are runtime-checked and run against the schema in `migrations/`.
//! The Anyone holder is persisted as a NULL `group_uuid` in the
//! `group_permissions` table; a NULL `component_uuid` marks a global grant.

use async_trait::async_trait;
use sqlx::PgPool;
use std::str::FromStr;
use tracing::instrument;
use uuid::Uuid;

use crate::types::{ComponentId, UserId};

use super::errors::{DbError, Result};
use super::{
    Component, ComponentStore, Grant, GrantHolder, Group, PermissionStore, Qualifier, Scope, User,
    UserStore,
};

#[derive(sqlx::FromRow)]
struct GroupRow {
    uuid: Uuid,
    name: String,
    description: Option<String>,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            uuid: row.uuid,
            name: row.name,
            description: row.description,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ComponentRow {
    uuid: Uuid,
    kee: String,
    name: String,
    qualifier: String,
}

impl TryFrom<ComponentRow> for Component {
    type Error = DbError;

    fn try_from(row: ComponentRow) -> Result<Self> {
        let qualifier = Qualifier::from_str(&row.qualifier).map_err(DbError::Other)?;
        Ok(Component {
            uuid: row.uuid,
            key: row.kee,
            name: row.name,
            qualifier,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GrantRow {
    group_uuid: Option<Uuid>,
    permission: String,
}

impl From<GrantRow> for Grant {
    fn from(row: GrantRow) -> Self {
        Grant {
            holder: row.group_uuid.map_or(GrantHolder::Anyone, GrantHolder::Group),
            permission: row.permission,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    uuid: Uuid,
    login: String,
    name: Option<String>,
    global_admin: bool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            uuid: row.uuid,
            login: row.login,
            name: row.name,
            global_admin: row.global_admin,
        }
    }
}

/// PostgreSQL implementation of all store traits.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self), err)]
    pub async fn create_group(&self, name: &str, description: Option<&str>) -> Result<Group> {
        let row = sqlx::query_as::<_, GroupRow>(
            "INSERT INTO groups (name, description) VALUES ($1, $2) RETURNING uuid, name, description",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    #[instrument(skip(self), err)]
    pub async fn create_component(
        &self,
        key: &str,
        name: &str,
        qualifier: Qualifier,
    ) -> Result<Component> {
        let row = sqlx::query_as::<_, ComponentRow>(
            "INSERT INTO components (kee, name, qualifier) VALUES ($1, $2, $3) RETURNING uuid, kee, name, qualifier",
        )
        .bind(key)
        .bind(name)
        .bind(qualifier.as_str())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    #[instrument(skip(self), err)]
    pub async fn create_user(
        &self,
        login: &str,
        name: Option<&str>,
        global_admin: bool,
    ) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (login, name, global_admin) VALUES ($1, $2, $3) RETURNING uuid, login, name, global_admin",
        )
        .bind(login)
        .bind(name)
        .bind(global_admin)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    /// Record a grant. Idempotent: re-granting an existing permission is a no-op.
    #[instrument(skip(self), err)]
    pub async fn insert_grant(
        &self,
        scope: &Scope,
        holder: &GrantHolder,
        permission: &str,
    ) -> Result<()> {
        let component_uuid = match scope {
            Scope::Global => None,
            Scope::Component(uuid) => Some(*uuid),
        };
        let group_uuid = match holder {
            GrantHolder::Anyone => None,
            GrantHolder::Group(uuid) => Some(*uuid),
        };
        sqlx::query(
            "INSERT INTO group_permissions (group_uuid, component_uuid, permission)
             VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(group_uuid)
        .bind(component_uuid)
        .bind(permission)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn insert_project_admin(&self, user: UserId, component: ComponentId) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_project_admins (user_uuid, component_uuid)
             VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(user)
        .bind(component)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ComponentStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn by_uuid(&self, uuid: ComponentId) -> Result<Option<Component>> {
        let row = sqlx::query_as::<_, ComponentRow>(
            "SELECT uuid, kee, name, qualifier FROM components WHERE uuid = $1",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Component::try_from).transpose()
    }

    #[instrument(skip(self), err)]
    async fn by_key(&self, key: &str) -> Result<Option<Component>> {
        let row = sqlx::query_as::<_, ComponentRow>(
            "SELECT uuid, kee, name, qualifier FROM components WHERE kee = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Component::try_from).transpose()
    }
}

#[async_trait]
impl PermissionStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn grants_for(&self, scope: &Scope) -> Result<Vec<Grant>> {
        let rows: Vec<GrantRow> = match scope {
            Scope::Global => {
                sqlx::query_as(
                    "SELECT group_uuid, permission FROM group_permissions WHERE component_uuid IS NULL",
                )
                .fetch_all(&self.pool)
                .await?
            }
            Scope::Component(uuid) => {
                sqlx::query_as(
                    "SELECT group_uuid, permission FROM group_permissions WHERE component_uuid = $1",
                )
                .bind(uuid)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.into_iter().map(Grant::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn groups_by_name_containing(&self, text: &str) -> Result<Vec<Group>> {
        // Escape LIKE metacharacters so user input is matched literally
        let escaped = text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let rows: Vec<GroupRow> = sqlx::query_as(
            "SELECT uuid, name, description FROM groups
             WHERE LOWER(name) LIKE $1 ESCAPE '\\'
             ORDER BY name",
        )
        .bind(format!("%{}%", escaped.to_lowercase()))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Group::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn all_groups(&self) -> Result<Vec<Group>> {
        let rows: Vec<GroupRow> =
            sqlx::query_as("SELECT uuid, name, description FROM groups ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Group::from).collect())
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn user_by_login(&self, login: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT uuid, login, name, global_admin FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    #[instrument(skip(self), err)]
    async fn is_project_admin(&self, user: UserId, component: ComponentId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_project_admins WHERE user_uuid = $1 AND component_uuid = $2)",
        )
        .bind(user)
        .bind(component)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
