//! Storage abstractions for groups, components, users, and permission grants.
//!
//! The web layer only talks to the trait objects defined here. Two backends
//! implement them: [`postgres::PostgresStore`] for deployments and
//! [`in_memory::InMemoryStore`] for tests and embedded use. Both backends
//! implement every trait, so a single store value can be shared across all
//! `AppState` slots.

use async_trait::async_trait;
use std::str::FromStr;

use crate::types::{ComponentId, GroupId, UserId};

pub mod errors;
pub mod in_memory;
pub mod postgres;

pub use errors::{DbError, Result};

/// A user group. Names are unique per instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub uuid: GroupId,
    pub name: String,
    pub description: Option<String>,
}

/// What kind of component a row represents.
///
/// Only root components (projects and portfolios) carry their own permission
/// scope; branches belong to their parent project and are not valid scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Project,
    Portfolio,
    Branch,
}

impl Qualifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Qualifier::Project => "project",
            Qualifier::Portfolio => "portfolio",
            Qualifier::Branch => "branch",
        }
    }
}

impl FromStr for Qualifier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "project" => Ok(Qualifier::Project),
            "portfolio" => Ok(Qualifier::Portfolio),
            "branch" => Ok(Qualifier::Branch),
            other => Err(anyhow::anyhow!("unknown component qualifier: {other}")),
        }
    }
}

/// A project, portfolio, or branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub uuid: ComponentId,
    pub key: String,
    pub name: String,
    pub qualifier: Qualifier,
}

impl Component {
    /// Whether this component can carry its own permission scope.
    pub fn is_root(&self) -> bool {
        !matches!(self.qualifier, Qualifier::Branch)
    }
}

/// Who holds a permission grant.
///
/// `Anyone` is the virtual everyone-group: it has no stored row and no uuid,
/// and is represented in the grants table by a NULL group reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantHolder {
    Anyone,
    Group(GroupId),
}

/// A single permission grant effective within one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub holder: GrantHolder,
    pub permission: String,
}

/// The permission scope a query runs against: the whole instance, or a
/// single root component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Component(ComponentId),
}

/// An account that can call the management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub uuid: UserId,
    pub login: String,
    pub name: Option<String>,
    pub global_admin: bool,
}

/// Read access to components (projects, portfolios, branches).
#[async_trait]
pub trait ComponentStore: Send + Sync {
    async fn by_uuid(&self, uuid: ComponentId) -> Result<Option<Component>>;
    async fn by_key(&self, key: &str) -> Result<Option<Component>>;
}

/// Read access to groups and permission grants.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// All grants effective in the given scope, Anyone grants included.
    async fn grants_for(&self, scope: &Scope) -> Result<Vec<Grant>>;

    /// Groups whose name contains `text`, case-insensitive, sorted by name.
    async fn groups_by_name_containing(&self, text: &str) -> Result<Vec<Group>>;

    /// Every group, sorted by name.
    async fn all_groups(&self) -> Result<Vec<Group>>;
}

/// User lookup and component-level admin checks.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_by_login(&self, login: &str) -> Result<Option<User>>;
    async fn is_project_admin(&self, user: UserId, component: ComponentId) -> Result<bool>;
}
