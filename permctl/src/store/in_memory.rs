//! In-memory storage backend.
//!
//! Stores everything in hash maps behind a single `RwLock`. Suitable for
//! tests and single-process embedded deployments; contents are lost on
//! restart. The insert helpers return the created entity so callers can
//! chain uuids into grants without a second lookup.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::{ComponentId, GroupId, UserId};

use super::errors::Result;
use super::{
    Component, ComponentStore, Grant, GrantHolder, Group, PermissionStore, Qualifier, Scope, User,
    UserStore,
};

#[derive(Default)]
struct Inner {
    groups: HashMap<GroupId, Group>,
    components: HashMap<ComponentId, Component>,
    users: HashMap<UserId, User>,
    // (scope component, holder, permission); None scope = global
    grants: Vec<(Option<ComponentId>, GrantHolder, String)>,
    project_admins: HashSet<(UserId, ComponentId)>,
}

/// In-memory implementation of all store traits.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_group(&self, name: &str, description: Option<&str>) -> Group {
        let group = Group {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(String::from),
        };
        self.inner.write().groups.insert(group.uuid, group.clone());
        group
    }

    pub fn insert_component(&self, key: &str, name: &str, qualifier: Qualifier) -> Component {
        let component = Component {
            uuid: Uuid::new_v4(),
            key: key.to_string(),
            name: name.to_string(),
            qualifier,
        };
        self.inner
            .write()
            .components
            .insert(component.uuid, component.clone());
        component
    }

    pub fn insert_user(&self, login: &str, global_admin: bool) -> User {
        let user = User {
            uuid: Uuid::new_v4(),
            login: login.to_string(),
            name: None,
            global_admin,
        };
        self.inner.write().users.insert(user.uuid, user.clone());
        user
    }

    pub fn grant_global(&self, holder: GrantHolder, permission: &str) {
        self.inner
            .write()
            .grants
            .push((None, holder, permission.to_string()));
    }

    pub fn grant_on(&self, component: ComponentId, holder: GrantHolder, permission: &str) {
        self.inner
            .write()
            .grants
            .push((Some(component), holder, permission.to_string()));
    }

    pub fn group_by_name(&self, name: &str) -> Option<Group> {
        self.inner
            .read()
            .groups
            .values()
            .find(|g| g.name == name)
            .cloned()
    }

    pub fn make_project_admin(&self, user: UserId, component: ComponentId) {
        self.inner.write().project_admins.insert((user, component));
    }
}

#[async_trait]
impl ComponentStore for InMemoryStore {
    async fn by_uuid(&self, uuid: ComponentId) -> Result<Option<Component>> {
        Ok(self.inner.read().components.get(&uuid).cloned())
    }

    async fn by_key(&self, key: &str) -> Result<Option<Component>> {
        Ok(self
            .inner
            .read()
            .components
            .values()
            .find(|c| c.key == key)
            .cloned())
    }
}

#[async_trait]
impl PermissionStore for InMemoryStore {
    async fn grants_for(&self, scope: &Scope) -> Result<Vec<Grant>> {
        let wanted = match scope {
            Scope::Global => None,
            Scope::Component(uuid) => Some(*uuid),
        };
        Ok(self
            .inner
            .read()
            .grants
            .iter()
            .filter(|(component, _, _)| *component == wanted)
            .map(|(_, holder, permission)| Grant {
                holder: *holder,
                permission: permission.clone(),
            })
            .collect())
    }

    async fn groups_by_name_containing(&self, text: &str) -> Result<Vec<Group>> {
        let needle = text.to_lowercase();
        let mut groups: Vec<Group> = self
            .inner
            .read()
            .groups
            .values()
            .filter(|g| g.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn all_groups(&self) -> Result<Vec<Group>> {
        let mut groups: Vec<Group> = self.inner.read().groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn user_by_login(&self, login: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .read()
            .users
            .values()
            .find(|u| u.login == login)
            .cloned())
    }

    async fn is_project_admin(&self, user: UserId, component: ComponentId) -> Result<bool> {
        Ok(self.inner.read().project_admins.contains(&(user, component)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_group_name_search_is_case_insensitive() {
        let store = InMemoryStore::new();
        store.insert_group("Sonar-Administrators", None);
        store.insert_group("developers", None);

        let found = store.groups_by_name_containing("SONAR").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Sonar-Administrators");
    }

    #[tokio::test]
    async fn test_grants_are_scoped() {
        let store = InMemoryStore::new();
        let group = store.insert_group("devs", None);
        let project = store.insert_component("proj", "Project", Qualifier::Project);

        store.grant_global(GrantHolder::Group(group.uuid), "scan");
        store.grant_on(project.uuid, GrantHolder::Group(group.uuid), "admin");

        let global = store.grants_for(&Scope::Global).await.unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].permission, "scan");

        let scoped = store
            .grants_for(&Scope::Component(project.uuid))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].permission, "admin");
    }

    #[tokio::test]
    async fn test_component_lookup_by_key_and_uuid() {
        let store = InMemoryStore::new();
        let project = store.insert_component("my-key", "My Project", Qualifier::Project);

        let by_key = store.by_key("my-key").await.unwrap().unwrap();
        assert_eq!(by_key.uuid, project.uuid);

        let by_uuid = store.by_uuid(project.uuid).await.unwrap().unwrap();
        assert_eq!(by_uuid.key, "my-key");

        assert!(store.by_key("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_project_admin_membership() {
        let store = InMemoryStore::new();
        let user = store.insert_user("alice", false);
        let project = store.insert_component("p", "P", Qualifier::Project);
        let other = store.insert_component("q", "Q", Qualifier::Project);

        store.make_project_admin(user.uuid, project.uuid);

        assert!(store.is_project_admin(user.uuid, project.uuid).await.unwrap());
        assert!(!store.is_project_admin(user.uuid, other.uuid).await.unwrap());
    }
}
