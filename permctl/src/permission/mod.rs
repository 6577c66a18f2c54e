//! Group permission queries.
//!
//! Answers one question: for a given scope, which groups hold which
//! permissions, filtered by an optional permission key and an optional
//! free-text name query, as a deterministically ordered page.
//!
//! Candidate selection depends on which filters are present:
//!
//! - permission only: groups holding that permission in scope, plus the
//!   virtual Anyone group if it holds it.
//! - text query only: every group whose name contains the query
//!   (case-insensitive), whether or not it holds anything; Anyone is included
//!   iff the literal name "Anyone" matches the query.
//! - both: the intersection — groups holding the permission whose name also
//!   matches.
//! - neither: groups holding at least one permission in scope, plus Anyone if
//!   it holds any.
//!
//! Selected groups always report their full permission set in scope,
//! independent of the permission filter. Unknown permission keys are not an
//! error; they simply match no grants.

use std::collections::{BTreeSet, HashMap};

use crate::store::{GrantHolder, Group, PermissionStore, Scope};
use crate::types::GroupId;

use crate::store::errors::Result;

/// Display name of the virtual everyone-group.
pub const ANYONE: &str = "Anyone";

/// A group reference in query results: either the virtual Anyone group or a
/// real stored group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRef {
    Anyone,
    Group(Group),
}

impl GroupRef {
    pub fn name(&self) -> &str {
        match self {
            GroupRef::Anyone => ANYONE,
            GroupRef::Group(group) => &group.name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            GroupRef::Anyone => None,
            GroupRef::Group(group) => group.description.as_deref(),
        }
    }

    /// Uuid of the underlying stored group; `None` for Anyone.
    pub fn uuid(&self) -> Option<GroupId> {
        match self {
            GroupRef::Anyone => None,
            GroupRef::Group(group) => Some(group.uuid),
        }
    }
}

/// Filters and pagination for a group permission query.
///
/// `page` is 1-indexed; both values are expected to be validated and clamped
/// by the caller before the query runs.
#[derive(Debug, Clone)]
pub struct PermissionQuery {
    pub permission: Option<String>,
    pub text_query: Option<String>,
    pub page: i64,
    pub page_size: i64,
}

/// One selected group with its full permission set in scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupWithPermissions {
    pub group: GroupRef,
    pub permissions: BTreeSet<String>,
}

/// One page of query results. `total` counts the whole filtered set, not the
/// page, so a page beyond the end is empty but keeps the real total.
#[derive(Debug, Clone)]
pub struct GroupsPage {
    pub total: i64,
    pub groups: Vec<GroupWithPermissions>,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Run a group permission query against one scope.
pub async fn search(
    store: &dyn PermissionStore,
    scope: &Scope,
    query: &PermissionQuery,
) -> Result<GroupsPage> {
    let grants = store.grants_for(scope).await?;

    let mut group_permissions: HashMap<GroupId, BTreeSet<String>> = HashMap::new();
    let mut anyone_permissions: BTreeSet<String> = BTreeSet::new();
    for grant in grants {
        match grant.holder {
            GrantHolder::Anyone => {
                anyone_permissions.insert(grant.permission);
            }
            GrantHolder::Group(uuid) => {
                group_permissions.entry(uuid).or_default().insert(grant.permission);
            }
        }
    }

    // Text query narrows the stored-group universe up front
    let groups = match &query.text_query {
        Some(text) => store.groups_by_name_containing(text).await?,
        None => store.all_groups().await?,
    };

    let anyone_matches_text = query
        .text_query
        .as_deref()
        .is_none_or(|text| contains_ignore_case(ANYONE, text));

    let mut candidates: Vec<GroupWithPermissions> = Vec::new();

    match &query.permission {
        Some(permission) => {
            for group in groups {
                let permissions = group_permissions.remove(&group.uuid).unwrap_or_default();
                if permissions.contains(permission) {
                    candidates.push(GroupWithPermissions {
                        group: GroupRef::Group(group),
                        permissions,
                    });
                }
            }
            if anyone_permissions.contains(permission) && anyone_matches_text {
                candidates.push(GroupWithPermissions {
                    group: GroupRef::Anyone,
                    permissions: anyone_permissions,
                });
            }
        }
        None if query.text_query.is_some() => {
            for group in groups {
                let permissions = group_permissions.remove(&group.uuid).unwrap_or_default();
                candidates.push(GroupWithPermissions {
                    group: GroupRef::Group(group),
                    permissions,
                });
            }
            if anyone_matches_text {
                candidates.push(GroupWithPermissions {
                    group: GroupRef::Anyone,
                    permissions: anyone_permissions,
                });
            }
        }
        None => {
            for group in groups {
                let permissions = group_permissions.remove(&group.uuid).unwrap_or_default();
                if !permissions.is_empty() {
                    candidates.push(GroupWithPermissions {
                        group: GroupRef::Group(group),
                        permissions,
                    });
                }
            }
            if !anyone_permissions.is_empty() {
                candidates.push(GroupWithPermissions {
                    group: GroupRef::Anyone,
                    permissions: anyone_permissions,
                });
            }
        }
    }

    // Groups holding something sort before empty-handed matches; Anyone leads
    // its tier; names break ties case-insensitively.
    candidates.sort_by(|a, b| {
        let key = |entry: &GroupWithPermissions| {
            (
                entry.permissions.is_empty(),
                !matches!(entry.group, GroupRef::Anyone),
                entry.group.name().to_lowercase(),
            )
        };
        key(a).cmp(&key(b))
    });

    let total = candidates.len() as i64;
    // Saturating: extreme page values must land on an empty page, not overflow
    let offset = (query.page - 1).saturating_mul(query.page_size);
    let groups = candidates
        .into_iter()
        .skip(usize::try_from(offset.max(0)).unwrap_or(usize::MAX))
        .take(query.page_size as usize)
        .collect();

    Ok(GroupsPage { total, groups })
}
