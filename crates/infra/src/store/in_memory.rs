use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard};

use async_trait::async_trait;

use restgate_auth::{Method, Resource};
use restgate_core::{AccessError, Grant, GrantCheck, MethodId, ResourceId, UserId};

use super::PermissionStore;
use crate::aggregator::{
    DescribedPermissionRow, PathMethodRow, PermissionIdRow, RowCursor, ScanError,
};

#[derive(Debug, Default)]
struct State {
    users: BTreeSet<UserId>,
    resources: BTreeMap<ResourceId, String>,
    methods: BTreeMap<MethodId, String>,
    // Ordered (user, resource, method), which is exactly the cursor order.
    grants: BTreeSet<Grant>,
}

/// In-memory grant store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    state: RwLock<State>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user_id: UserId) {
        if let Ok(mut state) = self.state.write() {
            state.users.insert(user_id);
        }
    }

    pub fn add_resource(&self, id: ResourceId, path: impl Into<String>) {
        if let Ok(mut state) = self.state.write() {
            state.resources.insert(id, path.into());
        }
    }

    pub fn add_method(&self, id: MethodId, name: impl Into<String>) {
        if let Ok(mut state) = self.state.write() {
            state.methods.insert(id, name.into());
        }
    }

    /// Drop a resource without cascading to its grants.
    ///
    /// Leaves dangling grants behind, which surface as row scan failures.
    pub fn remove_resource(&self, id: ResourceId) {
        if let Ok(mut state) = self.state.write() {
            state.resources.remove(&id);
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, AccessError> {
        self.state
            .read()
            .map_err(|_| AccessError::internal_msg("permission store lock poisoned"))
    }

    fn user_grants(state: &State, user_id: UserId) -> impl Iterator<Item = &Grant> {
        state.grants.iter().filter(move |g| g.user_id == user_id)
    }

    fn describe(state: &State, grant: &Grant) -> Result<DescribedPermissionRow, ScanError> {
        let path = state
            .resources
            .get(&grant.resource_id)
            .ok_or_else(|| ScanError::Decode {
                column: "path",
                reason: format!("resource {} has no row", grant.resource_id),
            })?;
        let name = state
            .methods
            .get(&grant.method_id)
            .ok_or_else(|| ScanError::Decode {
                column: "name",
                reason: format!("method {} has no row", grant.method_id),
            })?;

        Ok(DescribedPermissionRow {
            resource: Resource {
                id: grant.resource_id,
                path: path.clone(),
            },
            method: Method {
                id: grant.method_id,
                name: name.clone(),
            },
        })
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn check_grant(&self, grant: &Grant) -> Result<GrantCheck, AccessError> {
        let state = self.read()?;
        let check = if !state.users.contains(&grant.user_id) {
            GrantCheck::UserMissing
        } else if !state.resources.contains_key(&grant.resource_id) {
            GrantCheck::ResourceMissing
        } else if !state.methods.contains_key(&grant.method_id) {
            GrantCheck::MethodMissing
        } else {
            GrantCheck::AllExist
        };
        Ok(check)
    }

    async fn insert_grant(&self, grant: &Grant) -> Result<(), AccessError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| AccessError::internal_msg("permission store lock poisoned"))?;
        state.grants.insert(*grant);
        Ok(())
    }

    async fn delete_grant(&self, grant: &Grant) -> Result<bool, AccessError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| AccessError::internal_msg("permission store lock poisoned"))?;
        Ok(state.grants.remove(grant))
    }

    async fn grant_exists(&self, grant: &Grant) -> Result<bool, AccessError> {
        Ok(self.read()?.grants.contains(grant))
    }

    async fn permission_id_rows(
        &self,
        user_id: UserId,
    ) -> Result<RowCursor<PermissionIdRow>, AccessError> {
        let state = self.read()?;
        let rows: Vec<Result<PermissionIdRow, ScanError>> = Self::user_grants(&state, user_id)
            .map(|g| {
                Ok(PermissionIdRow {
                    resource_id: g.resource_id,
                    method_id: g.method_id,
                })
            })
            .collect();
        Ok(Box::new(rows.into_iter()))
    }

    async fn described_permission_rows(
        &self,
        user_id: UserId,
    ) -> Result<RowCursor<DescribedPermissionRow>, AccessError> {
        let state = self.read()?;
        let rows: Vec<Result<DescribedPermissionRow, ScanError>> =
            Self::user_grants(&state, user_id)
                .map(|g| Self::describe(&state, g))
                .collect();
        Ok(Box::new(rows.into_iter()))
    }

    async fn path_method_rows(
        &self,
        user_id: UserId,
    ) -> Result<RowCursor<PathMethodRow>, AccessError> {
        let state = self.read()?;
        let rows: Vec<Result<PathMethodRow, ScanError>> = Self::user_grants(&state, user_id)
            .map(|g| {
                Self::describe(&state, g).map(|row| PathMethodRow {
                    path: row.resource.path,
                    method: row.method.name,
                })
            })
            .collect();
        Ok(Box::new(rows.into_iter()))
    }
}
