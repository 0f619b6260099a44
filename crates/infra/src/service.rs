//! Grant management and permission views over a [`PermissionStore`].

use tracing::{debug, instrument};

use restgate_auth::{
    PermissionsIds, PermissionsWithDescriptions, RestPathsMethods, TokenService, UserPermissions,
};
use restgate_core::{AccessError, Grant, UserId};

use crate::aggregator::{aggregate_ids, aggregate_paths_methods, aggregate_with_descriptions};
use crate::store::PermissionStore;

/// Store plus aggregator.
///
/// Each view call opens its own cursor; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct PermissionService<S> {
    store: S,
}

impl<S> PermissionService<S>
where
    S: PermissionStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record a grant after checking that everything it references exists.
    ///
    /// Granting something already granted succeeds without a second row.
    #[instrument(skip(self), err(Display))]
    pub async fn grant(&self, grant: Grant) -> Result<(), AccessError> {
        let check = self.store.check_grant(&grant).await?;
        if !check.all_exist() {
            return Err(AccessError::MissingReference(check));
        }
        self.store.insert_grant(&grant).await?;
        debug!("grant recorded");
        Ok(())
    }

    #[instrument(skip(self), err(Display))]
    pub async fn revoke(&self, grant: Grant) -> Result<(), AccessError> {
        if self.store.delete_grant(&grant).await? {
            debug!("grant removed");
            Ok(())
        } else {
            Err(AccessError::EmptyResult)
        }
    }

    #[instrument(skip(self), err(Display))]
    pub async fn permission_ids(&self, user_id: UserId) -> Result<Vec<PermissionsIds>, AccessError> {
        let rows = self.store.permission_id_rows(user_id).await?;
        aggregate_ids(rows)
    }

    #[instrument(skip(self), err(Display))]
    pub async fn permissions_with_descriptions(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PermissionsWithDescriptions>, AccessError> {
        let rows = self.store.described_permission_rows(user_id).await?;
        aggregate_with_descriptions(rows)
    }

    #[instrument(skip(self), err(Display))]
    pub async fn paths_methods(&self, user_id: UserId) -> Result<RestPathsMethods, AccessError> {
        let rows = self.store.path_method_rows(user_id).await?;
        aggregate_paths_methods(rows)
    }

    /// The REST path map wrapped under its category, ready to embed in a token.
    pub async fn user_permissions(&self, user_id: UserId) -> Result<UserPermissions, AccessError> {
        self.paths_methods(user_id)
            .await
            .map(UserPermissions::from_rest)
    }

    /// Aggregate the user's grants and seal them into a token.
    ///
    /// A user with no grants gets no token: the empty aggregation error is
    /// returned as is.
    #[instrument(skip(self, tokens), err(Display))]
    pub async fn issue_token(
        &self,
        user_id: UserId,
        tokens: &TokenService,
    ) -> Result<String, AccessError> {
        let permissions = self.user_permissions(user_id).await?;
        tokens.generate(user_id, &permissions)
    }
}
