//! Persistence boundary for REST grants.
//!
//! The aggregator only needs ordered row cursors and a handful of grant
//! operations from storage; this trait is that contract.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryPermissionStore;
pub use postgres::PostgresPermissionStore;

use std::sync::Arc;

use async_trait::async_trait;

use restgate_core::{AccessError, Grant, GrantCheck, UserId};

use crate::aggregator::{DescribedPermissionRow, PathMethodRow, PermissionIdRow, RowCursor};

/// Grant storage with ordered row access.
///
/// ## Ordering contract
///
/// Every cursor returned for a user must be sorted ascending by resource id,
/// then by method id. The aggregator relies on this to group in one pass.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Check that the user, resource and method a grant references all exist.
    async fn check_grant(&self, grant: &Grant) -> Result<GrantCheck, AccessError>;

    /// Insert a grant. Inserting an existing grant is a no-op.
    async fn insert_grant(&self, grant: &Grant) -> Result<(), AccessError>;

    /// Delete a grant, returning whether a row was removed.
    async fn delete_grant(&self, grant: &Grant) -> Result<bool, AccessError>;

    async fn grant_exists(&self, grant: &Grant) -> Result<bool, AccessError>;

    async fn permission_id_rows(
        &self,
        user_id: UserId,
    ) -> Result<RowCursor<PermissionIdRow>, AccessError>;

    async fn described_permission_rows(
        &self,
        user_id: UserId,
    ) -> Result<RowCursor<DescribedPermissionRow>, AccessError>;

    async fn path_method_rows(
        &self,
        user_id: UserId,
    ) -> Result<RowCursor<PathMethodRow>, AccessError>;
}

#[async_trait]
impl<S> PermissionStore for Arc<S>
where
    S: PermissionStore + ?Sized,
{
    async fn check_grant(&self, grant: &Grant) -> Result<GrantCheck, AccessError> {
        (**self).check_grant(grant).await
    }

    async fn insert_grant(&self, grant: &Grant) -> Result<(), AccessError> {
        (**self).insert_grant(grant).await
    }

    async fn delete_grant(&self, grant: &Grant) -> Result<bool, AccessError> {
        (**self).delete_grant(grant).await
    }

    async fn grant_exists(&self, grant: &Grant) -> Result<bool, AccessError> {
        (**self).grant_exists(grant).await
    }

    async fn permission_id_rows(
        &self,
        user_id: UserId,
    ) -> Result<RowCursor<PermissionIdRow>, AccessError> {
        (**self).permission_id_rows(user_id).await
    }

    async fn described_permission_rows(
        &self,
        user_id: UserId,
    ) -> Result<RowCursor<DescribedPermissionRow>, AccessError> {
        (**self).described_permission_rows(user_id).await
    }

    async fn path_method_rows(
        &self,
        user_id: UserId,
    ) -> Result<RowCursor<PathMethodRow>, AccessError> {
        (**self).path_method_rows(user_id).await
    }
}
