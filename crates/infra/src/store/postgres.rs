//! Postgres-backed grant store.
//!
//! ## Error Mapping
//!
//! Every SQLx error surfaces as an `Internal` [`AccessError`] tagged with the
//! operation name. Column decode failures inside a cursor surface later, as
//! [`ScanError`]s, when the aggregator reads the row.
//!
//! ## Ordering
//!
//! Each cursor query carries an explicit `ORDER BY resource_id, method_id`;
//! the aggregator's single-pass grouping depends on it.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use restgate_auth::{Method, Resource};
use restgate_core::{AccessError, Grant, GrantCheck, MethodId, ResourceId, UserId};

use super::PermissionStore;
use crate::aggregator::{
    DescribedPermissionRow, PathMethodRow, PermissionIdRow, RowCursor, ScanError,
};

/// Schema applied by [`PostgresPermissionStore::apply_schema`].
pub const SCHEMA: &str = include_str!("../../migrations/0001_rest_permissions.sql");

/// Postgres-backed grant store.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; clone freely.
#[derive(Debug, Clone)]
pub struct PostgresPermissionStore {
    pool: Arc<PgPool>,
}

impl PostgresPermissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect with a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self, AccessError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and the existence-check routine if missing.
    pub async fn apply_schema(&self) -> Result<(), AccessError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for PostgresPermissionStore {
    #[instrument(skip(self), err)]
    async fn check_grant(&self, grant: &Grant) -> Result<GrantCheck, AccessError> {
        let row = sqlx::query("SELECT check_user_rest_permission($1, $2, $3) AS status")
            .bind(grant.user_id.get())
            .bind(grant.resource_id.get())
            .bind(grant.method_id.get())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("check_grant", e))?;

        let code: i32 = row
            .try_get("status")
            .map_err(|e| map_sqlx_error("check_grant", e))?;

        GrantCheck::from_code(code).ok_or_else(|| {
            AccessError::internal_msg(format!("check_grant: unexpected status code {code}"))
        })
    }

    #[instrument(skip(self), err)]
    async fn insert_grant(&self, grant: &Grant) -> Result<(), AccessError> {
        sqlx::query(
            r#"
            INSERT INTO user_rest_permissions (user_id, resource_id, method_id)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(grant.user_id.get())
        .bind(grant.resource_id.get())
        .bind(grant.method_id.get())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_grant", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_grant(&self, grant: &Grant) -> Result<bool, AccessError> {
        let result = sqlx::query(
            r#"
            DELETE FROM user_rest_permissions
            WHERE user_id = $1 AND resource_id = $2 AND method_id = $3
            "#,
        )
        .bind(grant.user_id.get())
        .bind(grant.resource_id.get())
        .bind(grant.method_id.get())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_grant", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn grant_exists(&self, grant: &Grant) -> Result<bool, AccessError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_rest_permissions
                WHERE user_id = $1 AND resource_id = $2 AND method_id = $3
            ) AS present
            "#,
        )
        .bind(grant.user_id.get())
        .bind(grant.resource_id.get())
        .bind(grant.method_id.get())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("grant_exists", e))?;

        row.try_get("present")
            .map_err(|e| map_sqlx_error("grant_exists", e))
    }

    #[instrument(skip(self), err)]
    async fn permission_id_rows(
        &self,
        user_id: UserId,
    ) -> Result<RowCursor<PermissionIdRow>, AccessError> {
        let rows = sqlx::query(
            r#"
            SELECT resource_id, method_id
            FROM user_rest_permissions
            WHERE user_id = $1
            ORDER BY resource_id ASC, method_id ASC
            "#,
        )
        .bind(user_id.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("permission_id_rows", e))?;

        Ok(Box::new(rows.into_iter().map(|row| decode_ids(&row))))
    }

    #[instrument(skip(self), err)]
    async fn described_permission_rows(
        &self,
        user_id: UserId,
    ) -> Result<RowCursor<DescribedPermissionRow>, AccessError> {
        let rows = sqlx::query(
            r#"
            SELECT p.resource_id, r.path, p.method_id, m.name
            FROM user_rest_permissions p
            JOIN rest_resources r ON r.id = p.resource_id
            JOIN rest_methods m ON m.id = p.method_id
            WHERE p.user_id = $1
            ORDER BY p.resource_id ASC, p.method_id ASC
            "#,
        )
        .bind(user_id.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("described_permission_rows", e))?;

        Ok(Box::new(rows.into_iter().map(|row| decode_described(&row))))
    }

    #[instrument(skip(self), err)]
    async fn path_method_rows(
        &self,
        user_id: UserId,
    ) -> Result<RowCursor<PathMethodRow>, AccessError> {
        let rows = sqlx::query(
            r#"
            SELECT r.path, m.name
            FROM user_rest_permissions p
            JOIN rest_resources r ON r.id = p.resource_id
            JOIN rest_methods m ON m.id = p.method_id
            WHERE p.user_id = $1
            ORDER BY p.resource_id ASC, p.method_id ASC
            "#,
        )
        .bind(user_id.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("path_method_rows", e))?;

        Ok(Box::new(rows.into_iter().map(|row| decode_path_method(&row))))
    }
}

fn decode_ids(row: &PgRow) -> Result<PermissionIdRow, ScanError> {
    Ok(PermissionIdRow {
        resource_id: ResourceId::new(row.try_get("resource_id")?),
        method_id: MethodId::new(row.try_get("method_id")?),
    })
}

fn decode_described(row: &PgRow) -> Result<DescribedPermissionRow, ScanError> {
    Ok(DescribedPermissionRow {
        resource: Resource {
            id: ResourceId::new(row.try_get("resource_id")?),
            path: row.try_get("path")?,
        },
        method: Method {
            id: MethodId::new(row.try_get("method_id")?),
            name: row.try_get("name")?,
        },
    })
}

fn decode_path_method(row: &PgRow) -> Result<PathMethodRow, ScanError> {
    Ok(PathMethodRow {
        path: row.try_get("path")?,
        method: row.try_get("name")?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> AccessError {
    match err {
        sqlx::Error::Database(db_err) => {
            let context = match db_err.code() {
                Some(code) => format!("database error in {operation} (sqlstate {code})"),
                None => format!("database error in {operation}"),
            };
            AccessError::internal(context, sqlx::Error::Database(db_err))
        }
        sqlx::Error::PoolClosed => {
            AccessError::internal(format!("connection pool closed in {operation}"), err)
        }
        _ => AccessError::internal(format!("sqlx error in {operation}"), err),
    }
}
