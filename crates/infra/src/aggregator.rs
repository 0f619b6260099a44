//! Single-pass grouping of permission rows into grant views.
//!
//! Rows arrive one per (resource, method) grant, sorted ascending by resource.
//! Each resource becomes one group; a group is flushed as soon as the next
//! resource starts, so only the open group is held in memory. A resource id
//! lower than the previous one means the cursor broke its ordering contract and
//! the aggregation fails instead of emitting a split group.

use thiserror::Error;

use restgate_auth::{
    Method, PermissionsIds, PermissionsWithDescriptions, Resource, RestPathsMethods,
};
use restgate_core::{AccessError, MethodId, ResourceId};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("column '{column}': {reason}")]
    Decode { column: &'static str, reason: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Sequential row source. Not shared between aggregations.
pub type RowCursor<R> = Box<dyn Iterator<Item = Result<R, ScanError>> + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionIdRow {
    pub resource_id: ResourceId,
    pub method_id: MethodId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribedPermissionRow {
    pub resource: Resource,
    pub method: Method,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMethodRow {
    pub path: String,
    pub method: String,
}

/// Group rows into one [`PermissionsIds`] per resource.
pub fn aggregate_ids<I>(rows: I) -> Result<Vec<PermissionsIds>, AccessError>
where
    I: IntoIterator<Item = Result<PermissionIdRow, ScanError>>,
{
    group_sorted(
        rows,
        |row: &PermissionIdRow| row.resource_id,
        |row: &PermissionIdRow| PermissionsIds {
            resource_id: row.resource_id,
            method_ids: Vec::new(),
        },
        |group: &mut PermissionsIds, row: PermissionIdRow| group.method_ids.push(row.method_id),
    )
}

/// Group rows into one [`PermissionsWithDescriptions`] per resource.
pub fn aggregate_with_descriptions<I>(
    rows: I,
) -> Result<Vec<PermissionsWithDescriptions>, AccessError>
where
    I: IntoIterator<Item = Result<DescribedPermissionRow, ScanError>>,
{
    group_sorted(
        rows,
        |row: &DescribedPermissionRow| row.resource.id,
        |row: &DescribedPermissionRow| PermissionsWithDescriptions {
            resource: row.resource.clone(),
            methods: Vec::new(),
        },
        |group: &mut PermissionsWithDescriptions, row: DescribedPermissionRow| {
            group.methods.push(row.method)
        },
    )
}

/// Fold rows into a path → method names map.
///
/// Map semantics make this variant order-insensitive across paths; method
/// order within a path follows the cursor.
pub fn aggregate_paths_methods<I>(rows: I) -> Result<RestPathsMethods, AccessError>
where
    I: IntoIterator<Item = Result<PathMethodRow, ScanError>>,
{
    let mut map = RestPathsMethods::new();
    for row in rows {
        let row = row.map_err(scan_failure)?;
        map.push(row.path, row.method);
    }

    if map.is_empty() {
        return Err(AccessError::EmptyResult);
    }
    Ok(map)
}

fn group_sorted<I, R, K, G>(
    rows: I,
    key_of: impl Fn(&R) -> K,
    open: impl Fn(&R) -> G,
    append: impl Fn(&mut G, R),
) -> Result<Vec<G>, AccessError>
where
    I: IntoIterator<Item = Result<R, ScanError>>,
    K: PartialOrd + Copy + core::fmt::Debug,
{
    let mut groups = Vec::new();
    let mut current: Option<(K, G)> = None;

    for row in rows {
        let row = row.map_err(scan_failure)?;
        let key = key_of(&row);

        let starts_group = match &current {
            None => true,
            Some((open_key, _)) if key == *open_key => false,
            Some((open_key, _)) if key > *open_key => true,
            Some((open_key, _)) => {
                return Err(AccessError::internal_msg(format!(
                    "aggregate permissions: rows out of order ({key:?} after {open_key:?})"
                )));
            }
        };

        if starts_group {
            if let Some((_, done)) = current.take() {
                groups.push(done);
            }
            current = Some((key, open(&row)));
        }

        if let Some((_, group)) = current.as_mut() {
            append(group, row);
        }
    }

    match current {
        Some((_, last)) => {
            groups.push(last);
            Ok(groups)
        }
        None => Err(AccessError::EmptyResult),
    }
}

fn scan_failure(err: ScanError) -> AccessError {
    tracing::debug!(error = %err, "permission row scan failed");
    AccessError::internal("scan permission row", err)
}
