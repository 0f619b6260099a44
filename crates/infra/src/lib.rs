//! Storage and aggregation for REST permission grants.
//!
//! - [`store`]: the [`PermissionStore`] boundary with in-memory and Postgres backends
//! - [`aggregator`]: single-pass grouping of sorted grant rows
//! - [`service`]: grant management and token issuance on top of both

pub mod aggregator;
pub mod service;
pub mod store;

pub use aggregator::{
    DescribedPermissionRow, PathMethodRow, PermissionIdRow, RowCursor, ScanError, aggregate_ids,
    aggregate_paths_methods, aggregate_with_descriptions,
};
pub use service::PermissionService;
pub use store::{InMemoryPermissionStore, PermissionStore, PostgresPermissionStore};
