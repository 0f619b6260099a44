//! `restgate-core` — shared identifiers, the grant tuple and the error taxonomy.
//!
//! This crate contains no crypto, storage or transport concerns.

pub mod error;
pub mod grant;
pub mod id;

pub use error::{AccessError, AccessResult, BoxError, ErrorKind};
pub use grant::{Grant, GrantCheck};
pub use id::{MethodId, ParseIdError, ResourceId, UserId};
