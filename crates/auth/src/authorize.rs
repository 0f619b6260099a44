use serde::Serialize;
use thiserror::Error;

use crate::{REST_CATEGORY, UserPermissions};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("no '{0}' permissions in claim")]
    NoCategory(&'static str),

    #[error("forbidden: {method} {path}")]
    Forbidden { path: String, method: String },
}

/// Check whether the claimed REST permissions allow `method` on `path`.
///
/// - No IO
/// - No panics
/// - Exact path match, case-insensitive method match
pub fn authorize(permissions: &UserPermissions, path: &str, method: &str) -> Result<(), AuthzError> {
    let rest = permissions
        .rest()
        .ok_or(AuthzError::NoCategory(REST_CATEGORY))?;

    if rest.allows(path, method) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            path: path.to_string(),
            method: method.to_string(),
        })
    }
}

/// Detailed explanation of an authorization decision, for audit output.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub path: String,
    pub method: String,
    pub granted: bool,
    pub reason: String,
    /// Methods the claim grants on `path` (empty when the path is unknown).
    pub allowed_methods: Vec<String>,
}

/// Explain why a request would be allowed or denied.
pub fn explain_authorization(
    permissions: &UserPermissions,
    path: &str,
    method: &str,
) -> AuthorizationExplanation {
    let allowed_methods: Vec<String> = permissions
        .rest()
        .and_then(|rest| rest.methods(path))
        .map(<[String]>::to_vec)
        .unwrap_or_default();

    let (granted, reason) = match authorize(permissions, path, method) {
        Ok(()) => (true, format!("'{method}' is granted on '{path}'")),
        Err(AuthzError::NoCategory(category)) => {
            (false, format!("claim carries no '{category}' permissions"))
        }
        Err(AuthzError::Forbidden { .. }) if allowed_methods.is_empty() => {
            (false, format!("no methods are granted on '{path}'"))
        }
        Err(AuthzError::Forbidden { .. }) => (
            false,
            format!("'{method}' is not granted on '{path}'; granted: {allowed_methods:?}"),
        ),
    };

    AuthorizationExplanation {
        path: path.to_string(),
        method: method.to_string(),
        granted,
        reason,
        allowed_methods,
    }
}
