//! Error model shared by the token engine, the aggregator and the stores.
//!
//! Every failure carries exactly one [`ErrorKind`]. Callers branch on the kind,
//! never on message text; messages are for server-side logs.

use thiserror::Error;

use crate::grant::GrantCheck;

/// Boxed underlying cause attached to an [`AccessError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type used across the workspace.
pub type AccessResult<T> = Result<T, AccessError>;

/// Failure category.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Crypto failure, bad configuration, claim assembly or row scan failure.
    Internal,
    /// Decrypt or verify stage failure on an untrusted credential.
    InvalidToken,
    /// Genuine credential without usable authorization data.
    SemanticallyUnprocessable,
    /// A lookup or aggregation matched nothing.
    EmptyResult,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Internal => "internal",
            ErrorKind::InvalidToken => "invalid_token",
            ErrorKind::SemanticallyUnprocessable => "semantically_unprocessable",
            ErrorKind::EmptyResult => "empty_result",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("internal error: {context}")]
    Internal {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("invalid token: {context}")]
    InvalidToken {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("semantically unprocessable: {context}")]
    SemanticallyUnprocessable {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("empty result")]
    EmptyResult,

    /// Grant insertion refused because a referenced entity does not exist.
    #[error("grant rejected: {0}")]
    MissingReference(GrantCheck),
}

impl AccessError {
    pub fn internal(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Internal {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn internal_msg(context: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
            source: None,
        }
    }

    pub fn invalid_token(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::InvalidToken {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn unprocessable(context: impl Into<String>) -> Self {
        Self::SemanticallyUnprocessable {
            context: context.into(),
            source: None,
        }
    }

    pub fn unprocessable_with(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::SemanticallyUnprocessable {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::Internal { .. } => ErrorKind::Internal,
            AccessError::InvalidToken { .. } => ErrorKind::InvalidToken,
            AccessError::SemanticallyUnprocessable { .. } => ErrorKind::SemanticallyUnprocessable,
            AccessError::EmptyResult | AccessError::MissingReference(_) => ErrorKind::EmptyResult,
        }
    }

    pub fn is_empty_result(&self) -> bool {
        self.kind() == ErrorKind::EmptyResult
    }

    /// Which entity was missing, when a grant was rejected.
    pub fn missing_reference(&self) -> Option<GrantCheck> {
        match self {
            AccessError::MissingReference(check) => Some(*check),
            _ => None,
        }
    }

    /// Message safe to hand to an untrusted caller.
    ///
    /// Never includes the stage context or the underlying cause.
    pub fn public_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Internal => "internal error",
            ErrorKind::InvalidToken => "unauthorized",
            ErrorKind::SemanticallyUnprocessable => "token carries no usable permissions",
            ErrorKind::EmptyResult => "not found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn kind_is_structural() {
        let err = AccessError::internal("scan permission row", "column missing");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.is_empty_result());

        assert!(AccessError::EmptyResult.is_empty_result());
        assert!(AccessError::MissingReference(GrantCheck::UserMissing).is_empty_result());
    }

    #[test]
    fn source_chain_is_preserved() {
        let err = AccessError::invalid_token("decrypt", "bad tag");
        assert_eq!(err.to_string(), "invalid token: decrypt");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("bad tag"));
    }

    #[test]
    fn public_message_hides_detail() {
        let err = AccessError::invalid_token("verify: token expired", "exp in the past");
        assert_eq!(err.public_message(), "unauthorized");
    }

    #[test]
    fn missing_reference_is_recoverable() {
        let err = AccessError::MissingReference(GrantCheck::MethodMissing);
        assert_eq!(err.missing_reference(), Some(GrantCheck::MethodMissing));
        assert_eq!(AccessError::EmptyResult.missing_reference(), None);
    }
}
