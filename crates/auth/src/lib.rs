//! `restgate-auth` — permission-carrying tokens and the REST permission model.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod config;
pub mod encryptor;
pub mod permissions;
pub mod signer;
pub mod token;

pub use authorize::{AuthorizationExplanation, AuthzError, authorize, explain_authorization};
pub use claims::{ISSUER, PERMISSIONS_CLAIM, PayloadBuilder, TokenClaims};
pub use config::{ConfigError, Secret, TokenConfig};
pub use encryptor::{DirectEncryptor, EncryptionError, Encryptor};
pub use permissions::{
    Method, PermissionsIds, PermissionsWithDescriptions, REST_CATEGORY, Resource,
    RestPathsMethods, UserPermissions,
};
pub use signer::{Hs256Signer, SignError, Signer};
pub use token::TokenService;

pub use restgate_core::{Grant, GrantCheck};
