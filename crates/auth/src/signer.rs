//! Inner token: HS256-signed JWS over [`TokenClaims`].

use base64::{Engine, engine::general_purpose::URL_SAFE};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{ISSUER, TokenClaims};

#[derive(Debug, Error)]
pub enum SignError {
    #[error("signing key is empty")]
    EmptyKey,

    #[error("token expired at {exp}")]
    Expired { exp: i64 },

    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Sign/verify strategy for the inner token.
///
/// `verify` checks the MAC, the issuer and expiry against `now`.
pub trait Signer: Send + Sync {
    fn sign(&self, claims: &TokenClaims) -> Result<String, SignError>;
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, SignError>;
}

/// HMAC-SHA-256 signer.
///
/// The MAC key is the base64url text of the configured secret, not the raw
/// secret bytes.
#[derive(Clone)]
pub struct Hs256Signer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    empty: bool,
}

impl Hs256Signer {
    pub fn new(secret: &[u8]) -> Self {
        let key = derive_mac_key(secret);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Expiry is checked against the caller's clock in `verify`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(key.as_bytes()),
            decoding: DecodingKey::from_secret(key.as_bytes()),
            validation,
            empty: key.is_empty(),
        }
    }
}

impl core::fmt::Debug for Hs256Signer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Signer").finish_non_exhaustive()
    }
}

impl Signer for Hs256Signer {
    fn sign(&self, claims: &TokenClaims) -> Result<String, SignError> {
        if self.empty {
            return Err(SignError::EmptyKey);
        }
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding,
        )?)
    }

    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, SignError> {
        if self.empty {
            return Err(SignError::EmptyKey);
        }
        let claims = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation)?
            .claims;
        if claims.is_expired_at(now) {
            return Err(SignError::Expired { exp: claims.exp });
        }
        Ok(claims)
    }
}

fn derive_mac_key(secret: &[u8]) -> String {
    URL_SAFE.encode(secret)
}
