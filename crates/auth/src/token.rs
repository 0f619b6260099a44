//! Token issuance and validation.
//!
//! Generate: payload → sign → encrypt. Validate: decrypt → verify → extract.
//! Each stage maps its failure to exactly one [`ErrorKind`](restgate_core::ErrorKind);
//! the underlying cause is kept for server-side logs only.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use tracing::instrument;

use restgate_core::{AccessError, UserId};

use crate::claims::{PERMISSIONS_CLAIM, PayloadBuilder, TokenClaims};
use crate::config::TokenConfig;
use crate::encryptor::{DirectEncryptor, Encryptor};
use crate::signer::{Hs256Signer, Signer};
use crate::UserPermissions;

/// Issues and validates permission-carrying credentials.
///
/// Holds no mutable state; share it behind an `Arc` and call from any thread.
#[derive(Clone)]
pub struct TokenService {
    payload: PayloadBuilder,
    signer: Arc<dyn Signer>,
    encryptor: Arc<dyn Encryptor>,
}

impl TokenService {
    /// Service using HS256 signing and `dir`/`A128CBC-HS256` encryption.
    pub fn new(config: &TokenConfig) -> Self {
        Self::with_strategies(
            config.lifetime(),
            Arc::new(Hs256Signer::new(config.signing_secret().expose())),
            Arc::new(DirectEncryptor::new(config.encryption_secret().expose())),
        )
    }

    pub fn with_strategies(
        lifetime: Duration,
        signer: Arc<dyn Signer>,
        encryptor: Arc<dyn Encryptor>,
    ) -> Self {
        Self {
            payload: PayloadBuilder::new(lifetime),
            signer,
            encryptor,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.payload.lifetime()
    }

    pub fn generate(
        &self,
        user_id: UserId,
        permissions: &UserPermissions,
    ) -> Result<String, AccessError> {
        self.generate_at(user_id, permissions, Utc::now())
    }

    /// Generate with an explicit clock; `exp` is `now + lifetime`.
    #[instrument(skip(self, permissions), err(Display))]
    pub fn generate_at(
        &self,
        user_id: UserId,
        permissions: &UserPermissions,
        now: DateTime<Utc>,
    ) -> Result<String, AccessError> {
        let claims = self.payload.build(user_id, permissions, now)?;
        self.seal(&claims)
    }

    /// Sign then encrypt an already assembled claim set.
    pub fn seal(&self, claims: &TokenClaims) -> Result<String, AccessError> {
        let signed = self
            .signer
            .sign(claims)
            .map_err(|e| AccessError::internal("sign claims", e))?;

        self.encryptor
            .encrypt(signed.as_bytes())
            .map_err(|e| AccessError::internal("encrypt signed token", e))
    }

    /// Validate and return the raw permissions claim.
    pub fn validate(&self, token: &str) -> Result<JsonValue, AccessError> {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<JsonValue, AccessError> {
        let claims = self.open_at(token, now)?;
        claims.permissions.ok_or_else(|| {
            tracing::debug!(sub = %claims.sub, "verified token has no permissions claim");
            AccessError::unprocessable(format!("claim '{PERMISSIONS_CLAIM}' is absent"))
        })
    }

    /// Validate and interpret the claim as [`UserPermissions`].
    ///
    /// A claim of any other shape is `SemanticallyUnprocessable`.
    pub fn validate_permissions_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<UserPermissions, AccessError> {
        let claim = self.validate_at(token, now)?;
        serde_json::from_value(claim).map_err(|e| {
            AccessError::unprocessable_with(
                format!("claim '{PERMISSIONS_CLAIM}' has an unexpected shape"),
                e,
            )
        })
    }

    pub fn validate_permissions(&self, token: &str) -> Result<UserPermissions, AccessError> {
        self.validate_permissions_at(token, Utc::now())
    }

    /// Decrypt and verify, returning the full claim set.
    #[instrument(skip_all, err(Display))]
    pub fn open_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, AccessError> {
        let plaintext = self.encryptor.decrypt(token).map_err(|e| {
            tracing::debug!(error = %e, "token decrypt failed");
            AccessError::invalid_token("decrypt", e)
        })?;

        let signed = String::from_utf8(plaintext)
            .map_err(|e| AccessError::invalid_token("decrypt: signed token is not utf-8", e))?;

        self.signer.verify(&signed, now).map_err(|e| {
            tracing::debug!(error = %e, "token verify failed");
            AccessError::invalid_token("verify", e)
        })
    }
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("lifetime", &self.payload.lifetime())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use chrono::TimeZone;
    use proptest::prelude::*;
    use restgate_core::ErrorKind;

    use crate::claims::ISSUER;
    use crate::encryptor::EncryptionError;
    use crate::RestPathsMethods;

    const ENC_KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn service() -> TokenService {
        TokenService::new(&TokenConfig::new(b"signing-secret".to_vec(), *ENC_KEY, None))
    }

    fn perms() -> UserPermissions {
        let mut rest = RestPathsMethods::new();
        rest.push("/orders", "GET");
        rest.push("/orders", "POST");
        rest.push("/users", "GET");
        UserPermissions::from_rest(rest)
    }

    fn flip(token: &str, segment: usize, byte: usize) -> String {
        let mut segments: Vec<String> = token.split('.').map(str::to_string).collect();
        let mut raw = URL_SAFE_NO_PAD.decode(&segments[segment]).unwrap();
        let idx = byte % raw.len();
        raw[idx] ^= 0x80;
        segments[segment] = URL_SAFE_NO_PAD.encode(&raw);
        segments.join(".")
    }

    /// Base64 "encryption" so the inner JWS can be inspected and tampered with.
    struct Base64Wrap;

    impl Encryptor for Base64Wrap {
        fn encrypt(&self, plaintext: &[u8]) -> Result<String, EncryptionError> {
            Ok(URL_SAFE_NO_PAD.encode(plaintext))
        }

        fn decrypt(&self, compact: &str) -> Result<Vec<u8>, EncryptionError> {
            Ok(URL_SAFE_NO_PAD.decode(compact)?)
        }
    }

    #[test]
    fn round_trip_returns_claim() {
        let svc = service();
        let token = svc.generate_at(UserId::new(7), &perms(), t0()).unwrap();
        assert_eq!(token.split('.').count(), 5);

        let claim = svc.validate_at(&token, t0()).unwrap();
        assert_eq!(claim, serde_json::to_value(perms()).unwrap());

        let typed = svc.validate_permissions_at(&token, t0()).unwrap();
        assert_eq!(typed, perms());
        assert!(typed.rest().unwrap().allows("/orders", "POST"));
    }

    #[test]
    fn open_exposes_registered_claims() {
        let svc = service();
        let token = svc.generate_at(UserId::new(99), &perms(), t0()).unwrap();
        let claims = svc.open_at(&token, t0()).unwrap();
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.sub, "99");
        assert_eq!(claims.exp, (t0() + Duration::minutes(30)).timestamp());
    }

    #[test]
    fn expiry_is_enforced() {
        let lifetime = Duration::minutes(10);
        let svc = TokenService::new(&TokenConfig::new(b"s".to_vec(), *ENC_KEY, Some(lifetime)));
        let token = svc.generate_at(UserId::new(1), &perms(), t0()).unwrap();

        let eps = Duration::seconds(1);
        assert!(svc.validate_at(&token, t0() + lifetime - eps).is_ok());

        let err = svc.validate_at(&token, t0() + lifetime + eps).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[test]
    fn missing_claim_is_unprocessable() {
        let svc = service();
        let claims = TokenClaims {
            iss: ISSUER.to_string(),
            sub: "5".to_string(),
            exp: (t0() + Duration::minutes(5)).timestamp(),
            permissions: None,
        };
        let token = svc.seal(&claims).unwrap();

        let err = svc.validate_at(&token, t0()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SemanticallyUnprocessable);
    }

    #[test]
    fn claim_of_wrong_shape_is_unprocessable() {
        let svc = service();
        let claims = TokenClaims {
            iss: ISSUER.to_string(),
            sub: "5".to_string(),
            exp: (t0() + Duration::minutes(5)).timestamp(),
            permissions: Some(serde_json::json!(["not", "a", "map"])),
        };
        let token = svc.seal(&claims).unwrap();

        assert!(svc.validate_at(&token, t0()).is_ok());
        let err = svc.validate_permissions_at(&token, t0()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SemanticallyUnprocessable);
    }

    #[test]
    fn tampered_tag_is_invalid() {
        let svc = service();
        let token = svc.generate_at(UserId::new(1), &perms(), t0()).unwrap();
        for byte in 0..16 {
            let err = svc.validate_at(&flip(&token, 4, byte), t0()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidToken);
        }
    }

    #[test]
    fn tampered_inner_signature_is_invalid() {
        let svc = TokenService::with_strategies(
            Duration::minutes(5),
            Arc::new(Hs256Signer::new(b"signing-secret")),
            Arc::new(Base64Wrap),
        );
        let token = svc.generate_at(UserId::new(1), &perms(), t0()).unwrap();
        let inner = String::from_utf8(URL_SAFE_NO_PAD.decode(&token).unwrap()).unwrap();

        let tampered = flip(&inner, 2, 3);
        let err = svc
            .validate_at(&URL_SAFE_NO_PAD.encode(tampered), t0())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[test]
    fn wrong_signing_secret_is_invalid() {
        let token = service().generate_at(UserId::new(1), &perms(), t0()).unwrap();
        let other = TokenService::new(&TokenConfig::new(b"other".to_vec(), *ENC_KEY, None));
        let err = other.validate_at(&token, t0()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[test]
    fn malformed_input_is_invalid() {
        let svc = service();
        for garbage in ["", "abc", "a.b.c", "a.b.c.d.e", "....", "x..y.z.w"] {
            let err = svc.validate_at(garbage, t0()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidToken, "input {garbage:?}");
        }
    }

    #[test]
    fn wrong_key_size_fails_per_stage() {
        let short = TokenService::new(&TokenConfig::new(b"s".to_vec(), [1u8; 16], None));
        let err = short.generate_at(UserId::new(1), &perms(), t0()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        let token = service().generate_at(UserId::new(1), &perms(), t0()).unwrap();
        let long = TokenService::new(&TokenConfig::new(b"signing-secret".to_vec(), [1u8; 48], None));
        let err = long.validate_at(&token, t0()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[test]
    fn empty_signing_secret_is_internal() {
        let svc = TokenService::new(&TokenConfig::new(Vec::<u8>::new(), *ENC_KEY, None));
        let err = svc.generate_at(UserId::new(1), &perms(), t0()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn shared_across_threads() {
        let svc = Arc::new(service());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let svc = Arc::clone(&svc);
                std::thread::spawn(move || {
                    let token = svc.generate_at(UserId::new(i), &perms(), t0()).unwrap();
                    svc.open_at(&token, t0()).unwrap().sub
                })
            })
            .collect();

        let subs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(subs, ["0", "1", "2", "3"]);
    }

    fn arb_permissions() -> impl Strategy<Value = UserPermissions> {
        prop::collection::btree_map(
            "/[a-z]{1,8}(/[a-z0-9]{1,4})?",
            prop::collection::vec("GET|POST|PUT|PATCH|DELETE", 1..5),
            0..6,
        )
        .prop_map(|map| UserPermissions::from_rest(RestPathsMethods::from(map)))
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: validate(generate(id, perms)) yields perms before expiry.
        #[test]
        fn round_trip_any_payload(user in any::<i64>(), perms in arb_permissions()) {
            let svc = service();
            let token = svc.generate_at(UserId::new(user), &perms, t0()).unwrap();
            let back = svc.validate_permissions_at(&token, t0() + Duration::minutes(29)).unwrap();
            prop_assert_eq!(back, perms);
        }

        /// Property: flipping any ciphertext byte makes the credential invalid.
        #[test]
        fn ciphertext_tamper_detected(byte in any::<usize>()) {
            let svc = service();
            let token = svc.generate_at(UserId::new(3), &perms(), t0()).unwrap();
            let err = svc.validate_at(&flip(&token, 3, byte), t0()).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::InvalidToken);
        }
    }
}
