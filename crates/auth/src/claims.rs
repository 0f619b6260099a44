use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use restgate_core::{AccessError, UserId};

use crate::UserPermissions;

/// Issuer identifier written to and required in every token.
pub const ISSUER: &str = "restgate";

/// Name of the custom claim carrying [`UserPermissions`].
pub const PERMISSIONS_CLAIM: &str = "permissions";

/// Claim set of the inner signed token.
///
/// `permissions` stays an opaque JSON value at this layer; callers interpret
/// it against the [`UserPermissions`] shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub sub: String,
    /// Expiration as a Unix timestamp (seconds).
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<JsonValue>,
}

impl TokenClaims {
    /// `true` once `now` has reached the expiration instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// Assembles the claim set for a user.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    issuer: &'static str,
    lifetime: Duration,
}

impl PayloadBuilder {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            issuer: ISSUER,
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn build(
        &self,
        user_id: UserId,
        permissions: &UserPermissions,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, AccessError> {
        let permissions = serde_json::to_value(permissions)
            .map_err(|e| AccessError::internal("build payload: serialize permissions claim", e))?;

        let exp = now
            .checked_add_signed(self.lifetime)
            .ok_or_else(|| AccessError::internal_msg("build payload: expiration out of range"))?;

        Ok(TokenClaims {
            iss: self.issuer.to_string(),
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            permissions: Some(permissions),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use restgate_core::ErrorKind;

    use crate::RestPathsMethods;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn build_sets_registered_claims() {
        let mut rest = RestPathsMethods::new();
        rest.push("/reports", "GET");
        let perms = UserPermissions::from_rest(rest);

        let claims = PayloadBuilder::new(Duration::minutes(30))
            .build(UserId::new(17), &perms, t0())
            .unwrap();

        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.sub, "17");
        assert_eq!(claims.exp, t0().timestamp() + 1800);
        assert_eq!(
            claims.permissions,
            Some(serde_json::json!({ "REST": { "/reports": ["GET"] } }))
        );
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let claims = TokenClaims {
            iss: ISSUER.to_string(),
            sub: "1".to_string(),
            exp: t0().timestamp(),
            permissions: None,
        };
        assert!(!claims.is_expired_at(t0() - Duration::seconds(1)));
        assert!(claims.is_expired_at(t0()));
    }

    #[test]
    fn missing_permissions_are_not_serialized() {
        let claims = TokenClaims {
            iss: ISSUER.to_string(),
            sub: "1".to_string(),
            exp: 0,
            permissions: None,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get(PERMISSIONS_CLAIM).is_none());
    }

    #[test]
    fn expiration_overflow_is_internal() {
        let err = PayloadBuilder::new(Duration::MAX)
            .build(UserId::new(1), &UserPermissions::new(), t0())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
