//! Token engine configuration.

use chrono::Duration;
use thiserror::Error;

/// Lifetime applied when none (or a non-positive one) is configured.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 30 * 60;

pub const SIGNING_SECRET_ENV: &str = "RESTGATE_SIGNING_SECRET";
pub const ENCRYPTION_SECRET_ENV: &str = "RESTGATE_ENCRYPTION_SECRET";
pub const TOKEN_LIFETIME_ENV: &str = "RESTGATE_TOKEN_LIFETIME_SECS";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Secret key material. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Debug for Secret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Secret([REDACTED; {} bytes])", self.0.len())
    }
}

/// Immutable configuration for [`crate::TokenService`].
///
/// Key sizes are not checked here: a secret of the wrong length is reported by
/// the stage that uses it, so Generate and Validate each fail in their own
/// category.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    signing_secret: Secret,
    encryption_secret: Secret,
    lifetime: Duration,
}

impl TokenConfig {
    /// Build a configuration. A missing or non-positive `lifetime` falls back
    /// to [`DEFAULT_TOKEN_LIFETIME_SECS`].
    pub fn new(
        signing_secret: impl Into<Vec<u8>>,
        encryption_secret: impl Into<Vec<u8>>,
        lifetime: Option<Duration>,
    ) -> Self {
        let lifetime = match lifetime {
            Some(d) if d > Duration::zero() => d,
            Some(d) => {
                tracing::warn!(
                    lifetime_secs = d.num_seconds(),
                    "ignoring non-positive token lifetime; using default"
                );
                default_lifetime()
            }
            None => default_lifetime(),
        };

        Self {
            signing_secret: Secret::new(signing_secret),
            encryption_secret: Secret::new(encryption_secret),
            lifetime,
        }
    }

    /// Load from `RESTGATE_SIGNING_SECRET`, `RESTGATE_ENCRYPTION_SECRET` and the
    /// optional `RESTGATE_TOKEN_LIFETIME_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`TokenConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let signing = lookup(SIGNING_SECRET_ENV).ok_or(ConfigError::Missing(SIGNING_SECRET_ENV))?;
        let encryption =
            lookup(ENCRYPTION_SECRET_ENV).ok_or(ConfigError::Missing(ENCRYPTION_SECRET_ENV))?;

        let lifetime = match lookup(TOKEN_LIFETIME_ENV) {
            Some(raw) => {
                let secs = raw.trim().parse::<i64>().map_err(|e| ConfigError::Invalid {
                    name: TOKEN_LIFETIME_ENV,
                    reason: e.to_string(),
                })?;
                Some(Duration::seconds(secs))
            }
            None => None,
        };

        Ok(Self::new(signing.into_bytes(), encryption.into_bytes(), lifetime))
    }

    pub fn signing_secret(&self) -> &Secret {
        &self.signing_secret
    }

    pub fn encryption_secret(&self) -> &Secret {
        &self.encryption_secret
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

fn default_lifetime() -> Duration {
    Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS)
}
