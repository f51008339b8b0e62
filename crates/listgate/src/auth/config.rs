//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// Default credential lifetime (one hour).
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Placeholder secrets that ship in sample configs and must never sign tokens.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "dev-secret-change-in-production",
    "change-me-to-a-long-random-secret-value",
];

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT secret for HS256. Either a literal value or `env:VAR_NAME`.
    /// REQUIRED: there is no fallback.
    pub jwt_secret: Option<String>,

    /// Lifetime of issued credentials, in seconds.
    pub token_ttl_secs: i64,

    /// Allowed CORS origins. If empty, cross-origin requests are refused.
    pub allowed_origins: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // No default JWT secret - must be explicitly configured
            jwt_secret: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl AuthConfig {
    /// Resolve the JWT secret, expanding `env:VAR_NAME` syntax.
    /// Returns the resolved secret or None if not configured.
    pub fn resolve_jwt_secret(&self) -> Result<Option<String>, ConfigValidationError> {
        match &self.jwt_secret {
            None => Ok(None),
            Some(value) => {
                if let Some(var_name) = value.strip_prefix("env:") {
                    match std::env::var(var_name) {
                        Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
                        Ok(_) => Err(ConfigValidationError::EnvVarEmpty(var_name.to_string())),
                        Err(_) => Err(ConfigValidationError::EnvVarNotFound(var_name.to_string())),
                    }
                } else if value.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(value.clone()))
                }
            }
        }
    }

    /// Resolve the secret and check it is fit for signing.
    pub fn require_jwt_secret(&self) -> Result<String, ConfigValidationError> {
        let secret = self
            .resolve_jwt_secret()?
            .ok_or(ConfigValidationError::MissingJwtSecret)?;
        check_secret(&secret)?;
        Ok(secret)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.require_jwt_secret()?;
        if self.token_ttl_secs <= 0 {
            return Err(ConfigValidationError::InvalidTokenTtl(self.token_ttl_secs));
        }
        Ok(())
    }

    /// Generate a secure random JWT secret using the OS-backed thread RNG.
    pub fn generate_jwt_secret() -> String {
        use rand::Rng;

        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        const SECRET_LENGTH: usize = 64;

        let mut rng = rand::rng();
        (0..SECRET_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }
}

/// Reject placeholder and short secrets.
pub(crate) fn check_secret(secret: &str) -> Result<(), ConfigValidationError> {
    if secret.is_empty() {
        return Err(ConfigValidationError::MissingJwtSecret);
    }
    if PLACEHOLDER_SECRETS.contains(&secret) {
        return Err(ConfigValidationError::InsecureJwtSecret);
    }
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigValidationError::JwtSecretTooShort);
    }
    Ok(())
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// No JWT secret configured.
    MissingJwtSecret,
    /// JWT secret is a known placeholder value.
    InsecureJwtSecret,
    /// JWT secret is too short (minimum 32 characters).
    JwtSecretTooShort,
    /// Token lifetime is zero or negative.
    InvalidTokenTtl(i64),
    /// Environment variable not found (for `env:VAR_NAME` syntax).
    EnvVarNotFound(String),
    /// Environment variable is empty (for `env:VAR_NAME` syntax).
    EnvVarEmpty(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingJwtSecret => {
                write!(
                    f,
                    "JWT secret is required. Set LISTGATE__AUTH__JWT_SECRET or auth.jwt_secret in config."
                )
            }
            Self::InsecureJwtSecret => {
                write!(
                    f,
                    "JWT secret is a placeholder value. Please configure a secure secret."
                )
            }
            Self::JwtSecretTooShort => {
                write!(
                    f,
                    "JWT secret must be at least {} characters long.",
                    MIN_SECRET_LEN
                )
            }
            Self::InvalidTokenTtl(ttl) => {
                write!(f, "Token lifetime must be positive, got {} seconds.", ttl)
            }
            Self::EnvVarNotFound(var) => {
                write!(
                    f,
                    "Environment variable '{}' not found (referenced via env:{} in config).",
                    var, var
                )
            }
            Self::EnvVarEmpty(var) => {
                write!(
                    f,
                    "Environment variable '{}' is empty (referenced via env:{} in config).",
                    var, var
                )
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}
