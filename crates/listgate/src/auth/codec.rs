//! Credential issuing and verification.
//!
//! Credentials are HS256 JWTs over a [`ClaimSet`]. The signing secret is
//! handed in at construction time and never changes; a codec cannot be
//! built without one.

use std::fmt;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use super::AuthError;
use super::claims::{ClaimSet, Identity};
use super::config::{AuthConfig, ConfigValidationError, check_secret};

/// A signed, time-bounded credential string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Credential> for String {
    fn from(credential: Credential) -> Self {
        credential.0
    }
}

/// Why a credential failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("credential could not be parsed")]
    Malformed,

    #[error("credential signature does not match")]
    InvalidSignature,

    #[error("credential has expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName => VerifyError::InvalidSignature,
            ErrorKind::ExpiredSignature => VerifyError::Expired,
            _ => VerifyError::Malformed,
        }
    }
}

/// Signs and verifies credentials with a process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from a raw secret and credential lifetime.
    pub fn new(secret: &str, ttl_secs: i64) -> Result<Self, ConfigValidationError> {
        check_secret(secret)?;
        if ttl_secs <= 0 {
            return Err(ConfigValidationError::InvalidTokenTtl(ttl_secs));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
        })
    }

    /// Build a codec from configuration, failing closed when no usable
    /// secret is configured.
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigValidationError> {
        config.validate()?;
        let secret = config.require_jwt_secret()?;
        Self::new(&secret, config.token_ttl_secs)
    }

    /// Lifetime of issued credentials, in seconds.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Issue a credential for `identity`, valid from now.
    pub fn issue(&self, identity: &Identity) -> Result<Credential, AuthError> {
        self.issue_at(identity, now_unix())
    }

    /// Issue a credential as if the current time were `now`.
    pub fn issue_at(&self, identity: &Identity, now: i64) -> Result<Credential, AuthError> {
        let claims = ClaimSet::mint(identity, now, self.ttl_secs);
        if !claims.is_well_formed() {
            return Err(AuthError::Internal(
                "credential expiry overflowed".to_string(),
            ));
        }

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("signing credential: {}", e)))?;

        trace!(identity_id = %claims.identity_id(), exp = claims.expires_at(), "issued credential");
        Ok(Credential(token))
    }

    /// Verify a credential against the current time.
    pub fn verify(&self, token: &str) -> Result<ClaimSet, VerifyError> {
        self.verify_at(token, now_unix())
    }

    /// Verify a credential as if the current time were `now`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<ClaimSet, VerifyError> {
        let data = decode::<ClaimSet>(token, &self.decoding, &self.validation)?;
        let claims = data.claims;

        if !claims.is_well_formed() {
            return Err(VerifyError::Malformed);
        }
        if claims.is_expired_at(now) {
            return Err(VerifyError::Expired);
        }

        Ok(claims)
    }
}

/// Current wall-clock time as a Unix timestamp.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-for-codec-unit-tests-minimum-32-chars";
    const OTHER_SECRET: &str = "another-secret-for-codec-unit-tests-minimum-32";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, 3600).unwrap()
    }

    fn identity() -> Identity {
        Identity::new("u1", "a@b.com", "A")
    }

    fn replace_char(token: &str, idx: usize) -> String {
        let mut bytes = token.as_bytes().to_vec();
        bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let codec = codec();
        let token = codec.issue(&identity()).unwrap();
        let claims = codec.verify(token.as_str()).unwrap();
        assert_eq!(claims.identity(), identity());
        assert_eq!(claims.expires_at() - claims.issued_at(), 3600);
    }

    #[test]
    fn test_token_shape() {
        let token = codec().issue(&identity()).unwrap();
        assert_eq!(token.as_str().split('.').count(), 3);
    }

    #[test]
    fn test_expiry_with_simulated_clock() {
        let codec = codec();
        let t0 = 1_700_000_000;
        let token = codec.issue_at(&identity(), t0).unwrap();

        assert!(codec.verify_at(token.as_str(), t0 + 3599).is_ok());
        assert_eq!(
            codec.verify_at(token.as_str(), t0 + 3600),
            Err(VerifyError::Expired)
        );
        assert_eq!(
            codec.verify_at(token.as_str(), t0 + 3601),
            Err(VerifyError::Expired)
        );
    }

    #[test]
    fn test_expired_against_wall_clock() {
        let codec = codec();
        let token = codec.issue_at(&identity(), now_unix() - 7200).unwrap();
        assert_eq!(codec.verify(token.as_str()), Err(VerifyError::Expired));
    }

    #[test]
    fn test_every_signature_character_is_checked() {
        let codec = codec();
        let t0 = 1_700_000_000;
        let token = codec.issue_at(&identity(), t0).unwrap().into_string();
        let sig_start = token.rfind('.').unwrap() + 1;

        for idx in sig_start..token.len() {
            let tampered = replace_char(&token, idx);
            assert!(
                codec.verify_at(&tampered, t0 + 1).is_err(),
                "tampered signature at {} was accepted",
                idx
            );
        }
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let codec = codec();
        let t0 = 1_700_000_000;
        let token = codec.issue_at(&identity(), t0).unwrap().into_string();
        let payload_idx = token.find('.').unwrap() + 3;
        let tampered = replace_char(&token, payload_idx);
        assert!(codec.verify_at(&tampered, t0 + 1).is_err());
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = codec().issue(&identity()).unwrap();
        let other = TokenCodec::new(OTHER_SECRET, 3600).unwrap();
        assert_eq!(
            other.verify(token.as_str()),
            Err(VerifyError::InvalidSignature)
        );
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let claims = ClaimSet::mint(&identity(), now_unix(), 3600);
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(
            codec().verify(&token),
            Err(VerifyError::InvalidSignature)
        );
    }

    #[test]
    fn test_unsigned_token_rejected() {
        // {"alg":"none","typ":"JWT"} . {"sub":"u1",...}
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.eyJzdWIiOiJ1MSIsImVtYWlsIjoiYUBiLmNvbSIsIm5hbWUiOiJBIiwiaWF0IjoxLCJleHAiOjk5OTk5OTk5OTl9.";
        assert!(codec().verify(token).is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.verify(""), Err(VerifyError::Malformed));
        assert_eq!(codec.verify("not-a-token"), Err(VerifyError::Malformed));
        assert_eq!(codec.verify("a.b.c"), Err(VerifyError::Malformed));
    }

    #[test]
    fn test_fails_closed_without_secret() {
        assert_eq!(
            TokenCodec::from_config(&AuthConfig::default()).unwrap_err(),
            ConfigValidationError::MissingJwtSecret
        );
        assert_eq!(
            TokenCodec::new("", 3600).unwrap_err(),
            ConfigValidationError::MissingJwtSecret
        );
    }

    #[test]
    fn test_rejects_non_positive_ttl() {
        assert_eq!(
            TokenCodec::new(SECRET, 0).unwrap_err(),
            ConfigValidationError::InvalidTokenTtl(0)
        );
    }

    #[test]
    fn test_from_config_uses_ttl() {
        let config = AuthConfig {
            jwt_secret: Some(SECRET.to_string()),
            token_ttl_secs: 120,
            ..AuthConfig::default()
        };
        let codec = TokenCodec::from_config(&config).unwrap();
        assert_eq!(codec.ttl_secs(), 120);

        let claims = codec
            .verify_at(codec.issue_at(&identity(), 10).unwrap().as_str(), 11)
            .unwrap();
        assert_eq!(claims.expires_at(), 130);
    }

    #[test]
    fn test_debug_hides_keys() {
        let rendered = format!("{:?}", codec());
        assert!(!rendered.contains(SECRET));
    }
}
