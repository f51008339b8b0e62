//! Identity and JWT claim set.

use serde::{Deserialize, Serialize};

/// The identity a credential speaks for.
///
/// This is what downstream handlers (listings, jobs, preferences) consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Unique user ID.
    pub identity_id: String,
    /// User's email.
    pub email: String,
    /// User's display name.
    pub display_name: String,
}

impl Identity {
    pub fn new(
        identity_id: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            identity_id: identity_id.into(),
            email: email.into(),
            display_name: display_name.into(),
        }
    }
}

/// JWT claims bound into a credential.
///
/// Fields are private: a claim set is only minted by the token codec and
/// never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Subject (user ID).
    #[serde(rename = "sub")]
    identity_id: String,

    /// User's email.
    email: String,

    /// User's display name.
    #[serde(rename = "name")]
    display_name: String,

    /// Issued at (as Unix timestamp).
    #[serde(rename = "iat")]
    issued_at: i64,

    /// Expiration time (as Unix timestamp).
    #[serde(rename = "exp")]
    expires_at: i64,
}

impl ClaimSet {
    /// Mint a claim set valid for `ttl_secs` starting at `issued_at`.
    ///
    /// Callers guarantee `ttl_secs > 0`.
    pub(crate) fn mint(identity: &Identity, issued_at: i64, ttl_secs: i64) -> Self {
        Self {
            identity_id: identity.identity_id.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            issued_at,
            expires_at: issued_at.saturating_add(ttl_secs),
        }
    }

    pub fn identity_id(&self) -> &str {
        &self.identity_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Whether the expiration lies strictly after issuance.
    pub fn is_well_formed(&self) -> bool {
        self.expires_at > self.issued_at
    }

    /// A credential is expired at or past its `exp` instant.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Seconds left before expiry at `now`, never negative.
    pub fn remaining_secs(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }

    /// The identity part of the claims.
    pub fn identity(&self) -> Identity {
        Identity {
            identity_id: self.identity_id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new("u1", "a@b.com", "A")
    }

    #[test]
    fn test_mint_sets_window() {
        let claims = ClaimSet::mint(&identity(), 1_000, 3_600);
        assert_eq!(claims.issued_at(), 1_000);
        assert_eq!(claims.expires_at(), 4_600);
        assert!(claims.is_well_formed());
        assert_eq!(claims.identity(), identity());
    }

    #[test]
    fn test_expiry_boundary() {
        let claims = ClaimSet::mint(&identity(), 0, 10);
        assert!(!claims.is_expired_at(9));
        assert!(claims.is_expired_at(10));
        assert!(claims.is_expired_at(11));
        assert_eq!(claims.remaining_secs(4), 6);
        assert_eq!(claims.remaining_secs(50), 0);
    }

    #[test]
    fn test_serialized_claim_names() {
        let claims = ClaimSet::mint(&identity(), 100, 60);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["sub"], "u1");
        assert_eq!(json["email"], "a@b.com");
        assert_eq!(json["name"], "A");
        assert_eq!(json["iat"], 100);
        assert_eq!(json["exp"], 160);
    }

    #[test]
    fn test_inverted_window_is_not_well_formed() {
        let claims: ClaimSet = serde_json::from_value(serde_json::json!({
            "sub": "u1",
            "email": "a@b.com",
            "name": "A",
            "iat": 500,
            "exp": 500,
        }))
        .unwrap();
        assert!(!claims.is_well_formed());
    }
}
