//! Session token issuance and verification (HS256).

use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// Shortest HMAC secret jwt-simple accepts for signing or verification.
pub const MIN_SECRET_LEN: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionClaims {
    role: String,
}

/// Verified contents of a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub username: String,
    pub role: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Stateless token manager. The secret and TTL are fixed at construction;
/// nothing is recorded per token, so `verify` needs no synchronization.
#[derive(Clone)]
pub struct TokenManager {
    key: Arc<HS256Key>,
    ttl: std::time::Duration,
    issuer: Option<String>,
}

impl TokenManager {
    /// Fails for secrets under [`MIN_SECRET_LEN`] bytes, which the signer
    /// would otherwise reject on every issue and verify.
    pub fn new(secret: &[u8], ttl: std::time::Duration) -> AuthResult<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::WeakSecret(MIN_SECRET_LEN));
        }
        Ok(Self {
            key: Arc::new(HS256Key::from_bytes(secret)),
            ttl,
            issuer: None,
        })
    }

    /// Manager with a random secret; tokens do not survive a restart.
    pub fn generate(ttl: std::time::Duration) -> Self {
        Self {
            key: Arc::new(HS256Key::generate()),
            ttl,
            issuer: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn issue(&self, username: &str, role: &str) -> AuthResult<String> {
        self.issue_at(username, role, SystemTime::now(), self.ttl)
    }

    /// Issues a token valid from `issued_at` for `ttl`.
    pub fn issue_at(
        &self,
        username: &str,
        role: &str,
        issued_at: SystemTime,
        ttl: std::time::Duration,
    ) -> AuthResult<String> {
        let issued_at = issued_at
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AuthError::TokenSigning(e.to_string()))?;
        let issued_at = Duration::from_secs(issued_at.as_secs());
        let ttl = Duration::from_secs(ttl.as_secs());

        let mut claims = jwt_simple::claims::Claims::with_custom_claims(
            SessionClaims {
                role: role.to_string(),
            },
            ttl,
        )
        .with_subject(username);
        claims.issued_at = Some(issued_at);
        claims.invalid_before = Some(issued_at);
        claims.expires_at = Some(issued_at + ttl);

        if let Some(issuer) = &self.issuer {
            claims = claims.with_issuer(issuer);
        }

        self.key
            .authenticate(claims)
            .map_err(|e| AuthError::TokenSigning(e.to_string()))
    }

    /// Checks structure, signature and expiry. Every failure collapses into
    /// `InvalidToken`; the reason is only visible in debug logs.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let mut options = VerificationOptions {
            time_tolerance: Some(Duration::from_secs(0)),
            ..Default::default()
        };
        if let Some(issuer) = &self.issuer {
            options.allowed_issuers = Some(HashSet::from([issuer.clone()]));
        }

        let token_data = self
            .key
            .verify_token::<SessionClaims>(token, Some(options))
            .map_err(|e| {
                debug!(reason = %e, "Token rejected");
                AuthError::InvalidToken
            })?;

        let (Some(username), Some(expires_at)) = (token_data.subject, token_data.expires_at) else {
            debug!("Token rejected: missing subject or expiry");
            return Err(AuthError::InvalidToken);
        };

        Ok(Claims {
            username,
            role: token_data.custom.role,
            issued_at: token_data
                .issued_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
            expires_at: expires_at.as_secs() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: std::time::Duration = std::time::Duration::from_secs(15 * 60);

    fn manager() -> TokenManager {
        TokenManager::new(b"pcbook-token-test-secret", TTL).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let manager = manager();
        let token = manager.issue("admin1", "admin").expect("Token should be issued");

        let claims = manager.verify(&token).expect("Token should verify");
        assert_eq!(claims.username, "admin1");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.expires_at - claims.issued_at, TTL.as_secs() as i64);
    }

    #[test]
    fn test_each_issue_verifies_independently() {
        let manager = manager();
        let first = manager.issue("user1", "user").unwrap();
        let second = manager.issue("user1", "user").unwrap();

        assert!(manager.verify(&first).is_ok());
        assert!(manager.verify(&second).is_ok());
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let manager = manager();
        let an_hour_ago = SystemTime::now() - std::time::Duration::from_secs(3600);
        let token = manager.issue_at("user1", "user", an_hour_ago, TTL).unwrap();

        assert!(matches!(
            manager.verify(&token).unwrap_err(),
            AuthError::InvalidToken
        ));
    }

    #[test]
    fn test_token_still_inside_window_is_valid() {
        let manager = manager();
        let a_minute_ago = SystemTime::now() - std::time::Duration::from_secs(60);
        let token = manager.issue_at("user1", "user", a_minute_ago, TTL).unwrap();

        assert!(manager.verify(&token).is_ok());
    }

    #[test]
    fn test_any_altered_payload_byte_is_rejected() {
        let manager = manager();
        let token = manager.issue("admin1", "admin").unwrap();
        let signed_len = token.rfind('.').expect("token should have a signature segment");

        for i in 0..signed_len {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            if tampered == token {
                continue;
            }
            assert!(
                manager.verify(&tampered).is_err(),
                "tampering at byte {} was accepted",
                i
            );
        }
    }

    #[test]
    fn test_malformed_token_is_invalid() {
        let manager = manager();
        for token in ["", "invalid.token.here", "not-a-jwt"] {
            assert!(matches!(
                manager.verify(token).unwrap_err(),
                AuthError::InvalidToken
            ));
        }
    }

    #[test]
    fn test_wrong_secret_fails_verification() {
        let token = manager().issue("admin1", "admin").unwrap();
        let other = TokenManager::new(b"another-secret", TTL).unwrap();

        assert!(matches!(
            other.verify(&token).unwrap_err(),
            AuthError::InvalidToken
        ));
    }

    #[test]
    fn test_failure_reasons_are_indistinguishable() {
        let manager = manager();
        let expired = manager
            .issue_at(
                "user1",
                "user",
                SystemTime::now() - std::time::Duration::from_secs(3600),
                TTL,
            )
            .unwrap();
        let foreign = TokenManager::new(b"another-secret", TTL)
            .unwrap()
            .issue("user1", "user")
            .unwrap();

        let messages: Vec<String> = [expired.as_str(), foreign.as_str(), "garbage"]
            .iter()
            .map(|t| manager.verify(t).unwrap_err().to_string())
            .collect();

        assert!(messages.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_issuer_is_enforced() {
        let issuing = manager().with_issuer("pcbook");
        let token = issuing.issue("admin1", "admin").unwrap();
        assert!(issuing.verify(&token).is_ok());

        let other_issuer = manager().with_issuer("someone-else");
        assert!(other_issuer.verify(&token).is_err());
    }

    #[test]
    fn test_short_secret_is_rejected_up_front() {
        let err = TokenManager::new(b"secret", TTL).err().unwrap();
        assert!(matches!(err, AuthError::WeakSecret(MIN_SECRET_LEN)));

        let shortest = TokenManager::new(&[7u8; MIN_SECRET_LEN], TTL).unwrap();
        let token = shortest.issue("admin1", "admin").unwrap();
        assert!(shortest.verify(&token).is_ok());
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = TokenManager::generate(TTL);
        let b = TokenManager::generate(TTL);
        let token = a.issue("admin1", "admin").unwrap();

        assert!(a.verify(&token).is_ok());
        assert!(b.verify(&token).is_err());
    }
}
