//! Signed bearer tokens.
//!
//! Format: `base64url(claims JSON) "." base64url(HMAC-SHA256(secret, first part))`.
//! Claims carry the user ID, role and expiry (unix seconds).

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use shopfront_core::{UserId, UserRole};

use super::AuthError;

/// Claims embedded in a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: UserId,
    /// Role at issue time.
    pub role: UserRole,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// Issues and verifies bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenService {
    /// Create a token service.
    #[must_use]
    pub const fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    /// Issue a token for a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenSigning` if the claims cannot be encoded.
    pub fn issue(&self, user_id: UserId, role: UserRole) -> Result<String, AuthError> {
        let ttl = i64::try_from(self.ttl.as_secs())
            .map_err(|e| AuthError::TokenSigning(e.to_string()))?;
        let claims = Claims {
            sub: user_id,
            role,
            exp: Utc::now().timestamp().saturating_add(ttl),
        };
        self.sign(&claims)
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for malformed or badly signed tokens
    /// and `AuthError::TokenExpired` for expired ones.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let (payload, signature) = token.split_once('.').ok_or(AuthError::InvalidToken)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;

        // Constant-time comparison
        self.mac()?
            .chain_update(payload.as_bytes())
            .verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| AuthError::InvalidToken)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        let json = serde_json::to_vec(claims).map_err(|e| AuthError::TokenSigning(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self
            .mac()?
            .chain_update(payload.as_bytes())
            .finalize()
            .into_bytes();

        Ok(format!("{payload}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    fn mac(&self) -> Result<Hmac<Sha256>, AuthError> {
        Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| AuthError::TokenSigning(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(
            SecretString::from("k8#Qz!t2@Vw9$Lm4^Rb7&Yc1*Hn6%Jp3"),
            Duration::from_secs(3600),
        )
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = service();
        let user = UserId::generate();
        let token = tokens.issue(user, UserRole::Admin).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let tokens = service();
        let token = tokens.issue(UserId::generate(), UserRole::Customer).unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let forged_claims = Claims {
            sub: UserId::generate(),
            role: UserRole::Admin,
            exp: Utc::now().timestamp() + 3600,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{forged_payload}.{signature}");

        assert!(matches!(tokens.verify(&forged), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = service()
            .issue(UserId::generate(), UserRole::Customer)
            .unwrap();
        let other = TokenService::new(
            SecretString::from("Zx9!Qw8@Er7#Ty6$Ui5%Op4^As3&Df2*"),
            Duration::from_secs(3600),
        );
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_rejected() {
        let tokens = service();
        let claims = Claims {
            sub: UserId::generate(),
            role: UserRole::Customer,
            exp: Utc::now().timestamp() - 1,
        };
        let token = tokens.sign(&claims).unwrap();
        assert!(matches!(tokens.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_garbage_rejected() {
        let tokens = service();
        assert!(matches!(tokens.verify(""), Err(AuthError::InvalidToken)));
        assert!(matches!(tokens.verify("abc"), Err(AuthError::InvalidToken)));
        assert!(matches!(tokens.verify("abc.def"), Err(AuthError::InvalidToken)));
    }
}
