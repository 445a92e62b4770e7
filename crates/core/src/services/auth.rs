//! Token issuing and verification.
//!
//! Access and refresh tokens are HS256 JWTs sharing one secret; the
//! `token_type` claim keeps them from being used interchangeably.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use ripple_common::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Token claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// "access" or "refresh".
    pub token_type: String,
}

/// An access/refresh token pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Auth service issuing and verifying token pairs.
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl AuthService {
    /// Create a new auth service.
    #[must_use]
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Issue a fresh access/refresh token pair for a user.
    pub fn issue_pair(&self, user_id: &str) -> AppResult<TokenPair> {
        let now = chrono::Utc::now().timestamp();

        let access = self.encode(user_id, now, now + self.access_ttl_secs, "access")?;
        let refresh = self.encode(user_id, now, now + self.refresh_ttl_secs, "refresh")?;

        Ok(TokenPair { access, refresh })
    }

    /// Verify an access token and return the user ID it names.
    pub fn verify_access(&self, token: &str) -> AppResult<String> {
        let claims = self.decode(token)?;
        if claims.token_type != "access" {
            return Err(AppError::Unauthorized);
        }
        Ok(claims.sub)
    }

    /// Exchange a refresh token for a new pair.
    pub fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let claims = self.decode(refresh_token)?;
        if claims.token_type != "refresh" {
            return Err(AppError::Unauthorized);
        }
        self.issue_pair(&claims.sub)
    }

    fn encode(&self, user_id: &str, iat: i64, exp: i64, token_type: &str) -> AppResult<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp,
            iat,
            token_type: token_type.to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    fn decode(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new("test-secret", 3600, 86400)
    }

    #[test]
    fn test_issue_and_verify_access() {
        let auth = service();
        let pair = auth.issue_pair("user1").unwrap();

        let user_id = auth.verify_access(&pair.access).unwrap();
        assert_eq!(user_id, "user1");
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let auth = service();
        let pair = auth.issue_pair("user1").unwrap();

        let result = auth.verify_access(&pair.refresh);
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_access_token_rejected_for_refresh() {
        let auth = service();
        let pair = auth.issue_pair("user1").unwrap();

        let result = auth.refresh(&pair.access);
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_refresh_issues_new_pair() {
        let auth = service();
        let pair = auth.issue_pair("user1").unwrap();

        let new_pair = auth.refresh(&pair.refresh).unwrap();
        assert_eq!(auth.verify_access(&new_pair.access).unwrap(), "user1");
    }

    #[test]
    fn test_garbage_token_rejected() {
        let auth = service();
        assert!(matches!(
            auth.verify_access("not-a-token"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let auth = service();
        let other = AuthService::new("other-secret", 3600, 86400);

        let pair = auth.issue_pair("user1").unwrap();
        assert!(matches!(
            other.verify_access(&pair.access),
            Err(AppError::Unauthorized)
        ));
    }
}
