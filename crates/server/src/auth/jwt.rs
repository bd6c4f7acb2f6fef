use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const ACCESS_TOKEN_TTL_HOURS: i64 = 12;

const AUDIENCE: &str = "boardflow";

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub aud: String,
}

/// Identity carried by a valid access token.
#[derive(Debug, Clone)]
pub struct AccessTokenDetails {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// HS256 access tokens. Users are authenticated elsewhere; this service
/// only needs to turn a token back into a user id.
#[derive(Clone)]
pub struct JwtService {
    secret: Arc<SecretString>,
}

impl JwtService {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret: Arc::new(secret),
        }
    }

    pub fn issue_access_token(&self, user_id: Uuid) -> Result<String, JwtError> {
        self.issue_with_ttl(user_id, Duration::hours(ACCESS_TOKEN_TTL_HOURS))
    }

    pub fn issue_with_ttl(&self, user_id: Uuid, ttl: Duration) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            aud: AUDIENCE.to_string(),
        };
        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &key)?)
    }

    pub fn decode_access_token(&self, token: &str) -> Result<AccessTokenDetails, JwtError> {
        if token.trim().is_empty() {
            return Err(JwtError::InvalidToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[AUDIENCE]);
        validation.required_spec_claims =
            HashSet::from(["sub".to_string(), "exp".to_string(), "aud".to_string()]);
        validation.leeway = 30;

        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let claims = decode::<AccessTokenClaims>(token, &key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                _ => JwtError::Jwt(e),
            })?
            .claims;

        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(JwtError::InvalidToken)?;
        Ok(AccessTokenDetails {
            user_id: claims.sub,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(SecretString::from("test-secret".to_string()))
    }

    #[test]
    fn test_issue_and_decode() {
        let jwt = service();
        let user_id = Uuid::new_v4();

        let token = jwt.issue_access_token(user_id).unwrap();
        let details = jwt.decode_access_token(&token).unwrap();

        assert_eq!(details.user_id, user_id);
        assert!(details.expires_at > Utc::now());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let jwt = service();
        let token = jwt
            .issue_with_ttl(Uuid::new_v4(), Duration::minutes(-10))
            .unwrap();

        assert!(matches!(
            jwt.decode_access_token(&token),
            Err(JwtError::TokenExpired)
        ));
    }

    #[test]
    fn test_wrong_secret_and_garbage_are_rejected() {
        let token = service().issue_access_token(Uuid::new_v4()).unwrap();
        let other = JwtService::new(SecretString::from("another-secret".to_string()));

        assert!(other.decode_access_token(&token).is_err());
        assert!(service().decode_access_token("not.a.token").is_err());
        assert!(matches!(
            service().decode_access_token("  "),
            Err(JwtError::InvalidToken)
        ));
    }
}
