use crate::api::AppState;
use crate::config::AuthConfig;
use crate::error::PostError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tracing::debug;

/// Validates HS256 bearer tokens issued by the identity service
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
    username_claim: String,
}

impl JwtValidator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            username_claim: config.username_claim.clone(),
        }
    }

    /// Username carried by a valid token
    pub fn principal(&self, token: &str) -> Result<String, PostError> {
        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation).map_err(|e| {
            debug!(error = %e, "Rejected bearer token");
            PostError::Unauthorized
        })?;

        data.claims
            .get(&self.username_claim)
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or(PostError::Unauthorized)
    }
}

/// Authenticated principal; the only source of a post's author
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = PostError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(PostError::Unauthorized)?;

        state.jwt.principal(token.trim()).map(AuthUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn validator() -> JwtValidator {
        JwtValidator::new(&AuthConfig {
            jwt_secret: "test-secret".to_string(),
            username_claim: "username".to_string(),
        })
    }

    fn token(secret: &str, claims: Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> i64 {
        4_102_444_800 // 2100-01-01
    }

    #[test]
    fn test_valid_token_yields_username() {
        let t = token("test-secret", json!({"username": "alice", "exp": far_future()}));
        assert_eq!(validator().principal(&t).unwrap(), "alice");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let t = token("other", json!({"username": "alice", "exp": far_future()}));
        assert!(matches!(validator().principal(&t), Err(PostError::Unauthorized)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let t = token("test-secret", json!({"username": "alice", "exp": 1_000_000}));
        assert!(validator().principal(&t).is_err());
    }

    #[test]
    fn test_missing_username_claim_rejected() {
        let t = token("test-secret", json!({"sub": "alice", "exp": far_future()}));
        assert!(validator().principal(&t).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(validator().principal("not-a-jwt").is_err());
    }
}
