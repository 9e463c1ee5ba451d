//! Authentication utilities
//!
//! Provides:
//! - JWT token generation and validation
//! - Argon2 password hashing
//! - Caller identity extraction for handlers
//! - The user directory (register, login, profile)

mod identity;

pub use identity::{
    CreateUserRequest, IdentityService, LoginRequest, LoginResponse, RegisterRequest,
};

use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::workflow::{Actor, Role};

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID from the token subject
    pub user_id: Uuid,

    pub role: Role,

    /// Request ID for tracing
    pub request_id: String,
}

impl AuthContext {
    /// The caller as seen by the workflow
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    pub role: Role,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: Uuid, role: Role) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>()).map_err(|e| {
        AppError::Internal {
            message: format!("Failed to encode salt: {}", e),
        }
    })?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Check a password against a stored PHC hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Extract the token from an Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Expected a Bearer token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let claims = jwt.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        Ok(AuthContext {
            user_id,
            role: claims.role,
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("secret123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret123", &hash));
        assert!(!verify_password("secret124", &hash));
    }

    #[test]
    fn test_password_hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);
        let user_id = Uuid::new_v4();

        let token = manager.generate_token(user_id, Role::Coordinator).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, Role::Coordinator);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_jwt_wrong_secret() {
        let token = JwtManager::new("one", 3600)
            .generate_token(Uuid::new_v4(), Role::Admin)
            .unwrap();
        let err = JwtManager::new("two", 3600).validate_token(&token).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[test]
    fn test_jwt_expired() {
        let manager = JwtManager::new("test_secret", 3600);
        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            sub: Uuid::new_v4().to_string(),
            role: Role::Author,
            exp: now - 3600,
            iat: now - 7200,
        };
        let token = encode(&Header::default(), &claims, &manager.encoding_key).unwrap();

        let err = manager.validate_token(&token).unwrap_err();
        assert!(matches!(err, AppError::ExpiredToken));
    }

    #[tokio::test]
    async fn test_extractor_reads_bearer_token() {
        let manager = Arc::new(JwtManager::new("test_secret", 3600));
        let user_id = Uuid::new_v4();
        let token = manager.generate_token(user_id, Role::Editor).unwrap();

        let request = axum::http::Request::builder()
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header("x-request-id", "req-1")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let ctx = AuthContext::from_request_parts(&mut parts, &manager).await.unwrap();
        assert_eq!(ctx.actor(), Actor::new(user_id, Role::Editor));
        assert_eq!(ctx.request_id, "req-1");
    }

    #[tokio::test]
    async fn test_extractor_requires_header() {
        let manager = Arc::new(JwtManager::new("test_secret", 3600));
        let (mut parts, _) = axum::http::Request::builder().body(()).unwrap().into_parts();

        let err = AuthContext::from_request_parts(&mut parts, &manager).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }
}
