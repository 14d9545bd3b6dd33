use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::policy::Subject;
use crate::services::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String,  // user_id
    pub role: String, // user role (user, admin)
    pub exp: usize,   // expiration timestamp
    pub iat: usize,   // issued at timestamp
}

impl JwtClaims {
    /// Maps the token's role claim onto the policy subject. Unknown roles
    /// degrade to a plain authenticated user, never to admin.
    pub fn subject(&self) -> Subject {
        if self.role == "admin" {
            Subject::Admin(self.sub.clone())
        } else {
            Subject::User(self.sub.clone())
        }
    }
}

#[derive(Debug)]
pub enum AuthError {
    InvalidToken,
    ExpiredToken,
    MissingToken,
    InvalidSignature,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::ExpiredToken => write!(f, "Token expired"),
            AuthError::MissingToken => write!(f, "Missing authorization token"),
            AuthError::InvalidSignature => write!(f, "Invalid token signature"),
        }
    }
}

impl std::error::Error for AuthError {}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| AuthError::InvalidToken)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let validation = Validation::default();

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                if e.to_string().contains("ExpiredSignature") {
                    AuthError::ExpiredToken
                } else if e.to_string().contains("InvalidSignature") {
                    AuthError::InvalidSignature
                } else {
                    AuthError::InvalidToken
                }
            })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Requires a valid JWT; stores the resulting `Subject` in request
/// extensions for handlers.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(&headers).ok_or(StatusCode::UNAUTHORIZED)?;

    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let claims = jwt_service.validate_token(token).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    tracing::debug!("Authenticated user: {} (role: {})", claims.sub, claims.role);

    request.extensions_mut().insert(claims.subject());
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Allows anonymous callers. A valid token upgrades the subject; a missing
/// or invalid one leaves it `Anonymous` so listings fall back to the
/// active-only tier of the visibility policy.
pub async fn optional_auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let mut subject = Subject::Anonymous;

    if let Some(token) = bearer_token(&headers) {
        let jwt_service = JwtService::new(&state.config.jwt_secret);
        if let Ok(claims) = jwt_service.validate_token(token) {
            subject = claims.subject();
            request.extensions_mut().insert(claims);
        }
    }

    request.extensions_mut().insert(subject);

    next.run(request).await
}

pub async fn admin_guard_middleware(request: Request, next: Next) -> Result<Response, StatusCode> {
    if let Some(subject) = request.extensions().get::<Subject>() {
        if subject.is_admin() {
            return Ok(next.run(request).await);
        }
    }
    tracing::warn!("Access denied: admin role required");
    Err(StatusCode::FORBIDDEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_generation_and_validation() {
        let service = JwtService::new("test-secret");

        let claims = JwtClaims {
            sub: "user123".to_string(),
            role: "user".to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
            iat: chrono::Utc::now().timestamp() as usize,
        };

        let token = service.generate_token(claims.clone()).unwrap();
        let validated = service.validate_token(&token).unwrap();

        assert_eq!(validated.sub, claims.sub);
        assert_eq!(validated.role, claims.role);
    }

    #[test]
    fn role_claim_maps_to_subject() {
        let admin = JwtClaims {
            sub: "a1".into(),
            role: "admin".into(),
            exp: 0,
            iat: 0,
        };
        assert_eq!(admin.subject(), Subject::Admin("a1".into()));

        let user = JwtClaims {
            sub: "u1".into(),
            role: "user".into(),
            exp: 0,
            iat: 0,
        };
        assert_eq!(user.subject(), Subject::User("u1".into()));

        // Unknown roles never become admin.
        let odd = JwtClaims {
            sub: "u2".into(),
            role: "superuser".into(),
            exp: 0,
            iat: 0,
        };
        assert_eq!(odd.subject(), Subject::User("u2".into()));
    }
}
