use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{errors::ServiceError, AppState};

/// JWT claims carried by a Bearer token. Token issuance lives with the
/// identity provider; this crate only validates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: usize,
}

/// The authenticated caller. Extracted once at the handler boundary and
/// passed down explicitly; services never reach into ambient security
/// context.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Administrator role required".to_string(),
            ))
        }
    }
}

/// Signs a token for the given user. Used by tests and tooling; the
/// production issuer lives outside this crate.
pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    roles: Vec<String>,
    ttl_secs: u64,
) -> Result<String, ServiceError> {
    let exp = chrono::Utc::now().timestamp() as usize + ttl_secs as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        roles,
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("Failed to sign token: {}", e)))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthenticated("Missing Authorization header".to_string())
            })?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| {
                ServiceError::Unauthenticated("Authorization header is not a Bearer token".into())
            })?
            .trim();

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| ServiceError::Unauthenticated(format!("Invalid token: {}", e)))?;

        let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| {
            ServiceError::Unauthenticated("Token subject is not a user id".to_string())
        })?;

        Ok(AuthUser {
            user_id,
            roles: data.claims.roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

    #[test]
    fn issued_token_round_trips() {
        let user_id = Uuid::new_v4();
        let token = issue_token(SECRET, user_id, vec!["admin".to_string()], 3600).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .expect("token should validate");
        assert_eq!(data.claims.sub, user_id.to_string());
        assert_eq!(data.claims.roles, vec!["admin".to_string()]);
    }

    #[test]
    fn role_checks() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            roles: vec!["customer".to_string()],
        };
        assert!(user.has_role("customer"));
        assert!(!user.is_admin());
        assert!(user.require_admin().is_err());

        let admin = AuthUser {
            user_id: Uuid::new_v4(),
            roles: vec!["admin".to_string()],
        };
        assert!(admin.require_admin().is_ok());
    }
}
