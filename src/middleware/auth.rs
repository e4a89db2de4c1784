//! Session handshake guard.
//!
//! The realtime protocol only begins once a connection is authenticated;
//! token issuance and identity storage live elsewhere. WebSocket clients
//! cannot always set headers, so the token is accepted either as a
//! `Bearer` authorization header or as a `token` query parameter.

use crate::error::{AppError, AppResult};
use actix_web::HttpRequest;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user id.
    pub sub: Uuid,
    /// Expiry, seconds since epoch.
    pub exp: usize,
}

pub fn verify_jwt(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT verification failed");
        AppError::Unauthorized
    })
}

/// Resolve the authenticated user for a WebSocket upgrade request.
pub fn authenticate(
    req: &HttpRequest,
    token_param: Option<&str>,
    secret: &str,
) -> AppResult<Uuid> {
    let token = token_param
        .map(|t| t.to_string())
        .or_else(|| {
            req.headers()
                .get(actix_web::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.to_string())
        })
        .ok_or(AppError::Unauthorized)?;

    Ok(verify_jwt(&token, secret)?.sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token_for(sub: Uuid, exp_offset_secs: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset_secs) as usize;
        encode(
            &Header::default(),
            &Claims { sub, exp },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_round_trips() {
        let user_id = Uuid::new_v4();
        let token = token_for(user_id, 3600);
        let claims = verify_jwt(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let token = token_for(Uuid::new_v4(), -3600);
        assert!(matches!(
            verify_jwt(&token, SECRET),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = token_for(Uuid::new_v4(), 3600);
        assert!(matches!(
            verify_jwt(&token, "other-secret"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn garbage_token_is_unauthorized() {
        assert!(matches!(
            verify_jwt("not.a.token", SECRET),
            Err(AppError::Unauthorized)
        ));
    }
}
