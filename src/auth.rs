//! Password hashing, login and bearer tokens.

use crate::config::AuthConfig;
use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::types::{LoginRequest, User};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

const BEARER_PREFIX: &str = "Bearer ";

/// The authenticated user, stored as a request extension by the auth layer.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    /// Fail with `Forbidden` unless the caller is `user_id`.
    pub fn ensure_is(&self, user_id: i64) -> ApiResult<()> {
        if self.id() == user_id {
            Ok(())
        } else {
            Err(ApiError::forbidden("users may only modify their own account"))
        }
    }
}

pub fn hash_password(password: &str, cost: u32) -> ApiResult<String> {
    bcrypt::hash(password, cost).map_err(ApiError::internal)
}

/// Check a password against a stored digest. A malformed digest never matches.
pub fn verify_password(password: &str, digest: &str) -> bool {
    match bcrypt::verify(password, digest) {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password digest is unreadable");
            false
        }
    }
}

/// Verify credentials and open a session. Unknown users and wrong passwords
/// give the same `Unauthorized` error.
pub fn login(db: &Database, config: &AuthConfig, request: &LoginRequest) -> ApiResult<String> {
    let user = db
        .get_user_by_email(&request.username)?
        .filter(|user| verify_password(&request.password, &user.password_digest))
        .ok_or_else(|| ApiError::unauthorized("invalid username or password"))?;

    let token = db.create_session(user.id, config.token_ttl_seconds)?;
    tracing::info!(user_id = user.id, "User logged in");
    Ok(token)
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve request headers to the logged-in user.
pub fn authenticate(db: &Database, headers: &HeaderMap) -> ApiResult<CurrentUser> {
    let token = bearer_token(headers).ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    db.user_for_token(token)?
        .map(CurrentUser)
        .ok_or_else(|| ApiError::unauthorized("invalid or expired token"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::UserCreate;
    use axum::http::HeaderValue;

    const TEST_COST: u32 = 4;

    fn db_with_user(email: &str, password: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        let digest = hash_password(password, TEST_COST).unwrap();
        let input = UserCreate {
            first_name: None,
            last_name: None,
            email: email.into(),
            password: password.into(),
        };
        db.create_user(&input, &digest).unwrap();
        db
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_hash_and_verify() {
        let digest = hash_password("qwerty", TEST_COST).unwrap();
        assert_ne!(digest, "qwerty");
        assert!(verify_password("qwerty", &digest));
        assert!(!verify_password("qwertz", &digest));
        assert!(!verify_password("qwerty", "not-a-digest"));
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_login_then_authenticate() {
        let db = db_with_user("ada@example.com", "secret");
        let config = AuthConfig::default();

        let token = login(
            &db,
            &config,
            &LoginRequest {
                username: "ada@example.com".into(),
                password: "secret".into(),
            },
        )
        .unwrap();

        let current = authenticate(&db, &headers(&format!("Bearer {token}"))).unwrap();
        assert_eq!(current.0.email, "ada@example.com");
        assert!(current.ensure_is(current.id()).is_ok());
        assert_eq!(
            current.ensure_is(current.id() + 1).unwrap_err().code,
            ErrorCode::Forbidden
        );
    }

    #[test]
    fn test_login_rejects_bad_credentials() {
        let db = db_with_user("ada@example.com", "secret");
        let config = AuthConfig::default();

        for (username, password) in [("ada@example.com", "wrong"), ("bob@example.com", "secret")] {
            let err = login(
                &db,
                &config,
                &LoginRequest {
                    username: username.into(),
                    password: password.into(),
                },
            )
            .unwrap_err();
            assert_eq!(err.code, ErrorCode::Unauthorized);
        }
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let db = db_with_user("ada@example.com", "secret");
        let user = db.get_user_by_email("ada@example.com").unwrap().unwrap();
        let token = db.create_session(user.id, -1).unwrap();

        let err = authenticate(&db, &headers(&format!("Bearer {token}"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }
}
