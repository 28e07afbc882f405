//! Session authentication module.
//!
//! Passwords are stored as argon2 PHC strings. A successful login opens a
//! server-side session whose random token travels in the `optics_session`
//! cookie or an `Authorization: Bearer` header.
//!
//! ```text
//! request ──► CurrentUser extractor
//!               │  cookie / Bearer token
//!               ▼
//!          users.session_user(token) ── none ──► 401 UNAUTHORIZED
//!               │
//!               ▼
//!          users.permissions(user)
//!               │
//!               ▼
//!          handler: current.require(Permission::ManageSales)? ── no ──► 403
//! ```

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use serde::Serialize;

use optics_core::admin::{Permission, PermissionSet, User};

use crate::error::ApiError;
use crate::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "optics_session";

/// Minimum length of a new password.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against its stored hash. A malformed hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Rejects passwords that are too short to be worth hashing.
pub fn check_password_strength(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::new(
            "VALIDATION_ERROR",
            format!("password: must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

/// `Set-Cookie` value for a new session. Without `max_age` the cookie
/// lasts until the browser closes.
pub fn session_cookie(token: &str, max_age: Option<i64>, secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
    if let Some(secs) = max_age {
        cookie.push_str(&format!("; Max-Age={secs}"));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", Some(0), secure)
}

/// Extract the session token from the cookie or a Bearer header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
        .filter(|token| !token.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(extract_bearer_token)
            .map(str::to_string)
    })
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Best-effort client address for the employee activity log.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

/// The logged-in user behind the request.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub user: User,
    pub permissions: PermissionSet,
    #[serde(skip)]
    pub token: String,
}

impl CurrentUser {
    /// Fails with 403 unless the user holds `permission`. Superusers hold
    /// every permission.
    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if self.user.is_superuser || self.permissions.allows(permission) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("Missing permission: {}", permission.as_str())))
        }
    }

    pub fn id(&self) -> Option<&str> {
        Some(self.user.id.as_str())
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or_else(|| ApiError::unauthorized("Login required"))?;

        let users = state.db.users();
        let user = users
            .session_user(&token)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Session expired or invalid"))?;
        let permissions = users.permissions(&user).await?;

        Ok(CurrentUser {
            user,
            permissions,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn test_cookie_max_age() {
        let browser = session_cookie("abc", None, false);
        assert!(browser.starts_with("optics_session=abc;"));
        assert!(!browser.contains("Max-Age"));

        let remembered = session_cookie("abc", Some(1_209_600), true);
        assert!(remembered.contains("Max-Age=1209600"));
        assert!(remembered.ends_with("; Secure"));
    }

    #[test]
    fn test_token_from_cookie_or_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; optics_session=tok123"));
        assert_eq!(session_token(&headers).as_deref(), Some("tok123"));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok456"));
        assert_eq!(session_token(&headers).as_deref(), Some("tok456"));

        assert!(session_token(&HeaderMap::new()).is_none());
        assert!(extract_bearer_token("Basic abc").is_none());
    }

    #[test]
    fn test_password_strength() {
        assert!(check_password_strength("short").is_err());
        assert!(check_password_strength("long enough").is_ok());
    }
}
