//! Identity resolution
//!
//! The caller's identity is an externally-verified email supplied by the
//! identity proxy in a request header. Resolution maps it to an internal
//! `User` row, creating one on first sight. There is no password or token
//! handling here; a missing header is simply an unauthenticated request
//! (with an optional configured fallback for local development).

use crate::config::{AppConfig, AuthConfig};
use crate::db::{DbPool, Repository};
use crate::errors::{AppError, Result};
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::sync::Arc;
use uuid::Uuid;

/// Resolved caller identity available to handlers
#[derive(Debug, Clone)]
pub struct Identity {
    /// Internal user id
    pub user_id: Uuid,

    /// Verified email exactly as supplied by the identity provider
    pub email: String,
}

/// Extract the verified caller email from request headers.
///
/// Returns the configured dev fallback when the identity header is absent
/// and a fallback is configured; otherwise None means unauthenticated.
pub fn caller_email(headers: &HeaderMap, auth: &AuthConfig) -> Option<String> {
    if let Some(value) = headers.get(auth.identity_header.as_str()) {
        if let Ok(email) = value.to_str() {
            if !email.is_empty() {
                return Some(email.to_string());
            }
        }
    }

    auth.dev_fallback_email.clone()
}

/// Resolve an email to a user row, creating one on first sight
pub async fn resolve(repo: &Repository, email: &str) -> Result<Identity> {
    let user = repo.find_or_create_user(email).await?;
    Ok(Identity {
        user_id: user.id,
        email: email.to_string(),
    })
}

/// Axum extractor: header -> email -> user row.
///
/// Every authenticated endpoint takes this as an argument; endpoints that
/// allow anonymous access (share-link validation) simply don't.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    DbPool: FromRef<S>,
    Arc<AppConfig>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let config = Arc::<AppConfig>::from_ref(state);

        let email = caller_email(&parts.headers, &config.auth)
            .ok_or_else(AppError::unauthenticated)?;

        let repo = Repository::new(DbPool::from_ref(state));
        resolve(&repo, &email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_config(fallback: Option<&str>) -> AuthConfig {
        AuthConfig {
            identity_header: "Cf-Access-Authenticated-User-Email".to_string(),
            dev_fallback_email: fallback.map(String::from),
            request_id_header: "X-Request-ID".to_string(),
        }
    }

    #[test]
    fn test_email_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Cf-Access-Authenticated-User-Email",
            "a@x.com".parse().unwrap(),
        );
        assert_eq!(
            caller_email(&headers, &auth_config(None)),
            Some("a@x.com".to_string())
        );
    }

    #[test]
    fn test_missing_header_without_fallback() {
        let headers = HeaderMap::new();
        assert_eq!(caller_email(&headers, &auth_config(None)), None);
    }

    #[test]
    fn test_missing_header_with_fallback() {
        let headers = HeaderMap::new();
        assert_eq!(
            caller_email(&headers, &auth_config(Some("local-dev@test.com"))),
            Some("local-dev@test.com".to_string())
        );
    }

    #[test]
    fn test_empty_header_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert("Cf-Access-Authenticated-User-Email", "".parse().unwrap());
        assert_eq!(
            caller_email(&headers, &auth_config(Some("local-dev@test.com"))),
            Some("local-dev@test.com".to_string())
        );
    }
}
