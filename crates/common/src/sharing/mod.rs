//! Share registry
//!
//! Two independent grant mechanisms, both owner-initiated:
//! - email grants: a standing `SharedAnalysis` row keyed by email
//! - link grants: a capability token whose possession plus a successful
//!   claim creates a `SharedAnalysis` row
//!
//! Token states (`active -> expired | revoked | exhausted`) are evaluated
//! lazily at claim/validation time; there is no background sweep. An inert
//! token stops future claims but never retracts grants it already produced.

use crate::db::models::{ShareToken, SharedAnalysis};
use crate::db::Repository;
use crate::errors::{AppError, Result, ShareLinkInert};
use crate::identity::Identity;
use crate::metrics;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use uuid::Uuid;

/// 256 bits of entropy, rendered as 64 hex characters
const TOKEN_BYTES: usize = 32;

/// Lazily-evaluated token state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Revoked,
    Expired,
    Exhausted,
}

impl TokenState {
    pub fn inert_reason(&self) -> Option<ShareLinkInert> {
        match self {
            TokenState::Active => None,
            TokenState::Revoked => Some(ShareLinkInert::Revoked),
            TokenState::Expired => Some(ShareLinkInert::Expired),
            TokenState::Exhausted => Some(ShareLinkInert::MaxUsesReached),
        }
    }
}

/// Which kind of grant a revocation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareKind {
    Email,
    Link,
}

/// Result of a read-only token validation (landing-page preview)
#[derive(Debug, Clone)]
pub enum TokenValidation {
    Invalid {
        reason: &'static str,
    },
    Valid {
        analysis_id: Uuid,
        title: String,
        owner_email: String,
    },
}

/// Result of a successful claim
#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub analysis_id: Uuid,
    /// Set when no new grant was created (owner self-claim or re-claim)
    pub message: Option<&'static str>,
}

/// Generate a share token from the OS's cryptographically secure source.
///
/// Token guessability is a full capability bypass, so this must never fall
/// back to a seeded or thread-local generator.
pub fn generate_share_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Evaluate a token's state at a point in time
pub fn token_state(token: &ShareToken, now: DateTime<Utc>) -> TokenState {
    if !token.is_active {
        return TokenState::Revoked;
    }
    if let Some(expires_at) = token.expires_at {
        if now > expires_at {
            return TokenState::Expired;
        }
    }
    if let Some(max_uses) = token.max_uses {
        if token.use_count >= max_uses {
            return TokenState::Exhausted;
        }
    }
    TokenState::Active
}

/// Render the claim URL for a token
pub fn share_url(public_base_url: &str, token: &str) -> String {
    format!("{}/?share={}", public_base_url.trim_end_matches('/'), token)
}

/// Create an email grant. Caller must already be verified as the owner.
///
/// Pre-binds `shared_with_id` when the invitee already has an account;
/// otherwise the id stays null until the access evaluator backfills it.
pub async fn create_email_share(
    repo: &Repository,
    owner: &Identity,
    analysis_id: Uuid,
    target_email: &str,
) -> Result<SharedAnalysis> {
    let normalized = target_email.trim().to_lowercase();

    if normalized.is_empty() || !normalized.contains('@') {
        return Err(AppError::Validation {
            message: "Invalid email address".to_string(),
            field: Some("email".to_string()),
        });
    }

    if normalized == owner.email.to_lowercase() {
        return Err(AppError::Validation {
            message: "Cannot share with yourself".to_string(),
            field: Some("email".to_string()),
        });
    }

    if repo.email_share_exists(analysis_id, &normalized).await? {
        return Err(AppError::AlreadyShared { email: normalized });
    }

    let shared_with_id = repo
        .find_user_by_email_ci(&normalized)
        .await?
        .map(|u| u.id);

    let share = repo
        .insert_email_share(analysis_id, owner.user_id, shared_with_id, normalized)
        .await?;

    metrics::record_share_created("email");
    Ok(share)
}

/// Create a link grant. Caller must already be verified as the owner.
///
/// Non-positive `expires_in_days` means no expiry; non-positive `max_uses`
/// means unlimited.
pub async fn create_link_share(
    repo: &Repository,
    owner: &Identity,
    analysis_id: Uuid,
    expires_in_days: Option<i64>,
    max_uses: Option<i32>,
) -> Result<ShareToken> {
    let expires_at = expires_in_days
        .filter(|days| *days > 0)
        .map(|days| (Utc::now() + chrono::Duration::days(days)).into());

    let max_uses = max_uses.filter(|n| *n > 0);

    let token = generate_share_token();
    let share = repo
        .insert_share_token(analysis_id, owner.user_id, token, expires_at, max_uses)
        .await?;

    metrics::record_share_created("link");
    Ok(share)
}

/// Read-only token check for the landing page. Requires no authentication
/// and never mutates anything.
pub async fn validate_token(repo: &Repository, token: &str) -> Result<TokenValidation> {
    let Some(share_token) = repo.find_share_token(token).await? else {
        return Ok(TokenValidation::Invalid {
            reason: "not_found",
        });
    };

    if let Some(reason) = token_state(&share_token, Utc::now()).inert_reason() {
        return Ok(TokenValidation::Invalid {
            reason: reason.as_reason(),
        });
    }

    let (analysis, owner) = repo
        .find_analysis_with_owner(share_token.analysis_id)
        .await?
        .ok_or_else(|| AppError::Internal {
            message: "Share token references a missing analysis".to_string(),
        })?;

    Ok(TokenValidation::Valid {
        analysis_id: analysis.id,
        title: analysis.title,
        owner_email: owner.email,
    })
}

/// Claim a token, creating a grant for the claimant.
///
/// The same rules as validation apply, but failures are hard errors
/// (404/410) because a claim is an intentional mutation, not a probe.
/// Owner self-claims and re-claims succeed without creating a grant.
pub async fn claim_token(
    repo: &Repository,
    claimant: &Identity,
    token: &str,
) -> Result<ClaimOutcome> {
    let share_token = repo
        .find_share_token(token)
        .await?
        .ok_or(AppError::ShareLinkNotFound)?;

    if let Some(reason) = token_state(&share_token, Utc::now()).inert_reason() {
        metrics::record_share_claim("gone");
        return Err(AppError::ShareLinkGone(reason));
    }

    if share_token.owner_id == claimant.user_id {
        metrics::record_share_claim("owner");
        return Ok(ClaimOutcome {
            analysis_id: share_token.analysis_id,
            message: Some("You own this analysis"),
        });
    }

    let existing = repo
        .find_grant(share_token.analysis_id, claimant.user_id, &claimant.email)
        .await?;
    if existing.is_some() {
        metrics::record_share_claim("repeat");
        return Ok(ClaimOutcome {
            analysis_id: share_token.analysis_id,
            message: Some("Already have access"),
        });
    }

    let claimed = repo
        .claim_share_token(
            share_token.id,
            share_token.analysis_id,
            share_token.owner_id,
            claimant.user_id,
            &claimant.email,
        )
        .await?;

    if !claimed {
        // Another claim consumed the last use since our check
        metrics::record_share_claim("gone");
        let reason = repo
            .find_share_token(token)
            .await?
            .and_then(|t| token_state(&t, Utc::now()).inert_reason())
            .unwrap_or(ShareLinkInert::MaxUsesReached);
        return Err(AppError::ShareLinkGone(reason));
    }

    metrics::record_share_claim("granted");
    Ok(ClaimOutcome {
        analysis_id: share_token.analysis_id,
        message: None,
    })
}

/// Revoke a grant, scoped to analysis and owner so an owner can't revoke
/// another owner's share by guessing an id.
pub async fn revoke_share(
    repo: &Repository,
    owner: &Identity,
    analysis_id: Uuid,
    share_id: Uuid,
    kind: ShareKind,
) -> Result<()> {
    let deleted = match kind {
        ShareKind::Email => {
            repo.delete_email_share(share_id, analysis_id, owner.user_id)
                .await?
        }
        ShareKind::Link => {
            repo.delete_share_token(share_id, analysis_id, owner.user_id)
                .await?
        }
    };

    if !deleted {
        return Err(AppError::ShareNotFound {
            id: share_id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(
        is_active: bool,
        expires_in_secs: Option<i64>,
        max_uses: Option<i32>,
        use_count: i32,
    ) -> ShareToken {
        let now = Utc::now();
        ShareToken {
            id: Uuid::new_v4(),
            analysis_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            token: generate_share_token(),
            expires_at: expires_in_secs.map(|s| (now + chrono::Duration::seconds(s)).into()),
            max_uses,
            use_count,
            is_active,
            created_at: now.into(),
        }
    }

    #[test]
    fn test_token_format() {
        let token = generate_share_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_share_token(), generate_share_token());
    }

    #[test]
    fn test_active_token() {
        let t = token(true, Some(3600), Some(5), 4);
        assert_eq!(token_state(&t, Utc::now()), TokenState::Active);
    }

    #[test]
    fn test_revoked_wins_over_everything() {
        let t = token(false, Some(-10), Some(1), 5);
        assert_eq!(token_state(&t, Utc::now()), TokenState::Revoked);
    }

    #[test]
    fn test_expired_token() {
        // Expired trumps remaining uses
        let t = token(true, Some(-10), Some(5), 0);
        assert_eq!(token_state(&t, Utc::now()), TokenState::Expired);
    }

    #[test]
    fn test_exhausted_token() {
        let t = token(true, None, Some(1), 1);
        assert_eq!(token_state(&t, Utc::now()), TokenState::Exhausted);
    }

    #[test]
    fn test_no_limits_means_active() {
        let t = token(true, None, None, 1_000_000);
        assert_eq!(token_state(&t, Utc::now()), TokenState::Active);
    }

    #[test]
    fn test_share_url() {
        assert_eq!(
            share_url("https://doclens.example.com/", "abc123"),
            "https://doclens.example.com/?share=abc123"
        );
        assert_eq!(
            share_url("https://doclens.example.com", "abc123"),
            "https://doclens.example.com/?share=abc123"
        );
    }
}
