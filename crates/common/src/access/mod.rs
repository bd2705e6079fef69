//! Access evaluation
//!
//! Decides whether a user may see an analysis and in what capacity. Two
//! lookup strategies feed one decision: direct ownership, then a grant
//! match by user id or case-insensitive email. A successful email-keyed
//! match with a still-null `shared_with_id` backfills the id (lazy identity
//! binding: a grant created before the invitee had an account becomes fully
//! keyed on first use).
//!
//! Every read and every mutating endpoint runs this before touching data;
//! there is no caching. The token-claim path is the one exception, since it
//! creates access rather than checking it.

use crate::db::models::Analysis;
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::identity::Identity;
use uuid::Uuid;

/// Outcome of a successful access check
#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub is_owner: bool,
    pub analysis: Analysis,
    pub owner_email: String,
}

impl AccessDecision {
    /// Gate owner-only mutations: title, file list, chat transcript,
    /// view/draft state, share management.
    pub fn require_owner(&self, what: &str) -> Result<()> {
        if self.is_owner {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: format!("Only the owner can {}", what),
            })
        }
    }
}

/// Evaluate access for a user against an analysis.
///
/// Returns None when the analysis does not exist or the user has neither
/// ownership nor a grant; callers report both as not-found so probers can't
/// distinguish denial from absence.
pub async fn evaluate(
    repo: &Repository,
    caller: &Identity,
    analysis_id: Uuid,
) -> Result<Option<AccessDecision>> {
    let Some((analysis, owner)) = repo.find_analysis_with_owner(analysis_id).await? else {
        return Ok(None);
    };

    if analysis.owner_id == caller.user_id {
        return Ok(Some(AccessDecision {
            is_owner: true,
            analysis,
            owner_email: owner.email,
        }));
    }

    let Some(grant) = repo
        .find_grant(analysis_id, caller.user_id, &caller.email)
        .await?
    else {
        return Ok(None);
    };

    if grant.shared_with_id.is_none() {
        repo.bind_grant_user(analysis_id, &caller.email, caller.user_id)
            .await?;
    }

    Ok(Some(AccessDecision {
        is_owner: false,
        analysis,
        owner_email: owner.email,
    }))
}

/// Evaluate access, converting denial into a not-found error
pub async fn require(
    repo: &Repository,
    caller: &Identity,
    analysis_id: Uuid,
) -> Result<AccessDecision> {
    evaluate(repo, caller, analysis_id)
        .await?
        .ok_or_else(|| AppError::AnalysisNotFound {
            id: analysis_id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::entity::prelude::DateTimeWithTimeZone;

    fn decision(is_owner: bool) -> AccessDecision {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        AccessDecision {
            is_owner,
            analysis: Analysis {
                id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                title: "Q3 report".to_string(),
                file_metadata: serde_json::json!([]),
                summary_response: None,
                comparison_response: None,
                language_response: None,
                table_view_state: None,
                draft_state: None,
                created_at: now,
                updated_at: now,
            },
            owner_email: "owner@x.com".to_string(),
        }
    }

    #[test]
    fn test_owner_passes_owner_gate() {
        assert!(decision(true).require_owner("update the title").is_ok());
    }

    #[test]
    fn test_collaborator_fails_owner_gate() {
        let err = decision(false)
            .require_owner("update the title")
            .unwrap_err();
        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::FORBIDDEN
        );
    }
}
