//! Share management handlers (owner view)
//!
//! Listing, creating, and revoking shares for a single analysis. A caller
//! with no access at all sees 404; a collaborator who is not the owner
//! sees 403.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use doclens_common::{
    access,
    db::Repository,
    errors::{AppError, Result},
    identity::Identity,
    sharing::{self, ShareKind},
};

type Timestamp = sea_orm::entity::prelude::DateTimeWithTimeZone;

#[derive(Serialize)]
pub struct EmailShareView {
    pub id: Uuid,
    pub shared_with_email: String,
    pub shared_with_id: Option<Uuid>,
    pub created_at: Timestamp,
}

#[derive(Serialize)]
pub struct LinkShareView {
    pub id: Uuid,
    pub token: String,
    pub url: String,
    pub expires_at: Option<Timestamp>,
    pub max_uses: Option<i32>,
    pub use_count: i32,
    pub is_active: bool,
    pub created_at: Timestamp,
}

#[derive(Serialize)]
pub struct ListSharesResponse {
    pub email_shares: Vec<EmailShareView>,
    pub link_shares: Vec<LinkShareView>,
}

async fn require_owner(
    repo: &Repository,
    caller: &Identity,
    analysis_id: Uuid,
) -> Result<()> {
    let decision = access::require(repo, caller, analysis_id).await?;
    decision.require_owner("manage shares")
}

/// List all shares for an analysis
pub async fn list_shares(
    State(state): State<AppState>,
    caller: Identity,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<ListSharesResponse>> {
    let repo = Repository::new(state.db.clone());
    require_owner(&repo, &caller, analysis_id).await?;

    let email_shares = repo
        .list_email_shares(analysis_id, caller.user_id)
        .await?
        .into_iter()
        .map(|s| EmailShareView {
            id: s.id,
            shared_with_email: s.shared_with_email,
            shared_with_id: s.shared_with_id,
            created_at: s.created_at,
        })
        .collect();

    let base_url = &state.config.server.public_base_url;
    let link_shares = repo
        .list_share_tokens(analysis_id, caller.user_id)
        .await?
        .into_iter()
        .map(|t| LinkShareView {
            id: t.id,
            url: sharing::share_url(base_url, &t.token),
            token: t.token,
            expires_at: t.expires_at,
            max_uses: t.max_uses,
            use_count: t.use_count,
            is_active: t.is_active,
            created_at: t.created_at,
        })
        .collect();

    Ok(Json(ListSharesResponse {
        email_shares,
        link_shares,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateShareRequest {
    #[serde(rename = "type")]
    pub share_type: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub expires_in_days: Option<i64>,
    pub max_uses: Option<i32>,
}

fn parse_kind(raw: Option<&str>) -> Result<ShareKind> {
    match raw {
        Some("email") => Ok(ShareKind::Email),
        Some("link") => Ok(ShareKind::Link),
        _ => Err(AppError::Validation {
            message: "type must be \"email\" or \"link\"".to_string(),
            field: Some("type".to_string()),
        }),
    }
}

/// Create an email grant or a link token
pub async fn create_share(
    State(state): State<AppState>,
    caller: Identity,
    Path(analysis_id): Path<Uuid>,
    Json(request): Json<CreateShareRequest>,
) -> Result<Json<serde_json::Value>> {
    // Validate request
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("email".to_string()),
    })?;

    let kind = parse_kind(request.share_type.as_deref())?;

    let repo = Repository::new(state.db.clone());
    require_owner(&repo, &caller, analysis_id).await?;

    match kind {
        ShareKind::Email => {
            let email = request.email.ok_or_else(|| AppError::Validation {
                message: "email is required for email shares".to_string(),
                field: Some("email".to_string()),
            })?;

            let share =
                sharing::create_email_share(&repo, &caller, analysis_id, &email).await?;

            Ok(Json(serde_json::json!({
                "success": true,
                "share_id": share.id,
                "shared_with_email": share.shared_with_email,
                "created_at": share.created_at,
            })))
        }
        ShareKind::Link => {
            let token = sharing::create_link_share(
                &repo,
                &caller,
                analysis_id,
                request.expires_in_days,
                request.max_uses,
            )
            .await?;

            let url = sharing::share_url(&state.config.server.public_base_url, &token.token);

            Ok(Json(serde_json::json!({
                "success": true,
                "share_id": token.id,
                "token": token.token,
                "url": url,
                "expires_at": token.expires_at,
                "max_uses": token.max_uses,
                "created_at": token.created_at,
            })))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RevokeShareRequest {
    pub share_id: Option<Uuid>,
    pub share_type: Option<String>,
}

/// Revoke a share by id
pub async fn revoke_share(
    State(state): State<AppState>,
    caller: Identity,
    Path(analysis_id): Path<Uuid>,
    Json(request): Json<RevokeShareRequest>,
) -> Result<Json<serde_json::Value>> {
    let share_id = request.share_id.ok_or_else(|| AppError::Validation {
        message: "share_id is required".to_string(),
        field: Some("share_id".to_string()),
    })?;
    let kind = parse_kind(request.share_type.as_deref())?;

    let repo = Repository::new(state.db.clone());
    require_owner(&repo, &caller, analysis_id).await?;

    sharing::revoke_share(&repo, &caller, analysis_id, share_id, kind).await?;

    Ok(Json(serde_json::json!({ "success": true })))
}
