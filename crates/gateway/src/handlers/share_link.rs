//! Share-link validation and claim handlers
//!
//! GET is anonymous: the landing page probes a token before the user signs
//! in, so invalid tokens come back as a structured 200 rather than an
//! error. POST is the claim and requires identity.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::AppState;
use doclens_common::{
    db::Repository,
    errors::Result,
    identity::Identity,
    sharing::{self, TokenValidation},
};

#[derive(Serialize)]
#[serde(untagged)]
pub enum ValidateResponse {
    Invalid {
        valid: bool,
        error: &'static str,
    },
    Valid {
        valid: bool,
        analysis_id: uuid::Uuid,
        title: String,
        owner_email: String,
    },
}

/// Validate a share token for the landing page. No authentication, no
/// side effects.
pub async fn validate_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ValidateResponse>> {
    let repo = Repository::new(state.db.clone());

    let response = match sharing::validate_token(&repo, &token).await? {
        TokenValidation::Invalid { reason } => ValidateResponse::Invalid {
            valid: false,
            error: reason,
        },
        TokenValidation::Valid {
            analysis_id,
            title,
            owner_email,
        } => ValidateResponse::Valid {
            valid: true,
            analysis_id,
            title,
            owner_email,
        },
    };

    Ok(Json(response))
}

/// Claim a share token, granting the caller access
pub async fn claim_token(
    State(state): State<AppState>,
    caller: Identity,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let repo = Repository::new(state.db.clone());
    let outcome = sharing::claim_token(&repo, &caller, &token).await?;

    let mut body = serde_json::json!({
        "success": true,
        "analysis_id": outcome.analysis_id,
    });
    if let Some(message) = outcome.message {
        body["message"] = serde_json::Value::String(message.to_string());
    }

    Ok(Json(body))
}
