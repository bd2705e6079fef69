//! Analysis handlers
//!
//! CRUD over analysis records plus the PATCH multiplex the client uses for
//! everything that mutates an open analysis: owner-only field updates and
//! note operations (one note operation handled per request).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::AppState;
use doclens_common::{
    access,
    db::models::{FileRef, NoteType},
    db::repository::NewAnalysis,
    db::Repository,
    duplication,
    errors::{AppError, Result},
    identity::Identity,
    notes,
};

type Timestamp = sea_orm::entity::prelude::DateTimeWithTimeZone;

/// One row in the history list
#[derive(Serialize)]
pub struct AnalysisSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: Timestamp,
    pub file_metadata: serde_json::Value,
    pub is_owner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
}

#[derive(Serialize)]
pub struct ListAnalysesResponse {
    pub current_user_email: String,
    pub analyses: Vec<AnalysisSummary>,
    pub shared_analyses: Vec<AnalysisSummary>,
}

/// List the caller's own analyses plus those shared with them
pub async fn list_analyses(
    State(state): State<AppState>,
    caller: Identity,
) -> Result<Json<ListAnalysesResponse>> {
    let repo = Repository::new(state.db.clone());

    let owned = repo
        .list_owned_analyses(caller.user_id)
        .await?
        .into_iter()
        .map(|a| AnalysisSummary {
            id: a.id,
            title: a.title,
            created_at: a.created_at,
            file_metadata: a.file_metadata,
            is_owner: true,
            owner_email: None,
        })
        .collect();

    let shared = repo
        .list_shared_analyses(caller.user_id, &caller.email)
        .await?
        .into_iter()
        .map(|(a, owner)| AnalysisSummary {
            id: a.id,
            title: a.title,
            created_at: a.created_at,
            file_metadata: a.file_metadata,
            is_owner: false,
            owner_email: Some(owner.email),
        })
        .collect();

    Ok(Json(ListAnalysesResponse {
        current_user_email: caller.email,
        analyses: owned,
        shared_analyses: shared,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateAnalysisRequest {
    pub title: Option<String>,
    pub file_metadata: Option<serde_json::Value>,
    pub summary_response: Option<String>,
    pub comparison_response: Option<String>,
    pub language_response: Option<String>,
}

#[derive(Serialize)]
pub struct CreateAnalysisResponse {
    pub id: Uuid,
    pub created_at: Timestamp,
}

/// Create an analysis, evicting the caller's oldest rows past the cap
pub async fn create_analysis(
    State(state): State<AppState>,
    caller: Identity,
    Json(request): Json<CreateAnalysisRequest>,
) -> Result<(StatusCode, Json<CreateAnalysisResponse>)> {
    let file_metadata = match request.file_metadata {
        Some(value @ serde_json::Value::Array(_)) => value,
        _ => {
            return Err(AppError::Validation {
                message: "file_metadata is required and must be an array".to_string(),
                field: Some("file_metadata".to_string()),
            })
        }
    };

    let repo = Repository::new(state.db.clone());
    let analysis = repo
        .create_analysis(
            caller.user_id,
            NewAnalysis {
                title: request
                    .title
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "Untitled Analysis".to_string()),
                file_metadata,
                summary_response: request.summary_response,
                comparison_response: request.comparison_response,
                language_response: request.language_response,
                table_view_state: None,
            },
        )
        .await?;

    tracing::info!(analysis_id = %analysis.id, owner = %caller.email, "Analysis created");

    Ok((
        StatusCode::CREATED,
        Json(CreateAnalysisResponse {
            id: analysis.id,
            created_at: analysis.created_at,
        }),
    ))
}

#[derive(Serialize)]
pub struct ChatMessageView {
    pub role: String,
    pub content: String,
    pub timestamp: Timestamp,
}

#[derive(Serialize)]
pub struct AnalysisResponse {
    pub id: Uuid,
    pub title: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub file_metadata: serde_json::Value,
    pub summary_response: Option<String>,
    pub comparison_response: Option<String>,
    pub language_response: Option<String>,
    pub table_view_state: Option<serde_json::Value>,
    pub draft_state: Option<serde_json::Value>,
    pub is_owner: bool,
    pub owner_email: String,
    pub chat_messages: Vec<ChatMessageView>,
    pub notes: Vec<notes::NoteView>,
}

/// Load a full analysis: record, transcript, and note thread
pub async fn get_analysis(
    State(state): State<AppState>,
    caller: Identity,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<AnalysisResponse>> {
    let repo = Repository::new(state.db.clone());
    let decision = access::require(&repo, &caller, analysis_id).await?;

    let chat_messages = repo
        .list_chat_messages(analysis_id)
        .await?
        .into_iter()
        .map(|m| ChatMessageView {
            role: m.role,
            content: m.content,
            timestamp: m.created_at,
        })
        .collect();

    let notes = notes::load_thread(&repo, analysis_id).await?;

    let analysis = decision.analysis;
    Ok(Json(AnalysisResponse {
        id: analysis.id,
        title: analysis.title,
        created_at: analysis.created_at,
        updated_at: analysis.updated_at,
        file_metadata: analysis.file_metadata,
        summary_response: analysis.summary_response,
        comparison_response: analysis.comparison_response,
        language_response: analysis.language_response,
        table_view_state: analysis.table_view_state,
        draft_state: analysis.draft_state,
        is_owner: decision.is_owner,
        owner_email: decision.owner_email,
        chat_messages,
        notes,
    }))
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub role: Option<String>,
    pub content: Option<String>,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AddNoteBody {
    pub tab: Option<String>,
    pub anchor_text: Option<String>,
    pub anchor_prefix: Option<String>,
    pub anchor_suffix: Option<String>,
    pub content: Option<String>,
    pub note_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddReplyBody {
    pub parent_note_id: Option<Uuid>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteBody {
    pub note_id: Option<Uuid>,
    pub content: Option<String>,
    pub note_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteNoteBody {
    pub note_id: Option<Uuid>,
}

/// Deserialize a field that distinguishes JSON `null` from absence.
/// Absent stays `None` via `#[serde(default)]`; an explicit `null` arrives
/// as `Some(Value::Null)`.
fn deserialize_some<'de, D>(deserializer: D) -> std::result::Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct PatchAnalysisRequest {
    pub title: Option<String>,
    pub file_metadata: Option<serde_json::Value>,
    pub new_messages: Option<Vec<IncomingMessage>>,
    pub table_view_state: Option<serde_json::Map<String, serde_json::Value>>,

    /// `null` clears the draft; an absent field leaves it alone
    #[serde(default, deserialize_with = "deserialize_some")]
    pub draft_state: Option<serde_json::Value>,

    pub add_note: Option<AddNoteBody>,
    pub add_reply: Option<AddReplyBody>,
    pub update_note: Option<UpdateNoteBody>,
    pub delete_note: Option<DeleteNoteBody>,
}

impl PatchAnalysisRequest {
    /// An empty title reads as absent, so a collaborator sending one
    /// alongside a note operation doesn't trip the owner gate.
    fn has_owner_fields(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.is_empty())
            || self.file_metadata.is_some()
            || self.new_messages.is_some()
            || self.table_view_state.is_some()
            || self.draft_state.is_some()
    }

    fn has_note_op(&self) -> bool {
        self.add_note.is_some()
            || self.add_reply.is_some()
            || self.update_note.is_some()
            || self.delete_note.is_some()
    }
}

/// Apply a PATCH multiplex request.
///
/// Owner-only field updates run first; a note operation (at most one per
/// request) then produces its own response shape.
pub async fn patch_analysis(
    State(state): State<AppState>,
    caller: Identity,
    Path(analysis_id): Path<Uuid>,
    Json(request): Json<PatchAnalysisRequest>,
) -> Result<Json<serde_json::Value>> {
    let has_owner_fields = request.has_owner_fields();
    let has_note_op = request.has_note_op();

    if !has_owner_fields && !has_note_op {
        return Err(AppError::Validation {
            message: "At least one update field is required".to_string(),
            field: None,
        });
    }

    let repo = Repository::new(state.db.clone());
    let decision = access::require(&repo, &caller, analysis_id).await?;

    if has_owner_fields {
        decision.require_owner(
            "update title, file metadata, chat messages, table view state, or draft state",
        )?;

        if let Some(title) = request.title.filter(|t| !t.is_empty()) {
            repo.set_analysis_title(analysis_id, title).await?;
        }

        if let Some(file_metadata) = request.file_metadata {
            if !file_metadata.is_array() {
                return Err(AppError::Validation {
                    message: "file_metadata must be an array".to_string(),
                    field: Some("file_metadata".to_string()),
                });
            }
            repo.set_file_metadata(analysis_id, file_metadata).await?;
        }

        if let Some(patch) = request.table_view_state {
            repo.merge_table_view_state(analysis_id, patch).await?;
        }

        if let Some(draft_state) = request.draft_state {
            repo.set_draft_state(analysis_id, draft_state).await?;
        }

        if let Some(messages) = request.new_messages {
            for msg in messages {
                if let (Some(role), Some(content)) = (msg.role, msg.content) {
                    repo.append_chat_message(
                        analysis_id,
                        role,
                        content,
                        msg.timestamp.map(Into::into),
                    )
                    .await?;
                }
            }
            repo.touch_analysis(analysis_id).await?;
        }

        if !has_note_op {
            return Ok(Json(serde_json::json!({ "success": true })));
        }
    }

    // Note operations: any accessor, at most one per request
    let (add_note, add_reply, update_note, delete_note) = (
        request.add_note,
        request.add_reply,
        request.update_note,
        request.delete_note,
    );

    if let Some(body) = add_note {
        let note = notes::add_note(
            &repo,
            &caller,
            analysis_id,
            notes::NewNote {
                tab: body.tab.unwrap_or_default(),
                anchor_text: body.anchor_text.unwrap_or_default(),
                anchor_prefix: body.anchor_prefix,
                anchor_suffix: body.anchor_suffix,
                content: body.content.unwrap_or_default(),
                note_type: NoteType::coerce(body.note_type.as_deref()),
            },
        )
        .await?;

        return Ok(Json(serde_json::json!({
            "success": true,
            "note_id": note.id,
            "created_at": note.created_at,
            "author_email": caller.email,
        })));
    }

    if let Some(body) = add_reply {
        let parent_note_id = body.parent_note_id.ok_or_else(|| AppError::Validation {
            message: "add_reply requires parent_note_id and content".to_string(),
            field: None,
        })?;
        let reply = notes::add_reply(
            &repo,
            &caller,
            analysis_id,
            parent_note_id,
            body.content.unwrap_or_default(),
        )
        .await?;

        return Ok(Json(serde_json::json!({
            "success": true,
            "reply_id": reply.id,
            "created_at": reply.created_at,
            "author_email": caller.email,
        })));
    }

    if let Some(body) = update_note {
        let note_id = body.note_id.ok_or_else(|| AppError::Validation {
            message: "update_note requires note_id and at least one of content or note_type"
                .to_string(),
            field: None,
        })?;
        let note_type = body.note_type.as_deref().map(|t| NoteType::coerce(Some(t)));
        let updated =
            notes::update_note(&repo, &caller, analysis_id, note_id, body.content, note_type)
                .await?;

        return Ok(Json(serde_json::json!({
            "success": true,
            "updated_at": updated.updated_at,
        })));
    }

    if let Some(body) = delete_note {
        let note_id = body.note_id.ok_or_else(|| AppError::Validation {
            message: "delete_note requires note_id".to_string(),
            field: None,
        })?;
        notes::delete_note(&repo, &caller, analysis_id, note_id).await?;
        return Ok(Json(serde_json::json!({ "success": true })));
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Delete an analysis the caller owns. Blob objects are cleaned up
/// best-effort; database rows cascade.
pub async fn delete_analysis(
    State(state): State<AppState>,
    caller: Identity,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let repo = Repository::new(state.db.clone());

    let analysis = repo
        .delete_analysis(analysis_id, caller.user_id)
        .await?
        .ok_or_else(|| AppError::AnalysisNotFound {
            id: analysis_id.to_string(),
        })?;

    for file in FileRef::parse_list(&analysis.file_metadata) {
        if let Some(key) = file.storage_key {
            if let Err(e) = state.blobs.delete(&key).await {
                tracing::warn!(key = %key, error = %e, "Blob cleanup failed during analysis delete");
            }
        }
    }

    tracing::info!(analysis_id = %analysis_id, owner = %caller.email, "Analysis deleted");

    Ok(Json(serde_json::json!({
        "success": true,
        "deleted": analysis_id,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct DuplicateRequest {
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct DuplicateResponse {
    pub success: bool,
    pub analysis_id: Uuid,
    pub title: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub warnings: Vec<String>,
}

/// Duplicate an analysis the caller can access into one they own
pub async fn duplicate_analysis(
    State(state): State<AppState>,
    caller: Identity,
    Path(analysis_id): Path<Uuid>,
    body: Option<Json<DuplicateRequest>>,
) -> Result<(StatusCode, Json<DuplicateResponse>)> {
    let repo = Repository::new(state.db.clone());
    let decision = access::require(&repo, &caller, analysis_id).await?;

    let title_override = body.and_then(|Json(b)| b.title);
    let outcome = duplication::duplicate_analysis(
        &repo,
        state.blobs.as_ref(),
        &caller,
        &decision.analysis,
        title_override,
    )
    .await?;

    tracing::info!(
        source_id = %analysis_id,
        analysis_id = %outcome.analysis_id,
        warnings = outcome.warnings.len(),
        "Analysis duplicated"
    );

    Ok((
        StatusCode::CREATED,
        Json(DuplicateResponse {
            success: true,
            analysis_id: outcome.analysis_id,
            title: outcome.title,
            created_at: outcome.created_at,
            warnings: outcome.warnings,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> PatchAnalysisRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_empty_title_is_not_an_owner_field() {
        // A collaborator's client may send title: "" alongside a note op;
        // that must not trip the owner gate.
        let request = parse(r#"{"title": "", "add_note": {"tab": "summary"}}"#);
        assert!(!request.has_owner_fields());
        assert!(request.has_note_op());
    }

    #[test]
    fn test_nonempty_title_is_an_owner_field() {
        let request = parse(r#"{"title": "Renamed"}"#);
        assert!(request.has_owner_fields());
        assert!(!request.has_note_op());
    }

    #[test]
    fn test_owner_fields_and_note_op_coexist() {
        let request = parse(
            r#"{"new_messages": [{"role": "user", "content": "hi"}],
                "delete_note": {"note_id": "7f1a0d60-5b7a-4b3e-9a3f-0c2d4e5f6a7b"}}"#,
        );
        assert!(request.has_owner_fields());
        assert!(request.has_note_op());
    }

    #[test]
    fn test_draft_state_null_is_present() {
        // Explicit null clears the draft; an absent field leaves it alone
        let request = parse(r#"{"draft_state": null}"#);
        assert_eq!(request.draft_state, Some(serde_json::Value::Null));
        assert!(request.has_owner_fields());

        let request = parse(r#"{"title": "x"}"#);
        assert_eq!(request.draft_state, None);
    }

    #[test]
    fn test_empty_patch_has_nothing() {
        let request = parse("{}");
        assert!(!request.has_owner_fields());
        assert!(!request.has_note_op());
    }
}
