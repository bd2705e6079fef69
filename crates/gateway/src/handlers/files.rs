//! File upload and download handlers
//!
//! Documents are stored under `{owner_id}/{analysis_id}/{filename}` keys.
//! Upload is owner-only; download is open to anyone the access evaluator
//! admits, so collaborators can view shared documents.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::AppState;
use doclens_common::{
    access,
    db::models::FileRef,
    db::Repository,
    errors::{AppError, Result},
    identity::Identity,
    metrics,
    storage::{self, PutObject},
};

const PDF_CONTENT_TYPE: &str = "application/pdf";

struct Upload {
    analysis_id: Option<Uuid>,
    filename: Option<String>,
    content_type: Option<String>,
    body: Option<Vec<u8>>,
}

async fn read_multipart(mut multipart: Multipart) -> Result<Upload> {
    let mut upload = Upload {
        analysis_id: None,
        filename: None,
        content_type: None,
        body: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::Validation {
        message: format!("Invalid multipart body: {}", e),
        field: None,
    })? {
        match field.name() {
            Some("file") => {
                upload.filename = field.file_name().map(String::from);
                upload.content_type = field.content_type().map(String::from);
                upload.body = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation {
                            message: format!("Failed to read file: {}", e),
                            field: Some("file".to_string()),
                        })?
                        .to_vec(),
                );
            }
            Some("analysis_id") => {
                let text = field.text().await.map_err(|e| AppError::Validation {
                    message: format!("Failed to read analysis_id: {}", e),
                    field: Some("analysis_id".to_string()),
                })?;
                upload.analysis_id =
                    Some(Uuid::parse_str(text.trim()).map_err(|_| AppError::Validation {
                        message: "analysis_id must be a UUID".to_string(),
                        field: Some("analysis_id".to_string()),
                    })?);
            }
            _ => {}
        }
    }

    Ok(upload)
}

/// Upload a PDF into an analysis the caller owns
pub async fn upload_file(
    State(state): State<AppState>,
    caller: Identity,
    multipart: Multipart,
) -> Result<Json<FileRef>> {
    let upload = read_multipart(multipart).await?;

    let (analysis_id, body) = match (upload.analysis_id, upload.body) {
        (Some(id), Some(body)) => (id, body),
        _ => {
            return Err(AppError::Validation {
                message: "file and analysis_id are required".to_string(),
                field: None,
            })
        }
    };

    if upload.content_type.as_deref() != Some(PDF_CONTENT_TYPE) {
        return Err(AppError::Validation {
            message: "Only PDF files are supported".to_string(),
            field: Some("file".to_string()),
        });
    }

    let limit = state.config.storage.max_upload_bytes;
    if body.len() > limit {
        return Err(AppError::PayloadTooLarge {
            size: body.len(),
            limit,
        });
    }

    // Upload is owner-only; absence and denial both read as not-found
    let repo = Repository::new(state.db.clone());
    let analysis = repo
        .find_analysis(analysis_id)
        .await?
        .filter(|a| a.owner_id == caller.user_id)
        .ok_or_else(|| AppError::AnalysisNotFound {
            id: analysis_id.to_string(),
        })?;

    let original_filename = upload
        .filename
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| "document.pdf".to_string());
    let key = storage::object_key(caller.user_id, analysis.id, &original_filename);
    let size = body.len();

    let etag = state
        .blobs
        .put(
            &key,
            PutObject {
                body,
                content_type: Some(PDF_CONTENT_TYPE.to_string()),
                original_filename: Some(original_filename.clone()),
            },
        )
        .await?;

    metrics::record_upload(size);
    tracing::info!(key = %key, size, "File uploaded");

    Ok(Json(FileRef {
        original_filename,
        storage_key: Some(key),
        storage_etag: Some(etag),
        size: Some(size as i64),
        content_type: Some(PDF_CONTENT_TYPE.to_string()),
        extra: serde_json::Map::new(),
    }))
}

/// Stream a stored document back for inline viewing.
///
/// The key's embedded analysis id drives the access check, and the key's
/// owner segment must match that analysis's owner so a grant on one
/// analysis can't be used to read another owner's objects.
pub async fn download_file(
    State(state): State<AppState>,
    caller: Identity,
    Path(key): Path<String>,
) -> Result<Response> {
    let Some((key_owner_id, analysis_id, _filename)) = storage::parse_object_key(&key) else {
        return Err(AppError::Validation {
            message: "Invalid file path".to_string(),
            field: None,
        });
    };

    let repo = Repository::new(state.db.clone());
    let decision = access::require(&repo, &caller, analysis_id).await?;

    if decision.analysis.owner_id != key_owner_id {
        return Err(AppError::FileNotFound { key });
    }

    let object = state
        .blobs
        .get(&key)
        .await?
        .ok_or_else(|| AppError::FileNotFound { key: key.clone() })?;

    let filename = object
        .original_filename
        .unwrap_or_else(|| "document.pdf".to_string());
    let content_type = object
        .content_type
        .unwrap_or_else(|| PDF_CONTENT_TYPE.to_string());

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, parse_header(&content_type)?);
    headers.insert(
        header::CONTENT_DISPOSITION,
        parse_header(&format!("inline; filename=\"{}\"", filename))?,
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("private, max-age=3600"),
    );
    if let Some(etag) = object.etag {
        headers.insert(header::ETAG, parse_header(&etag)?);
    }

    Ok((headers, object.body).into_response())
}

fn parse_header(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| AppError::Internal {
        message: format!("Invalid header value: {}", e),
    })
}
