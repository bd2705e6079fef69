//! Analysis duplication
//!
//! Deep-copies an analysis the caller can access into a fresh analysis the
//! caller owns: LLM responses, view state, chat transcript, and the full
//! note thread. Blob objects are copied best-effort; a file whose copy
//! fails keeps its entry in the new file list with the storage key cleared,
//! and the failure is reported as a warning rather than aborting the whole
//! duplication.
//!
//! Authorship of every copied note is reassigned to the caller. Original
//! timestamps are preserved so transcript and thread ordering survive.

use crate::db::models::{Analysis, FileRef};
use crate::db::repository::{NewAnalysis, NoteInsert};
use crate::db::Repository;
use crate::errors::Result;
use crate::identity::Identity;
use crate::metrics;
use crate::storage::{sanitize_filename, BlobStore, PutObject};
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use std::collections::HashMap;
use uuid::Uuid;

/// Result of a duplication
#[derive(Debug, Clone)]
pub struct DuplicateOutcome {
    pub analysis_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    /// One entry per file whose blob copy failed
    pub warnings: Vec<String>,
}

/// Duplicate `source` into a new analysis owned by `caller`.
///
/// The caller's access must already be verified. The new row goes through
/// the capped insert path, so duplicating at the cap evicts the caller's
/// oldest analysis like any other creation.
pub async fn duplicate_analysis(
    repo: &Repository,
    store: &dyn BlobStore,
    caller: &Identity,
    source: &Analysis,
    title_override: Option<String>,
) -> Result<DuplicateOutcome> {
    let title = title_override
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("Copy of {}", source.title));

    let copy = repo
        .create_analysis(
            caller.user_id,
            NewAnalysis {
                title: title.clone(),
                file_metadata: source.file_metadata.clone(),
                summary_response: source.summary_response.clone(),
                comparison_response: source.comparison_response.clone(),
                language_response: source.language_response.clone(),
                table_view_state: source.table_view_state.clone(),
            },
        )
        .await?;

    let files = FileRef::parse_list(&source.file_metadata);
    let (copied_files, warnings) = copy_files(store, caller.user_id, copy.id, files).await;
    repo.set_file_metadata(copy.id, FileRef::to_value(&copied_files))
        .await?;

    for message in repo.list_chat_messages(source.id).await? {
        repo.append_chat_message(
            copy.id,
            message.role,
            message.content,
            Some(message.created_at),
        )
        .await?;
    }

    copy_notes(repo, caller, source.id, copy.id).await?;

    metrics::record_duplication(warnings.len());
    Ok(DuplicateOutcome {
        analysis_id: copy.id,
        title,
        created_at: copy.created_at.into(),
        warnings,
    })
}

/// Copy each file's blob under the new owner/analysis prefix.
///
/// A file without a storage key passes through untouched. A failed copy
/// keeps the file entry but clears its key and etag so the viewer shows the
/// metadata without a dead download link.
pub async fn copy_files(
    store: &dyn BlobStore,
    new_owner_id: Uuid,
    new_analysis_id: Uuid,
    files: Vec<FileRef>,
) -> (Vec<FileRef>, Vec<String>) {
    let mut copied = Vec::with_capacity(files.len());
    let mut warnings = Vec::new();

    for mut file in files {
        let Some(source_key) = file.storage_key.take() else {
            copied.push(file);
            continue;
        };

        let filename = source_key
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| sanitize_filename(&file.original_filename));
        let new_key = format!("{}/{}/{}", new_owner_id, new_analysis_id, filename);

        match copy_one(store, &source_key, &new_key).await {
            Ok(etag) => {
                file.storage_key = Some(new_key);
                file.storage_etag = Some(etag);
            }
            Err(reason) => {
                tracing::warn!(
                    source_key = %source_key,
                    new_key = %new_key,
                    reason = %reason,
                    "File copy failed during duplication"
                );
                file.storage_etag = None;
                warnings.push(format!(
                    "Could not copy file '{}': {}",
                    file.original_filename, reason
                ));
            }
        }
        copied.push(file);
    }

    (copied, warnings)
}

async fn copy_one(
    store: &dyn BlobStore,
    source_key: &str,
    new_key: &str,
) -> std::result::Result<String, String> {
    let object = store
        .get(source_key)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "source object missing".to_string())?;

    store
        .put(
            new_key,
            PutObject {
                body: object.body,
                content_type: object.content_type,
                original_filename: object.original_filename,
            },
        )
        .await
        .map_err(|e| e.to_string())
}

/// Copy the note thread, reassigning authorship to the caller.
///
/// Top-level notes first, building an old-id to new-id map; replies follow,
/// re-pointed at their copied parents. A reply whose parent is missing from
/// the map is dropped, matching how thread assembly drops orphans.
async fn copy_notes(
    repo: &Repository,
    caller: &Identity,
    source_id: Uuid,
    copy_id: Uuid,
) -> Result<()> {
    let mut id_map: HashMap<Uuid, Uuid> = HashMap::new();

    for (note, _author) in repo.list_top_level_notes(source_id).await? {
        let created = repo
            .insert_note(note_copy(&note, caller, copy_id, None, note.created_at))
            .await?;
        id_map.insert(note.id, created.id);
    }

    for (reply, _author) in repo.list_replies(source_id).await? {
        let Some(new_parent) = reply
            .parent_note_id
            .and_then(|old| id_map.get(&old).copied())
        else {
            continue;
        };
        repo.insert_note(note_copy(
            &reply,
            caller,
            copy_id,
            Some(new_parent),
            reply.created_at,
        ))
        .await?;
    }

    Ok(())
}

fn note_copy(
    note: &crate::db::models::Note,
    caller: &Identity,
    analysis_id: Uuid,
    parent_note_id: Option<Uuid>,
    created_at: DateTimeWithTimeZone,
) -> NoteInsert {
    NoteInsert {
        analysis_id,
        author_id: caller.user_id,
        tab: note.tab.clone(),
        anchor_text: note.anchor_text.clone(),
        anchor_prefix: note.anchor_prefix.clone(),
        anchor_suffix: note.anchor_suffix.clone(),
        content: note.content.clone(),
        note_type: note.note_type(),
        parent_note_id,
        created_at: Some(created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;
    use serde_json::json;

    fn file(name: &str, key: Option<&str>) -> FileRef {
        FileRef {
            original_filename: name.to_string(),
            storage_key: key.map(String::from),
            storage_etag: key.map(|_| "old-etag".to_string()),
            size: Some(100),
            content_type: Some("application/pdf".to_string()),
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_copy_files_rewrites_keys() {
        let store = MemoryBlobStore::new();
        let old_owner = Uuid::new_v4();
        let old_analysis = Uuid::new_v4();
        let old_key = format!("{}/{}/report.pdf", old_owner, old_analysis);
        store
            .put(
                &old_key,
                PutObject {
                    body: b"pdf".to_vec(),
                    content_type: Some("application/pdf".to_string()),
                    original_filename: Some("report.pdf".to_string()),
                },
            )
            .await
            .unwrap();

        let new_owner = Uuid::new_v4();
        let new_analysis = Uuid::new_v4();
        let (copied, warnings) = copy_files(
            &store,
            new_owner,
            new_analysis,
            vec![file("report.pdf", Some(&old_key))],
        )
        .await;

        assert!(warnings.is_empty());
        let expected_key = format!("{}/{}/report.pdf", new_owner, new_analysis);
        assert_eq!(copied[0].storage_key.as_deref(), Some(expected_key.as_str()));
        assert!(copied[0].storage_etag.is_some());
        assert_ne!(copied[0].storage_etag.as_deref(), Some("old-etag"));

        let blob = store.get(&expected_key).await.unwrap().unwrap();
        assert_eq!(blob.body, b"pdf");
        // Original untouched
        assert!(store.get(&old_key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_copy_files_missing_blob_becomes_warning() {
        let store = MemoryBlobStore::new();
        let (copied, warnings) = copy_files(
            &store,
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![file("gone.pdf", Some("x/y/gone.pdf"))],
        )
        .await;

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("gone.pdf"));
        // Entry survives with no storage pointer
        assert_eq!(copied.len(), 1);
        assert!(copied[0].storage_key.is_none());
        assert!(copied[0].storage_etag.is_none());
        assert_eq!(copied[0].original_filename, "gone.pdf");
    }

    #[tokio::test]
    async fn test_copy_files_without_keys_pass_through() {
        let store = MemoryBlobStore::new();
        let (copied, warnings) =
            copy_files(&store, Uuid::new_v4(), Uuid::new_v4(), vec![file("meta-only.pdf", None)])
                .await;

        assert!(warnings.is_empty());
        assert_eq!(copied.len(), 1);
        assert!(copied[0].storage_key.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_copy_files_preserves_extra_fields() {
        let store = MemoryBlobStore::new();
        let mut f = file("report.pdf", None);
        f.extra.insert("pageCount".to_string(), json!(12));

        let (copied, _) = copy_files(&store, Uuid::new_v4(), Uuid::new_v4(), vec![f]).await;
        assert_eq!(copied[0].extra.get("pageCount"), Some(&json!(12)));
    }
}
