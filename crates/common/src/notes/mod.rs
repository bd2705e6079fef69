//! Note thread store
//!
//! Two-level note trees over an analysis: anchored top-level notes and
//! their replies. Adding is open to anyone with access; editing and
//! deleting are author-restricted, analysis ownership notwithstanding.
//! Every successful mutation bumps the parent analysis's `updated_at`.

use crate::db::models::{Note, NoteType, User};
use crate::db::repository::NoteInsert;
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::identity::Identity;
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Fields for a new top-level note
#[derive(Debug, Clone)]
pub struct NewNote {
    pub tab: String,
    pub anchor_text: String,
    pub anchor_prefix: Option<String>,
    pub anchor_suffix: Option<String>,
    pub content: String,
    pub note_type: NoteType,
}

/// A reply as rendered in a thread
#[derive(Debug, Clone, Serialize)]
pub struct ReplyView {
    pub id: Uuid,
    pub content: String,
    pub author_email: Option<String>,
    pub author_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

/// A top-level note with its ordered replies
#[derive(Debug, Clone, Serialize)]
pub struct NoteView {
    pub id: Uuid,
    pub tab: String,
    pub anchor_text: String,
    pub anchor_prefix: Option<String>,
    pub anchor_suffix: Option<String>,
    pub content: String,
    pub note_type: NoteType,
    pub author_email: Option<String>,
    pub author_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub replies: Vec<ReplyView>,
}

/// Only the note's author may edit or delete it; owning the analysis
/// grants no override.
pub fn ensure_author(note: &Note, caller: &Identity) -> Result<()> {
    if note.author_id != caller.user_id {
        return Err(AppError::NotNoteAuthor);
    }
    Ok(())
}

/// Build the row for a reply: the parent's tab and anchor fields carry over
/// verbatim so the reply renders at the same document location. Replies are
/// always `observational`.
pub fn reply_insert(parent: Note, author_id: Uuid, content: String) -> NoteInsert {
    NoteInsert {
        analysis_id: parent.analysis_id,
        author_id,
        tab: parent.tab,
        anchor_text: parent.anchor_text,
        anchor_prefix: parent.anchor_prefix,
        anchor_suffix: parent.anchor_suffix,
        content,
        note_type: NoteType::Observational,
        parent_note_id: Some(parent.id),
        created_at: None,
    }
}

/// Add a top-level note. Any accessor may do this.
pub async fn add_note(
    repo: &Repository,
    caller: &Identity,
    analysis_id: Uuid,
    new: NewNote,
) -> Result<Note> {
    if new.tab.is_empty() || new.anchor_text.is_empty() || new.content.is_empty() {
        return Err(AppError::Validation {
            message: "add_note requires tab, anchor_text, and content".to_string(),
            field: None,
        });
    }

    let note = repo
        .insert_note(NoteInsert {
            analysis_id,
            author_id: caller.user_id,
            tab: new.tab,
            anchor_text: new.anchor_text,
            anchor_prefix: new.anchor_prefix,
            anchor_suffix: new.anchor_suffix,
            content: new.content,
            note_type: new.note_type,
            parent_note_id: None,
            created_at: None,
        })
        .await?;

    repo.touch_analysis(analysis_id).await?;
    Ok(note)
}

/// Add a reply to an existing note in the same analysis.
///
/// The reply inherits the parent's tab and anchor fields verbatim, so it
/// renders attached to the same document location.
pub async fn add_reply(
    repo: &Repository,
    caller: &Identity,
    analysis_id: Uuid,
    parent_note_id: Uuid,
    content: String,
) -> Result<Note> {
    if content.is_empty() {
        return Err(AppError::Validation {
            message: "add_reply requires parent_note_id and content".to_string(),
            field: None,
        });
    }

    let parent = repo
        .find_note(parent_note_id, analysis_id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource_type: "parent note".to_string(),
            id: parent_note_id.to_string(),
        })?;

    let reply = repo
        .insert_note(reply_insert(parent, caller.user_id, content))
        .await?;

    repo.touch_analysis(analysis_id).await?;
    Ok(reply)
}

/// Update a note's content and/or type. Author-only.
pub async fn update_note(
    repo: &Repository,
    caller: &Identity,
    analysis_id: Uuid,
    note_id: Uuid,
    content: Option<String>,
    note_type: Option<NoteType>,
) -> Result<Note> {
    if content.is_none() && note_type.is_none() {
        return Err(AppError::Validation {
            message: "update_note requires note_id and at least one of content or note_type"
                .to_string(),
            field: None,
        });
    }

    let note = repo
        .find_note(note_id, analysis_id)
        .await?
        .ok_or_else(|| AppError::NoteNotFound {
            id: note_id.to_string(),
        })?;

    ensure_author(&note, caller)?;

    let updated = repo.update_note(note, content, note_type).await?;
    repo.touch_analysis(analysis_id).await?;
    Ok(updated)
}

/// Delete a note. Author-only; replies cascade.
pub async fn delete_note(
    repo: &Repository,
    caller: &Identity,
    analysis_id: Uuid,
    note_id: Uuid,
) -> Result<()> {
    let note = repo
        .find_note(note_id, analysis_id)
        .await?
        .ok_or_else(|| AppError::NoteNotFound {
            id: note_id.to_string(),
        })?;

    ensure_author(&note, caller)?;

    repo.delete_note(note_id).await?;
    repo.touch_analysis(analysis_id).await?;
    Ok(())
}

/// Load the full thread for an analysis: top-level notes in creation order,
/// each carrying its replies in creation order.
pub async fn load_thread(repo: &Repository, analysis_id: Uuid) -> Result<Vec<NoteView>> {
    let top_level = repo.list_top_level_notes(analysis_id).await?;
    let replies = repo.list_replies(analysis_id).await?;
    Ok(assemble_thread(top_level, replies))
}

/// Two-pass grouping: replies are bucketed by `parent_note_id`, then
/// attached to their parents. Sufficient because nesting is exactly one
/// level deep; a reply to a missing parent is dropped.
pub fn assemble_thread(
    top_level: Vec<(Note, Option<User>)>,
    replies: Vec<(Note, Option<User>)>,
) -> Vec<NoteView> {
    let mut replies_by_parent: HashMap<Uuid, Vec<ReplyView>> = HashMap::new();
    for (reply, author) in replies {
        let Some(parent_id) = reply.parent_note_id else {
            continue;
        };
        replies_by_parent
            .entry(parent_id)
            .or_default()
            .push(ReplyView {
                id: reply.id,
                content: reply.content,
                author_email: author.map(|u| u.email),
                author_id: reply.author_id,
                created_at: reply.created_at,
                updated_at: reply.updated_at,
            });
    }

    top_level
        .into_iter()
        .map(|(note, author)| {
            let note_type = note.note_type();
            NoteView {
                replies: replies_by_parent.remove(&note.id).unwrap_or_default(),
                id: note.id,
                tab: note.tab,
                anchor_text: note.anchor_text,
                anchor_prefix: note.anchor_prefix,
                anchor_suffix: note.anchor_suffix,
                content: note.content,
                note_type,
                author_email: author.map(|u| u.email),
                author_id: note.author_id,
                created_at: note.created_at,
                updated_at: note.updated_at,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn note(
        analysis_id: Uuid,
        author: &User,
        parent: Option<Uuid>,
        content: &str,
        offset_secs: i64,
    ) -> Note {
        let at: DateTimeWithTimeZone = (Utc::now() + Duration::seconds(offset_secs)).into();
        Note {
            id: Uuid::new_v4(),
            analysis_id,
            tab: "summary".to_string(),
            anchor_text: "the anchor".to_string(),
            anchor_prefix: Some("before ".to_string()),
            anchor_suffix: Some(" after".to_string()),
            content: content.to_string(),
            note_type: "observational".to_string(),
            author_id: author.id,
            parent_note_id: parent,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_replies_grouped_under_parents() {
        let analysis_id = Uuid::new_v4();
        let alice = user("alice@x.com");
        let bob = user("bob@x.com");

        let n1 = note(analysis_id, &alice, None, "first", 0);
        let n2 = note(analysis_id, &alice, None, "second", 1);
        let r1 = note(analysis_id, &bob, Some(n1.id), "re: first", 2);
        let r2 = note(analysis_id, &alice, Some(n1.id), "re: first again", 3);

        let thread = assemble_thread(
            vec![(n1.clone(), Some(alice.clone())), (n2, Some(alice.clone()))],
            vec![(r1, Some(bob)), (r2, Some(alice))],
        );

        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].content, "first");
        assert_eq!(thread[0].replies.len(), 2);
        assert_eq!(thread[0].replies[0].content, "re: first");
        assert_eq!(thread[0].replies[1].content, "re: first again");
        assert!(thread[1].replies.is_empty());
    }

    #[test]
    fn test_reply_to_missing_parent_dropped() {
        let analysis_id = Uuid::new_v4();
        let alice = user("alice@x.com");
        let orphan = note(analysis_id, &alice, Some(Uuid::new_v4()), "orphan", 0);
        let top = note(analysis_id, &alice, None, "top", 1);

        let thread = assemble_thread(
            vec![(top, Some(alice.clone()))],
            vec![(orphan, Some(alice))],
        );

        assert_eq!(thread.len(), 1);
        assert!(thread[0].replies.is_empty());
    }

    fn ident(u: &User) -> Identity {
        Identity {
            user_id: u.id,
            email: u.email.clone(),
        }
    }

    #[test]
    fn test_only_author_may_mutate_note() {
        let analysis_id = Uuid::new_v4();
        let owner = user("owner@x.com");
        let collaborator = user("collab@x.com");
        let n = note(analysis_id, &collaborator, None, "theirs", 0);

        // The analysis owner is just another non-author here
        assert!(matches!(
            ensure_author(&n, &ident(&owner)),
            Err(AppError::NotNoteAuthor)
        ));
        assert!(ensure_author(&n, &ident(&collaborator)).is_ok());
    }

    #[test]
    fn test_reply_inherits_parent_anchor() {
        let analysis_id = Uuid::new_v4();
        let alice = user("alice@x.com");
        let bob = user("bob@x.com");
        let parent = note(analysis_id, &alice, None, "top", 0);
        let parent_id = parent.id;

        let insert = reply_insert(parent, bob.id, "agreed".to_string());

        assert_eq!(insert.analysis_id, analysis_id);
        assert_eq!(insert.author_id, bob.id);
        assert_eq!(insert.parent_note_id, Some(parent_id));
        assert_eq!(insert.tab, "summary");
        assert_eq!(insert.anchor_text, "the anchor");
        assert_eq!(insert.anchor_prefix.as_deref(), Some("before "));
        assert_eq!(insert.anchor_suffix.as_deref(), Some(" after"));
        assert_eq!(insert.note_type, NoteType::Observational);
    }

    #[test]
    fn test_missing_author_renders_as_none() {
        let analysis_id = Uuid::new_v4();
        let alice = user("alice@x.com");
        let top = note(analysis_id, &alice, None, "top", 0);

        let thread = assemble_thread(vec![(top, None)], vec![]);
        assert_eq!(thread[0].author_email, None);
    }
}
