//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations with proper
//! error handling and transaction support. Multi-statement operations that
//! must not interleave (cap-enforce-then-insert, claim-then-increment) run
//! inside explicit transactions.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::MAX_ANALYSES_PER_OWNER;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement, TransactionTrait,
};
use uuid::Uuid;

/// Fields for a new analysis row
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub title: String,
    pub file_metadata: serde_json::Value,
    pub summary_response: Option<String>,
    pub comparison_response: Option<String>,
    pub language_response: Option<String>,
    pub table_view_state: Option<serde_json::Value>,
}

/// Fields for a new note or reply row.
///
/// `created_at` is only supplied by duplication, which preserves the source
/// timestamps; everything else inserts with now().
#[derive(Debug, Clone)]
pub struct NoteInsert {
    pub analysis_id: Uuid,
    pub author_id: Uuid,
    pub tab: String,
    pub anchor_text: String,
    pub anchor_prefix: Option<String>,
    pub anchor_suffix: Option<String>,
    pub content: String,
    pub note_type: NoteType,
    pub parent_note_id: Option<Uuid>,
    pub created_at: Option<sea_orm::entity::prelude::DateTimeWithTimeZone>,
}

/// Merge a view-state patch into the stored column value per tab: incoming
/// keys overwrite, keys missing from the patch stay. A stored value that is
/// not an object (including null) starts from empty.
pub fn merge_view_state(
    current: Option<serde_json::Value>,
    patch: serde_json::Map<String, serde_json::Value>,
) -> serde_json::Value {
    let mut merged = match current {
        Some(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    for (tab, state) in patch {
        merged.insert(tab, state);
    }
    serde_json::Value::Object(merged)
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Find a user by email (exact match) or create one.
    ///
    /// Concurrent first requests for the same email race on the insert; the
    /// unique constraint on `users.email` makes the loser re-read the row.
    pub async fn find_or_create_user(&self, email: &str) -> Result<User> {
        if let Some(user) = UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.read_conn())
            .await?
        {
            return Ok(user);
        }

        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        match user.insert(self.write_conn()).await {
            Ok(created) => Ok(created),
            Err(insert_err) => {
                // Lost the race; the row exists now
                UserEntity::find()
                    .filter(UserColumn::Email.eq(email))
                    .one(self.write_conn())
                    .await?
                    .ok_or_else(|| AppError::Database(insert_err))
            }
        }
    }

    /// Find a user by email, case-insensitively (sharing lookups)
    pub async fn find_user_by_email_ci(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(UserColumn::Email)))
                    .eq(email.to_lowercase()),
            )
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Analysis Operations
    // ========================================================================

    /// Find an analysis by ID
    pub async fn find_analysis(&self, id: Uuid) -> Result<Option<Analysis>> {
        AnalysisEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find an analysis together with its owner
    pub async fn find_analysis_with_owner(&self, id: Uuid) -> Result<Option<(Analysis, User)>> {
        let found = AnalysisEntity::find_by_id(id)
            .find_also_related(UserEntity)
            .one(self.read_conn())
            .await?;

        match found {
            Some((analysis, Some(owner))) => Ok(Some((analysis, owner))),
            Some((analysis, None)) => Err(AppError::Internal {
                message: format!("Analysis {} has no owner row", analysis.id),
            }),
            None => Ok(None),
        }
    }

    /// List a user's own analyses, newest first
    pub async fn list_owned_analyses(&self, owner_id: Uuid) -> Result<Vec<Analysis>> {
        AnalysisEntity::find()
            .filter(AnalysisColumn::OwnerId.eq(owner_id))
            .order_by_desc(AnalysisColumn::CreatedAt)
            .limit(MAX_ANALYSES_PER_OWNER as u64)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List analyses shared with a user (by id or email), newest first,
    /// each paired with its owner.
    pub async fn list_shared_analyses(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<Vec<(Analysis, User)>> {
        let grants = SharedAnalysisEntity::find()
            .filter(
                Condition::any()
                    .add(SharedAnalysisColumn::SharedWithId.eq(user_id))
                    .add(
                        Expr::expr(Func::lower(Expr::col(
                            SharedAnalysisColumn::SharedWithEmail,
                        )))
                        .eq(email.to_lowercase()),
                    ),
            )
            .all(self.read_conn())
            .await?;

        if grants.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = grants.iter().map(|g| g.analysis_id).collect();

        let rows = AnalysisEntity::find()
            .filter(AnalysisColumn::Id.is_in(ids))
            .find_also_related(UserEntity)
            .order_by_desc(AnalysisColumn::CreatedAt)
            .limit(MAX_ANALYSES_PER_OWNER as u64)
            .all(self.read_conn())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(analysis, owner)| owner.map(|o| (analysis, o)))
            .collect())
    }

    /// Create an analysis, enforcing the per-owner cap in the same
    /// transaction. Inserting past the cap evicts the owner's oldest rows
    /// beyond the most recent cap-minus-one, making room for the new one.
    pub async fn create_analysis(&self, owner_id: Uuid, new: NewAnalysis) -> Result<Analysis> {
        let txn = self.write_conn().begin().await?;

        Self::evict_over_cap(&txn, owner_id).await?;

        let now = chrono::Utc::now();
        let analysis = AnalysisActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            title: Set(new.title),
            file_metadata: Set(new.file_metadata),
            summary_response: Set(new.summary_response),
            comparison_response: Set(new.comparison_response),
            language_response: Set(new.language_response),
            table_view_state: Set(new.table_view_state),
            draft_state: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(analysis)
    }

    async fn evict_over_cap<C: ConnectionTrait>(conn: &C, owner_id: Uuid) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            DELETE FROM analyses
            WHERE id IN (
                SELECT id FROM analyses
                WHERE owner_id = $1
                ORDER BY created_at DESC
                OFFSET $2
            )
            "#,
            vec![owner_id.into(), ((MAX_ANALYSES_PER_OWNER - 1) as i64).into()],
        );

        let result = conn.execute(stmt).await?;
        if result.rows_affected() > 0 {
            tracing::info!(
                owner_id = %owner_id,
                evicted = result.rows_affected(),
                "Evicted oldest analyses over per-owner cap"
            );
        }
        Ok(())
    }

    /// Update the title, bumping `updated_at`
    pub async fn set_analysis_title(&self, analysis_id: Uuid, title: String) -> Result<()> {
        AnalysisEntity::update_many()
            .col_expr(AnalysisColumn::Title, Expr::value(title))
            .col_expr(
                AnalysisColumn::UpdatedAt,
                Expr::value(chrono::Utc::now()),
            )
            .filter(AnalysisColumn::Id.eq(analysis_id))
            .exec(self.write_conn())
            .await?;
        Ok(())
    }

    /// Replace the file metadata array, bumping `updated_at`
    pub async fn set_file_metadata(
        &self,
        analysis_id: Uuid,
        file_metadata: serde_json::Value,
    ) -> Result<()> {
        AnalysisEntity::update_many()
            .col_expr(AnalysisColumn::FileMetadata, Expr::value(file_metadata))
            .col_expr(
                AnalysisColumn::UpdatedAt,
                Expr::value(chrono::Utc::now()),
            )
            .filter(AnalysisColumn::Id.eq(analysis_id))
            .exec(self.write_conn())
            .await?;
        Ok(())
    }

    /// Merge view state per tab: incoming keys overwrite, missing keys stay
    pub async fn merge_table_view_state(
        &self,
        analysis_id: Uuid,
        patch: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let mut analysis = self
            .find_analysis(analysis_id)
            .await?
            .ok_or_else(|| AppError::AnalysisNotFound {
                id: analysis_id.to_string(),
            })?;

        let merged = merge_view_state(analysis.table_view_state.take(), patch);

        let mut active: AnalysisActiveModel = analysis.into();
        active.table_view_state = Set(Some(merged));
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(self.write_conn()).await?;
        Ok(())
    }

    /// Replace the draft state wholesale. JSON null clears the column.
    pub async fn set_draft_state(
        &self,
        analysis_id: Uuid,
        draft_state: serde_json::Value,
    ) -> Result<()> {
        let stored = if draft_state.is_null() {
            None
        } else {
            Some(draft_state)
        };

        AnalysisEntity::update_many()
            .col_expr(AnalysisColumn::DraftState, Expr::value(stored))
            .col_expr(
                AnalysisColumn::UpdatedAt,
                Expr::value(chrono::Utc::now()),
            )
            .filter(AnalysisColumn::Id.eq(analysis_id))
            .exec(self.write_conn())
            .await?;
        Ok(())
    }

    /// Bump `updated_at`, the coarse last-activity signal for history lists
    pub async fn touch_analysis(&self, analysis_id: Uuid) -> Result<()> {
        AnalysisEntity::update_many()
            .col_expr(
                AnalysisColumn::UpdatedAt,
                Expr::value(chrono::Utc::now()),
            )
            .filter(AnalysisColumn::Id.eq(analysis_id))
            .exec(self.write_conn())
            .await?;
        Ok(())
    }

    /// Delete an analysis scoped to its owner, returning the deleted row so
    /// the caller can clean up blob objects. Chat messages, notes, and
    /// grants cascade via foreign keys.
    pub async fn delete_analysis(
        &self,
        analysis_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Analysis>> {
        let Some(analysis) = AnalysisEntity::find_by_id(analysis_id)
            .filter(AnalysisColumn::OwnerId.eq(owner_id))
            .one(self.write_conn())
            .await?
        else {
            return Ok(None);
        };

        AnalysisEntity::delete_by_id(analysis_id)
            .exec(self.write_conn())
            .await?;

        Ok(Some(analysis))
    }

    // ========================================================================
    // Chat Message Operations
    // ========================================================================

    /// List chat messages in creation order
    pub async fn list_chat_messages(&self, analysis_id: Uuid) -> Result<Vec<ChatMessage>> {
        ChatMessageEntity::find()
            .filter(ChatMessageColumn::AnalysisId.eq(analysis_id))
            .order_by_asc(ChatMessageColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Append a chat message. `created_at` defaults to now; duplication
    /// passes the source timestamp to preserve transcript order.
    pub async fn append_chat_message(
        &self,
        analysis_id: Uuid,
        role: String,
        content: String,
        created_at: Option<sea_orm::entity::prelude::DateTimeWithTimeZone>,
    ) -> Result<ChatMessage> {
        ChatMessageActiveModel {
            id: Set(Uuid::new_v4()),
            analysis_id: Set(analysis_id),
            role: Set(role),
            content: Set(content),
            created_at: Set(created_at.unwrap_or_else(|| chrono::Utc::now().into())),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    // ========================================================================
    // Note Operations
    // ========================================================================

    /// Find a note scoped to an analysis
    pub async fn find_note(&self, note_id: Uuid, analysis_id: Uuid) -> Result<Option<Note>> {
        NoteEntity::find_by_id(note_id)
            .filter(NoteColumn::AnalysisId.eq(analysis_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Insert a note or reply row
    pub async fn insert_note(&self, row: NoteInsert) -> Result<Note> {
        let created_at = row
            .created_at
            .unwrap_or_else(|| chrono::Utc::now().into());

        NoteActiveModel {
            id: Set(Uuid::new_v4()),
            analysis_id: Set(row.analysis_id),
            tab: Set(row.tab),
            anchor_text: Set(row.anchor_text),
            anchor_prefix: Set(row.anchor_prefix),
            anchor_suffix: Set(row.anchor_suffix),
            content: Set(row.content),
            note_type: Set(row.note_type.as_str().to_string()),
            author_id: Set(row.author_id),
            parent_note_id: Set(row.parent_note_id),
            created_at: Set(created_at),
            updated_at: Set(created_at),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Apply a partial update to a note, bumping its `updated_at`
    pub async fn update_note(
        &self,
        note: Note,
        content: Option<String>,
        note_type: Option<NoteType>,
    ) -> Result<Note> {
        let mut active: NoteActiveModel = note.into();
        if let Some(content) = content {
            active.content = Set(content);
        }
        if let Some(note_type) = note_type {
            active.note_type = Set(note_type.as_str().to_string());
        }
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Delete a note; replies cascade via the parent foreign key
    pub async fn delete_note(&self, note_id: Uuid) -> Result<()> {
        NoteEntity::delete_by_id(note_id)
            .exec(self.write_conn())
            .await?;
        Ok(())
    }

    /// Top-level notes (null parent) with authors, creation order
    pub async fn list_top_level_notes(
        &self,
        analysis_id: Uuid,
    ) -> Result<Vec<(Note, Option<User>)>> {
        NoteEntity::find()
            .filter(NoteColumn::AnalysisId.eq(analysis_id))
            .filter(NoteColumn::ParentNoteId.is_null())
            .find_also_related(UserEntity)
            .order_by_asc(NoteColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Reply notes (non-null parent) with authors, creation order
    pub async fn list_replies(&self, analysis_id: Uuid) -> Result<Vec<(Note, Option<User>)>> {
        NoteEntity::find()
            .filter(NoteColumn::AnalysisId.eq(analysis_id))
            .filter(NoteColumn::ParentNoteId.is_not_null())
            .find_also_related(UserEntity)
            .order_by_asc(NoteColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Share Operations
    // ========================================================================

    /// Find a grant matching a user by id or email (case-insensitive)
    pub async fn find_grant(
        &self,
        analysis_id: Uuid,
        user_id: Uuid,
        email: &str,
    ) -> Result<Option<SharedAnalysis>> {
        SharedAnalysisEntity::find()
            .filter(SharedAnalysisColumn::AnalysisId.eq(analysis_id))
            .filter(
                Condition::any()
                    .add(SharedAnalysisColumn::SharedWithId.eq(user_id))
                    .add(
                        Expr::expr(Func::lower(Expr::col(
                            SharedAnalysisColumn::SharedWithEmail,
                        )))
                        .eq(email.to_lowercase()),
                    ),
            )
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Backfill `shared_with_id` on grants created before the invitee had an
    /// account. Idempotent: only null ids matching the email are touched.
    pub async fn bind_grant_user(
        &self,
        analysis_id: Uuid,
        email: &str,
        user_id: Uuid,
    ) -> Result<()> {
        SharedAnalysisEntity::update_many()
            .col_expr(SharedAnalysisColumn::SharedWithId, Expr::value(user_id))
            .filter(SharedAnalysisColumn::AnalysisId.eq(analysis_id))
            .filter(
                Expr::expr(Func::lower(Expr::col(
                    SharedAnalysisColumn::SharedWithEmail,
                )))
                .eq(email.to_lowercase()),
            )
            .filter(SharedAnalysisColumn::SharedWithId.is_null())
            .exec(self.write_conn())
            .await?;
        Ok(())
    }

    /// Check whether an email grant already exists for an analysis
    pub async fn email_share_exists(&self, analysis_id: Uuid, email: &str) -> Result<bool> {
        let existing = SharedAnalysisEntity::find()
            .filter(SharedAnalysisColumn::AnalysisId.eq(analysis_id))
            .filter(
                Expr::expr(Func::lower(Expr::col(
                    SharedAnalysisColumn::SharedWithEmail,
                )))
                .eq(email.to_lowercase()),
            )
            .one(self.read_conn())
            .await?;
        Ok(existing.is_some())
    }

    /// Insert an email grant
    pub async fn insert_email_share(
        &self,
        analysis_id: Uuid,
        owner_id: Uuid,
        shared_with_id: Option<Uuid>,
        shared_with_email: String,
    ) -> Result<SharedAnalysis> {
        SharedAnalysisActiveModel {
            id: Set(Uuid::new_v4()),
            analysis_id: Set(analysis_id),
            owner_id: Set(owner_id),
            shared_with_id: Set(shared_with_id),
            shared_with_email: Set(shared_with_email),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// List email grants for an analysis, newest first (owner view)
    pub async fn list_email_shares(
        &self,
        analysis_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<SharedAnalysis>> {
        SharedAnalysisEntity::find()
            .filter(SharedAnalysisColumn::AnalysisId.eq(analysis_id))
            .filter(SharedAnalysisColumn::OwnerId.eq(owner_id))
            .order_by_desc(SharedAnalysisColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Insert a link-share token
    pub async fn insert_share_token(
        &self,
        analysis_id: Uuid,
        owner_id: Uuid,
        token: String,
        expires_at: Option<sea_orm::entity::prelude::DateTimeWithTimeZone>,
        max_uses: Option<i32>,
    ) -> Result<ShareToken> {
        ShareTokenActiveModel {
            id: Set(Uuid::new_v4()),
            analysis_id: Set(analysis_id),
            owner_id: Set(owner_id),
            token: Set(token),
            expires_at: Set(expires_at),
            max_uses: Set(max_uses),
            use_count: Set(0),
            is_active: Set(true),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// List link-share tokens for an analysis, newest first (owner view)
    pub async fn list_share_tokens(
        &self,
        analysis_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<ShareToken>> {
        ShareTokenEntity::find()
            .filter(ShareTokenColumn::AnalysisId.eq(analysis_id))
            .filter(ShareTokenColumn::OwnerId.eq(owner_id))
            .order_by_desc(ShareTokenColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find a share token by its token value
    pub async fn find_share_token(&self, token: &str) -> Result<Option<ShareToken>> {
        ShareTokenEntity::find()
            .filter(ShareTokenColumn::Token.eq(token))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Claim a share token: insert the grant and increment `use_count` in
    /// one transaction. The increment is conditional on the token still
    /// being claimable, which closes the over-redemption race: if another
    /// claim consumed the last use between our validity check and here, the
    /// update matches zero rows and the whole claim rolls back.
    ///
    /// Returns false when the conditional update matched nothing.
    pub async fn claim_share_token(
        &self,
        token_id: Uuid,
        analysis_id: Uuid,
        owner_id: Uuid,
        claimant_id: Uuid,
        claimant_email: &str,
    ) -> Result<bool> {
        let txn = self.write_conn().begin().await?;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE share_tokens
            SET use_count = use_count + 1
            WHERE id = $1
              AND is_active
              AND (expires_at IS NULL OR expires_at > NOW())
              AND (max_uses IS NULL OR use_count < max_uses)
            "#,
            vec![token_id.into()],
        );

        let result = txn.execute(stmt).await?;
        if result.rows_affected() == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        SharedAnalysisActiveModel {
            id: Set(Uuid::new_v4()),
            analysis_id: Set(analysis_id),
            owner_id: Set(owner_id),
            shared_with_id: Set(Some(claimant_id)),
            shared_with_email: Set(claimant_email.to_lowercase()),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(true)
    }

    /// Delete an email grant scoped to analysis and owner
    pub async fn delete_email_share(
        &self,
        share_id: Uuid,
        analysis_id: Uuid,
        owner_id: Uuid,
    ) -> Result<bool> {
        let result = SharedAnalysisEntity::delete_many()
            .filter(SharedAnalysisColumn::Id.eq(share_id))
            .filter(SharedAnalysisColumn::AnalysisId.eq(analysis_id))
            .filter(SharedAnalysisColumn::OwnerId.eq(owner_id))
            .exec(self.write_conn())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Delete a link-share token scoped to analysis and owner
    pub async fn delete_share_token(
        &self,
        share_id: Uuid,
        analysis_id: Uuid,
        owner_id: Uuid,
    ) -> Result<bool> {
        let result = ShareTokenEntity::delete_many()
            .filter(ShareTokenColumn::Id.eq(share_id))
            .filter(ShareTokenColumn::AnalysisId.eq(analysis_id))
            .filter(ShareTokenColumn::OwnerId.eq(owner_id))
            .exec(self.write_conn())
            .await?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_merge_view_state_overwrites_patched_tabs_only() {
        let current = json!({
            "summary": {"sort": "asc"},
            "comparison": {"sort": "desc"}
        });

        let merged = merge_view_state(
            Some(current),
            patch(&[("summary", json!({"sort": "desc", "page": 2}))]),
        );

        assert_eq!(merged["summary"], json!({"sort": "desc", "page": 2}));
        // Untouched tab survives
        assert_eq!(merged["comparison"], json!({"sort": "desc"}));
    }

    #[test]
    fn test_merge_view_state_starts_empty_without_stored_object() {
        let merged = merge_view_state(None, patch(&[("summary", json!({"page": 1}))]));
        assert_eq!(merged, json!({"summary": {"page": 1}}));

        let merged = merge_view_state(
            Some(json!("not an object")),
            patch(&[("summary", json!({"page": 1}))]),
        );
        assert_eq!(merged, json!({"summary": {"page": 1}}));
    }

    #[test]
    fn test_merge_view_state_empty_patch_keeps_current() {
        let merged = merge_view_state(
            Some(json!({"summary": {"sort": "asc"}})),
            serde_json::Map::new(),
        );
        assert_eq!(merged, json!({"summary": {"sort": "asc"}}));
    }
}
