use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{FlashcardSet, FlashcardSetRow, SetDraft};

/// Owner-scoped flashcard-set storage. Every method filters by `owner`; a set
/// belonging to someone else behaves exactly like a missing one.
#[async_trait]
pub trait FlashcardSetStore: Send + Sync {
    /// Newest first.
    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<FlashcardSet>>;
    async fn get(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<FlashcardSet>>;
    async fn create(&self, owner: Uuid, draft: SetDraft) -> anyhow::Result<FlashcardSet>;
    async fn replace(
        &self,
        owner: Uuid,
        id: Uuid,
        draft: SetDraft,
    ) -> anyhow::Result<Option<FlashcardSet>>;
    /// Returns whether a set was removed.
    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgFlashcardSetStore {
    db: PgPool,
}

impl PgFlashcardSetStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FlashcardSetStore for PgFlashcardSetStore {
    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<FlashcardSet>> {
        let rows = sqlx::query_as::<_, FlashcardSetRow>(
            r#"
            SELECT id, user_id, title, description, cards, created_at, updated_at
            FROM flashcard_sets
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(FlashcardSet::from).collect())
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<FlashcardSet>> {
        let row = sqlx::query_as::<_, FlashcardSetRow>(
            r#"
            SELECT id, user_id, title, description, cards, created_at, updated_at
            FROM flashcard_sets
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(FlashcardSet::from))
    }

    async fn create(&self, owner: Uuid, draft: SetDraft) -> anyhow::Result<FlashcardSet> {
        let row = sqlx::query_as::<_, FlashcardSetRow>(
            r#"
            INSERT INTO flashcard_sets (id, user_id, title, description, cards)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, title, description, cards, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(Json(&draft.cards))
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn replace(
        &self,
        owner: Uuid,
        id: Uuid,
        draft: SetDraft,
    ) -> anyhow::Result<Option<FlashcardSet>> {
        let row = sqlx::query_as::<_, FlashcardSetRow>(
            r#"
            UPDATE flashcard_sets
               SET title = $3, description = $4, cards = $5, updated_at = $6
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, title, description, cards, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(Json(&draft.cards))
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(FlashcardSet::from))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let done = sqlx::query(r#"DELETE FROM flashcard_sets WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}
