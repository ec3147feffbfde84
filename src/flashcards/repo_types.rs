use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub term: String,
    pub definition: String,
}

/// A user's flashcard set. Cards keep their insertion order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardSet {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub cards: Vec<Card>,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated, owner-less content of a set, used for create and replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDraft {
    pub title: String,
    pub description: Option<String>,
    pub cards: Vec<Card>,
}

#[derive(Debug, FromRow)]
pub(crate) struct FlashcardSetRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub cards: Json<Vec<Card>>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<FlashcardSetRow> for FlashcardSet {
    fn from(r: FlashcardSetRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            cards: r.cards.0,
            user_id: r.user_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
