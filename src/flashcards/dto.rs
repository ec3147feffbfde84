use serde::{Deserialize, Serialize};

use super::repo_types::{Card, SetDraft};
use crate::error::ApiError;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CardInput {
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub definition: String,
}

/// Body of `POST /flashcard-sets` and `PUT /flashcard-sets/:id`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FlashcardSetRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub cards: Vec<CardInput>,
}

impl FlashcardSetRequest {
    pub fn into_draft(self) -> Result<SetDraft, ApiError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::Validation("Title is required".into()));
        }
        let mut cards = Vec::with_capacity(self.cards.len());
        for (i, c) in self.cards.into_iter().enumerate() {
            if c.term.trim().is_empty() || c.definition.trim().is_empty() {
                return Err(ApiError::Validation(format!(
                    "Card {} needs both a term and a definition",
                    i + 1
                )));
            }
            cards.push(Card {
                term: c.term,
                definition: c.definition,
            });
        }
        let description = self.description.filter(|d| !d.trim().is_empty());
        Ok(SetDraft {
            title,
            description,
            cards,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub message: String,
}
