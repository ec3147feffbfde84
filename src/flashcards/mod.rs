mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;

pub use dto::{CardInput, DeletedResponse, FlashcardSetRequest};

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::flashcard_routes()
}
