use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{DeletedResponse, FlashcardSetRequest},
    repo_types::FlashcardSet,
};
use crate::{
    auth::extractors::AuthUser,
    error::{json_body, ApiError},
    state::AppState,
};

pub fn flashcard_routes() -> Router<AppState> {
    Router::new()
        .route("/flashcard-sets", get(list_sets).post(create_set))
        .route(
            "/flashcard-sets/:id",
            get(get_set).put(replace_set).delete(delete_set),
        )
}

fn not_found() -> ApiError {
    ApiError::NotFound("Set not found".into())
}

/// A valid token whose user no longer exists is treated like a bad token,
/// the same answer `GET /me` gives.
async fn resolve_owner(state: &AppState, user_id: Uuid) -> Result<Uuid, ApiError> {
    match state.users.find_by_id(user_id).await? {
        Some(user) => Ok(user.id),
        None => {
            warn!(%user_id, "token subject has no user record");
            Err(ApiError::Unauthorized("User not found".into()))
        }
    }
}

/// Ids that do not parse cannot name an owned set.
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| not_found())
}

#[instrument(skip(state))]
pub async fn list_sets(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
) -> Result<Json<Vec<FlashcardSet>>, ApiError> {
    let user_id = resolve_owner(&state, subject).await?;
    let sets = state.sets.list_by_owner(user_id).await?;
    Ok(Json(sets))
}

#[instrument(skip(state, body))]
pub async fn create_set(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
    body: Result<Json<FlashcardSetRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FlashcardSet>), ApiError> {
    let user_id = resolve_owner(&state, subject).await?;
    let draft = json_body(body)?.into_draft()?;
    let set = state.sets.create(user_id, draft).await?;
    info!(%user_id, set_id = %set.id, cards = set.cards.len(), "flashcard set created");
    Ok((StatusCode::CREATED, Json(set)))
}

#[instrument(skip(state))]
pub async fn get_set(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FlashcardSet>, ApiError> {
    let user_id = resolve_owner(&state, subject).await?;
    let id = parse_id(&id)?;
    state
        .sets
        .get(user_id, id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

#[instrument(skip(state, body))]
pub async fn replace_set(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
    Path(id): Path<String>,
    body: Result<Json<FlashcardSetRequest>, JsonRejection>,
) -> Result<Json<FlashcardSet>, ApiError> {
    let user_id = resolve_owner(&state, subject).await?;
    let id = parse_id(&id)?;
    let draft = json_body(body)?.into_draft()?;
    let set = state
        .sets
        .replace(user_id, id, draft)
        .await?
        .ok_or_else(not_found)?;
    info!(%user_id, set_id = %set.id, "flashcard set updated");
    Ok(Json(set))
}

#[instrument(skip(state))]
pub async fn delete_set(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let user_id = resolve_owner(&state, subject).await?;
    let id = parse_id(&id)?;
    if !state.sets.delete(user_id, id).await? {
        return Err(not_found());
    }
    info!(%user_id, set_id = %id, "flashcard set deleted");
    Ok(Json(DeletedResponse {
        message: "Set deleted".into(),
    }))
}
