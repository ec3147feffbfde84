//! Client-side session lifecycle.
//!
//! `Restoring` is the start state; [`SessionManager::restore`] resolves it
//! from the secure store. Any 401 on a protected call drops the session and
//! wipes the persisted token and profile.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::api::{ApiClient, ClientError};
use super::store::{KeyValueStore, ONBOARDING_KEY, TOKEN_KEY, USER_KEY};
use crate::auth::dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest};
use crate::auth::Claims;
use crate::flashcards::repo_types::FlashcardSet;
use crate::flashcards::{DeletedResponse, FlashcardSetRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Restoring,
    Authenticated(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(s) => Some(s),
            _ => None,
        }
    }
}

/// Reads `exp` without checking the signature; the server stays the
/// authority on validity. Undecodable tokens count as expired.
pub(crate) fn token_expired(token: &str, now: OffsetDateTime) -> bool {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => data.claims.exp <= now.unix_timestamp(),
        Err(e) => {
            warn!(error = %e, "persisted token unreadable");
            true
        }
    }
}

pub struct SessionManager<S: KeyValueStore> {
    api: ApiClient,
    store: S,
    state: SessionState,
}

impl<S: KeyValueStore> SessionManager<S> {
    pub fn new(api: ApiClient, store: S) -> Self {
        Self {
            api,
            store,
            state: SessionState::Restoring,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user(&self) -> Option<&PublicUser> {
        self.state.session().map(|s| &s.user)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn restore(&mut self) -> &SessionState {
        self.restore_at(OffsetDateTime::now_utc())
    }

    pub fn restore_at(&mut self, now: OffsetDateTime) -> &SessionState {
        self.state = SessionState::Restoring;
        self.state = match self.load_persisted() {
            Ok(Some(session)) if !token_expired(&session.token, now) => {
                info!(user_id = %session.user.id, "session restored");
                SessionState::Authenticated(session)
            }
            Ok(Some(session)) => {
                info!(user_id = %session.user.id, "persisted session expired");
                self.clear_persisted();
                SessionState::Unauthenticated
            }
            Ok(None) => SessionState::Unauthenticated,
            Err(e) => {
                warn!(error = %e, "discarding unusable persisted session");
                self.clear_persisted();
                SessionState::Unauthenticated
            }
        };
        &self.state
    }

    fn load_persisted(&self) -> anyhow::Result<Option<Session>> {
        let token = self.store.get(TOKEN_KEY)?;
        let user = self.store.get(USER_KEY)?;
        match (token, user) {
            (None, None) => Ok(None),
            (Some(token), Some(user)) => Ok(Some(Session {
                token,
                user: serde_json::from_str(&user)?,
            })),
            _ => anyhow::bail!("partial session data"),
        }
    }

    fn persist(&mut self, session: &Session) -> anyhow::Result<()> {
        let user = serde_json::to_string(&session.user)?;
        self.store.set(TOKEN_KEY, &session.token)?;
        self.store.set(USER_KEY, &user)?;
        Ok(())
    }

    fn try_clear(&mut self) -> anyhow::Result<()> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(USER_KEY)?;
        Ok(())
    }

    fn clear_persisted(&mut self) {
        if let Err(e) = self.try_clear() {
            warn!(error = %e, "failed to clear persisted session");
        }
    }

    fn drop_session(&mut self) {
        self.clear_persisted();
        self.state = SessionState::Unauthenticated;
    }

    fn establish(&mut self, auth: AuthResponse) -> Result<PublicUser, ClientError> {
        let session = Session {
            token: auth.token,
            user: auth.user,
        };
        if let Err(e) = self.persist(&session) {
            self.drop_session();
            return Err(ClientError::Storage(e));
        }
        info!(user_id = %session.user.id, "signed in");
        let user = session.user.clone();
        self.state = SessionState::Authenticated(session);
        Ok(user)
    }

    pub async fn register(
        &mut self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<PublicUser, ClientError> {
        let req = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name,
        };
        let auth = self.api.register(&req).await?;
        self.establish(auth)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<PublicUser, ClientError> {
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth = self.api.login(&req).await?;
        self.establish(auth)
    }

    pub async fn login_with_google(&mut self, id_token: &str) -> Result<PublicUser, ClientError> {
        let auth = self.api.google(id_token).await?;
        self.establish(auth)
    }

    /// Always ends unauthenticated; a storage failure is still reported.
    pub fn logout(&mut self) -> Result<(), ClientError> {
        let res = self.try_clear();
        self.state = SessionState::Unauthenticated;
        info!("signed out");
        res.map_err(ClientError::Storage)
    }

    /// Round-trips `GET /me`. Returns whether the session survived.
    pub async fn revalidate(&mut self) -> Result<bool, ClientError> {
        let token = self.token()?;
        match self.api.me(&token).await {
            Ok(user) => {
                let refreshed = Session { token, user };
                if let Err(e) = self.persist(&refreshed) {
                    warn!(error = %e, "failed to persist refreshed profile");
                }
                self.state = SessionState::Authenticated(refreshed);
                Ok(true)
            }
            Err(ClientError::Unauthorized(msg)) => {
                warn!(reason = %msg, "session rejected by server");
                self.drop_session();
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn token(&self) -> Result<String, ClientError> {
        self.state
            .session()
            .map(|s| s.token.clone())
            .ok_or(ClientError::NotAuthenticated)
    }

    fn observe<T>(&mut self, res: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(ClientError::Unauthorized(msg)) = &res {
            warn!(reason = %msg, "protected request rejected; signing out");
            self.drop_session();
        }
        res
    }

    pub async fn list_sets(&mut self) -> Result<Vec<FlashcardSet>, ClientError> {
        let token = self.token()?;
        let res = self.api.list_sets(&token).await;
        self.observe(res)
    }

    pub async fn get_set(&mut self, id: Uuid) -> Result<FlashcardSet, ClientError> {
        let token = self.token()?;
        let res = self.api.get_set(&token, id).await;
        self.observe(res)
    }

    pub async fn create_set(
        &mut self,
        body: &FlashcardSetRequest,
    ) -> Result<FlashcardSet, ClientError> {
        let token = self.token()?;
        let res = self.api.create_set(&token, body).await;
        self.observe(res)
    }

    pub async fn update_set(
        &mut self,
        id: Uuid,
        body: &FlashcardSetRequest,
    ) -> Result<FlashcardSet, ClientError> {
        let token = self.token()?;
        let res = self.api.update_set(&token, id, body).await;
        self.observe(res)
    }

    pub async fn delete_set(&mut self, id: Uuid) -> Result<DeletedResponse, ClientError> {
        let token = self.token()?;
        let res = self.api.delete_set(&token, id).await;
        self.observe(res)
    }

    pub fn onboarding_complete(&self) -> bool {
        match self.store.get(ONBOARDING_KEY) {
            Ok(v) => v.as_deref() == Some("true"),
            Err(e) => {
                warn!(error = %e, "could not read onboarding flag");
                false
            }
        }
    }

    pub fn complete_onboarding(&mut self) -> Result<(), ClientError> {
        self.store
            .set(ONBOARDING_KEY, "true")
            .map_err(ClientError::Storage)
    }
}
