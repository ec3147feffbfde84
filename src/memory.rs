//! In-process stores used with `APP_STORE=memory` and by the test suite.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

#[cfg(test)]
use crate::auth::google::{IdentityError, IdentityVerifier, VerifiedIdentity};
use crate::auth::repo::UserStore;
use crate::auth::repo_types::{NewUser, User};
use crate::error::StoreError;
use crate::flashcards::repo::FlashcardSetStore;
use crate::flashcards::repo_types::{FlashcardSet, SetDraft};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            auth: new.auth,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[derive(Default)]
pub struct MemoryFlashcardSetStore {
    sets: RwLock<HashMap<Uuid, FlashcardSet>>,
}

#[async_trait]
impl FlashcardSetStore for MemoryFlashcardSetStore {
    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<FlashcardSet>> {
        let sets = self.sets.read().await;
        let mut owned: Vec<FlashcardSet> =
            sets.values().filter(|s| s.user_id == owner).cloned().collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<FlashcardSet>> {
        let sets = self.sets.read().await;
        Ok(sets.get(&id).filter(|s| s.user_id == owner).cloned())
    }

    async fn create(&self, owner: Uuid, draft: SetDraft) -> anyhow::Result<FlashcardSet> {
        let now = OffsetDateTime::now_utc();
        let set = FlashcardSet {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            cards: draft.cards,
            user_id: owner,
            created_at: now,
            updated_at: now,
        };
        self.sets.write().await.insert(set.id, set.clone());
        Ok(set)
    }

    async fn replace(
        &self,
        owner: Uuid,
        id: Uuid,
        draft: SetDraft,
    ) -> anyhow::Result<Option<FlashcardSet>> {
        let mut sets = self.sets.write().await;
        let Some(set) = sets.get_mut(&id).filter(|s| s.user_id == owner) else {
            return Ok(None);
        };
        set.title = draft.title;
        set.description = draft.description;
        set.cards = draft.cards;
        set.updated_at = OffsetDateTime::now_utc();
        Ok(Some(set.clone()))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut sets = self.sets.write().await;
        let owned = sets.get(&id).is_some_and(|s| s.user_id == owner);
        if owned {
            sets.remove(&id);
        }
        Ok(owned)
    }
}

/// Identity verifier with a fixed table of accepted tokens.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct StaticVerifier {
    accepted: HashMap<String, VerifiedIdentity>,
}

#[cfg(test)]
impl StaticVerifier {
    pub fn new<I, K>(accepted: I) -> Self
    where
        I: IntoIterator<Item = (K, VerifiedIdentity)>,
        K: Into<String>,
    {
        Self {
            accepted: accepted.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        self.accepted
            .get(id_token)
            .cloned()
            .ok_or(IdentityError::Rejected)
    }
}

#[cfg(test)]
pub(crate) fn test_state(
    identities: Vec<(&str, VerifiedIdentity)>,
) -> (
    crate::state::AppState,
    std::sync::Arc<MemoryUserStore>,
    std::sync::Arc<MemoryFlashcardSetStore>,
) {
    use crate::config::{AppConfig, GoogleConfig, JwtConfig, StoreBackend};
    use std::sync::Arc;

    let config = Arc::new(AppConfig {
        store: StoreBackend::Memory,
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
        },
        google: GoogleConfig {
            client_ids: vec!["test-client".into()],
            tokeninfo_url: "http://127.0.0.1:9/tokeninfo".into(),
            timeout_secs: 1,
        },
    });
    let users = Arc::new(MemoryUserStore::default());
    let sets = Arc::new(MemoryFlashcardSetStore::default());
    let state = crate::state::AppState::from_parts(
        config,
        users.clone(),
        sets.clone(),
        Arc::new(StaticVerifier::new(identities)),
    );
    (state, users, sets)
}
