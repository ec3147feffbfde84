use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::auth::google::{GoogleVerifier, IdentityVerifier};
use crate::auth::jwt::JwtKeys;
use crate::auth::repo::{PgUserStore, UserStore};
use crate::config::{AppConfig, StoreBackend};
use crate::flashcards::repo::{FlashcardSetStore, PgFlashcardSetStore};
use crate::memory::{MemoryFlashcardSetStore, MemoryUserStore};

/// Process-scoped service handles, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserStore>,
    pub sets: Arc<dyn FlashcardSetStore>,
    pub identity: Arc<dyn IdentityVerifier>,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let identity = Arc::new(GoogleVerifier::new(&config.google)?) as Arc<dyn IdentityVerifier>;

        let (users, sets): (Arc<dyn UserStore>, Arc<dyn FlashcardSetStore>) = match &config.store
        {
            StoreBackend::Postgres { database_url } => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(database_url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                info!("postgres store ready");
                (
                    Arc::new(PgUserStore::new(db.clone())),
                    Arc::new(PgFlashcardSetStore::new(db)),
                )
            }
            StoreBackend::Memory => {
                warn!("APP_STORE=memory: data lives only as long as this process");
                (
                    Arc::new(MemoryUserStore::default()),
                    Arc::new(MemoryFlashcardSetStore::default()),
                )
            }
        };

        Ok(Self::from_parts(config, users, sets, identity))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        sets: Arc<dyn FlashcardSetStore>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            jwt: JwtKeys::new(&config.jwt),
            config,
            users,
            sets,
            identity,
        }
    }
}
