use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// How an account proves its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AuthMethod {
    /// Argon2 PHC string, never exposed in JSON.
    Password {
        #[serde(skip_serializing)]
        hash: String,
    },
    /// Account created through an external identity provider; has no password.
    Federated { provider: String },
}

/// User record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub auth: AuthMethod,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields needed to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub auth: AuthMethod,
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: Option<String>, // NULL for federated accounts
    pub auth_provider: String,         // "password" or the provider name
    pub created_at: OffsetDateTime,
}

pub(crate) const PASSWORD_PROVIDER: &str = "password";

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let auth = match (r.auth_provider.as_str(), r.password_hash) {
            (PASSWORD_PROVIDER, Some(hash)) => AuthMethod::Password { hash },
            (PASSWORD_PROVIDER, None) => {
                anyhow::bail!("user {} has password auth but no hash", r.id)
            }
            (provider, _) => AuthMethod::Federated {
                provider: provider.to_string(),
            },
        };
        Ok(User {
            id: r.id,
            email: r.email,
            name: r.name,
            auth,
            created_at: r.created_at,
        })
    }
}
