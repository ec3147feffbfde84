use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
        google::IdentityError,
        password::{hash_password, verify_against_dummy, verify_password},
        repo_types::{AuthMethod, NewUser, User},
    },
    error::{ApiError, StoreError},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn issue(state: &AppState, user: &User) -> Result<AuthResponse, ApiError> {
    let token = state.jwt.sign(user.id).context("sign session token")?;
    Ok(AuthResponse {
        token,
        user: PublicUser::from(user),
    })
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<AuthResponse, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Email and password required".into()));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::Conflict("Email already in use".into()));
    }

    let hash = hash_password(&req.password)?;
    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let user = state
        .users
        .create(NewUser {
            email,
            name,
            auth: AuthMethod::Password { hash },
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue(state, &user)
}

pub async fn login(state: &AppState, req: LoginRequest) -> Result<AuthResponse, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Email and password required".into()));
    }

    let Some(user) = state.users.find_by_email(&email).await? else {
        verify_against_dummy(&req.password);
        warn!(email = %email, "login unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    let ok = match &user.auth {
        AuthMethod::Password { hash } => verify_password(&req.password, hash)?,
        AuthMethod::Federated { provider } => {
            verify_against_dummy(&req.password);
            warn!(user_id = %user.id, %provider, "password login for federated account");
            false
        }
    };
    if !ok {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    issue(state, &user)
}

/// Verifies a provider ID token, then finds or auto-provisions the matching user.
pub async fn federated_login(state: &AppState, id_token: &str) -> Result<AuthResponse, ApiError> {
    let identity = match state.identity.verify(id_token).await {
        Ok(identity) => identity,
        Err(IdentityError::Unavailable(e)) => {
            warn!(error = ?e, "identity provider unavailable");
            return Err(ApiError::Unauthorized("Invalid Google token".into()));
        }
        Err(e) => {
            warn!(error = %e, "federated token rejected");
            return Err(ApiError::Unauthorized("Invalid Google token".into()));
        }
    };

    let user = match state.users.find_by_email(&identity.email).await? {
        Some(user) => user,
        None => {
            let created = state
                .users
                .create(NewUser {
                    email: identity.email.clone(),
                    name: identity.name.clone(),
                    auth: AuthMethod::Federated {
                        provider: identity.provider.clone(),
                    },
                })
                .await;
            match created {
                Ok(user) => {
                    info!(user_id = %user.id, provider = %identity.provider, "user auto-provisioned");
                    user
                }
                // Lost a race with a concurrent first login for the same email.
                Err(StoreError::Conflict) => state
                    .users
                    .find_by_email(&identity.email)
                    .await?
                    .context("user vanished after conflicting insert")?,
                Err(e) => return Err(e.into()),
            }
        }
    };

    info!(user_id = %user.id, provider = %identity.provider, "federated login");
    issue(state, &user)
}
