//! Google ID token verification.
//!
//! Signature checking is delegated to Google's tokeninfo endpoint; the claims it
//! returns are then checked locally against the accepted client ids.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::config::GoogleConfig;

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Identity asserted by the provider after verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub provider: String,
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("token rejected by identity provider")]
    Rejected,
    #[error("token claims invalid: {0}")]
    InvalidClaims(&'static str),
    #[error("identity provider unavailable")]
    Unavailable(#[source] anyhow::Error),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// Claims as returned by the tokeninfo endpoint. Numeric and boolean values
/// arrive as strings.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenInfo {
    pub iss: Option<String>,
    pub aud: Option<String>,
    pub sub: Option<String>,
    pub exp: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<serde_json::Value>,
    pub name: Option<String>,
}

#[derive(Clone)]
pub struct GoogleVerifier {
    http: Client,
    tokeninfo_url: String,
    client_ids: Vec<String>,
}

impl GoogleVerifier {
    pub fn new(cfg: &GoogleConfig) -> anyhow::Result<Self> {
        if cfg.client_ids.is_empty() {
            warn!("GOOGLE_CLIENT_IDS is empty; every Google sign-in will be rejected");
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build google http client")?;
        Ok(Self {
            http,
            tokeninfo_url: cfg.tokeninfo_url.clone(),
            client_ids: cfg.client_ids.clone(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        if id_token.trim().is_empty() {
            return Err(IdentityError::InvalidClaims("empty token"));
        }
        let res = self
            .http
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.into()))?;

        let status = res.status();
        debug!(http_status = %status, "google tokeninfo response");
        if status.is_client_error() {
            return Err(IdentityError::Rejected);
        }
        if !status.is_success() {
            return Err(IdentityError::Unavailable(anyhow::anyhow!(
                "tokeninfo returned {}",
                status
            )));
        }
        let info: TokenInfo = res
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(e.into()))?;

        check_claims(info, &self.client_ids, OffsetDateTime::now_utc())
    }
}

pub(crate) fn check_claims(
    info: TokenInfo,
    client_ids: &[String],
    now: OffsetDateTime,
) -> Result<VerifiedIdentity, IdentityError> {
    let aud = info.aud.ok_or(IdentityError::InvalidClaims("missing aud"))?;
    if !client_ids.iter().any(|id| *id == aud) {
        warn!(token_audience = %aud, "google token audience mismatch");
        return Err(IdentityError::InvalidClaims("audience mismatch"));
    }

    let iss = info.iss.ok_or(IdentityError::InvalidClaims("missing iss"))?;
    if !GOOGLE_ISSUERS.contains(&iss.as_str()) {
        return Err(IdentityError::InvalidClaims("issuer mismatch"));
    }

    let exp = info
        .exp
        .and_then(|e| e.parse::<i64>().ok())
        .ok_or(IdentityError::InvalidClaims("missing exp"))?;
    if exp <= now.unix_timestamp() {
        return Err(IdentityError::InvalidClaims("expired"));
    }

    let email = info
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or(IdentityError::InvalidClaims("missing email"))?;
    if !is_truthy(info.email_verified.as_ref()) {
        return Err(IdentityError::InvalidClaims("email not verified"));
    }

    let subject = info.sub.ok_or(IdentityError::InvalidClaims("missing sub"))?;

    Ok(VerifiedIdentity {
        provider: "google".into(),
        subject,
        email,
        name: info.name.filter(|n| !n.trim().is_empty()),
    })
}

fn is_truthy(v: Option<&serde_json::Value>) -> bool {
    match v {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s == "true",
        _ => false,
    }
}
