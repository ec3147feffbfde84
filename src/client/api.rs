use std::time::Duration;

use anyhow::Context;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::auth::dto::{AuthResponse, GoogleAuthRequest, LoginRequest, PublicUser, RegisterRequest};
use crate::config::ClientConfig;
use crate::error::ErrorResponse;
use crate::flashcards::repo_types::FlashcardSet;
use crate::flashcards::{DeletedResponse, FlashcardSetRequest};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not signed in")]
    NotAuthenticated,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{message} ({status} {code})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("request timed out")]
    Timeout,
    #[error("could not reach server: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("local storage failed: {0:#}")]
    Storage(#[source] anyhow::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Transport(e)
        }
    }
}

/// Thin typed wrapper over the Healzy HTTP API. Holds no session state;
/// protected calls take the bearer token explicitly.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &ClientConfig) -> anyhow::Result<Self> {
        Self::new(&cfg.api_url, Duration::from_secs(cfg.timeout_secs))
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        match token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let res = req.send().await?;
        let status = res.status();
        debug!(%status, url = %res.url(), "api response");

        if status.is_success() {
            return Ok(res.json::<T>().await?);
        }

        let raw = res.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorResponse>(&raw) {
            Ok(body) => (body.code, body.error),
            Err(_) => (
                "UNKNOWN".to_string(),
                status.canonical_reason().unwrap_or("Request failed").to_string(),
            ),
        };
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized(message));
        }
        Err(ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }

    pub async fn register(&self, body: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        self.send(self.request(Method::POST, "/register", None).json(body))
            .await
    }

    pub async fn login(&self, body: &LoginRequest) -> Result<AuthResponse, ClientError> {
        self.send(self.request(Method::POST, "/login", None).json(body))
            .await
    }

    pub async fn google(&self, id_token: &str) -> Result<AuthResponse, ClientError> {
        let body = GoogleAuthRequest {
            id_token: id_token.to_string(),
        };
        self.send(self.request(Method::POST, "/auth/google", None).json(&body))
            .await
    }

    pub async fn me(&self, token: &str) -> Result<PublicUser, ClientError> {
        self.send(self.request(Method::GET, "/me", Some(token))).await
    }

    pub async fn list_sets(&self, token: &str) -> Result<Vec<FlashcardSet>, ClientError> {
        self.send(self.request(Method::GET, "/flashcard-sets", Some(token)))
            .await
    }

    pub async fn get_set(&self, token: &str, id: Uuid) -> Result<FlashcardSet, ClientError> {
        let path = format!("/flashcard-sets/{}", id);
        self.send(self.request(Method::GET, &path, Some(token))).await
    }

    pub async fn create_set(
        &self,
        token: &str,
        body: &FlashcardSetRequest,
    ) -> Result<FlashcardSet, ClientError> {
        self.send(
            self.request(Method::POST, "/flashcard-sets", Some(token))
                .json(body),
        )
        .await
    }

    pub async fn update_set(
        &self,
        token: &str,
        id: Uuid,
        body: &FlashcardSetRequest,
    ) -> Result<FlashcardSet, ClientError> {
        let path = format!("/flashcard-sets/{}", id);
        self.send(self.request(Method::PUT, &path, Some(token)).json(body))
            .await
    }

    pub async fn delete_set(&self, token: &str, id: Uuid) -> Result<DeletedResponse, ClientError> {
        let path = format!("/flashcard-sets/{}", id);
        self.send(self.request(Method::DELETE, &path, Some(token)))
            .await
    }
}

/// Accepts connections and never answers them.
#[cfg(test)]
pub(crate) async fn silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let api = ApiClient::new(silent_server().await, Duration::from_millis(200)).unwrap();
        let err = api.me("t").await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout), "got {:?}", err);
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = ApiClient::new(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let err = api.list_sets("t").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)), "got {:?}", err);
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let api = ApiClient::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url, "http://localhost:8080");
    }
}
