use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, flashcards};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(flashcards::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::google::VerifiedIdentity;
    use crate::memory::test_state;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let (state, _, _) = test_state(vec![(
            "google-ok",
            VerifiedIdentity {
                provider: "google".into(),
                subject: "42".into(),
                email: "g@x.com".into(),
                name: Some("G".into()),
            },
        )]);
        build_app(state)
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(t) = token {
            req = req.header("Authorization", format!("Bearer {}", t));
        }
        req.body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().method("GET").uri(uri);
        if let Some(t) = token {
            req = req.header("Authorization", format!("Bearer {}", t));
        }
        req.body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn register(app: &Router, email: &str) -> (String, String) {
        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/register",
                None,
                json!({"email": email, "password": "pw123456"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = body_json(res).await;
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn end_to_end_register_create_and_isolation() {
        let app = app();
        let (token, user_id) = register(&app, "a@x.com").await;

        let res = app.clone().oneshot(get("/flashcard-sets", Some(&token))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, json!([]));

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/flashcard-sets",
                Some(&token),
                json!({"title": "Anatomy", "cards": [{"term": "Sulcus", "definition": "groove"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let set = body_json(res).await;
        assert_eq!(set["userId"], json!(user_id));
        assert_eq!(set["cards"][0]["term"], "Sulcus");
        let set_id = set["id"].as_str().unwrap().to_string();

        let (other_token, _) = register(&app, "b@x.com").await;
        let uri = format!("/flashcard-sets/{}", set_id);
        let res = app.clone().oneshot(get(&uri, Some(&other_token))).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = app.clone().oneshot(get(&uri, Some(&token))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn other_user_cannot_update_or_delete() {
        let app = app();
        let (owner, _) = register(&app, "a@x.com").await;
        let (intruder, _) = register(&app, "b@x.com").await;

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/flashcard-sets",
                Some(&owner),
                json!({"title": "Pharmacology", "cards": []}),
            ))
            .await
            .unwrap();
        let set_id = body_json(res).await["id"].as_str().unwrap().to_string();
        let uri = format!("/flashcard-sets/{}", set_id);

        let res = app
            .clone()
            .oneshot(json_request("PUT", &uri, Some(&intruder), json!({"title": "Mine now"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(&uri)
                    .header("Authorization", format!("Bearer {}", intruder))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = app.clone().oneshot(get("/flashcard-sets", Some(&intruder))).await.unwrap();
        assert_eq!(body_json(res).await, json!([]));

        let res = app.clone().oneshot(get(&uri, Some(&owner))).await.unwrap();
        assert_eq!(body_json(res).await["title"], "Pharmacology");

        let res = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &uri,
                Some(&owner),
                json!({"title": "Pharm II", "description": "renal", "cards": [{"term": "ACE", "definition": "enzyme"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["title"], "Pharm II");

        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(&uri)
                    .header("Authorization", format!("Bearer {}", owner))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["message"], "Set deleted");
    }

    #[tokio::test]
    async fn protected_routes_require_bearer_token() {
        let app = app();
        let res = app.clone().oneshot(get("/flashcard-sets", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/flashcard-sets")
                    .header("Authorization", "Token abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app.clone().oneshot(get("/me", Some("not.a.jwt"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(res).await["code"], "UNAUTHORIZED");

        // auth is checked before the body is parsed
        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/flashcard-sets")
                    .header("Content-Type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_and_login_status_codes() {
        let app = app();
        register(&app, "a@x.com").await;

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/register",
                None,
                json!({"email": "a@x.com", "password": "pw123456"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["code"], "CONFLICT");

        let res = app
            .clone()
            .oneshot(json_request("POST", "/register", None, json!({"email": "c@x.com"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/login",
                None,
                json!({"email": "a@x.com", "password": "wrong-password"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["error"], "Invalid credentials");

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/login",
                None,
                json!({"email": "a@x.com", "password": "pw123456"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let token = body_json(res).await["token"].as_str().unwrap().to_string();

        let res = app.clone().oneshot(get("/me", Some(&token))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["email"], "a@x.com");
    }

    #[tokio::test]
    async fn google_login_route() {
        let app = app();
        let res = app
            .clone()
            .oneshot(json_request("POST", "/auth/google", None, json!({"idToken": "google-ok"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["user"]["email"], "g@x.com");

        let res = app
            .clone()
            .oneshot(json_request("POST", "/auth/google", None, json!({"idToken": "forged"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn token_for_unknown_user_is_rejected_on_set_routes() {
        use crate::flashcards::repo::FlashcardSetStore;

        let (state, _, sets) = test_state(vec![]);
        let ghost = uuid::Uuid::new_v4();
        let token = state.jwt.sign(ghost).unwrap();
        let app = build_app(state);

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/flashcard-sets",
                Some(&token),
                json!({"title": "Orphan", "cards": []}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(res).await["error"], "User not found");
        assert!(sets.list_by_owner(ghost).await.unwrap().is_empty());

        for uri in ["/flashcard-sets", "/me"] {
            let res = app.clone().oneshot(get(uri, Some(&token))).await.unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn malformed_set_id_is_not_found() {
        let app = app();
        let (token, _) = register(&app, "a@x.com").await;
        let res = app
            .clone()
            .oneshot(get("/flashcard-sets/not-a-uuid", Some(&token)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
