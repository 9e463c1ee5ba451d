//! Router-level tests against the in-memory store

use std::sync::Arc;

use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method, Request, StatusCode,
    },
    Router,
};
use rpms_common::{
    config::{AppConfig, StorageBackend},
    db::InMemoryStore,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::{create_router, AppState};

const ADMIN_EMAIL: &str = "admin@smu.edu";
const PASSWORD: &str = "secret123";

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let mut config = AppConfig::default();
        config.database.backend = StorageBackend::Memory;
        config.auth.jwt_secret = Some("test_secret".to_string());
        config.rate_limit.enabled = false;

        let state = AppState::new(Arc::new(config), Arc::new(InMemoryStore::new())).unwrap();
        Self {
            router: create_router(state.clone()),
            state,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    /// Token for the startup admin, seeding it on first use
    async fn admin(&self) -> String {
        self.state
            .identity
            .bootstrap_admin(ADMIN_EMAIL, PASSWORD)
            .await
            .unwrap();
        self.login(ADMIN_EMAIL).await
    }

    /// Create a user the way the role is meant to be created and return
    /// a bearer token for it: authors self-register, staff are created by
    /// the admin.
    async fn sign_up(&self, email: &str, role: &str) -> String {
        let (status, _) = if role == "author" {
            self.send(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({ "email": email, "password": PASSWORD, "name": email })),
            )
            .await
        } else {
            let admin = self.admin().await;
            self.send(
                Method::POST,
                "/api/v1/admin/users",
                Some(admin.as_str()),
                Some(json!({
                    "email": email,
                    "password": PASSWORD,
                    "name": email,
                    "role": role,
                })),
            )
            .await
        };
        assert_eq!(status, StatusCode::CREATED);
        self.login(email).await
    }

    async fn create_paper(&self, token: &str, title: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/papers",
                Some(token),
                Some(json!({ "title": title, "abstract": "An abstract", "content": "Body" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    async fn settle(&self) {
        self.state.workflow.notifier().wait_idle().await;
    }
}

#[tokio::test]
async fn test_publication_details_end_to_end() {
    let app = TestApp::new();
    let author = app.sign_up("author@smu.edu", "author").await;
    let editor = app.sign_up("editor@smu.edu", "editor").await;
    let coordinator = app.sign_up("coord@smu.edu", "coordinator").await;

    let paper_id = app.create_paper(&author, "Test Paper").await;

    let (status, paper) = app
        .send(
            Method::PUT,
            &format!("/api/v1/papers/{}/details", paper_id),
            Some(editor.as_str()),
            Some(json!({ "publication_id": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paper["publication_id"], "SMU_P201817001");
    assert_eq!(paper["status"], "submitted");

    let (status, paper) = app
        .send(
            Method::PUT,
            &format!("/api/v1/papers/{}/details", paper_id),
            Some(coordinator.as_str()),
            Some(json!({ "publication_isced_band": "Band 6" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paper["publication_id"], "SMU_P201817001");

    let (status, papers) = app.send(Method::GET, "/api/v1/papers", Some(author.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = papers
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == paper_id.as_str())
        .unwrap();
    assert_eq!(listed["title"], "Test Paper");
    assert_eq!(listed["abstract"], "An abstract");
    assert_eq!(listed["publication_isced_band"], "Band 6");
    assert_eq!(listed["publication_id"], "SMU_P201817001");
    assert_eq!(listed["author_email"], "author@smu.edu");
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/papers", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, body) = app
        .send(Method::GET, "/api/v1/notifications", Some("not.a.jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_role_gates_over_http() {
    let app = TestApp::new();
    let author = app.sign_up("author@smu.edu", "author").await;
    let editor = app.sign_up("editor@smu.edu", "editor").await;
    let coordinator = app.sign_up("coord@smu.edu", "coordinator").await;
    let paper_id = app.create_paper(&author, "Gated").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/papers",
            Some(editor.as_str()),
            Some(json!({ "title": "Not mine to write" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_ROLE");

    let recommend = format!("/api/v1/papers/{}/recommend", paper_id);
    for token in [&author, &coordinator] {
        let (status, _) = app.send(Method::POST, &recommend, Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/v1/papers/{}/details", paper_id),
            Some(author.as_str()),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, paper) = app.send(Method::POST, &recommend, Some(editor.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paper["status"], "recommended_for_publication");
}

#[tokio::test]
async fn test_review_and_notification_flow() {
    let app = TestApp::new();
    let author = app.sign_up("author@smu.edu", "author").await;
    let editor = app.sign_up("editor@smu.edu", "editor").await;
    let paper_id = app.create_paper(&author, "Reviewed").await;

    let (status, review) = app
        .send(
            Method::POST,
            "/api/v1/reviews",
            Some(editor.as_str()),
            Some(json!({
                "paper_id": paper_id,
                "rating": 5,
                "problem_statement": 90,
                "literature_review": 80,
                "methodology": 85,
                "results": 88,
                "conclusion": 75,
                "originality": 70,
                "clarity_organization": 92,
                "contribution_knowledge": 78,
                "technical_quality": 84,
                "comments": "Clear and complete",
                "recommendation": "accept",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(review["methodology"], 85);
    assert_eq!(review["recommendation"], "accept");

    let (status, reviews) = app
        .send(
            Method::GET,
            &format!("/api/v1/reviews?paper_id={}", paper_id),
            Some(author.as_str()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviews[0]["paper_title"], "Reviewed");
    assert_eq!(reviews[0]["reviewer_email"], "editor@smu.edu");

    app.settle().await;
    let (_, inbox) = app
        .send(Method::GET, "/api/v1/notifications", Some(author.as_str()), None)
        .await;
    let notification = &inbox[0];
    assert_eq!(
        notification["message"],
        "Your paper 'Reviewed' has been reviewed. Rating: 5/5, Recommendation: accept"
    );
    assert_eq!(notification["is_read"], false);

    let mark = format!("/api/v1/notifications/{}/read", notification["id"]);
    let (status, _) = app.send(Method::PUT, &mark, Some(editor.as_str()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, read) = app.send(Method::PUT, &mark, Some(author.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["is_read"], true);
}

#[tokio::test]
async fn test_delete_and_conflicts() {
    let app = TestApp::new();
    let author = app.sign_up("author@smu.edu", "author").await;
    let admin = app.admin().await;
    let paper_id = app.create_paper(&author, "Doomed").await;

    // published is not reachable from submitted
    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/papers/{}", paper_id),
            Some(admin.as_str()),
            Some(json!({ "title": "Doomed", "status": "published" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/papers/{}", paper_id),
            Some(author.as_str()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/papers/{}", paper_id),
            Some(author.as_str()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "PAPER_NOT_FOUND");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": "author@smu.edu",
                "password": "another1",
                "name": "Again",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_cannot_pick_a_role() {
    let app = TestApp::new();
    let victim = app.sign_up("victim@smu.edu", "author").await;
    let paper_id = app.create_paper(&victim, "Mine").await;

    let (status, user) = app
        .send(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": "mallory@smu.edu",
                "password": PASSWORD,
                "name": "Mallory",
                "role": "admin",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["role"], "author");

    let token = app.login("mallory@smu.edu").await;
    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/papers/{}", paper_id),
            Some(token.as_str()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/admin/users",
            Some(token.as_str()),
            Some(json!({
                "email": "boss@smu.edu",
                "password": PASSWORD,
                "name": "Boss",
                "role": "editor",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_ROLE");
}

#[tokio::test]
async fn test_admin_creates_staff_accounts() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let editor = app.sign_up("editor@smu.edu", "editor").await;

    let staff = |email: &str, role: &str| {
        json!({ "email": email, "password": PASSWORD, "name": "Staff", "role": role })
    };

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/admin/users",
            Some(editor.as_str()),
            Some(staff("coord@smu.edu", "coordinator")),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_ROLE");

    let (status, _) = app
        .send(Method::POST, "/api/v1/admin/users", None, Some(staff("coord@smu.edu", "coordinator")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/admin/users",
            Some(admin.as_str()),
            Some(staff("root2@smu.edu", "admin")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, user) = app
        .send(
            Method::POST,
            "/api/v1/admin/users",
            Some(admin.as_str()),
            Some(staff("coord@smu.edu", "coordinator")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["role"], "coordinator");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/admin/users",
            Some(admin.as_str()),
            Some(staff("coord@smu.edu", "editor")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_publication_id_conflict() {
    let app = TestApp::new();
    let author = app.sign_up("author@smu.edu", "author").await;
    let editor = app.sign_up("editor@smu.edu", "editor").await;
    let first = app.create_paper(&author, "First").await;
    let second = app.create_paper(&author, "Second").await;

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/v1/papers/{}/details", first),
            Some(editor.as_str()),
            Some(json!({ "publication_id": "SMU_P201817050" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/papers/{}/details", second),
            Some(editor.as_str()),
            Some(json!({ "publication_id": "SMU_P201817050" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_review_without_full_rubric_is_rejected() {
    let app = TestApp::new();
    let author = app.sign_up("author@smu.edu", "author").await;
    let editor = app.sign_up("editor@smu.edu", "editor").await;
    let paper_id = app.create_paper(&author, "Half scored").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/reviews",
            Some(editor.as_str()),
            Some(json!({
                "paper_id": paper_id,
                "rating": 3,
                "methodology": 85,
                "recommendation": "major_revision",
            })),
        )
        .await;
    assert!(status.is_client_error());

    let (_, reviews) = app
        .send(Method::GET, "/api/v1/reviews", Some(editor.as_str()), None)
        .await;
    assert_eq!(reviews.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_login_and_profile() {
    let app = TestApp::new();
    let token = app.sign_up("coord@smu.edu", "coordinator").await;

    let (status, profile) = app.send(Method::GET, "/api/v1/profile", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], "coord@smu.edu");
    assert_eq!(profile["role"], "coordinator");
    assert!(profile.get("password_hash").is_none());

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "coord@smu.edu", "password": "wrong-one" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.send(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["store"]["status"], "up");
}

#[tokio::test]
async fn test_rate_limit_rejects_over_burst() {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = Some("test_secret".to_string());
    config.rate_limit.requests_per_second = 1;
    config.rate_limit.burst = 1;
    let state = AppState::new(Arc::new(config), Arc::new(InMemoryStore::new())).unwrap();
    let router = create_router(state);

    let request = || Request::builder().uri("/health").body(Body::empty()).unwrap();
    let first = router.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = router.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_concurrency_limit_queues_requests() {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = Some("test_secret".to_string());
    config.rate_limit.enabled = false;
    config.server.max_concurrent_requests = 1;
    let state = AppState::new(Arc::new(config), Arc::new(InMemoryStore::new())).unwrap();
    let router = create_router(state);

    let request = || Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (first, second) = tokio::join!(
        router.clone().oneshot(request()),
        router.clone().oneshot(request())
    );
    assert_eq!(first.unwrap().status(), StatusCode::OK);
    assert_eq!(second.unwrap().status(), StatusCode::OK);

    // Permits are returned once responses complete
    let third = router.oneshot(request()).await.unwrap();
    assert_eq!(third.status(), StatusCode::OK);
}

#[test]
fn test_state_requires_jwt_secret() {
    let result = AppState::new(
        Arc::new(AppConfig::default()),
        Arc::new(InMemoryStore::new()),
    );
    assert!(result.is_err());
}
