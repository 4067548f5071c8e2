//! End-to-end tests driving the HTTP router in memory.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use task_manager::api::{AppState, build_router};
use task_manager::auth;
use task_manager::config::Config;
use task_manager::db::Database;
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "hexlet@example.com";
const ADMIN_PASSWORD: &str = "qwerty";

struct TestApp {
    router: Router,
    token: String,
}

impl TestApp {
    async fn new() -> Self {
        let mut config = Config::default();
        config.auth.bcrypt_cost = 4;

        let db = Database::open_in_memory().expect("Failed to create in-memory database");
        db.seed_defaults(&config.seed, |p| Ok(auth::hash_password(p, 4)?))
            .expect("Failed to seed");

        let router = build_router(AppState::new(Arc::new(db), Arc::new(config)));
        let token = login(&router, ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .expect("admin login");
        Self { router, token }
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = authed(&self.token, method, uri, body);
        send(&self.router, request).await
    }
}

fn authed(token: &str, method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn login(router: &Router, username: &str, password: &str) -> Option<String> {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "username": username, "password": password }).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    if response.status() != StatusCode::OK {
        return None;
    }
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    Some(String::from_utf8(bytes.to_vec()).unwrap())
}

fn id_of(value: &Value) -> i64 {
    value["id"].as_i64().expect("record id")
}

async fn create_task(app: &TestApp, body: Value) -> Value {
    let (status, task) = app.call(Method::POST, "/api/tasks", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{task}");
    task
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .uri("/api/tasks")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let request = authed("not-a-token", Method::GET, "/api/tasks", None);
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(login(&app.router, ADMIN_EMAIL, "wrong").await.is_none());
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = TestApp::new().await;
    let (status, _) = app.call(Method::POST, "/api/logout", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, "/api/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn lists_carry_total_count() {
    let app = TestApp::new().await;
    let response = app
        .router
        .clone()
        .oneshot(authed(&app.token, Method::GET, "/api/task_statuses", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-total-count"], "5");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let statuses: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(statuses[1]["slug"], "to_review");
    assert_eq!(statuses[1]["name"], "To review");
}

#[tokio::test]
async fn user_lifecycle_and_self_only_changes() {
    let app = TestApp::new().await;

    let (status, user) = app
        .call(
            Method::POST,
            "/api/users",
            Some(json!({
                "firstName": "Ada",
                "lastName": "Lovelace",
                "email": "ada@example.com",
                "password": "engine"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["firstName"], "Ada");
    assert!(user.get("password").is_none());
    let ada = id_of(&user);

    // Admin may not edit someone else.
    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/users/{ada}"),
            Some(json!({ "firstName": "Eve" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let ada_token = login(&app.router, "ada@example.com", "engine").await.unwrap();
    let request = authed(
        &ada_token,
        Method::PUT,
        &format!("/api/users/{ada}"),
        Some(json!({ "lastName": null })),
    );
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["firstName"], "Ada");
    assert_eq!(body["lastName"], Value::Null);

    // The patch carried no password, so the old one still works.
    assert!(login(&app.router, "ada@example.com", "engine").await.is_some());

    let request = authed(&ada_token, Method::DELETE, &format!("/api/users/{ada}"), None);
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.call(Method::GET, &format!("/api/users/{ada}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ENTITY_NOT_FOUND");
}

#[tokio::test]
async fn invalid_user_input_is_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/users",
            Some(json!({ "email": "not-an-email", "password": "secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert_eq!(body["field"], "email");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/users",
            Some(json!({ "email": ADMIN_EMAIL, "password": "secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_EXISTS");
}

#[tokio::test]
async fn task_partial_update_over_http() {
    let app = TestApp::new().await;

    let task = create_task(
        &app,
        json!({
            "title": "Write report",
            "content": "Quarterly",
            "status": "draft",
            "assignee_id": 1,
            "taskLabelIds": [1]
        }),
    )
    .await;
    let id = id_of(&task);
    assert_eq!(task["assignee_id"], 1);
    assert_eq!(task["taskLabelIds"], json!([1]));
    assert_eq!(task["status"], "draft");

    let (status, updated) = app
        .call(
            Method::PUT,
            &format!("/api/tasks/{id}"),
            Some(json!({ "title": "Write final report", "assignee_id": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Write final report");
    assert_eq!(updated["assignee_id"], Value::Null);
    assert_eq!(updated["content"], "Quarterly");
    assert_eq!(updated["taskLabelIds"], json!([1]));

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/tasks/{id}"),
            Some(json!({ "title": "Nope", "status": "archived" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "REFERENCE_NOT_FOUND");

    let (_, stored) = app.call(Method::GET, &format!("/api/tasks/{id}"), None).await;
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
    let app = TestApp::new().await;
    let task = create_task(&app, json!({ "title": "Report", "status": "draft" })).await;

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/tasks/{}", id_of(&task)),
            Some(json!({ "title": null })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn task_filtering_over_http() {
    let app = TestApp::new().await;
    create_task(
        &app,
        json!({ "title": "Write report", "status": "draft", "assignee_id": 1, "taskLabelIds": [1] }),
    )
    .await;
    create_task(
        &app,
        json!({ "title": "Fix REPORT export", "status": "to_review", "taskLabelIds": [2] }),
    )
    .await;
    create_task(
        &app,
        json!({ "title": "Plan sprint", "status": "to_review", "assignee_id": 1, "taskLabelIds": [1, 2] }),
    )
    .await;

    let titles = |body: &Value| -> Vec<String> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap().to_string())
            .collect()
    };

    let (status, body) = app.call(Method::GET, "/api/tasks?titleCont=report", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), ["Write report", "Fix REPORT export"]);

    let (_, body) = app
        .call(Method::GET, "/api/tasks?status=to_review&labelId=1", None)
        .await;
    assert_eq!(titles(&body), ["Plan sprint"]);

    let (_, body) = app
        .call(Method::GET, "/api/tasks?assigneeId=1&sort=title", None)
        .await;
    assert_eq!(titles(&body), ["Write report", "Plan sprint"]);

    let (status, body) = app.call(Method::GET, "/api/tasks?assigneeId=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_FILTER_VALUE");
}

#[tokio::test]
async fn reference_data_in_use_cannot_be_deleted() {
    let app = TestApp::new().await;
    let task = create_task(
        &app,
        json!({ "title": "Report", "status": "draft", "taskLabelIds": [2] }),
    )
    .await;

    let (status, body) = app.call(Method::DELETE, "/api/labels/2", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "IN_USE");

    let (status, _) = app.call(Method::DELETE, "/api/task_statuses/1", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/tasks/{}", id_of(&task)), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::DELETE, "/api/labels/2", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn label_crud() {
    let app = TestApp::new().await;

    let (status, label) = app
        .call(Method::POST, "/api/labels", Some(json!({ "name": "chore" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = id_of(&label);

    let (status, renamed) = app
        .call(
            Method::PUT,
            &format!("/api/labels/{id}"),
            Some(json!({ "name": "maintenance" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "maintenance");
    assert_eq!(renamed["createdAt"], label["createdAt"]);

    let (status, body) = app
        .call(Method::POST, "/api/labels", Some(json!({ "name": "ab" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}
