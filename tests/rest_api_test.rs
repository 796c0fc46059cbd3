/// Integration tests for the taskd REST API.
/// Spins up a real server on a free port and drives it over HTTP.
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use taskd::{config::ServerConfig, rest, AppContext};

/// Start a server on a random port and return its base URL plus the context
/// (for minting tokens).
async fn start_test_server() -> (String, Arc<AppContext>) {
    let data_dir = tempfile::tempdir().unwrap().keep();
    let config = ServerConfig::new(
        Some(0),
        Some(data_dir),
        Some("warn".to_string()),
        None,
    );
    let ctx = AppContext::bootstrap(config).await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = rest::build_router(ctx.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    (format!("http://{addr}"), ctx)
}

fn bearer(ctx: &AppContext, user: &str) -> String {
    format!("Bearer {}", ctx.verifier.issue(user, 3600).unwrap())
}

#[tokio::test]
async fn test_health_is_open() {
    let (url, _ctx) = start_test_server().await;
    let resp = reqwest::get(format!("{url}/api/v1/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_auth_reasons_are_distinguishable() {
    let (url, ctx) = start_test_server().await;
    let client = reqwest::Client::new();
    let tasks_url = format!("{url}/api/v1/tasks");

    // Missing credential.
    let resp = client.get(&tasks_url).send().await.unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], "missing");

    // Expired.
    let expired = ctx.verifier.issue("u1", -60).unwrap();
    let resp = client
        .get(&tasks_url)
        .header("Authorization", format!("Bearer {expired}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], "expired");

    // Malformed.
    let resp = client
        .get(&tasks_url)
        .header("Authorization", "Bearer not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], "malformed");

    // Bad signature.
    let other = taskd::identity::TokenVerifier::new("some-entirely-different-secret!!");
    let forged = other.issue("u1", 3600).unwrap();
    let resp = client
        .get(&tasks_url)
        .header("Authorization", format!("Bearer {forged}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], "unverifiable");
}

#[tokio::test]
async fn test_create_complete_filter_flow() {
    let (url, ctx) = start_test_server().await;
    let client = reqwest::Client::new();
    let auth = bearer(&ctx, "u1");

    // Create → 201 with defaults.
    let resp = client
        .post(format!("{url}/api/v1/tasks"))
        .header("Authorization", &auth)
        .json(&json!({ "title": "Buy milk", "category": "personal", "priority": "low" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let task: Value = resp.json().await.unwrap();
    assert_eq!(task["status"], "pending");
    assert_eq!(task["order"], 0);
    assert_eq!(task["owner"], "u1");
    assert_eq!(task["isOverdue"], false);
    assert_eq!(task["age"], 0);
    let id = task["id"].as_str().unwrap().to_string();

    // Complete it.
    let resp = client
        .patch(format!("{url}/api/v1/tasks/{id}"))
        .header("Authorization", &auth)
        .json(&json!({ "status": "completed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert!(updated["completedAt"].is_string());

    // Filtered list contains exactly that task.
    let resp = client
        .get(format!("{url}/api/v1/tasks?status=completed"))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], id.as_str());
}

#[tokio::test]
async fn test_validation_errors_are_itemized() {
    let (url, ctx) = start_test_server().await;
    let client = reqwest::Client::new();

    let past = (Utc::now() - Duration::hours(2)).to_rfc3339();
    let resp = client
        .post(format!("{url}/api/v1/tasks"))
        .header("Authorization", bearer(&ctx, "u1"))
        .json(&json!({ "title": "", "category": "chores", "dueDate": past }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);

    let body: Value = resp.json().await.unwrap();
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 3);
    let fields: Vec<&str> = errors
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"title"));
    assert!(fields.contains(&"category"));
    assert!(fields.contains(&"dueDate"));
}

#[tokio::test]
async fn test_bad_filter_value_is_rejected() {
    let (url, ctx) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{url}/api/v1/tasks?status=archived"))
        .header("Authorization", bearer(&ctx, "u1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn test_owner_isolation_over_http() {
    let (url, ctx) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{url}/api/v1/tasks"))
        .header("Authorization", bearer(&ctx, "u1"))
        .json(&json!({ "title": "mine" }))
        .send()
        .await
        .unwrap();
    let task: Value = resp.json().await.unwrap();
    let id = task["id"].as_str().unwrap();

    // Another principal cannot see, update, or delete it.
    let other = bearer(&ctx, "u2");
    let resp = client
        .get(format!("{url}/api/v1/tasks/{id}"))
        .header("Authorization", &other)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .delete(format!("{url}/api/v1/tasks/{id}"))
        .header("Authorization", &other)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .get(format!("{url}/api/v1/tasks"))
        .header("Authorization", &other)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body["tasks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_distinguishes_not_found() {
    let (url, ctx) = start_test_server().await;
    let client = reqwest::Client::new();
    let auth = bearer(&ctx, "u1");

    let resp = client
        .post(format!("{url}/api/v1/tasks"))
        .header("Authorization", &auth)
        .json(&json!({ "title": "ephemeral" }))
        .send()
        .await
        .unwrap();
    let task: Value = resp.json().await.unwrap();
    let id = task["id"].as_str().unwrap();

    let resp = client
        .delete(format!("{url}/api/v1/tasks/{id}"))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    // Second delete — already gone.
    let resp = client
        .delete(format!("{url}/api/v1/tasks/{id}"))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_reorder_endpoint() {
    let (url, ctx) = start_test_server().await;
    let client = reqwest::Client::new();
    let auth = bearer(&ctx, "u1");

    let mut ids = Vec::new();
    for title in ["t1", "t2", "t3"] {
        let resp = client
            .post(format!("{url}/api/v1/tasks"))
            .header("Authorization", &auth)
            .json(&json!({ "title": title }))
            .send()
            .await
            .unwrap();
        let task: Value = resp.json().await.unwrap();
        ids.push(task["id"].as_str().unwrap().to_string());
    }

    // [t3, t1, t2]
    let resp = client
        .put(format!("{url}/api/v1/tasks/reorder"))
        .header("Authorization", &auth)
        .json(&json!([{ "id": ids[2] }, { "id": ids[0] }, { "id": ids[1] }]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["updated"], 3);

    let resp = client
        .get(format!("{url}/api/v1/tasks"))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let tasks = body["tasks"].as_array().unwrap();
    let titles: Vec<&str> = tasks.iter().map(|t| t["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["t3", "t1", "t2"]);
    assert_eq!(tasks[0]["order"], 0);
    assert_eq!(tasks[1]["order"], 1);
    assert_eq!(tasks[2]["order"], 2);
}

#[tokio::test]
async fn test_category_and_due_projections() {
    let (url, ctx) = start_test_server().await;
    let client = reqwest::Client::new();
    let auth = bearer(&ctx, "u1");

    let due = Utc::now() + Duration::days(3);
    client
        .post(format!("{url}/api/v1/tasks"))
        .header("Authorization", &auth)
        .json(&json!({ "title": "deadline", "category": "work", "dueDate": due.to_rfc3339() }))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{url}/api/v1/tasks"))
        .header("Authorization", &auth)
        .json(&json!({ "title": "errand" }))
        .send()
        .await
        .unwrap();

    let resp = client
        .get(format!("{url}/api/v1/tasks/category/work"))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "deadline");

    let day = due.with_timezone(&chrono::Local).format("%Y-%m-%d");
    let resp = client
        .get(format!("{url}/api/v1/tasks/due/{day}"))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "deadline");

    // Unknown category name is a validation error, not an empty list.
    let resp = client
        .get(format!("{url}/api/v1/tasks/category/chores"))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
}
