//! Drive both routers over real sockets, the way `serve` wires them.

mod support;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use support::{ADMIN_KEY, PREDICT_KEY, harness, reference_student, student};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

async fn spawn(router: axum::Router) -> TestResult<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service()).await;
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn public_and_admin_listeners_share_one_cache() -> TestResult<()> {
    let harness = harness();
    let public = spawn(harness.api).await?;
    let admin = spawn(harness.admin).await?;
    let client = Client::new();

    let response = client
        .post(format!("{public}/predict/batch"))
        .bearer_auth(PREDICT_KEY)
        .json(&json!({ "students": [reference_student(), student(11), reference_student()] }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-ratelimit-limit"], "1000");
    let body: Value = response.json().await?;
    assert_eq!(body["total_processed"], 3);
    // duplicates inside one batch are both computed; neither was cached yet
    assert_eq!(body["cache_hits"], 0);
    assert_eq!(
        body["predictions"][0]["predicted_score"],
        body["predictions"][2]["predicted_score"]
    );

    let stats: Value = client
        .get(format!("{admin}/cache/stats"))
        .header("x-api-key", ADMIN_KEY)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(stats["miss_count"], 3);
    assert_eq!(stats["hit_count"], 0);

    let cleared: Value = client
        .delete(format!("{admin}/cache/clear?pattern=score:*"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(cleared["cleared"], 2);
    assert_eq!(cleared["message"], "Cleared 2 cache entries");
    Ok(())
}

#[tokio::test]
async fn unknown_routes_are_404() -> TestResult<()> {
    let harness = harness();
    let public = spawn(harness.api).await?;

    let response = Client::new()
        .get(format!("{public}/predict/unknown"))
        .bearer_auth(PREDICT_KEY)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
