mod support;

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use scorecast::application::api_keys::{ApiPrincipal, Credential};
use scorecast::application::tokens::TokenIssuer;
use scorecast::config::{CorsOrigins, CorsSettings};
use scorecast::domain::api_keys::ApiScope;
use serde_json::{Value, json};
use tower::ServiceExt;

use support::{
    ADMIN_KEY, HarnessOptions, PREDICT_KEY, harness, harness_with, json_body, reference_student,
    request, student,
};

#[tokio::test]
async fn open_routes_need_no_key() {
    let harness = harness();

    let response = harness
        .api
        .clone()
        .oneshot(request(Method::GET, "/", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await;
    assert_eq!(body["service"], "scorecast");
    assert_eq!(body["model"], "linear");

    let response = harness
        .api
        .clone()
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["cache"], "connected");
    assert_eq!(body["cluster_model"], true);
}

#[tokio::test]
async fn protected_routes_reject_missing_and_unknown_keys() {
    let harness = harness();

    for key in [None, Some("not-a-key")] {
        let response = harness
            .api
            .clone()
            .oneshot(request(Method::POST, "/predict", key, Some(reference_student())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "unauthorized");
    }
}

#[tokio::test]
async fn x_api_key_header_is_accepted() {
    let harness = harness();
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .header("x-api-key", PREDICT_KEY)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(reference_student().to_string()))
        .unwrap();

    let response = harness.api.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn reference_student_is_served_from_cache_on_repeat() {
    let harness = harness();

    let first = json_body(
        harness
            .api
            .clone()
            .oneshot(request(
                Method::POST,
                "/predict",
                Some(PREDICT_KEY),
                Some(reference_student()),
            ))
            .await
            .unwrap(),
    )
    .await;
    let second = json_body(
        harness
            .api
            .clone()
            .oneshot(request(
                Method::POST,
                "/predict",
                Some(PREDICT_KEY),
                Some(reference_student()),
            ))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first["cached"], false);
    assert_eq!(second["cached"], true);
    assert_eq!(first["predicted_score"], second["predicted_score"]);

    let score = first["predicted_score"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&score), "score {score} out of range");
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let harness = harness();

    let mut out_of_range = reference_student();
    out_of_range["focus"] = json!(101.0);
    let mut unknown_field = reference_student();
    unknown_field["mood"] = json!(3);
    let mut missing_field = reference_student();
    missing_field
        .as_object_mut()
        .unwrap()
        .remove("engagement_time");

    for body in [out_of_range, unknown_field, missing_field] {
        let response = harness
            .api
            .clone()
            .oneshot(request(Method::POST, "/predict", Some(PREDICT_KEY), Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "invalid_input");
    }

    let mut negative_time = reference_student();
    negative_time["engagement_time"] = json!(-1.0);
    let response = harness
        .api
        .clone()
        .oneshot(request(
            Method::POST,
            "/predict",
            Some(PREDICT_KEY),
            Some(negative_time),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert!(
        body["error"]["hint"]
            .as_str()
            .unwrap()
            .contains("engagement_time")
    );
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let harness = harness();
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .header("authorization", format!("Bearer {PREDICT_KEY}"))
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{\"comprehension\": "))
        .unwrap();

    let response = harness.api.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_preserves_order_around_cached_items() {
    let harness = harness();

    let single = json_body(
        harness
            .api
            .clone()
            .oneshot(request(
                Method::POST,
                "/predict",
                Some(PREDICT_KEY),
                Some(student(3)),
            ))
            .await
            .unwrap(),
    )
    .await;

    let students: Vec<Value> = (0..6).map(student).collect();
    let response = harness
        .api
        .clone()
        .oneshot(request(
            Method::POST,
            "/predict/batch",
            Some(PREDICT_KEY),
            Some(json!({ "students": students })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert_eq!(body["total_processed"], 6);
    assert_eq!(body["cache_hits"], 1);
    assert!(body["processing_time_ms"].as_f64().unwrap() >= 0.0);

    let predictions = body["predictions"].as_array().unwrap();
    for (position, item) in predictions.iter().enumerate() {
        assert_eq!(item["index"], position);
        assert_eq!(item["cached"], position == 3);
    }
    assert_eq!(predictions[3]["predicted_score"], single["predicted_score"]);

    // scores rise with every feature in the baseline model
    let scores: Vec<f64> = predictions
        .iter()
        .map(|item| item["predicted_score"].as_f64().unwrap())
        .collect();
    assert!(scores.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn repeated_batch_is_fully_cached() {
    let harness = harness();
    let body = json!({ "students": (0..10).map(student).collect::<Vec<_>>() });

    let first = json_body(
        harness
            .api
            .clone()
            .oneshot(request(
                Method::POST,
                "/predict/batch",
                Some(PREDICT_KEY),
                Some(body.clone()),
            ))
            .await
            .unwrap(),
    )
    .await;
    let second = json_body(
        harness
            .api
            .clone()
            .oneshot(request(
                Method::POST,
                "/predict/batch",
                Some(PREDICT_KEY),
                Some(body),
            ))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first["cache_hits"], 0);
    assert_eq!(second["cache_hits"], 10);
    let scores = |value: &Value| -> Vec<Value> {
        value["predictions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["predicted_score"].clone())
            .collect()
    };
    assert_eq!(scores(&first), scores(&second));
}

#[tokio::test]
async fn batch_size_boundaries() {
    let harness = harness();

    let at_limit = json!({ "students": (0..100).map(student).collect::<Vec<_>>() });
    let response = harness
        .api
        .clone()
        .oneshot(request(
            Method::POST,
            "/predict/batch",
            Some(PREDICT_KEY),
            Some(at_limit),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["total_processed"], 100);

    let over_limit = json!({ "students": (0..101).map(student).collect::<Vec<_>>() });
    let response = harness
        .api
        .clone()
        .oneshot(request(
            Method::POST,
            "/predict/batch",
            Some(PREDICT_KEY),
            Some(over_limit),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        json_body(response).await["error"]["code"],
        "batch_too_large"
    );

    let empty = json!({ "students": [] });
    let response = harness
        .api
        .clone()
        .oneshot(request(
            Method::POST,
            "/predict/batch",
            Some(PREDICT_KEY),
            Some(empty),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total_processed"], 0);
    assert_eq!(body["predictions"], json!([]));
}

#[tokio::test]
async fn one_invalid_item_rejects_the_batch() {
    let harness = harness();
    let mut students: Vec<Value> = (0..4).map(student).collect();
    students[2]["attention"] = json!(250.0);

    let response = harness
        .api
        .clone()
        .oneshot(request(
            Method::POST,
            "/predict/batch",
            Some(PREDICT_KEY),
            Some(json!({ "students": students })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "invalid_input");
    assert!(body["error"]["hint"].as_str().unwrap().contains("item 2"));

    // nothing from the rejected batch was cached
    let stats = harness.cache.stats().await;
    assert_eq!(stats.hit_count + stats.miss_count, 0);
}

#[tokio::test]
async fn cluster_routes_assign_personas() {
    let harness = harness();

    let response = harness
        .api
        .clone()
        .oneshot(request(
            Method::POST,
            "/cluster",
            Some(PREDICT_KEY),
            Some(reference_student()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["cluster_label"], 0);
    assert_eq!(body["persona_name"], "Consistent Learner");
    assert!(matches!(
        body["confidence"].as_str(),
        Some("high" | "medium" | "low")
    ));
    assert_eq!(body["cached"], false);
    let confidence = body["confidence"].clone();

    let response = harness
        .api
        .clone()
        .oneshot(request(
            Method::POST,
            "/cluster/batch",
            Some(PREDICT_KEY),
            Some(json!({ "students": [reference_student(), student(7)] })),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total_processed"], 2);
    assert_eq!(body["cache_hits"], 1);
    assert_eq!(body["predictions"][0]["index"], 0);
    assert_eq!(body["predictions"][0]["cached"], true);
    assert_eq!(body["predictions"][0]["confidence"], confidence);
    assert_eq!(body["predictions"][1]["index"], 1);
    assert_eq!(body["available_personas"].as_array().unwrap().len(), 4);

    let response = harness
        .api
        .clone()
        .oneshot(request(Method::GET, "/personas", Some(PREDICT_KEY), None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total_clusters"], 4);
    assert_eq!(body["personas"][0], "Consistent Learner");
    assert_eq!(body["cluster_mapping"][2]["cluster_label"], 2);
}

#[tokio::test]
async fn score_and_cluster_caches_do_not_collide() {
    let harness = harness();

    for uri in ["/predict", "/cluster"] {
        let response = harness
            .api
            .clone()
            .oneshot(request(
                Method::POST,
                uri,
                Some(PREDICT_KEY),
                Some(reference_student()),
            ))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["cached"], false, "{uri}");
    }
}

#[tokio::test]
async fn cluster_routes_without_model_are_unavailable() {
    let harness = harness_with(HarnessOptions {
        with_clusters: false,
        ..HarnessOptions::default()
    });

    for (method, uri, body) in [
        (Method::POST, "/cluster", Some(reference_student())),
        (Method::GET, "/personas", None),
    ] {
        let response = harness
            .api
            .clone()
            .oneshot(request(method, uri, Some(PREDICT_KEY), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            json_body(response).await["error"]["code"],
            "model_unavailable"
        );
    }
}

#[tokio::test]
async fn rate_limit_returns_retry_after() {
    let harness = harness_with(HarnessOptions {
        rate_limit: 2,
        ..HarnessOptions::default()
    });

    for _ in 0..2 {
        let response = harness
            .api
            .clone()
            .oneshot(request(Method::GET, "/personas", Some(PREDICT_KEY), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = harness
        .api
        .clone()
        .oneshot(request(Method::GET, "/personas", Some(PREDICT_KEY), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "60");

    // other keys keep their own budget
    let response = harness
        .api
        .clone()
        .oneshot(request(Method::GET, "/personas", Some(ADMIN_KEY), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_require_admin_scope() {
    let harness = harness();

    let response = harness
        .admin
        .clone()
        .oneshot(request(Method::GET, "/cache/stats", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = harness
        .admin
        .clone()
        .oneshot(request(Method::GET, "/cache/stats", Some(PREDICT_KEY), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"]["code"], "forbidden");

    let response = harness
        .admin
        .clone()
        .oneshot(request(Method::GET, "/health", Some(ADMIN_KEY), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn admin_stats_and_clear() {
    let harness = harness();
    let predict = || {
        request(
            Method::POST,
            "/predict",
            Some(PREDICT_KEY),
            Some(reference_student()),
        )
    };

    harness.api.clone().oneshot(predict()).await.unwrap();
    harness.api.clone().oneshot(predict()).await.unwrap();

    let response = harness
        .admin
        .clone()
        .oneshot(request(Method::GET, "/cache/stats", Some(ADMIN_KEY), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = json_body(response).await;
    assert_eq!(stats["enabled"], true);
    assert_eq!(stats["backend"], "memory");
    assert_eq!(stats["connected"], true);
    assert_eq!(stats["hit_count"], 1);
    assert_eq!(stats["miss_count"], 1);
    assert_eq!(stats["hit_rate"], 50.0);

    let response = harness
        .admin
        .clone()
        .oneshot(request(
            Method::DELETE,
            "/cache/clear?pattern=cluster:*",
            Some(ADMIN_KEY),
            None,
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["cleared"], 0);
    assert_eq!(body["pattern"], "cluster:*");

    let response = harness
        .admin
        .clone()
        .oneshot(request(Method::DELETE, "/cache/clear", Some(ADMIN_KEY), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Cleared 1 cache entries");
    assert_eq!(body["pattern"], "*");
    assert_eq!(body["cleared"], 1);

    let again = json_body(harness.api.clone().oneshot(predict()).await.unwrap()).await;
    assert_eq!(again["cached"], false);
}

#[tokio::test]
async fn disabled_cache_still_predicts() {
    let harness = harness_with(HarnessOptions {
        cache: scorecast::cache::CacheConfig {
            enabled: false,
            ..support::memory_cache_config()
        },
        ..HarnessOptions::default()
    });

    for _ in 0..2 {
        let response = harness
            .api
            .clone()
            .oneshot(request(
                Method::POST,
                "/predict",
                Some(PREDICT_KEY),
                Some(reference_student()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["cached"], false);
    }

    let health = json_body(
        harness
            .api
            .clone()
            .oneshot(request(Method::GET, "/health", None, None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(health["cache"], "disabled");
    assert_eq!(health["status"], "healthy");
}

fn token_harness() -> support::Harness {
    harness_with(HarnessOptions {
        tokens: Some(TokenIssuer::new(
            "test-signing-secret",
            Duration::from_secs(1800),
        )),
        ..HarnessOptions::default()
    })
}

#[tokio::test]
async fn api_key_exchanges_for_a_bearer_token() {
    let harness = token_harness();

    let response = harness
        .api
        .clone()
        .oneshot(request(Method::POST, "/auth/token", Some(PREDICT_KEY), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 1800);
    let token = body["access_token"].as_str().unwrap().to_string();

    let response = harness
        .api
        .clone()
        .oneshot(request(
            Method::POST,
            "/predict",
            Some(&token),
            Some(reference_student()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // the token carries only the predict scope of the key it came from
    let response = harness
        .admin
        .clone()
        .oneshot(request(Method::GET, "/cache/stats", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // tokens cannot mint further tokens
    let response = harness
        .api
        .clone()
        .oneshot(request(Method::POST, "/auth/token", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn forged_or_foreign_tokens_are_rejected() {
    let harness = token_harness();
    let frontend = ApiPrincipal {
        name: "frontend".into(),
        scopes: vec![ApiScope::Predict],
        credential: Credential::ApiKey,
    };
    let foreign = TokenIssuer::new("someone-else", Duration::from_secs(60))
        .issue(&frontend)
        .unwrap()
        .access_token;

    for token in ["a.b.c", foreign.as_str()] {
        let response = harness
            .api
            .clone()
            .oneshot(request(
                Method::POST,
                "/predict",
                Some(token),
                Some(reference_student()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{token}");
    }
}

#[tokio::test]
async fn token_route_is_absent_without_a_secret() {
    let response = harness()
        .api
        .oneshot(request(Method::POST, "/auth/token", Some(PREDICT_KEY), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

const DASHBOARD: &str = "https://dashboard.example.com";

fn cors_harness() -> support::Harness {
    harness_with(HarnessOptions {
        cors: Some(CorsSettings {
            origins: CorsOrigins::List(vec![HeaderValue::from_static(DASHBOARD)]),
            max_age: Duration::from_secs(600),
        }),
        ..HarnessOptions::default()
    })
}

#[tokio::test]
async fn cors_preflight_is_answered_before_auth() {
    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/predict/batch")
        .header("origin", DASHBOARD)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "authorization,content-type")
        .body(Body::empty())
        .unwrap();

    let response = cors_harness().api.oneshot(preflight).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], DASHBOARD);
    assert_eq!(headers["access-control-max-age"], "600");
    let allowed = headers["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(allowed.contains("authorization"));
    assert!(allowed.contains("x-api-key"));
}

#[tokio::test]
async fn cors_headers_only_for_configured_origins() {
    let harness = cors_harness();
    let call = |origin: &'static str| {
        let mut request = request(
            Method::POST,
            "/predict",
            Some(PREDICT_KEY),
            Some(reference_student()),
        );
        request
            .headers_mut()
            .insert("origin", HeaderValue::from_static(origin));
        harness.api.clone().oneshot(request)
    };

    let allowed = call(DASHBOARD).await.unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(allowed.headers()["access-control-allow-origin"], DASHBOARD);
    let exposed = allowed.headers()["access-control-expose-headers"]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(exposed.contains("x-request-id"));

    let foreign = call("https://elsewhere.example.org").await.unwrap();
    assert_eq!(foreign.status(), StatusCode::OK);
    assert!(!foreign.headers().contains_key("access-control-allow-origin"));

    let mut plain = request(
        Method::POST,
        "/predict",
        Some(PREDICT_KEY),
        Some(reference_student()),
    );
    plain
        .headers_mut()
        .insert("origin", HeaderValue::from_static(DASHBOARD));
    let response = harness_with(HarnessOptions::default())
        .api
        .oneshot(plain)
        .await
        .unwrap();
    assert!(!response.headers().contains_key("access-control-allow-origin"));
}
