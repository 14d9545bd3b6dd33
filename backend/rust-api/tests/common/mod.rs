#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use mongodb::bson::doc;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use prepdeck_api::{
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    services::AppState,
};

pub struct TestApp {
    pub router: Router,
    jwt_secret: String,
}

impl TestApp {
    pub fn token_for(&self, user_id: &str, role: &str) -> String {
        let service = JwtService::new(&self.jwt_secret);
        let now = Utc::now().timestamp();
        service
            .generate_token(JwtClaims {
                sub: user_id.to_string(),
                role: role.to_string(),
                exp: (now + 3600) as usize,
                iat: now as usize,
            })
            .expect("failed to sign test token")
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Funds a user through the purchase endpoint with a fresh payment id.
    pub async fn fund(&self, token: &str, amount: i64) -> i64 {
        let (status, body) = self
            .request(
                "POST",
                "/api/v1/credits/purchases",
                Some(token),
                Some(serde_json::json!({
                    "amount": amount,
                    "payment_id": uuid::Uuid::new_v4().to_string(),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "funding failed: {}", body);
        body["balance"].as_i64().unwrap()
    }

    pub async fn balance(&self, token: &str) -> i64 {
        let (status, body) = self
            .request("GET", "/api/v1/credits/balance", Some(token), None)
            .await;
        assert_eq!(status, StatusCode::OK, "balance failed: {}", body);
        body["balance"].as_i64().unwrap()
    }
}

pub async fn create_test_app() -> TestApp {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Load test environment from .env.test
    dotenvy::from_filename(".env.test").ok();

    let config = Config::load().expect("Failed to load test configuration");
    let jwt_secret = config.jwt_secret.clone();

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    let app_state = Arc::new(
        AppState::new(config, mongo_client, redis_client)
            .await
            .expect("Failed to initialize test app state"),
    );

    app_state
        .ensure_indexes()
        .await
        .expect("Failed to ensure test indexes");

    seed_test_data(&app_state.mongo).await;

    TestApp {
        router: create_router(app_state),
        jwt_secret,
    }
}

/// Upserts fixed pools and questions so parallel test binaries can seed
/// concurrently without tripping over each other.
async fn seed_test_data(db: &mongodb::Database) {
    let pools = db.collection::<mongodb::bson::Document>("pools");
    let questions = db.collection::<mongodb::bson::Document>("questions");

    let pool_docs = [
        doc! { "_id": "pool-ten", "name": "Ten Questions", "is_active": true, "total_question_count": 10i64 },
        doc! { "_id": "pool-two", "name": "Two Questions", "is_active": true, "total_question_count": 2i64 },
        doc! { "_id": "pool-hidden", "name": "Unpublished", "is_active": false, "total_question_count": 5i64 },
    ];
    for pool in pool_docs {
        let id = pool.get_str("_id").unwrap().to_string();
        pools
            .replace_one(doc! { "_id": id }, &pool)
            .with_options(
                mongodb::options::ReplaceOptions::builder()
                    .upsert(true)
                    .build(),
            )
            .await
            .expect("Failed to seed test pool");
    }

    let question_docs = [
        doc! { "_id": "q-active", "pool_id": "pool-ten", "text": "What is 6 * 7?", "is_active": true },
        doc! { "_id": "q-retired", "pool_id": "pool-ten", "text": "Retired question", "is_active": false },
        doc! { "_id": "q-hidden-pool", "pool_id": "pool-hidden", "text": "Hidden pool question", "is_active": true },
    ];
    for question in question_docs {
        let id = question.get_str("_id").unwrap().to_string();
        questions
            .replace_one(doc! { "_id": id }, &question)
            .with_options(
                mongodb::options::ReplaceOptions::builder()
                    .upsert(true)
                    .build(),
            )
            .await
            .expect("Failed to seed test question");
    }
}

pub fn fresh_user() -> String {
    format!("user-{}", uuid::Uuid::new_v4())
}
