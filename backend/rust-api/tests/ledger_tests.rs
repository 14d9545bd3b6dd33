use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

mod common;

#[tokio::test]
async fn balance_starts_at_zero() {
    let app = common::create_test_app().await;
    let token = app.token_for(&common::fresh_user(), "user");

    assert_eq!(app.balance(&token).await, 0);
}

#[tokio::test]
async fn purchase_increases_balance() {
    let app = common::create_test_app().await;
    let token = app.token_for(&common::fresh_user(), "user");

    let balance = app.fund(&token, 10).await;
    assert_eq!(balance, 10);
    assert_eq!(app.balance(&token).await, 10);
}

#[tokio::test]
async fn duplicate_purchase_is_absorbed() {
    let app = common::create_test_app().await;
    let token = app.token_for(&common::fresh_user(), "user");
    let payment_id = Uuid::new_v4().to_string();
    let body = json!({ "amount": 10, "payment_id": payment_id });

    let (status, first) = app
        .request(
            "POST",
            "/api/v1/credits/purchases",
            Some(&token),
            Some(body.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["balance"], 10);

    // Webhook redelivery: same payment id, no second credit.
    let (status, second) = app
        .request(
            "POST",
            "/api/v1/credits/purchases",
            Some(&token),
            Some(body),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["balance"], 10);

    assert_eq!(app.balance(&token).await, 10);
}

#[tokio::test]
async fn purchase_amount_must_be_positive() {
    let app = common::create_test_app().await;
    let token = app.token_for(&common::fresh_user(), "user");

    let (status, _) = app
        .request(
            "POST",
            "/api/v1/credits/purchases",
            Some(&token),
            Some(json!({ "amount": 0, "payment_id": Uuid::new_v4().to_string() })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn debit_with_empty_account_fails_and_balance_is_unchanged() {
    let app = common::create_test_app().await;
    let token = app.token_for(&common::fresh_user(), "user");

    let (status, _) = app
        .request(
            "POST",
            "/api/v1/attempts/",
            Some(&token),
            Some(json!({ "pool_id": "pool-ten" })),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    assert_eq!(app.balance(&token).await, 0);
}

#[tokio::test]
async fn concurrent_debits_cannot_overdraw() {
    let app = common::create_test_app().await;
    let token = app.token_for(&common::fresh_user(), "user");
    app.fund(&token, 1).await;

    // Two tabs race to spend the single credit.
    let body = json!({ "pool_id": "pool-ten" });
    let (first, second) = tokio::join!(
        app.request("POST", "/api/v1/attempts/", Some(&token), Some(body.clone())),
        app.request("POST", "/api/v1/attempts/", Some(&token), Some(body)),
    );

    let statuses = [first.0, second.0];
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == StatusCode::CREATED)
            .count(),
        1,
        "exactly one debit may win: {:?} / {:?}",
        first.1,
        second.1
    );
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == StatusCode::PAYMENT_REQUIRED)
            .count(),
        1,
        "the loser must see insufficient funds: {:?} / {:?}",
        first.1,
        second.1
    );

    assert_eq!(app.balance(&token).await, 0);
}

#[tokio::test]
async fn conservation_across_attempt_lifecycle() {
    let app = common::create_test_app().await;
    let token = app.token_for(&common::fresh_user(), "user");

    app.fund(&token, 10).await;

    let (status, attempt) = app
        .request(
            "POST",
            "/api/v1/attempts/",
            Some(&token),
            Some(json!({ "pool_id": "pool-ten" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", attempt);
    assert_eq!(app.balance(&token).await, 9);

    // No progress was made, so the full credit comes back.
    let attempt_id = attempt["_id"].as_str().unwrap();
    let (status, abandoned) = app
        .request(
            "POST",
            &format!("/api/v1/attempts/{}/abandon", attempt_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", abandoned);
    assert_eq!(abandoned["status"], "refund_issued");
    assert_eq!(app.balance(&token).await, 10);
}

#[tokio::test]
async fn admin_grant_credits() {
    let app = common::create_test_app().await;
    let user_id = common::fresh_user();
    let user_token = app.token_for(&user_id, "user");
    let admin_token = app.token_for(&common::fresh_user(), "admin");

    let (status, body) = app
        .request(
            "POST",
            "/admin/credits/grant",
            Some(&admin_token),
            Some(json!({ "user_id": user_id, "amount": 5, "note": "support compensation" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["balance"], 5);

    assert_eq!(app.balance(&user_token).await, 5);
}

#[tokio::test]
async fn grant_requires_admin_role() {
    let app = common::create_test_app().await;
    let token = app.token_for(&common::fresh_user(), "user");

    let (status, _) = app
        .request(
            "POST",
            "/admin/credits/grant",
            Some(&token),
            Some(json!({ "user_id": "someone", "amount": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn balance_requires_authentication() {
    let app = common::create_test_app().await;

    let (status, _) = app
        .request("GET", "/api/v1/credits/balance", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
