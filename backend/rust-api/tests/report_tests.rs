use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;

async fn file_report(app: &common::TestApp, token: &str, question_id: &str) -> Value {
    let (status, report) = app
        .request(
            "POST",
            "/api/v1/reports/",
            Some(token),
            Some(json!({ "question_id": question_id, "reason": "answer key looks wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", report);
    report
}

#[tokio::test]
async fn filing_requires_authentication() {
    let app = common::create_test_app().await;

    let (status, _) = app
        .request(
            "POST",
            "/api/v1/reports/",
            None,
            Some(json!({ "question_id": "q-active", "reason": "broken" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn report_is_visible_to_reporter_and_admin_only() {
    let app = common::create_test_app().await;
    let reporter = common::fresh_user();
    let reporter_token = app.token_for(&reporter, "user");
    let other_token = app.token_for(&common::fresh_user(), "user");
    let admin_token = app.token_for(&common::fresh_user(), "admin");

    let report = file_report(&app, &reporter_token, "q-active").await;
    let report_id = report["_id"].as_str().unwrap();
    assert_eq!(report["status"], "pending");
    assert_eq!(report["reporter_id"], reporter.as_str());

    let (status, body) = app
        .request(
            "GET",
            &format!("/api/v1/reports/{}", report_id),
            Some(&reporter_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_id"], report_id);

    // Other users cannot even learn the report exists.
    let (status, _) = app
        .request(
            "GET",
            &format!("/api/v1/reports/{}", report_id),
            Some(&other_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(
            "GET",
            &format!("/api/v1/reports/{}", report_id),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn cannot_report_a_question_the_caller_cannot_see() {
    let app = common::create_test_app().await;
    let token = app.token_for(&common::fresh_user(), "user");

    let (status, _) = app
        .request(
            "POST",
            "/api/v1/reports/",
            Some(&token),
            Some(json!({ "question_id": "q-hidden-pool", "reason": "broken" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn review_advances_one_step_at_a_time() {
    let app = common::create_test_app().await;
    let reporter_token = app.token_for(&common::fresh_user(), "user");
    let admin = common::fresh_user();
    let admin_token = app.token_for(&admin, "admin");

    let report = file_report(&app, &reporter_token, "q-active").await;
    let report_id = report["_id"].as_str().unwrap();

    // Skipping straight to resolved is illegal.
    let (status, _) = app
        .request(
            "POST",
            &format!("/admin/reports/{}/review", report_id),
            Some(&admin_token),
            Some(json!({ "status": "resolved" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, reviewed) = app
        .request(
            "POST",
            &format!("/admin/reports/{}/review", report_id),
            Some(&admin_token),
            Some(json!({ "status": "reviewed", "notes": "taking a look" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", reviewed);
    assert_eq!(reviewed["status"], "reviewed");
    assert_eq!(reviewed["reviewed_by"], admin.as_str());
    assert_eq!(reviewed["admin_notes"], "taking a look");

    let (status, resolved) = app
        .request(
            "POST",
            &format!("/admin/reports/{}/review", report_id),
            Some(&admin_token),
            Some(json!({ "status": "resolved", "notes": "replaced the answer key" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["status"], "resolved");

    // Terminal states accept no further transitions.
    let (status, _) = app
        .request(
            "POST",
            &format!("/admin/reports/{}/review", report_id),
            Some(&admin_token),
            Some(json!({ "status": "dismissed" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn review_requires_admin_role() {
    let app = common::create_test_app().await;
    let reporter_token = app.token_for(&common::fresh_user(), "user");

    let report = file_report(&app, &reporter_token, "q-active").await;
    let report_id = report["_id"].as_str().unwrap();

    let (status, _) = app
        .request(
            "POST",
            &format!("/admin/reports/{}/review", report_id),
            Some(&reporter_token),
            Some(json!({ "status": "reviewed" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_lists_reports_by_status() {
    let app = common::create_test_app().await;
    let reporter_token = app.token_for(&common::fresh_user(), "user");
    let admin_token = app.token_for(&common::fresh_user(), "admin");

    let report = file_report(&app, &reporter_token, "q-active").await;
    let report_id = report["_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            "GET",
            "/admin/reports?status=pending",
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["_id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&report_id.as_str()));
}
