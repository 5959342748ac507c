use super::common::*;
use crate::production::router::{SECRET_HEADER, SUBJECT_HEADER};
use crate::production::{production_router, ADMIN_SUBJECT};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn router(harness: &Harness) -> Router {
    production_router(harness.service.clone())
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn with_credential(mut request: Request<Body>, subject: &str, secret: &str) -> Request<Body> {
    let headers = request.headers_mut();
    headers.insert(SUBJECT_HEADER, subject.parse().expect("header value"));
    headers.insert(SECRET_HEADER, secret.parse().expect("header value"));
    request
}

fn admin_json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    with_credential(json_request(method, uri, body), ADMIN_SUBJECT, ADMIN_SECRET)
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is json")
}

fn rule_body() -> Value {
    json!({
        "sector": "Corte",
        "model": "Model-X",
        "operation": "Laser Cut",
        "points_per_unit": 5.0
    })
}

fn log_body(operator: &str, quantity: u32) -> Value {
    json!({
        "timestamp": "2024-01-10T09:00:00",
        "operator": operator,
        "sector": "Corte",
        "model": "Model-X",
        "operation": "Laser Cut",
        "quantity": quantity,
        "order_ref": "OP-2024-01"
    })
}

#[tokio::test]
async fn rule_writes_require_admin_headers() {
    let harness = harness();

    let anonymous = router(&harness)
        .oneshot(json_request(Method::POST, "/api/v1/rules", rule_body()))
        .await
        .expect("router responds");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let created = router(&harness)
        .oneshot(admin_json_request(Method::POST, "/api/v1/rules", rule_body()))
        .await
        .expect("router responds");
    assert_eq!(created.status(), StatusCode::CREATED);
    let rule = read_json(created).await;
    assert_eq!(rule["points_per_unit"], 5.0);

    let duplicate = router(&harness)
        .oneshot(admin_json_request(Method::POST, "/api/v1/rules", rule_body()))
        .await
        .expect("router responds");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn logging_work_returns_priced_entry() {
    let harness = harness();
    harness
        .service
        .add_rule(laser_cut_rule())
        .expect("rule added");

    let response = router(&harness)
        .oneshot(json_request(Method::POST, "/api/v1/logs", log_body("A", 100)))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let entry = read_json(response).await;
    assert_eq!(entry["total_points"], 500.0);
    assert_eq!(entry["operator"], "A");

    let listed = router(&harness)
        .oneshot(get("/api/v1/logs?date=2024-01-10&operator=A"))
        .await
        .expect("router responds");
    assert_eq!(listed.status(), StatusCode::OK);
    let entries = read_json(listed).await;
    assert_eq!(entries.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn zero_quantity_is_unprocessable() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(json_request(Method::POST, "/api/v1/logs", log_body("A", 0)))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn half_open_range_is_rejected() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(get("/api/v1/logs?from=2024-01-01"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn missing_log_edit_is_not_found_and_delete_is_no_content() {
    let harness = harness();
    let missing = router(&harness)
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/logs/log-missing",
            log_body("A", 1),
        ))
        .await
        .expect("router responds");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let entry = harness
        .service
        .log_work(work("A", 10, "Model-X", 1))
        .expect("logged");
    let deleted = router(&harness)
        .oneshot(with_credential(
            delete(&format!("/api/v1/logs/{}", entry.id)),
            ADMIN_SUBJECT,
            ADMIN_SECRET,
        ))
        .await
        .expect("router responds");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    assert!(harness.logs.get(&entry.id).is_none());
}

#[tokio::test]
async fn operators_change_only_their_own_logs() {
    let harness = harness();
    let own = harness
        .service
        .log_work(work("Ana", 10, "Model-X", 1))
        .expect("logged");
    let foreign = harness
        .service
        .log_work(work("A", 10, "Model-X", 1))
        .expect("logged");
    let own_uri = format!("/api/v1/logs/{}", own.id);

    let anonymous = router(&harness)
        .oneshot(delete(&own_uri))
        .await
        .expect("router responds");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let wrong_pin = router(&harness)
        .oneshot(with_credential(delete(&own_uri), "Ana", "0000"))
        .await
        .expect("router responds");
    assert_eq!(wrong_pin.status(), StatusCode::UNAUTHORIZED);

    let someone_else = router(&harness)
        .oneshot(with_credential(
            delete(&format!("/api/v1/logs/{}", foreign.id)),
            "Ana",
            "4821",
        ))
        .await
        .expect("router responds");
    assert_eq!(someone_else.status(), StatusCode::UNAUTHORIZED);
    assert!(harness.logs.get(&foreign.id).is_some());

    let reassigned = router(&harness)
        .oneshot(with_credential(
            json_request(Method::PUT, &own_uri, log_body("A", 5)),
            "Ana",
            "4821",
        ))
        .await
        .expect("router responds");
    assert_eq!(reassigned.status(), StatusCode::UNAUTHORIZED);

    let edited = router(&harness)
        .oneshot(with_credential(
            json_request(Method::PUT, &own_uri, log_body("Ana", 5)),
            "Ana",
            "4821",
        ))
        .await
        .expect("router responds");
    assert_eq!(edited.status(), StatusCode::OK);
    assert_eq!(read_json(edited).await["quantity"], 5);

    let deleted = router(&harness)
        .oneshot(with_credential(delete(&own_uri), "Ana", "4821"))
        .await
        .expect("router responds");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    assert!(harness.logs.get(&own.id).is_none());
}

#[tokio::test]
async fn history_limit_is_bounded_by_the_long_window() {
    let harness = harness();
    let long = router(&harness)
        .oneshot(get("/api/v1/operators/A/history?limit=30"))
        .await
        .expect("router responds");
    assert_eq!(long.status(), StatusCode::OK);

    let too_long = router(&harness)
        .oneshot(get("/api/v1/operators/A/history?limit=31"))
        .await
        .expect("router responds");
    assert_eq!(too_long.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn monthly_report_reflects_rated_and_unrated_days() {
    let harness = harness();
    harness
        .service
        .add_rule(laser_cut_rule())
        .expect("rule added");
    for submission in [
        work("A", 10, "Model-X", 100),
        work("A", 11, "Model-X", 50),
        work("A", 11, "Model-Q", 20),
    ] {
        harness.service.log_work(submission).expect("logged");
    }

    let response = router(&harness)
        .oneshot(get("/api/v1/operators/A/report?month=2024-01"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let report = read_json(response).await;
    assert_eq!(report["averages"]["avg_general"], 75.0);
    assert_eq!(report["averages"]["avg_productive"], 100.0);
    assert_eq!(report["days"].as_array().map(Vec::len), Some(2));

    let malformed = router(&harness)
        .oneshot(get("/api/v1/operators/A/report?month=2024-13"))
        .await
        .expect("router responds");
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dashboard_requires_a_date() {
    let harness = harness();
    let response = router(&harness)
        .oneshot(get("/api/v1/dashboard"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let empty_day = router(&harness)
        .oneshot(get("/api/v1/dashboard?date=2024-01-10"))
        .await
        .expect("router responds");
    assert_eq!(empty_day.status(), StatusCode::OK);
    let dashboard = read_json(empty_day).await;
    assert_eq!(dashboard["total_points"], 0.0);
}

#[tokio::test]
async fn target_updates_are_admin_only() {
    let harness = harness();

    let current = router(&harness)
        .oneshot(get("/api/v1/target"))
        .await
        .expect("router responds");
    assert_eq!(read_json(current).await["points"], 500.0);

    let rejected = router(&harness)
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/target",
            json!({ "points": 1000.0 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

    let invalid = router(&harness)
        .oneshot(admin_json_request(
            Method::PUT,
            "/api/v1/target",
            json!({ "points": -3.0 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let stored = router(&harness)
        .oneshot(admin_json_request(
            Method::PUT,
            "/api/v1/target",
            json!({ "points": 1000.0 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(stored.status(), StatusCode::OK);
    assert_eq!(harness.service.target().expect("target").points(), 1000.0);
}

#[tokio::test]
async fn recalculate_endpoint_reports_summary() {
    let harness = harness();
    harness
        .service
        .add_rule(laser_cut_rule())
        .expect("rule added");
    harness.logs.seed(stored_entry("a", "Model-X", 4, 0.0));

    let response = router(&harness)
        .oneshot(admin_json_request(
            Method::POST,
            "/api/v1/rules/recalculate",
            json!({}),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let summary = read_json(response).await;
    assert_eq!(summary["updated"], 1);
    assert_eq!(summary["failed_batches"], 0);
}

#[tokio::test]
async fn csv_import_with_bad_row_is_bad_request() {
    let harness = harness();
    let mut request = admin_json_request(Method::POST, "/api/v1/rules/import", json!(null));
    *request.body_mut() = Body::from("sector,model,operation,points_per_unit\nTejido,Model-X,Cut,1\n");

    let response = router(&harness)
        .oneshot(request)
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_endpoint_checks_credentials() {
    let harness = harness();

    let valid = router(&harness)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/auth/verify",
            json!({ "subject": "Ana", "secret": "4821" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(valid.status(), StatusCode::OK);
    assert_eq!(read_json(valid).await["valid"], true);

    let invalid = router(&harness)
        .oneshot(json_request(
            Method::POST,
            "/api/v1/auth/verify",
            json!({ "subject": "Ana", "secret": "0000" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(read_json(invalid).await["valid"], false);
}

#[tokio::test]
async fn catalog_registration_round_trips() {
    let harness = harness();
    let created = router(&harness)
        .oneshot(admin_json_request(
            Method::POST,
            "/api/v1/catalog/models",
            json!({ "name": "Model-X" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(created.status(), StatusCode::CREATED);

    let catalog = router(&harness)
        .oneshot(get("/api/v1/catalog"))
        .await
        .expect("router responds");
    let body = read_json(catalog).await;
    assert_eq!(body["models"][0]["name"], "Model-X");
}
