//! # Web API Integration Tests
//!
//! Drive the router in-process with `oneshot` against a migrated test database.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

use common::{app, fixture};

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(pool: &PgPool, request: Request<Body>) -> (StatusCode, Value) {
    let response = app(pool.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[sqlx::test(migrator = "oeem_datastore::database::MIGRATOR")]
async fn test_bad_token_is_rejected(pool: PgPool) {
    fixture(&pool, "read write").await;

    let (status, body) = send(
        &pool,
        request(Method::GET, "/datastore/consumption/", Some("BAD"), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Authentication credentials were not provided.");

    let (status, _) = send(&pool, request(Method::GET, "/datastore/project/", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrator = "oeem_datastore::database::MIGRATOR")]
async fn test_token_without_scope_is_forbidden(pool: PgPool) {
    let f = fixture(&pool, "").await;

    let (status, body) = send(
        &pool,
        request(Method::GET, "/datastore/consumption/", Some(&f.token), None),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "You do not have permission to perform this action.");
}

#[sqlx::test(migrator = "oeem_datastore::database::MIGRATOR")]
async fn test_read_scope_cannot_write(pool: PgPool) {
    let f = fixture(&pool, "read").await;

    let (status, _) = send(
        &pool,
        request(Method::GET, "/datastore/project/", Some(&f.token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &pool,
        request(
            Method::POST,
            "/datastore/project/",
            Some(&f.token),
            Some(json!({"project_owner": f.project_owner.id, "project_id": "P"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrator = "oeem_datastore::database::MIGRATOR")]
async fn test_consumption_create_read(pool: PgPool) {
    let f = fixture(&pool, "read write").await;

    let (status, created) = send(
        &pool,
        request(
            Method::POST,
            "/datastore/consumption/",
            Some(&f.token),
            Some(json!({
                "fuel_type": "E",
                "energy_unit": "KWH",
                "records": [{"start": "2014-01-01T00:00:00+00:00", "value": 0, "estimated": false}]
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["fuel_type"], "E");
    assert_eq!(created["energy_unit"], "KWH");
    assert_eq!(created["project"], Value::Null);
    assert_eq!(created["records"].as_array().unwrap().len(), 1);

    let id = created["id"].as_i64().unwrap();
    let (status, fetched) = send(
        &pool,
        request(
            Method::GET,
            &format!("/datastore/consumption/{id}/"),
            Some(&f.token),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["records"][0]["start"], "2014-01-01T00:00:00Z");
    assert_eq!(fetched["records"][0]["value"], 0.0);
    assert_eq!(fetched["records"][0]["estimated"], false);

    let (status, listed) = send(
        &pool,
        request(Method::GET, "/datastore/consumption/", Some(&f.token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[sqlx::test(migrator = "oeem_datastore::database::MIGRATOR")]
async fn test_consumption_update_and_delete(pool: PgPool) {
    let f = fixture(&pool, "read write").await;

    let (_, created) = send(
        &pool,
        request(
            Method::POST,
            "/datastore/consumption/",
            Some(&f.token),
            Some(json!({"fuel_type": "NG", "energy_unit": "THM"})),
        ),
    )
    .await;
    let uri = format!("/datastore/consumption/{}/", created["id"]);

    let (status, updated) = send(
        &pool,
        request(
            Method::PUT,
            &uri,
            Some(&f.token),
            Some(json!({
                "fuel_type": "NG",
                "energy_unit": "THM",
                "records": [
                    {"start": "2014-01-01T00:00:00Z", "value": 10.5},
                    {"start": "2014-02-01T00:00:00Z", "value": null}
                ]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["records"].as_array().unwrap().len(), 2);
    assert_eq!(updated["records"][1]["value"], Value::Null);

    let (status, _) = send(&pool, request(Method::DELETE, &uri, Some(&f.token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&pool, request(Method::GET, &uri, Some(&f.token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Not found.");
}

#[sqlx::test(migrator = "oeem_datastore::database::MIGRATOR")]
async fn test_consumption_rejects_unknown_project(pool: PgPool) {
    let f = fixture(&pool, "read write").await;

    let (status, body) = send(
        &pool,
        request(
            Method::POST,
            "/datastore/consumption/",
            Some(&f.token),
            Some(json!({"fuel_type": "E", "energy_unit": "KWH", "project": 999})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("project"));
}

#[sqlx::test(migrator = "oeem_datastore::database::MIGRATOR")]
async fn test_project_create_read(pool: PgPool) {
    let f = fixture(&pool, "read write").await;

    let (status, created) = send(
        &pool,
        request(
            Method::POST,
            "/datastore/project/",
            Some(&f.token),
            Some(json!({
                "project_owner": f.project_owner.id,
                "project_id": "PROJECTID_1",
                "baseline_period_start": null,
                "baseline_period_end": "2014-01-01T00:00:00+00:00",
                "reporting_period_start": "2014-02-01T00:00:00+00:00",
                "reporting_period_end": null,
                "zipcode": "01234",
                "weather_station": "012345",
                "latitude": 89.0,
                "longitude": -42.0
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["project_owner"], f.project_owner.id);
    assert_eq!(created["project_id"], "PROJECTID_1");
    assert_eq!(created["baseline_period_start"], Value::Null);
    assert_eq!(created["baseline_period_end"], "2014-01-01T00:00:00Z");
    assert_eq!(created["reporting_period_start"], "2014-02-01T00:00:00Z");
    assert_eq!(created["zipcode"], "01234");
    assert_eq!(created["weather_station"], "012345");
    assert_eq!(created["latitude"], 89.0);
    assert_eq!(created["longitude"], -42.0);

    let (status, fetched) = send(
        &pool,
        request(
            Method::GET,
            &format!("/datastore/project/{}/", created["id"]),
            Some(&f.token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[sqlx::test(migrator = "oeem_datastore::database::MIGRATOR")]
async fn test_project_validation(pool: PgPool) {
    let f = fixture(&pool, "read write").await;

    let (status, _) = send(
        &pool,
        request(
            Method::POST,
            "/datastore/project/",
            Some(&f.token),
            Some(json!({"project_owner": f.project_owner.id, "project_id": ""})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &pool,
        request(
            Method::POST,
            "/datastore/project/",
            Some(&f.token),
            Some(json!({"project_owner": f.project_owner.id + 100, "project_id": "P"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &pool,
        request(
            Method::POST,
            "/datastore/project/",
            Some(&f.token),
            Some(json!({"project_id": "missing owner"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrator = "oeem_datastore::database::MIGRATOR")]
async fn test_health_routes_are_public(pool: PgPool) {
    let (status, body) = send(&pool, request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&pool, request(Method::GET, "/ready", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"]["detail"], "reachable");
    assert_eq!(body["status"], "ready");
}
