//! PostgreSQL backend tests
//!
//! Need a reachable database in `DATABASE_URL`. Each test migrates a fresh
//! schema and drops it afterwards.
//!
//! Run with: cargo test --test postgres_tests -- --ignored

use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use tokio_test::assert_ok;
use tower::ServiceExt;

use libris_server::{
    api, repository::Repository, services::clock::ManualClock, AppConfig, AppState,
};

static SCHEMA_SEQ: AtomicU32 = AtomicU32::new(0);

struct PgTestApp {
    router: Router,
    clock: Arc<ManualClock>,
    admin: PgPool,
    schema: String,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap()
}

impl PgTestApp {
    async fn new() -> Self {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let schema = format!(
            "libris_test_{}_{}",
            std::process::id(),
            SCHEMA_SEQ.fetch_add(1, Ordering::SeqCst)
        );

        let admin = PgPool::connect(&url).await.expect("Failed to connect");
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
            .execute(&admin)
            .await
            .unwrap();
        sqlx::query(&format!("CREATE SCHEMA {}", schema))
            .execute(&admin)
            .await
            .unwrap();

        let options = PgConnectOptions::from_str(&url)
            .unwrap()
            .options([("search_path", schema.as_str())]);
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .expect("Failed to connect to test schema");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let clock = Arc::new(ManualClock::new(start()));
        let state = AppState::new(AppConfig::default(), Repository::postgres(pool), clock.clone());
        Self {
            router: api::router(state),
            clock,
            admin,
            schema,
        }
    }

    async fn teardown(self) {
        drop(self.router);
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema))
            .execute(&self.admin)
            .await
            .unwrap();
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = assert_ok!(axum::body::to_bytes(response.into_body(), usize::MAX).await);
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            assert_ok!(serde_json::from_slice::<Value>(&bytes))
        };
        (status, value)
    }

    async fn create_book(&self, name: &str) -> i64 {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/books",
                Some(json!({ "name": name, "author": "Ann Leckie" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn create_user(&self, email: &str) -> i64 {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/users",
                Some(json!({ "name": "Reader", "email": email })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn borrow(&self, user_id: i64, book_id: i64) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            &format!("/api/loans?userId={}&bookId={}", user_id, book_id),
            None,
        )
        .await
    }
}

#[tokio::test]
#[ignore]
async fn test_pg_overdue_sweep_uses_calendar_days() {
    let app = PgTestApp::new().await;
    let user_id = app.create_user("late@example.com").await;
    let book_id = app.create_book("Ancillary Justice").await;
    let (status, loan) = app.borrow(user_id, book_id).await;
    assert_eq!(status, StatusCode::CREATED);

    // Evening of the due date
    app.clock.advance(Duration::days(14) + Duration::hours(13));
    let (status, body) = app.send(Method::PUT, "/api/loans/update-overdue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 0);

    // Just past midnight, day 15
    app.clock.advance(Duration::hours(2));
    let (_, body) = app.send(Method::PUT, "/api/loans/update-overdue", None).await;
    assert_eq!(body["updated"], 1);
    let (_, body) = app.send(Method::PUT, "/api/loans/update-overdue", None).await;
    assert_eq!(body["updated"], 0);

    let (status, overdue) = app.send(Method::GET, "/api/loans/overdue", None).await;
    assert_eq!(status, StatusCode::OK);
    let overdue = overdue.as_array().unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0]["id"], loan["id"]);
    assert_eq!(overdue[0]["status"], "OVERDUE");
    assert_eq!(overdue[0]["overdueDays"], 1);

    app.teardown().await;
}

#[tokio::test]
#[ignore]
async fn test_pg_concurrent_loans_on_one_book() {
    let app = PgTestApp::new().await;
    let first = app.create_user("first@example.com").await;
    let second = app.create_user("second@example.com").await;
    let book_id = app.create_book("Ancillary Sword").await;

    let ((a, _), (b, _)) = tokio::join!(app.borrow(first, book_id), app.borrow(second, book_id));
    let mut statuses = vec![a, b];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);

    let (_, page) = app.send(Method::GET, "/api/loans", None).await;
    assert_eq!(page["totalElements"], 1);
    let (_, book) = app.send(Method::GET, &format!("/api/books/{}", book_id), None).await;
    assert_eq!(book["available"], false);

    app.teardown().await;
}

#[tokio::test]
#[ignore]
async fn test_pg_double_return_is_conflict() {
    let app = PgTestApp::new().await;
    let user_id = app.create_user("returner@example.com").await;
    let book_id = app.create_book("Ancillary Mercy").await;
    let (_, loan) = app.borrow(user_id, book_id).await;
    let uri = format!("/api/loans/{}/return", loan["id"]);

    app.clock.advance(Duration::days(3));
    let (status, returned) = app.send(Method::PUT, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "RETURNED");
    assert_eq!(returned["book"]["available"], true);

    let (status, body) = app.send(Method::PUT, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);

    app.teardown().await;
}

#[tokio::test]
#[ignore]
async fn test_pg_duplicates_and_sorting() {
    let app = PgTestApp::new().await;
    app.create_user("Case@Example.com").await;
    let (status, _) = app
        .send(
            Method::POST,
            "/api/users",
            Some(json!({ "name": "Other", "email": "case@example.COM" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app
        .send(Method::GET, "/api/users/email/CASE@example.com/exists", None)
        .await;
    assert_eq!(status, StatusCode::OK);

    for name in ["B", "A", "C"] {
        app.create_book(name).await;
    }
    let (status, page) = app
        .send(Method::GET, "/api/books?sort=author,asc&sort=name,desc", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = page["content"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["C", "B", "A"]);

    let (_, count) = app
        .send(Method::GET, "/api/books/count/author/Ann%20Leckie", None)
        .await;
    assert_eq!(count, 3);

    let (status, _) = app
        .send(Method::GET, "/api/books?page=9223372036854775807&size=2", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.teardown().await;
}
