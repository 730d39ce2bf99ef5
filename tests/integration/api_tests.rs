//! API integration tests
//!
//! Drive the router in-process on the in-memory backend with a manual clock.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tokio_test::assert_ok;
use tower::ServiceExt;

use libris_server::{
    api, repository::Repository, services::clock::ManualClock, AppConfig, AppState,
};

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap()
}

impl TestApp {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(start()));
        let state = AppState::new(AppConfig::default(), Repository::in_memory(), clock.clone());
        Self {
            router: api::router(state),
            clock,
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(CONTENT_TYPE, "application/json");
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

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn put(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, None).await
    }

    async fn create_book(&self, name: &str) -> i64 {
        let (status, body) = self
            .post("/api/books", json!({ "name": name, "author": "N. K. Jemisin" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn create_user(&self, email: &str) -> i64 {
        let (status, body) = self
            .post("/api/users", json!({ "name": "Reader", "email": email }))
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

fn timestamp(value: &Value) -> DateTime<Utc> {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new();

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = TestApp::new();
    let (status, body) = app.get("/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/loans/{id}/return"].is_object());
}

#[tokio::test]
async fn test_book_crud() {
    let app = TestApp::new();

    let (status, created) = app
        .post(
            "/api/books",
            json!({
                "name": "The Fifth Season",
                "author": "N. K. Jemisin",
                "isbn": "978-0-316-22929-6",
                "publishYear": 2015
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["available"], true);
    assert_eq!(created["publishYear"], 2015);
    assert!(created.get("active").is_none());
    let id = created["id"].as_i64().unwrap();

    let (status, body) = app.get(&format!("/api/books/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "The Fifth Season");

    let (status, body) = app.get("/api/books/isbn/978-0-316-22929-6").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (_, count) = app.get("/api/books/count").await;
    assert_eq!(count, 1);

    let (status, updated) = app
        .send(
            Method::PUT,
            &format!("/api/books/{}", id),
            Some(json!({ "name": "The Fifth Season", "author": "Nora K. Jemisin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["author"], "Nora K. Jemisin");

    let (status, _) = app.send(Method::DELETE, &format!("/api/books/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&format!("/api/books/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn test_book_listing_envelope() {
    let app = TestApp::new();
    for name in ["Kindred", "Dawn", "Imago", "Adulthood Rites", "Wild Seed"] {
        app.create_book(name).await;
    }

    let (status, page) = app.get("/api/books?size=2&page=2&sort=name,asc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalElements"], 5);
    assert_eq!(page["totalPages"], 3);
    assert_eq!(page["numberOfElements"], 1);
    assert_eq!(page["number"], 2);
    assert_eq!(page["first"], false);
    assert_eq!(page["last"], true);
    assert_eq!(page["empty"], false);
    assert_eq!(page["content"][0]["name"], "Wild Seed");

    let (_, page) = app.get("/api/books?keyword=SEED").await;
    assert_eq!(page["totalElements"], 1);
    assert_eq!(page["size"], 1000);

    let (status, body) = app.get("/api/books?sort=secret").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_validation_errors_use_error_envelope() {
    let app = TestApp::new();

    let (status, body) = app.post("/api/books", json!({ "isbn": "123" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"].as_str().unwrap().contains("Book name is required"));
    assert!(body["timestamp"].is_string());

    let (status, body) = app
        .post("/api/users", json!({ "name": "Nobody", "email": "not-an-email" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid email format");

    let (status, _) = app.get("/api/books/not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let app = TestApp::new();
    app.create_user("reader@example.com").await;

    let (status, body) = app
        .post("/api/users", json!({ "name": "Other", "email": "READER@example.com" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);

    let (status, body) = app.get("/api/users/email/reader@example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Reader");
}

#[tokio::test]
async fn test_loan_lifecycle() {
    let app = TestApp::new();
    let user_id = app.create_user("borrower@example.com").await;
    let book_id = app.create_book("The Obelisk Gate").await;

    let (status, loan) = app.borrow(user_id, book_id).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loan["status"], "ACTIVE");
    assert_eq!(loan["user"]["id"], user_id);
    assert_eq!(loan["book"]["available"], false);
    assert!(loan["returnDate"].is_null());
    assert_eq!(timestamp(&loan["loanDate"]), start());
    assert_eq!(timestamp(&loan["dueDate"]), start() + Duration::days(14));
    let loan_id = loan["id"].as_i64().unwrap();

    let (_, book) = app.get(&format!("/api/books/{}", book_id)).await;
    assert_eq!(book["available"], false);

    let (status, _) = app.borrow(user_id, book_id).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, count) = app.get(&format!("/api/loans/user/{}/active-count", user_id)).await;
    assert_eq!(count, 1);

    app.clock.advance(Duration::days(2));
    let (status, returned) = app.put(&format!("/api/loans/{}/return", loan_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "RETURNED");
    assert_eq!(timestamp(&returned["returnDate"]), start() + Duration::days(2));

    let (_, book) = app.get(&format!("/api/books/{}", book_id)).await;
    assert_eq!(book["available"], true);

    let (status, body) = app.put(&format!("/api/loans/{}/return", loan_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);

    let (_, history) = app.get(&format!("/api/loans/book/{}", book_id)).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_loan_request_errors() {
    let app = TestApp::new();
    let user_id = app.create_user("someone@example.com").await;

    let (status, _) = app.borrow(user_id, 999).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send(Method::POST, "/api/loans?userId=1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.put("/api/loans/42/return").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/loans?status=LOST").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_overdue_sweep_uses_calendar_days() {
    let app = TestApp::new();
    let user_id = app.create_user("late@example.com").await;
    let book_id = app.create_book("The Stone Sky").await;
    let (_, loan) = app.borrow(user_id, book_id).await;

    // Late evening on the due date
    app.clock.advance(Duration::days(14) + Duration::hours(13));
    let (status, body) = app.put("/api/loans/update-overdue").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 0);

    // Shortly after midnight the next day
    app.clock.advance(Duration::hours(2));
    let (_, body) = app.put("/api/loans/update-overdue").await;
    assert_eq!(body["updated"], 1);
    let (_, body) = app.put("/api/loans/update-overdue").await;
    assert_eq!(body["updated"], 0);

    let (status, overdue) = app.get("/api/loans/overdue").await;
    assert_eq!(status, StatusCode::OK);
    let overdue = overdue.as_array().unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0]["id"], loan["id"]);
    assert_eq!(overdue[0]["status"], "OVERDUE");
    assert_eq!(overdue[0]["overdueDays"], 1);

    let (_, page) = app.get("/api/loans?status=OVERDUE").await;
    assert_eq!(page["totalElements"], 1);

    // The book stays on loan until it comes back
    let (_, book) = app.get(&format!("/api/books/{}", book_id)).await;
    assert_eq!(book["available"], false);
}

#[tokio::test]
async fn test_concurrent_loans_on_one_book() {
    let app = TestApp::new();
    let first = app.create_user("first@example.com").await;
    let second = app.create_user("second@example.com").await;
    let book_id = app.create_book("The City We Became").await;

    let ((a, _), (b, _)) = tokio::join!(app.borrow(first, book_id), app.borrow(second, book_id));
    let mut statuses = vec![a, b];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);

    let (_, page) = app.get("/api/loans").await;
    assert_eq!(page["totalElements"], 1);
}

#[tokio::test]
async fn test_deletes_blocked_by_outstanding_loans() {
    let app = TestApp::new();
    let user_id = app.create_user("holder@example.com").await;
    let book_id = app.create_book("Broken Earth").await;
    let (_, loan) = app.borrow(user_id, book_id).await;

    let (status, _) = app.send(Method::DELETE, &format!("/api/books/{}", book_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app.send(Method::DELETE, &format!("/api/users/{}", user_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.put(&format!("/api/loans/{}/return", loan["id"])).await;

    let (status, _) = app.send(Method::DELETE, &format!("/api/users/{}", user_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, count) = app.get("/api/users/count").await;
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_repeated_sort_keys() {
    let app = TestApp::new();
    for (name, author) in [("Dawn", "Butler"), ("Kindred", "Butler"), ("Emma", "Austen")] {
        let (status, _) = app
            .post("/api/books", json!({ "name": name, "author": author }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = app.get("/api/books?sort=author,desc&sort=name,desc").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = page["content"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Kindred", "Dawn", "Emma"]);

    let (status, page) = app.get("/api/users?sort=name,asc&sort=createdAt,desc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalElements"], 0);

    let (status, _) = app.get("/api/loans?sort=dueDate,desc&sort=id").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/books?page=18446744073709551615&size=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_existence_checks() {
    let app = TestApp::new();
    let user_id = app.create_user("Checker@Example.com").await;
    let book_id = app.create_book("The Killing Moon").await;

    let (status, body) = app.get(&format!("/api/users/{}/exists", user_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());
    let (status, _) = app.get("/api/users/999/exists").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/users/email/checker@example.com/exists").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/users/email/nobody@example.com/exists").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get(&format!("/api/books/{}/exists", book_id)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/books/999/exists").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/books/author/N.%20K.%20Jemisin/exists").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/books/author/Jemisin/exists").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, count) = app.get("/api/books/count/author/N.%20K.%20Jemisin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_preview_latest_and_scroll() {
    let app = TestApp::new();
    let mut ids = Vec::new();
    for n in 0..12 {
        ids.push(app.create_book(&format!("Dreamblood {}", n)).await);
        app.clock.advance(Duration::minutes(1));
    }

    let (status, page) = app.get("/api/books/search/preview?keyword=dreamblood&limit=25").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["size"], 10);
    assert_eq!(page["numberOfElements"], 10);
    assert_eq!(page["totalElements"], 12);

    let (_, page) = app.get("/api/books/search/preview?keyword=dreamblood").await;
    assert_eq!(page["numberOfElements"], 5);

    let (status, page) = app.get("/api/books/latest?limit=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["size"], 3);
    assert_eq!(page["content"][0]["id"], ids[11]);
    assert_eq!(page["content"][2]["id"], ids[9]);

    let (_, page) = app.get("/api/books/latest?limit=500").await;
    assert_eq!(page["size"], 50);

    let (status, batch) = app.get("/api/books/infinite?size=4").await;
    assert_eq!(status, StatusCode::OK);
    let batch = batch.as_array().unwrap();
    assert_eq!(batch.len(), 4);
    assert_eq!(batch[0]["id"], ids[11]);
    let last = batch[3]["id"].as_i64().unwrap();

    let (_, next) = app.get(&format!("/api/books/infinite?lastId={}", last)).await;
    let next = next.as_array().unwrap();
    assert_eq!(next.len(), 8);
    assert_eq!(next[0]["id"], ids[7]);

    let (_, all) = app.get("/api/books/infinite?size=1000").await;
    assert_eq!(all.as_array().unwrap().len(), 12);
}
