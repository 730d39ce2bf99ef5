//! HTTP handlers and routing

pub mod books;
pub mod health;
pub mod loans;
pub mod openapi;
pub mod users;

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::StatusCode,
    routing::{get, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, AppState};

/// JSON body whose rejections render as the API error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor with API error rejections; repeated keys
/// (`sort=a&sort=b`) collect into `Vec` fields
#[derive(FromRequestParts)]
#[from_request(via(axum_extra::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path extractor with API error rejections
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Existence checks answer with a bare status: 200 if found, 404 if not
fn exists_status(exists: bool) -> StatusCode {
    if exists {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Build the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/count", get(books::count_books))
        .route("/books/count/author/:author", get(books::count_books_by_author))
        .route("/books/search/preview", get(books::search_preview))
        .route("/books/latest", get(books::latest_books))
        .route("/books/infinite", get(books::scroll_books))
        .route("/books/isbn/:isbn", get(books::get_book_by_isbn))
        .route("/books/author/:author/exists", get(books::author_has_books))
        .route("/books/:id/exists", get(books::book_exists))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/count", get(users::count_users))
        .route("/users/email/:email", get(users::get_user_by_email))
        .route("/users/email/:email/exists", get(users::email_exists))
        .route("/users/:id/exists", get(users::user_exists))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::create_loan))
        .route("/loans/overdue", get(loans::list_overdue))
        .route("/loans/update-overdue", put(loans::update_overdue))
        .route("/loans/user/:user_id", get(loans::get_user_loans))
        .route("/loans/user/:user_id/active-count", get(loans::get_active_count))
        .route("/loans/book/:book_id", get(loans::get_book_loans))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/return", put(loans::return_loan));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api", api)
        .with_state(state)
        .merge(openapi::create_openapi_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
