//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, loans, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "1.0.0",
        description = "Library book, borrower and loan REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api", description = "API")
    ),
    paths(
        // Books
        books::list_books,
        books::get_book,
        books::get_book_by_isbn,
        books::count_books,
        books::count_books_by_author,
        books::book_exists,
        books::author_has_books,
        books::search_preview,
        books::latest_books,
        books::scroll_books,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Users
        users::list_users,
        users::get_user,
        users::get_user_by_email,
        users::count_users,
        users::user_exists,
        users::email_exists,
        users::create_user,
        users::update_user,
        users::delete_user,
        // Loans
        loans::list_loans,
        loans::get_loan,
        loans::get_user_loans,
        loans::get_book_loans,
        loans::get_active_count,
        loans::list_overdue,
        loans::create_loan,
        loans::return_loan,
        loans::update_overdue,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::BookInput,
            crate::models::page::BookPage,
            // Users
            crate::models::user::User,
            crate::models::user::UserInput,
            crate::models::page::UserPage,
            // Loans
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanDetails,
            crate::models::loan::OverdueLoan,
            crate::models::page::LoanPage,
            loans::SweepResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "books", description = "Book catalog"),
        (name = "users", description = "Borrower directory"),
        (name = "loans", description = "Loan lifecycle"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
