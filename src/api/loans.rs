//! Loan lifecycle endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ApiPath, ApiQuery};
use crate::{
    error::{AppResult, ErrorResponse},
    models::{
        loan::{CreateLoanParams, LoanDetails, LoanQuery, OverdueLoan},
        page::{LoanPage, Page},
    },
    AppState,
};

/// Outcome of an overdue sweep
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SweepResponse {
    /// Loans moved from ACTIVE to OVERDUE
    pub updated: u64,
}

/// List loans, optionally filtered by status
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Page of loans", body = LoanPage),
        (status = 400, description = "Invalid filter, paging or sort parameters", body = ErrorResponse)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LoanQuery>,
) -> AppResult<Json<Page<LoanDetails>>> {
    let loans = state.services.loans.list(&query).await?;
    Ok(Json(loans))
}

#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found", body = ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.get(id).await?;
    Ok(Json(loan))
}

/// Loan history of a user
#[utoipa::path(
    get,
    path = "/loans/user/{user_id}",
    tag = "loans",
    params(
        ("user_id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Loans of the user", body = Vec<LoanDetails>)
    )
)]
pub async fn get_user_loans(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.by_user(user_id).await?;
    Ok(Json(loans))
}

/// Loan history of a book
#[utoipa::path(
    get,
    path = "/loans/book/{book_id}",
    tag = "loans",
    params(
        ("book_id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Loans of the book", body = Vec<LoanDetails>)
    )
)]
pub async fn get_book_loans(
    State(state): State<AppState>,
    ApiPath(book_id): ApiPath<i64>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.by_book(book_id).await?;
    Ok(Json(loans))
}

/// Number of books a user currently holds (active or overdue)
#[utoipa::path(
    get,
    path = "/loans/user/{user_id}/active-count",
    tag = "loans",
    params(
        ("user_id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Outstanding loan count", body = i64)
    )
)]
pub async fn get_active_count(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> AppResult<Json<i64>> {
    let count = state.services.loans.active_count(user_id).await?;
    Ok(Json(count))
}

/// Overdue loans with days past due
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    responses(
        (status = 200, description = "Overdue loans", body = Vec<OverdueLoan>)
    )
)]
pub async fn list_overdue(State(state): State<AppState>) -> AppResult<Json<Vec<OverdueLoan>>> {
    let loans = state.services.loans.list_overdue().await?;
    Ok(Json(loans))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    params(CreateLoanParams),
    responses(
        (status = 201, description = "Loan created", body = LoanDetails),
        (status = 400, description = "Missing or invalid parameters", body = ErrorResponse),
        (status = 404, description = "User or book not found", body = ErrorResponse),
        (status = 409, description = "Book on loan or loan limit reached", body = ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<CreateLoanParams>,
) -> AppResult<(StatusCode, Json<LoanDetails>)> {
    let loan = state
        .services
        .loans
        .create_loan(params.user_id, params.book_id)
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed book
#[utoipa::path(
    put,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = LoanDetails),
        (status = 404, description = "Loan not found", body = ErrorResponse),
        (status = 409, description = "Loan already returned", body = ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.return_book(id).await?;
    Ok(Json(loan))
}

/// Mark past-due loans as overdue
#[utoipa::path(
    put,
    path = "/loans/update-overdue",
    tag = "loans",
    responses(
        (status = 200, description = "Sweep completed", body = SweepResponse)
    )
)]
pub async fn update_overdue(State(state): State<AppState>) -> AppResult<Json<SweepResponse>> {
    let updated = state.services.loans.sweep_overdue().await?;
    Ok(Json(SweepResponse { updated }))
}
