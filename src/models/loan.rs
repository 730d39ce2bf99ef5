//! Loan model, status transitions and borrowing rules

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};

use super::{book::Book, page::SortField, user::User};
use crate::error::{AppError, AppResult};

/// Loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Active,
    Returned,
    Overdue,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Returned => "RETURNED",
            LoanStatus::Overdue => "OVERDUE",
        }
    }

    /// Active and overdue loans hold the book
    pub fn is_outstanding(&self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overdue)
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Ok(LoanStatus::Active),
            "RETURNED" => Ok(LoanStatus::Returned),
            "OVERDUE" => Ok(LoanStatus::Overdue),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// SQLx conversion for LoanStatus
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Loan record as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_outstanding(&self) -> bool {
        self.status.is_outstanding()
    }

    /// Past due once the calendar date (UTC) is after the due date
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        now.date_naive() > self.due_date.date_naive()
    }

    /// Whole calendar days elapsed since the due date
    pub fn overdue_days(&self, now: DateTime<Utc>) -> i64 {
        (now.date_naive() - self.due_date.date_naive())
            .num_days()
            .max(0)
    }

    /// ACTIVE|OVERDUE -> RETURNED
    pub fn mark_returned(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        match self.status {
            LoanStatus::Returned => Err(AppError::Conflict(format!(
                "Loan {} has already been returned",
                self.id
            ))),
            LoanStatus::Active | LoanStatus::Overdue => {
                self.status = LoanStatus::Returned;
                self.return_date = Some(now);
                self.updated_at = now;
                Ok(())
            }
        }
    }

    /// ACTIVE -> OVERDUE when past due. Returns whether the loan changed.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> bool {
        match self.status {
            LoanStatus::Active if self.is_past_due(now) => {
                self.status = LoanStatus::Overdue;
                self.updated_at = now;
                true
            }
            LoanStatus::Active | LoanStatus::Returned | LoanStatus::Overdue => false,
        }
    }
}

/// Loan about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub user_id: i64,
    pub book_id: i64,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Borrowing rules applied when a loan is created
#[derive(Debug, Clone, Copy)]
pub struct LoanPolicy {
    pub period: Duration,
    pub max_per_user: i64,
}

impl LoanPolicy {
    pub fn new(period_days: i64, max_per_user: i64) -> Self {
        Self {
            period: Duration::days(period_days),
            max_per_user,
        }
    }

    pub fn draft(&self, user_id: i64, book_id: i64, now: DateTime<Utc>) -> NewLoan {
        NewLoan {
            user_id,
            book_id,
            loan_date: now,
            due_date: now + self.period,
        }
    }

    /// Availability is the per-book gate; the cap counts the borrower's outstanding loans
    pub fn check_borrow(&self, book: &Book, outstanding: i64) -> AppResult<()> {
        if !book.available {
            return Err(AppError::Conflict(format!(
                "Book {} is currently on loan",
                book.id
            )));
        }
        if outstanding >= self.max_per_user {
            return Err(AppError::Conflict(format!(
                "Maximum loans reached ({}/{})",
                outstanding, self.max_per_user
            )));
        }
        Ok(())
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self::new(14, 5)
    }
}

/// Loan with borrower and book embedded
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanDetails {
    pub id: i64,
    pub user: User,
    pub book: Book,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanDetails {
    pub fn new(loan: Loan, user: User, book: Book) -> Self {
        Self {
            id: loan.id,
            user,
            book,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
            status: loan.status,
            created_at: loan.created_at,
            updated_at: loan.updated_at,
        }
    }

    /// Bare loan record
    pub fn loan(&self) -> Loan {
        Loan {
            id: self.id,
            user_id: self.user.id,
            book_id: self.book.id,
            loan_date: self.loan_date,
            due_date: self.due_date,
            return_date: self.return_date,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Overdue loan with the number of days past due
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverdueLoan {
    #[serde(flatten)]
    pub loan: LoanDetails,
    pub overdue_days: i64,
}

/// Loan list query parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
    pub page: Option<u64>,
    pub size: Option<u64>,
    #[serde(default)]
    pub sort: Vec<String>,
}

/// Borrow request parameters
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase", parameter_in = Query)]
pub struct CreateLoanParams {
    pub user_id: i64,
    pub book_id: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoanFilter {
    pub status: Option<LoanStatus>,
}

impl LoanFilter {
    pub fn matches(&self, loan: &Loan) -> bool {
        self.status.map_or(true, |s| loan.status == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanSortField {
    Id,
    LoanDate,
    DueDate,
    ReturnDate,
    Status,
    CreatedAt,
    UpdatedAt,
}

impl FromStr for LoanSortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "loanDate" | "loan_date" => Ok(Self::LoanDate),
            "dueDate" | "due_date" => Ok(Self::DueDate),
            "returnDate" | "return_date" => Ok(Self::ReturnDate),
            "status" => Ok(Self::Status),
            "createdAt" | "created_at" => Ok(Self::CreatedAt),
            "updatedAt" | "updated_at" => Ok(Self::UpdatedAt),
            other => Err(format!("Cannot sort loans by '{}'", other)),
        }
    }
}

impl SortField for LoanSortField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::LoanDate => "loan_date",
            Self::DueDate => "due_date",
            Self::ReturnDate => "return_date",
            Self::Status => "status",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}
