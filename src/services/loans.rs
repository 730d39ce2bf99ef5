//! Loan lifecycle service
//!
//! Owns the borrowing rules: due dates, the one-outstanding-loan-per-book
//! gate, the per-user cap, returns and the ACTIVE -> OVERDUE sweep. Book
//! availability changes in the same repository call as the loan itself.

use std::sync::Arc;

use super::clock::Clock;
use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{
        loan::{LoanDetails, LoanFilter, LoanPolicy, LoanQuery, LoanSortField, LoanStatus, OverdueLoan},
        page::{Page, PageRequest, Sort},
    },
    repository::Repository,
};

pub const DEFAULT_PAGE_SIZE: u64 = 20;

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    policy: LoanPolicy,
}

impl LoansService {
    pub fn new(repository: Repository, config: &LoansConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            policy: LoanPolicy::new(config.period_days, config.max_per_user),
        }
    }

    /// Borrow a book
    pub async fn create_loan(&self, user_id: i64, book_id: i64) -> AppResult<LoanDetails> {
        let draft = self.policy.draft(user_id, book_id, self.clock.now());
        let loan = self.repository.loans.create(&draft, &self.policy).await?;

        tracing::info!(
            loan_id = loan.id,
            user_id,
            book_id,
            due_date = %loan.due_date,
            "Loan created"
        );
        Ok(loan)
    }

    /// Return a borrowed book; fails with Conflict when already returned
    pub async fn return_book(&self, loan_id: i64) -> AppResult<LoanDetails> {
        let loan = self.repository.loans.return_loan(loan_id, self.clock.now()).await?;
        tracing::info!(loan_id, book_id = loan.book.id, "Book returned");
        Ok(loan)
    }

    /// Move every past-due ACTIVE loan to OVERDUE
    pub async fn sweep_overdue(&self) -> AppResult<u64> {
        let updated = self.repository.loans.mark_overdue(self.clock.now()).await?;
        if updated > 0 {
            tracing::info!(updated, "Loans marked overdue");
        } else {
            tracing::debug!("No loans became overdue");
        }
        Ok(updated)
    }

    /// Overdue loans with days past due as of today
    pub async fn list_overdue(&self) -> AppResult<Vec<OverdueLoan>> {
        let now = self.clock.now();
        let loans = self.repository.loans.find_by_status(LoanStatus::Overdue).await?;
        Ok(loans
            .into_iter()
            .map(|loan| OverdueLoan {
                overdue_days: loan.loan().overdue_days(now),
                loan,
            })
            .collect())
    }

    pub async fn get(&self, id: i64) -> AppResult<LoanDetails> {
        self.repository
            .loans
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    pub async fn list(&self, query: &LoanQuery) -> AppResult<Page<LoanDetails>> {
        let request = PageRequest::from_query(
            query.page,
            query.size,
            &query.sort,
            DEFAULT_PAGE_SIZE,
            Sort::asc(LoanSortField::LoanDate),
        )?;
        let filter = LoanFilter { status: query.status };
        self.repository.loans.search(&filter, &request).await
    }

    /// Loan history of a user, returned loans included
    pub async fn by_user(&self, user_id: i64) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.find_by_user(user_id).await
    }

    /// Loan history of a book
    pub async fn by_book(&self, book_id: i64) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.find_by_book(book_id).await
    }

    /// Outstanding (active or overdue) loans held by a user
    pub async fn active_count(&self, user_id: i64) -> AppResult<i64> {
        self.repository.loans.count_outstanding(user_id).await
    }
}
