//! Repository layer for storage operations
//!
//! Services depend on the traits below; [`Repository`] bundles one
//! implementation of each and is handed to the services at startup.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookFilter, BookInput, BookSortField},
        loan::{LoanDetails, LoanFilter, LoanPolicy, LoanSortField, LoanStatus, NewLoan},
        page::{Page, PageRequest},
        user::{User, UserFilter, UserInput, UserSortField},
    },
};

#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Non-deleted book by id
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Book>>;
    async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>>;
    async fn search(&self, filter: &BookFilter, page: &PageRequest<BookSortField>) -> AppResult<Page<Book>>;
    async fn count(&self) -> AppResult<i64>;
    /// Non-deleted books whose author equals `author` exactly
    async fn count_by_author(&self, author: &str) -> AppResult<i64>;
    /// Up to `size` books with id below `last_id`, highest id first
    async fn scroll(&self, last_id: Option<i64>, size: u64) -> AppResult<Vec<Book>>;
    async fn create(&self, book: &BookInput, now: DateTime<Utc>) -> AppResult<Book>;
    /// Updates descriptive fields; availability is left untouched
    async fn update(&self, id: i64, book: &BookInput, now: DateTime<Utc>) -> AppResult<Book>;
    /// Soft delete; Conflict while the book is on loan
    async fn delete(&self, id: i64, now: DateTime<Utc>) -> AppResult<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn search(&self, filter: &UserFilter, page: &PageRequest<UserSortField>) -> AppResult<Page<User>>;
    async fn count(&self) -> AppResult<i64>;
    async fn create(&self, user: &UserInput, now: DateTime<Utc>) -> AppResult<User>;
    async fn update(&self, id: i64, user: &UserInput, now: DateTime<Utc>) -> AppResult<User>;
    /// Soft delete; Conflict while the user has outstanding loans
    async fn delete(&self, id: i64, now: DateTime<Utc>) -> AppResult<()>;
}

#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<LoanDetails>>;
    async fn search(&self, filter: &LoanFilter, page: &PageRequest<LoanSortField>) -> AppResult<Page<LoanDetails>>;
    async fn find_by_user(&self, user_id: i64) -> AppResult<Vec<LoanDetails>>;
    async fn find_by_book(&self, book_id: i64) -> AppResult<Vec<LoanDetails>>;
    async fn find_by_status(&self, status: LoanStatus) -> AppResult<Vec<LoanDetails>>;
    /// Active and overdue loans held by a user
    async fn count_outstanding(&self, user_id: i64) -> AppResult<i64>;
    /// Inserts the loan and marks the book unavailable as one atomic step
    async fn create(&self, loan: &NewLoan, policy: &LoanPolicy) -> AppResult<LoanDetails>;
    /// Returns the loan and marks the book available as one atomic step
    async fn return_loan(&self, id: i64, now: DateTime<Utc>) -> AppResult<LoanDetails>;
    /// Moves past-due active loans to OVERDUE, returning how many changed
    async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

#[async_trait]
pub trait HealthCheckRepository: Send + Sync {
    async fn check(&self) -> bool;
}

/// Storage handles shared by all services
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookRepository>,
    pub users: Arc<dyn UserRepository>,
    pub loans: Arc<dyn LoanRepository>,
    pub health: Arc<dyn HealthCheckRepository>,
}

impl Repository {
    /// Create a repository backed by the given PostgreSQL pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(postgres::BooksRepository::new(pool.clone())),
            users: Arc::new(postgres::UsersRepository::new(pool.clone())),
            loans: Arc::new(postgres::LoansRepository::new(pool.clone())),
            health: Arc::new(postgres::PoolHealth::new(pool)),
        }
    }

    /// Create a repository keeping everything in process memory
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            books: store.clone(),
            users: store.clone(),
            loans: store.clone(),
            health: store,
        }
    }
}
