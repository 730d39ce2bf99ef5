//! In-process storage backend
//!
//! A single async mutex guards the whole store, so every operation (and in
//! particular loan creation and return) observes and updates books and loans
//! together.

use std::{cmp::Ordering, collections::BTreeMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{BookRepository, HealthCheckRepository, LoanRepository, UserRepository};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookFilter, BookInput, BookSortField},
        loan::{Loan, LoanDetails, LoanFilter, LoanPolicy, LoanSortField, LoanStatus, NewLoan},
        page::{cmp_nullable, Page, PageRequest},
        user::{User, UserFilter, UserInput, UserSortField},
    },
};

#[derive(Default)]
struct State {
    books: BTreeMap<i64, Book>,
    users: BTreeMap<i64, User>,
    loans: BTreeMap<i64, Loan>,
    last_book_id: i64,
    last_user_id: i64,
    last_loan_id: i64,
}

impl State {
    fn book(&self, id: i64) -> Option<&Book> {
        self.books.get(&id).filter(|b| b.active)
    }

    fn user(&self, id: i64) -> Option<&User> {
        self.users.get(&id).filter(|u| u.active)
    }

    fn isbn_taken(&self, isbn: Option<&str>, except: Option<i64>) -> bool {
        isbn.map_or(false, |isbn| {
            self.books
                .values()
                .any(|b| b.active && Some(b.id) != except && b.isbn.as_deref() == Some(isbn))
        })
    }

    /// Active user whose email equals `email` ignoring case, like `LOWER(email)` in SQL
    fn user_by_email(&self, email: &str) -> Option<&User> {
        let email = email.to_lowercase();
        self.users
            .values()
            .find(|u| u.active && u.email.to_lowercase() == email)
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        let email = email.to_lowercase();
        self.users
            .values()
            .any(|u| u.active && Some(u.id) != except && u.email.to_lowercase() == email)
    }

    fn outstanding(&self, user_id: i64) -> i64 {
        self.loans
            .values()
            .filter(|l| l.user_id == user_id && l.is_outstanding())
            .count() as i64
    }

    fn details(&self, loan: &Loan) -> AppResult<LoanDetails> {
        let user = self.users.get(&loan.user_id).cloned().ok_or_else(|| {
            AppError::Internal(format!("Loan {} references missing user {}", loan.id, loan.user_id))
        })?;
        let book = self.books.get(&loan.book_id).cloned().ok_or_else(|| {
            AppError::Internal(format!("Loan {} references missing book {}", loan.id, loan.book_id))
        })?;
        Ok(LoanDetails::new(loan.clone(), user, book))
    }

    fn details_where(&self, mut keep: impl FnMut(&Loan) -> bool) -> AppResult<Vec<LoanDetails>> {
        self.loans
            .values()
            .filter(|l| keep(*l))
            .map(|l| self.details(l))
            .collect()
    }
}

fn compare_books(a: &Book, b: &Book, field: BookSortField) -> Ordering {
    match field {
        BookSortField::Id => a.id.cmp(&b.id),
        BookSortField::Name => a.name.cmp(&b.name),
        BookSortField::Author => a.author.cmp(&b.author),
        BookSortField::Isbn => cmp_nullable(&a.isbn, &b.isbn),
        BookSortField::Publisher => cmp_nullable(&a.publisher, &b.publisher),
        BookSortField::PublishYear => cmp_nullable(&a.publish_year, &b.publish_year),
        BookSortField::Available => a.available.cmp(&b.available),
        BookSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        BookSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

fn compare_users(a: &User, b: &User, field: UserSortField) -> Ordering {
    match field {
        UserSortField::Id => a.id.cmp(&b.id),
        UserSortField::Name => a.name.cmp(&b.name),
        UserSortField::Email => a.email.cmp(&b.email),
        UserSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        UserSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

fn compare_loans(a: &Loan, b: &Loan, field: LoanSortField) -> Ordering {
    match field {
        LoanSortField::Id => a.id.cmp(&b.id),
        LoanSortField::LoanDate => a.loan_date.cmp(&b.loan_date),
        LoanSortField::DueDate => a.due_date.cmp(&b.due_date),
        LoanSortField::ReturnDate => cmp_nullable(&a.return_date, &b.return_date),
        LoanSortField::Status => a.status.as_str().cmp(b.status.as_str()),
        LoanSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        LoanSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

/// Storage held entirely in process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[async_trait]
impl BookRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Book>> {
        Ok(self.state.lock().await.book(id).cloned())
    }

    async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        let state = self.state.lock().await;
        Ok(state
            .books
            .values()
            .find(|b| b.active && b.isbn.as_deref() == Some(isbn))
            .cloned())
    }

    async fn search(&self, filter: &BookFilter, page: &PageRequest<BookSortField>) -> AppResult<Page<Book>> {
        let state = self.state.lock().await;
        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|b| b.active && filter.matches(b))
            .cloned()
            .collect();
        books.sort_by(|a, b| page.compare(a, b, compare_books).then(a.id.cmp(&b.id)));
        Ok(Page::from_sorted(books, page))
    }

    async fn count(&self) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state.books.values().filter(|b| b.active).count() as i64)
    }

    async fn count_by_author(&self, author: &str) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .books
            .values()
            .filter(|b| b.active && b.author == author)
            .count() as i64)
    }

    async fn scroll(&self, last_id: Option<i64>, size: u64) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        let upper = last_id.unwrap_or(i64::MAX);
        Ok(state
            .books
            .range(..upper)
            .rev()
            .map(|(_, b)| b)
            .filter(|b| b.active)
            .take(size as usize)
            .cloned()
            .collect())
    }

    async fn create(&self, book: &BookInput, now: DateTime<Utc>) -> AppResult<Book> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.isbn_taken(book.isbn.as_deref(), None) {
            return Err(AppError::Conflict(format!(
                "A book with ISBN {} already exists",
                book.isbn.as_deref().unwrap_or_default()
            )));
        }
        state.last_book_id += 1;
        let created = Book {
            id: state.last_book_id,
            name: book.name.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            description: book.description.clone(),
            publisher: book.publisher.clone(),
            publish_year: book.publish_year,
            available: true,
            active: true,
            created_at: now,
            updated_at: now,
        };
        state.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, book: &BookInput, now: DateTime<Utc>) -> AppResult<Book> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.book(id).is_none() {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        if state.isbn_taken(book.isbn.as_deref(), Some(id)) {
            return Err(AppError::Conflict(format!(
                "A book with ISBN {} already exists",
                book.isbn.as_deref().unwrap_or_default()
            )));
        }
        let existing = state
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;
        existing.name = book.name.clone();
        existing.author = book.author.clone();
        existing.isbn = book.isbn.clone();
        existing.description = book.description.clone();
        existing.publisher = book.publisher.clone();
        existing.publish_year = book.publish_year;
        existing.updated_at = now;
        Ok(existing.clone())
    }

    async fn delete(&self, id: i64, now: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let book = state
            .books
            .get_mut(&id)
            .filter(|b| b.active)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;
        if !book.available {
            return Err(AppError::Conflict(format!(
                "Book {} is on loan and cannot be deleted",
                id
            )));
        }
        book.active = false;
        book.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.state.lock().await.user(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.state.lock().await.user_by_email(email).cloned())
    }

    async fn search(&self, filter: &UserFilter, page: &PageRequest<UserSortField>) -> AppResult<Page<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| u.active && filter.matches(u))
            .cloned()
            .collect();
        users.sort_by(|a, b| page.compare(a, b, compare_users).then(a.id.cmp(&b.id)));
        Ok(Page::from_sorted(users, page))
    }

    async fn count(&self) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state.users.values().filter(|u| u.active).count() as i64)
    }

    async fn create(&self, user: &UserInput, now: DateTime<Utc>) -> AppResult<User> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.email_taken(&user.email, None) {
            return Err(AppError::Conflict(format!(
                "A user with email {} already exists",
                user.email
            )));
        }
        state.last_user_id += 1;
        let created = User {
            id: state.last_user_id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            address: user.address.clone(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, user: &UserInput, now: DateTime<Utc>) -> AppResult<User> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.user(id).is_none() {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        if state.email_taken(&user.email, Some(id)) {
            return Err(AppError::Conflict(format!(
                "A user with email {} already exists",
                user.email
            )));
        }
        let existing = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;
        existing.name = user.name.clone();
        existing.email = user.email.clone();
        existing.phone = user.phone.clone();
        existing.address = user.address.clone();
        existing.updated_at = now;
        Ok(existing.clone())
    }

    async fn delete(&self, id: i64, now: DateTime<Utc>) -> AppResult<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.user(id).is_none() {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        let outstanding = state.outstanding(id);
        if outstanding > 0 {
            return Err(AppError::Conflict(format!(
                "User {} has {} outstanding loan(s)",
                id, outstanding
            )));
        }
        if let Some(user) = state.users.get_mut(&id) {
            user.active = false;
            user.updated_at = now;
        }
        Ok(())
    }
}

#[async_trait]
impl LoanRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<LoanDetails>> {
        let state = self.state.lock().await;
        state.loans.get(&id).map(|l| state.details(l)).transpose()
    }

    async fn search(&self, filter: &LoanFilter, page: &PageRequest<LoanSortField>) -> AppResult<Page<LoanDetails>> {
        let state = self.state.lock().await;
        let mut loans: Vec<&Loan> = state.loans.values().filter(|l| filter.matches(l)).collect();
        loans.sort_by(|a, b| page.compare(*a, *b, compare_loans).then(a.id.cmp(&b.id)));
        Page::from_sorted(loans, page).try_map(|l| state.details(l))
    }

    async fn find_by_user(&self, user_id: i64) -> AppResult<Vec<LoanDetails>> {
        self.state.lock().await.details_where(|l| l.user_id == user_id)
    }

    async fn find_by_book(&self, book_id: i64) -> AppResult<Vec<LoanDetails>> {
        self.state.lock().await.details_where(|l| l.book_id == book_id)
    }

    async fn find_by_status(&self, status: LoanStatus) -> AppResult<Vec<LoanDetails>> {
        self.state.lock().await.details_where(|l| l.status == status)
    }

    async fn count_outstanding(&self, user_id: i64) -> AppResult<i64> {
        Ok(self.state.lock().await.outstanding(user_id))
    }

    async fn create(&self, loan: &NewLoan, policy: &LoanPolicy) -> AppResult<LoanDetails> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let user = state
            .user(loan.user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", loan.user_id)))?;
        let book = state
            .book(loan.book_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", loan.book_id)))?;

        policy.check_borrow(&book, state.outstanding(user.id))?;

        state.last_loan_id += 1;
        let record = Loan {
            id: state.last_loan_id,
            user_id: user.id,
            book_id: book.id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: None,
            status: LoanStatus::Active,
            created_at: loan.loan_date,
            updated_at: loan.loan_date,
        };
        state.loans.insert(record.id, record.clone());

        let book = match state.books.get_mut(&book.id) {
            Some(stored) => {
                stored.available = false;
                stored.updated_at = loan.loan_date;
                stored.clone()
            }
            None => book,
        };

        Ok(LoanDetails::new(record, user, book))
    }

    async fn return_loan(&self, id: i64, now: DateTime<Utc>) -> AppResult<LoanDetails> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let loan = state
            .loans
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;
        loan.mark_returned(now)?;
        let loan = loan.clone();

        if let Some(book) = state.books.get_mut(&loan.book_id) {
            book.available = true;
            book.updated_at = now;
        }

        state.details(&loan)
    }

    async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let changed = state
            .loans
            .values_mut()
            .map(|loan| loan.mark_overdue(now))
            .filter(|changed| *changed)
            .count();
        Ok(changed as u64)
    }
}

#[async_trait]
impl HealthCheckRepository for MemoryStore {
    async fn check(&self) -> bool {
        true
    }
}
