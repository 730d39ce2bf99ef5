use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        loan::{Loan, LoanDetails, LoanFilter, LoanPolicy, LoanSortField, LoanStatus, NewLoan},
        page::{Page, PageRequest},
        user::User,
    },
    repository::LoanRepository,
};

/// Loan joined with its borrower and book
const LOAN_DETAILS_SELECT: &str = r#"
    SELECT l.id, l.user_id, l.book_id, l.loan_date, l.due_date, l.return_date, l.status,
           l.created_at, l.updated_at,
           u.name AS user_name, u.email AS user_email, u.phone AS user_phone,
           u.address AS user_address, u.active AS user_active,
           u.created_at AS user_created_at, u.updated_at AS user_updated_at,
           b.name AS book_name, b.author AS book_author, b.isbn AS book_isbn,
           b.description AS book_description, b.publisher AS book_publisher,
           b.publish_year AS book_publish_year, b.available AS book_available,
           b.active AS book_active,
           b.created_at AS book_created_at, b.updated_at AS book_updated_at
    FROM loans l
    JOIN users u ON u.id = l.user_id
    JOIN books b ON b.id = l.book_id
"#;

const OUTSTANDING_COUNT: &str =
    "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND status IN ('ACTIVE', 'OVERDUE')";

#[derive(Debug, FromRow)]
struct LoanDetailsRow {
    id: i64,
    user_id: i64,
    book_id: i64,
    loan_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    return_date: Option<DateTime<Utc>>,
    status: LoanStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    user_name: String,
    user_email: String,
    user_phone: Option<String>,
    user_address: Option<String>,
    user_active: bool,
    user_created_at: DateTime<Utc>,
    user_updated_at: DateTime<Utc>,
    book_name: String,
    book_author: String,
    book_isbn: Option<String>,
    book_description: Option<String>,
    book_publisher: Option<String>,
    book_publish_year: Option<i32>,
    book_available: bool,
    book_active: bool,
    book_created_at: DateTime<Utc>,
    book_updated_at: DateTime<Utc>,
}

impl From<LoanDetailsRow> for LoanDetails {
    fn from(row: LoanDetailsRow) -> Self {
        LoanDetails {
            id: row.id,
            user: User {
                id: row.user_id,
                name: row.user_name,
                email: row.user_email,
                phone: row.user_phone,
                address: row.user_address,
                active: row.user_active,
                created_at: row.user_created_at,
                updated_at: row.user_updated_at,
            },
            book: Book {
                id: row.book_id,
                name: row.book_name,
                author: row.book_author,
                isbn: row.book_isbn,
                description: row.book_description,
                publisher: row.book_publisher,
                publish_year: row.book_publish_year,
                available: row.book_available,
                active: row.book_active,
                created_at: row.book_created_at,
                updated_at: row.book_updated_at,
            },
            loan_date: row.loan_date,
            due_date: row.due_date,
            return_date: row.return_date,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_details(&self, clause: &str, id: i64) -> AppResult<Vec<LoanDetails>> {
        let rows = sqlx::query_as::<_, LoanDetailsRow>(&format!("{} {}", LOAN_DETAILS_SELECT, clause))
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(LoanDetails::from).collect())
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &LoanFilter) {
    if let Some(status) = filter.status {
        builder.push(" AND l.status = ").push_bind(status);
    }
}

#[async_trait]
impl LoanRepository for LoansRepository {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<LoanDetails>> {
        let row = sqlx::query_as::<_, LoanDetailsRow>(&format!("{} WHERE l.id = $1", LOAN_DETAILS_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(LoanDetails::from))
    }

    async fn search(
        &self,
        filter: &LoanFilter,
        page: &PageRequest<LoanSortField>,
    ) -> AppResult<Page<LoanDetails>> {
        let offset = page.sql_offset()?;
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM loans l WHERE TRUE");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(LOAN_DETAILS_SELECT);
        select.push(" WHERE TRUE");
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY ")
            .push(page.order_by("l"))
            .push(" LIMIT ")
            .push_bind(page.size as i64)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = select
            .build_query_as::<LoanDetailsRow>()
            .fetch_all(&self.pool)
            .await?;

        let content = rows.into_iter().map(LoanDetails::from).collect();
        Ok(Page::new(content, total.max(0) as u64, page))
    }

    async fn find_by_user(&self, user_id: i64) -> AppResult<Vec<LoanDetails>> {
        self.fetch_details("WHERE l.user_id = $1 ORDER BY l.id ASC", user_id)
            .await
    }

    async fn find_by_book(&self, book_id: i64) -> AppResult<Vec<LoanDetails>> {
        self.fetch_details("WHERE l.book_id = $1 ORDER BY l.id ASC", book_id)
            .await
    }

    async fn find_by_status(&self, status: LoanStatus) -> AppResult<Vec<LoanDetails>> {
        let rows = sqlx::query_as::<_, LoanDetailsRow>(&format!(
            "{} WHERE l.status = $1 ORDER BY l.id ASC",
            LOAN_DETAILS_SELECT
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LoanDetails::from).collect())
    }

    async fn count_outstanding(&self, user_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(OUTSTANDING_COUNT)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn create(&self, loan: &NewLoan, policy: &LoanPolicy) -> AppResult<LoanDetails> {
        let mut tx = self.pool.begin().await?;

        // Lock order: user, then book
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND active FOR UPDATE")
            .bind(loan.user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", loan.user_id)))?;

        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 AND active FOR UPDATE")
            .bind(loan.book_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", loan.book_id)))?;

        let outstanding: i64 = sqlx::query_scalar(OUTSTANDING_COUNT)
            .bind(loan.user_id)
            .fetch_one(&mut *tx)
            .await?;
        policy.check_borrow(&book, outstanding)?;

        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (user_id, book_id, loan_date, due_date, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $3, $3)
            RETURNING *
            "#,
        )
        .bind(loan.user_id)
        .bind(loan.book_id)
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .bind(LoanStatus::Active)
        .fetch_one(&mut *tx)
        .await?;

        let book = sqlx::query_as::<_, Book>(
            "UPDATE books SET available = FALSE, updated_at = $1 WHERE id = $2 RETURNING *",
        )
        .bind(loan.loan_date)
        .bind(loan.book_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(LoanDetails::new(created, user, book))
    }

    async fn return_loan(&self, id: i64, now: DateTime<Utc>) -> AppResult<LoanDetails> {
        let mut tx = self.pool.begin().await?;

        let mut loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;
        loan.mark_returned(now)?;

        sqlx::query("UPDATE loans SET status = $1, return_date = $2, updated_at = $2 WHERE id = $3")
            .bind(loan.status)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE books SET available = TRUE, updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(loan.book_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, LoanDetailsRow>(&format!("{} WHERE l.id = $1", LOAN_DETAILS_SELECT))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET status = 'OVERDUE', updated_at = $1
            WHERE status = 'ACTIVE'
              AND (due_date AT TIME ZONE 'UTC')::date < ($1 AT TIME ZONE 'UTC')::date
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
