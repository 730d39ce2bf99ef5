use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, QueryBuilder};

use super::like_pattern;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookFilter, BookInput, BookSortField},
        page::{Page, PageRequest},
    },
    repository::BookRepository,
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &BookFilter) {
    if let Some(keyword) = &filter.keyword {
        let pattern = like_pattern(keyword);
        builder
            .push(" AND (b.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR b.author ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR b.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(author) = &filter.author {
        builder.push(" AND b.author ILIKE ").push_bind(like_pattern(author));
    }
}

#[async_trait]
impl BookRepository for BooksRepository {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 AND active")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE isbn = $1 AND active")
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn search(
        &self,
        filter: &BookFilter,
        page: &PageRequest<BookSortField>,
    ) -> AppResult<Page<Book>> {
        let offset = page.sql_offset()?;
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books b WHERE b.active");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT b.* FROM books b WHERE b.active");
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY ")
            .push(page.order_by("b"))
            .push(" LIMIT ")
            .push_bind(page.size as i64)
            .push(" OFFSET ")
            .push_bind(offset);
        let books = select.build_query_as::<Book>().fetch_all(&self.pool).await?;

        Ok(Page::new(books, total.max(0) as u64, page))
    }

    async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE active")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_by_author(&self, author: &str) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE active AND author = $1")
                .bind(author)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn scroll(&self, last_id: Option<i64>, size: u64) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE active AND ($1::BIGINT IS NULL OR id < $1)
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(last_id)
        .bind(i64::try_from(size).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn create(&self, book: &BookInput, now: DateTime<Utc>) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (name, author, isbn, description, publisher, publish_year,
                               available, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, TRUE, $7, $7)
            RETURNING *
            "#,
        )
        .bind(&book.name)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.description)
        .bind(&book.publisher)
        .bind(book.publish_year)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update(&self, id: i64, book: &BookInput, now: DateTime<Utc>) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET name = $1, author = $2, isbn = $3, description = $4,
                publisher = $5, publish_year = $6, updated_at = $7
            WHERE id = $8 AND active
            RETURNING *
            "#,
        )
        .bind(&book.name)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.description)
        .bind(&book.publisher)
        .bind(book.publish_year)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn delete(&self, id: i64, now: DateTime<Utc>) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let available: bool =
            sqlx::query_scalar("SELECT available FROM books WHERE id = $1 AND active FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;
        if !available {
            return Err(AppError::Conflict(format!(
                "Book {} is on loan and cannot be deleted",
                id
            )));
        }

        sqlx::query("UPDATE books SET active = FALSE, updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
