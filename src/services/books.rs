//! Book catalog service

use std::sync::Arc;

use chrono::Datelike;
use validator::Validate;

use super::clock::Clock;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{
            Book, BookFilter, BookInput, BookQuery, BookSortField, LatestQuery, PreviewQuery,
            ScrollQuery,
        },
        non_blank,
        page::{Page, PageRequest, Sort},
    },
    repository::Repository,
};

/// Books are listed in one large page unless the client asks otherwise
pub const DEFAULT_PAGE_SIZE: u64 = 1000;

const PREVIEW_LIMIT: i64 = 5;
const MAX_PREVIEW_LIMIT: i64 = 10;
const LATEST_LIMIT: i64 = 10;
const MAX_LATEST_LIMIT: i64 = 50;
const SCROLL_SIZE: i64 = 20;
const MAX_SCROLL_SIZE: i64 = 100;

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl BooksService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Search books with pagination
    pub async fn list(&self, query: &BookQuery) -> AppResult<Page<Book>> {
        let request = PageRequest::from_query(
            query.page,
            query.size,
            &query.sort,
            DEFAULT_PAGE_SIZE,
            Sort::asc(BookSortField::CreatedAt),
        )?;
        self.repository
            .books
            .search(&BookFilter::from(query), &request)
            .await
    }

    pub async fn get(&self, id: i64) -> AppResult<Book> {
        self.repository
            .books
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    pub async fn get_by_isbn(&self, isbn: &str) -> AppResult<Book> {
        self.repository
            .books
            .find_by_isbn(isbn.trim())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with ISBN {} not found", isbn)))
    }

    pub async fn count(&self) -> AppResult<i64> {
        self.repository.books.count().await
    }

    pub async fn exists(&self, id: i64) -> AppResult<bool> {
        if id <= 0 {
            return Ok(false);
        }
        Ok(self.repository.books.find_by_id(id).await?.is_some())
    }

    /// Books by exactly this author
    pub async fn count_by_author(&self, author: &str) -> AppResult<i64> {
        self.repository.books.count_by_author(author).await
    }

    pub async fn author_has_books(&self, author: &str) -> AppResult<bool> {
        if author.trim().is_empty() {
            return Ok(false);
        }
        Ok(self.count_by_author(author).await? > 0)
    }

    /// First few keyword matches, for type-ahead search
    pub async fn preview(&self, query: &PreviewQuery) -> AppResult<Page<Book>> {
        let limit = query
            .limit
            .unwrap_or(PREVIEW_LIMIT)
            .clamp(1, MAX_PREVIEW_LIMIT) as u64;
        let request = PageRequest::new(0, limit, vec![Sort::asc(BookSortField::CreatedAt)]);
        let filter = BookFilter {
            keyword: non_blank(query.keyword.clone()),
            author: None,
        };
        if filter.keyword.is_none() {
            return Ok(Page::new(Vec::new(), 0, &request));
        }
        self.repository.books.search(&filter, &request).await
    }

    /// Most recently added books
    pub async fn latest(&self, query: &LatestQuery) -> AppResult<Page<Book>> {
        let limit = query
            .limit
            .unwrap_or(LATEST_LIMIT)
            .clamp(1, MAX_LATEST_LIMIT) as u64;
        let request = PageRequest::new(0, limit, vec![Sort::desc(BookSortField::CreatedAt)]);
        self.repository
            .books
            .search(&BookFilter::default(), &request)
            .await
    }

    /// Next batch after `lastId`, highest id first
    pub async fn scroll(&self, query: &ScrollQuery) -> AppResult<Vec<Book>> {
        let size = match query.size {
            Some(size) if size > 0 => size.min(MAX_SCROLL_SIZE),
            _ => SCROLL_SIZE,
        };
        self.repository.books.scroll(query.last_id, size as u64).await
    }

    /// Add a book to the catalog; new books are available
    pub async fn create(&self, input: BookInput) -> AppResult<Book> {
        let input = self.validate(input)?;
        self.ensure_isbn_free(input.isbn.as_deref(), None).await?;

        let book = self.repository.books.create(&input, self.clock.now()).await?;
        tracing::info!(book_id = book.id, name = %book.name, "Book created");
        Ok(book)
    }

    pub async fn update(&self, id: i64, input: BookInput) -> AppResult<Book> {
        let input = self.validate(input)?;
        self.get(id).await?;
        self.ensure_isbn_free(input.isbn.as_deref(), Some(id)).await?;

        let book = self.repository.books.update(id, &input, self.clock.now()).await?;
        tracing::info!(book_id = id, "Book updated");
        Ok(book)
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.repository.books.delete(id, self.clock.now()).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }

    fn validate(&self, input: BookInput) -> AppResult<BookInput> {
        let input = input.normalized();
        input.validate()?;
        if let Some(year) = input.publish_year {
            if year > self.clock.now().year() {
                return Err(AppError::Validation("Invalid publish year".to_string()));
            }
        }
        Ok(input)
    }

    async fn ensure_isbn_free(&self, isbn: Option<&str>, own_id: Option<i64>) -> AppResult<()> {
        let Some(isbn) = isbn else {
            return Ok(());
        };
        match self.repository.books.find_by_isbn(isbn).await? {
            Some(existing) if Some(existing.id) != own_id => Err(AppError::Conflict(format!(
                "A book with ISBN {} already exists",
                isbn
            ))),
            _ => Ok(()),
        }
    }
}
