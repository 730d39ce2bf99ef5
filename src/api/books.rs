//! Book catalog endpoints

use axum::{extract::State, http::StatusCode, Json};

use super::{exists_status, ApiJson, ApiPath, ApiQuery};
use crate::{
    error::{AppResult, ErrorResponse},
    models::{
        book::{Book, BookInput, BookQuery, LatestQuery, PreviewQuery, ScrollQuery},
        page::{BookPage, Page},
    },
    AppState,
};

/// List books with keyword/author filters and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Page of books", body = BookPage),
        (status = 400, description = "Invalid paging or sort parameters", body = ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BookQuery>,
) -> AppResult<Json<Page<Book>>> {
    let books = state.services.books.list(&query).await?;
    Ok(Json(books))
}

/// Get a book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.get(id).await?;
    Ok(Json(book))
}

/// Get a book by ISBN
#[utoipa::path(
    get,
    path = "/books/isbn/{isbn}",
    tag = "books",
    params(
        ("isbn" = String, Path, description = "ISBN as stored")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn get_book_by_isbn(
    State(state): State<AppState>,
    ApiPath(isbn): ApiPath<String>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.get_by_isbn(&isbn).await?;
    Ok(Json(book))
}

/// Number of books in the catalog
#[utoipa::path(
    get,
    path = "/books/count",
    tag = "books",
    responses(
        (status = 200, description = "Book count", body = i64)
    )
)]
pub async fn count_books(State(state): State<AppState>) -> AppResult<Json<i64>> {
    let count = state.services.books.count().await?;
    Ok(Json(count))
}

/// Number of books by exactly this author
#[utoipa::path(
    get,
    path = "/books/count/author/{author}",
    tag = "books",
    params(
        ("author" = String, Path, description = "Author name, matched exactly")
    ),
    responses(
        (status = 200, description = "Book count", body = i64)
    )
)]
pub async fn count_books_by_author(
    State(state): State<AppState>,
    ApiPath(author): ApiPath<String>,
) -> AppResult<Json<i64>> {
    let count = state.services.books.count_by_author(&author).await?;
    Ok(Json(count))
}

/// 200 when the book exists, 404 otherwise
#[utoipa::path(
    get,
    path = "/books/{id}/exists",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book exists"),
        (status = 404, description = "No such book")
    )
)]
pub async fn book_exists(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    let exists = state.services.books.exists(id).await?;
    Ok(exists_status(exists))
}

/// 200 when the author has at least one book, 404 otherwise
#[utoipa::path(
    get,
    path = "/books/author/{author}/exists",
    tag = "books",
    params(
        ("author" = String, Path, description = "Author name, matched exactly")
    ),
    responses(
        (status = 200, description = "Author has books"),
        (status = 404, description = "No books by this author")
    )
)]
pub async fn author_has_books(
    State(state): State<AppState>,
    ApiPath(author): ApiPath<String>,
) -> AppResult<StatusCode> {
    let exists = state.services.books.author_has_books(&author).await?;
    Ok(exists_status(exists))
}

/// First keyword matches for type-ahead search
#[utoipa::path(
    get,
    path = "/books/search/preview",
    tag = "books",
    params(PreviewQuery),
    responses(
        (status = 200, description = "Page of at most 10 books", body = BookPage),
        (status = 400, description = "Invalid parameters", body = ErrorResponse)
    )
)]
pub async fn search_preview(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PreviewQuery>,
) -> AppResult<Json<Page<Book>>> {
    let books = state.services.books.preview(&query).await?;
    Ok(Json(books))
}

/// Most recently added books
#[utoipa::path(
    get,
    path = "/books/latest",
    tag = "books",
    params(LatestQuery),
    responses(
        (status = 200, description = "Page of the newest books", body = BookPage),
        (status = 400, description = "Invalid parameters", body = ErrorResponse)
    )
)]
pub async fn latest_books(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LatestQuery>,
) -> AppResult<Json<Page<Book>>> {
    let books = state.services.books.latest(&query).await?;
    Ok(Json(books))
}

/// Cursor-based batch for endless scrolling
#[utoipa::path(
    get,
    path = "/books/infinite",
    tag = "books",
    params(ScrollQuery),
    responses(
        (status = 200, description = "Books with id below lastId, highest id first", body = [Book]),
        (status = 400, description = "Invalid parameters", body = ErrorResponse)
    )
)]
pub async fn scroll_books(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ScrollQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.books.scroll(&query).await?;
    Ok(Json(books))
}

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = BookInput,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "ISBN already exists", body = ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    ApiJson(book): ApiJson<BookInput>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let created = state.services.books.create(book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a book's descriptive fields
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    request_body = BookInput,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Book not found", body = ErrorResponse),
        (status = 409, description = "ISBN already exists", body = ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(book): ApiJson<BookInput>,
) -> AppResult<Json<Book>> {
    let updated = state.services.books.update(id, book).await?;
    Ok(Json(updated))
}

/// Remove a book from the catalog
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = ErrorResponse),
        (status = 409, description = "Book is on loan", body = ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    state.services.books.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
