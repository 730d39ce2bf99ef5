//! Book model and related types

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::{not_blank, page::SortField};

/// Book catalog record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i64,
    pub name: String,
    pub author: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub publish_year: Option<i32>,
    /// False while an active or overdue loan references this book
    pub available: bool,
    /// Soft-delete flag
    #[serde(skip)]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update book request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookInput {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Book name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Author is required"))]
    pub author: String,
    #[validate(custom(function = "validate_isbn"))]
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    #[validate(range(min = 1000, message = "Invalid publish year"))]
    pub publish_year: Option<i32>,
}

impl BookInput {
    /// Trimmed copy with blank optional fields dropped
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            author: self.author.trim().to_string(),
            isbn: super::non_blank(self.isbn),
            description: super::non_blank(self.description),
            publisher: super::non_blank(self.publisher),
            publish_year: self.publish_year,
        }
    }
}

/// ISBN-10 or ISBN-13, hyphens allowed
fn validate_isbn(isbn: &str) -> Result<(), ValidationError> {
    let trimmed = isbn.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    let digits = trimmed.chars().filter(|c| *c != '-').count();
    if digits == 10 || digits == 13 {
        Ok(())
    } else {
        let mut error = ValidationError::new("isbn");
        error.message = Some("ISBN must have 10 or 13 characters".into());
        Err(error)
    }
}

/// Book list query parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Substring of name, author or description
    pub keyword: Option<String>,
    /// Substring of author
    pub author: Option<String>,
    /// Zero-based page index
    pub page: Option<u64>,
    pub size: Option<u64>,
    /// `field[,asc|desc]`; repeat for secondary keys
    #[serde(default)]
    pub sort: Vec<String>,
}

/// Search preview parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PreviewQuery {
    pub keyword: Option<String>,
    /// Default 5, at most 10
    pub limit: Option<i64>,
}

/// Latest additions parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LatestQuery {
    /// Default 10, clamped to 1..=50
    pub limit: Option<i64>,
}

/// Cursor parameters for endless scrolling, newest id first
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase", parameter_in = Query)]
pub struct ScrollQuery {
    /// Last id of the previous batch; omitted for the first batch
    pub last_id: Option<i64>,
    /// Default 20, at most 100
    pub size: Option<i64>,
}

/// Repository-level book filter
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub keyword: Option<String>,
    pub author: Option<String>,
}

impl From<&BookQuery> for BookFilter {
    fn from(query: &BookQuery) -> Self {
        Self {
            keyword: super::non_blank(query.keyword.clone()),
            author: super::non_blank(query.author.clone()),
        }
    }
}

impl BookFilter {
    pub fn matches(&self, book: &Book) -> bool {
        let keyword_ok = self.keyword.as_deref().map_or(true, |kw| {
            super::contains_ci(&book.name, kw)
                || super::contains_ci(&book.author, kw)
                || book
                    .description
                    .as_deref()
                    .map_or(false, |d| super::contains_ci(d, kw))
        });
        let author_ok = self
            .author
            .as_deref()
            .map_or(true, |a| super::contains_ci(&book.author, a));
        keyword_ok && author_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSortField {
    Id,
    Name,
    Author,
    Isbn,
    Publisher,
    PublishYear,
    Available,
    CreatedAt,
    UpdatedAt,
}

impl FromStr for BookSortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "author" => Ok(Self::Author),
            "isbn" => Ok(Self::Isbn),
            "publisher" => Ok(Self::Publisher),
            "publishYear" | "publish_year" => Ok(Self::PublishYear),
            "available" => Ok(Self::Available),
            "createdAt" | "created_at" => Ok(Self::CreatedAt),
            "updatedAt" | "updated_at" => Ok(Self::UpdatedAt),
            other => Err(format!("Cannot sort books by '{}'", other)),
        }
    }
}

impl SortField for BookSortField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Author => "author",
            Self::Isbn => "isbn",
            Self::Publisher => "publisher",
            Self::PublishYear => "publish_year",
            Self::Available => "available",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> BookInput {
        BookInput {
            name: "Clean Code".to_string(),
            author: "Robert C. Martin".to_string(),
            isbn: Some("978-0-13-235088-4".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_isbn_10_and_13() {
        assert!(input().validate().is_ok());
        let mut book = input();
        book.isbn = Some("0-13-235088-2".to_string());
        assert!(book.validate().is_ok());
    }

    #[test]
    fn rejects_malformed_isbn() {
        let mut book = input();
        book.isbn = Some("12-34".to_string());
        assert!(book.validate().is_err());
    }

    #[test]
    fn requires_name_and_author() {
        let mut book = input();
        book.name = "   ".to_string();
        let errors = book.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));

        let mut book = input();
        book.author = String::new();
        let errors = book.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("author"));
    }

    #[test]
    fn keyword_filter_searches_description() {
        let now = Utc::now();
        let book = Book {
            id: 1,
            name: "Refactoring".to_string(),
            author: "Martin Fowler".to_string(),
            isbn: None,
            description: Some("Improving the design of existing code".to_string()),
            publisher: None,
            publish_year: None,
            available: true,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let filter = BookFilter { keyword: Some("DESIGN".to_string()), author: None };
        assert!(filter.matches(&book));
        let filter = BookFilter { keyword: Some("design".to_string()), author: Some("beck".to_string()) };
        assert!(!filter.matches(&book));
    }
}
