//! Pagination, sorting and the page envelope returned by listing endpoints

use std::{cmp::Ordering, fmt::Debug, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{book::Book, loan::LoanDetails, user::User};
use crate::error::{AppError, AppResult};

/// Upper bound for `size`
pub const MAX_PAGE_SIZE: u64 = 1000;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    /// Orient an ascending comparison result
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(format!("Invalid sort direction: {}", other)),
        }
    }
}

/// A whitelisted sortable attribute of an entity
pub trait SortField: Copy + Debug + FromStr<Err = String> + Send + Sync {
    /// Database column backing this field
    fn column(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<F> {
    pub field: F,
    pub direction: Direction,
}

impl<F: SortField> Sort<F> {
    pub fn asc(field: F) -> Self {
        Self { field, direction: Direction::Asc }
    }

    pub fn desc(field: F) -> Self {
        Self { field, direction: Direction::Desc }
    }

    /// Parse `field` or `field,asc|desc`
    pub fn parse(raw: &str) -> AppResult<Self> {
        let mut parts = raw.splitn(2, ',');
        let field = parts
            .next()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| AppError::Validation("Sort field is empty".to_string()))?
            .parse::<F>()
            .map_err(AppError::Validation)?;
        let direction = match parts.next() {
            Some(dir) => dir.parse().map_err(AppError::Validation)?,
            None => Direction::Asc,
        };
        Ok(Self { field, direction })
    }

    fn clause(&self, alias: &str) -> String {
        format!("{}.{} {}", alias, self.field.column(), self.direction.as_sql())
    }
}

/// Validated page request: zero-based page index, page size and ordering
///
/// Sort keys apply in order; id breaks the remaining ties.
#[derive(Debug, Clone)]
pub struct PageRequest<F> {
    pub page: u64,
    pub size: u64,
    pub sort: Vec<Sort<F>>,
}

impl<F: SortField> PageRequest<F> {
    pub fn new(page: u64, size: u64, sort: Vec<Sort<F>>) -> Self {
        Self {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
            sort,
        }
    }

    /// Build from raw query parameters, falling back to the given defaults.
    /// Each `sort` value is one `field[,direction]` key.
    pub fn from_query(
        page: Option<u64>,
        size: Option<u64>,
        sort: &[String],
        default_size: u64,
        default_sort: Sort<F>,
    ) -> AppResult<Self> {
        let mut keys = sort
            .iter()
            .map(|raw| raw.trim())
            .filter(|raw| !raw.is_empty())
            .map(Sort::parse)
            .collect::<AppResult<Vec<_>>>()?;
        if keys.is_empty() {
            keys.push(default_sort);
        }
        let request = Self::new(page.unwrap_or(0), size.unwrap_or(default_size), keys);
        request.sql_offset()?;
        Ok(request)
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }

    /// Offset as a SQL bind value; Validation when it does not fit a BIGINT
    pub fn sql_offset(&self) -> AppResult<i64> {
        self.page
            .checked_mul(self.size)
            .and_then(|offset| i64::try_from(offset).ok())
            .ok_or_else(|| AppError::Validation(format!("Page index {} is too large", self.page)))
    }

    /// ORDER BY body with id as the final tie-breaker, columns prefixed by `alias`
    pub fn order_by(&self, alias: &str) -> String {
        let mut clauses: Vec<String> = self.sort.iter().map(|s| s.clause(alias)).collect();
        clauses.push(format!("{}.id ASC", alias));
        clauses.join(", ")
    }

    /// Compare two records key by key; `by` gives the ascending order of one field
    pub fn compare<T>(&self, a: &T, b: &T, by: impl Fn(&T, &T, F) -> Ordering) -> Ordering {
        self.sort.iter().fold(Ordering::Equal, |ordering, sort| {
            ordering.then_with(|| sort.direction.apply(by(a, b, sort.field)))
        })
    }
}

/// Paginated response envelope
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[aliases(BookPage = Page<Book>, UserPage = Page<User>, LoanPage = Page<LoanDetails>)]
pub struct Page<T> {
    /// Items of the requested page
    pub content: Vec<T>,
    /// Number of matching items across all pages
    pub total_elements: u64,
    pub total_pages: u64,
    pub first: bool,
    pub last: bool,
    /// Requested page size
    pub size: u64,
    /// Zero-based page index
    pub number: u64,
    pub number_of_elements: u64,
    pub empty: bool,
}

impl<T> Page<T> {
    pub fn new<F>(content: Vec<T>, total_elements: u64, request: &PageRequest<F>) -> Self {
        let size = request.size.max(1);
        let total_pages = total_elements.div_ceil(size);
        let number_of_elements = content.len() as u64;
        Self {
            empty: content.is_empty(),
            content,
            total_elements,
            total_pages,
            first: request.page == 0,
            last: request.page.saturating_add(1) >= total_pages,
            size,
            number: request.page,
            number_of_elements,
        }
    }

    /// Slice an already ordered collection
    pub fn from_sorted<F: SortField>(items: Vec<T>, request: &PageRequest<F>) -> Self {
        let total = items.len() as u64;
        let content = items
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.size as usize)
            .collect();
        Self::new(content, total, request)
    }

    pub fn try_map<U, E>(mut self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        let content = std::mem::take(&mut self.content).into_iter().map(f).collect::<Result<Vec<U>, E>>()?;
        Ok(self.with_content(content))
    }

    fn with_content<U>(self, content: Vec<U>) -> Page<U> {
        Page {
            content,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            first: self.first,
            last: self.last,
            size: self.size,
            number: self.number,
            number_of_elements: self.number_of_elements,
            empty: self.empty,
        }
    }
}

/// Order two optional values the way PostgreSQL does (NULLs last when ascending)
pub fn cmp_nullable<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}
