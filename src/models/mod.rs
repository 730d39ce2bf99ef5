//! Data models for Libris

pub mod book;
pub mod loan;
pub mod page;
pub mod user;

use validator::ValidationError;

// Re-export commonly used types
pub use book::{Book, BookInput};
pub use loan::{Loan, LoanDetails, LoanStatus, OverdueLoan};
pub use page::{Page, PageRequest, Sort};
pub use user::{User, UserInput};

/// Validator: rejects empty or whitespace-only strings
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Trim an optional string, mapping blank to None
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Case-insensitive substring match
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
