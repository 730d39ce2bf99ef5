//! PostgreSQL storage backend

mod books;
mod loans;
mod users;

pub use books::BooksRepository;
pub use loans::LoansRepository;
pub use users::UsersRepository;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::HealthCheckRepository;

/// Escape LIKE metacharacters and wrap the term for a substring match
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[derive(Clone)]
pub struct PoolHealth {
    pool: Pool<Postgres>,
}

impl PoolHealth {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthCheckRepository for PoolHealth {
    async fn check(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn escapes_like_metacharacters() {
        assert_eq!(like_pattern("java"), "%java%");
        assert_eq!(like_pattern("100%_sure"), "%100\\%\\_sure%");
    }
}
