use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, QueryBuilder};

use super::like_pattern;
use crate::{
    error::{AppError, AppResult},
    models::{
        page::{Page, PageRequest},
        user::{User, UserFilter, UserInput, UserSortField},
    },
    repository::UserRepository,
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(keyword) = &filter.keyword {
        let pattern = like_pattern(keyword);
        builder
            .push(" AND (u.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl UserRepository for UsersRepository {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND active")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(email) = LOWER($1) AND active",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn search(
        &self,
        filter: &UserFilter,
        page: &PageRequest<UserSortField>,
    ) -> AppResult<Page<User>> {
        let offset = page.sql_offset()?;
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users u WHERE u.active");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT u.* FROM users u WHERE u.active");
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY ")
            .push(page.order_by("u"))
            .push(" LIMIT ")
            .push_bind(page.size as i64)
            .push(" OFFSET ")
            .push_bind(offset);
        let users = select.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok(Page::new(users, total.max(0) as u64, page))
    }

    async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE active")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn create(&self, user: &UserInput, now: DateTime<Utc>) -> AppResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, phone, address, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, $5, $5)
            RETURNING *
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update(&self, id: i64, user: &UserInput, now: DateTime<Utc>) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $1, email = $2, phone = $3, address = $4, updated_at = $5
            WHERE id = $6 AND active
            RETURNING *
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn delete(&self, id: i64, now: DateTime<Utc>) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Locking the user row serializes against concurrent borrows
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 AND active FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;

        let outstanding: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND status IN ('ACTIVE', 'OVERDUE')",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if outstanding > 0 {
            return Err(AppError::Conflict(format!(
                "User {} has {} outstanding loan(s) and cannot be deleted",
                id, outstanding
            )));
        }

        sqlx::query("UPDATE users SET active = FALSE, updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
