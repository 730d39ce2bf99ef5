//! Borrower directory service

use std::sync::Arc;

use validator::Validate;

use super::clock::Clock;
use crate::{
    error::{AppError, AppResult},
    models::{
        page::{Page, PageRequest, Sort},
        user::{User, UserFilter, UserInput, UserQuery, UserSortField},
    },
    repository::Repository,
};

pub const DEFAULT_PAGE_SIZE: u64 = 20;

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl UsersService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn list(&self, query: &UserQuery) -> AppResult<Page<User>> {
        let request = PageRequest::from_query(
            query.page,
            query.size,
            &query.sort,
            DEFAULT_PAGE_SIZE,
            Sort::asc(UserSortField::CreatedAt),
        )?;
        self.repository
            .users
            .search(&UserFilter::from(query), &request)
            .await
    }

    pub async fn get(&self, id: i64) -> AppResult<User> {
        self.repository
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn get_by_email(&self, email: &str) -> AppResult<User> {
        self.repository
            .users
            .find_by_email(email.trim())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with email {} not found", email)))
    }

    pub async fn count(&self) -> AppResult<i64> {
        self.repository.users.count().await
    }

    pub async fn exists(&self, id: i64) -> AppResult<bool> {
        if id <= 0 {
            return Ok(false);
        }
        Ok(self.repository.users.find_by_id(id).await?.is_some())
    }

    /// Whether an active user already holds this email, ignoring case
    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(false);
        }
        Ok(self.repository.users.find_by_email(email).await?.is_some())
    }

    pub async fn create(&self, input: UserInput) -> AppResult<User> {
        let input = input.normalized();
        input.validate()?;
        self.ensure_email_free(&input.email, None).await?;

        let user = self.repository.users.create(&input, self.clock.now()).await?;
        tracing::info!(user_id = user.id, "User created");
        Ok(user)
    }

    pub async fn update(&self, id: i64, input: UserInput) -> AppResult<User> {
        let input = input.normalized();
        input.validate()?;
        self.get(id).await?;
        self.ensure_email_free(&input.email, Some(id)).await?;

        let user = self.repository.users.update(id, &input, self.clock.now()).await?;
        tracing::info!(user_id = id, "User updated");
        Ok(user)
    }

    /// Soft delete; refused while the user still holds books
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.repository.users.delete(id, self.clock.now()).await?;
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    async fn ensure_email_free(&self, email: &str, own_id: Option<i64>) -> AppResult<()> {
        match self.repository.users.find_by_email(email).await? {
            Some(existing) if Some(existing.id) != own_id => Err(AppError::Conflict(format!(
                "A user with email {} already exists",
                email
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::SystemClock;

    fn service() -> UsersService {
        UsersService::new(Repository::in_memory(), Arc::new(SystemClock))
    }

    fn input(name: &str, email: &str) -> UserInput {
        UserInput {
            name: name.to_string(),
            email: email.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn email_is_unique_ignoring_case() {
        let users = service();
        users.create(input("Ada", "ada@example.com")).await.unwrap();
        let duplicate = users.create(input("Ada L.", "ADA@example.com")).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        let found = users.get_by_email("Ada@Example.com").await.unwrap();
        assert_eq!(found.name, "Ada");
    }

    #[tokio::test]
    async fn existence_checks() {
        let users = service();
        let user = users.create(input("Katherine", "kj@nasa.gov")).await.unwrap();

        assert!(users.exists(user.id).await.unwrap());
        assert!(!users.exists(-1).await.unwrap());
        assert!(users.email_exists(" KJ@nasa.gov ").await.unwrap());
        assert!(!users.email_exists("dorothy@nasa.gov").await.unwrap());

        users.delete(user.id).await.unwrap();
        assert!(!users.exists(user.id).await.unwrap());
        assert!(!users.email_exists("kj@nasa.gov").await.unwrap());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let users = service();
        let result = users.create(input("", "nobody")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(users.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn keyword_search_matches_name_or_email() {
        let users = service();
        users.create(input("Grace Hopper", "grace@navy.mil")).await.unwrap();
        users.create(input("Alan Turing", "alan@bletchley.uk")).await.unwrap();

        let query = UserQuery {
            keyword: Some("NAVY".to_string()),
            ..Default::default()
        };
        let page = users.list(&query).await.unwrap();
        assert_eq!(page.total_elements, 1);
        assert_eq!(page.content[0].name, "Grace Hopper");
        assert_eq!(page.size, DEFAULT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn update_keeps_own_email() {
        let users = service();
        let user = users.create(input("Linus", "linus@example.org")).await.unwrap();
        let updated = users
            .update(user.id, input("Linus T.", "linus@example.org"))
            .await
            .unwrap();
        assert_eq!(updated.name, "Linus T.");
        assert!(matches!(
            users.update(404, input("Ghost", "ghost@example.org")).await,
            Err(AppError::NotFound(_))
        ));
    }
}
