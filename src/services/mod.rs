//! Business logic services

pub mod books;
pub mod clock;
pub mod loans;
pub mod overdue;
pub mod seed;
pub mod users;

use std::sync::Arc;

use crate::{config::LoansConfig, repository::Repository};

use self::clock::Clock;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub books: books::BooksService,
    pub users: users::UsersService,
    pub loans: loans::LoansService,
}

impl Services {
    /// Create all services over the given repository and clock
    pub fn new(repository: Repository, loans_config: &LoansConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            books: books::BooksService::new(repository.clone(), clock.clone()),
            users: users::UsersService::new(repository.clone(), clock.clone()),
            loans: loans::LoansService::new(repository, loans_config, clock),
        }
    }
}
