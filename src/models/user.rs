//! User (borrower) model and related types

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{not_blank, page::SortField};

/// Borrower record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Unique among non-deleted users
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(skip)]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update user request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "User name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl UserInput {
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: super::non_blank(self.phone),
            address: super::non_blank(self.address),
        }
    }
}

/// User list query parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Substring of name or email
    pub keyword: Option<String>,
    pub page: Option<u64>,
    pub size: Option<u64>,
    #[serde(default)]
    pub sort: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub keyword: Option<String>,
}

impl From<&UserQuery> for UserFilter {
    fn from(query: &UserQuery) -> Self {
        Self {
            keyword: super::non_blank(query.keyword.clone()),
        }
    }
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        self.keyword.as_deref().map_or(true, |kw| {
            super::contains_ci(&user.name, kw) || super::contains_ci(&user.email, kw)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSortField {
    Id,
    Name,
    Email,
    CreatedAt,
    UpdatedAt,
}

impl FromStr for UserSortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "email" => Ok(Self::Email),
            "createdAt" | "created_at" => Ok(Self::CreatedAt),
            "updatedAt" | "updated_at" => Ok(Self::UpdatedAt),
            other => Err(format!("Cannot sort users by '{}'", other)),
        }
    }
}

impl SortField for UserSortField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Email => "email",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}
