//! User model - simulated platform accounts.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::SummaryFields;

pub const USER_RESOURCE_TYPE: &str = "shared.user";

/// User entity.
///
/// `sub` is the external subject identifier; it is assigned once at creation
/// and never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_superuser: bool,
    pub sub: String,
}

impl User {
    /// Exact comparison; this proxy only simulates identities.
    pub fn password_matches(&self, candidate: &str) -> bool {
        self.password == candidate
    }

    pub fn to_response(&self) -> UserResponse {
        UserResponse::from(self)
    }
}

/// Request to create a user.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "username can not be blank."))]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Allow-listed user patch. Absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub is_superuser: Option<bool>,
}

impl UpdateUserRequest {
    /// Apply the patch field by field. An empty username is ignored.
    pub fn apply(self, user: &mut User) {
        if let Some(username) = self.username.filter(|u| !u.is_empty()) {
            user.username = username;
        }
        if let Some(password) = self.password {
            user.password = password;
        }
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(is_superuser) = self.is_superuser {
            user.is_superuser = is_superuser;
        }
    }
}

/// User as returned by the admin API. The password is never echoed.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_superuser: bool,
    pub summary_fields: SummaryFields,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            is_superuser: user.is_superuser,
            summary_fields: SummaryFields::new(&user.sub, USER_RESOURCE_TYPE),
        }
    }
}
