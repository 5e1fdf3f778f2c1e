//! User storage abstraction.
//!
//! The persistent user store is an external collaborator. Core services
//! consume it through the [`UserStore`] trait; [`InMemoryUserStore`] is the
//! in-process implementation used by the server wiring and by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use schoolhub_common::AppResult;

/// User role tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Teaching staff.
    Teacher,
    /// Enrolled student.
    Student,
}

impl Role {
    /// Parse a role from its wire form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "teacher" => Some(Self::Teacher),
            "student" => Some(Self::Student),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Teacher => "teacher",
            Self::Student => "student",
        };
        write!(f, "{s}")
    }
}

/// A registered push endpoint, embedded in its owning user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointToken {
    /// Opaque provider-specific push address.
    pub token: String,
    /// Identifier of the physical device/installation.
    pub device_id: String,
    /// When this token was registered.
    pub registered_at: DateTime<Utc>,
}

/// A user record as exposed by the user store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User identity.
    pub id: String,
    /// Role tag.
    pub role: Role,
    /// Whether the account has been verified.
    pub verified: bool,
    /// Whether the account is active.
    pub active: bool,
    /// Class membership (students only).
    pub class_id: Option<String>,
    /// Section within the class (students only).
    pub section: Option<String>,
    /// Registered push endpoints, at most one per device.
    pub push_tokens: Vec<EndpointToken>,
}

impl User {
    /// Only verified and active users are eligible notification recipients.
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        self.verified && self.active
    }
}

/// Trait for user storage queries and token persistence.
///
/// This allows the core services to read and mutate user records
/// without depending on a concrete storage backend.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Load a user by role and ID.
    async fn find_by_id(&self, role: Role, user_id: &str) -> AppResult<Option<User>>;

    /// All verified and active users of the given role.
    async fn find_eligible_by_role(&self, role: Role) -> AppResult<Vec<User>>;

    /// All verified and active students in the given class,
    /// optionally narrowed to one section.
    async fn find_eligible_by_class(
        &self,
        class_id: &str,
        section: Option<&str>,
    ) -> AppResult<Vec<User>>;

    /// Persist the full token collection for a user.
    async fn save_tokens(
        &self,
        role: Role,
        user_id: &str,
        tokens: Vec<EndpointToken>,
    ) -> AppResult<()>;
}

/// Wrapper for boxed `UserStore` trait object.
pub type UserStoreService = Arc<dyn UserStore>;

/// In-memory user store.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<(Role, String), User>>,
}

impl InMemoryUserStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user record.
    pub async fn insert_user(&self, user: User) {
        let mut users = self.users.write().await;
        users.insert((user.role, user.id.clone()), user);
    }

    /// Remove a user record, dropping its tokens with it.
    pub async fn remove_user(&self, role: Role, user_id: &str) {
        let mut users = self.users.write().await;
        users.remove(&(role, user_id.to_string()));
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, role: Role, user_id: &str) -> AppResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&(role, user_id.to_string())).cloned())
    }

    async fn find_eligible_by_role(&self, role: Role) -> AppResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| u.role == role && u.is_eligible())
            .cloned()
            .collect())
    }

    async fn find_eligible_by_class(
        &self,
        class_id: &str,
        section: Option<&str>,
    ) -> AppResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| {
                u.role == Role::Student
                    && u.is_eligible()
                    && u.class_id.as_deref() == Some(class_id)
                    && section.is_none_or(|s| u.section.as_deref() == Some(s))
            })
            .cloned()
            .collect())
    }

    async fn save_tokens(
        &self,
        role: Role,
        user_id: &str,
        tokens: Vec<EndpointToken>,
    ) -> AppResult<()> {
        let mut users = self.users.write().await;
        if let Some(user) = users.get_mut(&(role, user_id.to_string())) {
            user.push_tokens = tokens;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str, class_id: &str, section: &str, verified: bool) -> User {
        User {
            id: id.to_string(),
            role: Role::Student,
            verified,
            active: true,
            class_id: Some(class_id.to_string()),
            section: Some(section.to_string()),
            push_tokens: vec![],
        }
    }

    #[tokio::test]
    async fn test_class_query_filters_unverified() {
        let store = InMemoryUserStore::new();
        store.insert_user(student("s1", "10", "A", true)).await;
        store.insert_user(student("s2", "10", "A", true)).await;
        store.insert_user(student("s3", "10", "A", false)).await;
        store.insert_user(student("s4", "11", "A", true)).await;

        let found = store.find_eligible_by_class("10", None).await.unwrap();
        let mut ids: Vec<_> = found.iter().map(|u| u.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_class_query_narrows_by_section() {
        let store = InMemoryUserStore::new();
        store.insert_user(student("s1", "10", "A", true)).await;
        store.insert_user(student("s2", "10", "B", true)).await;

        let found = store
            .find_eligible_by_class("10", Some("B"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "s2");
    }

    #[tokio::test]
    async fn test_role_parse() {
        assert_eq!(Role::parse("teacher"), Some(Role::Teacher));
        assert_eq!(Role::parse("student"), Some(Role::Student));
        assert_eq!(Role::parse("admin"), None);
    }
}
