//! Audience resolution service.
//!
//! Translates a logical notification target into the concrete set of
//! eligible recipients and their endpoint tokens.

use serde::{Deserialize, Serialize};

use schoolhub_common::{AppError, AppResult};

use crate::services::user_store::{Role, User, UserStoreService};

/// Wire form of a notification target specification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    /// Target kind: `all`, `teachers`, `students`, `class` or `user`.
    pub kind: String,
    /// Class reference (kind = `class`).
    #[serde(default)]
    pub class_id: Option<String>,
    /// Optional section filter (kind = `class`).
    #[serde(default)]
    pub section: Option<String>,
    /// Target user (kind = `user`).
    #[serde(default)]
    pub user_id: Option<String>,
    /// Target user's role (kind = `user`).
    #[serde(default)]
    pub role: Option<String>,
}

/// A resolved notification target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTarget {
    /// Every eligible teacher and student.
    All,
    /// Every eligible teacher.
    Teachers,
    /// Every eligible student.
    Students,
    /// Eligible students of one class, optionally narrowed to a section.
    Class {
        class_id: String,
        section: Option<String>,
    },
    /// A single user.
    User { user_id: String, role: Role },
}

impl NotificationTarget {
    /// Parse the wire form, failing with a resolution error when malformed.
    pub fn from_spec(spec: &TargetSpec) -> AppResult<Self> {
        match spec.kind.as_str() {
            "all" => Ok(Self::All),
            "teachers" => Ok(Self::Teachers),
            "students" => Ok(Self::Students),
            "class" => {
                let class_id = spec
                    .class_id
                    .clone()
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| {
                        AppError::Resolution("class target requires classId".to_string())
                    })?;
                Ok(Self::Class {
                    class_id,
                    section: spec.section.clone().filter(|s| !s.is_empty()),
                })
            }
            "user" => {
                let user_id = spec
                    .user_id
                    .clone()
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| {
                        AppError::Resolution("user target requires userId".to_string())
                    })?;
                let role = spec
                    .role
                    .as_deref()
                    .and_then(Role::parse)
                    .ok_or_else(|| {
                        AppError::Resolution("user target requires a valid role".to_string())
                    })?;
                Ok(Self::User { user_id, role })
            }
            other => Err(AppError::Resolution(format!(
                "unknown target kind: {other}"
            ))),
        }
    }
}

/// A resolved recipient identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub user_id: String,
    pub role: Role,
}

/// The resolved audience for one notification event.
#[derive(Debug, Clone, Default)]
pub struct Audience {
    /// Recipient identities.
    pub recipients: Vec<Recipient>,
    /// Endpoint tokens flattened across all recipients.
    pub tokens: Vec<String>,
}

impl Audience {
    /// Whether there is no one to notify. An empty audience is a valid,
    /// non-error result.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    fn from_users(users: Vec<User>) -> Self {
        let mut audience = Self::default();
        for user in users {
            audience.recipients.push(Recipient {
                user_id: user.id,
                role: user.role,
            });
            audience
                .tokens
                .extend(user.push_tokens.into_iter().map(|t| t.token));
        }
        audience
    }
}

/// Audience resolver service.
#[derive(Clone)]
pub struct AudienceResolver {
    store: UserStoreService,
}

impl AudienceResolver {
    /// Create a new audience resolver.
    #[must_use]
    pub fn new(store: UserStoreService) -> Self {
        Self { store }
    }

    /// Resolve a target into recipient identities and endpoint tokens.
    pub async fn resolve(&self, target: &NotificationTarget) -> AppResult<Audience> {
        match target {
            NotificationTarget::All => {
                let mut users = self.store.find_eligible_by_role(Role::Teacher).await?;
                users.extend(self.store.find_eligible_by_role(Role::Student).await?);
                Ok(Audience::from_users(users))
            }
            NotificationTarget::Teachers => {
                let users = self.store.find_eligible_by_role(Role::Teacher).await?;
                Ok(Audience::from_users(users))
            }
            NotificationTarget::Students => {
                let users = self.store.find_eligible_by_role(Role::Student).await?;
                Ok(Audience::from_users(users))
            }
            NotificationTarget::Class { class_id, section } => {
                let users = self
                    .store
                    .find_eligible_by_class(class_id, section.as_deref())
                    .await?;
                Ok(Audience::from_users(users))
            }
            NotificationTarget::User { user_id, role } => {
                let user = self
                    .store
                    .find_by_id(*role, user_id)
                    .await?
                    .ok_or_else(|| AppError::UserNotFound(user_id.clone()))?;
                Ok(Audience::from_users(vec![user]))
            }
        }
    }

    /// Resolve a target into its endpoint tokens only.
    pub async fn resolve_tokens(&self, target: &NotificationTarget) -> AppResult<Vec<String>> {
        Ok(self.resolve(target).await?.tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::user_store::{EndpointToken, InMemoryUserStore};
    use chrono::Utc;
    use std::sync::Arc;

    fn token(value: &str) -> EndpointToken {
        EndpointToken {
            token: value.to_string(),
            device_id: format!("dev-{value}"),
            registered_at: Utc::now(),
        }
    }

    fn user(id: &str, role: Role, verified: bool, class_id: Option<&str>, tokens: &[&str]) -> User {
        User {
            id: id.to_string(),
            role,
            verified,
            active: true,
            class_id: class_id.map(String::from),
            section: None,
            push_tokens: tokens.iter().map(|t| token(t)).collect(),
        }
    }

    async fn seeded_store() -> Arc<InMemoryUserStore> {
        let store = Arc::new(InMemoryUserStore::new());
        store
            .insert_user(user("t1", Role::Teacher, true, None, &["tk-t1"]))
            .await;
        store
            .insert_user(user("s1", Role::Student, true, Some("10"), &["tk-s1"]))
            .await;
        store
            .insert_user(user("s2", Role::Student, true, Some("10"), &["tk-s2a", "tk-s2b"]))
            .await;
        store
            .insert_user(user("s3", Role::Student, true, Some("10"), &["tk-s3"]))
            .await;
        // Unverified: never an eligible recipient.
        store
            .insert_user(user("s4", Role::Student, false, Some("10"), &["tk-s4"]))
            .await;
        store
    }

    #[tokio::test]
    async fn test_class_target_scopes_to_eligible_students() {
        let resolver = AudienceResolver::new(seeded_store().await);
        let target = NotificationTarget::Class {
            class_id: "10".to_string(),
            section: None,
        };

        let audience = resolver.resolve(&target).await.unwrap();
        assert_eq!(audience.recipients.len(), 3);
        let mut tokens = audience.tokens;
        tokens.sort_unstable();
        assert_eq!(tokens, vec!["tk-s1", "tk-s2a", "tk-s2b", "tk-s3"]);
    }

    #[tokio::test]
    async fn test_all_target_includes_both_roles() {
        let resolver = AudienceResolver::new(seeded_store().await);

        let audience = resolver.resolve(&NotificationTarget::All).await.unwrap();
        assert_eq!(audience.recipients.len(), 4);
    }

    #[tokio::test]
    async fn test_single_user_missing_is_an_error() {
        let resolver = AudienceResolver::new(seeded_store().await);
        let target = NotificationTarget::User {
            user_id: "ghost".to_string(),
            role: Role::Teacher,
        };

        let err = resolver.resolve(&target).await.unwrap_err();
        assert!(matches!(err, AppError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_single_user_with_no_tokens_is_not_an_error() {
        let store = seeded_store().await;
        store
            .insert_user(user("t2", Role::Teacher, true, None, &[]))
            .await;
        let resolver = AudienceResolver::new(store);
        let target = NotificationTarget::User {
            user_id: "t2".to_string(),
            role: Role::Teacher,
        };

        let audience = resolver.resolve(&target).await.unwrap();
        assert_eq!(audience.recipients.len(), 1);
        assert!(audience.tokens.is_empty());
    }

    #[tokio::test]
    async fn test_empty_audience_is_valid() {
        let resolver = AudienceResolver::new(Arc::new(InMemoryUserStore::new()));

        let audience = resolver
            .resolve(&NotificationTarget::Teachers)
            .await
            .unwrap();
        assert!(audience.is_empty());
    }

    #[test]
    fn test_from_spec_parses_known_kinds() {
        let spec = TargetSpec {
            kind: "class".to_string(),
            class_id: Some("10".to_string()),
            section: Some("A".to_string()),
            user_id: None,
            role: None,
        };
        assert_eq!(
            NotificationTarget::from_spec(&spec).unwrap(),
            NotificationTarget::Class {
                class_id: "10".to_string(),
                section: Some("A".to_string()),
            }
        );
    }

    #[test]
    fn test_from_spec_rejects_malformed() {
        let spec = TargetSpec {
            kind: "everyone".to_string(),
            class_id: None,
            section: None,
            user_id: None,
            role: None,
        };
        assert!(matches!(
            NotificationTarget::from_spec(&spec),
            Err(AppError::Resolution(_))
        ));

        let spec = TargetSpec {
            kind: "user".to_string(),
            class_id: None,
            section: None,
            user_id: Some("t1".to_string()),
            role: Some("principal".to_string()),
        };
        assert!(matches!(
            NotificationTarget::from_spec(&spec),
            Err(AppError::Resolution(_))
        ));
    }
}
