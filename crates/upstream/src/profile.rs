//! User profile client trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, UpstreamError};

/// Profile of a user as returned by the user service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    /// Region the user belongs to. Doubles as the venue name.
    pub region: String,
}

/// Trait for user profile lookups.
#[async_trait]
pub trait ProfileClient: Send + Sync {
    /// Fetches the profile of a user.
    async fn find_user_profile(&self, user_id: i64) -> Result<UserProfile>;
}

/// In-memory profile client for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileClient {
    profiles: Arc<RwLock<HashMap<i64, UserProfile>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryProfileClient {
    /// Creates a new empty profile client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a profile for a user in `region`.
    pub async fn insert(&self, user_id: i64, region: impl Into<String>) {
        let profile = UserProfile {
            user_id,
            username: format!("user-{user_id}"),
            email: format!("user-{user_id}@example.com"),
            region: region.into(),
        };
        self.profiles.write().await.insert(user_id, profile);
    }

    /// Makes every subsequent call fail as if the service returned 503.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileClient for InMemoryProfileClient {
    async fn find_user_profile(&self, user_id: i64) -> Result<UserProfile> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status {
                service: "user-service",
                status: 503,
            });
        }

        self.profiles
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(UpstreamError::UserNotFound(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_registered_profile() {
        let client = InMemoryProfileClient::new();
        client.insert(7, "Jakarta").await;

        let profile = client.find_user_profile(7).await.unwrap();
        assert_eq!(profile.user_id, 7);
        assert_eq!(profile.region, "Jakarta");
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let client = InMemoryProfileClient::new();

        let result = client.find_user_profile(99).await;
        assert!(matches!(result, Err(UpstreamError::UserNotFound(99))));
    }

    #[tokio::test]
    async fn unavailable_client_fails() {
        let client = InMemoryProfileClient::new();
        client.insert(7, "Jakarta").await;
        client.set_unavailable(true);

        let result = client.find_user_profile(7).await;
        assert!(matches!(
            result,
            Err(UpstreamError::Status { status: 503, .. })
        ));
    }

    #[test]
    fn profile_decodes_without_optional_fields() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"user_id": 1, "region": "Bandung"}"#).unwrap();
        assert_eq!(profile.region, "Bandung");
        assert!(profile.username.is_empty());
    }
}
