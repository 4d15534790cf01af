use tracing::{debug, info};

use crate::api::DashboardApi;
use crate::models::UserProfile;

pub const LOGIN_REQUIRED_MESSAGE: &str = "You must be logged in to view this page.";

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Unknown,
    Authenticated(UserProfile),
    Unauthenticated,
}

impl AuthState {
    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            AuthState::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn is_admin(&self) -> bool {
        self.profile().is_some_and(|profile| profile.is_superuser)
    }
}

/// Decides, once per view, whether the stored session is usable.
///
/// Each view owns its own resolver and resolves it on mount; nothing is
/// cached between views.
#[derive(Debug)]
pub struct AuthResolver {
    state: AuthState,
}

impl Default for AuthResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthResolver {
    pub fn new() -> Self {
        Self {
            state: AuthState::Unknown,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub async fn resolve(&mut self, api: &DashboardApi) -> &AuthState {
        self.state = match api.client().has_session() {
            Ok(true) => match api.profile().await {
                Ok(profile) => {
                    info!("Authenticated as {}", profile.username);
                    AuthState::Authenticated(profile)
                }
                Err(e) => {
                    debug!("Profile check failed: {e}");
                    AuthState::Unauthenticated
                }
            },
            Ok(false) => {
                debug!("No stored access token");
                AuthState::Unauthenticated
            }
            Err(e) => {
                debug!("Token store unreadable: {e}");
                AuthState::Unauthenticated
            }
        };
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::client::ApiClient;
    use crate::jwt::unsigned_token;
    use crate::testing::{RecordingListener, ScriptedTransport};
    use crate::token_store::MemoryTokenStore;

    fn api_with(transport: &Arc<ScriptedTransport>, store: MemoryTokenStore) -> DashboardApi {
        DashboardApi::new(
            ApiClient::new(transport.clone(), Arc::new(store))
                .with_listener(RecordingListener::new()),
        )
    }

    #[tokio::test]
    async fn starts_unknown_and_resolves_authenticated() {
        let transport = ScriptedTransport::new();
        transport.push_json(
            200,
            json!({ "id": 7, "username": "aoi", "email": "aoi@example.com", "is_superuser": true, "is_staff": true }),
        );
        let token = unsigned_token(Utc::now() + chrono::Duration::minutes(10));
        let api = api_with(&transport, MemoryTokenStore::with_tokens(&token, "r"));

        let mut resolver = AuthResolver::new();
        assert_eq!(resolver.state(), &AuthState::Unknown);

        let state = resolver.resolve(&api).await.clone();
        assert!(state.is_authenticated());
        assert!(state.is_admin());
        assert_eq!(state.profile().unwrap().username, "aoi");
    }

    #[tokio::test]
    async fn no_token_is_unauthenticated_without_network() {
        let transport = ScriptedTransport::new();
        let api = api_with(&transport, MemoryTokenStore::new());

        let mut resolver = AuthResolver::new();
        assert_eq!(resolver.resolve(&api).await, &AuthState::Unauthenticated);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_is_unauthenticated() {
        let transport = ScriptedTransport::new();
        transport.push_json(401, json!({ "detail": "Token is blacklisted" }));
        let token = unsigned_token(Utc::now());
        let api = api_with(&transport, MemoryTokenStore::with_tokens(&token, "r"));

        let mut resolver = AuthResolver::new();
        assert_eq!(resolver.resolve(&api).await, &AuthState::Unauthenticated);
    }
}
