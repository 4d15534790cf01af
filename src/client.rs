//! Authenticated request client.
//!
//! Every request reads the stored access token, refreshes it first when it is
//! about to expire, and attaches it as a bearer token. A 401 on a request that
//! did not refresh triggers one refresh and one replay of the same request.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::error::{first_validation_message, ApiError};
use crate::jwt;
use crate::token_store::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};

pub const LOGIN_ROUTE: &str = "/login/";
pub const REFRESH_PATH: &str = "token/refresh/";
pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_secs(1);

/// Told when the session can no longer be refreshed.
pub trait SessionListener: Send + Sync {
    fn session_expired(&self, login_route: &str);
}

/// Logs the redirect; the CLI then tells the user to run `login`.
pub struct LogSessionListener;

impl SessionListener for LogSessionListener {
    fn session_expired(&self, login_route: &str) {
        warn!("Session expired, redirecting to {login_route}");
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn TokenStore>,
    listener: Arc<dyn SessionListener>,
    lookahead: Duration,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            transport,
            store,
            listener: Arc::new(LogSessionListener),
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_lookahead(mut self, lookahead: Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn has_session(&self) -> Result<bool, ApiError> {
        Ok(self.store.get(ACCESS_TOKEN_KEY)?.is_some())
    }

    /// Stores a fresh token pair, e.g. from a login response.
    pub fn store_tokens(&self, access: &str, refresh: &str) -> Result<(), ApiError> {
        self.store.set(ACCESS_TOKEN_KEY, access)?;
        self.store.set(REFRESH_TOKEN_KEY, refresh)
    }

    pub fn clear_tokens(&self) -> Result<(), ApiError> {
        self.store.clear_session()
    }

    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut refreshed = false;
        let token = match self.store.get(ACCESS_TOKEN_KEY)? {
            None => None,
            Some(token) if jwt::expires_within(&token, Utc::now(), self.lookahead) => {
                info!("Access token expiring, refreshing before {}", request.path);
                refreshed = true;
                Some(self.refresh().await?)
            }
            Some(token) => Some(token),
        };

        let response = self.dispatch(&request, token.as_deref()).await?;
        if response.status != 401 {
            return check(response);
        }

        match token {
            None => Err(ApiError::Unauthenticated),
            Some(_) if refreshed => {
                warn!("{} rejected a freshly refreshed token", request.path);
                Err(self.expire_session())
            }
            Some(_) => {
                info!("{} returned 401, refreshing and replaying once", request.path);
                let token = self.refresh().await?;
                let replay = self.dispatch(&request, Some(&token)).await?;
                if replay.status == 401 {
                    return Err(self.expire_session());
                }
                check(replay)
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let mut outgoing = request.clone();
        outgoing.bearer = token.map(str::to_string);
        let response = self.transport.send(outgoing).await.map_err(|err| {
            error!("{} failed: {err}", request.path);
            err
        })?;
        debug!("{} -> {}", request.path, response.status);
        Ok(response)
    }

    /// Exchanges the stored refresh token for a new access token.
    ///
    /// A rejected refresh clears both tokens and notifies the listener. A
    /// transport failure leaves the tokens in place and surfaces as `Network`.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let Some(refresh) = self.store.get(REFRESH_TOKEN_KEY)? else {
            warn!("No refresh token stored");
            return Err(self.expire_session());
        };

        let response = self
            .transport
            .send(ApiRequest::post(REFRESH_PATH, json!({ "refresh": refresh })))
            .await?;

        if !response.is_success() {
            warn!("Token refresh rejected with status {}", response.status);
            return Err(self.expire_session());
        }

        let parsed: RefreshResponse = match serde_json::from_slice(&response.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Token refresh returned an unreadable body: {e}");
                return Err(self.expire_session());
            }
        };

        self.store.set(ACCESS_TOKEN_KEY, &parsed.access)?;
        if let Some(rotated) = parsed.refresh.as_deref() {
            self.store.set(REFRESH_TOKEN_KEY, rotated)?;
        }
        info!("Access token refreshed");
        Ok(parsed.access)
    }

    fn expire_session(&self) -> ApiError {
        if let Err(e) = self.store.clear_session() {
            error!("Failed to clear stored tokens: {e}");
        }
        self.listener.session_expired(LOGIN_ROUTE);
        ApiError::SessionExpired
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(ApiRequest::get(path)).await?;
        decode(path, &response)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(ApiRequest::post(path, serde_json::to_value(body)?))
            .await?;
        decode(path, &response)
    }

    /// POST sent without a bearer token and without touching the stored
    /// session, for endpoints that hand out tokens.
    pub async fn post_json_anonymous<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post(path, serde_json::to_value(body)?);
        let response = check(self.dispatch(&request, None).await?)?;
        decode(path, &response)
    }

    /// POST whose response body is ignored.
    pub async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), ApiError> {
        self.send(ApiRequest::post(path, body)).await?;
        Ok(())
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(ApiRequest::patch(path, serde_json::to_value(body)?))
            .await?;
        decode(path, &response)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(path)).await?;
        Ok(())
    }

    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        Ok(self.send(ApiRequest::get(path)).await?.body)
    }
}

fn check(response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.is_success() {
        return Ok(response);
    }

    let body = response.text();
    if response.status == 400 {
        if let Some((field, message)) = first_validation_message(&body) {
            return Err(ApiError::Validation { field, message });
        }
    }
    Err(ApiError::server(response.status, body))
}

fn decode<T: DeserializeOwned>(path: &str, response: &ApiResponse) -> Result<T, ApiError> {
    serde_json::from_slice(&response.body).map_err(|e| ApiError::Decode(format!("{path}: {e}")))
}
