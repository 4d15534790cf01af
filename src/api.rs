//! Typed access to the dashboard's REST endpoints.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::{
    AuthResponse, ContentToggles, Interaction, MonthOverMonth, MonthlyViews, Paginated, Question,
    QuestionAnswer, UserProfile, Video, VideoRating, VideoStats, ViewSession,
};
use crate::token_store::REFRESH_TOKEN_KEY;

/// Profile fields that can be changed; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.password.is_none()
    }
}

#[derive(Clone)]
pub struct DashboardApi {
    client: ApiClient,
}

impl DashboardApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Posts credentials without any stored token, so a stale session never
    /// gets in the way of logging in again.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let response: AuthResponse = self
            .client
            .post_json_anonymous("login/", &json!({ "username": username, "password": password }))
            .await?;
        self.client
            .store_tokens(&response.tokens.access, &response.tokens.refresh)?;
        info!("Logged in as {username}");
        Ok(response)
    }

    /// Creates an account (admin only). The caller's own session is untouched.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        self.client
            .post_json(
                "register/",
                &json!({ "username": username, "email": email, "password": password }),
            )
            .await
    }

    /// Blacklists the refresh token server-side and clears local tokens
    /// whatever the server answers.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let refresh = self.client.store().get(REFRESH_TOKEN_KEY)?;
        if let Some(refresh) = refresh {
            if let Err(e) = self.client.post("logout/", json!({ "refresh": refresh })).await {
                warn!("Server-side logout failed: {e}");
            }
        }
        self.client.clear_tokens()?;
        info!("Logged out");
        Ok(())
    }

    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        self.client.get_json("user/").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        let _: serde_json::Value = self.client.patch_json("user/update/", update).await?;
        Ok(())
    }

    pub async fn content_toggles(&self) -> Result<ContentToggles, ApiError> {
        self.client.get_json("user/content-toggles/").await
    }

    pub async fn update_content_toggles(
        &self,
        toggles: &BTreeMap<String, bool>,
    ) -> Result<ContentToggles, ApiError> {
        self.client
            .patch_json("user/content-toggles/update/", toggles)
            .await
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>, ApiError> {
        self.client.get_json("user/list/").await
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("user/delete/{id}/")).await
    }

    pub async fn videos(&self) -> Result<Vec<Video>, ApiError> {
        self.client.get_json("videos/").await
    }

    pub async fn video_stats(&self, video_id: i64) -> Result<Vec<VideoStats>, ApiError> {
        self.client
            .get_json(&format!("videos/{video_id}/stats/"))
            .await
    }

    pub async fn all_video_stats(&self) -> Result<Vec<VideoStats>, ApiError> {
        self.client.get_json("videos/stats/").await
    }

    pub async fn interactions(&self, video_id: i64) -> Result<Vec<Interaction>, ApiError> {
        self.client
            .get_json(&format!("videos/{video_id}/interactions/"))
            .await
    }

    pub async fn all_interactions(&self) -> Result<Vec<Interaction>, ApiError> {
        self.all_pages("videos/interactions/").await
    }

    pub async fn questions(&self, video_id: i64) -> Result<Vec<Question>, ApiError> {
        self.client
            .get_json(&format!("videos/{video_id}/questions/"))
            .await
    }

    pub async fn all_questions(&self) -> Result<Vec<Question>, ApiError> {
        self.all_pages("videos/questions/").await
    }

    pub async fn question_answers(&self, question_id: i64) -> Result<Vec<QuestionAnswer>, ApiError> {
        self.client
            .get_json(&format!("videos/{question_id}/question_answers/"))
            .await
    }

    pub async fn monthly_views(&self, video_id: i64) -> Result<Vec<MonthlyViews>, ApiError> {
        self.client
            .get_json(&format!("videos/{video_id}/monthly_views/"))
            .await
    }

    pub async fn view_sessions(&self, video_id: i64) -> Result<Vec<ViewSession>, ApiError> {
        self.client
            .get_json(&format!("videos/{video_id}/view_sessions/"))
            .await
    }

    pub async fn video_ratings(&self) -> Result<Vec<VideoRating>, ApiError> {
        self.client.get_json("videos/video_ratings/").await
    }

    pub async fn past_two_months(&self) -> Result<Vec<MonthOverMonth>, ApiError> {
        let raw: BTreeMap<String, [i64; 2]> = self
            .client
            .get_json("videos/monthly_views/past_two_months/")
            .await?;
        Ok(MonthOverMonth::from_map(raw))
    }

    /// Full JSON export of one video.
    pub async fn export_video(&self, video_id: i64) -> Result<Vec<u8>, ApiError> {
        self.client
            .get_bytes(&format!("videos/export/{video_id}/"))
            .await
    }

    /// CSV of a month's views; `include_all` also covers videos created after that month.
    pub async fn export_month(&self, month: &str, include_all: bool) -> Result<Vec<u8>, ApiError> {
        let path = if include_all {
            format!("videos/export/monthly_views/{month}/all/")
        } else {
            format!("videos/export/monthly_views/{month}/")
        };
        self.client.get_bytes(&path).await
    }

    /// Follows `?page=N` until the endpoint reports no next page.
    async fn all_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let mut results = Vec::new();
        let mut page = 1usize;
        loop {
            let batch: Paginated<T> = self
                .client
                .get_json(&format!("{path}?page={page}"))
                .await?;
            results.extend(batch.results);
            if batch.next.is_none() {
                break;
            }
            page += 1;
        }
        Ok(results)
    }
}
