use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scoring::sources::UpstreamResult;
use scoring::{
    AchievementProgress, Contribution, ContributionSource, GameSession, GameplaySource,
    SocialActivity, SocialSource,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ActivityError, Result};

#[derive(Debug, Deserialize)]
struct InteractionCount {
    count: u32,
}

#[derive(Debug, Deserialize)]
struct FriendList {
    friend_ids: Vec<Uuid>,
}

/// JSON client for the gameplay, social and contribution services, all
/// reachable under one base URL.
pub struct HttpActivityClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpActivityClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ActivityError::ConfigError(base_url));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("impact-engine/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url,
            timeout,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);

        let response = self.client.get(&url).query(query).send().await?;
        if !response.status().is_success() {
            return Err(ActivityError::StatusError {
                status: response.status().as_u16(),
                url,
            });
        }

        Ok(response.json::<T>().await?)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        source_name: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> UpstreamResult<T> {
        self.get_json(path, query)
            .await
            .map_err(|e| e.into_upstream(source_name, self.timeout))
    }
}

#[async_trait]
impl GameplaySource for HttpActivityClient {
    async fn sessions(
        &self,
        participant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> UpstreamResult<Vec<GameSession>> {
        self.fetch(
            "gameplay sessions",
            &format!("/gameplay/{participant_id}/sessions"),
            &[("from", from.to_rfc3339()), ("to", to.to_rfc3339())],
        )
        .await
    }

    async fn achievements(&self, participant_id: Uuid) -> UpstreamResult<AchievementProgress> {
        self.fetch(
            "gameplay achievements",
            &format!("/gameplay/{participant_id}/achievements"),
            &[],
        )
        .await
    }
}

#[async_trait]
impl SocialSource for HttpActivityClient {
    async fn social_activity(
        &self,
        participant_id: Uuid,
        since: DateTime<Utc>,
    ) -> UpstreamResult<SocialActivity> {
        self.fetch(
            "social activity",
            &format!("/social/{participant_id}/activity"),
            &[("since", since.to_rfc3339())],
        )
        .await
    }

    async fn interaction_count(
        &self,
        participant_id: Uuid,
        since: DateTime<Utc>,
    ) -> UpstreamResult<u32> {
        let body: InteractionCount = self
            .fetch(
                "social interactions",
                &format!("/social/{participant_id}/interactions"),
                &[("since", since.to_rfc3339())],
            )
            .await?;
        Ok(body.count)
    }

    async fn friend_ids(&self, participant_id: Uuid) -> UpstreamResult<Vec<Uuid>> {
        let body: FriendList = self
            .fetch(
                "social friends",
                &format!("/social/{participant_id}/friends"),
                &[],
            )
            .await?;
        Ok(body.friend_ids)
    }
}

#[async_trait]
impl ContributionSource for HttpActivityClient {
    async fn contributions(&self, participant_id: Uuid) -> UpstreamResult<Vec<Contribution>> {
        self.fetch(
            "contribution ledger",
            &format!("/contributions/{participant_id}"),
            &[],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = HttpActivityClient::new("http://activity.local/api/", Duration::from_secs(5))
            .unwrap();
        assert_eq!(client.base_url(), "http://activity.local/api");
        assert_eq!(
            client.url("/contributions/abc"),
            "http://activity.local/api/contributions/abc"
        );
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = HttpActivityClient::new("activity.local", Duration::from_secs(5));
        assert!(matches!(err, Err(ActivityError::ConfigError(_))));
    }

    #[test]
    fn test_status_error_maps_to_unavailable() {
        let err = ActivityError::StatusError {
            status: 503,
            url: "http://activity.local/social/x/friends".into(),
        };
        let upstream = err.into_upstream("social friends", Duration::from_secs(5));
        assert!(matches!(
            upstream,
            scoring::UpstreamError::Unavailable {
                source_name: "social friends",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_degrades_to_upstream_error() {
        let client = HttpActivityClient::new("http://127.0.0.1:9", Duration::from_millis(200))
            .unwrap();
        let result = client.contributions(Uuid::new_v4()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_fact_payloads_deserialize() {
        let sessions: Vec<GameSession> = serde_json::from_str(
            r#"[{"game_id":"chess","started_at":"2025-03-01T10:00:00Z","duration_minutes":30}]"#,
        )
        .unwrap();
        assert!(!sessions[0].tournament);

        let friends: FriendList = serde_json::from_str(
            r#"{"friend_ids":["6f1c1f5e-6a8e-4a57-9b7b-0d0c5e2b3d11"]}"#,
        )
        .unwrap();
        assert_eq!(friends.friend_ids.len(), 1);
    }
}
