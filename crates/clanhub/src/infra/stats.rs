use hyper::header::{ACCEPT, RETRY_AFTER};
use log::{debug, error, warn};
use mime::APPLICATION_JSON;
use reqwest_middleware::{
    reqwest::{Method, Response, StatusCode, Url},
    ClientWithMiddleware,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};

use crate::{config::StatsSettings, domain::ClanMember};

#[derive(Error, Debug)]
pub enum Error {
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("problem sending request to stats api: {0}")]
    Send(#[from] reqwest_middleware::reqwest::Error),
    #[error("problem sending request to stats api: {0}")]
    SendRetry(#[from] reqwest_middleware::Error),
    #[error("problem requesting stats api: {0}")]
    Request(String),
    #[error("stats api rate limit hit")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("stats api temporarily unavailable: {0}")]
    Transient(String),
}

#[async_trait::async_trait]
pub trait StatsApi: Send + Sync {
    /// Full roster of a clan group
    async fn group_members(&self, group_id: u64) -> Result<Vec<ClanMember>, Error>;
    /// Ask the stats service to re-fetch one player's hiscores
    async fn update_player(&self, username: &str) -> Result<ClanMember, Error>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    id: i64,
    username: String,
    display_name: String,
    #[serde(rename = "type", default)]
    account_type: String,
    #[serde(default)]
    ehb: f64,
    #[serde(default)]
    ehp: f64,
    #[serde(default)]
    ttm: f64,
}

impl From<PlayerResponse> for ClanMember {
    fn from(player: PlayerResponse) -> Self {
        ClanMember {
            id: player.id,
            username: player.username,
            display_name: player.display_name,
            account_type: player.account_type,
            ehb: player.ehb,
            ehp: player.ehp,
            ttm: player.ttm,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MembershipResponse {
    player: PlayerResponse,
}

#[derive(Debug, Deserialize)]
struct GroupDetailsResponse {
    memberships: Vec<MembershipResponse>,
}

pub struct StatsClient {
    pub base_url: Url,
    pub client: ClientWithMiddleware,
    api_key: Option<SecretString>,
    min_request_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl StatsClient {
    pub fn new(client: ClientWithMiddleware, settings: &StatsSettings) -> Result<Self, Error> {
        let mut base = settings.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| Error::Request(format!("invalid stats api url {}: {}", base, e)))?;

        Ok(Self {
            base_url,
            client,
            api_key: settings.api_key.clone().map(SecretString::from),
            min_request_interval: Duration::from_millis(settings.min_request_interval_ms),
            last_request: Mutex::new(None),
        })
    }

    /// Hold back until the configured spacing since the previous request has passed
    async fn wait_for_slot(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_request_interval {
                let wait = self.min_request_interval - elapsed;
                debug!("spacing stats api request by {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn send_request_internal(
        &self,
        method: Method,
        path: &str,
        not_found_message: String,
    ) -> Result<Response, Error> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| Error::Request(e.to_string()))?;

        self.wait_for_slot().await;

        let mut request = self
            .client
            .request(method, url)
            .header(ACCEPT, APPLICATION_JSON.to_string());
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            error!("error sending to stats api: {}", e);
            Error::SendRetry(e)
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound(not_found_message))
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok());
            warn!("stats api rate limited, retry after {:?}s", retry_after_secs);
            Err(Error::RateLimited { retry_after_secs })
        } else if status == StatusCode::SERVICE_UNAVAILABLE
            || status == StatusCode::BAD_GATEWAY
            || status == StatusCode::GATEWAY_TIMEOUT
        {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Transient(format!(
                "error response from stats api with status {}: {:?}",
                status, body
            )))
        } else {
            let body = response.text().await?;
            Err(Error::Request(format!(
                "error response from stats api with status {}: {:?}",
                status, body
            )))
        }
    }

    async fn send_request<T>(
        &self,
        method: Method,
        path: &str,
        not_found_message: String,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let response = self
            .send_request_internal(method, path, not_found_message)
            .await?;

        response.json::<T>().await.map_err(Into::into)
    }
}

#[async_trait::async_trait]
impl StatsApi for StatsClient {
    async fn group_members(&self, group_id: u64) -> Result<Vec<ClanMember>, Error> {
        let group: GroupDetailsResponse = self
            .send_request(
                Method::GET,
                &format!("groups/{}", group_id),
                format!("group {} not found", group_id),
            )
            .await?;

        debug!(
            "group {} has {} members",
            group_id,
            group.memberships.len()
        );
        Ok(group
            .memberships
            .into_iter()
            .map(|membership| membership.player.into())
            .collect())
    }

    async fn update_player(&self, username: &str) -> Result<ClanMember, Error> {
        let player: PlayerResponse = self
            .send_request(
                Method::POST,
                &format!("players/{}", username),
                format!("player {} not found", username),
            )
            .await?;
        Ok(player.into())
    }
}
