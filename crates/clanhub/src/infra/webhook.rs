use hyper::header::CONTENT_TYPE;
use log::{debug, error};
use mime::APPLICATION_JSON;
use reqwest_middleware::{reqwest::Url, ClientWithMiddleware};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;

use crate::config::WebhookSettings;

#[derive(Error, Debug)]
pub enum Error {
    #[error("problem sending webhook: {0}")]
    SendRetry(#[from] reqwest_middleware::Error),
    #[error("invalid webhook url: {0}")]
    InvalidUrl(String),
    #[error("webhook rejected with status {0}")]
    Rejected(u16),
    #[error("failed to serialize webhook payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Message announcing something operators should look at
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub image_url: Option<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), Error>;
}

#[derive(Serialize)]
struct WebhookPayload {
    embeds: Vec<Embed>,
}

#[derive(Serialize)]
struct Embed {
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<EmbedImage>,
}

#[derive(Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Serialize)]
struct EmbedImage {
    url: String,
}

/// Posts chat-style embeds to a webhook url
pub struct WebhookClient {
    client: ClientWithMiddleware,
    url: Option<SecretString>,
    site_url: Option<String>,
}

impl WebhookClient {
    pub fn new(client: ClientWithMiddleware, settings: &WebhookSettings) -> Self {
        Self {
            client,
            url: settings.url.clone().map(SecretString::from),
            site_url: settings.site_url.clone(),
        }
    }

    fn payload(&self, notification: Notification) -> WebhookPayload {
        WebhookPayload {
            embeds: vec![Embed {
                title: notification.title,
                description: notification.description,
                url: self.site_url.clone(),
                fields: notification
                    .fields
                    .into_iter()
                    .map(|(name, value)| EmbedField {
                        name,
                        value,
                        inline: true,
                    })
                    .collect(),
                image: notification.image_url.map(|url| EmbedImage { url }),
            }],
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookClient {
    async fn notify(&self, notification: Notification) -> Result<(), Error> {
        let Some(raw_url) = &self.url else {
            debug!("no webhook configured, skipping: {}", notification.title);
            return Ok(());
        };
        let url = Url::parse(raw_url.expose_secret())
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let body = serde_json::to_vec(&self.payload(notification))?;
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, APPLICATION_JSON.to_string())
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            error!("webhook responded with {}", response.status());
            return Err(Error::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}
