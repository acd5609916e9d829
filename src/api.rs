//! REST client for the dashboard backend.
//!
//! `LeadApi` is the seam the queue talks through; `HttpLeadApi` is the
//! reqwest implementation against the three endpoints the follow-up
//! workflow uses. Tests substitute their own `LeadApi`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::types::{Lead, LeadStatus};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid API URL: {0}")]
    Url(String),
}

/// Server operations the follow-up queue depends on.
#[async_trait]
pub trait LeadApi: Send + Sync {
    /// `GET /files/my-pending`: leads owned by the current agent that
    /// still need a follow-up.
    async fn fetch_my_pending(&self) -> Result<Vec<Lead>, ApiError>;

    /// `PATCH /files/status/:leadId`: set one lead's status.
    async fn update_status(&self, lead_id: &str, status: LeadStatus) -> Result<(), ApiError>;

    /// `POST /archive/forward-to-admin`: batched forward of the given
    /// leads to the admin archive.
    async fn forward_to_admin(&self, lead_ids: &[String]) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// The servers wrap the lead list in an envelope; `leads` may be absent
/// on older deployments, which reads as an empty list.
#[derive(Debug, Deserialize)]
struct PendingLeadsResponse {
    #[serde(default)]
    leads: Vec<Lead>,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: LeadStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ForwardBody<'a> {
    lead_ids: &'a [String],
}

pub struct HttpLeadApi {
    client: reqwest::Client,
    base: String,
    auth_token: Option<String>,
}

impl HttpLeadApi {
    pub fn new(config: &Config, settings: ApiSettings) -> Result<Self, ApiError> {
        let base = config.api_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base).map_err(|e| ApiError::Url(e.to_string()))?;

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base,
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(config, ApiSettings::default())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, format!("{}{}", self.base, path));
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }
        req
    }
}

/// Map non-2xx responses to `ApiError::Status` with the body as message.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl LeadApi for HttpLeadApi {
    async fn fetch_my_pending(&self) -> Result<Vec<Lead>, ApiError> {
        let response = self.request(Method::GET, "/files/my-pending").send().await?;
        let body: PendingLeadsResponse = check(response).await?.json().await?;
        Ok(body.leads)
    }

    async fn update_status(&self, lead_id: &str, status: LeadStatus) -> Result<(), ApiError> {
        let response = self
            .request(Method::PATCH, &format!("/files/status/{}", lead_id))
            .json(&StatusBody { status })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn forward_to_admin(&self, lead_ids: &[String]) -> Result<(), ApiError> {
        let response = self
            .request(Method::POST, "/archive/forward-to-admin")
            .json(&ForwardBody { lead_ids })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
