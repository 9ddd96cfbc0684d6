//! # Firefly transport
//!
//! [`FireflyClient`] implements [`ImageGenerator`] against Adobe's IMS token endpoint
//! and the Firefly v2 generate endpoint.
//!
//! The client-credentials exchange happens on the first `generate` call and its
//! outcome is kept for the life of the process: a token is reused, a failure makes
//! every later call return [`GenerationError::NotAuthenticated`].
//!
//! A successful generation only returns a short-lived presigned URL, so the image is
//! downloaded before `generate` returns.

use async_trait::async_trait;
use creative_pipeline_core::contract::{GenerationRequest, ImageGenerator};
use creative_pipeline_core::error::GenerationError;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::load_config::FireflySettings;

pub const DEFAULT_TOKEN_URL: &str = "https://ims-na1.adobelogin.com/ims/token/v3";
pub const DEFAULT_GENERATE_URL: &str = "https://firefly-api.adobe.io/v2/images/generate";
const TOKEN_SCOPE: &str = "openid,AdobeID,firefly_enterprise,ff_apis";

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    outputs: Vec<GeneratedOutput>,
}

#[derive(Deserialize)]
struct GeneratedOutput {
    #[serde(default)]
    image: Option<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    #[serde(default, rename = "presignedUrl")]
    presigned_url: Option<String>,
}

pub struct FireflyClient {
    http: reqwest::Client,
    settings: FireflySettings,
    token: OnceCell<Option<String>>,
}

impl FireflyClient {
    pub fn new(http: reqwest::Client, settings: &FireflySettings) -> Self {
        Self {
            http,
            settings: settings.clone(),
            token: OnceCell::new(),
        }
    }

    /// Exchange client credentials for a bearer token.
    pub async fn fetch_token(&self) -> Result<String, GenerationError> {
        let form = [
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", TOKEN_SCOPE),
        ];
        let resp = self
            .http
            .post(&self.settings.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| GenerationError::Auth(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Failed to get Adobe access token");
            return Err(GenerationError::Auth(format!("{status}: {body}")));
        }

        let parsed: TokenResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Auth(e.to_string()))?;
        match parsed.access_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                info!("Successfully obtained Adobe access token");
                Ok(token)
            }
            None => {
                error!("No access token in response");
                Err(GenerationError::Auth("no access_token in response".into()))
            }
        }
    }

    async fn token(&self) -> Result<&str, GenerationError> {
        let token = self
            .token
            .get_or_init(|| async {
                match self.fetch_token().await {
                    Ok(token) => Some(token),
                    Err(e) => {
                        error!(
                            error = %e,
                            "Adobe authentication failed, image generation disabled for this run"
                        );
                        None
                    }
                }
            })
            .await;
        token.as_deref().ok_or(GenerationError::NotAuthenticated)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, GenerationError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| GenerationError::Download(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            error!(status = %status, "Generated image download failed");
            return Err(GenerationError::Download(format!("status {status}")));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GenerationError::Download(e.to_string()))?;
        info!(size = bytes.len(), "Successfully downloaded generated image");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageGenerator for FireflyClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
        let token = self.token().await?;

        debug!(url = %self.settings.generate_url, "Calling Firefly generate");
        let resp = self
            .http
            .post(&self.settings.generate_url)
            .bearer_auth(token)
            .header("X-Api-Key", &self.settings.client_id)
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = resp.status();
        info!(status = %status, "Firefly API response status");
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Firefly API error");
            return Err(GenerationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        let url = parsed
            .outputs
            .into_iter()
            .next()
            .and_then(|o| o.image)
            .and_then(|i| i.presigned_url)
            .ok_or_else(|| {
                error!("No presignedUrl found in Firefly response");
                GenerationError::MissingOutput
            })?;

        self.download(&url).await
    }
}
