//! # Bannerbear transport
//!
//! [`BannerbearClient`] implements [`CompositionService`] with the collections API:
//! `POST /v2/collections` renders one template set, `GET /v2/collections/{uid}`
//! reports its progress. It also exposes the account check used by the
//! `check-composer` subcommand.

use async_trait::async_trait;
use creative_pipeline_core::contract::{
    CompositionRequest, CompositionService, JobSnapshot, Modification,
};
use creative_pipeline_core::error::CompositionError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::load_config::BannerbearSettings;

pub const DEFAULT_BANNERBEAR_BASE_URL: &str = "https://api.bannerbear.com";

#[derive(Serialize)]
struct CollectionBody<'a> {
    template_set: &'a str,
    modifications: &'a [Modification],
}

#[derive(Deserialize)]
struct CollectionCreated {
    #[serde(default)]
    uid: Option<String>,
}

/// `GET /v2/account`, reduced to what the connectivity check reports.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub plan_name: Option<String>,
}

pub struct BannerbearClient {
    http: reqwest::Client,
    settings: BannerbearSettings,
}

impl BannerbearClient {
    pub fn new(http: reqwest::Client, settings: &BannerbearSettings) -> Self {
        Self {
            http,
            settings: settings.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url.trim_end_matches('/'))
    }

    /// Verify the API key by reading the account. Any non-200 answer is an error.
    pub async fn check_account(&self) -> Result<AccountInfo, CompositionError> {
        let resp = self
            .http
            .get(self.url("/v2/account"))
            .bearer_auth(&self.settings.api_key)
            .send()
            .await
            .map_err(|e| CompositionError::Transport(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Bannerbear connection failed");
            return Err(CompositionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let account: AccountInfo = resp
            .json()
            .await
            .map_err(|e| CompositionError::Transport(e.to_string()))?;
        info!(
            account = account.name.as_deref().unwrap_or("Unknown"),
            plan = account.plan_name.as_deref().unwrap_or("Unknown"),
            "Bannerbear connection successful"
        );
        Ok(account)
    }
}

#[async_trait]
impl CompositionService for BannerbearClient {
    async fn submit(&self, request: &CompositionRequest) -> Result<String, CompositionError> {
        let body = CollectionBody {
            template_set: &self.settings.collection_id,
            modifications: &request.modifications,
        };
        let resp = self
            .http
            .post(self.url("/v2/collections"))
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Bannerbear collection request failed");
                CompositionError::Transport(e.to_string())
            })?;

        let status = resp.status();
        if status != StatusCode::CREATED && status != StatusCode::ACCEPTED {
            let body = resp.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Bannerbear collection API error");
            return Err(CompositionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created: CollectionCreated = resp
            .json()
            .await
            .map_err(|e| CompositionError::Transport(e.to_string()))?;
        match created.uid.filter(|uid| !uid.is_empty()) {
            Some(uid) => {
                info!(uid = %uid, "Bannerbear collection created");
                Ok(uid)
            }
            None => {
                error!("No collection UID in Bannerbear response");
                Err(CompositionError::MissingJobId)
            }
        }
    }

    async fn status(&self, job_id: &str) -> Result<JobSnapshot, CompositionError> {
        let resp = self
            .http
            .get(self.url(&format!("/v2/collections/{job_id}")))
            .bearer_auth(&self.settings.api_key)
            .send()
            .await
            .map_err(|e| CompositionError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(status = %status, body = %body, "Bannerbear status request failed");
            return Err(CompositionError::Transport(format!("status {status}: {body}")));
        }

        resp.json()
            .await
            .map_err(|e| CompositionError::Transport(e.to_string()))
    }
}
