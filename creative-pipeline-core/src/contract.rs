//! # contract: seams between the pipeline and its remote collaborators
//!
//! Every remote system the pipeline talks to sits behind one async trait here:
//!
//! - [`ObjectStore`]: binary assets by key, plus time-limited retrieval links.
//! - [`ImageGenerator`]: text-to-image generation returning raw bytes.
//! - [`CompositionService`]: submit a composition job and read its status.
//! - [`AssetFetcher`]: stream a URL to a local file.
//!
//! The wire-level data exchanged with those systems lives next to the traits so the
//! transports in the CLI crate and the mocks in tests agree on one shape.
//!
//! ## Mocking & Testing
//! Each trait is annotated for `mockall`; with the `test-export-mocks` feature (on by
//! default) the generated `Mock*` types are exported for integration tests downstream.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{CompositionError, FetchError, GenerationError, StoreError};

/// Remote object store adapter.
///
/// Implementations report transport and permission failures as [`StoreError`] and
/// never retry on their own; callers decide how a failure degrades.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`. Overwriting an existing object is not an error.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError>;

    /// Whether an object exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Mint a fresh retrieval link for `key`, valid for `ttl`.
    async fn presigned_get(&self, key: &str, ttl: Duration) -> Result<String, StoreError>;

    /// Keys under `prefix`, in the store's listing order, at most `max_results` of them.
    async fn list(&self, prefix: &str, max_results: usize) -> Result<Vec<String>, StoreError>;
}

/// Requested output size of a generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Body of a text-to-image generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    pub content_class: String,
    pub size: ImageSize,
    pub visual_intensity: u8,
    #[serde(rename = "promptBiasingLocaleCode")]
    pub locale: String,
}

/// Text-to-image service.
///
/// Implementations authenticate once per process. A failed credential exchange is
/// sticky: every later call reports [`GenerationError::NotAuthenticated`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image and return its bytes, already fetched from the
    /// service's short-lived output link.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError>;
}

/// One named modification of a composition template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Modification {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A composition job: one text overlay and one hero image, rendered into every
/// size of the configured template set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionRequest {
    pub modifications: Vec<Modification>,
}

impl CompositionRequest {
    /// Template layer receiving the campaign message.
    pub const MESSAGE_LAYER: &'static str = "message";
    /// Template layer receiving the hero image.
    pub const HERO_LAYER: &'static str = "hero_image";

    pub fn overlay(message: &str, hero_image_url: &str) -> Self {
        Self {
            modifications: vec![
                Modification {
                    name: Self::MESSAGE_LAYER.to_string(),
                    text: Some(message.to_string()),
                    image_url: None,
                },
                Modification {
                    name: Self::HERO_LAYER.to_string(),
                    text: None,
                    image_url: Some(hero_image_url.to_string()),
                },
            ],
        }
    }
}

/// A rendered image as reported by the status endpoint, before validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VariantPayload {
    #[serde(default)]
    pub image_url_png: Option<String>,
    #[serde(default)]
    pub image_url_jpg: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

/// Status endpoint body: `{status, images: [...], error?}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobSnapshot {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<VariantPayload>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Remote template-rendering service.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CompositionService: Send + Sync {
    /// Submit a job and return its identifier. Any response other than an
    /// acceptance, or an acceptance without an identifier, is an error.
    async fn submit(&self, request: &CompositionRequest) -> Result<String, CompositionError>;

    /// Read the current state of a submitted job.
    async fn status(&self, job_id: &str) -> Result<JobSnapshot, CompositionError>;
}

/// Downloads a URL into a local file, creating parent directories.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Returns the number of bytes written.
    async fn fetch_to_path(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}
