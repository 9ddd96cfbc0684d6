//! Typed failures for every collaborator of the pipeline.
//!
//! Each remote seam in [`crate::contract`] has its own error enum. The product-level
//! [`ProductError`] wraps them, and [`CampaignError`] records which product aborted a
//! campaign. A resolution miss is not an error and has no variant here.

use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by an [`crate::contract::ObjectStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to upload object {key}: {message}")]
    Upload { key: String, message: String },

    #[error("failed to look up object {key}: {message}")]
    Lookup { key: String, message: String },

    #[error("failed to presign retrieval link for {key}: {message}")]
    Presign { key: String, message: String },

    #[error("failed to list objects under {prefix}: {message}")]
    List { prefix: String, message: String },

    #[error("failed to read local asset {path}: {source}")]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the text-to-image service, from auth through the image download.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no access token available for image generation")]
    NotAuthenticated,

    #[error("credential exchange failed: {0}")]
    Auth(String),

    #[error("generation service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("generation response carried no image output")]
    MissingOutput,

    #[error("failed to download generated image: {0}")]
    Download(String),

    #[error("generation request failed: {0}")]
    Transport(String),
}

/// Failures of a composition job, from submission to terminal state.
#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("rendering service rejected submission with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("rendering service accepted the job but returned no job identifier")]
    MissingJobId,

    #[error("rendering service request failed: {0}")]
    Transport(String),

    #[error("composition job failed: {0}")]
    JobFailed(String),

    #[error("composition job completed without any usable variant")]
    NoUsableVariants,

    #[error("composition job did not finish within {budget_secs}s")]
    TimedOut { budget_secs: u64 },
}

/// Failures while downloading a rendered asset to disk.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download of {url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("download of {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Brief validation failures. A brief that fails here is skipped; other briefs continue.
#[derive(Debug, Error)]
pub enum BriefError {
    #[error("failed to read brief {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("brief is not valid JSON or misses a required field: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("brief must contain at least 2 products, found {0}")]
    TooFewProducts(usize),

    #[error("product {0:?} appears more than once")]
    DuplicateProduct(String),

    #[error("invalid file format {0:?}, expected one of PNG, JPEG, JPG")]
    InvalidFileFormat(String),

    #[error("campaign name {0:?} has no filesystem-safe characters")]
    UnusableCampaignName(String),

    #[error("product name {0:?} has no filesystem-safe characters")]
    UnusableProductName(String),

    #[error("hero_image {0:?} must be a bare file name")]
    HeroImageNotAFileName(String),
}

/// A failure that stops one product, and with it the rest of its campaign.
#[derive(Debug, Error)]
pub enum ProductError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Composition(#[from] CompositionError),

    #[error("failed to create output folder {path}: {source}")]
    OutputFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("none of the {attempted} rendered variants could be downloaded")]
    NothingDownloaded { attempted: usize },
}

/// Why a campaign did not complete.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("failed to prepare campaign folders: {0}")]
    Folders(#[source] std::io::Error),

    #[error("product {product} failed: {source}")]
    Product {
        product: String,
        #[source]
        source: ProductError,
    },

    #[error("failed to archive brief: {0}")]
    Archive(#[source] std::io::Error),
}
