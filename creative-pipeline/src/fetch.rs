//! Streaming downloads of rendered variants, plus the shared HTTP client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use creative_pipeline_core::contract::AssetFetcher;
use creative_pipeline_core::error::FetchError;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

/// One client for every transport in the run.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")
}

pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch_to_path(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };
        let io = |source: std::io::Error| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        };

        let resp = self.http.get(url).send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            error!(url, status = %status, "Download failed");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io)?;
        }
        let partial = partial_path(dest);
        let written = match write_body(resp, &partial).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                error!(
                    url,
                    dest = %dest.display(),
                    error = %e,
                    "Download interrupted, partial file removed"
                );
                return Err(match e {
                    BodyError::Stream(e) => transport(e),
                    BodyError::Io(e) => io(e),
                });
            }
        };
        tokio::fs::rename(&partial, dest).await.map_err(io)?;

        debug!(url, dest = %dest.display(), bytes = written, "Downloaded asset");
        Ok(written)
    }
}

enum BodyError {
    Stream(reqwest::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for BodyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodyError::Stream(e) => e.fmt(f),
            BodyError::Io(e) => e.fmt(f),
        }
    }
}

/// Sibling of `dest` that holds the body until it is complete.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn write_body(resp: reqwest::Response, path: &Path) -> Result<u64, BodyError> {
    let mut file = tokio::fs::File::create(path).await.map_err(BodyError::Io)?;
    let mut written = 0u64;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(BodyError::Stream)?;
        file.write_all(&chunk).await.map_err(BodyError::Io)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(BodyError::Io)?;
    Ok(written)
}
