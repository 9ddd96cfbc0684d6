//! Remote composition jobs: submit, poll until a terminal state, validate the
//! rendered variants and choose which URL to download for each.
//!
//! Polling follows an escalating [`BackoffSchedule`] while the job reports
//! `pending` or `processing`. Unrecognized statuses and transport errors wait the
//! schedule's fallback interval without advancing it. The whole wait is bounded by
//! [`PollPolicy::budget`]; the budget is checked before each poll.

use std::fmt;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use crate::brief::FileFormat;
use crate::contract::{CompositionRequest, CompositionService, VariantPayload};
use crate::error::CompositionError;

/// Ordered waits between status polls, plus the wait used off-schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    intervals: Vec<Duration>,
    fallback: Duration,
}

impl BackoffSchedule {
    pub fn new(intervals: Vec<Duration>, fallback: Duration) -> Self {
        Self {
            intervals,
            fallback,
        }
    }

    pub fn from_secs(intervals: &[u64], fallback: u64) -> Self {
        Self::new(
            intervals.iter().copied().map(Duration::from_secs).collect(),
            Duration::from_secs(fallback),
        )
    }

    /// Wait after the `step`-th in-progress observation (0-based). Steps past the
    /// end of the schedule reuse its last interval.
    pub fn interval(&self, step: usize) -> Duration {
        self.intervals
            .get(step)
            .or_else(|| self.intervals.last())
            .copied()
            .unwrap_or(self.fallback)
    }

    pub fn intervals(&self) -> &[Duration] {
        &self.intervals
    }

    /// Wait after an unrecognized status or a failed poll.
    pub fn fallback(&self) -> Duration {
        self.fallback
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::from_secs(&[3, 5, 5, 10, 10, 15, 15], 10)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub schedule: BackoffSchedule,
    /// Wall-clock budget for the whole wait.
    pub budget: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            schedule: BackoffSchedule::default(),
            budget: Duration::from_secs(120),
        }
    }
}

/// Job status as reported by the rendering service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Unknown(String),
}

impl JobStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("pending") => JobStatus::Pending,
            Some("processing") => JobStatus::Processing,
            Some("completed") => JobStatus::Completed,
            Some("failed") => JobStatus::Failed,
            Some(other) => JobStatus::Unknown(other.to_string()),
            None => JobStatus::Unknown(String::new()),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => f.write_str("pending"),
            JobStatus::Processing => f.write_str("processing"),
            JobStatus::Completed => f.write_str("completed"),
            JobStatus::Failed => f.write_str("failed"),
            JobStatus::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

/// One rendered output of a completed job. Always carries at least one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedVariant {
    pub width: u32,
    pub height: u32,
    pub png_url: Option<String>,
    pub jpg_url: Option<String>,
}

impl RenderedVariant {
    /// Validate a raw payload: width, height and at least one non-empty URL.
    pub fn from_payload(payload: &VariantPayload) -> Option<Self> {
        let non_empty = |url: &Option<String>| url.clone().filter(|u| !u.trim().is_empty());
        let png_url = non_empty(&payload.image_url_png);
        let jpg_url = non_empty(&payload.image_url_jpg);
        match (payload.width, payload.height) {
            (Some(width), Some(height)) if png_url.is_some() || jpg_url.is_some() => Some(Self {
                width,
                height,
                png_url,
                jpg_url,
            }),
            _ => None,
        }
    }

    /// URL and extension to download for `format`: the requested format if present,
    /// otherwise PNG, then JPG.
    pub fn select(&self, format: FileFormat) -> Option<(&str, &'static str)> {
        let png = self.png_url.as_deref().map(|u| (u, "png"));
        let jpg = self.jpg_url.as_deref().map(|u| (u, "jpg"));
        let requested = match format {
            FileFormat::Png => png,
            FileFormat::Jpeg => jpg,
        };
        requested.or(png).or(jpg)
    }
}

/// Keep the valid variants, warning about each dropped one.
pub fn usable_variants(images: &[VariantPayload]) -> Vec<RenderedVariant> {
    images
        .iter()
        .filter_map(|payload| {
            let variant = RenderedVariant::from_payload(payload);
            match &variant {
                Some(v) => info!(
                    width = v.width,
                    height = v.height,
                    png = v.png_url.is_some(),
                    jpg = v.jpg_url.is_some(),
                    "[COMPOSE] Found completed image"
                ),
                None => warn!(?payload, "[COMPOSE] Image missing required data, dropping it"),
            }
            variant
        })
        .collect()
}

/// Poll `job_id` until it completes, fails or the budget runs out.
pub async fn await_completion<C>(
    service: &C,
    job_id: &str,
    policy: &PollPolicy,
) -> Result<Vec<RenderedVariant>, CompositionError>
where
    C: CompositionService + ?Sized,
{
    let started = Instant::now();
    let mut step = 0usize;
    let mut polls = 0u32;

    info!(job_id, budget_secs = policy.budget.as_secs(), "[COMPOSE] Polling for job completion");

    while started.elapsed() < policy.budget {
        let snapshot = match service.status(job_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let wait = policy.schedule.fallback();
                warn!(
                    job_id,
                    error = %e,
                    wait_secs = wait.as_secs(),
                    "[COMPOSE] Error polling job status"
                );
                sleep(wait).await;
                continue;
            }
        };
        polls += 1;

        let status = JobStatus::parse(snapshot.status.as_deref());
        info!(
            job_id,
            poll = polls,
            elapsed_secs = started.elapsed().as_secs(),
            %status,
            "[COMPOSE] Job status"
        );

        match status {
            JobStatus::Completed => {
                let images = snapshot.images.unwrap_or_default();
                let variants = usable_variants(&images);
                if variants.is_empty() {
                    error!(
                        job_id,
                        reported = images.len(),
                        "[COMPOSE] Job completed but no valid image data found"
                    );
                    return Err(CompositionError::NoUsableVariants);
                }
                info!(job_id, variants = variants.len(), "[COMPOSE] Job completed");
                return Ok(variants);
            }
            JobStatus::Failed => {
                let message = snapshot
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string());
                error!(job_id, error = %message, "[COMPOSE] Job failed remotely");
                return Err(CompositionError::JobFailed(message));
            }
            JobStatus::Pending | JobStatus::Processing => {
                let wait = policy.schedule.interval(step);
                step += 1;
                info!(job_id, wait_secs = wait.as_secs(), "[COMPOSE] Job still {status}, waiting");
                sleep(wait).await;
            }
            JobStatus::Unknown(_) => {
                let wait = policy.schedule.fallback();
                warn!(job_id, %status, wait_secs = wait.as_secs(), "[COMPOSE] Unknown job status");
                sleep(wait).await;
            }
        }
    }

    error!(job_id, budget_secs = policy.budget.as_secs(), "[COMPOSE] Job timed out");
    Err(CompositionError::TimedOut {
        budget_secs: policy.budget.as_secs(),
    })
}

/// Submit one job and wait for its variants.
pub async fn run_composition_job<C>(
    service: &C,
    request: &CompositionRequest,
    policy: &PollPolicy,
) -> Result<Vec<RenderedVariant>, CompositionError>
where
    C: CompositionService + ?Sized,
{
    let job_id = service.submit(request).await.map_err(|e| {
        error!(error = %e, "[COMPOSE] Job submission failed");
        e
    })?;
    info!(job_id = %job_id, "[COMPOSE] Job submitted");
    await_completion(service, &job_id, policy).await
}
