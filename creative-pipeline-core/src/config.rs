use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::compose::PollPolicy;

/// Non-secret knobs of a pipeline run. Built once at startup and handed to
/// [`crate::pipeline::Pipeline`]; nothing here is read from process-wide state.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Inbox scanned for briefs and loose assets.
    pub staging_dir: PathBuf,
    /// Parent of every `<campaign>/{input,output}` working directory.
    pub campaigns_root: PathBuf,
    /// Lifetime of every retrieval link minted for a composition job.
    pub link_ttl: Duration,
    /// How many keys to ask for when looking up previously generated assets.
    pub generated_lookup_limit: usize,
    pub polling: PollPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("START"),
            campaigns_root: PathBuf::from("."),
            link_ttl: Duration::from_secs(3600),
            generated_lookup_limit: 10,
            polling: PollPolicy::default(),
        }
    }
}

impl PipelineOptions {
    pub fn trace_loaded(&self) {
        info!(
            staging_dir = %self.staging_dir.display(),
            campaigns_root = %self.campaigns_root.display(),
            link_ttl_secs = self.link_ttl.as_secs(),
            poll_budget_secs = self.polling.budget.as_secs(),
            "Loaded pipeline options"
        );
        debug!(?self, "Pipeline options (full debug)");
    }
}
