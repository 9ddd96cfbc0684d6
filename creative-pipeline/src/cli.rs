///
/// This module implements the CLI for creative-pipeline: argument parsing, wiring of
/// the real transports into the core [`Pipeline`], and the run summary.
///
/// All domain logic (brief handling, hero image resolution, polling) lives in
/// `creative-pipeline-core`; nothing here decides how a campaign is processed.
///
/// ## How To Use
/// - From a shell: `creative-pipeline run --config pipeline.yaml`, or `--help`.
/// - From tests: build a [`Cli`] and call [`run`].
///
/// ## Exit status
/// `run` returns an error, and the binary exits non-zero, when configuration is
/// incomplete or when any discovered brief did not fully succeed.
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use creative_pipeline_core::pipeline::{BriefOutcome, Pipeline, RunReport};

use crate::bannerbear::BannerbearClient;
use crate::fetch::{http_client, HttpFetcher};
use crate::firefly::FireflyClient;
use crate::load_config::load_config;
use crate::storage::S3Store;

/// CLI for creative-pipeline: turn campaign briefs into rendered creative variants.
#[derive(Parser)]
#[clap(
    name = "creative-pipeline",
    version,
    about = "Resolve or generate hero images and render campaign creatives for every brief in a staging folder"
)]
pub struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[clap(long, short, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process every campaign brief in the staging directory
    Run {
        /// Optional YAML settings file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Staging directory to scan, overriding the settings file
        #[clap(long)]
        staging: Option<PathBuf>,
        /// Parent directory for campaign folders, overriding the settings file
        #[clap(long)]
        campaigns_root: Option<PathBuf>,
    },
    /// Verify the rendering-service API key by reading the account
    CheckComposer {
        /// Optional YAML settings file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Async entrypoint shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Run {
            config,
            staging,
            campaigns_root,
        } => {
            let mut settings = load_config(config.as_deref())?;
            if let Some(staging) = staging {
                settings.pipeline.staging_dir = staging;
            }
            if let Some(root) = campaigns_root {
                settings.pipeline.campaigns_root = root;
            }
            settings.pipeline.trace_loaded();

            let http = http_client()?;
            let pipeline = Pipeline::new(
                S3Store::new(&settings.storage),
                FireflyClient::new(http.clone(), &settings.firefly),
                BannerbearClient::new(http.clone(), &settings.bannerbear),
                HttpFetcher::new(http),
                settings.pipeline.clone(),
            );

            tracing::info!(command = "run", "Starting campaign processing");
            let report = pipeline.run_staging().await.with_context(|| {
                format!(
                    "Failed to prepare staging directory {:?}",
                    settings.pipeline.staging_dir
                )
            })?;
            summarize(&report);

            if report.all_succeeded() {
                tracing::info!(command = "run", "All campaigns processed successfully");
                Ok(())
            } else {
                Err(anyhow!(
                    "{} of {} campaign briefs failed",
                    report.failed_count(),
                    report.briefs.len()
                ))
            }
        }
        Commands::CheckComposer { config } => {
            let settings = load_config(config.as_deref())?;
            let client = BannerbearClient::new(http_client()?, &settings.bannerbear);
            let account = client
                .check_account()
                .await
                .context("Bannerbear connection check failed")?;
            tracing::info!(command = "check-composer", ?account, "Rendering service reachable");
            Ok(())
        }
    }
}

fn summarize(report: &RunReport) {
    for brief in &report.briefs {
        let path = brief.brief.display();
        match &brief.outcome {
            BriefOutcome::Completed {
                report,
                archived_to,
            } => {
                let files: usize = report.products.iter().map(|p| p.files.len()).sum();
                tracing::info!(
                    brief = %path,
                    campaign = %report.campaign,
                    products = report.products.len(),
                    files,
                    archived_to = %archived_to.display(),
                    "Campaign succeeded"
                );
            }
            BriefOutcome::Failed { campaign, error } => {
                tracing::error!(brief = %path, campaign = %campaign, error = %error, "Campaign failed");
            }
            BriefOutcome::Invalid(error) => {
                tracing::error!(brief = %path, error = %error, "Brief rejected");
            }
        }
    }
    tracing::info!(
        total = report.briefs.len(),
        succeeded = report.succeeded_count(),
        failed = report.failed_count(),
        "Run summary"
    );
}
