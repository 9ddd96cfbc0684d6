//! High-level pipeline: brief → hero image → composition job → downloaded variants.
//!
//! [`Pipeline`] owns one implementation of every collaborator in
//! [`crate::contract`] plus the run's [`PipelineOptions`], and drives them one
//! product at a time:
//!   - Resolve a hero image via [`HeroImageResolver`], generating one on a miss
//!   - Submit a composition job overlaying the campaign message on the hero image
//!   - Poll the job to completion and download each usable variant
//!
//! # Failure semantics
//! - A product fails when generation, submission, polling or every download fails.
//! - The first failing product stops its campaign. Files already downloaded for
//!   earlier products stay on disk.
//! - A failed campaign keeps its brief in staging so the next run retries it; a
//!   successful one archives it into the campaign's `input/` folder.
//! - An invalid brief is reported and skipped; other briefs still run.
//!
//! # Navigation
//! - Whole staging directory: [`Pipeline::run_staging`]
//! - One brief file: [`Pipeline::process_brief_file`]
//! - One parsed brief: [`Pipeline::process_campaign`]

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::brief::{load_brief, CampaignBrief};
use crate::compose::run_composition_job;
use crate::config::PipelineOptions;
use crate::contract::{
    AssetFetcher, CompositionRequest, CompositionService, ImageGenerator, ObjectStore,
};
use crate::error::{BriefError, CampaignError, ProductError};
use crate::folders::{archive_brief, setup_campaign_folders, CampaignLayout};
use crate::generate::generate_hero_image;
use crate::naming::output_filename;
use crate::resolver::{AssetProvenance, HeroImageResolver, HeroLookup};

/// What one product produced.
#[derive(Debug, Clone)]
pub struct ProductReport {
    pub product: String,
    pub provenance: AssetProvenance,
    pub files: Vec<PathBuf>,
}

/// A campaign whose every product completed.
#[derive(Debug, Clone)]
pub struct CampaignReport {
    pub campaign: String,
    pub layout: CampaignLayout,
    pub products: Vec<ProductReport>,
}

#[derive(Debug)]
pub enum BriefOutcome {
    Completed {
        report: CampaignReport,
        archived_to: PathBuf,
    },
    Invalid(BriefError),
    Failed {
        campaign: String,
        error: CampaignError,
    },
}

#[derive(Debug)]
pub struct BriefReport {
    pub brief: PathBuf,
    pub outcome: BriefOutcome,
}

impl BriefReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, BriefOutcome::Completed { .. })
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub briefs: Vec<BriefReport>,
}

impl RunReport {
    /// True when every discovered brief completed. An empty run counts as success.
    pub fn all_succeeded(&self) -> bool {
        self.briefs.iter().all(BriefReport::succeeded)
    }

    pub fn succeeded_count(&self) -> usize {
        self.briefs.iter().filter(|b| b.succeeded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.briefs.len() - self.succeeded_count()
    }
}

pub struct Pipeline<S, G, C, F> {
    store: S,
    generator: G,
    composer: C,
    fetcher: F,
    options: PipelineOptions,
}

impl<S, G, C, F> Pipeline<S, G, C, F>
where
    S: ObjectStore,
    G: ImageGenerator,
    C: CompositionService,
    F: AssetFetcher,
{
    pub fn new(store: S, generator: G, composer: C, fetcher: F, options: PipelineOptions) -> Self {
        Self {
            store,
            generator,
            composer,
            fetcher,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Process every `*.json` brief in the staging directory, in file-name order.
    ///
    /// A missing staging directory is created and the run ends with nothing to do.
    pub async fn run_staging(&self) -> std::io::Result<RunReport> {
        let staging = &self.options.staging_dir;
        info!(staging = %staging.display(), "[RUN] Starting creative automation pipeline");

        if !staging.is_dir() {
            std::fs::create_dir_all(staging)?;
            warn!(
                staging = %staging.display(),
                "[RUN] Staging directory created. Place campaign brief JSON files there and run again"
            );
            return Ok(RunReport::default());
        }

        let briefs = discover_briefs(staging)?;
        if briefs.is_empty() {
            warn!(staging = %staging.display(), "[RUN] No campaign brief files found");
            return Ok(RunReport::default());
        }
        info!(count = briefs.len(), "[RUN] Found campaign briefs");

        let mut report = RunReport::default();
        for path in briefs {
            let outcome = self.process_brief_file(&path).await;
            report.briefs.push(BriefReport {
                brief: path,
                outcome,
            });
        }

        info!(
            succeeded = report.succeeded_count(),
            failed = report.failed_count(),
            "[RUN] Pipeline finished"
        );
        Ok(report)
    }

    /// Load, process and (on success) archive one brief file.
    pub async fn process_brief_file(&self, path: &Path) -> BriefOutcome {
        info!(brief = %path.display(), "[RUN] Processing campaign brief");
        let brief = match load_brief(path) {
            Ok(brief) => brief,
            Err(e) => {
                error!(brief = %path.display(), error = %e, "[RUN] Invalid campaign brief, skipping");
                return BriefOutcome::Invalid(e);
            }
        };

        let report = match self.process_campaign(&brief).await {
            Ok(report) => report,
            Err(error) => {
                error!(
                    campaign = %brief.campaign,
                    error = %error,
                    "[RUN] Campaign failed, brief kept in staging for retry"
                );
                return BriefOutcome::Failed {
                    campaign: brief.campaign,
                    error,
                };
            }
        };

        match archive_brief(&report.layout, path) {
            Ok(archived_to) => {
                info!(campaign = %brief.campaign, "[RUN] Campaign completed successfully");
                BriefOutcome::Completed {
                    report,
                    archived_to,
                }
            }
            Err(e) => {
                error!(campaign = %brief.campaign, error = ?e, "[RUN] Could not archive brief");
                BriefOutcome::Failed {
                    campaign: brief.campaign,
                    error: CampaignError::Archive(e),
                }
            }
        }
    }

    /// Set up folders then process every product in order, stopping at the first failure.
    pub async fn process_campaign(
        &self,
        brief: &CampaignBrief,
    ) -> Result<CampaignReport, CampaignError> {
        info!(
            campaign = %brief.campaign,
            products = ?brief.products,
            format = %brief.file_format,
            hero_image = %brief.hero_image,
            "[CAMPAIGN] Starting campaign"
        );

        let layout = setup_campaign_folders(
            &self.options.campaigns_root,
            &self.options.staging_dir,
            brief,
        )
        .map_err(|e| {
            error!(campaign = %brief.campaign, error = ?e, "[CAMPAIGN] Folder setup failed");
            CampaignError::Folders(e)
        })?;

        let mut products = Vec::with_capacity(brief.products.len());
        for (index, product) in brief.products.iter().enumerate() {
            info!(
                product = %product,
                position = index + 1,
                total = brief.products.len(),
                "[CAMPAIGN] Processing product"
            );
            match self.process_product(brief, &layout, product).await {
                Ok(report) => products.push(report),
                Err(source) => {
                    error!(product = %product, error = %source, "[CAMPAIGN] Product failed, stopping campaign");
                    return Err(CampaignError::Product {
                        product: product.clone(),
                        source,
                    });
                }
            }
        }

        Ok(CampaignReport {
            campaign: brief.campaign.clone(),
            layout,
            products,
        })
    }

    /// Resolve or generate the hero image, compose, and download the variants.
    pub async fn process_product(
        &self,
        brief: &CampaignBrief,
        layout: &CampaignLayout,
        product: &str,
    ) -> Result<ProductReport, ProductError> {
        let campaign = brief.campaign_clean.as_str();
        let input_dir = layout.input_dir();
        let lookup = HeroLookup {
            campaign,
            product,
            hero_image: &brief.hero_image,
            input_dir: &input_dir,
        };
        let resolver = HeroImageResolver::new(
            &self.store,
            &self.options.staging_dir,
            self.options.link_ttl,
            self.options.generated_lookup_limit,
        );

        let hero = match resolver.resolve(&lookup).await {
            Some(asset) => asset,
            None => {
                generate_hero_image(
                    &self.generator,
                    &self.store,
                    campaign,
                    product,
                    brief.region(),
                    self.options.link_ttl,
                )
                .await?
            }
        };
        info!(product, key = %hero.key, provenance = %hero.provenance, "[PRODUCT] Hero image ready");

        let request = CompositionRequest::overlay(&brief.campaign_message, &hero.url);
        let variants = run_composition_job(&self.composer, &request, &self.options.polling).await?;

        let out_dir = layout
            .create_product_output_dir(product)
            .map_err(|source| ProductError::OutputFolder {
                path: layout.product_output_dir(product),
                source,
            })?;

        let requested = brief.file_format.extension();
        let mut files = Vec::new();
        for variant in &variants {
            let Some((url, ext)) = variant.select(brief.file_format) else {
                warn!(width = variant.width, height = variant.height, "[PRODUCT] No downloadable URL, skipping variant");
                continue;
            };
            if ext != requested {
                info!(requested, used = ext, "[PRODUCT] Requested format unavailable, using fallback");
            }
            let dest = out_dir.join(output_filename(
                variant.width,
                variant.height,
                campaign,
                product,
                ext,
            ));
            match self.fetcher.fetch_to_path(url, &dest).await {
                Ok(bytes) => {
                    info!(file = %dest.display(), bytes, "[PRODUCT] Downloaded variant");
                    files.push(dest);
                }
                Err(e) => warn!(file = %dest.display(), error = %e, "[PRODUCT] Variant download failed"),
            }
        }

        if files.is_empty() {
            error!(product, attempted = variants.len(), "[PRODUCT] No variants downloaded");
            return Err(ProductError::NothingDownloaded {
                attempted: variants.len(),
            });
        }
        info!(product, downloaded = files.len(), total = variants.len(), "[PRODUCT] Product completed");

        Ok(ProductReport {
            product: product.to_string(),
            provenance: hero.provenance,
            files,
        })
    }
}

/// `*.json` files directly inside `staging`, sorted by file name.
pub fn discover_briefs(staging: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut briefs = Vec::new();
    for entry in std::fs::read_dir(staging)? {
        let path = entry?.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json && path.is_file() {
            briefs.push(path);
        }
    }
    briefs.sort();
    Ok(briefs)
}
