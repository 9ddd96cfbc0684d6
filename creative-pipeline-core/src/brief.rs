//! Campaign brief parsing, validation and normalization.
//!
//! A brief is a JSON document dropped into the staging directory. It is read once,
//! validated, normalized into a [`CampaignBrief`] and never mutated afterwards.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::{error, info};

use crate::error::BriefError;
use crate::naming::clean_name;

/// Sentinel used in briefs (and logs) for convention-based hero image lookup.
pub const AUTO_HERO_IMAGE: &str = "auto";

/// Output format requested for the rendered variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Png,
    Jpeg,
}

impl FileFormat {
    /// Extension used on disk for this format.
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Png => "png",
            FileFormat::Jpeg => "jpg",
        }
    }
}

impl FromStr for FileFormat {
    type Err = BriefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PNG" => Ok(FileFormat::Png),
            "JPEG" | "JPG" => Ok(FileFormat::Jpeg),
            _ => Err(BriefError::InvalidFileFormat(s.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Png => f.write_str("PNG"),
            FileFormat::Jpeg => f.write_str("JPEG"),
        }
    }
}

/// Where the hero image should come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeroImageSpec {
    /// Resolve by the `{campaign}_{product}_hero.<ext>` convention and remote lookups.
    Auto,
    /// A concrete filename named by the brief.
    Named(String),
}

impl HeroImageSpec {
    pub fn filename(&self) -> Option<&str> {
        match self {
            HeroImageSpec::Auto => None,
            HeroImageSpec::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for HeroImageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeroImageSpec::Auto => f.write_str(AUTO_HERO_IMAGE),
            HeroImageSpec::Named(name) => f.write_str(name),
        }
    }
}

/// A validated, normalized campaign brief.
#[derive(Debug, Clone)]
pub struct CampaignBrief {
    pub campaign: String,
    pub campaign_clean: String,
    pub target_region: String,
    pub target_audience: String,
    /// Filesystem-safe product names, in brief order.
    pub products: Vec<String>,
    pub campaign_message: String,
    pub file_format: FileFormat,
    pub hero_image: HeroImageSpec,
}

#[derive(Debug, Deserialize)]
struct RawBrief {
    campaign: String,
    target_region: String,
    target_audience: String,
    product: Vec<String>,
    campaign_message: String,
    file_format: String,
    #[serde(default)]
    hero_image: Option<String>,
}

impl CampaignBrief {
    /// Region code usable as a locale bias, if the brief names one.
    pub fn region(&self) -> Option<&str> {
        let region = self.target_region.trim();
        (!region.is_empty()).then_some(region)
    }
}

impl FromStr for CampaignBrief {
    type Err = BriefError;

    fn from_str(json: &str) -> Result<Self, Self::Err> {
        let raw: RawBrief = serde_json::from_str(json)?;
        normalize(raw)
    }
}

fn normalize(raw: RawBrief) -> Result<CampaignBrief, BriefError> {
    if raw.product.len() < 2 {
        return Err(BriefError::TooFewProducts(raw.product.len()));
    }

    let file_format: FileFormat = raw.file_format.parse()?;

    let campaign_clean = clean_name(&raw.campaign);
    if campaign_clean.is_empty() {
        return Err(BriefError::UnusableCampaignName(raw.campaign));
    }

    let mut seen = HashSet::new();
    let mut products = Vec::with_capacity(raw.product.len());
    for product in &raw.product {
        let clean = clean_name(product);
        if clean.is_empty() {
            return Err(BriefError::UnusableProductName(product.clone()));
        }
        if !seen.insert(clean.clone()) {
            return Err(BriefError::DuplicateProduct(clean));
        }
        products.push(clean);
    }

    let hero_image = match raw.hero_image.as_deref().map(str::trim) {
        None | Some("") | Some(AUTO_HERO_IMAGE) => {
            info!("No hero_image specified, using campaign_product_hero naming convention");
            HeroImageSpec::Auto
        }
        Some(name) if is_bare_file_name(name) => HeroImageSpec::Named(name.to_string()),
        Some(name) => return Err(BriefError::HeroImageNotAFileName(name.to_string())),
    };

    Ok(CampaignBrief {
        campaign: raw.campaign,
        campaign_clean,
        target_region: raw.target_region,
        target_audience: raw.target_audience,
        products,
        campaign_message: raw.campaign_message,
        file_format,
        hero_image,
    })
}

/// A single path component naming a file: no directories, no root, no `..`.
fn is_bare_file_name(name: &str) -> bool {
    Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

/// Read and validate a brief file.
pub fn load_brief(path: &Path) -> Result<CampaignBrief, BriefError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        error!(path = %path.display(), error = ?source, "Failed to read campaign brief");
        BriefError::Read {
            path: path.to_path_buf(),
            source,
        }
    })?;
    match content.parse::<CampaignBrief>() {
        Ok(brief) => {
            info!(
                path = %path.display(),
                campaign = %brief.campaign,
                products = brief.products.len(),
                "Campaign brief processed successfully"
            );
            Ok(brief)
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Campaign brief failed validation");
            Err(e)
        }
    }
}
