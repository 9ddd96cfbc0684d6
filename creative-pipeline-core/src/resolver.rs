//! Hero image resolution: find an existing hero image for a product before
//! falling back to generation.
//!
//! Search order, first success wins:
//! 1. `{campaign}_{product}_hero.<ext>` in the staging directory (as given, all
//!    lowercase, then with a capital `Hero`), uploaded to `assets/<filename>`.
//! 2. The brief's concrete `hero_image` filename in the campaign `input/` folder,
//!    uploaded to `assets/<filename>`.
//! 3. An object already stored at `assets/<filename>`, linked without re-upload.
//! 4. The first object listed under `generated/{campaign}_{product}_`.
//!
//! Any failure inside a step is logged and the search moves on to the next step.
//! Falling through all four is a miss (`None`), which the caller answers by generating.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::brief::HeroImageSpec;
use crate::contract::ObjectStore;
use crate::error::StoreError;
use crate::naming::{
    asset_key, content_type_for, generated_prefix, lowercase_extension, HERO_IMAGE_EXTENSIONS,
};

/// How a hero image was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetProvenance {
    NamingConvention,
    ExactFilename,
    ExistingRemote,
    PreviouslyGenerated,
    FreshlyGenerated,
}

impl fmt::Display for AssetProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AssetProvenance::NamingConvention => "naming-convention",
            AssetProvenance::ExactFilename => "exact-filename",
            AssetProvenance::ExistingRemote => "existing-remote",
            AssetProvenance::PreviouslyGenerated => "previously-generated",
            AssetProvenance::FreshlyGenerated => "freshly-generated",
        };
        f.write_str(label)
    }
}

/// A hero image ready to hand to the rendering service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub key: String,
    /// Time-limited retrieval link, minted for this use only.
    pub url: String,
    pub provenance: AssetProvenance,
}

/// Everything the resolver needs to know about one product.
#[derive(Debug, Clone, Copy)]
pub struct HeroLookup<'a> {
    pub campaign: &'a str,
    pub product: &'a str,
    pub hero_image: &'a HeroImageSpec,
    /// The campaign's `input/` folder, checked for an exact filename.
    pub input_dir: &'a Path,
}

pub struct HeroImageResolver<'a, S> {
    store: &'a S,
    staging_dir: &'a Path,
    link_ttl: Duration,
    generated_lookup_limit: usize,
}

impl<'a, S: ObjectStore> HeroImageResolver<'a, S> {
    pub fn new(
        store: &'a S,
        staging_dir: &'a Path,
        link_ttl: Duration,
        generated_lookup_limit: usize,
    ) -> Self {
        Self {
            store,
            staging_dir,
            link_ttl,
            generated_lookup_limit,
        }
    }

    pub async fn resolve(&self, lookup: &HeroLookup<'_>) -> Option<ResolvedAsset> {
        let HeroLookup {
            campaign, product, ..
        } = *lookup;

        if let Some(path) = find_by_naming_convention(self.staging_dir, campaign, product) {
            if let Some(asset) = self
                .upload_local(&path, AssetProvenance::NamingConvention)
                .await
            {
                return Some(asset);
            }
        }

        if let Some(filename) = lookup.hero_image.filename() {
            let exact = lookup.input_dir.join(filename);
            if exact.is_file() {
                info!(path = %exact.display(), "[RESOLVE] Found hero image with exact filename");
                if let Some(asset) = self
                    .upload_local(&exact, AssetProvenance::ExactFilename)
                    .await
                {
                    return Some(asset);
                }
            } else {
                debug!(path = %exact.display(), "[RESOLVE] Exact hero filename not present locally");
            }

            if let Some(asset) = self.existing_remote(filename).await {
                return Some(asset);
            }
        }

        if let Some(asset) = self.previously_generated(campaign, product).await {
            return Some(asset);
        }

        warn!(
            campaign,
            product, "[RESOLVE] Hero image not found by any method, generation required"
        );
        None
    }

    async fn upload_local(
        &self,
        path: &Path,
        provenance: AssetProvenance,
    ) -> Option<ResolvedAsset> {
        let filename = path.file_name()?.to_string_lossy().into_owned();
        let key = asset_key(&filename);
        match self.upload_and_link(path, &key).await {
            Ok(url) => {
                info!(key = %key, %provenance, "[RESOLVE] Uploaded local hero image");
                Some(ResolvedAsset {
                    key,
                    url,
                    provenance,
                })
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "[RESOLVE] Local hero image upload failed, trying next source"
                );
                None
            }
        }
    }

    async fn upload_and_link(&self, path: &Path, key: &str) -> Result<String, StoreError> {
        let body = tokio::fs::read(path)
            .await
            .map_err(|source| StoreError::LocalRead {
                path: path.to_path_buf(),
                source,
            })?;
        self.store.put(key, body, content_type_for(path)).await?;
        self.store.presigned_get(key, self.link_ttl).await
    }

    async fn existing_remote(&self, filename: &str) -> Option<ResolvedAsset> {
        let key = asset_key(filename);
        match self.store.exists(&key).await {
            Ok(true) => {
                info!(key = %key, "[RESOLVE] Asset already exists in remote store");
                self.link(key, AssetProvenance::ExistingRemote).await
            }
            Ok(false) => {
                debug!(key = %key, "[RESOLVE] No remote object for named hero image");
                None
            }
            Err(e) => {
                warn!(
                    key = %key,
                    error = %e,
                    "[RESOLVE] Remote existence check failed, trying next source"
                );
                None
            }
        }
    }

    async fn previously_generated(&self, campaign: &str, product: &str) -> Option<ResolvedAsset> {
        let prefix = generated_prefix(campaign, product);
        match self.store.list(&prefix, self.generated_lookup_limit).await {
            Ok(keys) => match keys.into_iter().next() {
                Some(key) => {
                    info!(key = %key, "[RESOLVE] Found previously generated asset");
                    self.link(key, AssetProvenance::PreviouslyGenerated).await
                }
                None => {
                    debug!(prefix = %prefix, "[RESOLVE] No previously generated assets");
                    None
                }
            },
            Err(e) => {
                warn!(prefix = %prefix, error = %e, "[RESOLVE] Listing generated assets failed");
                None
            }
        }
    }

    async fn link(&self, key: String, provenance: AssetProvenance) -> Option<ResolvedAsset> {
        match self.store.presigned_get(&key, self.link_ttl).await {
            Ok(url) => Some(ResolvedAsset {
                key,
                url,
                provenance,
            }),
            Err(e) => {
                warn!(key = %key, error = %e, "[RESOLVE] Could not mint retrieval link");
                None
            }
        }
    }
}

/// Filename stems tried in order: as given, all lowercase, capitalized `Hero`.
pub fn convention_stems(campaign: &str, product: &str) -> [String; 3] {
    [
        format!("{campaign}_{product}_hero"),
        format!(
            "{}_{}_hero",
            campaign.to_lowercase(),
            product.to_lowercase()
        ),
        format!("{campaign}_{product}_Hero"),
    ]
}

/// Scan `dir` for a hero image named by convention. Stems are tried in priority
/// order; within one stem, the first match in directory enumeration order wins.
pub fn find_by_naming_convention(dir: &Path, campaign: &str, product: &str) -> Option<PathBuf> {
    let files: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect(),
        Err(e) => {
            warn!(dir = %dir.display(), error = ?e, "[RESOLVE] Could not list staging directory");
            return None;
        }
    };
    debug!(dir = %dir.display(), files = files.len(), "[RESOLVE] Scanning for hero image by naming convention");

    for stem in convention_stems(campaign, product) {
        let prefix = format!("{stem}.");
        for path in &files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with(&prefix) {
                continue;
            }
            match lowercase_extension(name) {
                Some(ext) if HERO_IMAGE_EXTENSIONS.contains(&ext.as_str()) => {
                    info!(file = name, pattern = %stem, "[RESOLVE] Found hero image by naming convention");
                    return Some(path.clone());
                }
                _ => debug!(file = name, "[RESOLVE] Skipped, not an image file"),
            }
        }
    }

    debug!(campaign, product, "[RESOLVE] No hero image matches the naming convention");
    None
}
