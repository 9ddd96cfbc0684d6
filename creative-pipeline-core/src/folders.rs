//! Campaign working directories.
//!
//! Each campaign gets `<campaigns_root>/<campaign_clean>/` with an `input/` folder
//! holding copies of the staging assets and, once the campaign succeeds, the archived
//! brief; and an `output/` folder with one subfolder per product.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::brief::CampaignBrief;
use crate::naming::lowercase_extension;

/// Staging files with these extensions are copied into a campaign's `input/`.
pub const ASSET_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "pdf", "ai", "psd"];
/// Name of the archived brief inside `input/`.
pub const ARCHIVED_BRIEF_NAME: &str = "campaign_brief.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignLayout {
    root: PathBuf,
}

impl CampaignLayout {
    pub fn new(campaigns_root: &Path, campaign_clean: &str) -> Self {
        Self {
            root: campaigns_root.join(campaign_clean),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join("input")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn product_output_dir(&self, product: &str) -> PathBuf {
        self.output_dir().join(product)
    }

    pub fn archived_brief_path(&self) -> PathBuf {
        self.input_dir().join(ARCHIVED_BRIEF_NAME)
    }

    /// Create `output/<product>/` if needed and return it.
    pub fn create_product_output_dir(&self, product: &str) -> io::Result<PathBuf> {
        let dir = self.product_output_dir(product);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Create the campaign's `input/` and `output/` folders and copy staging assets in.
///
/// Files already present in `input/` are left untouched. Safe to call repeatedly.
pub fn setup_campaign_folders(
    campaigns_root: &Path,
    staging_dir: &Path,
    brief: &CampaignBrief,
) -> io::Result<CampaignLayout> {
    let layout = CampaignLayout::new(campaigns_root, &brief.campaign_clean);
    let input_dir = layout.input_dir();
    fs::create_dir_all(&input_dir)?;
    fs::create_dir_all(layout.output_dir())?;
    info!(root = %layout.root().display(), "Campaign folders ready");

    if let Some(hero) = brief.hero_image.filename() {
        let source = staging_dir.join(hero);
        if source.is_file() {
            copy_if_absent(&source, &input_dir.join(hero))?;
        } else {
            debug!(hero, "Named hero image not found in staging");
        }
    }

    let mut copied = 0usize;
    for entry in fs::read_dir(staging_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let recognized = lowercase_extension(name)
            .map(|ext| ASSET_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false);
        if recognized && copy_if_absent(&path, &input_dir.join(name))? {
            copied += 1;
        }
    }
    info!(copied, "Staging assets copied to campaign input");

    Ok(layout)
}

fn copy_if_absent(source: &Path, dest: &Path) -> io::Result<bool> {
    if dest.exists() {
        debug!(dest = %dest.display(), "Asset already in campaign input, skipping");
        return Ok(false);
    }
    fs::copy(source, dest)?;
    debug!(source = %source.display(), dest = %dest.display(), "Copied asset");
    Ok(true)
}

/// Move a fully processed brief out of staging into `input/campaign_brief.json`.
pub fn archive_brief(layout: &CampaignLayout, brief_path: &Path) -> io::Result<PathBuf> {
    let dest = layout.archived_brief_path();
    fs::create_dir_all(layout.input_dir())?;
    fs::copy(brief_path, &dest)?;
    fs::remove_file(brief_path)?;
    info!(from = %brief_path.display(), to = %dest.display(), "Campaign brief archived");
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief(hero: Option<&str>) -> CampaignBrief {
        let hero = hero
            .map(|h| format!(r#","hero_image":"{h}""#))
            .unwrap_or_default();
        format!(
            r#"{{"campaign":"Fall Drop","target_region":"en-US","target_audience":"all",
               "product":["Boot","Hat"],"campaign_message":"m","file_format":"PNG"{hero}}}"#
        )
        .parse()
        .unwrap()
    }

    #[test]
    fn layout_paths_hang_off_clean_campaign_name() {
        let layout = CampaignLayout::new(Path::new("/work"), "Fall_Drop");
        assert_eq!(layout.input_dir(), Path::new("/work/Fall_Drop/input"));
        assert_eq!(layout.product_output_dir("Boot"), Path::new("/work/Fall_Drop/output/Boot"));
        assert_eq!(
            layout.archived_brief_path(),
            Path::new("/work/Fall_Drop/input/campaign_brief.json")
        );
    }

    #[test]
    fn copies_recognized_assets_and_keeps_existing() {
        let staging = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        fs::write(staging.path().join("logo.PSD"), b"psd").unwrap();
        fs::write(staging.path().join("hero.webp"), b"new").unwrap();
        fs::write(staging.path().join("notes.txt"), b"txt").unwrap();
        fs::write(staging.path().join("brief.json"), b"{}").unwrap();

        let input = root.path().join("Fall_Drop/input");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("hero.webp"), b"old").unwrap();

        let layout =
            setup_campaign_folders(root.path(), staging.path(), &brief(Some("hero.webp"))).unwrap();

        assert!(layout.output_dir().is_dir());
        assert!(input.join("logo.PSD").is_file());
        assert!(!input.join("notes.txt").exists());
        assert!(!input.join("brief.json").exists());
        assert_eq!(fs::read(input.join("hero.webp")).unwrap(), b"old");
    }

    #[test]
    fn archive_moves_brief_into_input() {
        let staging = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let brief_path = staging.path().join("fall.json");
        fs::write(&brief_path, b"{\"x\":1}").unwrap();

        let layout = setup_campaign_folders(root.path(), staging.path(), &brief(None)).unwrap();
        let archived = archive_brief(&layout, &brief_path).unwrap();

        assert!(!brief_path.exists());
        assert_eq!(fs::read(archived).unwrap(), b"{\"x\":1}");
    }
}
