//! Naming rules shared by every stage: filesystem-safe names, remote key layout,
//! content types and the rendered-output filename.

use std::path::Path;

/// Remote namespace for user-supplied or locally discovered assets.
pub const ASSETS_PREFIX: &str = "assets/";
/// Remote namespace for images produced by the generation service.
pub const GENERATED_PREFIX: &str = "generated/";
/// Fixed filename suffix of a freshly generated hero image.
pub const GENERATED_SUFFIX: &str = "hero.jpg";

/// Extensions accepted when scanning for a hero image by naming convention.
pub const HERO_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Replace every character that is not alphanumeric, `-` or `_` with `_`, then trim `_`.
pub fn clean_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_matches('_').to_string()
}

/// `assets/<filename>`
pub fn asset_key(filename: &str) -> String {
    format!("{ASSETS_PREFIX}{filename}")
}

/// Listing prefix for anything previously generated for this campaign/product pair.
pub fn generated_prefix(campaign: &str, product: &str) -> String {
    format!("{GENERATED_PREFIX}{campaign}_{product}_")
}

/// `generated/<campaign>_<product>_<suffix>`
pub fn generated_key(campaign: &str, product: &str, suffix: &str) -> String {
    format!("{}{suffix}", generated_prefix(campaign, product))
}

/// `{height}x{width}_{campaign}_{product}.{ext}`
pub fn output_filename(
    width: u32,
    height: u32,
    campaign: &str,
    product: &str,
    ext: &str,
) -> String {
    format!("{height}x{width}_{campaign}_{product}.{ext}")
}

/// Content type for an upload, keyed on the file extension (case-insensitive).
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Lower-cased last extension of a file name, if any.
pub(crate) fn lowercase_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
