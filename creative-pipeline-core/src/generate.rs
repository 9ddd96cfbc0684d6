//! Generation fallback: build the prompt, call the generator, persist the bytes
//! under the generated-assets namespace and hand back a fresh link.

use std::time::Duration;

use tracing::{error, info};

use crate::contract::{GenerationRequest, ImageGenerator, ImageSize, ObjectStore};
use crate::error::ProductError;
use crate::naming::{generated_key, GENERATED_SUFFIX};
use crate::resolver::{AssetProvenance, ResolvedAsset};

/// Locale bias used when a brief has no target region.
pub const DEFAULT_LOCALE: &str = "en-US";
/// Square edge length requested from the generator.
pub const GENERATED_EDGE_PX: u32 = 2048;
const CONTENT_CLASS: &str = "photo";
const VISUAL_INTENSITY: u8 = 6;

pub fn hero_prompt(product: &str) -> String {
    format!(
        "Professional photography of {product}, modern style, clean background, high quality, commercial photography"
    )
}

impl GenerationRequest {
    /// The fixed photographic request for a product hero image.
    pub fn for_product(product: &str, region: Option<&str>) -> Self {
        let locale = region
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_LOCALE);
        Self {
            prompt: hero_prompt(product),
            content_class: CONTENT_CLASS.to_string(),
            size: ImageSize {
                width: GENERATED_EDGE_PX,
                height: GENERATED_EDGE_PX,
            },
            visual_intensity: VISUAL_INTENSITY,
            locale: locale.to_string(),
        }
    }
}

/// Generate a hero image for `product` and store it at
/// `generated/{campaign}_{product}_hero.jpg`. Failures are not retried.
pub async fn generate_hero_image<G, S>(
    generator: &G,
    store: &S,
    campaign: &str,
    product: &str,
    region: Option<&str>,
    link_ttl: Duration,
) -> Result<ResolvedAsset, ProductError>
where
    G: ImageGenerator,
    S: ObjectStore,
{
    let request = GenerationRequest::for_product(product, region);
    info!(product, locale = %request.locale, prompt = %request.prompt, "[GENERATE] Requesting hero image");

    let bytes = generator.generate(&request).await.map_err(|e| {
        error!(product, error = %e, "[GENERATE] Image generation failed");
        e
    })?;
    info!(product, size = bytes.len(), "[GENERATE] Received generated image");

    let key = generated_key(campaign, product, GENERATED_SUFFIX);
    store.put(&key, bytes, "image/jpeg").await.map_err(|e| {
        error!(key = %key, error = %e, "[GENERATE] Failed to store generated image");
        e
    })?;
    let url = store.presigned_get(&key, link_ttl).await?;
    info!(key = %key, "[GENERATE] Stored generated hero image");

    Ok(ResolvedAsset {
        key,
        url,
        provenance: AssetProvenance::FreshlyGenerated,
    })
}
