use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;

use crate::error::SwatchError;

/// Source of color swatches.
///
/// This abstraction lets the resolver work against an HTTP swatch service,
/// an in-process renderer, or a test double without knowing which.
#[async_trait]
pub trait SwatchProvider: Send + Sync {
    /// Load the swatch for a color.
    ///
    /// # Arguments
    /// * `color` - 6 lowercase hex digits, no `#` prefix
    /// * `width` / `height` - requested swatch size in pixels
    ///
    /// Resolves once the image is fully loaded and decoded.
    async fn load(&self, color: &str, width: u32, height: u32) -> Result<RgbaImage, SwatchError>;

    /// A label for this provider, used in logs.
    fn identifier(&self) -> &str;
}

#[async_trait]
impl<P: SwatchProvider + ?Sized> SwatchProvider for Arc<P> {
    async fn load(&self, color: &str, width: u32, height: u32) -> Result<RgbaImage, SwatchError> {
        (**self).load(color, width, height).await
    }

    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}
