//! HTTP-backed swatch provider.
//!
//! Fetches swatches from a swatch service addressed as
//! `GET <base>/color/<hex6>`. Raster bodies (PNG or JPEG) are decoded with the
//! `image` crate. Bodies served as `image/svg+xml` are rasterized with `resvg`
//! at the requested swatch size.

use std::time::Duration;

use async_trait::async_trait;
use http::{header, StatusCode};
use image::{Rgba, RgbaImage};
use resvg::{tiny_skia, usvg};
use tracing::trace;
use url::Url;

use crate::error::SwatchError;

use super::SwatchProvider;

/// Default timeout for a single swatch request.
pub const DEFAULT_SWATCH_TIMEOUT: Duration = Duration::from_secs(30);

const SVG_MEDIA_TYPE: &str = "image/svg+xml";

/// Swatch provider backed by an HTTP swatch service.
///
/// # Example
///
/// ```ignore
/// use photo_mosaic::swatch::{HttpSwatchProvider, SwatchProvider};
///
/// let provider = HttpSwatchProvider::new("http://localhost:8765")?;
///
/// // Requests http://localhost:8765/color/ff8800
/// let swatch = provider.load("ff8800", 16, 16).await?;
/// ```
#[derive(Clone)]
pub struct HttpSwatchProvider {
    client: reqwest::Client,
    base: Url,
    identifier: String,
}

impl HttpSwatchProvider {
    /// Create a provider for the swatch service at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, SwatchError> {
        Self::with_timeout(base_url, DEFAULT_SWATCH_TIMEOUT)
    }

    /// Create a provider with a per-request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, SwatchError> {
        let base = parse_base_url(base_url)?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwatchError::Connection {
                url: base_url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self::from_parts(client, base))
    }

    /// Create a provider that sends requests through an existing client.
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Result<Self, SwatchError> {
        Ok(Self::from_parts(client, parse_base_url(base_url)?))
    }

    fn from_parts(client: reqwest::Client, base: Url) -> Self {
        Self {
            client,
            identifier: base.to_string(),
            base,
        }
    }

    /// The normalized base URL (always ends with `/`).
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Lookup URL for a 6-digit color.
    pub fn swatch_url(&self, color: &str) -> Result<Url, SwatchError> {
        self.base
            .join(&format!("color/{}", color))
            .map_err(|e| SwatchError::InvalidUrl {
                url: format!("{}color/{}", self.base, color),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl SwatchProvider for HttpSwatchProvider {
    async fn load(&self, color: &str, width: u32, height: u32) -> Result<RgbaImage, SwatchError> {
        let url = self.swatch_url(color)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SwatchError::Connection {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SwatchError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(SwatchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body = response
            .bytes()
            .await
            .map_err(|e| SwatchError::Connection {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        trace!(
            url = %url,
            bytes = body.len(),
            content_type = content_type.as_deref().unwrap_or("-"),
            "Fetched swatch"
        );

        decode_swatch(&body, content_type.as_deref(), width, height, url.as_str())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Decode a swatch body into RGBA pixels.
///
/// SVG documents (by `content_type`) are rendered onto a `width` x `height`
/// canvas. Raster bodies keep their own size; the compositor scales them.
pub fn decode_swatch(
    data: &[u8],
    content_type: Option<&str>,
    width: u32,
    height: u32,
    url: &str,
) -> Result<RgbaImage, SwatchError> {
    if content_type.is_some_and(is_svg_media_type) {
        return rasterize_svg(data, width, height, url);
    }

    image::load_from_memory(data)
        .map(|image| image.into_rgba8())
        .map_err(|e| SwatchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
}

/// Matches `image/svg+xml`, ignoring case and parameters such as `charset`.
fn is_svg_media_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(SVG_MEDIA_TYPE))
}

fn rasterize_svg(
    data: &[u8],
    width: u32,
    height: u32,
    url: &str,
) -> Result<RgbaImage, SwatchError> {
    let decode_error = |message: String| SwatchError::Decode {
        url: url.to_string(),
        message,
    };

    let tree = usvg::Tree::from_data(data, &usvg::Options::default())
        .map_err(|e| decode_error(e.to_string()))?;
    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| decode_error(format!("cannot render SVG at {}x{}", width, height)))?;

    // Stretch the document onto the full swatch
    let size = tree.size();
    let transform = tiny_skia::Transform::from_scale(
        width as f32 / size.width(),
        height as f32 / size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha
    let mut image = RgbaImage::new(width, height);
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }

    Ok(image)
}

/// Parse a base URL, making sure relative joins append rather than replace
/// the last path segment.
fn parse_base_url(base_url: &str) -> Result<Url, SwatchError> {
    let mut base = Url::parse(base_url).map_err(|e| SwatchError::InvalidUrl {
        url: base_url.to_string(),
        message: e.to_string(),
    })?;

    if base.cannot_be_a_base() {
        return Err(SwatchError::InvalidUrl {
            url: base_url.to_string(),
            message: "URL cannot be used as a base".to_string(),
        });
    }

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    Ok(base)
}

// =============================================================================
// Tests
// =============================================================================
