//! Test utilities for integration tests.
//!
//! Mock swatch providers and reducers, synthetic source images, and a local
//! HTTP swatch service.

use std::collections::HashSet;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use image::{ImageFormat, Rgba, RgbaImage};

use photo_mosaic::error::{ReductionError, SwatchError};
use photo_mosaic::reduce::{ColorReducer, Rgb, SampledAverage};
use photo_mosaic::source::SourceImage;
use photo_mosaic::swatch::SwatchProvider;

// =============================================================================
// Swatch Providers
// =============================================================================

/// Renders each color as an opaque solid swatch of the requested size.
///
/// Deterministic, so repeated runs over the same image must produce identical
/// mosaics.
#[derive(Default)]
pub struct SolidSwatchProvider {
    load_count: AtomicUsize,
    colors: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl SolidSwatchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering each load.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }

    /// Distinct colors requested so far.
    pub fn distinct_colors(&self) -> HashSet<String> {
        self.colors.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl SwatchProvider for SolidSwatchProvider {
    async fn load(&self, color: &str, width: u32, height: u32) -> Result<RgbaImage, SwatchError> {
        self.load_count.fetch_add(1, Ordering::SeqCst);
        self.colors.lock().unwrap().push(color.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let [r, g, b] = parse_color(color)?;
        Ok(RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255])))
    }

    fn identifier(&self) -> &str {
        "solid://"
    }
}

/// Fails every load for one color, renders the rest.
pub struct FailingSwatchProvider {
    failing_color: String,
    inner: SolidSwatchProvider,
}

impl FailingSwatchProvider {
    pub fn new(failing_color: &str) -> Self {
        Self {
            failing_color: failing_color.trim_start_matches('#').to_lowercase(),
            inner: SolidSwatchProvider::new(),
        }
    }
}

#[async_trait]
impl SwatchProvider for FailingSwatchProvider {
    async fn load(&self, color: &str, width: u32, height: u32) -> Result<RgbaImage, SwatchError> {
        if color == self.failing_color {
            return Err(SwatchError::NotFound {
                url: format!("failing://color/{}", color),
            });
        }
        self.inner.load(color, width, height).await
    }

    fn identifier(&self) -> &str {
        "failing://"
    }
}

fn parse_color(color: &str) -> Result<[u8; 3], SwatchError> {
    let bytes = hex::decode(color).map_err(|_| SwatchError::InvalidColor {
        color: color.to_string(),
    })?;
    <[u8; 3]>::try_from(bytes.as_slice()).map_err(|_| SwatchError::InvalidColor {
        color: color.to_string(),
    })
}

// =============================================================================
// Reducers
// =============================================================================

/// Rejects any tile whose first pixel matches `color`, reduces the rest normally.
pub struct FailingReducer {
    color: [u8; 3],
    calls: AtomicUsize,
}

impl FailingReducer {
    pub fn new(color: [u8; 3]) -> Self {
        Self {
            color,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ColorReducer for FailingReducer {
    fn reduce(&self, pixels: &[u8]) -> Result<Rgb, ReductionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if pixels.len() >= 3 && pixels[..3] == self.color {
            return Err(ReductionError::Rejected {
                message: format!("refusing color {:?}", self.color),
            });
        }
        SampledAverage::default().reduce(pixels)
    }
}

/// Sampled average that sleeps a little per tile so jobs overlap and
/// finish out of order.
pub struct JitterReducer;

impl ColorReducer for JitterReducer {
    fn reduce(&self, pixels: &[u8]) -> Result<Rgb, ReductionError> {
        let seed = pixels.iter().take(4).map(|&b| b as u64).sum::<u64>();
        std::thread::sleep(Duration::from_micros((seed * 37) % 2000));
        SampledAverage::default().reduce(pixels)
    }
}

// =============================================================================
// Source Images
// =============================================================================

/// Distinct, non-repeating color for tile `index`.
pub fn tile_color(index: usize) -> [u8; 3] {
    let index = index as u32 + 1;
    [
        (index & 0xff) as u8,
        ((index >> 8) & 0xff) as u8,
        ((index * 7) & 0xff) as u8,
    ]
}

/// Image where every tile of the given size is filled with its own
/// [`tile_color`]. Pixels past the last whole tile are white.
pub fn distinct_tiles_image(width: u32, height: u32, tile_width: u32, tile_height: u32) -> SourceImage {
    let columns = width / tile_width;
    let rows = height / tile_height;

    SourceImage::from_rgba(RgbaImage::from_fn(width, height, |x, y| {
        let (col, row) = (x / tile_width, y / tile_height);
        if col >= columns || row >= rows {
            return Rgba([255, 255, 255, 255]);
        }
        let [r, g, b] = tile_color((row * columns + col) as usize);
        Rgba([r, g, b, 255])
    }))
}

/// Solid image of one color.
pub fn solid_image(width: u32, height: u32, color: [u8; 3]) -> SourceImage {
    let [r, g, b] = color;
    SourceImage::from_rgba(RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255])))
}

/// Smooth gradient, so neighbouring tiles get different but similar colors.
pub fn gradient_image(width: u32, height: u32) -> SourceImage {
    SourceImage::from_rgba(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
            255,
        ])
    }))
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

// =============================================================================
// Local Swatch Service
// =============================================================================

/// Requests seen by the local swatch service.
#[derive(Clone, Default)]
pub struct ServiceLog {
    hits: Arc<AtomicUsize>,
}

impl ServiceLog {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serve swatches on `127.0.0.1` at a random port.
///
/// - `GET /color/<hex6>` returns a 16x16 PNG of that color
/// - `GET /color/000000` returns 500
/// - `GET /color/111111` returns a body that is not an image
/// - anything else is a plain-text 404
pub async fn spawn_swatch_service() -> (SocketAddr, ServiceLog) {
    serve_swatches(swatch_response).await
}

/// Serve swatches the way the reference mosaic server does: every
/// `GET /color/<hex6>` answers with a 16x16 `image/svg+xml` ellipse filled
/// with that color.
pub async fn spawn_svg_swatch_service() -> (SocketAddr, ServiceLog) {
    serve_swatches(svg_swatch_response).await
}

/// The reference server's SVG tile body.
pub fn ellipse_svg(hex: &str, width: u32, height: u32) -> String {
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" "#,
            r#"xmlns:xlink="http://www.w3.org/1999/xlink" width="{}" height="{}">"#,
            r##"<ellipse cx="50%" cy="50%" rx="50%" ry="50%" fill="#{}"></ellipse>"##,
            "</svg>"
        ),
        width, height, hex
    )
}

async fn serve_swatches(respond: fn(&str) -> Response) -> (SocketAddr, ServiceLog) {
    let log = ServiceLog::default();
    let hits = Arc::clone(&log.hits);

    let app = Router::new()
        .route(
            "/color/{hex}",
            get(move |Path(hex): Path<String>| {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    respond(&hex)
                }
            }),
        )
        .fallback(|| async { (StatusCode::NOT_FOUND, "Not found") });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, log)
}

fn svg_swatch_response(hex: &str) -> Response {
    match parse_color(hex) {
        Ok(_) => {
            let body = ellipse_svg(hex, 16, 16);
            ([(header::CONTENT_TYPE, "image/svg+xml")], body).into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

fn swatch_response(hex: &str) -> Response {
    match hex {
        "000000" => (StatusCode::INTERNAL_SERVER_ERROR, "render failed").into_response(),
        "111111" => ([(header::CONTENT_TYPE, "image/png")], "not an image").into_response(),
        _ => match parse_color(hex) {
            Ok([r, g, b]) => {
                let png = encode_png(&RgbaImage::from_pixel(16, 16, Rgba([r, g, b, 255])));
                ([(header::CONTENT_TYPE, "image/png")], png).into_response()
            }
            Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        },
    }
}
