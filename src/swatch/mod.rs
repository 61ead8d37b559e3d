//! Swatch loading.
//!
//! A swatch is an externally supplied image depicting a single color. Tiles
//! are replaced by the swatch of their reduced color when the mosaic is
//! composited.
//!
//! # Components
//!
//! - [`SwatchProvider`]: where swatches come from (an HTTP service in
//!   production, anything that can render a color in tests)
//! - [`HttpSwatchProvider`]: `GET <base>/color/<hex6>` over reqwest
//! - [`SwatchCache`]: LRU cache of decoded swatches
//! - [`SwatchResolver`]: color → swatch with caching and load sharing

mod cache;
mod http;
mod provider;
mod resolver;

pub use cache::{SwatchCache, SwatchKey, DEFAULT_SWATCH_CACHE_CAPACITY};
pub use http::{decode_swatch, HttpSwatchProvider, DEFAULT_SWATCH_TIMEOUT};
pub use provider::SwatchProvider;
pub use resolver::SwatchResolver;
