//! Mosaic generation.
//!
//! - [`compositor`]: draws resolved tiles onto the output canvas
//! - [`engine`]: runs the full resize → slice → reduce → resolve → composite
//!   pipeline

pub mod compositor;
pub mod engine;

pub use compositor::composite;
pub use engine::{CancelToken, EngineState, MosaicConfig, MosaicEngine, MosaicResult};
