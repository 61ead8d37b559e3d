use thiserror::Error;

/// Errors reported by a reducer worker for a single tile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReductionError {
    /// Pixel buffer is not a whole number of RGBA samples
    #[error("Malformed pixel buffer: length {len} is not a multiple of 4")]
    MalformedBuffer { len: usize },

    /// The reduction panicked on the worker thread
    #[error("Reducer worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },

    /// A reducer implementation refused the buffer
    #[error("Reduction rejected: {message}")]
    Rejected { message: String },

    /// The pool shut down before the job got a response
    #[error("Reducer pool is closed")]
    PoolClosed,

    /// A response came back for a different tile than the one awaiting it
    #[error("Misrouted reduction response: expected tile {expected}, got tile {actual}")]
    Misrouted { expected: usize, actual: usize },

    /// A worker thread could not be started
    #[error("Failed to spawn reducer worker: {message}")]
    Spawn { message: String },
}

/// Errors that can occur when loading a swatch image
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwatchError {
    /// Color is not a 6-digit hex code
    #[error("Invalid swatch color: {color:?}")]
    InvalidColor { color: String },

    /// Swatch provider base URL or lookup path is not a valid URL
    #[error("Invalid swatch URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },

    /// Swatch provider has no image for this color
    #[error("Swatch not found: {url}")]
    NotFound { url: String },

    /// Swatch provider answered with a non-success status
    #[error("Swatch request to {url} failed with HTTP {status}")]
    Http { url: String, status: u16 },

    /// Network or connection error
    #[error("Connection error fetching {url}: {message}")]
    Connection { url: String, message: String },

    /// Swatch body could not be decoded as an image
    #[error("Failed to decode swatch from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Errors that fail a mosaic run.
///
/// A run rejects with exactly one of these; no partial composite is produced.
#[derive(Debug, Clone, Error)]
pub enum MosaicError {
    /// Source image could not be decoded
    #[error("Failed to decode source image: {message}")]
    Decode { message: String },

    /// Composite could not be encoded
    #[error("Failed to encode mosaic: {message}")]
    Encode { message: String },

    /// Reading or writing a file failed
    #[error("I/O error: {message}")]
    Io { message: String },

    /// The reducer pool could not be started
    #[error("Failed to start reducer pool: {source}")]
    Pool {
        #[source]
        source: ReductionError,
    },

    /// A tile's color reduction failed
    #[error("Reduction failed for tile {index}: {source}")]
    Reduction {
        index: usize,
        #[source]
        source: ReductionError,
    },

    /// A tile's swatch failed to load
    #[error("Swatch load failed for tile {index}: {source}")]
    SwatchLoad {
        index: usize,
        #[source]
        source: SwatchError,
    },

    /// Compositing was asked to draw a tile without a swatch
    #[error("Tile {index} has no resolved swatch")]
    UnresolvedTile { index: usize },

    /// A tile received a second result for a stage it already completed
    #[error("Tile {index} already has a {stage}")]
    DuplicateResult { index: usize, stage: &'static str },

    /// The run was cancelled through its token
    #[error("Mosaic generation was cancelled")]
    Cancelled,

    /// The engine is already running a generation
    #[error("Mosaic engine is busy with another run")]
    Busy,
}

impl MosaicError {
    /// Returns the tile index this error is attached to, if any.
    pub fn tile_index(&self) -> Option<usize> {
        match self {
            MosaicError::Reduction { index, .. }
            | MosaicError::SwatchLoad { index, .. }
            | MosaicError::UnresolvedTile { index }
            | MosaicError::DuplicateResult { index, .. } => Some(*index),
            _ => None,
        }
    }
}
