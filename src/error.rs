use thiserror::Error;

/// Errors raised by an asset reader while decoding a source raster.
#[derive(Debug, Clone, Error)]
pub enum ReadError {
    /// Asset does not exist or cannot be resolved to a readable location
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Raster bytes could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Georeferencing sidecar is missing or malformed
    #[error("Invalid world file for {asset}: {message}")]
    WorldFile { asset: String, message: String },

    /// Requested bounding box does not intersect the raster
    #[error("Bounding box does not intersect asset {0}")]
    OutsideRaster(String),

    /// Filesystem or task failure
    #[error("I/O error: {0}")]
    Io(String),

    /// The read did not finish within the configured timeout
    #[error("Read of {0} timed out")]
    Timeout(String),
}

/// Errors from the statistics store.
///
/// None of these are fatal: the statistics cache logs them and treats the
/// lookup as a miss.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Store could not be reached or the connection dropped
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    /// Store replied with something other than the expected reply
    #[error("Cache protocol error: {0}")]
    Protocol(String),

    /// Round trip exceeded the configured timeout
    #[error("Cache operation timed out")]
    Timeout,
}

/// Errors that fail a tile-processing invocation.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// Source region unreadable, empty, or entirely nodata
    #[error("Data unavailable: {reason}")]
    DataUnavailable { reason: String },

    /// Requested buffer/tile geometry exceeds the decoded pixel data
    #[error(
        "Invalid buffer: {height}x{width} pixels cannot hold a {tile_size}px tile with a {buffer}px buffer"
    )]
    InvalidBuffer {
        height: usize,
        width: usize,
        buffer: usize,
        tile_size: usize,
    },

    /// Malformed parameters, rejected before any computation
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// No algorithm is registered under this name
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Output tile could not be encoded
    #[error("Failed to encode tile: {0}")]
    Encode(String),

    /// Underlying asset read failed
    #[error("Read error: {0}")]
    Read(#[from] ReadError),
}

impl ProcessError {
    pub(crate) fn data_unavailable(reason: impl Into<String>) -> Self {
        ProcessError::DataUnavailable {
            reason: reason.into(),
        }
    }
}
