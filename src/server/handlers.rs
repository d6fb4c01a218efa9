//! HTTP request handlers for the stats tiler API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check with the active statistics backend
//! - `GET /algorithms` - Metadata of every registered algorithm
//! - `GET /algorithms/{name}` - Metadata of one algorithm
//! - `GET /bbox/{minx},{miny},{maxx},{maxy}.png` - Processed part of an asset

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::algorithm::{
    AlgorithmInfo, AlgorithmParameters, TileProcessor, DEFAULT_BUFFER, DEFAULT_SCALE,
    DEFAULT_TILE_SIZE,
};
use crate::error::{ProcessError, ReadError};
use crate::raster::{AssetReader, BoundingBox, PngTileEncoder, PNG_CONTENT_TYPE};

/// Algorithm used when a request names none.
pub const DEFAULT_ALGORITHM: &str = "bbox_rescale";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile processor.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<R: AssetReader> {
    /// Runs algorithms and owns the statistics provider
    pub processor: Arc<TileProcessor<R>>,

    /// Encodes processed tiles
    pub encoder: PngTileEncoder,

    /// Buffer applied when a request doesn't set one
    pub default_buffer: usize,

    /// Tile size applied when a request doesn't set one
    pub default_tile_size: usize,

    /// Cache control max-age in seconds (defaults to 1 hour)
    pub cache_max_age: u32,
}

impl<R: AssetReader> AppState<R> {
    /// Create a new application state with the given processor.
    pub fn new(processor: TileProcessor<R>) -> Self {
        Self {
            processor: Arc::new(processor),
            encoder: PngTileEncoder::new(),
            default_buffer: DEFAULT_BUFFER,
            default_tile_size: DEFAULT_TILE_SIZE,
            cache_max_age: 3600,
        }
    }

    /// Set the buffer and tile size used when requests omit them.
    pub fn with_defaults(mut self, buffer: usize, tile_size: usize) -> Self {
        self.default_buffer = buffer;
        self.default_tile_size = tile_size;
        self
    }

    pub fn with_cache_max_age(mut self, cache_max_age: u32) -> Self {
        self.cache_max_age = cache_max_age;
        self
    }
}

impl<R: AssetReader> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            processor: Arc::clone(&self.processor),
            encoder: self.encoder.clone(),
            default_buffer: self.default_buffer,
            default_tile_size: self.default_tile_size,
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for part requests.
#[derive(Debug, Deserialize)]
pub struct BBoxQueryParams {
    /// Asset to read (path or `file://` URL)
    pub url: String,

    /// Registered algorithm name
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Statistics bbox as `minx,miny,maxx,maxy`; defaults to the path bbox
    #[serde(default)]
    pub bbox: Option<String>,

    #[serde(default)]
    pub scale: Option<u32>,

    #[serde(default)]
    pub buffer: Option<usize>,

    #[serde(default)]
    pub tilesize: Option<usize>,

    #[serde(default)]
    pub clip_limit: Option<f32>,

    #[serde(default)]
    pub grid: Option<usize>,
}

fn default_algorithm() -> String {
    DEFAULT_ALGORITHM.to_string()
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_buffer")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,

    /// Statistics store backend ("memory" or "resp")
    pub cache_backend: String,
}

/// Response from the algorithm listing endpoint.
#[derive(Debug, Serialize)]
pub struct AlgorithmsResponse {
    pub algorithms: Vec<AlgorithmInfo>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert ProcessError to HTTP response.
///
/// 4xx errors are logged at WARN (404 at DEBUG), 5xx errors at ERROR.
impl IntoResponse for ProcessError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ProcessError::InvalidParameters(_) => (StatusCode::BAD_REQUEST, "invalid_parameters"),
            ProcessError::InvalidBuffer { .. } => (StatusCode::BAD_REQUEST, "invalid_buffer"),
            ProcessError::UnknownAlgorithm(_) => (StatusCode::NOT_FOUND, "unknown_algorithm"),
            ProcessError::DataUnavailable { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "data_unavailable")
            }
            ProcessError::Encode(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
            ProcessError::Read(read_err) => match read_err {
                ReadError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                ReadError::OutsideRaster(_) => (StatusCode::NOT_FOUND, "outside_raster"),
                ReadError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "read_timeout"),
                ReadError::Decode(_) | ReadError::WorldFile { .. } | ReadError::Io(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "read_error")
                }
            },
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "cache_backend": "memory"
/// }
/// ```
pub async fn health_handler<R: AssetReader>(
    State(state): State<AppState<R>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache_backend: state.processor.provider().cache().backend().to_string(),
    })
}

/// Handle algorithm listing requests.
///
/// `GET /algorithms`
pub async fn algorithms_handler<R: AssetReader>(
    State(state): State<AppState<R>>,
) -> Json<AlgorithmsResponse> {
    Json(AlgorithmsResponse {
        algorithms: state.processor.registry().list(),
    })
}

/// Handle single algorithm metadata requests.
///
/// `GET /algorithms/{name}`
///
/// # Errors
///
/// - `404 Not Found`: No algorithm registered under `name`
pub async fn algorithm_handler<R: AssetReader>(
    State(state): State<AppState<R>>,
    Path(name): Path<String>,
) -> Result<Json<AlgorithmInfo>, ProcessError> {
    let algorithm = state.processor.registry().get(&name)?;
    Ok(Json(algorithm.info()))
}

/// Handle part requests.
///
/// # Endpoint
///
/// `GET /bbox/{minx},{miny},{maxx},{maxy}.png?url={asset}&algorithm={name}`
///
/// The part is read with `buffer` pixels of padding when the algorithm crops,
/// processed, and returned as a gray + alpha PNG where alpha is the validity
/// mask.
///
/// # Query Parameters
///
/// - `url`: Asset to read (required)
/// - `algorithm`: Algorithm name (default: `bbox_rescale`)
/// - `bbox`: Statistics bbox (default: the path bbox)
/// - `scale`, `buffer`, `tilesize`, `clip_limit`, `grid`: Algorithm parameters
///
/// # Errors
///
/// - `400 Bad Request`: Malformed bbox or parameters, or a buffer larger than the part
/// - `404 Not Found`: Unknown algorithm or asset, or bbox outside the asset
/// - `422 Unprocessable Entity`: No valid data to compute statistics from
/// - `500 Internal Server Error`: Decode or encode failure
pub async fn bbox_handler<R: AssetReader>(
    State(state): State<AppState<R>>,
    Path(filename): Path<String>,
    Query(query): Query<BBoxQueryParams>,
) -> Result<Response, ProcessError> {
    let coords = filename.strip_suffix(".png").unwrap_or(&filename);
    let part_bbox = BoundingBox::parse(coords)?;

    let algorithm = state.processor.registry().get(&query.algorithm)?;

    let stats_bbox = match query.bbox.as_deref() {
        Some(bbox) => BoundingBox::parse(bbox)?,
        None => part_bbox,
    };
    let params = AlgorithmParameters {
        bbox: Some(stats_bbox),
        scale: query.scale.unwrap_or(DEFAULT_SCALE),
        buffer: query.buffer.unwrap_or(state.default_buffer),
        tile_size: query.tilesize.unwrap_or(state.default_tile_size),
        clip_limit: query.clip_limit,
        grid: query.grid,
    };
    params.validate()?;

    let padding = if algorithm.always_crops() || params.buffer > 0 {
        params.buffer
    } else {
        0
    };

    let tile = state
        .processor
        .reader()
        .part(&query.url, &part_bbox, padding)
        .await?;

    let processed = state.processor.run(algorithm, tile, &params).await?;
    let png = state.encoder.encode(&processed)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, PNG_CONTENT_TYPE.to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", state.cache_max_age),
            ),
        ],
        png,
    )
        .into_response())
}

// =============================================================================
// Tests
// =============================================================================
