//! HTTP server layer for the stats tiler.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      GET /bbox/{minx},{miny},{maxx},{maxy}.png?url=&algorithm=  │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (requests, error codes)  │  │  (router config, CORS)      │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!            AssetReader::part → TileProcessor → PngTileEncoder
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    algorithm_handler, algorithms_handler, bbox_handler, health_handler, AlgorithmsResponse,
    AppState, BBoxQueryParams, ErrorResponse, HealthResponse, DEFAULT_ALGORITHM,
};
pub use routes::{create_router, RouterConfig};
