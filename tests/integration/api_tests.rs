//! API integration tests for the HTTP endpoints.
//!
//! These tests verify status codes, headers and response bodies using
//! georeferenced PNG fixtures written to a temporary directory.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use image::GenericImageView;
use tempfile::TempDir;
use tower::ServiceExt;

use stats_tiler::{
    create_router, AppState, RegionStatsProvider, RouterConfig, StatsCache, TileProcessor,
    WorldFileReader, DEFAULT_SCALE_THRESHOLD, DEFAULT_STATS_TTL,
};

use super::test_utils::{decode_png, is_valid_png, write_raster};

// =============================================================================
// Helpers
// =============================================================================

/// 64x64 horizontal gradient where column `x` holds `4 * x`.
fn gradient_fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_raster(dir.path(), "gradient.png", 64, 64, |x, _| (x * 4) as u8);
    write_raster(dir.path(), "empty.png", 64, 64, |_, _| 0);
    dir
}

fn create_test_router(root: &Path, nodata: Option<f32>) -> Router {
    let mut reader = WorldFileReader::new().with_root(root);
    if let Some(nodata) = nodata {
        reader = reader.with_nodata(nodata);
    }
    let provider = RegionStatsProvider::new(
        Arc::new(reader),
        StatsCache::in_memory(DEFAULT_STATS_TTL),
        DEFAULT_SCALE_THRESHOLD,
    );
    let state = AppState::new(TileProcessor::new(provider)).with_cache_max_age(600);
    create_router(state, RouterConfig::new())
}

async fn get(router: Router, uri: &str) -> (StatusCode, http::HeaderMap, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, _, body) = get(router, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// =============================================================================
// Health And Metadata
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let dir = gradient_fixture();
    let (status, json) = get_json(create_test_router(dir.path(), None), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["cache_backend"], "memory");
}

#[tokio::test]
async fn test_algorithms_endpoint_lists_all() {
    let dir = gradient_fixture();
    let (status, json) = get_json(create_test_router(dir.path(), None), "/algorithms").await;

    assert_eq!(status, StatusCode::OK);
    let mut names = json["algorithms"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    names.sort();
    assert_eq!(
        names,
        vec!["adaptive_equalize", "bbox_rescale", "histogram_equalize"]
    );
}

#[tokio::test]
async fn test_algorithm_metadata() {
    let dir = gradient_fixture();
    let (status, json) = get_json(
        create_test_router(dir.path(), None),
        "/algorithms/bbox_rescale",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "bbox_rescale");
    assert_eq!(json["input_nbands"], 1);
    assert_eq!(json["output_nbands"], 1);
    assert_eq!(json["output_dtype"], "uint8");
}

#[tokio::test]
async fn test_unknown_algorithm_metadata_is_404() {
    let dir = gradient_fixture();
    let (status, json) = get_json(
        create_test_router(dir.path(), None),
        "/algorithms/sharpen",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "unknown_algorithm");
    assert_eq!(json["status"], 404);
}

// =============================================================================
// Part Endpoint
// =============================================================================

#[tokio::test]
async fn test_bbox_returns_png() {
    let dir = gradient_fixture();
    let (status, headers, body) = get(
        create_test_router(dir.path(), None),
        "/bbox/16,16,32,32.png?url=gradient.png&buffer=4&tilesize=16",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/png");
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=600"
    );
    assert!(is_valid_png(&body));

    let img = decode_png(&body);
    assert_eq!(img.dimensions(), (16, 16));
    let gray_alpha = img.to_luma_alpha8();
    assert!(gray_alpha.pixels().all(|p| p[1] == 255));
    // Left edge is darker than right edge
    assert!(gray_alpha.get_pixel(0, 0)[0] < gray_alpha.get_pixel(15, 0)[0]);
}

#[tokio::test]
async fn test_bbox_every_algorithm() {
    let dir = gradient_fixture();
    for name in ["histogram_equalize", "adaptive_equalize", "bbox_rescale"] {
        let uri = format!(
            "/bbox/16,16,32,32.png?url=gradient.png&algorithm={}&buffer=4&tilesize=16",
            name
        );
        let (status, _, body) = get(create_test_router(dir.path(), None), &uri).await;

        assert_eq!(status, StatusCode::OK, "{}", name);
        assert_eq!(decode_png(&body).dimensions(), (16, 16), "{}", name);
    }
}

#[tokio::test]
async fn test_bbox_nodata_is_transparent() {
    let dir = gradient_fixture();
    let (status, _, body) = get(
        create_test_router(dir.path(), Some(0.0)),
        "/bbox/0,48,16,64.png?url=gradient.png&buffer=0&tilesize=16",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let img = decode_png(&body).to_luma_alpha8();
    for y in 0..16 {
        assert_eq!(img.get_pixel(0, y).0, [0, 0]);
        assert_eq!(img.get_pixel(15, y).0, [255, 255]);
    }
}

#[tokio::test]
async fn test_bbox_high_scale_with_stats_bbox() {
    let dir = gradient_fixture();
    let (status, _, body) = get(
        create_test_router(dir.path(), None),
        "/bbox/16,16,32,32.png?url=gradient.png&buffer=0&tilesize=16&scale=12&bbox=0,0,64,64",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // Whole-raster statistics keep the part well below white
    let img = decode_png(&body).to_luma_alpha8();
    assert!(img.pixels().all(|p| p[0] < 200));
}

// =============================================================================
// Part Endpoint Errors
// =============================================================================

#[tokio::test]
async fn test_bbox_malformed_is_400() {
    let dir = gradient_fixture();
    let (status, json) = get_json(
        create_test_router(dir.path(), None),
        "/bbox/16,16,32.png?url=gradient.png",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_parameters");
}

#[tokio::test]
async fn test_bbox_inverted_is_400() {
    let dir = gradient_fixture();
    let (status, json) = get_json(
        create_test_router(dir.path(), None),
        "/bbox/32,16,16,32.png?url=gradient.png&buffer=0",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_parameters");
}

#[tokio::test]
async fn test_bbox_missing_url_is_400() {
    let dir = gradient_fixture();
    let (status, _, _) = get(create_test_router(dir.path(), None), "/bbox/16,16,32,32.png").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bbox_unknown_algorithm_is_404() {
    let dir = gradient_fixture();
    let (status, json) = get_json(
        create_test_router(dir.path(), None),
        "/bbox/16,16,32,32.png?url=gradient.png&algorithm=sharpen",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "unknown_algorithm");
}

#[tokio::test]
async fn test_bbox_buffer_too_large_is_400() {
    let dir = gradient_fixture();
    // Default buffer 512 and tile size 256 need a 1280 pixel part
    let (status, json) = get_json(
        create_test_router(dir.path(), None),
        "/bbox/16,16,32,32.png?url=gradient.png&algorithm=histogram_equalize",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_buffer");
}

#[tokio::test]
async fn test_bbox_missing_asset_is_404() {
    let dir = gradient_fixture();
    let (status, json) = get_json(
        create_test_router(dir.path(), None),
        "/bbox/16,16,32,32.png?url=nope.png&buffer=0",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_bbox_outside_raster_is_404() {
    let dir = gradient_fixture();
    let (status, json) = get_json(
        create_test_router(dir.path(), None),
        "/bbox/100,100,120,120.png?url=gradient.png&buffer=0",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "outside_raster");
}

#[tokio::test]
async fn test_bbox_all_nodata_is_422() {
    let dir = gradient_fixture();
    let (status, json) = get_json(
        create_test_router(dir.path(), Some(0.0)),
        "/bbox/16,16,32,32.png?url=empty.png&buffer=0",
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "data_unavailable");
}

#[tokio::test]
async fn test_bbox_invalid_clip_limit_is_400() {
    let dir = gradient_fixture();
    let (status, json) = get_json(
        create_test_router(dir.path(), None),
        "/bbox/16,16,32,32.png?url=gradient.png&algorithm=adaptive_equalize&buffer=4&tilesize=16&clip_limit=-1",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_parameters");
}
