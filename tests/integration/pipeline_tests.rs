//! End-to-end tests of the post-processing pipeline.
//!
//! These drive [`TileProcessor`] directly with hand-built tiles and with
//! tiles read from georeferenced PNG fixtures.

use std::sync::Arc;

use ndarray::Array3;
use stats_tiler::raster::AssetReader;
use stats_tiler::{
    AlgorithmParameters, ProcessError, RegionStatsProvider, StatsCache, TileProcessor,
    WorldFileReader, DEFAULT_SCALE_THRESHOLD, DEFAULT_STATS_TTL,
};

use super::test_utils::{bbox, block_scene, tile_from_fn, write_raster, TrackingAssetReader};

const ALGORITHMS: [&str; 3] = ["histogram_equalize", "adaptive_equalize", "bbox_rescale"];

fn processor_with(
    reader: TrackingAssetReader,
) -> (Arc<TrackingAssetReader>, TileProcessor<TrackingAssetReader>) {
    let reader = Arc::new(reader);
    let provider = RegionStatsProvider::new(
        Arc::clone(&reader),
        StatsCache::in_memory(DEFAULT_STATS_TTL),
        DEFAULT_SCALE_THRESHOLD,
    );
    (reader, TileProcessor::new(provider))
}

fn file_processor(root: &std::path::Path, nodata: Option<f32>) -> TileProcessor<WorldFileReader> {
    let mut reader = WorldFileReader::new().with_root(root);
    if let Some(nodata) = nodata {
        reader = reader.with_nodata(nodata);
    }
    let provider = RegionStatsProvider::new(
        Arc::new(reader),
        StatsCache::in_memory(DEFAULT_STATS_TTL),
        DEFAULT_SCALE_THRESHOLD,
    );
    TileProcessor::new(provider)
}

// =============================================================================
// Rescale And Crop
// =============================================================================

#[tokio::test]
async fn test_block_scene_rescales_and_crops_to_block() {
    let (reader, processor) = processor_with(TrackingAssetReader::new());
    let params = AlgorithmParameters::default()
        .with_bbox(bbox(0.0, 0.0, 1280.0, 1280.0))
        .with_scale(1)
        .with_buffer(512)
        .with_tile_size(256);

    let out = processor
        .process("bbox_rescale", block_scene("scene.png"), &params)
        .await
        .unwrap();

    assert_eq!(out.data().dim(), (1, 256, 256));
    assert!(out.data().iter().all(|&v| v == 255.0));
    assert_eq!(out.invalid_count(), 0);
    assert_eq!(out.transform().apply(0.0, 0.0), (512.0, 768.0));
    assert_eq!(reader.read_count(), 0, "low scale must not read the asset");
}

#[tokio::test]
async fn test_crop_boundary_reaches_background() {
    let (_, processor) = processor_with(TrackingAssetReader::new());
    let params = AlgorithmParameters::default()
        .with_bbox(bbox(0.0, 0.0, 1280.0, 1280.0))
        .with_buffer(511)
        .with_tile_size(2);

    let out = processor
        .process("bbox_rescale", block_scene("scene.png"), &params)
        .await
        .unwrap();

    assert_eq!(out.data().dim(), (1, 2, 2));
    assert_eq!(out.data()[[0, 0, 0]], 0.0);
    assert_eq!(out.data()[[0, 1, 1]], 255.0);
}

#[tokio::test]
async fn test_high_scale_uses_region_statistics() {
    let region = Array3::from_shape_fn((1, 10, 10), |(_, r, c)| (r * 10 + c) as f32 + 1.0);
    let (reader, processor) =
        processor_with(TrackingAssetReader::new().with_region("scene.png", region));
    let params = AlgorithmParameters::default()
        .with_bbox(bbox(0.0, 0.0, 8.0, 8.0))
        .with_scale(DEFAULT_SCALE_THRESHOLD + 1)
        .with_buffer(0);

    let tile = tile_from_fn(8, 8, "scene.png", |_, _| 50.5);
    let out = processor.process("bbox_rescale", tile, &params).await.unwrap();

    // Region spans 1..=100, so 50.5 lands in the middle
    let expected = (49.5 / 99.0) * 255.0;
    assert!(out.data().iter().all(|&v| (f64::from(v) - expected).abs() < 1e-3));
    assert_eq!(reader.read_count(), 1);
}

// =============================================================================
// Mask Propagation
// =============================================================================

#[tokio::test]
async fn test_every_algorithm_masks_and_zeroes_nodata() {
    for name in ALGORITHMS {
        let (_, processor) = processor_with(TrackingAssetReader::new());
        let tile = tile_from_fn(12, 12, "scene.png", |r, c| {
            if (r, c) == (5, 6) {
                f32::NAN
            } else {
                (r * 12 + c) as f32
            }
        });
        let params = AlgorithmParameters::default()
            .with_bbox(bbox(0.0, 0.0, 12.0, 12.0))
            .with_buffer(2)
            .with_tile_size(8);

        let out = processor.process(name, tile, &params).await.unwrap();

        assert_eq!(out.data().dim(), (1, 8, 8), "{}", name);
        assert_eq!(out.invalid_count(), 1, "{}", name);
        assert!(out.mask()[[3, 4]], "{}", name);
        assert_eq!(out.data()[[0, 3, 4]], 0.0, "{}", name);
        assert_eq!(out.mask_bytes()[[3, 4]], 255, "{}", name);
        assert_eq!(out.mask_bytes()[[0, 0]], 0, "{}", name);
        assert!(out.data().iter().all(|v| v.is_finite()), "{}", name);
    }
}

#[tokio::test]
async fn test_all_nodata_tile_is_data_unavailable() {
    for name in ALGORITHMS {
        let (_, processor) = processor_with(TrackingAssetReader::new());
        let tile = tile_from_fn(12, 12, "scene.png", |_, _| f32::NAN);
        let params = AlgorithmParameters::default()
            .with_bbox(bbox(0.0, 0.0, 12.0, 12.0))
            .with_buffer(2)
            .with_tile_size(8);

        let err = processor.process(name, tile, &params).await.unwrap_err();
        assert!(
            matches!(err, ProcessError::DataUnavailable { .. }),
            "{}: {:?}",
            name,
            err
        );
    }
}

#[tokio::test]
async fn test_buffer_larger_than_tile_reads_nothing() {
    let region = Array3::from_elem((1, 4, 4), 1.0);
    for name in ALGORITHMS {
        let (reader, processor) =
            processor_with(TrackingAssetReader::new().with_region("scene.png", region.clone()));
        let tile = tile_from_fn(64, 64, "scene.png", |r, _| r as f32);
        let params = AlgorithmParameters::default()
            .with_bbox(bbox(0.0, 0.0, 64.0, 64.0))
            .with_scale(DEFAULT_SCALE_THRESHOLD + 4)
            .with_buffer(512)
            .with_tile_size(256);

        let err = processor.process(name, tile, &params).await.unwrap_err();
        assert!(matches!(err, ProcessError::InvalidBuffer { .. }), "{}", name);
        assert_eq!(reader.read_count(), 0, "{}", name);
    }
}

// =============================================================================
// World-File Assets
// =============================================================================

#[tokio::test]
async fn test_world_file_part_through_rescale() {
    let dir = tempfile::tempdir().unwrap();
    write_raster(dir.path(), "gradient.png", 64, 64, |x, _| (x * 4) as u8);
    let processor = file_processor(dir.path(), None);

    let part = bbox(16.0, 16.0, 32.0, 32.0);
    let tile = processor
        .reader()
        .part("gradient.png", &part, 4)
        .await
        .unwrap();
    assert_eq!(tile.data().dim(), (1, 24, 24));

    let params = AlgorithmParameters::default()
        .with_bbox(part)
        .with_buffer(4)
        .with_tile_size(16);
    let out = processor.process("bbox_rescale", tile, &params).await.unwrap();

    assert_eq!(out.data().dim(), (1, 16, 16));
    assert_eq!(out.invalid_count(), 0);
    // Columns increase left to right across the whole output
    let row = out.data().slice(ndarray::s![0, 0, ..]).to_vec();
    assert!(row.windows(2).all(|w| w[0] < w[1]));
    assert!(row.iter().all(|&v| (0.0..=255.0).contains(&v)));
}

#[tokio::test]
async fn test_world_file_nodata_column_is_masked() {
    let dir = tempfile::tempdir().unwrap();
    write_raster(dir.path(), "gradient.png", 64, 64, |x, _| (x * 4) as u8);
    let processor = file_processor(dir.path(), Some(0.0));

    let part = bbox(0.0, 48.0, 16.0, 64.0);
    let tile = processor
        .reader()
        .part("gradient.png", &part, 0)
        .await
        .unwrap();
    let params = AlgorithmParameters::default()
        .with_bbox(part)
        .with_buffer(0)
        .with_tile_size(16);
    let out = processor.process("bbox_rescale", tile, &params).await.unwrap();

    assert_eq!(out.data().dim(), (1, 16, 16));
    assert_eq!(out.invalid_count(), 16);
    for r in 0..16 {
        assert!(out.mask()[[r, 0]]);
        assert_eq!(out.data()[[0, r, 0]], 0.0);
        assert_eq!(out.data()[[0, r, 15]], 255.0);
    }
}

#[tokio::test]
async fn test_world_file_region_statistics_at_high_scale() {
    let dir = tempfile::tempdir().unwrap();
    write_raster(dir.path(), "gradient.png", 64, 64, |x, _| (x * 4) as u8);
    let processor = file_processor(dir.path(), None);

    // The whole raster spans 0..=252; the part alone would span 64..=124
    let whole = bbox(0.0, 0.0, 64.0, 64.0);
    let part = bbox(16.0, 16.0, 32.0, 32.0);
    let tile = processor
        .reader()
        .part("gradient.png", &part, 0)
        .await
        .unwrap();
    let params = AlgorithmParameters::default()
        .with_bbox(whole)
        .with_scale(DEFAULT_SCALE_THRESHOLD + 1)
        .with_buffer(0)
        .with_tile_size(16);

    let out = processor.process("bbox_rescale", tile, &params).await.unwrap();

    let first = f64::from(out.data()[[0, 0, 0]]);
    assert!((first - 64.0 / 252.0 * 255.0).abs() < 1e-3);
    assert!(out.data().iter().all(|&v| v < 255.0));
}
