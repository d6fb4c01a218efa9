//! Test utilities for integration tests.
//!
//! This module provides a tracking mock asset reader, georeferenced raster
//! fixtures for the world-file reader, and a minimal RESP server standing in
//! for the remote statistics store.

use async_trait::async_trait;
use image::{GrayImage, Luma};
use ndarray::Array3;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use stats_tiler::error::ReadError;
use stats_tiler::raster::{AssetReader, BoundingBox, GeoTransform, ImageTile};

// =============================================================================
// Mock Asset Reader with Request Tracking
// =============================================================================

/// Asset reader serving fixed per-asset regions and counting reads.
///
/// Every `part` call for an asset returns the same pixels regardless of the
/// bbox, which is enough to observe when the statistics provider reads.
pub struct TrackingAssetReader {
    regions: HashMap<String, Array3<f32>>,
    read_count: AtomicUsize,
    requests: Mutex<Vec<(String, BoundingBox)>>,
    delay: Option<Duration>,
}

impl TrackingAssetReader {
    pub fn new() -> Self {
        Self {
            regions: HashMap::new(),
            read_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Serve `data` for `asset`.
    pub fn with_region(mut self, asset: impl Into<String>, data: Array3<f32>) -> Self {
        self.regions.insert(asset.into(), data);
        self
    }

    /// Sleep before answering each read.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn read_count(&self) -> usize {
        self.read_count.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<(String, BoundingBox)> {
        self.requests.lock().await.clone()
    }
}

impl Default for TrackingAssetReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetReader for TrackingAssetReader {
    async fn part(
        &self,
        asset: &str,
        bbox: &BoundingBox,
        _padding: usize,
    ) -> Result<ImageTile, ReadError> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push((asset.to_string(), *bbox));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let data = self
            .regions
            .get(asset)
            .cloned()
            .ok_or_else(|| ReadError::NotFound(asset.to_string()))?;

        Ok(ImageTile::new(
            data,
            GeoTransform::identity(),
            "EPSG:3857",
            *bbox,
            vec![asset.to_string()],
        ))
    }
}

// =============================================================================
// Tile Builders
// =============================================================================

/// Single-band tile over `(0, 0, width, height)` with pixel size 1.
pub fn tile_from_fn<F>(height: usize, width: usize, asset: &str, f: F) -> ImageTile
where
    F: Fn(usize, usize) -> f32,
{
    let data = Array3::from_shape_fn((1, height, width), |(_, r, c)| f(r, c));
    ImageTile::new(
        data,
        GeoTransform::from_origin(0.0, height as f64, 1.0, 1.0),
        "EPSG:3857",
        bbox(0.0, 0.0, width as f64, height as f64),
        vec![asset.to_string()],
    )
}

/// 1280x1280 tile of value 10 with a 256x256 block of 200 at (512, 512).
pub fn block_scene(asset: &str) -> ImageTile {
    tile_from_fn(1280, 1280, asset, |r, c| {
        if (512..768).contains(&r) && (512..768).contains(&c) {
            200.0
        } else {
            10.0
        }
    })
}

pub fn bbox(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox {
    BoundingBox::new(min_x, min_y, max_x, max_y).unwrap()
}

// =============================================================================
// World-File Raster Fixtures
// =============================================================================

/// Write a grayscale PNG with a `.pgw` placing its top-left corner at
/// `(0, height)` with 1 unit per pixel. Returns the image path.
pub fn write_raster<F>(dir: &Path, name: &str, width: u32, height: u32, f: F) -> PathBuf
where
    F: Fn(u32, u32) -> u8,
{
    let img = GrayImage::from_fn(width, height, |x, y| Luma([f(x, y)]));
    let path = dir.join(name);
    img.save(&path).unwrap();

    // Pixel-center convention: the first center sits half a pixel inside
    let world = format!("1.0\n0.0\n0.0\n-1.0\n0.5\n{}\n", f64::from(height) - 0.5);
    fs::write(path.with_extension("pgw"), world).unwrap();
    fs::write(path.with_extension("prj"), "EPSG:3857").unwrap();
    path
}

/// Decode PNG response bytes.
pub fn decode_png(bytes: &[u8]) -> image::DynamicImage {
    image::load_from_memory_with_format(bytes, image::ImageFormat::Png).unwrap()
}

/// Check if data is a valid PNG (starts with the PNG signature).
pub fn is_valid_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'])
}

// =============================================================================
// Fake RESP Store
// =============================================================================

/// In-process key-value server speaking the subset of RESP used by the
/// statistics store (`GET`, `SET key value EX seconds`).
pub struct FakeRespServer {
    pub port: u16,
    data: Arc<Mutex<HashMap<String, (String, u64)>>>,
    commands: Arc<AtomicUsize>,
    down: Arc<AtomicBool>,
}

impl FakeRespServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = Self {
            port,
            data: Arc::new(Mutex::new(HashMap::new())),
            commands: Arc::new(AtomicUsize::new(0)),
            down: Arc::new(AtomicBool::new(false)),
        };

        let data = Arc::clone(&server.data);
        let commands = Arc::clone(&server.commands);
        let down = Arc::clone(&server.down);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let data = Arc::clone(&data);
                let commands = Arc::clone(&commands);
                let down = Arc::clone(&down);
                tokio::spawn(async move {
                    let mut stream = BufStream::new(socket);
                    while let Some(args) = read_command(&mut stream).await {
                        if down.load(Ordering::SeqCst) {
                            return;
                        }
                        commands.fetch_add(1, Ordering::SeqCst);
                        let reply = match args.first().map(String::as_str) {
                            Some("GET") => match data.lock().await.get(&args[1]) {
                                Some((value, _)) => format!("${}\r\n{}\r\n", value.len(), value),
                                None => "$-1\r\n".to_string(),
                            },
                            Some("SET") => {
                                let ttl = args[4].parse().unwrap_or(0);
                                data.lock()
                                    .await
                                    .insert(args[1].clone(), (args[2].clone(), ttl));
                                "+OK\r\n".to_string()
                            }
                            _ => "-ERR unknown command\r\n".to_string(),
                        };
                        if stream.write_all(reply.as_bytes()).await.is_err()
                            || stream.flush().await.is_err()
                        {
                            return;
                        }
                    }
                });
            }
        });

        server
    }

    /// Drop every connection from now on.
    pub fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    pub fn command_count(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.data.lock().await.keys().cloned().collect()
    }

    pub async fn ttl_of(&self, key: &str) -> Option<u64> {
        self.data.lock().await.get(key).map(|(_, ttl)| *ttl)
    }
}

async fn read_command<S>(stream: &mut S) -> Option<Vec<String>>
where
    S: tokio::io::AsyncBufRead + Unpin,
{
    let header = read_line(stream).await?;
    let argc: usize = header.strip_prefix('*')?.parse().ok()?;

    let mut args = Vec::with_capacity(argc);
    for _ in 0..argc {
        let len: usize = read_line(stream).await?.strip_prefix('$')?.parse().ok()?;
        let mut buf = vec![0u8; len + 2];
        stream.read_exact(&mut buf).await.ok()?;
        buf.truncate(len);
        args.push(String::from_utf8(buf).ok()?);
    }
    Some(args)
}

async fn read_line<S>(stream: &mut S) -> Option<String>
where
    S: tokio::io::AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = stream.read_line(&mut line).await.ok()?;
    if n == 0 {
        return None;
    }
    Some(line.trim_end_matches("\r\n").to_string())
}
