// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Frame distributor (§4.4): the single consumer of the shared queue, encoding each frame to
//! JPEG and overwriting a per-source single-slot cache read by the MJPEG HTTP stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use image::{ImageBuffer, Rgb};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::frame::Frame;

const JPEG_QUALITY: u8 = 80;

/// Single-slot-per-source map of the most recent JPEG-encoded frame. Written only by the
/// distributor, read by HTTP stream tasks; guarded with a read-favored lock since the
/// coordination layer here is multi-threaded (§5).
pub struct LatestFrameCache {
    frames: RwLock<HashMap<Uuid, Bytes>>,
}

impl LatestFrameCache {
    pub fn new() -> Self {
        Self { frames: RwLock::new(HashMap::new()) }
    }

    pub fn get(&self, source_id: Uuid) -> Option<Bytes> {
        self.frames.read().get(&source_id).cloned()
    }

    fn put(&self, source_id: Uuid, jpeg: Bytes) {
        self.frames.write().insert(source_id, jpeg);
    }

    pub fn evict(&self, source_id: Uuid) {
        self.frames.write().remove(&source_id);
    }

    pub fn contains(&self, source_id: Uuid) -> bool {
        self.frames.read().contains_key(&source_id)
    }
}

impl Default for LatestFrameCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Drains `queue_rx` until the channel is closed (registry/process shutdown). Encoding
/// errors are logged and the frame is skipped with a brief delay before the next iteration.
pub async fn run(mut queue_rx: mpsc::Receiver<Frame>, cache: Arc<LatestFrameCache>) {
    while let Some(frame) = queue_rx.recv().await {
        match encode_jpeg(&frame) {
            Ok(jpeg) => cache.put(frame.source_id, Bytes::from(jpeg)),
            Err(e) => {
                warn!(source_id = %frame.source_id, error = %e, "JPEG encode failed, skipping frame");
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}

fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>, String> {
    // BGR -> RGB: the `image` crate's JPEG encoder only understands RGB buffers.
    let mut rgb = frame.image.clone();
    rgb.chunks_exact_mut(3).for_each(|px| px.swap(0, 2));

    let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_raw(frame.width, frame.height, rgb)
        .ok_or_else(|| "frame buffer does not match width/height".to_string())?;

    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode(buffer.as_raw(), frame.width, frame.height, image::ExtendedColorType::Rgb8)
        .map_err(|e| e.to_string())?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CaptureMeta, Protocol};

    fn sample_frame(source_id: Uuid, sequence: u64) -> Frame {
        Frame::new(
            source_id,
            sequence,
            vec![0u8; 4 * 4 * 3],
            4,
            4,
            CaptureMeta { protocol: Protocol::File, codec: None, latency_ms: 0.0, dropped_frames: 0, fps_measured: 0.0 },
        )
    }

    #[tokio::test]
    async fn encodes_and_caches_latest_frame_per_source() {
        let cache = Arc::new(LatestFrameCache::new());
        let (tx, rx) = mpsc::channel(8);
        let id = Uuid::new_v4();

        tx.send(sample_frame(id, 1)).await.unwrap();
        tx.send(sample_frame(id, 2)).await.unwrap();
        drop(tx);

        run(rx, cache.clone()).await;
        assert!(cache.get(id).is_some());
    }

    #[tokio::test]
    async fn evict_removes_entry() {
        let cache = Arc::new(LatestFrameCache::new());
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(8);
        tx.send(sample_frame(id, 1)).await.unwrap();
        drop(tx);
        run(rx, cache.clone()).await;
        assert!(cache.contains(id));
        cache.evict(id);
        assert!(!cache.contains(id));
    }
}
