// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Protocol tag of the source that produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Rtsp,
    Mjpeg,
    Usb,
    File,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Rtsp => "rtsp",
            Protocol::Mjpeg => "mjpeg",
            Protocol::Usb => "usb",
            Protocol::File => "file",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-frame capture metadata.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureMeta {
    pub protocol: Protocol,
    pub codec: Option<String>,
    /// Wall time spent inside the underlying primitive-read call.
    pub latency_ms: f64,
    /// Cumulative dropped-frame count on the producing source at emission time.
    pub dropped_frames: u64,
    /// Current rolling-average FPS at emission time.
    pub fps_measured: f64,
}

/// A single captured image plus metadata, as it flows from an adapter to the distributor.
#[derive(Debug, Clone)]
pub struct Frame {
    pub source_id: Uuid,
    /// Monotonically increasing per-source counter; starts at 1, survives reconnects.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    /// Raw 3-channel BGR, 8-bit unsigned pixel buffer.
    pub image: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub capture_meta: CaptureMeta,
}

impl Frame {
    /// `image` dimensions must equal `(height, width, channels)`; callers never construct
    /// a Frame with a null image.
    pub fn new(
        source_id: Uuid,
        sequence: u64,
        image: Vec<u8>,
        width: u32,
        height: u32,
        capture_meta: CaptureMeta,
    ) -> Self {
        debug_assert_eq!(image.len(), (width * height * 3) as usize);
        Self {
            source_id,
            sequence,
            timestamp: Utc::now(),
            image,
            width,
            height,
            channels: 3,
            capture_meta,
        }
    }
}

/// A raw decoded image handed up from a primitive-read, before it is wrapped into a Frame.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}
