// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    Connecting,
    Online,
    Degraded,
    Offline,
    Error,
}

impl SourceState {
    /// `online` in the registry's `online_count` sense means online or degraded.
    pub fn counts_as_online(&self) -> bool {
        matches!(self, SourceState::Online | SourceState::Degraded)
    }
}

/// Snapshot derived on demand from an adapter's internal counters.
///
/// `connecting` is wired explicitly (set while the initial connect call is in flight) rather
/// than left permanently unreachable — see the "connecting" open question in DESIGN.md.
#[derive(Debug, Clone)]
pub struct SourceStatus {
    pub source_id: Uuid,
    pub state: SourceState,
    pub fps_current: f64,
    pub fps_target: f64,
    pub frames_total: u64,
    pub frames_dropped: u64,
    pub last_frame_at: Option<DateTime<Utc>>,
    /// Monotonic seconds since most recent successful connect; 0 if never connected.
    pub uptime_s: f64,
    pub error: Option<String>,
    pub reconnect_count: u32,
    /// Time since last frame, not last-read latency.
    pub latency_ms: f64,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

impl SourceStatus {
    /// JSON projection used by the HTTP/WebSocket boundary. Excludes any credential fields —
    /// there are none on this type, by construction.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "source_id": self.source_id.to_string(),
            "state": match self.state {
                SourceState::Connecting => "connecting",
                SourceState::Online => "online",
                SourceState::Degraded => "degraded",
                SourceState::Offline => "offline",
                SourceState::Error => "error",
            },
            "fps_current": round1(self.fps_current),
            "fps_target": self.fps_target,
            "frames_total": self.frames_total,
            "frames_dropped": self.frames_dropped,
            "last_frame_at": self.last_frame_at.map(|t| t.to_rfc3339()),
            "uptime_s": round1(self.uptime_s),
            "error": self.error,
            "reconnect_count": self.reconnect_count,
            "latency_ms": round1(self.latency_ms),
        })
    }
}
