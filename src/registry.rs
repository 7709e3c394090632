// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Source registry (§4.3), generalized from the teacher's `RecordingManager`: a hot-swappable
//! map of running capture tasks plus the one shared bounded frame queue they all feed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::adapter::{build_backend, detect_source_type, Adapter, AdapterBackend, AdapterParams, AdapterStats};
use crate::distributor::LatestFrameCache;
use crate::error::{IngestError, Result};
use crate::frame::{Frame, Protocol};
use crate::status::SourceStatus;

/// Request shape for `add_source`, mirroring the `/sources/start` body (§6).
pub struct AddSourceRequest {
    pub source_id: Uuid,
    pub name: String,
    pub source_type: Option<String>,
    pub uri: String,
    pub target_fps: Option<f64>,
    pub reconnect_attempts: Option<i32>,
    pub reconnect_delay_s: Option<f64>,
    pub timeout_s: Option<f64>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub loop_playback: Option<bool>,
}

struct SourceEntry {
    stats: Arc<AdapterStats>,
    target_fps: f64,
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Process-wide singleton: holds every running adapter plus the shared queue and latest-frame
/// cache they feed. Passed around as an explicit `Arc<SourceManager>` application context
/// rather than a module global, per the "global-ish state" design note.
pub struct SourceManager {
    sources: RwLock<HashMap<Uuid, SourceEntry>>,
    queue_tx: mpsc::Sender<Frame>,
    cache: Arc<LatestFrameCache>,
    max_sources: usize,
    default_target_fps: f64,
    default_reconnect_attempts: i32,
    default_reconnect_delay_s: f64,
    default_timeout_s: f64,
}

impl SourceManager {
    pub fn new(
        queue_tx: mpsc::Sender<Frame>,
        cache: Arc<LatestFrameCache>,
        max_sources: usize,
        default_target_fps: f64,
        default_reconnect_attempts: i32,
        default_reconnect_delay_s: f64,
        default_timeout_s: f64,
    ) -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            queue_tx,
            cache,
            max_sources,
            default_target_fps,
            default_reconnect_attempts,
            default_reconnect_delay_s,
            default_timeout_s,
        }
    }

    /// Deterministic replacement when `source_id` already exists. Auto-detects `source_type`
    /// when absent; unknown explicit types fail with a well-defined error.
    pub async fn add_source(self: &Arc<Self>, req: AddSourceRequest) -> Result<()> {
        if self.sources.read().contains_key(&req.source_id) {
            self.remove_source(req.source_id).await;
        } else if self.sources.read().len() >= self.max_sources {
            return Err(IngestError::MaxSourcesReached { max: self.max_sources });
        }

        let protocol = match req.source_type {
            Some(t) => parse_protocol(&t)?,
            None => detect_source_type(&req.uri),
        };

        let params = AdapterParams {
            source_id: req.source_id,
            name: req.name,
            uri: req.uri,
            target_fps: req.target_fps.unwrap_or(self.default_target_fps),
            reconnect_attempts: req.reconnect_attempts.unwrap_or(self.default_reconnect_attempts),
            reconnect_delay_s: req.reconnect_delay_s.unwrap_or(self.default_reconnect_delay_s),
            timeout_s: req.timeout_s.unwrap_or(self.default_timeout_s),
            username: req.username,
            password: req.password,
            loop_playback: req.loop_playback.unwrap_or(true),
        };
        validate_adapter_params(&params)?;

        let source_id = params.source_id;
        let backend = build_backend(protocol, &params);
        self.spawn_adapter(params, backend);

        info!(source_id = %source_id, protocol = %protocol, "source added");
        Ok(())
    }

    /// Shared by `add_source` and, in tests, by synthetic stub-backed sources: builds the
    /// `Adapter`, spawns its capture task, and registers the entry.
    fn spawn_adapter(&self, params: AdapterParams, backend: AdapterBackend) {
        let adapter = Adapter::new(params.clone(), backend);
        let stats = adapter.stats.clone();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let queue_tx = self.queue_tx.clone();
        let handle = tokio::spawn(crate::capture::run(adapter, queue_tx, shutdown_rx));

        self.sources.write().insert(
            params.source_id,
            SourceEntry { stats, target_fps: params.target_fps, handle, shutdown: shutdown_tx },
        );
    }

    /// Test-only construction path for a `Stub`-backed source, bypassing protocol detection
    /// and `build_backend` so registry tests never spin up a real GStreamer pipeline.
    #[cfg(test)]
    pub async fn add_stub_source(self: &Arc<Self>, source_id: Uuid, reconnect_attempts: i32) -> Result<()> {
        if self.sources.read().contains_key(&source_id) {
            self.remove_source(source_id).await;
        } else if self.sources.read().len() >= self.max_sources {
            return Err(IngestError::MaxSourcesReached { max: self.max_sources });
        }

        let params = AdapterParams {
            source_id,
            name: "stub".into(),
            uri: "stub".into(),
            target_fps: self.default_target_fps,
            reconnect_attempts,
            reconnect_delay_s: self.default_reconnect_delay_s,
            timeout_s: self.default_timeout_s,
            username: None,
            password: None,
            loop_playback: true,
        };
        let backend = crate::adapter::AdapterBackend::Stub(crate::adapter::stub::StubAdapter::new());
        self.spawn_adapter(params, backend);
        Ok(())
    }

    /// Removes a source, cancels its task (after signalling it to disconnect cleanly), and
    /// evicts its latest-frame cache entry. Idempotent: a missing id is a no-op failure.
    pub async fn remove_source(&self, source_id: Uuid) -> bool {
        let entry = self.sources.write().remove(&source_id);
        let Some(entry) = entry else { return false };

        let _ = entry.shutdown.send(true);
        // Swallow cancellation/join errors: the task is responsible for disconnecting
        // itself before it observes shutdown=true and exits.
        let _ = entry.handle.await;

        self.cache.evict(source_id);
        info!(source_id = %source_id, "source removed");
        true
    }

    pub fn get_status(&self, source_id: Uuid) -> Option<SourceStatus> {
        self.sources.read().get(&source_id).map(|e| e.stats.status(source_id, e.target_fps))
    }

    pub fn get_all_status(&self) -> HashMap<Uuid, SourceStatus> {
        self.sources
            .read()
            .iter()
            .map(|(id, e)| (*id, e.stats.status(*id, e.target_fps)))
            .collect()
    }

    pub async fn stop_all(&self) {
        let ids: Vec<Uuid> = self.sources.read().keys().copied().collect();
        for id in ids {
            self.remove_source(id).await;
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.read().len()
    }

    pub fn online_count(&self) -> usize {
        self.sources
            .read()
            .iter()
            .filter(|(id, e)| e.stats.status(**id, e.target_fps).state.counts_as_online())
            .count()
    }
}

/// Rejects parameter combinations that would otherwise panic or hang deep inside the capture
/// loop — a bad `target_fps` divides by zero when computing the pacing period (§4.2).
fn validate_adapter_params(params: &AdapterParams) -> Result<()> {
    if !(params.target_fps > 0.0) {
        return Err(IngestError::Config("target_fps must be > 0".into()));
    }
    if !(params.timeout_s > 0.0) {
        return Err(IngestError::Config("timeout_s must be > 0".into()));
    }
    if !(params.reconnect_delay_s >= 0.0) {
        return Err(IngestError::Config("reconnect_delay_s must be >= 0".into()));
    }
    Ok(())
}

fn parse_protocol(s: &str) -> Result<Protocol> {
    match s {
        "rtsp" => Ok(Protocol::Rtsp),
        "mjpeg" => Ok(Protocol::Mjpeg),
        "usb" => Ok(Protocol::Usb),
        "file" => Ok(Protocol::File),
        // The original catalog also accepts "onvif" as an alias for RTSP discovery profiles;
        // ONVIF devices are addressed over the same RTSP media URI once discovered.
        "onvif" => Ok(Protocol::Rtsp),
        other => Err(IngestError::UnsupportedSourceType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributor::LatestFrameCache;

    fn make_manager() -> Arc<SourceManager> {
        let (tx, _rx) = mpsc::channel(30);
        let cache = Arc::new(LatestFrameCache::new());
        Arc::new(SourceManager::new(tx, cache, 10, 10.0, -1, 0.01, 1.0))
    }

    #[tokio::test]
    async fn add_then_remove_returns_to_prior_size() {
        let manager = make_manager();
        let id = Uuid::new_v4();
        manager.add_stub_source(id, 0).await.unwrap();
        assert_eq!(manager.source_count(), 1);
        assert!(manager.remove_source(id).await);
        assert_eq!(manager.source_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_id_yields_exactly_one_adapter() {
        let manager = make_manager();
        let id = Uuid::new_v4();
        for _ in 0..2 {
            manager.add_stub_source(id, 0).await.unwrap();
        }
        assert_eq!(manager.source_count(), 1);
    }

    #[tokio::test]
    async fn rejects_non_positive_target_fps() {
        let manager = make_manager();
        let result = manager
            .add_source(AddSourceRequest {
                source_id: Uuid::new_v4(),
                name: "cam".into(),
                source_type: Some("file".into()),
                uri: "does-not-exist.mp4".into(),
                target_fps: Some(0.0),
                reconnect_attempts: Some(0),
                reconnect_delay_s: None,
                timeout_s: None,
                username: None,
                password: None,
                loop_playback: None,
            })
            .await;
        assert!(result.is_err());
        assert_eq!(manager.source_count(), 0);
    }

    #[tokio::test]
    async fn unsupported_source_type_fails() {
        let manager = make_manager();
        let result = manager
            .add_source(AddSourceRequest {
                source_id: Uuid::new_v4(),
                name: "cam".into(),
                source_type: Some("bogus".into()),
                uri: "whatever".into(),
                target_fps: None,
                reconnect_attempts: None,
                reconnect_delay_s: None,
                timeout_s: None,
                username: None,
                password: None,
                loop_playback: None,
            })
            .await;
        assert!(result.is_err());
    }
}
