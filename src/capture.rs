// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Per-source capture loop (§4.2). One tokio task per adapter; cancellation is cooperative
//! via a `watch` channel so the adapter gets to disconnect cleanly before the task ends,
//! unlike the teacher's plain `JoinHandle::abort()` for recording workers.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::adapter::Adapter;
use crate::frame::Frame;

/// Runs the capture loop until `shutdown` fires or the reconnect procedure is exhausted.
/// `queue_tx` is the shared frame queue; puts are always non-blocking (`try_send`) so a
/// saturated queue never stalls the producer.
pub async fn run(mut adapter: Adapter, queue_tx: mpsc::Sender<Frame>, mut shutdown: watch::Receiver<bool>) {
    adapter.stats.set_running(true);
    let source_id = adapter.params.source_id;

    loop {
        if *shutdown.borrow() {
            break;
        }

        if !adapter.stats.is_connected() {
            if !reconnect(&mut adapter, &mut shutdown).await {
                break;
            }
            continue;
        }

        let step_start = Instant::now();

        let frame = adapter.read().await;
        if let Some(frame) = frame {
            match queue_tx.try_send(frame) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(source_id = %source_id, "frame queue full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(source_id = %source_id, "frame queue closed, stopping capture");
                    break;
                }
            }
        } else if !adapter.stats.is_connected() {
            // Reconnect path is reached on the next iteration without sleeping first.
            continue;
        }

        let elapsed = step_start.elapsed();
        // target_fps > 0 is enforced by registry::validate_adapter_params before this task
        // is ever spawned.
        let period = Duration::from_secs_f64(1.0 / adapter.params.target_fps);
        if period > elapsed {
            let sleep = tokio::time::sleep(period - elapsed);
            tokio::select! {
                _ = sleep => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    adapter.disconnect();
    info!(source_id = %source_id, "capture loop exited");
}

/// Attempts `connect` repeatedly until success, shutdown, or the attempt ceiling is reached.
/// Returns `false` when the procedure is exhausted (the run loop must exit).
async fn reconnect(adapter: &mut Adapter, shutdown: &mut watch::Receiver<bool>) -> bool {
    loop {
        if *shutdown.borrow() {
            return false;
        }

        adapter.stats.note_reconnect_attempt();
        if adapter.connect().await {
            return true;
        }

        let ceiling = adapter.params.reconnect_attempts;
        if ceiling >= 0 && adapter.stats.reconnect_count() as i64 >= ceiling as i64 {
            warn!(source_id = %adapter.params.source_id, "reconnect attempts exhausted");
            return false;
        }

        let delay = Duration::from_secs_f64(adapter.params.reconnect_delay_s.max(0.0));
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::stub::StubAdapter;
    use crate::adapter::{AdapterBackend, AdapterParams};
    use uuid::Uuid;

    fn params(target_fps: f64, reconnect_attempts: i32) -> AdapterParams {
        AdapterParams {
            source_id: Uuid::new_v4(),
            name: "test".into(),
            uri: "stub".into(),
            target_fps,
            reconnect_attempts,
            reconnect_delay_s: 0.01,
            timeout_s: 1.0,
            username: None,
            password: None,
            loop_playback: true,
        }
    }

    #[tokio::test]
    async fn paces_to_target_fps() {
        let backend = AdapterBackend::Stub(StubAdapter::new());
        let adapter = Adapter::new(params(10.0, -1), backend);
        let (tx, mut rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run(adapter, tx, shutdown_rx));
        tokio::time::sleep(Duration::from_millis(2000)).await;
        let _ = shutdown_tx.send(true);
        let _ = handle.await;

        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert!((15..=25).contains(&count), "expected ~20 frames in 2s at 10fps, got {count}");
    }

    #[tokio::test]
    async fn reconnect_attempts_zero_exits_on_first_failure() {
        let mut stub = StubAdapter::new();
        stub.connect_failures_remaining = 1;
        let backend = AdapterBackend::Stub(stub);
        let adapter = Adapter::new(params(10.0, 0), backend);
        let (tx, _rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run(adapter, tx, shutdown_rx));
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "loop should exit promptly when reconnect_attempts=0");
    }

    #[tokio::test]
    async fn reconnect_eventually_succeeds() {
        let mut stub = StubAdapter::new();
        stub.connect_failures_remaining = 3;
        let backend = AdapterBackend::Stub(stub);
        let mut adapter_params = params(10.0, -1);
        adapter_params.reconnect_delay_s = 0.01;
        let adapter = Adapter::new(adapter_params, backend);
        let (tx, mut rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run(adapter, tx, shutdown_rx));
        tokio::time::sleep(Duration::from_millis(500)).await;
        let _ = shutdown_tx.send(true);
        let _ = handle.await;

        assert!(rx.try_recv().is_ok(), "expected at least one frame after reconnecting");
    }
}
