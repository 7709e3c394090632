// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Integration coverage for the registry's add/remove lifecycle and URI auto-detection
//! against adapters that never need a real camera (file adapter pointed at scratch files).

use std::sync::Arc;
use std::time::Duration;

use ingestd::distributor::LatestFrameCache;
use ingestd::registry::{AddSourceRequest, SourceManager};
use uuid::Uuid;

fn make_manager() -> Arc<SourceManager> {
    let (tx, _rx) = tokio::sync::mpsc::channel(30);
    let cache = Arc::new(LatestFrameCache::new());
    Arc::new(SourceManager::new(tx, cache, 10, 10.0, 0, 0.01, 0.5))
}

#[tokio::test]
async fn add_remove_round_trip_returns_to_prior_size_and_evicts_cache() {
    let manager = make_manager();
    let id = Uuid::new_v4();

    manager
        .add_source(AddSourceRequest {
            source_id: id,
            name: "missing clip".into(),
            source_type: None,
            uri: "does-not-exist.mp4".into(),
            target_fps: Some(5.0),
            reconnect_attempts: Some(0),
            reconnect_delay_s: Some(0.01),
            timeout_s: Some(0.2),
            username: None,
            password: None,
            loop_playback: Some(false),
        })
        .await
        .expect("construction succeeds even though connect will fail");

    assert_eq!(manager.source_count(), 1);

    // Give the capture task a moment to hit its connect failure and exit.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let status = manager.get_status(id).expect("status available while registered");
    assert!(status.error.is_some(), "missing file should record a connect error");

    assert!(manager.remove_source(id).await);
    assert_eq!(manager.source_count(), 0);
    assert!(manager.get_status(id).is_none());
}

#[tokio::test]
async fn removing_unknown_source_is_a_no_op_failure() {
    let manager = make_manager();
    assert!(!manager.remove_source(Uuid::new_v4()).await);
}

#[tokio::test]
async fn max_sources_limit_is_enforced() {
    let (tx, _rx) = tokio::sync::mpsc::channel(30);
    let cache = Arc::new(LatestFrameCache::new());
    let manager = Arc::new(SourceManager::new(tx, cache, 1, 10.0, 0, 0.01, 0.2));

    manager
        .add_source(AddSourceRequest {
            source_id: Uuid::new_v4(),
            name: "first".into(),
            source_type: None,
            uri: "a.mp4".into(),
            target_fps: None,
            reconnect_attempts: Some(0),
            reconnect_delay_s: None,
            timeout_s: None,
            username: None,
            password: None,
            loop_playback: Some(false),
        })
        .await
        .unwrap();

    let second = manager
        .add_source(AddSourceRequest {
            source_id: Uuid::new_v4(),
            name: "second".into(),
            source_type: None,
            uri: "b.mp4".into(),
            target_fps: None,
            reconnect_attempts: Some(0),
            reconnect_delay_s: None,
            timeout_s: None,
            username: None,
            password: None,
            loop_playback: Some(false),
        })
        .await;

    assert!(second.is_err());
}
