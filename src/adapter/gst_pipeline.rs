// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Shared GStreamer pipeline plumbing used by the RTSP, MJPEG and file adapters.
//!
//! Generalized from `onurtuna-OasisNvr`'s `camera::CameraStream`: build a pipeline string,
//! pull decoded frames out of an `appsink` callback into a bounded channel, and watch the bus
//! for EOS/error so the capture loop can react without blocking on GStreamer directly.

use std::time::Duration;

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use tokio::sync::mpsc;

use crate::error::{IngestError, Result};
use crate::frame::RawImage;

/// Events surfaced from the pipeline's bus/appsink to the owning adapter.
pub enum GstEvent {
    Frame(RawImage),
    Eos,
    Error(String),
}

pub struct GstPipelineCore {
    pipeline: Option<gst::Pipeline>,
    rx: Option<mpsc::Receiver<GstEvent>>,
}

impl GstPipelineCore {
    pub fn new() -> Self {
        Self { pipeline: None, rx: None }
    }

    /// Builds and plays a pipeline. `description` must end in `... ! appsink name=sink`.
    pub fn connect(&mut self, description: &str) -> Result<()> {
        let element = gst::parse::launch(description).map_err(|e| IngestError::Pipeline(e.to_string()))?;
        let pipeline = element
            .downcast::<gst::Pipeline>()
            .map_err(|_| IngestError::Pipeline("parsed element is not a pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| IngestError::Pipeline("pipeline has no element named 'sink'".into()))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| IngestError::Pipeline("'sink' element is not an appsink".into()))?;

        appsink.set_property("max-buffers", 1u32);
        appsink.set_property("drop", true);

        let (tx, rx) = mpsc::channel(2);

        let frame_tx = tx.clone();
        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    let caps = sample.caps().ok_or(gst::FlowError::Error)?;
                    let info = gst_video::VideoInfo::from_caps(caps)
                        .map_err(|_| gst::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;

                    let image = RawImage {
                        data: map.as_slice().to_vec(),
                        width: info.width(),
                        height: info.height(),
                    };
                    let _ = frame_tx.try_send(GstEvent::Frame(image));
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        let bus = pipeline.bus().ok_or_else(|| IngestError::Pipeline("pipeline has no bus".into()))?;
        let bus_tx = tx.clone();
        std::thread::spawn(move || {
            for msg in bus.iter_timed(gst::ClockTime::NONE) {
                use gst::MessageView;
                match msg.view() {
                    MessageView::Eos(_) => {
                        let _ = bus_tx.blocking_send(GstEvent::Eos);
                        break;
                    }
                    MessageView::Error(err) => {
                        let _ = bus_tx.blocking_send(GstEvent::Error(err.error().to_string()));
                        break;
                    }
                    _ => {}
                }
            }
        });

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| IngestError::Pipeline(format!("failed to start pipeline: {e}")))?;

        self.pipeline = Some(pipeline);
        self.rx = Some(rx);
        Ok(())
    }

    pub async fn read(&mut self, timeout: Duration) -> Option<GstEvent> {
        let rx = self.rx.as_mut()?;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    /// Seeks back to the first frame; used by the file adapter's loop behavior.
    pub fn seek_to_start(&self) -> Result<()> {
        let pipeline = self.pipeline.as_ref().ok_or_else(|| IngestError::Pipeline("pipeline not connected".into()))?;
        pipeline
            .seek_simple(gst::SeekFlags::FLUSH, gst::ClockTime::ZERO)
            .map_err(|e| IngestError::Pipeline(e.to_string()))
    }

    pub fn disconnect(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            let _ = pipeline.set_state(gst::State::Null);
        }
        self.rx = None;
    }

    pub fn is_connected(&self) -> bool {
        self.pipeline.is_some()
    }
}

impl Default for GstPipelineCore {
    fn default() -> Self {
        Self::new()
    }
}
