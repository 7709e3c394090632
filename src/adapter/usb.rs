// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! USB/UVC capture via V4L2, grounded on `mofeng-git-One-KVM`'s direct-capture thread: a
//! dedicated blocking thread owns the device and `MmapStream`, forwarding decoded frames
//! over a bounded channel so the coordination layer never touches `v4l` directly.

use std::time::Duration;

use tokio::sync::mpsc;
use v4l::buffer::Type as BufferType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

use crate::adapter::PrimitiveRead;
use crate::error::{IngestError, Result};
use crate::frame::RawImage;

enum UsbEvent {
    Frame(RawImage),
    Lost(String),
}

/// Raw OS error codes that indicate the device itself went away rather than a transient
/// read hiccup.
fn is_device_lost(err: &std::io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::ENXIO) | Some(libc::ENODEV) | Some(libc::EIO) | Some(libc::EPIPE) | Some(libc::ESHUTDOWN)
    )
}

pub struct UsbAdapter {
    device_index: u32,
    rx: Option<mpsc::Receiver<UsbEvent>>,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl UsbAdapter {
    /// Parses `"0"`, `"/dev/video2"`, etc. Strips whitespace; tries the `/dev/videoN` prefix
    /// first, then a bare integer, and finally falls back to device 0.
    pub fn parse_device_index(uri: &str) -> u32 {
        let trimmed = uri.trim();
        if let Some(rest) = trimmed.strip_prefix("/dev/video") {
            if let Ok(n) = rest.parse() {
                return n;
            }
        }
        trimmed.parse().unwrap_or(0)
    }

    pub fn new(uri: &str) -> Self {
        Self { device_index: Self::parse_device_index(uri), rx: None, stop_tx: None, thread: None }
    }

    /// Blocks until the capture thread has actually opened the device (or failed to), so the
    /// connect contract matches the GStreamer-backed adapters: `Ok(())` only once the session
    /// is really up.
    pub fn primitive_connect(&mut self, timeout: Duration) -> Result<()> {
        let (frame_tx, frame_rx) = mpsc::channel(2);
        let (stop_tx, stop_rx) = std::sync::mpsc::channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let device_index = self.device_index;

        let thread = std::thread::spawn(move || {
            run_capture(device_index, frame_tx, stop_rx, ready_tx);
        });

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(())) => {
                self.rx = Some(frame_rx);
                self.stop_tx = Some(stop_tx);
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(reason)) => {
                let _ = thread.join();
                Err(IngestError::Pipeline(reason))
            }
            Err(_) => {
                // The open is still in flight; signal it to stop and move on rather than
                // block connect() indefinitely. The thread exits on its own once it next
                // checks stop_rx or fails a blocking_send.
                let _ = stop_tx.send(());
                Err(IngestError::Pipeline(format!("device open timed out after {timeout:?}")))
            }
        }
    }

    pub async fn primitive_read(&mut self, timeout: Duration) -> PrimitiveRead {
        let Some(rx) = self.rx.as_mut() else {
            return PrimitiveRead::Disconnected("not connected".into());
        };
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(UsbEvent::Frame(img))) => PrimitiveRead::Frame(img),
            Ok(Some(UsbEvent::Lost(reason))) => PrimitiveRead::Disconnected(reason),
            Ok(None) => PrimitiveRead::Disconnected("capture thread exited".into()),
            Err(_) => PrimitiveRead::Empty,
        }
    }

    pub fn primitive_disconnect(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.rx = None;
    }
}

fn run_capture(
    device_index: u32,
    tx: mpsc::Sender<UsbEvent>,
    stop_rx: std::sync::mpsc::Receiver<()>,
    ready_tx: std::sync::mpsc::Sender<std::result::Result<(), String>>,
) {
    let device = match Device::new(device_index as usize) {
        Ok(d) => d,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("failed to open device: {e}")));
            return;
        }
    };

    let mut format = match device.format() {
        Ok(f) => f,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("failed to query format: {e}")));
            return;
        }
    };
    format.fourcc = FourCC::new(b"MJPG");
    let format = device.set_format(&format).unwrap_or(format);

    let mut stream = match MmapStream::with_buffers(&device, BufferType::VideoCapture, 4) {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("failed to start stream: {e}")));
            return;
        }
    };

    if ready_tx.send(Ok(())).is_err() {
        // connect() gave up waiting; no one left to hand frames to.
        return;
    }

    let is_mjpg = &format.fourcc.repr == b"MJPG";

    loop {
        if stop_rx.try_recv().is_ok() {
            return;
        }
        let (buf, _meta) = match stream.next() {
            Ok(pair) => pair,
            Err(e) => {
                if is_device_lost(&e) {
                    let _ = tx.blocking_send(UsbEvent::Lost(format!("device lost: {e}")));
                    return;
                }
                // Transient read hiccup: surface nothing this tick, let the adapter's
                // read timeout turn it into a dropped frame.
                continue;
            }
        };

        let image = if is_mjpg {
            match image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg) {
                Ok(img) => {
                    let rgb = img.to_rgb8();
                    let (w, h) = rgb.dimensions();
                    let mut bgr = rgb.into_raw();
                    bgr.chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
                    RawImage { data: bgr, width: w, height: h }
                }
                Err(_) => continue,
            }
        } else {
            yuyv_to_bgr(buf, format.width, format.height)
        };

        if tx.blocking_send(UsbEvent::Frame(image)).is_err() {
            return;
        }
    }
}

/// Hand-rolled YUYV (YUY2) → BGR conversion; none of the corpus crates expose this narrow a
/// pixel format mapping, so it's converted manually like `cosmic-utils-camera`'s own
/// format-conversion helpers.
fn yuyv_to_bgr(data: &[u8], width: u32, height: u32) -> RawImage {
    let mut out = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data.chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0] as f32, chunk[1] as f32 - 128.0, chunk[2] as f32, chunk[3] as f32 - 128.0);
        for y in [y0, y1] {
            let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
            out.push(b);
            out.push(g);
            out.push(r);
        }
    }
    RawImage { data: out, width, height }
}
