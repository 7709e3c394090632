// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Synthetic adapter backend for deterministic tests of the capture engine — no real
//! GStreamer pipeline or V4L2 device involved. Grounded on `kmay89-securaCV`'s idea of a
//! stub frame source for test harnesses, generalized to drive this crate's own primitives.

use std::time::Duration;

use crate::adapter::PrimitiveRead;
use crate::error::{IngestError, Result};
use crate::frame::RawImage;

pub struct StubAdapter {
    pub connected: bool,
    pub connect_failures_remaining: u32,
    pub width: u32,
    pub height: u32,
    pub emit_null_every: Option<u32>,
    reads: u32,
}

impl StubAdapter {
    pub fn new() -> Self {
        Self {
            connected: false,
            connect_failures_remaining: 0,
            width: 640,
            height: 480,
            emit_null_every: None,
            reads: 0,
        }
    }

    pub fn primitive_connect(&mut self) -> Result<()> {
        if self.connect_failures_remaining > 0 {
            self.connect_failures_remaining -= 1;
            return Err(IngestError::Pipeline("stub connect failure".into()));
        }
        self.connected = true;
        Ok(())
    }

    pub async fn primitive_read(&mut self, _timeout: Duration) -> PrimitiveRead {
        self.reads += 1;
        if let Some(n) = self.emit_null_every {
            if n != 0 && self.reads % n == 0 {
                return PrimitiveRead::Empty;
            }
        }
        let size = (self.width * self.height * 3) as usize;
        PrimitiveRead::Frame(RawImage { data: vec![0u8; size], width: self.width, height: self.height })
    }

    pub fn primitive_disconnect(&mut self) {
        self.connected = false;
    }
}

impl Default for StubAdapter {
    fn default() -> Self {
        Self::new()
    }
}
