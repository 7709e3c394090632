// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use std::time::Duration;

use crate::adapter::gst_pipeline::{GstEvent, GstPipelineCore};
use crate::adapter::PrimitiveRead;
use crate::error::{IngestError, Result};

pub struct FileAdapter {
    path: String,
    loop_playback: bool,
    core: GstPipelineCore,
}

impl FileAdapter {
    pub fn new(path: String, loop_playback: bool) -> Self {
        Self { path, loop_playback, core: GstPipelineCore::new() }
    }

    pub fn primitive_connect(&mut self) -> Result<()> {
        if !std::path::Path::new(&self.path).exists() {
            return Err(IngestError::Pipeline(format!("File not found: {}", self.path)));
        }
        let description = format!(
            "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=BGR ! appsink name=sink",
            self.path
        );
        self.core.connect(&description)
    }

    pub async fn primitive_read(&mut self, timeout: Duration) -> PrimitiveRead {
        match self.core.read(timeout).await {
            Some(GstEvent::Frame(img)) => PrimitiveRead::Frame(img),
            Some(GstEvent::Eos) => {
                if self.loop_playback {
                    // The sequence counter keeps counting across the loop boundary; it is
                    // never reset here.
                    match self.core.seek_to_start() {
                        Ok(()) => PrimitiveRead::Empty,
                        Err(e) => PrimitiveRead::Disconnected(e.to_string()),
                    }
                } else {
                    PrimitiveRead::Disconnected("end of stream".into())
                }
            }
            Some(GstEvent::Error(e)) => PrimitiveRead::Disconnected(e),
            None => PrimitiveRead::Empty,
        }
    }

    pub fn primitive_disconnect(&mut self) {
        self.core.disconnect();
    }
}
