// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use std::time::Duration;

use crate::adapter::gst_pipeline::{GstEvent, GstPipelineCore};
use crate::adapter::{inject_credentials, PrimitiveRead};
use crate::error::Result;

pub struct MjpegAdapter {
    uri: String,
    username: Option<String>,
    password: Option<String>,
    core: GstPipelineCore,
}

impl MjpegAdapter {
    pub fn new(uri: String, username: Option<String>, password: Option<String>) -> Self {
        Self { uri, username, password, core: GstPipelineCore::new() }
    }

    pub fn primitive_connect(&mut self) -> Result<()> {
        let location = inject_credentials(&self.uri, self.username.as_deref(), self.password.as_deref());
        let description = format!(
            "souphttpsrc location=\"{location}\" ! multipartdemux ! jpegdec ! \
             videoconvert ! video/x-raw,format=BGR ! appsink name=sink"
        );
        self.core.connect(&description)
    }

    pub async fn primitive_read(&mut self, timeout: Duration) -> PrimitiveRead {
        match self.core.read(timeout).await {
            Some(GstEvent::Frame(img)) => PrimitiveRead::Frame(img),
            Some(GstEvent::Eos) => PrimitiveRead::Disconnected("stream ended".into()),
            Some(GstEvent::Error(e)) => PrimitiveRead::Disconnected(e),
            None => PrimitiveRead::Empty,
        }
    }

    pub fn primitive_disconnect(&mut self) {
        self.core.disconnect();
    }
}
