// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported source type: {0}")]
    UnsupportedSourceType(String),

    #[error("Source '{id}' not found")]
    SourceNotFound { id: String },

    #[error("Source '{id}' connection failed: {reason}")]
    SourceConnection { id: String, reason: String },

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Maximum source count ({max}) reached")]
    MaxSourcesReached { max: usize },
}

pub type Result<T> = std::result::Result<T, IngestError>;
