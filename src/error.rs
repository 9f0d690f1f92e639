use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnchorError {
    #[error("cannot derive a subject key from filename '{name}'")]
    InvalidFilename { name: String },

    #[error("no region detected in {image}")]
    NoDetection { image: String },

    #[error("anchor store {path} is corrupt: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    #[error("invalid anchor record: {reason}")]
    InvalidRecord { reason: String },

    #[error("failed to fetch {asset}: {reason}")]
    Fetch { asset: String, reason: String },

    #[error("detector error: {0}")]
    Detector(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, AnchorError>;
