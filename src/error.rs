use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the PDF and image pipelines.
///
/// Variants that concern a file carry its path so the message printed by the
/// CLI names the offending input.
#[derive(Error, Debug)]
pub enum Error {
    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to open PDF {}: {reason}", path.display())]
    DocumentOpen { path: PathBuf, reason: String },

    #[error("failed to save {}: {reason}", path.display())]
    Save { path: PathBuf, reason: String },

    #[error("quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("maximum render size must be between 1x1 and 65535x65535, got {max_width}x{max_height}")]
    InvalidBounds { max_width: u32, max_height: u32 },

    #[error("page DPI must be positive, got {0}")]
    InvalidDpi(f32),

    #[error("page {index} is out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("failed to render page {page}: {reason}")]
    Render { page: usize, reason: String },

    #[error("image decode error: {0}")]
    Decode(String),

    #[error("image encode error: {0}")]
    Encode(String),

    #[error("no images matching *_page{{N}}_*.ext found in {}", .0.display())]
    NoMatchingImages(PathBuf),

    #[error("none of the matching images in {} could be added", .0.display())]
    NothingAssembled(PathBuf),

    #[error("compression of {} failed: none of its {pages} pages rendered", path.display())]
    CompressionFailed { path: PathBuf, pages: usize },

    #[error("invalid file name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("PDF backend unavailable: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
