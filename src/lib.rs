//! PDF Tools Library
//!
//! Image-centric PDF utilities shared by the `pdf-tools` and `pdf-inspect`
//! binaries: extracting embedded images, rotating image files, assembling page
//! images into a PDF, and shrinking PDFs by re-rendering each page as a JPEG.
//!
//! Page access goes through the capability traits in [`engine`], implemented
//! by the lopdf-based [`engine::NativeDocument`] and, with the `pdfium`
//! feature, by a PDFium-backed renderer.

pub mod assemble;
pub mod compress;
mod decode;
pub mod engine;
pub mod error;
pub mod extract;
pub mod files;
pub mod optimize;
pub mod output;
pub mod rotate;

pub use assemble::{create_pdf, AssembleOptions, AssemblyReport, DuplicatePolicy};
pub use compress::{compress_document, compress_file, CompressionParams, CompressionReport};
pub use engine::{FaxParams, ImageObject, ImageSource, NativeDocument, PageRenderer, PageSize, PageSource, Palette, RendererKind};
pub use error::{Error, Result};
pub use extract::{extract_file, extract_images, ExtractOptions, ExtractionReport};
pub use optimize::{optimize_file, CompressionLevel, OptimizationReport};
pub use output::DEFAULT_PAGE_DPI;
pub use rotate::{rotate_directory, Direction, RotationReport};
