//! Embedded image extraction.

use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{ImageObject, ImageSource, NativeDocument};
use crate::error::Result;
use crate::files;

/// Options for image extraction
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Images narrower than this are skipped
    pub min_width: u32,
    /// Images shorter than this are skipped
    pub min_height: u32,
    /// Destination directory; `{pdf_stem}_images` beside the PDF when unset
    pub output_dir: Option<PathBuf>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_width: 50,
            min_height: 50,
            output_dir: None,
        }
    }
}

/// Outcome of an extraction run
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Images written to disk
    pub accepted: usize,
    /// Images below the size thresholds
    pub rejected: usize,
    /// Images that could not be measured, decoded or written
    pub failed: usize,
    pub output_dir: PathBuf,
    /// Written files in extraction order
    pub files: Vec<PathBuf>,
}

/// Size filter applied to every image object.
pub fn meets_threshold(width: u32, height: u32, min_width: u32, min_height: u32) -> bool {
    width >= min_width && height >= min_height
}

/// File name for the `image`-th object (zero-based) on page `page` (zero-based).
pub fn image_file_name(stem: &str, page: usize, image: usize) -> String {
    format!("{}_page{}_img{}.png", stem, page + 1, image + 1)
}

fn write_png(object: &ImageObject, path: &Path) -> Result<()> {
    let bitmap = object.decode()?;
    bitmap.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Extract every image at least `min_width` x `min_height` pixels from `doc`
/// into `output_dir`, naming files after `stem`.
pub fn extract_images<D: ImageSource + ?Sized>(
    doc: &D,
    stem: &str,
    output_dir: &Path,
    options: &ExtractOptions,
) -> Result<ExtractionReport> {
    fs::create_dir_all(output_dir)?;

    let mut report = ExtractionReport {
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    };

    for page in 0..doc.page_count() {
        let objects = match doc.page_images(page) {
            Ok(objects) => objects,
            Err(e) => {
                warn!("Skipping page {}: {}", page + 1, e);
                continue;
            }
        };
        debug!("Page {}: {} image objects", page + 1, objects.len());

        for (index, object) in objects.iter().enumerate() {
            if !object.has_dimensions() {
                warn!(
                    "Page {} image {}: missing dimensions, skipped",
                    page + 1,
                    index + 1
                );
                report.failed += 1;
                continue;
            }

            if !meets_threshold(object.width, object.height, options.min_width, options.min_height) {
                debug!(
                    "Page {} image {}: {}x{} below threshold",
                    page + 1,
                    index + 1,
                    object.width,
                    object.height
                );
                report.rejected += 1;
                continue;
            }

            let path = output_dir.join(image_file_name(stem, page, index));
            match write_png(object, &path) {
                Ok(()) => {
                    info!(
                        "Extracted {}x{} {} image to {}",
                        object.width,
                        object.height,
                        object.primary_filter(),
                        path.display()
                    );
                    report.accepted += 1;
                    report.files.push(path);
                }
                Err(e) => {
                    warn!("Page {} image {}: {}", page + 1, index + 1, e);
                    report.failed += 1;
                }
            }
        }
    }

    Ok(report)
}

/// Open `pdf` and extract its images per `options`.
pub fn extract_file(pdf: &Path, options: &ExtractOptions) -> Result<ExtractionReport> {
    let doc = NativeDocument::open(pdf)?;
    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| files::default_extract_dir(pdf));
    let stem = files::stem_or(pdf, "document");
    extract_images(&doc, &stem, &output_dir, options)
}
