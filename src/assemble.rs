//! Assembling page images back into a PDF.
//!
//! Images are discovered by the `*_page{N}_*.{ext}` naming convention used by
//! the extractor, ordered by `N` and placed one per page.

use image::{DynamicImage, ImageFormat, ImageReader};
use log::{debug, info, warn};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::files;
use crate::output::{self, EncodedImage, ImagePdfBuilder, DEFAULT_PAGE_DPI};

/// What to do with several images sharing one page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Keep the first file by name, skip the rest
    #[default]
    FirstByName,
    /// Give every file its own page
    KeepAll,
}

/// Options for PDF assembly
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Output file; `{directory}_combined.pdf` when unset
    pub output: Option<PathBuf>,
    /// Resolution used to size pages from pixel dimensions
    pub page_dpi: f32,
    pub duplicates: DuplicatePolicy,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            output: None,
            page_dpi: DEFAULT_PAGE_DPI,
            duplicates: DuplicatePolicy::FirstByName,
        }
    }
}

/// Outcome of an assembly run
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub output: PathBuf,
    /// Pages written
    pub pages: usize,
    /// Images passed over: unmatched names and duplicate page numbers
    pub skipped: usize,
    /// Matching images that could not be decoded
    pub failed: usize,
}

/// Parses the page number out of `*_page{N}_*.{ext}` file names.
pub struct PageNamePattern {
    regex: Regex,
}

impl PageNamePattern {
    pub fn new() -> Result<Self> {
        let pattern = format!(
            r"(?i)^.*_page(\d+)_.*\.({})$",
            files::SUPPORTED_EXTENSIONS.join("|")
        );
        Ok(Self {
            regex: Regex::new(&pattern)?,
        })
    }

    /// Page number of `file_name`, or `None` if it does not follow the convention.
    ///
    /// The greedy prefix makes the last `_pageN_` token win.
    pub fn page_number(&self, file_name: &str) -> Option<u32> {
        self.regex
            .captures(file_name)
            .and_then(|caps| caps.get(1))
            .and_then(|digits| digits.as_str().parse().ok())
    }
}

#[derive(Debug)]
struct Candidate {
    page: u32,
    name: String,
    path: PathBuf,
}

/// Sort candidates by page then name and apply the duplicate policy.
/// Returns the kept candidates and how many were dropped.
fn order_candidates(mut candidates: Vec<Candidate>, policy: DuplicatePolicy) -> (Vec<Candidate>, usize) {
    candidates.sort_by(|a, b| a.page.cmp(&b.page).then_with(|| a.name.cmp(&b.name)));
    if policy == DuplicatePolicy::KeepAll {
        return (candidates, 0);
    }

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut dropped = 0;
    for candidate in candidates {
        match kept.last() {
            Some(previous) if previous.page == candidate.page => {
                warn!(
                    "Page {} already taken by {}, skipping {}",
                    candidate.page, previous.name, candidate.name
                );
                dropped += 1;
            }
            _ => kept.push(candidate),
        }
    }
    (kept, dropped)
}

/// Read SOF to learn how many colour components a baseline JPEG carries.
fn jpeg_components(data: &[u8]) -> Option<u8> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            return data.get(pos + 9).copied();
        }
        pos += 2 + length;
    }
    None
}

/// Load an image file and turn it into a page image stream.
///
/// Plain RGB or greyscale JPEGs are embedded unchanged; anything else is
/// decoded and stored losslessly.
fn load_page_image(path: &Path) -> Result<EncodedImage> {
    let bytes = fs::read(path)?;
    let reader = ImageReader::new(std::io::Cursor::new(&bytes)).with_guessed_format()?;
    let format = reader.format();
    let img = reader.decode()?;

    if format == Some(ImageFormat::Jpeg) {
        let components = jpeg_components(&bytes);
        match (&img, components) {
            (DynamicImage::ImageRgb8(rgb), Some(3)) => {
                let (width, height) = rgb.dimensions();
                return Ok(output::passthrough_jpeg(bytes, width, height, false));
            }
            (DynamicImage::ImageLuma8(gray), Some(1)) => {
                let (width, height) = gray.dimensions();
                return Ok(output::passthrough_jpeg(bytes, width, height, true));
            }
            _ => debug!("{}: re-encoding JPEG losslessly", path.display()),
        }
    }

    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    output::encode_flate(&rgb)
}

/// Build a PDF from the page images in `dir`.
pub fn create_pdf(dir: &Path, options: &AssembleOptions) -> Result<AssemblyReport> {
    if !(options.page_dpi.is_finite() && options.page_dpi > 0.0) {
        return Err(Error::InvalidDpi(options.page_dpi));
    }

    let pattern = PageNamePattern::new()?;
    let mut candidates = Vec::new();
    let mut skipped = 0;

    for path in files::list_files(dir)? {
        if !files::is_supported_image(&path) {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match pattern.page_number(&name) {
            Some(page) => candidates.push(Candidate { page, name, path }),
            None => {
                warn!("{} has no _pageN_ token, skipping", name);
                skipped += 1;
            }
        }
    }

    if candidates.is_empty() {
        return Err(Error::NoMatchingImages(dir.to_path_buf()));
    }

    let (ordered, dropped) = order_candidates(candidates, options.duplicates);
    skipped += dropped;

    let mut builder = ImagePdfBuilder::new();
    let mut failed = 0;
    for candidate in &ordered {
        match load_page_image(&candidate.path) {
            Ok(encoded) => {
                let page = output::page_size_for(encoded.width, encoded.height, options.page_dpi);
                info!(
                    "Page {}: {} ({}x{} px)",
                    candidate.page, candidate.name, encoded.width, encoded.height
                );
                builder.add_image_page(encoded, page);
            }
            Err(e) => {
                warn!("Failed to add {}: {}", candidate.name, e);
                failed += 1;
            }
        }
    }

    if builder.page_count() == 0 {
        return Err(Error::NothingAssembled(dir.to_path_buf()));
    }

    let output_path = match &options.output {
        Some(path) => output::ensure_pdf_extension(path.clone()),
        None => files::default_assembly_output(dir),
    };
    let pages = builder.page_count();
    let mut doc = builder.finish();
    output::save_atomically(&mut doc, &output_path)?;

    Ok(AssemblyReport {
        output: output_path,
        pages,
        skipped,
        failed,
    })
}
