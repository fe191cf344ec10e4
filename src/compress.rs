//! Lossy compression by re-rendering every page as a JPEG image.
//!
//! Each page is rasterized within a pixel budget, optionally softened, encoded
//! as JPEG and placed as the sole content of a page in a fresh document. Text
//! and vector content do not survive; the result is what the page looked like.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use log::{debug, info, warn};
use lopdf::Document;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{scaled_dimensions, NativeDocument, PageRenderer, PageSize, RendererKind};
use crate::error::{Error, Result};
use crate::files;
use crate::output::{self, EncodedImage, ImagePdfBuilder, JpegSettings, DEFAULT_PAGE_DPI};

/// Below this quality pages get a light blur before encoding.
const BLUR_QUALITY_THRESHOLD: u8 = 40;
const BLUR_SIGMA: f32 = 0.5;

/// Parameters for page re-rendering
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionParams {
    /// JPEG quality (1-100)
    pub quality: u8,
    /// Maximum rendered width in pixels
    pub max_width: u32,
    /// Maximum rendered height in pixels
    pub max_height: u32,
    /// Resolution used to size output pages from pixel dimensions
    pub page_dpi: f32,
}

impl Default for CompressionParams {
    fn default() -> Self {
        Self {
            quality: 30,
            max_width: 1200,
            max_height: 1600,
            page_dpi: DEFAULT_PAGE_DPI,
        }
    }
}

impl CompressionParams {
    pub fn validate(&self) -> Result<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(Error::InvalidQuality(self.quality));
        }
        let limit = u16::MAX as u32;
        if self.max_width == 0 || self.max_height == 0 || self.max_width > limit || self.max_height > limit {
            return Err(Error::InvalidBounds {
                max_width: self.max_width,
                max_height: self.max_height,
            });
        }
        if !(self.page_dpi.is_finite() && self.page_dpi > 0.0) {
            return Err(Error::InvalidDpi(self.page_dpi));
        }
        Ok(())
    }

    /// Render scale for a page: fits the bounds and never enlarges.
    pub fn render_scale(&self, size: PageSize) -> f32 {
        let fit_width = self.max_width as f32 / size.width;
        let fit_height = self.max_height as f32 / size.height;
        fit_width.min(fit_height).min(1.0)
    }

    /// Pixel size a page is rendered at.
    pub fn target_dimensions(&self, size: PageSize) -> (u32, u32) {
        let (width, height) = scaled_dimensions(size, self.render_scale(size));
        (width.min(self.max_width), height.min(self.max_height))
    }
}

/// Output of [`compress_pages`] before it is written anywhere.
#[derive(Debug)]
pub struct CompressedPages {
    pub document: Document,
    pub pages: usize,
    pub rendered: usize,
    pub blank: usize,
    pub empty: usize,
}

/// Outcome of a compression run
#[derive(Debug, Clone)]
pub struct CompressionReport {
    pub output: PathBuf,
    /// Input size in bytes
    pub original_size: u64,
    /// Output size in bytes
    pub compressed_size: u64,
    pub pages: usize,
    /// Pages carrying a rendered image
    pub rendered: usize,
    /// Pages that failed and were left blank
    pub blank: usize,
    /// Rendered pages on which the renderer drew nothing
    pub empty: usize,
}

impl CompressionReport {
    /// Size reduction relative to the input, in percent (negative if it grew).
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - self.compressed_size as f64 / self.original_size as f64) * 100.0
    }
}

/// Shrink a bitmap that exceeds the bounds, keeping its aspect ratio.
fn fit_within(bitmap: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = bitmap.dimensions();
    if width <= max_width && height <= max_height {
        return bitmap;
    }
    debug!(
        "Renderer returned {}x{}, resizing into {}x{}",
        width, height, max_width, max_height
    );
    bitmap.resize(max_width, max_height, FilterType::Lanczos3)
}

fn render_and_encode<D: PageRenderer + ?Sized>(
    doc: &D,
    index: usize,
    size: PageSize,
    params: &CompressionParams,
) -> Result<EncodedImage> {
    let bitmap = doc.render_page(index, params.render_scale(size))?;
    let mut bitmap = fit_within(bitmap, params.max_width, params.max_height);
    if params.quality < BLUR_QUALITY_THRESHOLD {
        bitmap = bitmap.blur(BLUR_SIGMA);
    }
    output::encode_jpeg(&bitmap, &JpegSettings::for_quality(params.quality))
}

/// Re-render every page of `doc` into a new image-only document.
///
/// Pages that cannot be measured, rendered or encoded are replaced by blank
/// pages; the page count always matches the input.
pub fn compress_pages<D: PageRenderer + ?Sized>(doc: &D, params: &CompressionParams) -> Result<CompressedPages> {
    params.validate()?;

    let pages = doc.page_count();
    let mut builder = ImagePdfBuilder::new();
    let mut rendered = 0;
    let mut blank = 0;
    let mut empty = 0;

    for index in 0..pages {
        let size = match doc.page_size(index) {
            Ok(size) if size.is_valid() => size,
            Ok(size) => {
                warn!("Page {} has invalid size {:?}, assuming Letter", index + 1, size);
                PageSize::LETTER
            }
            Err(e) => {
                warn!("Page {}: {}, assuming Letter", index + 1, e);
                PageSize::LETTER
            }
        };

        match render_and_encode(doc, index, size, params) {
            Ok(encoded) => {
                info!(
                    "Page {}/{}: {}x{} px, {} bytes",
                    index + 1,
                    pages,
                    encoded.width,
                    encoded.height,
                    encoded.len()
                );
                let page = output::page_size_for(encoded.width, encoded.height, params.page_dpi);
                builder.add_image_page(encoded, page);
                rendered += 1;
                if !doc.draws_content(index) {
                    warn!("Page {}: nothing on it can be drawn by this renderer; left white", index + 1);
                    empty += 1;
                }
            }
            Err(e) => {
                warn!("Page {}: {}; inserting blank page", index + 1, e);
                let (width, height) = params.target_dimensions(size);
                builder.add_blank_page(output::page_size_for(width, height, params.page_dpi));
                blank += 1;
            }
        }
    }

    Ok(CompressedPages {
        document: builder.finish(),
        pages,
        rendered,
        blank,
        empty,
    })
}

/// Compress `doc`, loaded from `source`, and write the result to `destination`.
pub fn compress_document<D: PageRenderer + ?Sized>(
    doc: &D,
    source: &Path,
    destination: &Path,
    params: &CompressionParams,
) -> Result<CompressionReport> {
    let original_size = fs::metadata(source)?.len();
    let mut compressed = compress_pages(doc, params)?;

    if compressed.rendered == 0 {
        return Err(Error::CompressionFailed {
            path: source.to_path_buf(),
            pages: compressed.pages,
        });
    }

    let compressed_size = output::save_atomically(&mut compressed.document, destination)?;

    Ok(CompressionReport {
        output: destination.to_path_buf(),
        original_size,
        compressed_size,
        pages: compressed.pages,
        rendered: compressed.rendered,
        blank: compressed.blank,
        empty: compressed.empty,
    })
}

fn compress_native(input: &Path, destination: &Path, params: &CompressionParams) -> Result<CompressionReport> {
    let doc = NativeDocument::open(input)?;
    compress_document(&doc, input, destination, params)
}

#[cfg(feature = "pdfium")]
fn compress_with_pdfium(
    engine: &crate::engine::PdfiumEngine,
    input: &Path,
    destination: &Path,
    params: &CompressionParams,
) -> Result<CompressionReport> {
    let doc = engine.open(input)?;
    compress_document(&doc, input, destination, params)
}

/// Compress the PDF at `input` with the chosen renderer.
///
/// `destination` defaults to `{input without extension}_advanced_compressed.pdf`.
pub fn compress_file(
    input: &Path,
    destination: Option<&Path>,
    params: &CompressionParams,
    renderer: RendererKind,
) -> Result<CompressionReport> {
    params.validate()?;
    if !input.is_file() {
        return Err(Error::DocumentOpen {
            path: input.to_path_buf(),
            reason: "no such file".to_string(),
        });
    }

    let destination = match destination {
        Some(path) => output::ensure_pdf_extension(path.to_path_buf()),
        None => files::default_compress_output(input),
    };

    let target = destination.as_path();
    match renderer {
        RendererKind::Native => compress_native(input, target, params),
        #[cfg(feature = "pdfium")]
        RendererKind::Pdfium => {
            let engine = crate::engine::PdfiumEngine::bind()?;
            compress_with_pdfium(&engine, input, target, params)
        }
        #[cfg(not(feature = "pdfium"))]
        RendererKind::Pdfium => Err(Error::Backend(
            "this build does not include PDFium support".to_string(),
        )),
        #[cfg(feature = "pdfium")]
        RendererKind::Auto => match crate::engine::PdfiumEngine::bind() {
            Ok(engine) => compress_with_pdfium(&engine, input, target, params),
            Err(e) => {
                warn!("{}; using the native renderer (images only)", e);
                compress_native(input, target, params)
            }
        },
        #[cfg(not(feature = "pdfium"))]
        RendererKind::Auto => compress_native(input, target, params),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PageSource;
    use image::{Rgb, RgbImage};

    /// Pages filled with noise; `failing` pages refuse to render and
    /// `unpainted` pages report no drawable content.
    #[derive(Default)]
    struct FakeRenderer {
        sizes: Vec<PageSize>,
        failing: Vec<usize>,
        unpainted: Vec<usize>,
    }

    impl PageSource for FakeRenderer {
        fn page_count(&self) -> usize {
            self.sizes.len()
        }

        fn page_size(&self, index: usize) -> Result<PageSize> {
            Ok(self.sizes[index])
        }
    }

    impl PageRenderer for FakeRenderer {
        fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage> {
            if self.failing.contains(&index) {
                return Err(Error::Render {
                    page: index,
                    reason: "synthetic failure".to_string(),
                });
            }
            let (width, height) = scaled_dimensions(self.sizes[index], scale);
            Ok(DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
                let v = (x.wrapping_mul(31) ^ y.wrapping_mul(17)) as u8;
                Rgb([v, v.wrapping_add(90), 255 - v])
            })))
        }

        fn draws_content(&self, index: usize) -> bool {
            !self.unpainted.contains(&index)
        }
    }

    #[test]
    fn defaults_are_valid() {
        let params = CompressionParams::default();
        assert_eq!((params.quality, params.max_width, params.max_height), (30, 1200, 1600));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_parameters() {
        let bad_quality = CompressionParams {
            quality: 0,
            ..Default::default()
        };
        assert!(matches!(bad_quality.validate(), Err(Error::InvalidQuality(0))));

        let zero_bounds = CompressionParams {
            max_width: 0,
            ..Default::default()
        };
        assert!(matches!(zero_bounds.validate(), Err(Error::InvalidBounds { .. })));

        let bad_dpi = CompressionParams {
            page_dpi: -1.0,
            ..Default::default()
        };
        assert!(matches!(bad_dpi.validate(), Err(Error::InvalidDpi(_))));
    }

    #[test]
    fn scale_fits_bounds_and_never_enlarges() {
        let params = CompressionParams::default();
        assert_eq!(params.render_scale(PageSize::new(612.0, 792.0)), 1.0);

        let large = PageSize::new(2400.0, 2400.0);
        let scale = params.render_scale(large);
        assert!((scale - 0.5).abs() < 1e-6);
        assert_eq!(params.target_dimensions(large), (1200, 1200));

        let tall = PageSize::new(1000.0, 3200.0);
        let (w, h) = params.target_dimensions(tall);
        assert!(w <= 1200 && h <= 1600);
        assert_eq!(h, 1600);
    }

    #[test]
    fn oversized_render_is_resized() {
        let big = DynamicImage::ImageRgb8(RgbImage::new(400, 100));
        let fitted = fit_within(big, 200, 200);
        assert_eq!(fitted.dimensions(), (200, 50));
    }

    #[test]
    fn failed_pages_become_blank() {
        let doc = FakeRenderer {
            sizes: vec![PageSize::new(300.0, 400.0); 3],
            failing: vec![1],
            ..Default::default()
        };
        let result = compress_pages(&doc, &CompressionParams::default()).unwrap();
        assert_eq!(result.pages, 3);
        assert_eq!(result.rendered, 2);
        assert_eq!(result.blank, 1);
        assert_eq!(result.document.get_pages().len(), 3);
    }

    #[test]
    fn undrawn_pages_are_counted_separately() {
        let doc = FakeRenderer {
            sizes: vec![PageSize::new(300.0, 400.0); 3],
            failing: vec![2],
            unpainted: vec![0, 2],
        };
        let result = compress_pages(&doc, &CompressionParams::default()).unwrap();
        assert_eq!((result.rendered, result.blank, result.empty), (2, 1, 1));
    }

    #[test]
    fn nothing_rendered_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.pdf");
        fs::write(&source, b"%PDF-1.5").unwrap();
        let doc = FakeRenderer {
            sizes: vec![PageSize::LETTER; 2],
            failing: vec![0, 1],
            ..Default::default()
        };
        let err = compress_document(&doc, &source, &dir.path().join("out.pdf"), &CompressionParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::CompressionFailed { pages: 2, .. }));
        assert!(!dir.path().join("out.pdf").exists());
    }

    #[test]
    fn reduction_percent_handles_growth_and_empty_input() {
        let mut report = CompressionReport {
            output: PathBuf::from("o.pdf"),
            original_size: 1000,
            compressed_size: 100,
            pages: 1,
            rendered: 1,
            blank: 0,
            empty: 0,
        };
        assert!((report.reduction_percent() - 90.0).abs() < 1e-9);
        report.compressed_size = 1500;
        assert!(report.reduction_percent() < 0.0);
        report.original_size = 0;
        assert_eq!(report.reduction_percent(), 0.0);
    }

    #[test]
    fn missing_input_is_fatal() {
        let err = compress_file(
            Path::new("/no/such.pdf"),
            None,
            &CompressionParams::default(),
            RendererKind::Native,
        )
        .unwrap_err();
        assert!(matches!(err, Error::DocumentOpen { .. }));
    }
}
