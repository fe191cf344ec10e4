//! PDF engine abstraction.
//!
//! The pipelines only see these traits, never a concrete PDF library, so they
//! can be driven by lopdf, PDFium, or a synthetic document in tests.

pub mod native;
#[cfg(feature = "pdfium")]
pub mod pdfium;
mod scanner;

use image::DynamicImage;

use crate::error::Result;

pub use native::NativeDocument;
#[cfg(feature = "pdfium")]
pub use pdfium::{PdfiumDocument, PdfiumEngine};

/// Intrinsic page size in points (1/72 inch), after the page's `/Rotate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// US Letter, used when a page's box cannot be read.
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Lookup table of an `/Indexed` colour space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Palette {
    /// Base family: `DeviceGray`, `DeviceRGB` or `DeviceCMYK`
    pub base: String,
    /// Highest valid index
    pub hival: u32,
    /// `hival + 1` entries of one byte per base component
    pub lookup: Vec<u8>,
}

/// `/DecodeParms` of a `CCITTFaxDecode` stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaxParams {
    /// Negative for Group 4, zero for one-dimensional Group 3
    pub k: i64,
    pub columns: u32,
    pub rows: Option<u32>,
    /// 1 bits are black instead of white
    pub black_is_1: bool,
}

impl Default for FaxParams {
    fn default() -> Self {
        Self {
            k: 0,
            columns: 1728,
            rows: None,
            black_is_1: false,
        }
    }
}

/// An embedded raster resource copied out of a page.
#[derive(Debug, Clone, Default)]
pub struct ImageObject {
    /// Width in pixels as declared by the image dictionary (0 if absent)
    pub width: u32,
    /// Height in pixels as declared by the image dictionary (0 if absent)
    pub height: u32,
    /// Stream filters, outermost first (e.g. `["FlateDecode"]`)
    pub filters: Vec<String>,
    /// Colour space family name (`DeviceRGB`, `DeviceGray`, `ICCBased`, ...)
    pub color_space: String,
    pub bits_per_component: u32,
    /// Raw stream bytes exactly as stored in the file
    pub data: Vec<u8>,
    /// `/Predictor` from the Flate decode parameters
    pub predictor: Option<u8>,
    /// Soft mask supplying the alpha channel, if any
    pub soft_mask: Option<Box<ImageObject>>,
    /// `/Decode` array, two entries per component
    pub decode_array: Option<Vec<f32>>,
    /// Present when the colour space is `Indexed`
    pub palette: Option<Palette>,
    /// `/N` of an `ICCBased` profile
    pub components: Option<u32>,
    pub fax: Option<FaxParams>,
}

impl ImageObject {
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Outermost filter, or `"raw"` for unfiltered data.
    pub fn primary_filter(&self) -> &str {
        self.filters.first().map(String::as_str).unwrap_or("raw")
    }

    /// Decode into a bitmap, merging the soft mask as alpha when present.
    pub fn decode(&self) -> Result<DynamicImage> {
        crate::decode::decode_image_object(self)
    }
}

/// Page enumeration shared by every backend.
pub trait PageSource {
    fn page_count(&self) -> usize;

    fn page_size(&self, index: usize) -> Result<PageSize>;
}

/// Full-page rasterization.
pub trait PageRenderer: PageSource {
    /// Render page `index` at `scale` pixels per point.
    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage>;

    /// Whether rendering page `index` draws anything at all. Renderers that
    /// skip some content kinds report pages they would leave blank.
    fn draws_content(&self, _index: usize) -> bool {
        true
    }
}

/// Access to the image objects a page references.
pub trait ImageSource: PageSource {
    /// Image objects on page `index`, in native enumeration order.
    fn page_images(&self, index: usize) -> Result<Vec<ImageObject>>;
}

/// Pixel dimensions of a page rendered at `scale`, never below 1x1.
pub fn scaled_dimensions(size: PageSize, scale: f32) -> (u32, u32) {
    let width = (size.width * scale).floor().max(1.0) as u32;
    let height = (size.height * scale).floor().max(1.0) as u32;
    (width, height)
}

/// Which rasterizer the compressor should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RendererKind {
    /// PDFium when it can be loaded, the native compositor otherwise
    #[default]
    Auto,
    Pdfium,
    Native,
}
