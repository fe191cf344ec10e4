//! Construction of image-only PDFs: one full-page image per page.

use image::{DynamicImage, GenericImageView};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::engine::PageSize;
use crate::error::{Error, Result};

/// Nominal resolution used to map bitmap pixels to page points.
pub const DEFAULT_PAGE_DPI: f32 = 96.0;

/// Page size in points for a bitmap shown at `dpi`.
pub fn page_size_for(width_px: u32, height_px: u32, dpi: f32) -> PageSize {
    PageSize::new(width_px as f32 * 72.0 / dpi, height_px as f32 * 72.0 / dpi)
}

/// JPEG encoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegSettings {
    /// JPEG quality (1-100)
    pub quality: u8,
    pub progressive: bool,
    /// 4:2:0 chroma subsampling instead of 4:4:4
    pub subsample_chroma: bool,
}

impl JpegSettings {
    /// Progressive, with chroma subsampling below quality 50.
    pub fn for_quality(quality: u8) -> Self {
        Self {
            quality,
            progressive: true,
            subsample_chroma: quality < 50,
        }
    }
}

/// An image XObject stream ready to be placed on a page.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub stream: Stream,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// Size of the encoded payload in bytes.
    pub fn len(&self) -> usize {
        self.stream.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stream.content.is_empty()
    }
}

fn image_dictionary(width: u32, height: u32, color_space: &str, filter: &str, length: usize) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
        "BitsPerComponent" => 8i64,
        "Filter" => Object::Name(filter.as_bytes().to_vec()),
        "Length" => length as i64,
    }
}

fn is_grayscale(img: &DynamicImage) -> bool {
    matches!(
        img,
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_)
    )
}

/// Encode an image as JPEG and wrap it in a `DCTDecode` image stream.
///
/// Grayscale bitmaps stay single-channel; everything else is flattened to RGB.
pub fn encode_jpeg(img: &DynamicImage, settings: &JpegSettings) -> Result<EncodedImage> {
    let (width, height) = img.dimensions();
    if width > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(Error::Encode(format!(
            "{}x{} exceeds the JPEG size limit",
            width, height
        )));
    }

    let (pixels, color_type, color_space) = if is_grayscale(img) {
        (img.to_luma8().into_raw(), jpeg_encoder::ColorType::Luma, "DeviceGray")
    } else {
        (img.to_rgb8().into_raw(), jpeg_encoder::ColorType::Rgb, "DeviceRGB")
    };

    let mut jpeg_bytes = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut jpeg_bytes, settings.quality);
    encoder.set_sampling_factor(if settings.subsample_chroma {
        jpeg_encoder::SamplingFactor::R_4_2_0
    } else {
        jpeg_encoder::SamplingFactor::R_4_4_4
    });
    encoder.set_progressive(settings.progressive);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(&pixels, width as u16, height as u16, color_type)
        .map_err(|e| Error::Encode(format!("failed to encode JPEG: {}", e)))?;

    let dict = image_dictionary(width, height, color_space, "DCTDecode", jpeg_bytes.len());
    Ok(EncodedImage {
        stream: Stream::new(dict, jpeg_bytes),
        width,
        height,
    })
}

/// Embed existing JPEG bytes without re-encoding.
pub fn passthrough_jpeg(jpeg_bytes: Vec<u8>, width: u32, height: u32, grayscale: bool) -> EncodedImage {
    let color_space = if grayscale { "DeviceGray" } else { "DeviceRGB" };
    let dict = image_dictionary(width, height, color_space, "DCTDecode", jpeg_bytes.len());
    EncodedImage {
        stream: Stream::new(dict, jpeg_bytes),
        width,
        height,
    }
}

/// Encode an image losslessly with `FlateDecode`, alpha flattened away.
pub fn encode_flate(img: &DynamicImage) -> Result<EncodedImage> {
    let (width, height) = img.dimensions();
    let (raw, color_space) = if is_grayscale(img) {
        (img.to_luma8().into_raw(), "DeviceGray")
    } else {
        (img.to_rgb8().into_raw(), "DeviceRGB")
    };

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
    encoder
        .write_all(&raw)
        .map_err(|e| Error::Encode(format!("failed to compress image data: {}", e)))?;
    let compressed = encoder
        .finish()
        .map_err(|e| Error::Encode(format!("failed to finish compression: {}", e)))?;

    let dict = image_dictionary(width, height, color_space, "FlateDecode", compressed.len());
    Ok(EncodedImage {
        stream: Stream::new(dict, compressed),
        width,
        height,
    })
}

/// Builds a PDF whose pages each show one full-page image.
pub struct ImagePdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl Default for ImagePdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImagePdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    fn push_page(&mut self, page: PageSize, content: Vec<u8>, resources: lopdf::Dictionary) {
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(page.width), Object::Real(page.height)],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(Object::Reference(page_id));
    }

    /// Append a page of `page` size filled by `image`.
    pub fn add_image_page(&mut self, image: EncodedImage, page: PageSize) {
        let image_id = self.doc.add_object(image.stream);
        let content = format!(
            "q\n{:.4} 0 0 {:.4} 0 0 cm\n/Im0 Do\nQ\n",
            page.width, page.height
        );
        let resources = dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        };
        self.push_page(page, content.into_bytes(), resources);
    }

    /// Append an empty page.
    pub fn add_blank_page(&mut self, page: PageSize) {
        self.push_page(page, Vec::new(), dictionary! {});
    }

    /// Close the page tree and return the document.
    pub fn finish(mut self) -> Document {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", Object::Reference(catalog_id));
        self.doc.compress();
        self.doc
    }
}

/// Directory an output file will be written into.
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Save a document so that `path` only ever holds a complete file.
///
/// The PDF is written to a temporary file beside `path` and renamed over it
/// once fully flushed. Returns the size of the written file.
pub fn save_atomically(doc: &mut Document, path: &Path) -> Result<u64> {
    let save_error = |reason: String| Error::Save {
        path: path.to_path_buf(),
        reason,
    };

    let dir = parent_dir(path);
    if !dir.is_dir() {
        fs::create_dir_all(&dir).map_err(|e| save_error(e.to_string()))?;
    }

    let mut tmp = tempfile::Builder::new()
        .prefix(".pdf-tools-")
        .suffix(".tmp")
        .tempfile_in(&dir)
        .map_err(|e| save_error(e.to_string()))?;
    doc.save_to(&mut tmp).map_err(|e| save_error(e.to_string()))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| save_error(e.to_string()))?;
    tmp.persist(path).map_err(|e| save_error(e.error.to_string()))?;

    Ok(fs::metadata(path)?.len())
}

/// Append `.pdf` unless the name already ends with it (case-insensitive).
pub fn ensure_pdf_extension(path: PathBuf) -> PathBuf {
    let has_pdf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if has_pdf {
        path
    } else {
        let mut name = path.into_os_string();
        name.push(".pdf");
        PathBuf::from(name)
    }
}
