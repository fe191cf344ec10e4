//! lopdf-backed document.
//!
//! Image enumeration reads the page resources directly. Rendering composites
//! every image XObject the page paints onto a white canvas; text and vector
//! paths are not drawn, which is exact for scanned documents.

use image::{imageops::FilterType, DynamicImage, Rgb, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::path::{Path, PathBuf};

use super::scanner::{
    collect_page_images, decompress_stream, inherited_attribute, number_of, resolve,
    stream_filters, ContentScanner, Matrix,
};
use super::{
    scaled_dimensions, FaxParams, ImageObject, ImageSource, PageRenderer, PageSize, PageSource,
    Palette,
};
use crate::error::{Error, Result};

/// A PDF opened with lopdf.
#[derive(Debug)]
pub struct NativeDocument {
    doc: Document,
    /// Page object IDs in page order
    pages: Vec<ObjectId>,
}

/// Page box in user space: (x0, y0, x1, y1)
type PageBox = (f32, f32, f32, f32);

impl NativeDocument {
    /// Open a PDF from disk.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::DocumentOpen {
                path: path.to_path_buf(),
                reason: "no such file".to_string(),
            });
        }
        let doc = Document::load(path).map_err(|e| Error::DocumentOpen {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_document(doc))
    }

    /// Open a PDF held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).map_err(|e| Error::DocumentOpen {
            path: PathBuf::from("<memory>"),
            reason: e.to_string(),
        })?;
        Ok(Self::from_document(doc))
    }

    pub fn from_document(doc: Document) -> Self {
        let pages = doc.get_pages().into_values().collect();
        Self { doc, pages }
    }

    fn page_dict(&self, index: usize) -> Result<&Dictionary> {
        let page_id = self.pages.get(index).ok_or(Error::PageOutOfRange {
            index,
            count: self.pages.len(),
        })?;
        match self.doc.get_object(*page_id) {
            Ok(Object::Dictionary(d)) => Ok(d),
            _ => Err(Error::Render {
                page: index,
                reason: format!("page object {:?} is not a dictionary", page_id),
            }),
        }
    }

    /// Visible page box (CropBox, else MediaBox), normalised so x0 < x1, y0 < y1.
    fn page_box(&self, index: usize) -> Result<PageBox> {
        let page = self.page_dict(index)?;
        let rect = [b"CropBox".as_slice(), b"MediaBox".as_slice()]
            .iter()
            .find_map(|key| match inherited_attribute(&self.doc, page, key) {
                Some(Object::Array(arr)) if arr.len() >= 4 => {
                    let values: Option<Vec<f32>> = arr[..4].iter().map(number_of).collect();
                    values
                }
                _ => None,
            });

        Ok(match rect {
            Some(v) => (v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])),
            None => {
                log::warn!("page {} has no MediaBox, assuming US Letter", index + 1);
                (0.0, 0.0, PageSize::LETTER.width, PageSize::LETTER.height)
            }
        })
    }

    /// Page `/Rotate` normalised to 0, 90, 180 or 270.
    fn rotation(&self, index: usize) -> Result<i64> {
        let page = self.page_dict(index)?;
        let rotate = match inherited_attribute(&self.doc, page, b"Rotate") {
            Some(Object::Integer(n)) => *n,
            _ => 0,
        };
        Ok(((rotate % 360) + 360) % 360 / 90 * 90)
    }

    /// Build an owned image object from an image XObject stream.
    fn image_object(&self, object_id: ObjectId) -> Option<ImageObject> {
        match self.doc.get_object(object_id) {
            Ok(Object::Stream(stream)) => Some(self.image_from_stream(stream, true)),
            _ => None,
        }
    }

    fn image_from_stream(&self, stream: &Stream, with_mask: bool) -> ImageObject {
        let dict = &stream.dict;
        let dimension = |key: &[u8]| -> u32 {
            dict.get(key)
                .ok()
                .and_then(number_of)
                .filter(|n| *n > 0.0)
                .map(|n| n as u32)
                .unwrap_or(0)
        };

        let is_stencil = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
        let color_space_obj = dict.get(b"ColorSpace").ok().filter(|_| !is_stencil);

        let color_space = match color_space_obj {
            Some(cs) => get_color_space_name(cs, &self.doc),
            None if is_stencil => "DeviceGray".to_string(),
            None => "DeviceRGB".to_string(),
        };

        let bits_per_component = if is_stencil {
            1
        } else {
            match dict.get(b"BitsPerComponent") {
                Ok(Object::Integer(n)) => *n as u32,
                _ => 8,
            }
        };

        let soft_mask = if with_mask {
            match dict.get(b"SMask") {
                Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                    Ok(Object::Stream(mask)) => {
                        let mut mask = self.image_from_stream(mask, false);
                        mask.color_space = "DeviceGray".to_string();
                        mask.palette = None;
                        mask.components = None;
                        Some(Box::new(mask))
                    }
                    _ => None,
                },
                _ => None,
            }
        } else {
            None
        };

        let width = dimension(b"Width");
        let filters = stream_filters(dict);
        let fax = fax_params(&self.doc, dict, &filters, width);

        ImageObject {
            width,
            height: dimension(b"Height"),
            filters,
            color_space,
            bits_per_component,
            data: stream.content.clone(),
            predictor: decode_predictor(&self.doc, dict),
            soft_mask,
            decode_array: decode_array(&self.doc, dict),
            palette: color_space_obj.and_then(|cs| indexed_palette(&self.doc, cs)),
            components: color_space_obj.and_then(|cs| icc_components(&self.doc, cs)),
            fax,
        }
    }
}

/// `/DecodeParms` for the filter at `position`; a lone dictionary applies to
/// every filter.
fn decode_parms<'a>(doc: &'a Document, dict: &'a Dictionary, position: usize) -> Option<&'a Dictionary> {
    let parms = match resolve(doc, dict.get(b"DecodeParms").ok()?)? {
        Object::Array(arr) => resolve(doc, arr.get(position)?)?,
        other => other,
    };
    match parms {
        Object::Dictionary(d) => Some(d),
        _ => None,
    }
}

/// `/Predictor` from a stream's `/DecodeParms`
fn decode_predictor(doc: &Document, dict: &Dictionary) -> Option<u8> {
    match decode_parms(doc, dict, 0)?.get(b"Predictor") {
        Ok(Object::Integer(n)) => u8::try_from(*n).ok(),
        _ => None,
    }
}

/// Fax parameters when the filter chain contains `CCITTFaxDecode`.
///
/// `/Columns` falls back to the image width, then to 1728.
fn fax_params(doc: &Document, dict: &Dictionary, filters: &[String], width: u32) -> Option<FaxParams> {
    let position = filters.iter().position(|f| f == "CCITTFaxDecode" || f == "CCF")?;
    let mut params = FaxParams::default();
    if width > 0 {
        params.columns = width;
    }
    if let Some(parms) = decode_parms(doc, dict, position) {
        let integer = |key: &[u8]| parms.get(key).ok().and_then(|o| o.as_i64().ok());
        if let Some(k) = integer(b"K") {
            params.k = k;
        }
        if let Some(columns) = integer(b"Columns").and_then(|c| u32::try_from(c).ok()).filter(|c| *c > 0) {
            params.columns = columns;
        }
        params.rows = integer(b"Rows").and_then(|r| u32::try_from(r).ok()).filter(|r| *r > 0);
        params.black_is_1 = matches!(parms.get(b"BlackIs1"), Ok(Object::Boolean(true)));
    }
    Some(params)
}

fn decode_array(doc: &Document, dict: &Dictionary) -> Option<Vec<f32>> {
    match resolve(doc, dict.get(b"Decode").ok()?)? {
        Object::Array(arr) => arr.iter().map(number_of).collect(),
        _ => None,
    }
}

/// `/N` of an `[/ICCBased profile]` colour space.
fn icc_components(doc: &Document, obj: &Object) -> Option<u32> {
    let Some(Object::Array(arr)) = resolve(doc, obj) else {
        return None;
    };
    match (arr.first(), arr.get(1).and_then(|p| resolve(doc, p))) {
        (Some(Object::Name(name)), Some(Object::Stream(profile))) if name.as_slice() == b"ICCBased" => {
            profile.dict.get(b"N").ok().and_then(|n| n.as_i64().ok()).and_then(|n| u32::try_from(n).ok())
        }
        _ => None,
    }
}

/// Device family a palette base reduces to.
fn base_family(doc: &Document, obj: &Object) -> Option<String> {
    let family = match get_color_space_name(obj, doc).as_str() {
        "DeviceGray" | "G" | "CalGray" => "DeviceGray",
        "DeviceRGB" | "RGB" | "CalRGB" => "DeviceRGB",
        "DeviceCMYK" | "CMYK" => "DeviceCMYK",
        "ICCBased" => match icc_components(doc, obj)? {
            1 => "DeviceGray",
            3 => "DeviceRGB",
            4 => "DeviceCMYK",
            _ => return None,
        },
        _ => return None,
    };
    Some(family.to_string())
}

/// Palette of an `[/Indexed base hival lookup]` colour space. The lookup
/// table is either a string or a stream.
fn indexed_palette(doc: &Document, obj: &Object) -> Option<Palette> {
    let Some(Object::Array(arr)) = resolve(doc, obj) else {
        return None;
    };
    let is_indexed = matches!(arr.first(), Some(Object::Name(n)) if n.as_slice() == b"Indexed" || n.as_slice() == b"I");
    if !is_indexed || arr.len() < 4 {
        return None;
    }
    let base = base_family(doc, &arr[1])?;
    let hival = resolve(doc, &arr[2]).and_then(number_of)?.clamp(0.0, 255.0) as u32;
    let lookup = match resolve(doc, &arr[3])? {
        Object::String(bytes, _) => bytes.clone(),
        Object::Stream(table) => decompress_stream(table),
        _ => return None,
    };
    Some(Palette { base, hival, lookup })
}

/// Get color space name from PDF object
fn get_color_space_name(obj: &Object, doc: &Document) -> String {
    match obj {
        Object::Name(name) => String::from_utf8_lossy(name).to_string(),
        Object::Array(arr) => match arr.first() {
            Some(Object::Name(name)) => String::from_utf8_lossy(name).to_string(),
            _ => "Unknown".to_string(),
        },
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(resolved) => get_color_space_name(resolved, doc),
            Err(_) => "Unknown".to_string(),
        },
        _ => "Unknown".to_string(),
    }
}

impl PageSource for NativeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<PageSize> {
        let (x0, y0, x1, y1) = self.page_box(index)?;
        let (width, height) = (x1 - x0, y1 - y0);
        Ok(match self.rotation(index)? {
            90 | 270 => PageSize::new(height, width),
            _ => PageSize::new(width, height),
        })
    }
}

impl ImageSource for NativeDocument {
    fn page_images(&self, index: usize) -> Result<Vec<ImageObject>> {
        let page = self.page_dict(index)?;
        Ok(collect_page_images(&self.doc, page)
            .into_iter()
            .filter_map(|id| self.image_object(id))
            .collect())
    }
}

impl PageRenderer for NativeDocument {
    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage> {
        let page = self.page_dict(index)?;
        let page_box = self.page_box(index)?;
        let (x0, y0, x1, y1) = page_box;
        let (width, height) = scaled_dimensions(PageSize::new(x1 - x0, y1 - y0), scale);
        let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

        let placements = ContentScanner::new(&self.doc).scan_page(page);
        log::debug!(
            "page {}: compositing {} image placements onto {}x{}",
            index + 1,
            placements.len(),
            width,
            height
        );

        for placement in placements {
            let object = self.image_object(placement.object_id).ok_or(Error::Render {
                page: index,
                reason: format!("image object {:?} is missing", placement.object_id),
            })?;
            let bitmap = object.decode().map_err(|e| Error::Render {
                page: index,
                reason: format!("image {:?}: {}", placement.object_id, e),
            })?;
            composite(&mut canvas, &bitmap, &placement.matrix, page_box, scale);
        }

        let canvas = match self.rotation(index)? {
            90 => image::imageops::rotate90(&canvas),
            180 => image::imageops::rotate180(&canvas),
            270 => image::imageops::rotate270(&canvas),
            _ => canvas,
        };
        Ok(DynamicImage::ImageRgb8(canvas))
    }

    /// Only image placements are drawn.
    fn draws_content(&self, index: usize) -> bool {
        match self.page_dict(index) {
            Ok(page) => !ContentScanner::new(&self.doc).scan_page(page).is_empty(),
            Err(_) => false,
        }
    }
}

/// Paint `bitmap` onto `canvas` through the image space -> user space matrix.
///
/// Every canvas pixel inside the placement's bounding box is mapped back into
/// the unit square; pixels that land inside it sample the (pre-shrunk) bitmap.
fn composite(canvas: &mut RgbImage, bitmap: &DynamicImage, ctm: &Matrix, page_box: PageBox, scale: f32) {
    let Some(inverse) = ctm.inverse() else {
        return;
    };
    let (bx0, _, _, by1) = page_box;
    let (canvas_w, canvas_h) = canvas.dimensions();

    let (x0, y0, x1, y1) = ctm.unit_square_bounds();
    let left = (((x0 - bx0) * scale).floor().max(0.0) as u32).min(canvas_w);
    let right = (((x1 - bx0) * scale).ceil().max(0.0) as u32).min(canvas_w);
    let top = (((by1 - y1) * scale).floor().max(0.0) as u32).min(canvas_h);
    let bottom = (((by1 - y0) * scale).ceil().max(0.0) as u32).min(canvas_h);
    if left >= right || top >= bottom {
        return;
    }

    // Shrink large sources first so nearest sampling does not alias
    let target_w = ((ctm.scale_x() * scale).ceil() as u32).max(1);
    let target_h = ((ctm.scale_y() * scale).ceil() as u32).max(1);
    let source = if target_w < bitmap.width() || target_h < bitmap.height() {
        bitmap
            .resize_exact(
                target_w.min(bitmap.width()),
                target_h.min(bitmap.height()),
                FilterType::Triangle,
            )
            .to_rgba8()
    } else {
        bitmap.to_rgba8()
    };
    let (src_w, src_h) = source.dimensions();

    for cy in top..bottom {
        let y = by1 - (cy as f32 + 0.5) / scale;
        for cx in left..right {
            let x = bx0 + (cx as f32 + 0.5) / scale;
            let (u, v) = inverse.transform(x, y);
            if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                continue;
            }
            // Image row 0 is the top edge, i.e. v = 1
            let sx = ((u * src_w as f32) as u32).min(src_w - 1);
            let sy = (((1.0 - v) * src_h as f32) as u32).min(src_h - 1);
            let src = source.get_pixel(sx, sy).0;
            let alpha = src[3] as u32;
            let dst = canvas.get_pixel_mut(cx, cy);
            for channel in 0..3 {
                let blended = (src[channel] as u32 * alpha + dst.0[channel] as u32 * (255 - alpha)) / 255;
                dst.0[channel] = blended as u8;
            }
        }
    }
}
