//! Fixture PDFs built in memory with lopdf.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{Rgb, RgbImage};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::io::Write;
use std::path::Path;

/// An image placed on a fixture page.
#[derive(Debug, Clone, Copy)]
pub struct FixtureImage {
    pub width: u32,
    pub height: u32,
    /// Store the pixels uncompressed, like a naive scanner would
    pub raw: bool,
    /// Paper-like content instead of noise
    pub text_like: bool,
    /// 1-bit `[/Indexed /DeviceRGB 1 <FF00000000FF>]` stripes
    pub indexed: bool,
}

impl FixtureImage {
    pub fn flate(width: u32, height: u32) -> Self {
        Self { width, height, raw: false, text_like: false, indexed: false }
    }

    pub fn raw(width: u32, height: u32) -> Self {
        Self { width, height, raw: true, text_like: false, indexed: false }
    }

    /// An uncompressed scanned page: off-white paper with dark text lines.
    pub fn scan(width: u32, height: u32) -> Self {
        Self { width, height, raw: true, text_like: true, indexed: false }
    }

    /// A palette image: left half red, right half blue.
    pub fn indexed(width: u32, height: u32) -> Self {
        Self { width, height, raw: true, text_like: false, indexed: true }
    }
}

/// A fixture page: size in points and the images it paints, stacked from the
/// bottom-left corner.
#[derive(Debug, Clone)]
pub struct FixturePage {
    pub width: f32,
    pub height: f32,
    pub images: Vec<FixtureImage>,
}

/// Off-white page with rows of dark "words".
pub fn text_page(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let in_line = y % 24 < 10;
        let in_word = (x / 6) % 9 != 0 && x > 40 && x + 40 < width;
        if in_line && in_word {
            Rgb([30, 30, 35])
        } else {
            Rgb([246, 244, 238])
        }
    })
}

/// Busy pixel content that does not compress to nothing.
pub fn noise(width: u32, height: u32, seed: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = x
            .wrapping_mul(2654435761)
            .wrapping_add(y.wrapping_mul(40503))
            .wrapping_add(seed.wrapping_mul(97));
        Rgb([(v >> 3) as u8, (v >> 11) as u8, (x * 3 + y) as u8])
    })
}

/// Packed 1-bit indices: 0 (red) on the left half, 1 (blue) on the right.
fn palette_stripes(width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width.div_ceil(8) as usize;
    let mut data = vec![0u8; row_bytes * height as usize];
    for y in 0..height as usize {
        for x in (width / 2) as usize..width as usize {
            data[y * row_bytes + x / 8] |= 0x80 >> (x % 8);
        }
    }
    data
}

fn image_stream(image: FixtureImage, seed: u32) -> Stream {
    if image.indexed {
        let palette = Object::String(vec![0xFF, 0x00, 0x00, 0x00, 0x00, 0xFF], StringFormat::Hexadecimal);
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => vec!["Indexed".into(), "DeviceRGB".into(), 1.into(), palette],
            "BitsPerComponent" => 1i64,
        };
        let mut stream = Stream::new(dict, palette_stripes(image.width, image.height));
        stream.allows_compression = false;
        return stream;
    }
    let pixels = if image.text_like {
        text_page(image.width, image.height).into_raw()
    } else {
        noise(image.width, image.height, seed).into_raw()
    };
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8i64,
    };
    let data = if image.raw {
        pixels
    } else {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&pixels).unwrap();
        dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        encoder.finish().unwrap()
    };
    let mut stream = Stream::new(dict, data);
    stream.allows_compression = false;
    stream
}

/// Build a document with one page per entry of `pages`.
pub fn build_pdf(pages: &[FixturePage]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    let mut seed = 0;

    for page in pages {
        let mut xobjects = lopdf::Dictionary::new();
        let mut content = String::new();
        let mut y = 0.0;
        for (index, image) in page.images.iter().enumerate() {
            seed += 1;
            let image_id = doc.add_object(image_stream(*image, seed));
            let name = format!("Im{}", index);
            xobjects.set(name.as_bytes().to_vec(), Object::Reference(image_id));
            let (w, h) = (image.width as f32, image.height as f32);
            content.push_str(&format!("q {} 0 0 {} 0 {} cm /{} Do Q\n", w, h, y, name));
            y += h;
        }

        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(page.width), Object::Real(page.height)],
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => xobjects },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc
}

/// Build and save a fixture document.
pub fn write_pdf(path: &Path, pages: &[FixturePage]) {
    let mut doc = build_pdf(pages);
    doc.save(path).unwrap();
}

/// Save a noise image of the given size; the format follows the extension.
pub fn write_image(path: &Path, width: u32, height: u32) {
    noise(width, height, width ^ height).save(path).unwrap();
}
