//! Decoding of PDF image XObject data into bitmaps.

use fax::decoder::{decode_g3, decode_g4, pels};
use fax::Color;
use flate2::read::ZlibDecoder;
use image::{imageops::FilterType, DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use std::io::Read;

use crate::engine::ImageObject;
use crate::error::{Error, Result};

/// Inflate zlib data. Truncated streams yield what could be recovered.
pub(crate) fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decoded = Vec::new();
    match decoder.read_to_end(&mut decoded) {
        Ok(_) => Ok(decoded),
        Err(_) if !decoded.is_empty() => Ok(decoded),
        Err(e) => Err(Error::Decode(format!("FlateDecode failed: {}", e))),
    }
}

/// Number of colour components for a colour space family, if fixed.
fn components_for(color_space: &str) -> Option<u32> {
    match color_space {
        "DeviceRGB" | "RGB" | "CalRGB" => Some(3),
        "DeviceGray" | "Gray" | "G" | "CalGray" => Some(1),
        "DeviceCMYK" | "CMYK" => Some(4),
        _ => None,
    }
}

/// Undo PNG row predictors (`/Predictor` 10-15).
fn unpredict_png(data: &[u8], row_bytes: usize, bytes_per_pixel: usize) -> Result<Vec<u8>> {
    let stride = row_bytes + 1;
    let rows = data.len() / stride;
    let mut out = vec![0u8; rows * row_bytes];
    let bpp = bytes_per_pixel.max(1);

    for row in 0..rows {
        let filter = data[row * stride];
        let src = &data[row * stride + 1..(row + 1) * stride];
        let (done, current) = out.split_at_mut(row * row_bytes);
        let prev = if row > 0 {
            &done[(row - 1) * row_bytes..]
        } else {
            &[][..]
        };
        let current = &mut current[..row_bytes];

        for i in 0..row_bytes {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = prev.get(i).copied().unwrap_or(0);
            let up_left = if i >= bpp {
                prev.get(i - bpp).copied().unwrap_or(0)
            } else {
                0
            };
            current[i] = match filter {
                0 => src[i],
                1 => src[i].wrapping_add(left),
                2 => src[i].wrapping_add(up),
                3 => src[i].wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => src[i].wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(Error::Decode(format!("unknown PNG predictor {}", other)));
                }
            };
        }
    }

    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb_data = Vec::with_capacity(cmyk.len() / 4 * 3);
    for chunk in cmyk.chunks(4) {
        let c = chunk[0] as f32 / 255.0;
        let m = chunk[1] as f32 / 255.0;
        let y = chunk[2] as f32 / 255.0;
        let k = chunk[3] as f32 / 255.0;

        rgb_data.push(((1.0 - c) * (1.0 - k) * 255.0) as u8);
        rgb_data.push(((1.0 - m) * (1.0 - k) * 255.0) as u8);
        rgb_data.push(((1.0 - y) * (1.0 - k) * 255.0) as u8);
    }
    rgb_data
}

/// Bytes per row of packed samples.
fn row_bytes(width: u32, components: u32, bpc: u32) -> usize {
    (width as usize * components as usize * bpc as usize).div_ceil(8)
}

/// Number of samples per pixel as stored in the stream.
fn sample_components(object: &ImageObject, data_len: usize) -> Result<u32> {
    if object.palette.is_some() {
        return Ok(1);
    }
    if let Some(n) = components_for(&object.color_space) {
        return Ok(n);
    }
    if object.color_space == "ICCBased" {
        if let Some(n) = object.components.filter(|n| matches!(n, 1 | 3 | 4)) {
            return Ok(n);
        }
        // No usable /N: guess from the amount of data
        let bpc = object.bits_per_component.max(1);
        let fits = |n: u32| row_bytes(object.width, n, bpc) * object.height as usize <= data_len;
        return Ok([4, 3].into_iter().find(|n| fits(*n)).unwrap_or(1));
    }
    Err(Error::Decode(format!(
        "unsupported color space: {}",
        object.color_space
    )))
}

/// Unpack rows of `bpc`-bit samples (rows padded to whole bytes) into one
/// value per sample. 16-bit samples are big-endian.
fn unpack_samples(data: &[u8], width: u32, height: u32, components: u32, bpc: u32) -> Vec<u16> {
    let per_row = (width * components) as usize;
    let stride = row_bytes(width, components, bpc);
    let mut samples = Vec::with_capacity(per_row * height as usize);

    for row in data.chunks(stride).take(height as usize) {
        match bpc {
            8 => samples.extend(row[..per_row].iter().map(|&b| b as u16)),
            16 => samples.extend(
                row.chunks_exact(2)
                    .take(per_row)
                    .map(|p| u16::from_be_bytes([p[0], p[1]])),
            ),
            _ => {
                let mask = (1u16 << bpc) - 1;
                samples.extend((0..per_row).map(|i| {
                    let bit = i * bpc as usize;
                    let shift = 8 - bpc as usize - bit % 8;
                    (row[bit / 8] as u16 >> shift) & mask
                }));
            }
        }
    }
    samples
}

/// Map raw samples to 8-bit colour components.
///
/// Indexed images go through the palette; `/Decode` remaps the sample range
/// first (for palettes it remaps the index).
fn samples_to_components(
    object: &ImageObject,
    samples: &[u16],
    components: u32,
) -> Result<(String, Vec<u8>)> {
    let max = ((1u32 << object.bits_per_component) - 1) as f32;
    let decode_range = |channel: usize| -> Option<(f32, f32)> {
        let decode = object.decode_array.as_ref()?;
        Some((*decode.get(channel * 2)?, *decode.get(channel * 2 + 1)?))
    };

    if let Some(palette) = &object.palette {
        let base_components = components_for(&palette.base).ok_or_else(|| {
            Error::Decode(format!("unsupported palette base: {}", palette.base))
        })? as usize;
        let range = decode_range(0);
        let mut out = Vec::with_capacity(samples.len() * base_components);
        for &sample in samples {
            let index = match range {
                Some((lo, hi)) => (lo + sample as f32 * (hi - lo) / max).round().max(0.0) as u32,
                None => sample as u32,
            }
            .min(palette.hival) as usize;
            let start = index * base_components;
            match palette.lookup.get(start..start + base_components) {
                Some(entry) => out.extend_from_slice(entry),
                // Short tables read as black
                None => out.extend(std::iter::repeat(0).take(base_components)),
            }
        }
        return Ok((palette.base.clone(), out));
    }

    let ranges: Vec<Option<(f32, f32)>> = (0..components as usize).map(decode_range).collect();
    let out = samples
        .iter()
        .enumerate()
        .map(|(i, &sample)| {
            let value = match ranges[i % components as usize] {
                Some((lo, hi)) => lo + sample as f32 * (hi - lo) / max,
                None => sample as f32 / max,
            };
            (value.clamp(0.0, 1.0) * 255.0).round() as u8
        })
        .collect();
    let family = match components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        _ => "DeviceCMYK",
    };
    Ok((family.to_string(), out))
}

/// Turn unfiltered sample data into a bitmap according to the colour space.
fn raw_to_image(object: &ImageObject, data: &[u8]) -> Result<DynamicImage> {
    let (width, height) = (object.width, object.height);
    let bpc = object.bits_per_component;
    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        return Err(Error::Decode(format!("unsupported bits per component: {}", bpc)));
    }

    let components = sample_components(object, data.len())?;
    let expected_size = row_bytes(width, components, bpc) * height as usize;
    if data.len() < expected_size {
        return Err(Error::Decode(format!(
            "unsupported {} format: {} bits, {} bytes (expected {})",
            object.color_space,
            bpc,
            data.len(),
            expected_size
        )));
    }

    let samples = unpack_samples(data, width, height, components, bpc);
    let (family, pixels) = samples_to_components(object, &samples, components)?;
    let image = match family.as_str() {
        "DeviceGray" => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        "DeviceRGB" => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        _ => RgbImage::from_raw(width, height, cmyk_to_rgb(&pixels)).map(DynamicImage::ImageRgb8),
    };
    image.ok_or_else(|| Error::Decode("failed to build image from raw data".to_string()))
}

/// Pack one row of fax transitions into 1-bit samples.
///
/// With `black_is_1` unset, black pixels are 0 bits.
fn pack_fax_row(transitions: &[u16], width: u16, black_is_1: bool) -> Vec<u8> {
    let mut row = vec![0u8; (width as usize).div_ceil(8)];
    for (x, color) in pels(transitions, width).enumerate() {
        if (color == Color::Black) == black_is_1 {
            row[x / 8] |= 0x80 >> (x % 8);
        }
    }
    row
}

/// Undo `CCITTFaxDecode`: Group 4, or one-dimensional Group 3.
fn decode_fax(data: &[u8], object: &ImageObject) -> Result<Vec<u8>> {
    let params = object.fax.unwrap_or_default();
    let width = u16::try_from(params.columns)
        .map_err(|_| Error::Decode(format!("fax width {} is too large", params.columns)))?;
    let rows = params.rows.filter(|r| *r > 0).unwrap_or(object.height);
    let height = u16::try_from(rows).ok();

    let mut out = Vec::new();
    let decoded = match params.k {
        k if k < 0 => decode_g4(data.iter().copied(), width, height, |transitions| {
            out.extend(pack_fax_row(transitions, width, params.black_is_1))
        }),
        0 => decode_g3(data.iter().copied(), |transitions| {
            out.extend(pack_fax_row(transitions, width, params.black_is_1))
        }),
        k => {
            return Err(Error::Decode(format!(
                "CCITTFaxDecode with K={} (mixed 1D/2D) is not supported",
                k
            )))
        }
    };

    let stride = (width as usize).div_ceil(8);
    if out.is_empty() {
        return Err(Error::Decode("CCITTFaxDecode produced no rows".to_string()));
    }
    if decoded.is_none() {
        log::warn!("CCITT data ended early after {} rows", out.len() / stride);
    }
    // Missing rows are white paper
    let white = if params.black_is_1 { 0x00 } else { 0xFF };
    out.resize(stride * object.height as usize, white);
    Ok(out)
}

/// Undo `RunLengthDecode`.
fn run_length_decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut i = 0;
    while i < data.len() {
        let length = data[i] as usize;
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let end = (i + length + 1).min(data.len());
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                if let Some(&byte) = data.get(i) {
                    out.extend(std::iter::repeat(byte).take(257 - length));
                }
                i += 1;
            }
        }
    }
    out
}

/// Undo `ASCIIHexDecode`; whitespace is skipped and `>` ends the data.
fn ascii_hex_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut digits = Vec::with_capacity(data.len());
    for &byte in data {
        match byte {
            b'>' => break,
            b if b.is_ascii_whitespace() => {}
            b if b.is_ascii_hexdigit() => digits.push((b as char).to_digit(16).unwrap_or(0) as u8),
            other => {
                return Err(Error::Decode(format!(
                    "invalid ASCIIHexDecode byte 0x{:02x}",
                    other
                )))
            }
        }
    }
    if digits.len() % 2 == 1 {
        digits.push(0);
    }
    Ok(digits.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect())
}

/// Decode an image object's own samples, ignoring any soft mask.
fn decode_samples(object: &ImageObject) -> Result<DynamicImage> {
    if !object.has_dimensions() {
        return Err(Error::Decode("image has no pixel dimensions".to_string()));
    }

    let mut data = object.data.clone();
    for filter in &object.filters {
        match filter.as_str() {
            "FlateDecode" | "Fl" => data = inflate(&data)?,
            "DCTDecode" | "DCT" => {
                let img = image::load_from_memory_with_format(&data, ImageFormat::Jpeg)
                    .map_err(|e| Error::Decode(format!("failed to decode JPEG image: {}", e)))?;
                return Ok(img);
            }
            "JPXDecode" => {
                let img = image::load_from_memory(&data)
                    .map_err(|e| Error::Decode(format!("failed to decode JPEG2000 image: {}", e)))?;
                return Ok(img);
            }
            "CCITTFaxDecode" | "CCF" => data = decode_fax(&data, object)?,
            "RunLengthDecode" | "RL" => data = run_length_decode(&data),
            "ASCIIHexDecode" | "AHx" => data = ascii_hex_decode(&data)?,
            other => return Err(Error::Decode(format!("unsupported filter: {}", other))),
        }
    }

    if let Some(p) = object.predictor.filter(|p| *p >= 10) {
        let components = sample_components(object, data.len()).unwrap_or(3) as usize;
        let bits = object.bits_per_component as usize * components;
        let row_bytes = (object.width as usize * bits).div_ceil(8);
        log::debug!("undoing PNG predictor {} ({} bytes per row)", p, row_bytes);
        data = unpredict_png(&data, row_bytes, bits.div_ceil(8))?;
    }

    raw_to_image(object, &data)
}

/// Decode an image object into a bitmap.
///
/// The soft mask, when present and decodable, becomes the alpha channel; it is
/// resized to the image when the two disagree in size.
pub fn decode_image_object(object: &ImageObject) -> Result<DynamicImage> {
    let img = decode_samples(object)?;

    let Some(mask) = object.soft_mask.as_deref() else {
        return Ok(img);
    };

    let alpha = match decode_samples(mask) {
        Ok(mask_img) => mask_img.to_luma8(),
        Err(e) => {
            log::warn!("ignoring undecodable soft mask: {}", e);
            return Ok(img);
        }
    };
    let (width, height) = (img.width(), img.height());
    let alpha = if alpha.dimensions() != (width, height) {
        image::imageops::resize(&alpha, width, height, FilterType::Triangle)
    } else {
        alpha
    };

    let rgb = img.to_rgb8();
    let mut rgba = RgbaImage::new(width, height);
    for ((out, pixel), a) in rgba.pixels_mut().zip(rgb.pixels()).zip(alpha.pixels()) {
        out.0 = [pixel[0], pixel[1], pixel[2], a[0]];
    }
    Ok(DynamicImage::ImageRgba8(rgba))
}
