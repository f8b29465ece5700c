// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image subsystem: capture of drawn raster images during extraction and
// image XObject construction during reconstruction.
//
// JPEG and JPEG 2000 payloads pass through untouched. Other images are
// decoded from their raw samples (Gray, RGB, CMYK, ICCBased, Indexed, stencil
// masks; 1 to 16 bits per component) and re-encoded with the `image` crate,
// falling back to PNG when the preferred format cannot hold the pixels.

use std::collections::HashMap;
use std::io::Cursor;

use image::codecs::jpeg::JpegDecoder;
use image::{
    DynamicImage, ExtendedColorType, GrayImage, ImageDecoder, ImageFormat, RgbImage, RgbaImage,
};
use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use satzwerk_core::config::RasterFormat;
use satzwerk_core::error::{Result, SatzwerkError};
use satzwerk_core::model::PdfJsonImageElement;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::engine::{ImageEvent, Matrix, PageVisitor, transform_point};
use crate::fonts::catalogue::NodeKey;
use crate::payload;
use crate::pdf::objects::{
    get, get_dict, get_number, get_numbers, get_stream, name, number, real, resolve,
};
use crate::pdf::streams::flate_stream;

/// First z-order assigned to extracted images; images sit beneath text.
pub const IMAGE_Z_BASE: i32 = -1_000_000;

/// Nesting limit when resolving named or indexed colour spaces.
const MAX_COLOR_SPACE_DEPTH: usize = 8;

// -- Bounds -------------------------------------------------------------------

/// Axis-aligned device-space box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

impl Bounds {
    /// The unit square mapped through `ctm`. Non-finite results collapse to
    /// an empty box at the origin.
    pub fn of_unit_square(ctm: &Matrix) -> Self {
        let corners = [
            transform_point(ctm, 0.0, 0.0),
            transform_point(ctm, 1.0, 0.0),
            transform_point(ctm, 0.0, 1.0),
            transform_point(ctm, 1.0, 1.0),
        ];
        let xs = corners.iter().map(|p| p.0);
        let ys = corners.iter().map(|p| p.1);
        let left = xs.clone().fold(f64::INFINITY, f64::min);
        let right = xs.fold(f64::NEG_INFINITY, f64::max);
        let bottom = ys.clone().fold(f64::INFINITY, f64::min);
        let top = ys.fold(f64::NEG_INFINITY, f64::max);
        if ![left, right, bottom, top].iter().all(|v| v.is_finite()) {
            return Self {
                left: 0.0,
                right: 0.0,
                bottom: 0.0,
                top: 0.0,
            };
        }
        Self {
            left,
            right,
            bottom,
            top,
        }
    }

    pub fn width(&self) -> f64 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.top - self.bottom).max(0.0)
    }
}

// -- Extraction ---------------------------------------------------------------

#[derive(Debug, Clone)]
struct EncodedImage {
    data: String,
    format: String,
}

/// Page visitor collecting image elements.
///
/// The payload cache lives for the whole document so an XObject drawn on
/// many pages is encoded once. Stencil masks and inline images are encoded
/// every time they are drawn.
pub struct ImageCollector<'a> {
    doc: &'a Document,
    format: RasterFormat,
    cache: HashMap<NodeKey, Option<EncodedImage>>,
    elements: Vec<PdfJsonImageElement>,
    encodings: usize,
}

impl<'a> ImageCollector<'a> {
    pub fn new(doc: &'a Document, format: RasterFormat) -> Self {
        Self {
            doc,
            format,
            cache: HashMap::new(),
            elements: Vec::new(),
            encodings: 0,
        }
    }

    /// Elements collected since the last call, in drawing order.
    pub fn take_page(&mut self) -> Vec<PdfJsonImageElement> {
        std::mem::take(&mut self.elements)
    }

    /// Number of payload encodings performed so far.
    pub fn encodings(&self) -> usize {
        self.encodings
    }

    fn encode(&mut self, event: &ImageEvent<'_>, stencil: bool) -> Option<EncodedImage> {
        let (doc, format) = (self.doc, self.format);
        match event.key {
            Some(key) if !stencil => {
                if let Some(cached) = self.cache.get(&key) {
                    return cached.clone();
                }
                self.encodings += 1;
                let encoded = encode_image(doc, event.stream, event.resources, format);
                self.cache.insert(key, encoded.clone());
                encoded
            }
            _ => {
                self.encodings += 1;
                encode_image(doc, event.stream, event.resources, format)
            }
        }
    }
}

impl PageVisitor for ImageCollector<'_> {
    fn image(&mut self, event: &ImageEvent<'_>) {
        let dict = expand_inline_keys(&event.stream.dict);
        let stencil = is_stencil(self.doc, &dict);
        let Some(encoded) = self.encode(event, stencil) else {
            debug!(name = ?event.name, "image skipped, payload not encodable");
            return;
        };
        let bounds = Bounds::of_unit_square(&event.ctm);
        let z_order = IMAGE_Z_BASE + self.elements.len() as i32;
        self.elements.push(PdfJsonImageElement {
            id: Some(Uuid::new_v4().to_string()),
            object_name: event.name.clone(),
            inline_image: event.name.is_none(),
            native_width: get_number(self.doc, &dict, b"Width").map(|w| w.max(0.0) as u32),
            native_height: get_number(self.doc, &dict, b"Height").map(|h| h.max(0.0) as u32),
            x: Some(bounds.left),
            y: Some(bounds.bottom),
            width: Some(bounds.width()),
            height: Some(bounds.height()),
            left: Some(bounds.left),
            right: Some(bounds.right),
            top: Some(bounds.top),
            bottom: Some(bounds.bottom),
            transform: Some(event.ctm.to_vec()),
            z_order: Some(z_order),
            image_data: Some(encoded.data),
            image_format: Some(encoded.format),
        });
    }
}

fn encode_image(
    doc: &Document,
    stream: &Stream,
    resources: Option<&Dictionary>,
    format: RasterFormat,
) -> Option<EncodedImage> {
    let dict = expand_inline_keys(&stream.dict);
    let filters = filters(doc, &dict);
    match filters.last().map(String::as_str) {
        Some("DCTDecode") if filters.len() == 1 => {
            return Some(EncodedImage {
                data: payload::encode(&stream.content),
                format: RasterFormat::Jpeg.tag().to_string(),
            });
        }
        Some("JPXDecode") if filters.len() == 1 => {
            return Some(EncodedImage {
                data: payload::encode(&stream.content),
                format: "jpx".to_string(),
            });
        }
        Some("DCTDecode" | "JPXDecode" | "JBIG2Decode" | "CCITTFaxDecode") => {
            trace!(?filters, "image filter chain not supported");
            return None;
        }
        _ => {}
    }

    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        Stream::new(dict.clone(), stream.content.clone())
            .decompressed_content()
            .map_err(|err| trace!(%err, "image stream not decodable"))
            .ok()?
    };
    let image = decode_raster(doc, &dict, &data, resources)?;
    let (bytes, tag) = match encode_to_format(&image, format) {
        Ok(bytes) => (bytes, format.tag()),
        Err(err) if format != RasterFormat::Png => {
            trace!(%err, "preferred format failed, falling back to PNG");
            (encode_to_format(&image, RasterFormat::Png).ok()?, RasterFormat::Png.tag())
        }
        Err(err) => {
            debug!(%err, "image encoding failed");
            return None;
        }
    };
    Some(EncodedImage {
        data: payload::encode(&bytes),
        format: tag.to_string(),
    })
}

/// Encode a `DynamicImage` into the given raster format.
fn encode_to_format(image: &DynamicImage, format: RasterFormat) -> Result<Vec<u8>> {
    let target = match format {
        RasterFormat::Png => ImageFormat::Png,
        RasterFormat::Jpeg => ImageFormat::Jpeg,
    };
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, target)
        .map_err(|err| SatzwerkError::ImageError(format!("image encoding failed: {}", err)))?;
    Ok(buffer)
}

/// Inline images use abbreviated keys and names; expand them so the rest of
/// the pipeline sees a regular image dictionary.
fn expand_inline_keys(dict: &Dictionary) -> Dictionary {
    let mut expanded = Dictionary::new();
    for (key, value) in dict.iter() {
        let key: &[u8] = match key.as_slice() {
            b"W" => b"Width",
            b"H" => b"Height",
            b"CS" => b"ColorSpace",
            b"BPC" => b"BitsPerComponent",
            b"F" => b"Filter",
            b"DP" => b"DecodeParms",
            b"IM" => b"ImageMask",
            b"D" => b"Decode",
            b"I" => b"Interpolate",
            other => other,
        };
        let value = match value {
            Object::Name(value) => Object::Name(expand_inline_name(value)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Object::Name(value) => Object::Name(expand_inline_name(value)),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            other => other.clone(),
        };
        expanded.set(key.to_vec(), value);
    }
    expanded
}

fn expand_inline_name(value: &[u8]) -> Vec<u8> {
    let full: &[u8] = match value {
        b"G" => b"DeviceGray",
        b"RGB" => b"DeviceRGB",
        b"CMYK" => b"DeviceCMYK",
        b"I" => b"Indexed",
        b"AHx" => b"ASCIIHexDecode",
        b"A85" => b"ASCII85Decode",
        b"LZW" => b"LZWDecode",
        b"Fl" => b"FlateDecode",
        b"RL" => b"RunLengthDecode",
        b"CCF" => b"CCITTFaxDecode",
        b"DCT" => b"DCTDecode",
        other => other,
    };
    full.to_vec()
}

fn filters(doc: &Document, dict: &Dictionary) -> Vec<String> {
    match get(doc, dict, b"Filter") {
        Some(Object::Name(filter)) => vec![String::from_utf8_lossy(filter).into_owned()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match resolve(doc, item) {
                Some(Object::Name(filter)) => Some(String::from_utf8_lossy(filter).into_owned()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn is_stencil(doc: &Document, dict: &Dictionary) -> bool {
    matches!(get(doc, dict, b"ImageMask"), Some(Object::Boolean(true)))
}

// -- Raw sample decoding ------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed {
        base: Box<ColorSpace>,
        hival: usize,
        lookup: Vec<u8>,
    },
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed { .. } => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }

    fn resolve(
        doc: &Document,
        object: &Object,
        resources: Option<&Dictionary>,
        depth: usize,
    ) -> Option<Self> {
        if depth > MAX_COLOR_SPACE_DEPTH {
            return None;
        }
        match resolve(doc, object)? {
            Object::Name(space) => match space.as_slice() {
                b"DeviceGray" | b"CalGray" | b"G" => Some(Self::Gray),
                b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(Self::Rgb),
                b"DeviceCMYK" | b"CMYK" => Some(Self::Cmyk),
                other => {
                    let named = get_dict(doc, resources?, b"ColorSpace")?.get(other).ok()?;
                    Self::resolve(doc, named, resources, depth + 1)
                }
            },
            Object::Array(items) => {
                let family = items.first().and_then(|f| resolve(doc, f))?;
                match family {
                    Object::Name(family) if family == b"ICCBased" => {
                        let profile = items.get(1).and_then(|p| resolve(doc, p))?;
                        let Object::Stream(profile) = profile else {
                            return None;
                        };
                        match get_number(doc, &profile.dict, b"N").map(|n| n as i64) {
                            Some(1) => Some(Self::Gray),
                            Some(3) => Some(Self::Rgb),
                            Some(4) => Some(Self::Cmyk),
                            _ => None,
                        }
                    }
                    Object::Name(family) if family == b"CalGray" => Some(Self::Gray),
                    Object::Name(family) if family == b"CalRGB" => Some(Self::Rgb),
                    Object::Name(family) if family == b"Indexed" || family == b"I" => {
                        let base = Self::resolve(doc, items.get(1)?, resources, depth + 1)?;
                        let hival = items.get(2).and_then(number)?.clamp(0.0, 255.0) as usize;
                        let lookup = match items.get(3).and_then(|l| resolve(doc, l))? {
                            Object::String(bytes, _) => bytes.clone(),
                            Object::Stream(stream) => crate::pdf::objects::stream_bytes(stream),
                            _ => return None,
                        };
                        Some(Self::Indexed {
                            base: Box::new(base),
                            hival,
                            lookup,
                        })
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Expand 8-bit samples of this space to RGB.
    fn to_rgb(&self, samples: &[u8], out: &mut Vec<u8>) {
        match self {
            Self::Gray => {
                for &v in samples {
                    out.extend_from_slice(&[v, v, v]);
                }
            }
            Self::Rgb => out.extend_from_slice(samples),
            Self::Cmyk => {
                for px in samples.chunks_exact(4) {
                    let k = 255 - u16::from(px[3]);
                    let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
                    out.extend_from_slice(&[channel(px[0]), channel(px[1]), channel(px[2])]);
                }
            }
            Self::Indexed {
                base,
                hival,
                lookup,
            } => {
                let width = base.components();
                for &index in samples {
                    let start = usize::from(index).min(*hival) * width;
                    match lookup.get(start..start + width) {
                        Some(entry) => base.to_rgb(entry, out),
                        None => out.extend_from_slice(&[0, 0, 0]),
                    }
                }
            }
        }
    }
}

/// Unpack `components` samples per pixel at `bpc` bits, rows byte-aligned.
/// Values stay unscaled except 16-bit samples, which keep their high byte.
fn unpack_samples(
    data: &[u8],
    width: usize,
    height: usize,
    components: usize,
    bpc: u8,
) -> Option<Vec<u8>> {
    let per_row = width * components;
    let row_bytes = (per_row * usize::from(bpc)).div_ceil(8);
    if row_bytes == 0 || data.len() < row_bytes * height {
        return None;
    }
    let mut samples = Vec::with_capacity(per_row * height);
    for row in data.chunks_exact(row_bytes).take(height) {
        match bpc {
            8 => samples.extend_from_slice(&row[..per_row]),
            16 => samples.extend(row.chunks_exact(2).take(per_row).map(|pair| pair[0])),
            1 | 2 | 4 => {
                let mask = (1u16 << bpc) - 1;
                for i in 0..per_row {
                    let bit = i * usize::from(bpc);
                    let shift = 8 - usize::from(bpc) - bit % 8;
                    samples.push(((u16::from(row[bit / 8]) >> shift) & mask) as u8);
                }
            }
            _ => return None,
        }
    }
    Some(samples)
}

fn scale_to_byte(value: u8, bpc: u8) -> u8 {
    match bpc {
        1 => value * 255,
        2 => value * 85,
        4 => value * 17,
        _ => value,
    }
}

fn decode_is_inverted(doc: &Document, dict: &Dictionary) -> bool {
    get_numbers(doc, dict, b"Decode")
        .is_some_and(|decode| decode.len() >= 2 && decode[0] == 1.0 && decode[1] == 0.0)
}

fn decode_raster(
    doc: &Document,
    dict: &Dictionary,
    data: &[u8],
    resources: Option<&Dictionary>,
) -> Option<DynamicImage> {
    let width = get_number(doc, dict, b"Width").filter(|w| *w >= 1.0)? as u32;
    let height = get_number(doc, dict, b"Height").filter(|h| *h >= 1.0)? as u32;
    let (w, h) = (width as usize, height as usize);

    if is_stencil(doc, dict) {
        let samples = unpack_samples(data, w, h, 1, 1)?;
        let painted_value = u8::from(decode_is_inverted(doc, dict));
        let mut pixels = Vec::with_capacity(w * h * 4);
        for sample in samples {
            let alpha = if sample == painted_value { 255 } else { 0 };
            pixels.extend_from_slice(&[0, 0, 0, alpha]);
        }
        return RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8);
    }

    let bpc = get_number(doc, dict, b"BitsPerComponent").unwrap_or(8.0) as u8;
    let space = match dict.get(b"ColorSpace") {
        Ok(object) => ColorSpace::resolve(doc, object, resources, 0)?,
        Err(_) => ColorSpace::Gray,
    };
    let mut samples = unpack_samples(data, w, h, space.components(), bpc)?;
    if !matches!(space, ColorSpace::Indexed { .. }) {
        let inverted = decode_is_inverted(doc, dict);
        for sample in &mut samples {
            *sample = scale_to_byte(*sample, bpc);
            if inverted {
                *sample = 255 - *sample;
            }
        }
    }

    let image = match space {
        ColorSpace::Gray => DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, samples)?),
        ColorSpace::Rgb => DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, samples)?),
        other => {
            let mut rgb = Vec::with_capacity(w * h * 3);
            other.to_rgb(&samples, &mut rgb);
            DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, rgb)?)
        }
    };

    match soft_mask(doc, dict, width, height) {
        Some(alpha) => {
            let mut rgba = image.to_rgba8();
            for (pixel, a) in rgba.pixels_mut().zip(alpha.pixels()) {
                pixel.0[3] = a.0[0];
            }
            Some(DynamicImage::ImageRgba8(rgba))
        }
        None => Some(image),
    }
}

/// The image's `/SMask` as an 8-bit alpha plane of the image's size.
fn soft_mask(doc: &Document, dict: &Dictionary, width: u32, height: u32) -> Option<GrayImage> {
    let mask = get_stream(doc, dict, b"SMask")?;
    let data = if mask.dict.has(b"Filter") {
        mask.decompressed_content().ok()?
    } else {
        mask.content.clone()
    };
    let mask_width = get_number(doc, &mask.dict, b"Width").filter(|w| *w >= 1.0)? as u32;
    let mask_height = get_number(doc, &mask.dict, b"Height").filter(|h| *h >= 1.0)? as u32;
    let bpc = get_number(doc, &mask.dict, b"BitsPerComponent").unwrap_or(8.0) as u8;
    let samples = unpack_samples(&data, mask_width as usize, mask_height as usize, 1, bpc)?
        .into_iter()
        .map(|v| scale_to_byte(v, bpc))
        .collect();
    let plane = GrayImage::from_raw(mask_width, mask_height, samples)?;
    if (mask_width, mask_height) == (width, height) {
        Some(plane)
    } else {
        Some(image::imageops::resize(
            &plane,
            width,
            height,
            image::imageops::FilterType::Triangle,
        ))
    }
}

// -- Reconstruction -----------------------------------------------------------

/// Create an image XObject from an element's payload.
pub fn image_xobject(doc: &mut Document, element: &PdfJsonImageElement) -> Option<ObjectId> {
    let data = payload::decode_opt(element.image_data.as_deref())?;
    let format = element
        .image_format
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();

    let stream = if format == "jpx" || format == "jp2" {
        let width = element.native_width.filter(|w| *w > 0)?;
        let height = element.native_height.filter(|h| *h > 0)?;
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "Filter" => "JPXDecode",
            },
            data,
        )
    } else if format == "jpeg" || format == "jpg" || data.starts_with(&[0xFF, 0xD8]) {
        jpeg_stream(data)?
    } else {
        match raster_stream(doc, &data) {
            Ok(stream) => stream,
            Err(err) => {
                debug!(id = ?element.id, %err, "image payload not decodable");
                return None;
            }
        }
    };
    Some(doc.add_object(stream))
}

fn jpeg_stream(data: Vec<u8>) -> Option<Stream> {
    let (width, height, space) = {
        let decoder = JpegDecoder::new(Cursor::new(data.as_slice()))
            .map_err(|err| debug!(%err, "JPEG header not readable"))
            .ok()?;
        let (width, height) = decoder.dimensions();
        let space = match decoder.original_color_type() {
            ExtendedColorType::L8 | ExtendedColorType::L16 => "DeviceGray",
            ExtendedColorType::Cmyk8 => "DeviceCMYK",
            _ => "DeviceRGB",
        };
        (width, height, space)
    };
    Some(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        data,
    ))
}

fn raster_stream(doc: &mut Document, data: &[u8]) -> Result<Stream> {
    let image = image::load_from_memory(data)
        .map_err(|err| SatzwerkError::ImageError(format!("failed to decode image: {}", err)))?;
    let (width, height) = (image.width(), image.height());
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(width),
        "Height" => i64::from(height),
        "BitsPerComponent" => 8,
    };

    let color = image.color();
    if color.has_alpha() {
        let rgba = image.to_rgba8();
        let alpha: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
        let mask = flate_stream(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            &alpha,
        )?;
        let mask_id = doc.add_object(mask);
        dict.set("SMask", Object::Reference(mask_id));
    }

    let pixels = if color.has_color() {
        dict.set("ColorSpace", name("DeviceRGB"));
        image.to_rgb8().into_raw()
    } else {
        dict.set("ColorSpace", name("DeviceGray"));
        image.to_luma8().into_raw()
    };
    flate_stream(dict, &pixels)
}

/// Placement matrix for an element, or `None` when it has no drawable area.
///
/// A stored transform wins. Without one, the box comes from width/height
/// and left/bottom, then right/top, then the native pixel size.
pub fn placement(element: &PdfJsonImageElement) -> Option<Matrix> {
    if let Some(transform) = element.transform.as_deref()
        && transform.len() == 6
        && transform.iter().all(|v| v.is_finite())
    {
        let m: Matrix = [
            transform[0],
            transform[1],
            transform[2],
            transform[3],
            transform[4],
            transform[5],
        ];
        let determinant = m[0] * m[3] - m[1] * m[2];
        return (determinant.abs() > 1e-9).then_some(m);
    }

    let finite = |v: Option<f64>| v.filter(|v| v.is_finite());
    let width = match finite(element.width) {
        Some(w) if w <= 0.0 => return None,
        Some(w) => w,
        None => fallback_extent(element.left, element.right, element.native_width).max(1.0),
    };
    let height = match finite(element.height) {
        Some(h) if h <= 0.0 => return None,
        Some(h) => h,
        None => fallback_extent(element.bottom, element.top, element.native_height).max(1.0),
    };
    let left = finite(element.left)
        .or(finite(element.x))
        .or(finite(element.right).map(|r| r - width))
        .unwrap_or(0.0);
    let bottom = finite(element.bottom)
        .or(finite(element.y))
        .or(finite(element.top).map(|t| t - height))
        .unwrap_or(0.0);
    Some([width, 0.0, 0.0, height, left, bottom])
}

fn fallback_extent(low: Option<f64>, high: Option<f64>, native: Option<u32>) -> f64 {
    match (low, high, native) {
        (Some(low), Some(high), _) => (high - low).max(0.0),
        (_, _, Some(native)) => f64::from(native),
        _ => 1.0,
    }
}

/// `q <matrix> cm /<name> Do Q`.
pub fn draw_operations(resource_name: &str, matrix: &Matrix) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("cm", matrix.iter().map(|v| real(*v)).collect()),
        Operation::new("Do", vec![name(resource_name)]),
        Operation::new("Q", vec![]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_stream(pixels: Vec<u8>, width: i64, height: i64) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            pixels,
        )
    }

    fn decoded(element: &PdfJsonImageElement) -> DynamicImage {
        let bytes = payload::decode_opt(element.image_data.as_deref()).expect("payload");
        image::load_from_memory(&bytes).expect("decodable payload")
    }

    #[test]
    fn unit_square_bounds_follow_rotation() {
        let rotated = [0.0, 50.0, -20.0, 0.0, 100.0, 200.0];
        let bounds = Bounds::of_unit_square(&rotated);
        assert_eq!(bounds.left, 80.0);
        assert_eq!(bounds.right, 100.0);
        assert_eq!(bounds.bottom, 200.0);
        assert_eq!(bounds.top, 250.0);
    }

    #[test]
    fn degenerate_transforms_have_zero_extent_and_are_not_placed() {
        let flat = [0.0, 0.0, 0.0, 0.0, 10.0, 10.0];
        let bounds = Bounds::of_unit_square(&flat);
        assert_eq!((bounds.width(), bounds.height()), (0.0, 0.0));

        let element = PdfJsonImageElement {
            transform: Some(flat.to_vec()),
            width: Some(0.0),
            height: Some(0.0),
            ..Default::default()
        };
        assert!(placement(&element).is_none());
    }

    #[test]
    fn collector_dedups_xobjects_but_not_stencils() {
        let doc = Document::with_version("1.7");
        let image = gray_stream(vec![0, 128, 255, 64], 2, 2);
        let mut collector = ImageCollector::new(&doc, RasterFormat::Png);
        let key = NodeKey::Object((7, 0));
        for ctm in [[10.0, 0.0, 0.0, 20.0, 5.0, 5.0], [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]] {
            collector.image(&ImageEvent {
                name: Some("Im0".into()),
                key: Some(key),
                object_id: Some((7, 0)),
                stream: &image,
                ctm,
                resources: None,
            });
        }
        assert_eq!(collector.encodings(), 1);

        let mask = Stream::new(
            dictionary! { "Width" => 8, "Height" => 1, "ImageMask" => true },
            vec![0b1111_0000],
        );
        for _ in 0..2 {
            collector.image(&ImageEvent {
                name: Some("Mask".into()),
                key: Some(NodeKey::Object((8, 0))),
                object_id: Some((8, 0)),
                stream: &mask,
                ctm: [8.0, 0.0, 0.0, 1.0, 0.0, 0.0],
                resources: None,
            });
        }
        assert_eq!(collector.encodings(), 3);

        let elements = collector.take_page();
        assert_eq!(elements.len(), 4);
        assert_eq!(elements[0].z_order, Some(IMAGE_Z_BASE));
        assert_eq!(elements[1].z_order, Some(IMAGE_Z_BASE + 1));
        assert_eq!(elements[0].width, Some(10.0));
        assert_eq!(elements[0].top, Some(25.0));
        assert_eq!(elements[0].image_format.as_deref(), Some("png"));
        assert_eq!(elements[0].image_data, elements[1].image_data);
        assert_ne!(elements[0].id, elements[1].id);

        let stencil = decoded(&elements[2]).to_rgba8();
        assert_eq!(stencil.get_pixel(0, 0).0[3], 0);
        assert_eq!(stencil.get_pixel(7, 0).0[3], 255);
        assert!(collector.take_page().is_empty());
    }

    #[test]
    fn gray_samples_survive_png_encoding() {
        let doc = Document::with_version("1.7");
        let stream = gray_stream(vec![0, 128, 255, 64], 2, 2);
        let encoded = encode_image(&doc, &stream, None, RasterFormat::Png).expect("encoded");
        let bytes = payload::decode(&encoded.data).expect("base64");
        let image = image::load_from_memory(&bytes).expect("png").to_luma8();
        assert_eq!(image.into_raw(), vec![0, 128, 255, 64]);
    }

    #[test]
    fn indexed_and_cmyk_samples_expand_to_rgb() {
        let doc = Document::with_version("1.7");
        let indexed = Stream::new(
            dictionary! {
                "Width" => 2,
                "Height" => 1,
                "BitsPerComponent" => 4,
                "ColorSpace" => vec![
                    "Indexed".into(),
                    "DeviceRGB".into(),
                    1.into(),
                    Object::string_literal(vec![255, 0, 0, 0, 0, 255]),
                ],
            },
            vec![0x01],
        );
        let rgb = decode_raster(&doc, &indexed.dict, &indexed.content, None)
            .expect("indexed")
            .to_rgb8();
        assert_eq!(rgb.into_raw(), vec![255, 0, 0, 0, 0, 255]);

        let cmyk = Stream::new(
            dictionary! {
                "Width" => 1,
                "Height" => 1,
                "BitsPerComponent" => 8,
                "ColorSpace" => "DeviceCMYK",
            },
            vec![0, 255, 255, 0],
        );
        let rgb = decode_raster(&doc, &cmyk.dict, &cmyk.content, None)
            .expect("cmyk")
            .to_rgb8();
        assert_eq!(rgb.into_raw(), vec![255, 0, 0]);
    }

    #[test]
    fn jpeg_payloads_pass_through_both_ways() {
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, image::Rgb([200, 10, 10])))
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .expect("jpeg");
        let doc = Document::with_version("1.7");
        let stream = Stream::new(
            dictionary! { "Width" => 4, "Height" => 3, "Filter" => "DCTDecode" },
            jpeg.clone(),
        );
        let encoded = encode_image(&doc, &stream, None, RasterFormat::Png).expect("encoded");
        assert_eq!(encoded.format, "jpeg");
        assert_eq!(payload::decode(&encoded.data).expect("base64"), jpeg);

        let mut target = Document::with_version("1.7");
        let element = PdfJsonImageElement {
            image_data: Some(encoded.data),
            image_format: Some(encoded.format),
            ..Default::default()
        };
        let id = image_xobject(&mut target, &element).expect("xobject");
        let Ok(Object::Stream(rebuilt)) = target.get_object(id) else {
            panic!("image stream expected");
        };
        assert_eq!(rebuilt.content, jpeg);
        assert!(matches!(rebuilt.dict.get(b"Width"), Ok(Object::Integer(4))));
    }

    #[test]
    fn transparent_png_gets_a_soft_mask() {
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 255, 100])))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .expect("png");
        let mut doc = Document::with_version("1.7");
        let element = PdfJsonImageElement {
            image_data: Some(payload::encode(&png)),
            image_format: Some("png".into()),
            ..Default::default()
        };
        let id = image_xobject(&mut doc, &element).expect("xobject");
        let Ok(Object::Stream(image)) = doc.get_object(id) else {
            panic!("image stream expected");
        };
        let Ok(Object::Reference(mask_id)) = image.dict.get(b"SMask") else {
            panic!("soft mask reference expected");
        };
        assert!(matches!(
            image.dict.get(b"ColorSpace"),
            Ok(Object::Name(n)) if n == b"DeviceRGB"
        ));
        let Ok(Object::Stream(mask)) = doc.get_object(*mask_id) else {
            panic!("soft mask stream expected");
        };
        assert!(matches!(
            mask.dict.get(b"ColorSpace"),
            Ok(Object::Name(n)) if n == b"DeviceGray"
        ));
    }

    #[test]
    fn placement_falls_back_to_box_edges_and_native_size() {
        let boxed = PdfJsonImageElement {
            left: Some(10.0),
            right: Some(60.0),
            top: Some(100.0),
            bottom: Some(40.0),
            ..Default::default()
        };
        assert_eq!(placement(&boxed), Some([50.0, 0.0, 0.0, 60.0, 10.0, 40.0]));

        let native = PdfJsonImageElement {
            native_width: Some(32),
            native_height: Some(16),
            right: Some(100.0),
            ..Default::default()
        };
        assert_eq!(placement(&native), Some([32.0, 0.0, 0.0, 16.0, 68.0, 0.0]));
    }
}
