// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Drawing text and image elements as fresh content-stream operations.
//
// Elements are drawn in z-order. Text state is written only when it
// changes, and a text object stays open across consecutive text elements.

use std::collections::{BTreeMap, HashMap};

use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use satzwerk_core::model::{PdfJsonImageElement, PdfJsonTextColor, PdfJsonTextElement};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::content::rewrite::Preflight;
use crate::engine::{Matrix, multiply};
use crate::fonts::LoadedFont;
use crate::fonts::fallback::{FALLBACK_FONT_ID, map_unsupported_glyph, resolve_fallback_font_id};
use crate::images::{draw_operations, image_xobject, placement};
use crate::pdf::objects::{name, real};

const DEFAULT_FONT_SIZE: f64 = 12.0;

/// Drawn below every element without an explicit z-order.
const UNORDERED_IMAGE_Z: i32 = i32::MIN / 2;
const UNORDERED_TEXT_Z: i32 = 1_000_000;

// -- Resources ----------------------------------------------------------------

/// Font and XObject names of one page under construction.
#[derive(Debug, Default)]
pub struct PageResources {
    fonts: BTreeMap<String, ObjectId>,
    /// Resource name per font id or fallback id.
    font_names: HashMap<String, String>,
    xobjects: Dictionary,
    /// Resource name per image payload digest.
    image_names: HashMap<String, String>,
    counter: usize,
}

impl PageResources {
    /// Start from the XObjects kept from the page's resource snapshot.
    pub fn new(xobjects: Dictionary) -> Self {
        Self {
            xobjects,
            ..Default::default()
        }
    }

    /// Resource name for the font known as `key`, registering it on first use.
    pub fn font_name(&mut self, key: &str, object_id: ObjectId) -> String {
        if let Some(existing) = self.font_names.get(key) {
            return existing.clone();
        }
        let base = resource_name(key);
        let mut candidate = base.clone();
        let mut suffix = 1;
        while let Some(bound) = self.fonts.get(&candidate) {
            if *bound == object_id {
                break;
            }
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        self.fonts.insert(candidate.clone(), object_id);
        self.font_names.insert(key.to_string(), candidate.clone());
        candidate
    }

    pub fn has_xobject(&self, resource: &str) -> bool {
        self.xobjects.has(resource.as_bytes())
    }

    /// XObject name drawing `element`, creating the XObject on first use.
    /// Identical payloads share one XObject.
    pub fn bind_image(
        &mut self,
        doc: &mut Document,
        element: &PdfJsonImageElement,
    ) -> Option<String> {
        let digest = payload_digest(element)?;
        if let Some(existing) = self.image_names.get(&digest) {
            return Some(existing.clone());
        }
        let preferred = element
            .object_name
            .as_deref()
            .filter(|_| !element.inline_image)
            .map(resource_name)
            .filter(|candidate| !self.has_xobject(candidate));
        let resource = match preferred {
            Some(resource) => resource,
            None => self.fresh_image_name(),
        };
        let id = image_xobject(doc, element)?;
        self.xobjects.set(resource.clone(), Object::Reference(id));
        self.image_names.insert(digest, resource.clone());
        Some(resource)
    }

    /// Point an existing XObject name at `element`'s payload.
    pub fn rebind(
        &mut self,
        doc: &mut Document,
        resource: &str,
        element: &PdfJsonImageElement,
    ) -> bool {
        let Some(id) = image_xobject(doc, element) else {
            return false;
        };
        self.xobjects.set(resource, Object::Reference(id));
        if let Some(digest) = payload_digest(element) {
            self.image_names.insert(digest, resource.to_string());
        }
        true
    }

    pub fn font_dict(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        for (resource, id) in &self.fonts {
            dict.set(resource.as_str(), Object::Reference(*id));
        }
        dict
    }

    pub fn xobject_dict(&self) -> Dictionary {
        self.xobjects.clone()
    }

    fn fresh_image_name(&mut self) -> String {
        loop {
            let candidate = format!("Img{}", self.counter);
            self.counter += 1;
            if !self.has_xobject(&candidate) {
                return candidate;
            }
        }
    }
}

fn payload_digest(element: &PdfJsonImageElement) -> Option<String> {
    let data = element.image_data.as_deref()?;
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hasher.update(element.image_format.as_deref().unwrap_or_default().as_bytes());
    Some(hex::encode(hasher.finalize()))
}

/// A valid PDF name built from an arbitrary id.
fn resource_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && !"/()<>[]{}%#".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() { "R".into() } else { cleaned }
}

// -- Composition --------------------------------------------------------------

enum Drawable<'e> {
    Image(&'e PdfJsonImageElement),
    Text(&'e PdfJsonTextElement),
}

/// Operations drawing `texts` and `images` in z-order.
pub fn compose(
    doc: &mut Document,
    names: &mut PageResources,
    preflight: &Preflight,
    texts: &[&PdfJsonTextElement],
    images: &[&PdfJsonImageElement],
) -> Vec<Operation> {
    let mut drawables: Vec<(i32, Drawable<'_>)> = Vec::with_capacity(texts.len() + images.len());
    for (index, image) in images.iter().enumerate() {
        let z = image.z_order.unwrap_or(UNORDERED_IMAGE_Z.saturating_add(index as i32));
        drawables.push((z, Drawable::Image(image)));
    }
    for (index, text) in texts.iter().enumerate() {
        let z = text.z_order.unwrap_or(UNORDERED_TEXT_Z.saturating_add(index as i32));
        drawables.push((z, Drawable::Text(text)));
    }
    drawables.sort_by_key(|(z, _)| *z);

    let mut writer = TextWriter::default();
    for (_, drawable) in drawables {
        match drawable {
            Drawable::Text(element) => writer.text(element, names, preflight),
            Drawable::Image(element) => {
                writer.end_text();
                let Some(matrix) = placement(element) else {
                    debug!(id = ?element.id, "image without drawable area skipped");
                    continue;
                };
                match names.bind_image(doc, element) {
                    Some(resource) => writer.ops.extend(draw_operations(&resource, &matrix)),
                    None => debug!(id = ?element.id, "image payload missing, skipped"),
                }
            }
        }
    }
    writer.finish()
}

/// Colour operator and operands last written for fill or stroke.
type ColorState = (&'static str, Vec<f64>);

struct TextWriter {
    ops: Vec<Operation>,
    in_text: bool,
    font: Option<(String, f64)>,
    character_spacing: f64,
    word_spacing: f64,
    horizontal_scaling: f64,
    leading: f64,
    rise: f64,
    rendering_mode: i64,
    fill: ColorState,
    stroke: ColorState,
}

impl Default for TextWriter {
    fn default() -> Self {
        Self {
            ops: Vec::new(),
            in_text: false,
            font: None,
            character_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 100.0,
            leading: 0.0,
            rise: 0.0,
            rendering_mode: 0,
            fill: ("g", vec![0.0]),
            stroke: ("G", vec![0.0]),
        }
    }
}

impl TextWriter {
    fn finish(mut self) -> Vec<Operation> {
        self.end_text();
        self.ops
    }

    fn begin_text(&mut self) {
        if !self.in_text {
            self.ops.push(Operation::new("BT", vec![]));
            self.in_text = true;
        }
    }

    fn end_text(&mut self) {
        if self.in_text {
            self.ops.push(Operation::new("ET", vec![]));
            self.in_text = false;
        }
    }

    fn text(
        &mut self,
        element: &PdfJsonTextElement,
        names: &mut PageResources,
        preflight: &Preflight,
    ) {
        let runs = font_runs(element, preflight);
        if runs.is_empty() {
            return;
        }
        let size = font_size(element);
        let scaling = element.horizontal_scaling.filter(|s| s.is_finite()).unwrap_or(100.0);
        let rise = element.rise.unwrap_or(0.0);

        self.begin_text();
        self.color(element.fill_color.as_ref(), false);
        self.color(element.stroke_color.as_ref(), true);
        let ops = &mut self.ops;
        set_if_changed(ops, &mut self.character_spacing, element.character_spacing, "Tc");
        set_if_changed(ops, &mut self.word_spacing, element.word_spacing, "Tw");
        set_if_changed(ops, &mut self.horizontal_scaling, Some(scaling), "Tz");
        set_if_changed(ops, &mut self.leading, element.leading, "TL");
        set_if_changed(ops, &mut self.rise, Some(rise), "Ts");
        let mode = element.rendering_mode.unwrap_or(0);
        if mode != self.rendering_mode {
            self.ops.push(Operation::new("Tr", vec![Object::Integer(mode)]));
            self.rendering_mode = mode;
        }

        let tm = text_matrix(element, size, scaling, rise);
        self.ops.push(Operation::new("Tm", tm.iter().map(|v| real(*v)).collect()));

        for (key, font, text) in runs {
            let Some(bytes) = font.codec.encode(&text) else {
                continue;
            };
            let resource = names.font_name(key, font.object_id);
            let wanted = (resource, size);
            if self.font.as_ref() != Some(&wanted) {
                self.ops.push(Operation::new("Tf", vec![name(&wanted.0), real(size)]));
                self.font = Some(wanted);
            }
            let format = if font.codec.is_single_byte() {
                StringFormat::Literal
            } else {
                StringFormat::Hexadecimal
            };
            self.ops.push(Operation::new("Tj", vec![Object::String(bytes, format)]));
        }
    }

    fn color(&mut self, color: Option<&PdfJsonTextColor>, stroke: bool) {
        let (operator, components) = color_operation(color);
        let operator = if stroke { stroking(operator) } else { operator };
        let wanted: ColorState = (operator, components);
        let current = if stroke { &mut self.stroke } else { &mut self.fill };
        if *current != wanted {
            self.ops.push(Operation::new(
                wanted.0,
                wanted.1.iter().map(|v| real(*v)).collect(),
            ));
            *current = wanted;
        }
    }
}

/// Absent values mean the PDF default of zero.
fn set_if_changed(
    ops: &mut Vec<Operation>,
    current: &mut f64,
    wanted: Option<f64>,
    operator: &str,
) {
    let wanted = wanted.unwrap_or(0.0);
    if wanted.is_finite() && (*current - wanted).abs() > f64::EPSILON {
        ops.push(Operation::new(operator, vec![real(wanted)]));
        *current = wanted;
    }
}

/// Non-stroking operator and components; black grey when absent.
fn color_operation(color: Option<&PdfJsonTextColor>) -> (&'static str, Vec<f64>) {
    let Some(color) = color else {
        return ("g", vec![0.0]);
    };
    let components = color.components.clone();
    let by_space = match color.color_space.as_deref() {
        Some("DeviceGray" | "CalGray") if components.len() == 1 => Some("g"),
        Some("DeviceRGB" | "CalRGB") if components.len() == 3 => Some("rg"),
        Some("DeviceCMYK") if components.len() == 4 => Some("k"),
        _ => None,
    };
    let by_count = match components.len() {
        1 => Some("g"),
        3 => Some("rg"),
        4 => Some("k"),
        _ => None,
    };
    match by_space.or(by_count) {
        Some(operator) => (operator, components),
        None => ("g", vec![0.0]),
    }
}

fn stroking(operator: &'static str) -> &'static str {
    match operator {
        "rg" => "RG",
        "k" => "K",
        _ => "G",
    }
}

fn font_size(element: &PdfJsonTextElement) -> f64 {
    let usable = |v: Option<f64>| v.filter(|v| v.is_finite() && *v != 0.0);
    usable(element.font_size)
        .or(usable(element.font_matrix_size))
        .unwrap_or(DEFAULT_FONT_SIZE)
}

/// Text matrix reproducing the stored rendering matrix under an identity CTM.
fn text_matrix(element: &PdfJsonTextElement, size: f64, scaling: f64, rise: f64) -> Matrix {
    let position = [
        1.0,
        0.0,
        0.0,
        1.0,
        element.x.unwrap_or(0.0),
        element.y.unwrap_or(0.0),
    ];
    let Some(trm) = element.text_matrix.as_deref().filter(|m| m.len() == 6) else {
        return position;
    };
    let th = if scaling == 0.0 { 1.0 } else { scaling / 100.0 };
    let inverse_params = [1.0 / (size * th), 0.0, 0.0, 1.0 / size, 0.0, -rise / size];
    let trm: Matrix = [trm[0], trm[1], trm[2], trm[3], trm[4], trm[5]];
    let tm = multiply(&inverse_params, &trm);
    if tm.iter().all(|v| v.is_finite()) { tm } else { position }
}

/// Split an element's text into runs drawable with one font each.
///
/// Each character tries the element's font, then the fallback for its
/// script, then an ASCII stand-in, then `?` in the default fallback.
fn font_runs<'p>(
    element: &PdfJsonTextElement,
    preflight: &'p Preflight,
) -> Vec<(&'p str, &'p LoadedFont, String)> {
    let font_id = element.font_id.as_deref().unwrap_or_default();
    let primary = preflight
        .fonts
        .get_key_value(font_id)
        .and_then(|(key, font)| Some((key.as_str(), font.as_ref()?)));
    let fallback = move |id: &str| -> Option<(&'p str, &'p LoadedFont)> {
        preflight
            .fallbacks
            .get_key_value(id)
            .map(|(key, font)| (key.as_str(), font))
    };
    let encodes = |candidate: Option<(&'p str, &'p LoadedFont)>, c: char| {
        candidate.filter(|(_, font)| font.codec.can_encode_char(c))
    };

    let mut runs: Vec<(&'p str, &'p LoadedFont, String)> = Vec::new();
    for c in element.text.chars() {
        let routed = fallback(resolve_fallback_font_id(u32::from(c)));
        let choice = encodes(primary, c)
            .map(|font| (font, c))
            .or_else(|| encodes(routed, c).map(|font| (font, c)))
            .or_else(|| {
                let stand_in = map_unsupported_glyph(c)?;
                encodes(primary, stand_in)
                    .or_else(|| encodes(routed, stand_in))
                    .map(|font| (font, stand_in))
            })
            .or_else(|| encodes(fallback(FALLBACK_FONT_ID), '?').map(|font| (font, '?')));
        let Some(((key, font), drawn)) = choice else {
            debug!(character = %c, "no font can draw character, dropped");
            continue;
        };
        match runs.last_mut() {
            Some((last, _, text)) if *last == key => text.push(drawn),
            _ => runs.push((key, font, drawn.to_string())),
        }
    }
    runs
}
