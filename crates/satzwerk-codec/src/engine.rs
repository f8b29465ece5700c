// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream interpreter driving extraction callbacks.
//
// Tracks the graphics state (CTM, colours, text state) through the page's
// operators and reports every shown glyph and every drawn image to a
// `PageVisitor`. Form XObjects are entered recursively with their resources;
// resource names found inside a form are reported with the form path as
// prefix (`Fm0/F1`, `Fm0/Im1`).

use std::collections::HashSet;
use std::sync::Arc;

use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use satzwerk_core::error::Result;
use tracing::{debug, trace};

use crate::fonts::catalogue::{CodecCache, NodeKey};
use crate::fonts::codec::FontCodec;
use crate::pdf::objects::{
    get_dict, get_name, get_numbers, name_of, number, page_content, page_resources, resolve,
    stream_bytes,
};
use crate::pdf::streams::decode_operations;

/// Nesting limit for form XObjects.
const MAX_FORM_DEPTH: usize = 16;

/// Affine matrix `[a b c d e f]`, row-vector convention.
pub type Matrix = [f64; 6];

pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `lhs × rhs`: apply `lhs` first, then `rhs`.
pub fn multiply(lhs: &Matrix, rhs: &Matrix) -> Matrix {
    [
        lhs[0] * rhs[0] + lhs[1] * rhs[2],
        lhs[0] * rhs[1] + lhs[1] * rhs[3],
        lhs[2] * rhs[0] + lhs[3] * rhs[2],
        lhs[2] * rhs[1] + lhs[3] * rhs[3],
        lhs[4] * rhs[0] + lhs[5] * rhs[2] + rhs[4],
        lhs[4] * rhs[1] + lhs[5] * rhs[3] + rhs[5],
    ]
}

pub fn transform_point(m: &Matrix, x: f64, y: f64) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

pub fn translation(tx: f64, ty: f64) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn matrix_from(values: &[f64]) -> Option<Matrix> {
    let m: [f64; 6] = values.get(..6)?.try_into().ok()?;
    m.iter().all(|v| v.is_finite()).then_some(m)
}

fn operand_numbers(operands: &[Object]) -> Vec<f64> {
    operands.iter().filter_map(number).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Color {
    pub space: String,
    pub components: Vec<f64>,
}

impl Color {
    pub fn gray(value: f64) -> Self {
        Self {
            space: "DeviceGray".into(),
            components: vec![value],
        }
    }

    pub fn is_default_black(&self) -> bool {
        match self.space.as_str() {
            "DeviceGray" => self.components.iter().all(|c| *c == 0.0),
            "DeviceRGB" => self.components.iter().all(|c| *c == 0.0),
            "DeviceCMYK" => {
                self.components.len() == 4
                    && self.components[..3].iter().all(|c| *c == 0.0)
                    && self.components[3] == 1.0
            }
            _ => false,
        }
    }

    fn for_space(space: &str) -> Self {
        let components = match space {
            "DeviceRGB" | "CalRGB" | "Lab" => vec![0.0; 3],
            "DeviceCMYK" => vec![0.0, 0.0, 0.0, 1.0],
            _ => vec![0.0],
        };
        Self {
            space: space.to_string(),
            components,
        }
    }
}

/// Text state parameters of the PDF imaging model.
#[derive(Debug, Clone)]
pub struct TextState {
    pub font_id: Option<String>,
    pub font: Option<Arc<FontCodec>>,
    pub font_size: f64,
    pub character_spacing: f64,
    pub word_spacing: f64,
    /// Percent, 100 = unscaled.
    pub horizontal_scaling: f64,
    pub leading: f64,
    pub rise: f64,
    pub rendering_mode: i64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_id: None,
            font: None,
            font_size: 0.0,
            character_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 100.0,
            leading: 0.0,
            rise: 0.0,
            rendering_mode: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Color,
    stroke: Color,
    text: TextState,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill: Color::gray(0.0),
            stroke: Color::gray(0.0),
            text: TextState::default(),
        }
    }
}

/// One shown glyph.
#[derive(Debug, Clone)]
pub struct GlyphEvent<'e> {
    pub text: String,
    pub code: u32,
    /// Text rendering matrix at the glyph origin.
    pub trm: Matrix,
    /// Device-space baseline point after the glyph's advance.
    pub end: (f64, f64),
    /// Device-space width of the font's space glyph.
    pub space_width: f64,
    pub state: &'e TextState,
    pub fill: &'e Color,
    pub stroke: &'e Color,
}

/// One drawn raster image.
pub struct ImageEvent<'e> {
    /// Resource name with form prefix; `None` for inline images.
    pub name: Option<String>,
    /// Identity of the XObject, for deduplication.
    pub key: Option<NodeKey>,
    pub object_id: Option<ObjectId>,
    pub stream: &'e Stream,
    pub ctm: Matrix,
    pub resources: Option<&'e Dictionary>,
}

/// Callbacks invoked while a page is interpreted.
pub trait PageVisitor {
    fn glyph(&mut self, _glyph: &GlyphEvent<'_>) {}

    fn image(&mut self, _image: &ImageEvent<'_>) {}
}

pub struct ContentEngine<'a, 'c> {
    doc: &'a Document,
    codecs: &'c mut CodecCache,
}

struct Frame<'a> {
    resources: Option<&'a Dictionary>,
    prefix: String,
    depth: usize,
}

impl<'a, 'c> ContentEngine<'a, 'c> {
    pub fn new(doc: &'a Document, codecs: &'c mut CodecCache) -> Self {
        Self { doc, codecs }
    }

    /// Interpret every content stream of a page.
    pub fn run_page(&mut self, page_id: ObjectId, visitor: &mut dyn PageVisitor) -> Result<()> {
        let doc = self.doc;
        let operations = decode_operations(&page_content(doc, page_id))?;
        let frame = Frame {
            resources: page_resources(doc, page_id),
            prefix: String::new(),
            depth: 0,
        };
        let mut active_forms = HashSet::new();
        let mut state = GraphicsState::new(IDENTITY);
        self.run(&operations, &frame, &mut state, &mut active_forms, visitor);
        Ok(())
    }

    fn run(
        &mut self,
        operations: &[Operation],
        frame: &Frame<'a>,
        state: &mut GraphicsState,
        active_forms: &mut HashSet<NodeKey>,
        visitor: &mut dyn PageVisitor,
    ) {
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = IDENTITY;
        let mut tlm = IDENTITY;

        for op in operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        *state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_from(&operand_numbers(operands)) {
                        state.ctm = multiply(&m, &state.ctm);
                    }
                }

                // -- Colour --
                "g" | "G" | "rg" | "RG" | "k" | "K" => {
                    let space = match op.operator.to_ascii_lowercase().as_str() {
                        "g" => "DeviceGray",
                        "rg" => "DeviceRGB",
                        _ => "DeviceCMYK",
                    };
                    let color = Color {
                        space: space.into(),
                        components: operand_numbers(operands),
                    };
                    if op.operator.chars().all(|c| c.is_ascii_lowercase()) {
                        state.fill = color;
                    } else {
                        state.stroke = color;
                    }
                }
                "cs" | "CS" => {
                    let space = operands.first().and_then(name_of).unwrap_or_default();
                    let color = Color::for_space(&space);
                    if op.operator == "cs" {
                        state.fill = color;
                    } else {
                        state.stroke = color;
                    }
                }
                "sc" | "scn" | "SC" | "SCN" => {
                    let components = operand_numbers(operands);
                    let target = if op.operator.starts_with('s') {
                        &mut state.fill
                    } else {
                        &mut state.stroke
                    };
                    target.components = components;
                }

                // -- Text state --
                "BT" => {
                    tm = IDENTITY;
                    tlm = IDENTITY;
                }
                "ET" => {}
                "Tf" => {
                    let font_name = operands.first().and_then(name_of);
                    if let Some(size) = operands.get(1).and_then(number) {
                        state.text.font_size = size;
                    }
                    if let Some(font_name) = font_name {
                        state.text.font = self.font(frame.resources, &font_name);
                        state.text.font_id = Some(format!("{}{}", frame.prefix, font_name));
                    }
                }
                "Tc" => set_number(operands, &mut state.text.character_spacing),
                "Tw" => set_number(operands, &mut state.text.word_spacing),
                "Tz" => set_number(operands, &mut state.text.horizontal_scaling),
                "TL" => set_number(operands, &mut state.text.leading),
                "Ts" => set_number(operands, &mut state.text.rise),
                "Tr" => {
                    if let Some(mode) = operands.first().and_then(number) {
                        state.text.rendering_mode = mode as i64;
                    }
                }

                // -- Text positioning --
                "Td" | "TD" => {
                    let values = operand_numbers(operands);
                    if let [tx, ty, ..] = values[..] {
                        if op.operator == "TD" {
                            state.text.leading = -ty;
                        }
                        tlm = multiply(&translation(tx, ty), &tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix_from(&operand_numbers(operands)) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = multiply(&translation(0.0, -state.text.leading), &tlm);
                    tm = tlm;
                }

                // -- Text showing --
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes, state, &mut tm, visitor);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => {
                                    self.show(bytes, state, &mut tm, visitor)
                                }
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let tx = -adjust / 1000.0
                                            * state.text.font_size
                                            * state.text.horizontal_scaling
                                            / 100.0;
                                        tm = multiply(&translation(tx, 0.0), &tm);
                                    }
                                }
                            }
                        }
                    }
                }
                "'" | "\"" => {
                    let text_index = if op.operator == "\"" {
                        let values = operand_numbers(operands);
                        if let [aw, ac, ..] = values[..] {
                            state.text.word_spacing = aw;
                            state.text.character_spacing = ac;
                        }
                        2
                    } else {
                        0
                    };
                    tlm = multiply(&translation(0.0, -state.text.leading), &tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = operands.get(text_index) {
                        self.show(bytes, state, &mut tm, visitor);
                    }
                }

                // -- XObjects and inline images --
                "Do" => {
                    if let Some(name) = operands.first().and_then(name_of) {
                        self.draw_xobject(&name, frame, state, active_forms, visitor);
                    }
                }
                "BI" => {
                    if let Some(Object::Stream(stream)) = operands.first() {
                        visitor.image(&ImageEvent {
                            name: None,
                            key: None,
                            object_id: None,
                            stream,
                            ctm: state.ctm,
                            resources: frame.resources,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    fn font(&mut self, resources: Option<&'a Dictionary>, name: &str) -> Option<Arc<FontCodec>> {
        let doc = self.doc;
        let fonts = get_dict(doc, resources?, b"Font")?;
        let font = fonts.get(name.as_bytes()).ok()?;
        self.codecs.get(doc, font)
    }

    /// Emit one event per char code and advance the text matrix.
    fn show(
        &mut self,
        bytes: &[u8],
        state: &GraphicsState,
        tm: &mut Matrix,
        visitor: &mut dyn PageVisitor,
    ) {
        let text = &state.text;
        let Some(font) = text.font.as_ref() else {
            trace!("text shown without a font");
            return;
        };
        let scale = text.horizontal_scaling / 100.0;
        let size_matrix = [text.font_size * scale, 0.0, 0.0, text.font_size, 0.0, text.rise];
        let space_advance = font.space_width() / 1000.0 * text.font_size * scale;

        for code in font.codes(bytes) {
            let glyph_text = font.decode_code(code);
            let mut advance = font.width(code) / 1000.0 * text.font_size + text.character_spacing;
            if font.is_single_byte() && code == 32 {
                advance += text.word_spacing;
            }
            advance *= scale;

            let device = multiply(tm, &state.ctm);
            let trm = multiply(&size_matrix, &device);
            let end = transform_point(&device, advance, text.rise);
            let space_end = transform_point(&device, space_advance, text.rise);
            let origin = transform_point(&device, 0.0, text.rise);
            visitor.glyph(&GlyphEvent {
                text: glyph_text,
                code,
                trm,
                end,
                space_width: (space_end.0 - origin.0).hypot(space_end.1 - origin.1),
                state: text,
                fill: &state.fill,
                stroke: &state.stroke,
            });
            *tm = multiply(&translation(advance, 0.0), tm);
        }
    }

    fn draw_xobject(
        &mut self,
        name: &str,
        frame: &Frame<'a>,
        state: &GraphicsState,
        active_forms: &mut HashSet<NodeKey>,
        visitor: &mut dyn PageVisitor,
    ) {
        let doc = self.doc;
        let Some(xobjects) = frame.resources.and_then(|r| get_dict(doc, r, b"XObject")) else {
            return;
        };
        let Ok(reference) = xobjects.get(name.as_bytes()) else {
            return;
        };
        let Some(Object::Stream(stream)) = resolve(doc, reference) else {
            return;
        };
        let key = NodeKey::of(reference);
        let object_id = match reference {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        match get_name(doc, &stream.dict, b"Subtype").as_deref() {
            Some("Image") => visitor.image(&ImageEvent {
                name: Some(format!("{}{}", frame.prefix, name)),
                key: Some(key),
                object_id,
                stream,
                ctm: state.ctm,
                resources: frame.resources,
            }),
            Some("Form") => {
                if frame.depth >= MAX_FORM_DEPTH || !active_forms.insert(key) {
                    debug!(form = name, "form XObject skipped (cycle or depth)");
                    return;
                }
                let operations = match decode_operations(&stream_bytes(stream)) {
                    Ok(operations) => operations,
                    Err(err) => {
                        debug!(form = name, %err, "form XObject not decodable");
                        active_forms.remove(&key);
                        return;
                    }
                };
                let form_matrix = get_numbers(doc, &stream.dict, b"Matrix")
                    .and_then(|m| matrix_from(&m))
                    .unwrap_or(IDENTITY);
                let nested = Frame {
                    resources: get_dict(doc, &stream.dict, b"Resources").or(frame.resources),
                    prefix: format!("{}{}/", frame.prefix, name),
                    depth: frame.depth + 1,
                };
                let mut form_state = state.clone();
                form_state.ctm = multiply(&form_matrix, &state.ctm);
                self.run(&operations, &nested, &mut form_state, active_forms, visitor);
                active_forms.remove(&key);
            }
            _ => {}
        }
    }
}

fn set_number(operands: &[Object], target: &mut f64) {
    if let Some(value) = operands.first().and_then(number) {
        *target = value;
    }
}
