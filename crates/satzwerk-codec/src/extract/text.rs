// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text runs: glyph events merged into text elements.

use satzwerk_core::model::{PdfJsonTextColor, PdfJsonTextElement};

use crate::engine::{Color, GlyphEvent, Matrix, PageVisitor};

/// First z-order assigned to extracted text; text sits above images.
pub const TEXT_Z_BASE: i32 = 1_000_000;

const ORIENTATION_TOLERANCE: f64 = 0.0005;
const BASELINE_TOLERANCE: f64 = 0.5;
const CONTINUITY_TOLERANCE: f64 = 0.5;

/// State a glyph must share with a run to join it.
#[derive(Debug, Clone, PartialEq)]
struct RunStyle {
    font_id: Option<String>,
    font_size: f64,
    character_spacing: f64,
    word_spacing: f64,
    horizontal_scaling: f64,
    leading: f64,
    rise: f64,
    rendering_mode: i64,
    fill: Color,
    stroke: Color,
}

impl RunStyle {
    fn of(glyph: &GlyphEvent<'_>) -> Self {
        let state = glyph.state;
        Self {
            font_id: state.font_id.clone(),
            font_size: state.font_size,
            character_spacing: state.character_spacing,
            word_spacing: state.word_spacing,
            horizontal_scaling: state.horizontal_scaling,
            leading: state.leading,
            rise: state.rise,
            rendering_mode: state.rendering_mode,
            fill: glyph.fill.clone(),
            stroke: glyph.stroke.clone(),
        }
    }
}

#[derive(Debug)]
struct Run {
    text: String,
    style: RunStyle,
    trm: Matrix,
    end: (f64, f64),
    space_width: f64,
}

impl Run {
    fn start(glyph: &GlyphEvent<'_>) -> Self {
        Self {
            text: glyph.text.clone(),
            style: RunStyle::of(glyph),
            trm: glyph.trm,
            end: glyph.end,
            space_width: glyph.space_width,
        }
    }

    fn accepts(&self, glyph: &GlyphEvent<'_>) -> bool {
        let same_orientation = (0..4)
            .all(|i| (self.trm[i] - glyph.trm[i]).abs() <= ORIENTATION_TOLERANCE);
        if !same_orientation || self.style != RunStyle::of(glyph) {
            return false;
        }
        let origin = (glyph.trm[4], glyph.trm[5]);
        let (dx, dy) = direction(&self.trm);
        let offset = (origin.0 - self.trm[4], origin.1 - self.trm[5]);
        let off_baseline = (dx * offset.1 - dy * offset.0).abs();
        let gap = (origin.0 - self.end.0).hypot(origin.1 - self.end.1);
        off_baseline <= BASELINE_TOLERANCE && gap <= CONTINUITY_TOLERANCE
    }

    fn into_element(self, z_order: i32) -> PdfJsonTextElement {
        let trm = self.trm;
        let (dx, dy) = direction(&trm);
        let width = ((self.end.0 - trm[4]) * dx + (self.end.1 - trm[5]) * dy).max(0.0);
        let matrix_size = trm[0].hypot(trm[2]).max(trm[1].hypot(trm[3]));
        let style = self.style;

        let mut element = PdfJsonTextElement {
            text: self.text,
            font_id: style.font_id,
            font_size: Some(style.font_size),
            font_matrix_size: Some(matrix_size),
            x: Some(trm[4]),
            y: Some(trm[5]),
            width: Some(width),
            height: Some(matrix_size),
            text_matrix: trm.iter().all(|v| v.is_finite()).then(|| trm.to_vec()),
            space_width: Some(self.space_width),
            character_spacing: Some(style.character_spacing),
            word_spacing: Some(style.word_spacing),
            horizontal_scaling: Some(style.horizontal_scaling),
            leading: Some(style.leading),
            rise: Some(style.rise),
            rendering_mode: Some(style.rendering_mode),
            fill_color: Some(text_color(&style.fill)),
            stroke_color: Some(text_color(&style.stroke)),
            z_order: Some(z_order),
            fallback_used: None,
        };
        compact(&mut element, &style.fill, &style.stroke);
        element
    }
}

/// Unit vector of the baseline direction.
fn direction(trm: &Matrix) -> (f64, f64) {
    let length = trm[0].hypot(trm[1]);
    if length > f64::EPSILON {
        (trm[0] / length, trm[1] / length)
    } else {
        (1.0, 0.0)
    }
}

fn text_color(color: &Color) -> PdfJsonTextColor {
    PdfJsonTextColor {
        color_space: Some(color.space.clone()),
        components: color.components.clone(),
    }
}

/// Drop values that carry no information: position when a matrix exists,
/// neutral spacing and scaling, fill mode, default black colours.
fn compact(element: &mut PdfJsonTextElement, fill: &Color, stroke: &Color) {
    if element.text_matrix.is_some() {
        element.x = None;
        element.y = None;
    }
    for value in [
        &mut element.character_spacing,
        &mut element.word_spacing,
        &mut element.leading,
        &mut element.rise,
    ] {
        if *value == Some(0.0) {
            *value = None;
        }
    }
    if element.horizontal_scaling == Some(100.0) {
        element.horizontal_scaling = None;
    }
    if element.rendering_mode == Some(0) {
        element.rendering_mode = None;
    }
    if fill.is_default_black() {
        element.fill_color = None;
    }
    if stroke.is_default_black() {
        element.stroke_color = None;
    }
}

/// Page visitor merging consecutive glyphs into text elements.
#[derive(Debug, Default)]
pub struct TextCollector {
    elements: Vec<PdfJsonTextElement>,
    current: Option<Run>,
}

impl TextCollector {
    /// Elements of the page, in showing order.
    pub fn finish(mut self) -> Vec<PdfJsonTextElement> {
        self.flush();
        self.elements
    }

    fn flush(&mut self) {
        if let Some(run) = self.current.take() {
            let z_order = TEXT_Z_BASE + self.elements.len() as i32;
            self.elements.push(run.into_element(z_order));
        }
    }
}

impl PageVisitor for TextCollector {
    fn glyph(&mut self, glyph: &GlyphEvent<'_>) {
        if let Some(run) = self.current.as_mut()
            && run.accepts(glyph)
        {
            run.text.push_str(&glyph.text);
            run.end = glyph.end;
            return;
        }
        self.flush();
        self.current = Some(Run::start(glyph));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TextState;

    fn state(font_id: &str, size: f64) -> TextState {
        TextState {
            font_id: Some(font_id.into()),
            font_size: size,
            ..TextState::default()
        }
    }

    fn glyph<'e>(
        text: &str,
        x: f64,
        advance: f64,
        state: &'e TextState,
        fill: &'e Color,
    ) -> GlyphEvent<'e> {
        let size = state.font_size;
        GlyphEvent {
            text: text.into(),
            code: text.chars().next().map(u32::from).unwrap_or(0),
            trm: [size, 0.0, 0.0, size, x, 700.0],
            end: (x + advance, 700.0),
            space_width: 2.5,
            state,
            fill,
            stroke: fill,
        }
    }

    #[test]
    fn contiguous_glyphs_merge_into_one_compact_element() {
        let text_state = state("F1", 10.0);
        let black = Color::gray(0.0);
        let mut collector = TextCollector::default();
        collector.glyph(&glyph("H", 72.0, 7.2, &text_state, &black));
        collector.glyph(&glyph("i", 79.2, 2.8, &text_state, &black));
        let elements = collector.finish();

        assert_eq!(elements.len(), 1);
        let element = &elements[0];
        assert_eq!(element.text, "Hi");
        assert_eq!(element.font_id.as_deref(), Some("F1"));
        assert_eq!(element.text_matrix, Some(vec![10.0, 0.0, 0.0, 10.0, 72.0, 700.0]));
        assert!((element.width.unwrap_or_default() - 10.0).abs() < 1e-9);
        assert_eq!(element.height, Some(10.0));
        assert_eq!(element.z_order, Some(TEXT_Z_BASE));
        assert_eq!(element.x, None);
        assert_eq!(element.character_spacing, None);
        assert_eq!(element.horizontal_scaling, None);
        assert_eq!(element.fill_color, None);
    }

    #[test]
    fn gaps_style_changes_and_new_lines_split_runs() {
        let regular = state("F1", 10.0);
        let bold = state("F2", 10.0);
        let black = Color::gray(0.0);
        let red = Color {
            space: "DeviceRGB".into(),
            components: vec![1.0, 0.0, 0.0],
        };
        let mut collector = TextCollector::default();
        collector.glyph(&glyph("a", 0.0, 5.0, &regular, &black));
        // Gap of 20 units after the previous glyph.
        collector.glyph(&glyph("b", 25.0, 5.0, &regular, &black));
        collector.glyph(&glyph("c", 30.0, 5.0, &bold, &black));
        collector.glyph(&glyph("d", 35.0, 5.0, &bold, &red));
        let mut lower = glyph("e", 40.0, 5.0, &bold, &red);
        lower.trm[5] = 688.0;
        collector.glyph(&lower);
        let elements = collector.finish();

        let texts: Vec<&str> = elements.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["a", "b", "c", "d", "e"]);
        assert_eq!(
            elements[3].fill_color,
            Some(PdfJsonTextColor {
                color_space: Some("DeviceRGB".into()),
                components: vec![1.0, 0.0, 0.0],
            })
        );
        let z: Vec<Option<i32>> = elements.iter().map(|e| e.z_order).collect();
        assert_eq!(z[4], Some(TEXT_Z_BASE + 4));
    }

    #[test]
    fn rotated_runs_measure_along_their_baseline() {
        let text_state = state("F1", 10.0);
        let black = Color::gray(0.0);
        let event = GlyphEvent {
            text: "R".into(),
            code: 82,
            trm: [0.0, 10.0, -10.0, 0.0, 300.0, 100.0],
            end: (300.0, 106.0),
            space_width: 2.5,
            state: &text_state,
            fill: &black,
            stroke: &black,
        };
        let mut collector = TextCollector::default();
        collector.glyph(&event);
        let elements = collector.finish();
        assert!((elements[0].width.unwrap_or_default() - 6.0).abs() < 1e-9);
        assert_eq!(elements[0].font_matrix_size, Some(10.0));
    }
}
