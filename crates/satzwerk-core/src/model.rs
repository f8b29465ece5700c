// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The JSON document model exchanged with callers.
//
// Every struct serializes with camelCase keys and omits absent optional
// values. Deserialization is tolerant: missing collections default to empty.

use serde::{Deserialize, Serialize};

use crate::cos::{CosStream, CosValue};

/// Font id prefix used for page-independent (fallback) fonts.
pub const DOCUMENT_SCOPE_PAGE: i32 = -1;

/// Build the catalogue key `pageNumber:id`.
pub fn font_uid(page_number: i32, id: &str) -> String {
    format!("{}:{}", page_number, id)
}

/// Root of the document model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfJsonDocument {
    pub metadata: PdfJsonMetadata,
    /// Base64 of the catalog XMP metadata stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmp_metadata: Option<String>,
    pub fonts: Vec<PdfJsonFont>,
    pub pages: Vec<PdfJsonPage>,
    pub form_fields: Vec<PdfJsonFormField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lazy_images: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfJsonMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    /// RFC 3339 instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trapped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_pages: Option<u32>,
}

/// Registry/ordering/supplement triple of a CID-keyed font.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfJsonCidSystemInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplement: Option<i64>,
}

/// One catalogue entry, unique per `(pageNumber, id)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfJsonFont {
    /// Resource name, prefixed with the form XObject path for nested fonts.
    pub id: String,
    pub page_number: i32,
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid_system_info: Option<PdfJsonCidSystemInfo>,
    pub embedded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_program_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_program_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_unicode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard14_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_descriptor_flags: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ascent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units_per_em: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cos_dictionary: Option<CosValue>,
}

impl PdfJsonFont {
    /// Whether any program payload (original or converted) is present.
    pub fn has_program(&self) -> bool {
        [&self.program, &self.web_program, &self.pdf_program]
            .iter()
            .any(|p| p.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfJsonPage {
    pub page_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<i64>,
    pub text_elements: Vec<PdfJsonTextElement>,
    pub image_elements: Vec<PdfJsonImageElement>,
    pub annotations: Vec<PdfJsonAnnotation>,
    /// Resource dictionary without raster images and top-level fonts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<CosValue>,
    pub content_streams: Vec<CosStream>,
}

/// Colour as a space name plus components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfJsonTextColor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_space: Option<String>,
    pub components: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfJsonTextElement {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_matrix_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Text rendering matrix `[a b c d e f]` of the first glyph.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_matrix: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_spacing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_spacing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal_scaling: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rise: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendering_mode: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<PdfJsonTextColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<PdfJsonTextColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_used: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfJsonImageElement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// XObject resource name, prefixed with the form path when nested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    pub inline_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfJsonAnnotation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rect: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appearance_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<CosValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfJsonFormField {
    /// Fully qualified name, parts joined with `.`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_field_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rect: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<CosValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfJsonPageDimension {
    pub page_number: u32,
    pub width: f64,
    pub height: f64,
    pub rotation: i64,
}

/// Metadata-only response of lazy mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfJsonDocumentMetadata {
    pub metadata: PdfJsonMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmp_metadata: Option<String>,
    pub fonts: Vec<PdfJsonFont>,
    pub page_dimensions: Vec<PdfJsonPageDimension>,
    pub form_fields: Vec<PdfJsonFormField>,
    pub lazy_images: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_joins_page_and_id() {
        assert_eq!(font_uid(3, "F1"), "3:F1");
        assert_eq!(
            font_uid(DOCUMENT_SCOPE_PAGE, "fallback-noto-sans"),
            "-1:fallback-noto-sans"
        );
    }

    #[test]
    fn text_element_omits_absent_fields() {
        let element = PdfJsonTextElement {
            text: "Hi".into(),
            font_id: Some("F1".into()),
            font_size: Some(12.0),
            ..Default::default()
        };
        let json = serde_json::to_string(&element).expect("serialize");
        assert_eq!(json, r#"{"text":"Hi","fontId":"F1","fontSize":12.0}"#);
    }

    #[test]
    fn sparse_page_json_parses_with_defaults() {
        let page: PdfJsonPage =
            serde_json::from_str(r#"{"pageNumber":2,"textElements":[{"text":"x"}]}"#)
                .expect("parse page");
        assert_eq!(page.page_number, 2);
        assert_eq!(page.text_elements.len(), 1);
        assert!(page.image_elements.is_empty());
        assert!(page.content_streams.is_empty());
    }

    #[test]
    fn font_program_presence() {
        let mut font = PdfJsonFont::default();
        assert!(!font.has_program());
        font.web_program = Some("AAEAAA==".into());
        assert!(font.has_program());
    }
}
