// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic documents shared by the codec tests.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, StringFormat, dictionary};

/// Text shown on a sample page, one entry per text run.
pub(crate) fn sample_runs(page_number: u32) -> [String; 3] {
    [
        format!("Page {}", page_number),
        "Hello".to_string(),
        "World".to_string(),
    ]
}

fn literal(text: &str) -> Object {
    Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
}

/// A document of `page_count` letter-size pages sharing one Helvetica font.
///
/// Every page fills a blue square, shows `Page n` and a kerned
/// `[(Hello) -250 (World)] TJ`. Page 1 also draws a 2x2 grey image `Im1`
/// at 300,400 scaled to 100x50.
pub(crate) fn sample_document(page_count: u32) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let image = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 2,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0x00, 0x40, 0x80, 0xff],
    ));

    let mut kids = Vec::new();
    for number in 1..=page_count {
        let [title, hello, world] = sample_runs(number);
        let mut operations = vec![
            Operation::new("rg", vec![0.into(), 0.into(), 1.into()]),
            Operation::new("re", vec![50.into(), 50.into(), 100.into(), 100.into()]),
            Operation::new("f", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![literal(&title)]),
            Operation::new("ET", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![literal(&hello), (-250).into(), literal(&world)])],
            ),
            Operation::new("ET", vec![]),
        ];
        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font) },
        };
        if number == 1 {
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![100.into(), 0.into(), 0.into(), 50.into(), 300.into(), 400.into()],
                ),
                Operation::new("Do", vec!["Im1".into()]),
                Operation::new("Q", vec![]),
            ]);
            resources.set("XObject", dictionary! { "Im1" => Object::Reference(image) });
        }
        let content = Content { operations }
            .encode()
            .expect("encode sample content");
        let contents = doc.add_object(Stream::new(dictionary! {}, content));
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources,
            "Contents" => Object::Reference(contents),
        });
        kids.push(Object::Reference(page));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    let info = doc.add_object(dictionary! { "Title" => literal("Sample") });
    doc.trailer.set("Root", Object::Reference(catalog));
    doc.trailer.set("Info", Object::Reference(info));
    doc
}

pub(crate) fn sample_pdf(page_count: u32) -> Vec<u8> {
    let mut doc = sample_document(page_count);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save sample document");
    bytes
}
