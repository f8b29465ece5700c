// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the satzwerk-codec crate: full extraction,
// full reconstruction, and single-page extraction of a synthetic
// 20-page document.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, StringFormat, dictionary};
use tracing_subscriber::EnvFilter;

use satzwerk_codec::{NoProgress, PdfJsonCodec};
use satzwerk_core::CodecConfig;

const PAGES: u32 = 20;

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// A document of letter-size pages, each with a filled square and a dozen
/// lines of Helvetica text.
fn synthetic_pdf(page_count: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids = Vec::new();
    for number in 1..=page_count {
        let mut operations = vec![
            Operation::new("rg", vec![0.2.into(), 0.4.into(), 0.8.into()]),
            Operation::new("re", vec![50.into(), 50.into(), 100.into(), 100.into()]),
            Operation::new("f", vec![]),
        ];
        for line in 0..12 {
            let text = format!("Page {} line {} of the benchmark document", number, line);
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 11.into()]),
                Operation::new("Td", vec![72.into(), (720 - line * 14).into()]),
                Operation::new(
                    "Tj",
                    vec![Object::String(text.into_bytes(), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ]);
        }
        let content = Content { operations }
            .encode()
            .expect("encode benchmark content");
        let contents = doc.add_object(Stream::new(dictionary! {}, content));
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font) },
            },
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
    doc.trailer.set("Root", Object::Reference(catalog));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save benchmark document");
    bytes
}

fn init_tracing() {
    // RUST_LOG=satzwerk_codec=debug shows per-page decisions.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_extraction(c: &mut Criterion) {
    init_tracing();
    let codec = PdfJsonCodec::new(CodecConfig::default());
    let pdf = synthetic_pdf(PAGES);

    c.bench_function("pdf_to_json (20 pages)", |b| {
        b.iter(|| {
            let json = codec
                .pdf_to_json(black_box(&pdf), false, &NoProgress)
                .expect("extract");
            black_box(json);
        });
    });
}

/// Reconstruction of unchanged pages (patch path) and of pages whose
/// preserved streams were dropped (full regeneration).
fn bench_reconstruction(c: &mut Criterion) {
    init_tracing();
    let codec = PdfJsonCodec::new(CodecConfig::default());
    let document = codec
        .pdf_to_document(&synthetic_pdf(PAGES), false, &NoProgress)
        .expect("extract");
    let mut regenerated = document.clone();
    for page in &mut regenerated.pages {
        page.content_streams.clear();
    }

    c.bench_function("document_to_pdf patched (20 pages)", |b| {
        b.iter(|| black_box(codec.document_to_pdf(black_box(&document)).expect("rebuild")));
    });
    c.bench_function("document_to_pdf regenerated (20 pages)", |b| {
        b.iter(|| black_box(codec.document_to_pdf(black_box(&regenerated)).expect("rebuild")));
    });
}

fn bench_single_page(c: &mut Criterion) {
    init_tracing();
    let codec = PdfJsonCodec::new(CodecConfig::default());
    codec
        .extract_document_metadata("bench", &synthetic_pdf(PAGES), &NoProgress)
        .expect("metadata");

    c.bench_function("extract_single_page (page 10 of 20)", |b| {
        b.iter(|| black_box(codec.extract_single_page("bench", black_box(10)).expect("page")));
    });
}

criterion_group!(benches, bench_extraction, bench_reconstruction, bench_single_page);
criterion_main!(benches);
