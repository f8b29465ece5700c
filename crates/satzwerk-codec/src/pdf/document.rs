// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Loading and saving whole documents, and assembling a fresh page tree.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use satzwerk_core::error::SatzwerkError;
use tracing::{debug, instrument};

/// Parse PDF bytes. Empty or unparseable input is fatal.
#[instrument(skip_all, fields(bytes_len = data.len()))]
pub fn load(data: &[u8]) -> Result<Document, SatzwerkError> {
    if data.is_empty() {
        return Err(SatzwerkError::InvalidInput("document bytes are empty".into()));
    }
    let document = Document::load_mem(data).map_err(|err| {
        SatzwerkError::PdfError(format!("failed to load PDF from memory: {}", err))
    })?;
    debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
    Ok(document)
}

/// Serialise a document, dropping objects nothing refers to.
pub fn save(document: &mut Document) -> Result<Vec<u8>, SatzwerkError> {
    document.prune_objects();
    let mut output = Vec::new();
    document
        .save_to(&mut output)
        .map_err(|err| SatzwerkError::PdfError(format!("failed to serialise PDF: {}", err)))?;
    debug!(output_bytes = output.len(), "PDF serialised");
    Ok(output)
}

/// Page tree of a document under construction.
///
/// Page ids are reserved up front so that object-graph snapshots can point
/// at pages before the page dictionaries themselves exist.
pub struct PageTree {
    pub pages_id: ObjectId,
    pub page_ids: BTreeMap<u32, ObjectId>,
}

impl PageTree {
    /// Reserve ids for the given 1-based page numbers.
    pub fn reserve(document: &mut Document, page_numbers: impl IntoIterator<Item = u32>) -> Self {
        let pages_id = document.new_object_id();
        let page_ids = page_numbers
            .into_iter()
            .map(|number| (number, document.new_object_id()))
            .collect();
        Self { pages_id, page_ids }
    }

    /// Install the page dictionaries, the `/Pages` node, and the catalog.
    /// Returns the catalog id.
    pub fn finish(
        &self,
        document: &mut Document,
        mut pages: BTreeMap<u32, Dictionary>,
    ) -> ObjectId {
        let mut kids = Vec::with_capacity(self.page_ids.len());
        for (number, id) in &self.page_ids {
            let mut page = pages.remove(number).unwrap_or_default();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(self.pages_id));
            document.objects.insert(*id, Object::Dictionary(page));
            kids.push(Object::Reference(*id));
        }
        let count = kids.len() as i64;
        document.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(count),
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(self.pages_id),
        });
        document.trailer.set("Root", Object::Reference(catalog_id));
        catalog_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_rejected_as_invalid() {
        let err = load(&[]).expect_err("empty input must fail");
        assert!(err.is_caller_error());
    }

    #[test]
    fn garbage_input_is_a_pdf_error() {
        let err = load(b"not a pdf").expect_err("garbage must fail");
        assert!(matches!(err, SatzwerkError::PdfError(_)));
    }

    #[test]
    fn reserved_tree_saves_and_reloads() {
        let mut document = Document::with_version("1.7");
        let tree = PageTree::reserve(&mut document, [1, 2]);
        let mut pages = BTreeMap::new();
        pages.insert(
            1,
            dictionary! { "MediaBox" => vec![0.into(), 0.into(), 200.into(), 100.into()] },
        );
        tree.finish(&mut document, pages);
        let bytes = save(&mut document).expect("save");
        let reloaded = load(&bytes).expect("reload");
        assert_eq!(reloaded.get_pages().len(), 2);
    }
}
