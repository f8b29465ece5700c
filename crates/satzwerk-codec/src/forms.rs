// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interactive form fields.
//
// Extraction walks the AcroForm field tree and emits one entry per terminal
// field with its fully qualified name. Restoration rebuilds the tree from
// those names, re-links widgets to their pages, and returns the widgets so
// the caller can list them in each page's `/Annots`.

use std::collections::{BTreeMap, HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use satzwerk_core::cos::CosValue;
use satzwerk_core::model::PdfJsonFormField;
use tracing::{debug, warn};

use crate::annotations::annotation_refs;
use crate::cos::{CosBuilder, CosSerializer};
use crate::pdf::objects::{
    decode_text_string, get, get_dict, get_name, get_numbers, get_text, number, reference_id,
    resolve_dict, text_string,
};

/// Field attributes a terminal field may inherit from its ancestors.
const INHERITABLE_KEYS: &[&[u8]] = &[b"FT", b"Ff", b"V", b"DV", b"DA", b"Q"];

const SNAPSHOT_SKIP_KEYS: &[&[u8]] = &[b"P", b"Parent"];

const MAX_FIELD_DEPTH: usize = 32;

/// Widgets and the form dictionary produced by restoration.
#[derive(Debug, Default)]
pub struct RestoredForm {
    pub acro_form: Dictionary,
    /// Widget annotations to list in `/Annots`, by page number.
    pub widgets: BTreeMap<u32, Vec<ObjectId>>,
}

// -- Extraction ---------------------------------------------------------------

pub fn extract_form_fields(
    doc: &Document,
    serializer: &mut CosSerializer<'_>,
) -> Vec<PdfJsonFormField> {
    let Some(fields) = get_dict(doc, &doc.trailer, b"Root")
        .and_then(|catalog| get_dict(doc, catalog, b"AcroForm"))
        .and_then(|form| match get(doc, form, b"Fields") {
            Some(Object::Array(items)) => Some(items),
            _ => None,
        })
    else {
        return Vec::new();
    };

    let mut walker = FieldWalker {
        doc,
        serializer,
        pages: doc.get_pages(),
        visited: HashSet::new(),
        fields: Vec::new(),
    };
    let mut ancestors = Vec::new();
    for field in fields {
        walker.walk(field, None, &mut ancestors, 0);
    }
    debug!(fields = walker.fields.len(), "form fields extracted");
    walker.fields
}

struct FieldWalker<'a, 's, 'd> {
    doc: &'a Document,
    serializer: &'s mut CosSerializer<'d>,
    pages: BTreeMap<u32, ObjectId>,
    visited: HashSet<ObjectId>,
    fields: Vec<PdfJsonFormField>,
}

impl<'a> FieldWalker<'a, '_, '_> {
    fn walk(
        &mut self,
        node: &'a Object,
        parent_name: Option<&str>,
        ancestors: &mut Vec<&'a Dictionary>,
        depth: usize,
    ) {
        let doc = self.doc;
        if depth > MAX_FIELD_DEPTH {
            return;
        }
        if let Some(id) = reference_id(node)
            && !self.visited.insert(id)
        {
            return;
        }
        let Some(dict) = resolve_dict(doc, node) else {
            return;
        };

        let partial_name = get_text(doc, dict, b"T");
        let name = match (parent_name, partial_name.as_deref()) {
            (Some(parent), Some(partial)) => Some(format!("{}.{}", parent, partial)),
            (None, Some(partial)) => Some(partial.to_string()),
            (parent, None) => parent.map(str::to_string),
        };

        let kids: &'a [Object] = match get(doc, dict, b"Kids") {
            Some(Object::Array(items)) => items,
            _ => &[],
        };
        let field_kids: Vec<&'a Object> = kids
            .iter()
            .filter(|kid| resolve_dict(doc, kid).is_some_and(|d| d.has(b"T")))
            .collect();
        if !field_kids.is_empty() {
            ancestors.push(dict);
            for kid in field_kids {
                self.walk(kid, name.as_deref(), ancestors, depth + 1);
            }
            ancestors.pop();
            return;
        }

        let lookup = |key: &[u8]| -> Option<&'a Object> {
            get(doc, dict, key).or_else(|| ancestors.iter().rev().find_map(|a| get(doc, *a, key)))
        };
        let widget: &'a Object = kids.first().unwrap_or(node);
        let widget_dict = resolve_dict(doc, widget).unwrap_or(dict);

        let raw_data = self.snapshot(node, dict, &lookup);
        let page_number = self.widget_page(widget, widget_dict);
        self.fields.push(PdfJsonFormField {
            name,
            partial_name,
            field_type: lookup(b"FT").and_then(field_value),
            value: lookup(b"V").and_then(field_value),
            default_value: lookup(b"DV").and_then(field_value),
            flags: lookup(b"Ff").and_then(number).map(|f| f as i64),
            alternate_field_name: get_text(doc, dict, b"TU"),
            mapping_name: get_text(doc, dict, b"TM"),
            page_number,
            rect: get_numbers(doc, widget_dict, b"Rect"),
            raw_data,
        });
    }

    /// Snapshot of a terminal field with its inherited attributes made explicit.
    fn snapshot(
        &mut self,
        node: &Object,
        dict: &Dictionary,
        lookup: &dyn Fn(&[u8]) -> Option<&'a Object>,
    ) -> Option<CosValue> {
        let mut snapshot = match reference_id(node) {
            Some(id) => self.serializer.serialize_object(id, SNAPSHOT_SKIP_KEYS)?,
            None => self.serializer.serialize_dictionary(dict, SNAPSHOT_SKIP_KEYS),
        };
        if let CosValue::Dictionary { entries } = &mut snapshot {
            for key in INHERITABLE_KEYS {
                if dict.has(key) {
                    continue;
                }
                if let Some(value) = lookup(key).and_then(|v| self.serializer.serialize(v)) {
                    entries.insert(String::from_utf8_lossy(key).into_owned(), value);
                }
            }
        }
        Some(snapshot)
    }

    fn widget_page(&self, widget: &Object, widget_dict: &Dictionary) -> Option<u32> {
        let doc = self.doc;
        if let Some(page_id) = widget_dict.get(b"P").ok().and_then(reference_id)
            && let Some((number, _)) = self.pages.iter().find(|(_, id)| **id == page_id)
        {
            return Some(*number);
        }
        let widget_id = reference_id(widget)?;
        self.pages.iter().find_map(|(number, page_id)| {
            annotation_refs(doc, *page_id)
                .iter()
                .any(|entry| reference_id(entry) == Some(widget_id))
                .then_some(*number)
        })
    }
}

/// Text form of a field value: names, strings, numbers, and arrays of them.
fn field_value(object: &Object) -> Option<String> {
    match object {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Integer(value) => Some(value.to_string()),
        Object::Real(value) => Some(value.to_string()),
        Object::Boolean(value) => Some(value.to_string()),
        Object::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(field_value).collect();
            (!parts.is_empty()).then(|| parts.join(","))
        }
        _ => None,
    }
}

// -- Restoration --------------------------------------------------------------

/// Intermediate nodes created for qualified names without their own entry.
#[derive(Default)]
struct FieldTree {
    nodes: HashMap<String, ObjectId>,
    pending: HashMap<ObjectId, Dictionary>,
    children: BTreeMap<ObjectId, Vec<ObjectId>>,
    roots: Vec<ObjectId>,
}

impl FieldTree {
    /// Link `child` below the node named `parent_name`, or make it a root.
    fn attach(
        &mut self,
        doc: &mut Document,
        parent_name: Option<&str>,
        child: ObjectId,
    ) -> Option<ObjectId> {
        match parent_name {
            Some(parent_name) => {
                let parent = self.node(doc, parent_name);
                self.children.entry(parent).or_default().push(child);
                Some(parent)
            }
            None => {
                self.roots.push(child);
                None
            }
        }
    }

    fn node(&mut self, doc: &mut Document, qualified: &str) -> ObjectId {
        if let Some(id) = self.nodes.get(qualified) {
            return *id;
        }
        let id = doc.new_object_id();
        self.nodes.insert(qualified.to_string(), id);
        let (parent_name, partial) = match qualified.rsplit_once('.') {
            Some((parent, partial)) => (Some(parent), partial),
            None => (None, qualified),
        };
        let mut dict = dictionary! { "T" => text_string(partial) };
        if let Some(parent) = self.attach(doc, parent_name, id) {
            dict.set("Parent", Object::Reference(parent));
        }
        self.pending.insert(id, dict);
        id
    }

    fn finish(mut self, doc: &mut Document) -> Vec<ObjectId> {
        for (id, kids) in std::mem::take(&mut self.children) {
            let kids: Vec<Object> = kids.into_iter().map(Object::Reference).collect();
            if let Some(dict) = self.pending.get_mut(&id) {
                dict.set("Kids", kids);
            } else if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(id) {
                let mut merged = match dict.get(b"Kids") {
                    Ok(Object::Array(existing)) => existing.clone(),
                    _ => Vec::new(),
                };
                merged.extend(kids);
                dict.set("Kids", merged);
            }
        }
        for (id, dict) in self.pending {
            doc.objects.insert(id, Object::Dictionary(dict));
        }
        self.roots
    }
}

/// Rebuild the field tree. Returns `None` when no field could be restored.
pub fn restore_form_fields(
    doc: &mut Document,
    page_ids: &BTreeMap<u32, ObjectId>,
    fields: &[PdfJsonFormField],
) -> Option<RestoredForm> {
    let page_numbers: HashMap<ObjectId, u32> =
        page_ids.iter().map(|(number, id)| (*id, *number)).collect();
    let page_of = |dict: &Dictionary| {
        dict.get(b"P")
            .ok()
            .and_then(reference_id)
            .and_then(|id| page_numbers.get(&id).copied())
    };
    let mut tree = FieldTree::default();
    let mut widgets: BTreeMap<u32, Vec<ObjectId>> = BTreeMap::new();

    for field in fields {
        let label = field.name.as_deref().or(field.partial_name.as_deref()).unwrap_or("?");
        let Some(raw) = field.raw_data.as_ref() else {
            warn!(field = label, "form field skipped, no snapshot");
            continue;
        };
        let Some(mut dict) = CosBuilder::new(doc, page_ids).build_dictionary_value(raw) else {
            warn!(field = label, "form field skipped, snapshot is not a dictionary");
            continue;
        };
        let field_id = doc.new_object_id();
        if !dict.has(b"T")
            && let Some(partial) = &field.partial_name
        {
            dict.set("T", text_string(partial));
        }
        let fallback_page = field.page_number.filter(|n| page_ids.contains_key(n));

        match dict.remove(b"Kids") {
            Some(Object::Array(items)) => {
                let mut kids = Vec::with_capacity(items.len());
                for item in items {
                    let Object::Dictionary(mut kid) = item else {
                        continue;
                    };
                    kid.set("Parent", Object::Reference(field_id));
                    let page = page_of(&kid).or(fallback_page);
                    if !kid.has(b"P")
                        && let Some(page_id) = page.and_then(|n| page_ids.get(&n))
                    {
                        kid.set("P", Object::Reference(*page_id));
                    }
                    let kid_id = doc.add_object(kid);
                    kids.push(Object::Reference(kid_id));
                    if let Some(page) = page {
                        widgets.entry(page).or_default().push(kid_id);
                    }
                }
                dict.set("Kids", kids);
            }
            _ if get_name(doc, &dict, b"Subtype").as_deref() == Some("Widget") => {
                let page = page_of(&dict).or(fallback_page);
                if let Some(page) = page {
                    if let Some(page_id) = page_ids.get(&page) {
                        dict.set("P", Object::Reference(*page_id));
                    }
                    widgets.entry(page).or_default().push(field_id);
                }
            }
            _ => {}
        }

        let parent_name = field
            .name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(parent, _)| parent);
        if let Some(parent) = tree.attach(doc, parent_name, field_id) {
            dict.set("Parent", Object::Reference(parent));
        }
        doc.objects.insert(field_id, Object::Dictionary(dict));
    }

    let roots = tree.finish(doc);
    if roots.is_empty() {
        return None;
    }
    Some(RestoredForm {
        acro_form: dictionary! {
            "Fields" => roots.into_iter().map(Object::Reference).collect::<Vec<Object>>(),
        },
        widgets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::objects::get_number;
    use lopdf::StringFormat;

    fn flags_of(doc: &Document, id: ObjectId) -> Option<f64> {
        doc.get_dictionary(id).ok().and_then(|d| get_number(doc, d, b"Ff"))
    }

    fn literal(value: &str) -> Object {
        Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
    }

    /// One page with `address.city` (text, inheriting FT and Ff) and `agree`
    /// (checkbox with a separate widget kid).
    fn form_document() -> Document {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page_id = doc.new_object_id();
        let address_id = doc.new_object_id();
        let city_id = doc.add_object(dictionary! {
            "T" => literal("city"),
            "V" => literal("Berlin"),
            "Parent" => Object::Reference(address_id),
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Rect" => vec![10.into(), 10.into(), 200.into(), 30.into()],
            "P" => Object::Reference(page_id),
        });
        doc.objects.insert(
            address_id,
            Object::Dictionary(dictionary! {
                "T" => literal("address"),
                "FT" => "Tx",
                "Ff" => 4096,
                "Kids" => vec![Object::Reference(city_id)],
            }),
        );
        let agree_id = doc.new_object_id();
        let agree_widget = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Rect" => vec![10.into(), 50.into(), 20.into(), 60.into()],
            "Parent" => Object::Reference(agree_id),
            "AS" => "Yes",
        });
        doc.objects.insert(
            agree_id,
            Object::Dictionary(dictionary! {
                "T" => literal("agree"),
                "FT" => "Btn",
                "V" => "Yes",
                "TU" => literal("I agree"),
                "Kids" => vec![Object::Reference(agree_widget)],
            }),
        );
        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Annots" => vec![Object::Reference(city_id), Object::Reference(agree_widget)],
            }),
        );
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "AcroForm" => dictionary! {
                "Fields" => vec![Object::Reference(address_id), Object::Reference(agree_id)],
            },
        });
        doc.trailer.set("Root", Object::Reference(catalog));
        doc
    }

    #[test]
    fn terminal_fields_carry_qualified_names_and_inherited_attributes() {
        let doc = form_document();
        let mut serializer = CosSerializer::new(&doc);
        let fields = extract_form_fields(&doc, &mut serializer);
        let names: Vec<Option<&str>> = fields.iter().map(|f| f.name.as_deref()).collect();
        assert_eq!(names, [Some("address.city"), Some("agree")]);

        let city = &fields[0];
        assert_eq!(city.partial_name.as_deref(), Some("city"));
        assert_eq!(city.field_type.as_deref(), Some("Tx"));
        assert_eq!(city.value.as_deref(), Some("Berlin"));
        assert_eq!(city.flags, Some(4096));
        assert_eq!(city.page_number, Some(1));
        assert_eq!(city.rect, Some(vec![10.0, 10.0, 200.0, 30.0]));
        let entries = city.raw_data.as_ref().and_then(|raw| raw.entries()).expect("snapshot");
        assert!(entries.contains_key("FT"));
        assert!(!entries.contains_key("Parent"));

        let agree = &fields[1];
        assert_eq!(agree.value.as_deref(), Some("Yes"));
        assert_eq!(agree.alternate_field_name.as_deref(), Some("I agree"));
        assert_eq!(agree.page_number, Some(1));
    }

    #[test]
    fn restored_tree_links_fields_widgets_and_pages() {
        let source = form_document();
        let mut serializer = CosSerializer::new(&source);
        let fields = extract_form_fields(&source, &mut serializer);

        let mut target = Document::with_version("1.7");
        let page_id = target.new_object_id();
        let page_ids: BTreeMap<u32, ObjectId> = [(1, page_id)].into();
        let restored = restore_form_fields(&mut target, &page_ids, &fields).expect("form restored");

        let Ok(Object::Array(roots)) = restored.acro_form.get(b"Fields") else {
            panic!("fields array");
        };
        assert_eq!(roots.len(), 2);
        assert_eq!(restored.widgets.get(&1).map(Vec::len), Some(2));

        let address_id = reference_id(&roots[0]).expect("address node");
        let address = target.get_dictionary(address_id).expect("address dict");
        assert_eq!(get_text(&target, address, b"T").as_deref(), Some("address"));
        let Ok(Object::Array(kids)) = address.get(b"Kids") else {
            panic!("address kids");
        };
        let city_id = reference_id(&kids[0]).expect("city");
        let city = target.get_dictionary(city_id).expect("city dict");
        assert!(matches!(city.get(b"Parent"), Ok(Object::Reference(p)) if *p == address_id));
        assert!(matches!(city.get(b"P"), Ok(Object::Reference(p)) if *p == page_id));
        assert_eq!(flags_of(&target, city_id), Some(4096.0));

        let agree_id = reference_id(&roots[1]).expect("agree");
        let agree = target.get_dictionary(agree_id).expect("agree dict");
        let Ok(Object::Array(agree_kids)) = agree.get(b"Kids") else {
            panic!("agree kids");
        };
        let widget = target
            .get_dictionary(reference_id(&agree_kids[0]).expect("widget"))
            .expect("widget dict");
        assert!(matches!(widget.get(b"Parent"), Ok(Object::Reference(p)) if *p == agree_id));
    }

    #[test]
    fn fields_without_snapshot_are_skipped() {
        let mut target = Document::with_version("1.7");
        let page_ids: BTreeMap<u32, ObjectId> = [(1, target.new_object_id())].into();
        let fields = vec![PdfJsonFormField {
            name: Some("orphan".into()),
            ..Default::default()
        }];
        assert!(restore_form_fields(&mut target, &page_ids, &fields).is_none());
    }
}
