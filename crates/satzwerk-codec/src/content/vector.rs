// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Non-text drawing kept underneath regenerated elements.

use std::collections::HashSet;

use lopdf::content::Operation;

use crate::pdf::objects::name_of;

/// Operators that show or position text, plus font selection.
const TEXT_OPERATORS: &[&str] = &["BT", "ET", "Tj", "TJ", "'", "\"", "Td", "TD", "Tm", "T*", "Tf"];

/// The preserved operations minus text and raster images, as one balanced
/// `q … Q` group.
///
/// `Do` survives only for XObjects the page still has and that are not
/// redrawn as image elements. Inline images stay.
pub fn vector_layer(
    operations: Vec<Operation>,
    image_names: &HashSet<String>,
    known: &dyn Fn(&str) -> bool,
) -> Vec<Operation> {
    let mut layer = vec![Operation::new("q", vec![])];
    let mut depth = 0usize;
    for op in operations {
        match op.operator.as_str() {
            operator if TEXT_OPERATORS.contains(&operator) => continue,
            "Do" => {
                let keep = op
                    .operands
                    .first()
                    .and_then(name_of)
                    .is_some_and(|name| !image_names.contains(&name) && known(&name));
                if !keep {
                    continue;
                }
            }
            "q" => depth += 1,
            "Q" => {
                if depth == 0 {
                    continue;
                }
                depth -= 1;
            }
            _ => {}
        }
        layer.push(op);
    }
    layer.extend((0..=depth).map(|_| Operation::new("Q", vec![])));
    layer
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Content;

    fn operators(operations: &[Operation]) -> Vec<&str> {
        operations.iter().map(|op| op.operator.as_str()).collect()
    }

    #[test]
    fn text_and_redrawn_images_are_removed() {
        let ops = Content::decode(
            b"0 0 1 rg 10 10 50 50 re f BT /F1 12 Tf 72 720 Td (x) Tj ET \
              /Im1 Do /Fm0 Do /Gone Do",
        )
        .expect("decode")
        .operations;
        let images = HashSet::from(["Im1".to_string()]);
        let layer = vector_layer(ops, &images, &|name| name == "Im1" || name == "Fm0");
        assert_eq!(operators(&layer), ["q", "rg", "re", "f", "Do", "Q"]);
        assert_eq!(layer[4].operands.first().and_then(name_of).as_deref(), Some("Fm0"));
    }

    #[test]
    fn save_restore_pairs_are_balanced() {
        let stray = Content::decode(b"Q 1 w q 0 0 m 5 5 l S Q Q")
            .expect("decode")
            .operations;
        assert_eq!(
            operators(&vector_layer(stray, &HashSet::new(), &|_| true)),
            ["q", "w", "q", "m", "l", "S", "Q", "Q"]
        );

        let open = Content::decode(b"q q 0 0 m S").expect("decode").operations;
        assert_eq!(
            operators(&vector_layer(open, &HashSet::new(), &|_| true)),
            ["q", "q", "q", "m", "S", "Q", "Q", "Q"]
        );
    }
}
