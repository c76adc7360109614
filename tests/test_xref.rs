//! Cross-reference table properties.

mod common;

use common::{startxref, PdfBuilder};
use pdf_inject::writer::{build_xref_entries, XrefEntry};
use pdf_inject::DocumentEditor;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Walk the free list from entry 0 and return every visited object number.
fn walk_free_list(entries: &[XrefEntry]) -> Vec<u32> {
    let mut visited = Vec::new();
    let mut current = 0u32;
    loop {
        match entries[current as usize] {
            XrefEntry::Free { next } => {
                visited.push(current);
                if next == 0 {
                    return visited;
                }
                assert!(visited.len() <= entries.len(), "free list does not close");
                current = next;
            },
            XrefEntry::InUse { .. } => panic!("free list reaches in-use entry {}", current),
        }
    }
}

#[test]
fn test_single_gap() {
    let offsets: BTreeMap<u32, usize> = [(1, 9), (3, 50), (4, 90)].into_iter().collect();
    let entries = build_xref_entries(&offsets, 5);
    assert_eq!(walk_free_list(&entries), vec![0, 2]);
    assert_eq!(entries[2], XrefEntry::Free { next: 0 });
}

#[test]
fn test_serialized_free_rows() {
    let input = PdfBuilder::new(2)
        .object(2, "<< /Type /Catalog /Pages 5 0 R >>")
        .object(5, "<< /Type /Pages /Kids [] /Count 0 >>")
        .object(9, "(spare)")
        .build();
    let output = DocumentEditor::from_bytes(&input).unwrap().to_bytes().unwrap();
    let table = String::from_utf8_lossy(&output[startxref(&output)..]).to_string();
    let rows: Vec<&str> = table.lines().skip(2).take(10).collect();

    let free: Vec<(usize, u32)> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.ends_with(" f "))
        .map(|(id, row)| (id, row[..10].parse().unwrap()))
        .collect();
    assert_eq!(
        free,
        vec![(0, 1), (1, 3), (3, 4), (4, 6), (6, 7), (7, 8), (8, 0)]
    );
    for row in &rows {
        assert_eq!(row.len(), 19);
    }
}

proptest! {
    #[test]
    fn prop_free_list_is_one_closed_chain(ids in prop::collection::btree_set(1u32..60, 1..40)) {
        let offsets: BTreeMap<u32, usize> = ids.iter().map(|&id| (id, id as usize * 10)).collect();
        let size = ids.iter().max().copied().unwrap_or(0) + 1;
        let entries = build_xref_entries(&offsets, size);

        prop_assert_eq!(entries.len(), size as usize);
        let chain = walk_free_list(&entries);
        let expected: Vec<u32> = (0..size).filter(|id| !ids.contains(id)).collect();
        prop_assert_eq!(&chain, &expected);

        let unique: BTreeSet<u32> = chain.iter().copied().collect();
        prop_assert_eq!(unique.len(), chain.len());
        for id in &ids {
            let in_use = matches!(entries[*id as usize], XrefEntry::InUse { .. });
            prop_assert!(in_use);
        }
    }
}
