//! Content hashing and in-text citation resolution.
//!
//! Retrieved papers cite each other through numeric markers such as `[5]` or
//! `[2, 3, 8]` that index into the citing paper's reference list. This module
//! turns those markers into stable [`HashId`]s of the cited reference text so
//! papers can be matched and deduplicated without comparing full strings.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

/// A 63-bit non-negative content hash.
pub type HashId = i64;

static CITATION_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+(?:,\s*\d+)*\]").expect("citation pattern is valid"));

/// Hash `text` into a [`HashId`].
///
/// The text is lowercased, hashed with SHA-256, and the first eight digest
/// bytes are read as a big-endian `i64` whose absolute value is returned.
/// `i64::MIN` (a single digest in 2^64) saturates to `i64::MAX`.
pub fn hash_id(text: &str) -> HashId {
    let digest = Sha256::digest(text.to_lowercase().as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(head).checked_abs().unwrap_or(i64::MAX)
}

/// One bracketed citation group found in a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMark {
    /// Byte range of the group, brackets included.
    pub span: Range<usize>,
    /// Reference indices in the order written.
    pub indices: Vec<usize>,
}

/// Find every `[n]` / `[n, m, ...]` group in `text`.
pub fn parse_marks(text: &str) -> Vec<ReferenceMark> {
    CITATION_GROUP
        .find_iter(text)
        .map(|m| ReferenceMark {
            span: m.range(),
            indices: m
                .as_str()
                .trim_matches(|c| c == '[' || c == ']')
                .split(',')
                .filter_map(|n| n.trim().parse().ok())
                .collect(),
        })
        .collect()
}

/// Hash ids of a paper's reference list, addressed by list position.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    ids: Vec<HashId>,
}

impl ReferenceTable {
    pub fn new<S: AsRef<str>>(references: &[S]) -> Self {
        Self {
            ids: references.iter().map(|r| hash_id(r.as_ref())).collect(),
        }
    }

    /// Hash id of the reference at `index`, if the list is long enough.
    pub fn get(&self, index: usize) -> Option<HashId> {
        self.ids.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Resolve the citations in `text` to hash ids of `references`.
///
/// Every index is counted across all groups. Then, group by group, indices
/// cited exactly once are discarded, except that a group made up entirely of
/// such indices keeps its first one. The surviving indices are emitted once
/// each, in ascending order. This is a heuristic for reference lists whose
/// citation groups carry stray leading entries.
///
/// Indices beyond the end of `references` are skipped.
pub fn extract_citations<S: AsRef<str>>(text: &str, references: &[S]) -> Vec<HashId> {
    let marks = parse_marks(text);

    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for mark in &marks {
        for &index in &mark.indices {
            *counts.entry(index).or_default() += 1;
        }
    }

    for mark in &marks {
        let mut singles: Vec<usize> = mark
            .indices
            .iter()
            .copied()
            .filter(|index| counts.get(index) == Some(&1))
            .collect();
        if !singles.is_empty() && singles.len() == mark.indices.len() {
            singles.remove(0);
        }
        for index in singles {
            counts.remove(&index);
        }
    }

    let table = ReferenceTable::new(references);
    counts
        .into_keys()
        .filter_map(|index| {
            let id = table.get(index);
            if id.is_none() {
                debug!(index, references = table.len(), "citation index out of range");
            }
            id
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Reference number {i}")).collect()
    }

    fn ids(indices: &[usize], references: &[String]) -> Vec<HashId> {
        indices.iter().map(|&i| hash_id(&references[i])).collect()
    }

    #[test]
    fn hash_is_deterministic_and_case_folded() {
        let a = hash_id("Attention Is All You Need");
        assert_eq!(a, hash_id("Attention Is All You Need"));
        assert_eq!(a, hash_id("attention is all you need"));
        assert_ne!(a, hash_id("Attention Is Not All You Need"));
        assert!(a >= 0);
    }

    #[test]
    fn hash_is_big_endian_digest_prefix() {
        let digest = Sha256::digest(b"example_string");
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        assert_eq!(hash_id("EXAMPLE_string"), i64::from_be_bytes(head).abs());
    }

    #[test]
    fn hashes_fit_in_63_bits() {
        for i in 0..500 {
            let id = hash_id(&format!("paper title {i}"));
            assert!(id >= 0);
            assert_eq!(id as u64 >> 63, 0);
        }
    }

    #[test]
    fn parse_marks_finds_groups() {
        let marks = parse_marks("see [15, 16] and [5], not [a] or [ 3]");
        assert_eq!(marks.len(), 2);
        assert_eq!(marks[0].indices, vec![15, 16]);
        assert_eq!(marks[0].span, 4..12);
        assert_eq!(marks[1].indices, vec![5]);
    }

    #[test]
    fn tie_break_on_mixed_and_recurring_groups() {
        // 5 is cited once; 15, 16, 2, 3 and 8 recur later in the text.
        let references = refs(20);
        let text = "[15, 16] text [5] more [2, 3, 8]. Later work [15, 16] and [2, 3, 8] agree.";
        let got = extract_citations(text, &references);
        // [5] is a group of nothing but single citations, so its first (and
        // only) index survives; every recurring index survives as well.
        assert_eq!(got, ids(&[2, 3, 5, 8, 15, 16], &references));
    }

    #[test]
    fn mixed_group_drops_its_single_citations() {
        let references = refs(20);
        let got = extract_citations("[4, 15] introduced it; [15] extended it.", &references);
        assert_eq!(got, ids(&[15], &references));
    }

    #[test]
    fn mixed_group_drops_every_single_citation() {
        let references = refs(20);
        let got = extract_citations("[1, 2, 9] then [9] again", &references);
        assert_eq!(got, ids(&[9], &references));
    }

    #[test]
    fn all_single_group_keeps_only_its_first_index() {
        let references = refs(20);
        let got = extract_citations("Prior art [7, 9] exists.", &references);
        assert_eq!(got, ids(&[7], &references));
    }

    #[test]
    fn results_are_unique_and_ascending() {
        let references = refs(20);
        let got = extract_citations("[12] [3] [12] [3, 12] [1]", &references);
        assert_eq!(got, ids(&[1, 3, 12], &references));
    }

    #[test]
    fn out_of_range_indices_are_skipped() {
        let references = refs(3);
        let got = extract_citations("[1] [1] [42] [42]", &references);
        assert_eq!(got, ids(&[1], &references));
    }

    #[test]
    fn no_citations_yield_nothing() {
        let references = refs(3);
        assert!(extract_citations("no markers here", &references).is_empty());
        assert!(extract_citations("", &references).is_empty());
    }

    #[test]
    fn reference_table_is_position_addressed() {
        let references = refs(2);
        let table = ReferenceTable::new(&references);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0), Some(hash_id("Reference number 0")));
        assert_eq!(table.get(2), None);
        assert!(ReferenceTable::default().is_empty());
    }
}
