//! Block extraction: split a text blob into ordered UBR blocks.
//!
//! A block starts at a delimiter `UBR <digits>:` (one or more whitespace
//! characters between the token and the number) and runs to the next
//! delimiter or the end of the text. Text before the first delimiter belongs
//! to no block and is dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

static RE_DELIMITER: Lazy<Regex> = Lazy::new(|| Regex::new(r"UBR\s+\d+:").unwrap());

/// One UBR block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Delimiter without its colon, e.g. `"UBR 12"`.
    pub id: String,
    /// Trimmed instruction text.
    pub body: String,
}

/// Ordered block-ID → body map.
///
/// Iteration follows the order in which IDs first appeared. Inserting an ID
/// that is already present replaces its body and keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockMap {
    blocks: Vec<Block>,
    index: HashMap<String, usize>,
}

impl BlockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns the previous body for a duplicate ID.
    pub fn insert(&mut self, id: String, body: String) -> Option<String> {
        match self.index.get(&id) {
            Some(&pos) => Some(std::mem::replace(&mut self.blocks[pos].body, body)),
            None => {
                self.index.insert(id.clone(), self.blocks.len());
                self.blocks.push(Block { id, body });
                None
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.index.get(id).map(|&pos| self.blocks[pos].body.as_str())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|b| b.id.as_str())
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}

impl<'a> IntoIterator for &'a BlockMap {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

impl Serialize for BlockMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.blocks.serialize(serializer)
    }
}

/// Split `text` into UBR blocks.
///
/// Pure and deterministic. Zero delimiters yield an empty map.
pub fn extract_blocks(text: &str) -> BlockMap {
    let mut map = BlockMap::new();
    let delimiters: Vec<_> = RE_DELIMITER.find_iter(text).collect();

    for (i, m) in delimiters.iter().enumerate() {
        let body_end = delimiters.get(i + 1).map_or(text.len(), |next| next.start());
        let id = block_id(m.as_str());
        let body = text[m.end()..body_end].trim().to_string();
        map.insert(id, body);
    }

    map
}

/// Block ID as written in prompts and reply headers: whitespace runs
/// collapsed to one space, so `"UBR\n8"` reads `"UBR 8"`.
pub fn display_id(id: &str) -> String {
    id.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn block_id(delimiter: &str) -> String {
    delimiter.trim().replace(':', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_delimiters(text: &str) -> usize {
        RE_DELIMITER.find_iter(text).count()
    }

    fn pairs(map: &BlockMap) -> Vec<(&str, &str)> {
        map.iter().map(|b| (b.id.as_str(), b.body.as_str())).collect()
    }

    #[test]
    fn preamble_is_discarded() {
        let map = extract_blocks("preamble UBR 1: fee for 10 people UBR 2: fee for 20 people");
        assert_eq!(
            pairs(&map),
            vec![("UBR 1", "fee for 10 people"), ("UBR 2", "fee for 20 people")]
        );
    }

    #[test]
    fn trailing_delimiter_has_empty_body() {
        let map = extract_blocks("UBR 5:");
        assert_eq!(pairs(&map), vec![("UBR 5", "")]);
    }

    #[test]
    fn duplicate_id_later_wins() {
        let map = extract_blocks("UBR 3: first UBR 3: second");
        assert_eq!(pairs(&map), vec![("UBR 3", "second")]);
    }

    #[test]
    fn duplicate_keeps_first_position() {
        let map = extract_blocks("UBR 1: a UBR 2: b UBR 1: c");
        assert_eq!(pairs(&map), vec![("UBR 1", "c"), ("UBR 2", "b")]);
    }

    #[test]
    fn no_delimiter_is_empty() {
        assert!(extract_blocks("").is_empty());
        assert!(extract_blocks("just a rate sheet, no blocks").is_empty());
        // Missing colon, missing digits, missing whitespace.
        assert!(extract_blocks("UBR 1 fee UBR: x UBR1: y").is_empty());
    }

    #[test]
    fn block_count_is_matches_minus_collisions() {
        let text = "UBR 1: a\nUBR 2: b\nUBR 1: c\nUBR 3: d\nUBR 2: e";
        assert_eq!(count_delimiters(text), 5);
        assert_eq!(extract_blocks(text).len(), 3);
    }

    #[test]
    fn bodies_span_lines_and_are_trimmed() {
        let text = "Header\n\nUBR 10:\n  Day rate EUR 900\n  Minimum 5 learners\n\nUBR 11:\tflat fee\n";
        let map = extract_blocks(text);
        assert_eq!(map.get("UBR 10"), Some("Day rate EUR 900\n  Minimum 5 learners"));
        assert_eq!(map.get("UBR 11"), Some("flat fee"));
    }

    #[test]
    fn interior_whitespace_of_delimiter_is_kept() {
        let map = extract_blocks("UBR   7: wide UBR\n8: split");
        assert_eq!(map.ids().collect::<Vec<_>>(), vec!["UBR   7", "UBR\n8"]);
    }

    #[test]
    fn display_id_collapses_whitespace() {
        assert_eq!(display_id("UBR\n8"), "UBR 8");
        assert_eq!(display_id("UBR \t 7"), "UBR 7");
        assert_eq!(display_id("UBR 12"), "UBR 12");
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "x UBR 1: a UBR 2: b UBR 1: z";
        let first = extract_blocks(text);
        let second = extract_blocks(text);
        assert_eq!(first, second);
        assert_eq!(pairs(&first), pairs(&second));
    }

    #[test]
    fn insert_reports_replaced_body() {
        let mut map = BlockMap::new();
        assert_eq!(map.insert("UBR 1".into(), "a".into()), None);
        assert_eq!(map.insert("UBR 1".into(), "b".into()), Some("a".into()));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn serializes_as_ordered_list() {
        let map = extract_blocks("UBR 2: b UBR 1: a");
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(
            json,
            r#"[{"id":"UBR 2","body":"b"},{"id":"UBR 1","body":"a"}]"#
        );
    }
}
