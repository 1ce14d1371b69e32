//! Block-structured rendering of assistant text.
//!
//! Every adapter turns raw upstream text into a [`Document`] with
//! [`format_content`], so consumers never special-case a provider. On the wire
//! a document is an array of blocks, each block an array whose first element
//! is the block type: `[[0, "first paragraph"], [0, "second"]]`.

use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Block type tag for a paragraph of text.
pub const PARAGRAPH: u64 = 0;

const PARAGRAPH_BREAK: &str = "\n\n";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Block
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One rendering unit of a [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// `[0, text]`
    Paragraph(String),
    /// Any other block type, kept verbatim (type tag included).
    Other(Vec<Value>),
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph(text.into())
    }

    /// Text payload of a paragraph block.
    pub fn as_paragraph(&self) -> Option<&str> {
        match self {
            Block::Paragraph(text) => Some(text),
            Block::Other(_) => None,
        }
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Block::Paragraph(text) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&PARAGRAPH)?;
                seq.serialize_element(text)?;
                seq.end()
            }
            Block::Other(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<Value>::deserialize(deserializer)?;
        match items.as_slice() {
            [Value::Number(tag), Value::String(text)] if tag.as_u64() == Some(PARAGRAPH) => {
                Ok(Block::Paragraph(text.clone()))
            }
            _ => Ok(Block::Other(items)),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Document
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Ordered sequence of blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(pub Vec<Block>);

impl Document {
    pub fn blocks(&self) -> &[Block] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Paragraph payloads joined with blank lines. Non-paragraph blocks are
    /// skipped.
    pub fn plain_text(&self) -> String {
        self.0
            .iter()
            .filter_map(Block::as_paragraph)
            .collect::<Vec<_>>()
            .join(PARAGRAPH_BREAK)
    }
}

impl From<Vec<Block>> for Document {
    fn from(blocks: Vec<Block>) -> Self {
        Document(blocks)
    }
}

/// Split accumulated text into paragraph blocks.
///
/// Paragraphs are separated by a blank line (`"\n\n"`), trimmed, and empty
/// ones are dropped. Non-empty text that yields no paragraph at all still
/// produces a single block holding the trimmed text, so whitespace-only
/// input gives one empty paragraph `[[0, ""]]` rather than an empty document.
pub fn format_content(text: &str) -> Document {
    let blocks: Vec<Block> = text
        .split(PARAGRAPH_BREAK)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(Block::paragraph)
        .collect();

    if blocks.is_empty() && !text.is_empty() {
        return Document(vec![Block::paragraph(text.trim())]);
    }
    Document(blocks)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn two_paragraphs() {
        let doc = format_content("Hello\n\nWorld");
        assert_eq!(
            doc,
            Document(vec![Block::paragraph("Hello"), Block::paragraph("World")])
        );
    }

    #[test]
    fn paragraphs_are_trimmed_and_empties_dropped() {
        let doc = format_content("  one \n\n\n\n two\n\n   \n\nthree  ");
        let texts: Vec<&str> = doc.blocks().iter().filter_map(Block::as_paragraph).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn single_newlines_stay_inside_a_paragraph() {
        let doc = format_content("line one\nline two");
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.blocks()[0].as_paragraph(), Some("line one\nline two"));
    }

    #[test]
    fn empty_text_gives_empty_document() {
        assert!(format_content("").is_empty());
    }

    #[test]
    fn whitespace_only_text_is_not_dropped() {
        let doc = format_content(" \n\n ");
        assert_eq!(doc, Document(vec![Block::paragraph("")]));
    }

    #[test]
    fn block_count_matches_non_empty_paragraphs() {
        let samples = [
            "a",
            "a\n\nb",
            "\n\na\n\n\n\nb\n\n",
            "first\nstill first\n\nsecond\n\n\n third ",
            "x\n\n \n\ny\n\nz",
        ];
        for text in samples {
            let expected: Vec<&str> = text
                .split("\n\n")
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            let doc = format_content(text);
            assert_eq!(doc.len(), expected.len(), "text: {text:?}");
            let rejoined = doc.plain_text();
            let reparsed: Vec<&str> = rejoined.split("\n\n").collect();
            assert_eq!(reparsed, expected, "text: {text:?}");
        }
    }

    #[test]
    fn serializes_as_nested_arrays() {
        let doc = format_content("Hello\n\nWorld");
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!([[0, "Hello"], [0, "World"]])
        );
    }

    #[test]
    fn unknown_block_types_survive_a_round_trip() {
        let raw = json!([[0, "text"], [3, {"lang": "rust"}, "fn main() {}"]]);
        let doc: Document = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(doc.blocks()[0], Block::paragraph("text"));
        assert!(matches!(doc.blocks()[1], Block::Other(_)));
        assert_eq!(serde_json::to_value(&doc).unwrap(), raw);
    }
}
