//! The report content model handed to renderers.
//!
//! A [`ReportDocument`] is an ordered mapping from section title to a
//! non-empty list of [`ContentBlock`]s. It serializes as a JSON object whose
//! key order is the section order, and deserializing one validates the whole
//! shape (block types, required fields, non-empty sections and tables,
//! unique titles).

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One atomic renderable unit of a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    /// A paragraph of text.
    Text { content: String },

    /// A figure stored as a file.
    Image { path: String, caption: String },

    /// Literal table data; the first row is the header.
    Table {
        #[serde(rename = "data", deserialize_with = "deserialize_cells")]
        rows: Vec<Vec<String>>,
        caption: String,
    },
}

impl ContentBlock {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text { content: content.into() }
    }

    pub fn image(path: impl Into<String>, caption: impl Into<String>) -> Self {
        Self::Image {
            path: path.into(),
            caption: caption.into(),
        }
    }

    pub fn table(rows: Vec<Vec<String>>, caption: impl Into<String>) -> Self {
        Self::Table {
            rows,
            caption: caption.into(),
        }
    }

    /// The wire discriminator (`text`, `image`, `table`).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Table { .. } => "table",
        }
    }
}

/// Models routinely emit numeric table cells; accept any scalar and keep its
/// textual form. `null` becomes an empty cell.
fn deserialize_cells<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<serde_json::Value>> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect())
}

/// A titled, non-empty run of content blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    title: String,
    blocks: Vec<ContentBlock>,
}

impl Section {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }
}

/// The structured report: section title → blocks, in insertion order.
///
/// Immutable once built. Construct one with [`ReportBuilder`], by
/// deserializing JSON, or with [`ReportDocument::single`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    sections: Vec<Section>,
}

impl ReportDocument {
    /// A document with exactly one section holding one block.
    pub fn single(title: impl Into<String>, block: ContentBlock) -> Self {
        Self {
            sections: vec![Section {
                title: title.into(),
                blocks: vec![block],
            }],
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Section titles in document order.
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.title.as_str())
    }

    /// Blocks of the section with the given title.
    pub fn get(&self, title: &str) -> Option<&[ContentBlock]> {
        self.sections
            .iter()
            .find(|s| s.title == title)
            .map(|s| s.blocks.as_slice())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Always false for a document obtained through the public API; kept for
    /// the usual `len`/`is_empty` pairing.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Total number of blocks across all sections.
    pub fn block_count(&self) -> usize {
        self.sections.iter().map(|s| s.blocks.len()).sum()
    }
}

impl Serialize for ReportDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in &self.sections {
            map.serialize_entry(&section.title, &section.blocks)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ReportDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ReportVisitor)
    }
}

struct ReportVisitor;

impl<'de> Visitor<'de> for ReportVisitor {
    type Value = ReportDocument;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object mapping section titles to lists of content blocks")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut sections: Vec<Section> = Vec::new();

        while let Some(title) = access.next_key::<String>()? {
            let blocks: Vec<ContentBlock> = access.next_value()?;

            if sections.iter().any(|s| s.title == title) {
                return Err(de::Error::custom(format!("duplicate section '{title}'")));
            }
            if blocks.is_empty() {
                return Err(de::Error::custom(format!("section '{title}' has no content")));
            }
            if let Some(ContentBlock::Table { caption, .. }) = blocks
                .iter()
                .find(|b| matches!(b, ContentBlock::Table { rows, .. } if rows.is_empty()))
            {
                return Err(de::Error::custom(format!(
                    "table '{caption}' in section '{title}' has no rows"
                )));
            }

            sections.push(Section { title, blocks });
        }

        if sections.is_empty() {
            return Err(de::Error::custom("report has no sections"));
        }

        Ok(ReportDocument { sections })
    }
}

/// Accumulates sections in first-occurrence order.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    sections: Vec<Section>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block to `title`, creating the section on first use.
    pub fn append(&mut self, title: &str, block: ContentBlock) {
        self.section_mut(title).blocks.push(block);
    }

    /// Append several blocks to `title`. An empty list leaves the builder
    /// untouched so no empty section is ever created.
    pub fn extend(&mut self, title: &str, blocks: Vec<ContentBlock>) {
        if blocks.is_empty() {
            return;
        }
        self.section_mut(title).blocks.extend(blocks);
    }

    pub fn contains(&self, title: &str) -> bool {
        self.sections.iter().any(|s| s.title == title)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Finish the document; `None` when nothing was appended.
    pub fn build(self) -> Option<ReportDocument> {
        if self.sections.is_empty() {
            None
        } else {
            Some(ReportDocument {
                sections: self.sections,
            })
        }
    }

    fn section_mut(&mut self, title: &str) -> &mut Section {
        let index = match self.sections.iter().position(|s| s.title == title) {
            Some(index) => index,
            None => {
                self.sections.push(Section {
                    title: title.to_string(),
                    blocks: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_wire_format() {
        let json = serde_json::to_value(ContentBlock::table(
            vec![vec!["a".into(), "b".into()]],
            "T",
        ))
        .unwrap();
        assert_eq!(json["type"], "table");
        assert_eq!(json["data"][0][1], "b");
        assert_eq!(json["caption"], "T");

        let json = serde_json::to_value(ContentBlock::text("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "text", "content": "hi"}));
    }

    #[test]
    fn parse_preserves_section_order() {
        let doc: ReportDocument = serde_json::from_str(
            r#"{
                "Zeta": [{"type": "text", "content": "z"}],
                "Alpha": [{"type": "text", "content": "a"}],
                "Mid": [{"type": "image", "path": "f.png", "caption": "F"}]
            }"#,
        )
        .unwrap();
        let titles: Vec<&str> = doc.titles().collect();
        assert_eq!(titles, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn serialize_preserves_section_order() {
        let mut builder = ReportBuilder::new();
        builder.append("Zeta", ContentBlock::text("z"));
        builder.append("Alpha", ContentBlock::text("a"));
        let doc = builder.build().unwrap();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.find("Zeta").unwrap() < json.find("Alpha").unwrap());
    }

    #[test]
    fn numeric_table_cells_are_stringified() {
        let doc: ReportDocument = serde_json::from_str(
            r#"{"T": [{"type": "table", "data": [["x", 1, 2.5, null, true]], "caption": "c"}]}"#,
        )
        .unwrap();
        match &doc.get("T").unwrap()[0] {
            ContentBlock::Table { rows, .. } => {
                assert_eq!(rows[0], vec!["x", "1", "2.5", "", "true"]);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_block_type() {
        let result: Result<ReportDocument, _> =
            serde_json::from_str(r#"{"S": [{"type": "chart", "content": "x"}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_missing_required_field() {
        let result: Result<ReportDocument, _> =
            serde_json::from_str(r#"{"S": [{"type": "image", "path": "a.png"}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_empty_shapes() {
        for json in [
            r#"{}"#,
            r#"{"S": []}"#,
            r#"{"S": [{"type": "table", "data": [], "caption": "c"}]}"#,
            r#"{"S": [{"type": "text", "content": "a"}], "S": [{"type": "text", "content": "b"}]}"#,
        ] {
            let result: Result<ReportDocument, _> = serde_json::from_str(json);
            assert!(result.is_err(), "should reject {json}");
        }
    }

    #[test]
    fn builder_merges_repeated_titles() {
        let mut builder = ReportBuilder::new();
        builder.append("Intro", ContentBlock::text("one"));
        builder.append("Other", ContentBlock::text("x"));
        builder.append("Intro", ContentBlock::text("two"));
        let doc = builder.build().unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get("Intro").unwrap().len(), 2);
        assert_eq!(doc.block_count(), 3);
    }

    #[test]
    fn builder_skips_empty_extend() {
        let mut builder = ReportBuilder::new();
        builder.extend("Nothing", vec![]);
        assert!(builder.is_empty());
        assert!(builder.build().is_none());
    }
}
