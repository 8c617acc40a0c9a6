//! Figure and table lookup against a fixed catalog.
//!
//! Descriptions are matched by case-insensitive key phrases. Matching is
//! deterministic and makes no external call: images are resolved through
//! the asset store, tables are returned from the catalog as-is.

use async_trait::async_trait;
use dossier_core::document::ContentBlock;
use dossier_core::error::ToolError;
use dossier_core::knowledge::AssetStore;
use dossier_core::message::ToolArgs;
use dossier_core::tool::{ParamSpec, ReturnShape, Tool, ToolOutput};
use std::sync::Arc;
use tracing::debug;

/// What a catalog entry yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogAsset {
    Image { file: String, caption: String },
    Table { rows: Vec<Vec<String>>, caption: String },
}

/// One known figure or table and the phrases that select it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Every one of these must appear in the description.
    pub all_of: Vec<String>,
    /// At least one of these must appear (ignored when empty).
    pub any_of: Vec<String>,
    pub asset: CatalogAsset,
}

impl CatalogEntry {
    fn matches(&self, description_lower: &str) -> bool {
        self.all_of.iter().all(|p| description_lower.contains(p.as_str()))
            && (self.any_of.is_empty()
                || self.any_of.iter().any(|p| description_lower.contains(p.as_str())))
    }
}

fn phrases(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Ordered list of known figures and tables.
#[derive(Debug, Clone, Default)]
pub struct FigureCatalog {
    entries: Vec<CatalogEntry>,
}

impl FigureCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// The figures and tables of the bundled NAFLD document set.
    pub fn builtin() -> Self {
        Self::new(vec![
            CatalogEntry {
                all_of: phrases(&["flowchart", "inclusion"]),
                any_of: Vec::new(),
                asset: CatalogAsset::Image {
                    file: "FlowChart.png".into(),
                    caption: "Study Inclusion and Screening Flowchart (PRISMA)".into(),
                },
            },
            CatalogEntry {
                all_of: phrases(&["city-wise"]),
                any_of: phrases(&["nafld", "prevalence"]),
                asset: CatalogAsset::Image {
                    file: "city-wise-nafld.png".into(),
                    caption: "State-wise NAFLD Prevalence Data in India".into(),
                },
            },
            CatalogEntry {
                all_of: phrases(&["table 1"]),
                any_of: phrases(&["publication", "statistic"]),
                asset: CatalogAsset::Table {
                    rows: publication_statistics(),
                    caption: "Table 1: Publication and Citation Statistics from Indian Subcontinent"
                        .into(),
                },
            },
        ])
    }

    /// The first entry matching `description`, in catalog order.
    pub fn lookup(&self, description: &str) -> Option<&CatalogEntry> {
        let lower = description.to_lowercase();
        self.entries.iter().find(|e| e.matches(&lower))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn publication_statistics() -> Vec<Vec<String>> {
    [
        ["Region/Keyword", "Metric", "2001-2012", "2013-2022", "2001-2022"],
        ["India", "Total papers", "126", "730", "856"],
        ["", "Total citations", "5426", "17,039", "22,465"],
        ["", "CPP", "43.06", "23.34", "26.44"],
        ["Select Subcontinent", "Total papers", "20", "199", "219"],
        ["", "Total citations", "1192", "3755", "4947"],
        ["", "CPP", "59.60", "18.87", "22.59"],
        ["Indian Subcontinent", "Total papers", "145", "908", "1053"],
        ["", "Total citations", "5784", "18,911", "24,695"],
        ["", "CPP", "39.89", "20.83", "23.45"],
    ]
    .iter()
    .map(|row| row.iter().map(|cell| cell.to_string()).collect())
    .collect()
}

pub struct ExtractFiguresTablesTool {
    catalog: FigureCatalog,
    assets: Arc<dyn AssetStore>,
}

impl ExtractFiguresTablesTool {
    pub fn new(catalog: FigureCatalog, assets: Arc<dyn AssetStore>) -> Self {
        Self { catalog, assets }
    }

    fn resolve(&self, asset: &CatalogAsset) -> ContentBlock {
        match asset {
            CatalogAsset::Image { file, caption } => {
                let path = self.assets.resolve(file);
                if self.assets.exists(file) {
                    ContentBlock::image(path.display().to_string(), caption.clone())
                } else {
                    debug!(file = %file, "Catalog image missing");
                    ContentBlock::text(format!(
                        "Image '{file}' not found at expected location ({}).",
                        path.display()
                    ))
                }
            }
            CatalogAsset::Table { rows, caption } => {
                ContentBlock::table(rows.clone(), caption.clone())
            }
        }
    }
}

#[async_trait]
impl Tool for ExtractFiguresTablesTool {
    fn name(&self) -> &str {
        "extract_figures_tables"
    }

    fn description(&self) -> &str {
        "Extract a specific figure or table by its description, e.g. 'Flowchart of study \
         inclusion', 'Table 1: Publication Statistics' or 'city-wise NAFLD prevalence data'. \
         Returns a list of image, table or text blocks."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "description",
            "A clear, unique description of the figure or table as found in the documents",
        )]
    }

    fn returns(&self) -> ReturnShape {
        ReturnShape::Blocks
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let description = args
            .get("description")
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'description' argument".into()))?;

        let Some(entry) = self.catalog.lookup(description) else {
            debug!(description = %description, "No catalog match");
            return Ok(ToolOutput::Blocks(vec![ContentBlock::text(format!(
                "Could not find a specific figure or table matching the description: '{description}'. Please check the documents or refine the description."
            ))]));
        };

        Ok(ToolOutput::Blocks(vec![self.resolve(&entry.asset)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_knowledge::FsAssetStore;

    fn tool(dir: &std::path::Path) -> ExtractFiguresTablesTool {
        ExtractFiguresTablesTool::new(FigureCatalog::builtin(), Arc::new(FsAssetStore::new(dir)))
    }

    async fn blocks(tool: &ExtractFiguresTablesTool, description: &str) -> Vec<ContentBlock> {
        let args = ToolArgs::from([("description".to_string(), description.to_string())]);
        match tool.execute(&args).await.unwrap() {
            ToolOutput::Blocks(blocks) => blocks,
            other => panic!("expected blocks, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn flowchart_resolves_to_image_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("FlowChart.png"), [0u8]).unwrap();
        let out = blocks(&tool(dir.path()), "Flowchart of study inclusion").await;

        assert_eq!(out.len(), 1);
        match &out[0] {
            ContentBlock::Image { path, caption } => {
                assert!(path.ends_with("FlowChart.png"));
                assert_eq!(caption, "Study Inclusion and Screening Flowchart (PRISMA)");
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_image_becomes_diagnostic_text() {
        let dir = tempfile::tempdir().unwrap();
        let out = blocks(&tool(dir.path()), "flowchart of inclusion").await;

        assert_eq!(out.len(), 1);
        match &out[0] {
            ContentBlock::Text { content } => {
                assert!(content.starts_with("Image 'FlowChart.png' not found at expected location ("));
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn table_one_is_literal() {
        let dir = tempfile::tempdir().unwrap();
        let out = blocks(&tool(dir.path()), "Table 1: Publication Statistics").await;

        match &out[0] {
            ContentBlock::Table { rows, caption } => {
                assert_eq!(rows.len(), 10);
                assert!(rows.iter().all(|r| r.len() == 5));
                assert_eq!(rows[1][0], "India");
                assert!(caption.starts_with("Table 1:"));
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_match_wins_when_several_apply() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("FlowChart.png"), [0u8]).unwrap();
        let out = blocks(&tool(dir.path()), "flowchart of inclusion and table 1 statistics").await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind(), "image");
    }

    #[tokio::test]
    async fn no_match_is_single_text_block() {
        let dir = tempfile::tempdir().unwrap();
        let out = blocks(&tool(dir.path()), "Figure 9: survival curve").await;
        assert_eq!(
            out,
            vec![ContentBlock::text(
                "Could not find a specific figure or table matching the description: 'Figure 9: survival curve'. Please check the documents or refine the description."
            )]
        );
    }

    #[test]
    fn lookup_requires_all_phrases() {
        let catalog = FigureCatalog::builtin();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.lookup("flowchart").is_none());
        assert!(catalog.lookup("city-wise data").is_none());
        assert!(matches!(
            catalog.lookup("CITY-WISE NAFLD").map(|e| &e.asset),
            Some(CatalogAsset::Image { file, .. }) if file == "city-wise-nafld.png"
        ));
    }
}
