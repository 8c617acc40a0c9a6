//! Report-building tools for Dossier.
//!
//! Tools give the model access to the document collection:
//! extract the text of a section, look up figures and tables, and
//! summarize a topic. Content-level failures are reported as ordinary
//! output text so the model can react to them.

pub mod extract_exact_text;
pub mod extract_figures_tables;
pub mod generate_summary;

use dossier_core::knowledge::{AssetStore, Retrieval};
use dossier_core::tool::ToolRegistry;
use std::sync::Arc;

pub use extract_exact_text::ExtractExactTextTool;
pub use extract_figures_tables::{CatalogAsset, CatalogEntry, ExtractFiguresTablesTool, FigureCatalog};
pub use generate_summary::GenerateSummaryTool;

/// Settings shared by the retrieval-backed tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    /// Short subject name interpolated into retrieval queries
    pub subject: String,
    /// Length cap, in characters, on extracted section text
    pub max_extract_chars: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            subject: "NAFLD".into(),
            max_extract_chars: 4000,
        }
    }
}

/// Create the registry of report tools.
///
/// Registration order is the order tools are advertised to the model.
pub fn default_registry(
    retrieval: Arc<dyn Retrieval>,
    assets: Arc<dyn AssetStore>,
    settings: ToolSettings,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ExtractExactTextTool::new(
        retrieval.clone(),
        settings.clone(),
    )));
    registry.register(Box::new(ExtractFiguresTablesTool::new(
        FigureCatalog::builtin(),
        assets,
    )));
    registry.register(Box::new(GenerateSummaryTool::new(retrieval, settings)));
    registry
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use dossier_core::error::RetrievalError;
    use dossier_core::knowledge::{Passage, Retrieval};
    use std::sync::Mutex;

    /// Canned retrieval that records the last query it saw.
    pub struct StubRetrieval {
        passages: Vec<Passage>,
        answer: String,
        fail: bool,
        last_query: Mutex<Option<String>>,
    }

    impl StubRetrieval {
        fn build(passages: Vec<Passage>, answer: &str, fail: bool) -> Self {
            Self {
                passages,
                answer: answer.to_string(),
                fail,
                last_query: Mutex::new(None),
            }
        }

        pub fn passages(passages: Vec<Passage>) -> Self {
            Self::build(passages, "", false)
        }

        pub fn answer(answer: &str) -> Self {
            Self::build(Vec::new(), answer, false)
        }

        pub fn failing() -> Self {
            Self::build(Vec::new(), "", true)
        }

        pub fn last_query(&self) -> Option<String> {
            self.last_query.lock().unwrap().clone()
        }

        fn record(&self, query: &str) -> Result<(), RetrievalError> {
            *self.last_query.lock().unwrap() = Some(query.to_string());
            if self.fail {
                return Err(RetrievalError::QueryFailed("index offline".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Retrieval for StubRetrieval {
        fn name(&self) -> &str {
            "stub"
        }

        async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, RetrievalError> {
            self.record(query)?;
            Ok(self.passages.clone())
        }

        async fn rag_answer(&self, query: &str) -> Result<String, RetrievalError> {
            self.record(query)?;
            Ok(self.answer.clone())
        }
    }
}
