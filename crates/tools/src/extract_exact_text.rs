//! Section text extraction through the retrieval collaborator.

use async_trait::async_trait;
use dossier_core::error::ToolError;
use dossier_core::knowledge::Retrieval;
use dossier_core::message::ToolArgs;
use dossier_core::tool::{ParamSpec, ReturnShape, Tool, ToolOutput};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ToolSettings;

pub struct ExtractExactTextTool {
    retrieval: Arc<dyn Retrieval>,
    settings: ToolSettings,
}

impl ExtractExactTextTool {
    pub fn new(retrieval: Arc<dyn Retrieval>, settings: ToolSettings) -> Self {
        Self {
            retrieval,
            settings,
        }
    }

    fn query(&self, section_title: &str) -> String {
        format!(
            "Retrieve the full text content found under the section titled or closely related to '{section_title}' in the {} documents.",
            self.settings.subject
        )
    }
}

#[async_trait]
impl Tool for ExtractExactTextTool {
    fn name(&self) -> &str {
        "extract_exact_text"
    }

    fn description(&self) -> &str {
        "Extract verbatim text for a document section such as 'Introduction', 'Epidemiology', \
         'Risk Factors', 'Assessment', 'Natural History', 'Definitions', 'Prevalence', \
         'Incidence' or 'Conclusion'. Provide the exact section title found in the documents."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "section_title",
            "Title of the document section to extract",
        )]
    }

    fn returns(&self) -> ReturnShape {
        ReturnShape::Text
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let section_title = args
            .get("section_title")
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'section_title' argument".into()))?;

        let passages = match self.retrieval.retrieve(&self.query(section_title)).await {
            Ok(passages) => passages,
            Err(e) => {
                warn!(section = %section_title, error = %e, "Section extraction failed");
                return Ok(ToolOutput::Text(format!(
                    "Error extracting text for section '{section_title}': {e}"
                )));
            }
        };

        let combined = passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        if combined.is_empty() {
            return Ok(ToolOutput::Text(format!(
                "No specific content found for section '{section_title}'. Verify the section title exists in the documents."
            )));
        }

        debug!(section = %section_title, chars = combined.chars().count(), "Extracted section text");
        Ok(ToolOutput::Text(
            combined.chars().take(self.settings.max_extract_chars).collect(),
        ))
    }
}
