//! Retrieval-augmented summary of a topic.

use async_trait::async_trait;
use dossier_core::error::ToolError;
use dossier_core::knowledge::Retrieval;
use dossier_core::message::ToolArgs;
use dossier_core::tool::{ParamSpec, ReturnShape, Tool, ToolOutput};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ToolSettings;

pub struct GenerateSummaryTool {
    retrieval: Arc<dyn Retrieval>,
    settings: ToolSettings,
}

impl GenerateSummaryTool {
    pub fn new(retrieval: Arc<dyn Retrieval>, settings: ToolSettings) -> Self {
        Self {
            retrieval,
            settings,
        }
    }

    pub fn default_topic(&self) -> String {
        format!(
            "Overall Summary based on provided {} documents",
            self.settings.subject
        )
    }

    fn query(&self, topic: &str) -> String {
        format!(
            "Based ONLY on the provided context documents about {}, generate a concise, professional summary covering the key aspects of '{topic}'. If the topic is general, focus on prevalence, risk factors, progression, assessment, and key research findings mentioned.",
            self.settings.subject
        )
    }
}

#[async_trait]
impl Tool for GenerateSummaryTool {
    fn name(&self) -> &str {
        "generate_summary"
    }

    fn description(&self) -> &str {
        "Generate a concise summary grounded only in the document context. Use this only \
         when a 'Summary' section or a summary of a specific topic is requested."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::optional(
            "topic",
            "Topic to summarize",
            self.default_topic(),
        )]
    }

    fn returns(&self) -> ReturnShape {
        ReturnShape::Text
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let topic = args
            .get("topic")
            .filter(|t| !t.is_empty())
            .cloned()
            .unwrap_or_else(|| self.default_topic());

        match self.retrieval.rag_answer(&self.query(&topic)).await {
            Ok(summary) => {
                let summary = summary.trim();
                debug!(topic = %topic, chars = summary.len(), "Generated summary");
                if summary.is_empty() {
                    Ok(ToolOutput::Text(
                        "Summary could not be generated from the available context.".into(),
                    ))
                } else {
                    Ok(ToolOutput::Text(summary.to_string()))
                }
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "Summary generation failed");
                Ok(ToolOutput::Text(format!(
                    "Error generating summary for '{topic}': {e}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubRetrieval;

    fn tool(retrieval: Arc<StubRetrieval>) -> GenerateSummaryTool {
        GenerateSummaryTool::new(retrieval, ToolSettings::default())
    }

    async fn text(tool: &GenerateSummaryTool, args: ToolArgs) -> String {
        match tool.execute(&args).await.unwrap() {
            ToolOutput::Text(text) => text,
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn default_topic_is_declared() {
        let tool = tool(Arc::new(StubRetrieval::answer("x")));
        let params = tool.parameters();
        assert_eq!(
            params[0].default.as_deref(),
            Some("Overall Summary based on provided NAFLD documents")
        );
    }

    #[tokio::test]
    async fn summary_is_trimmed_answer() {
        let retrieval = Arc::new(StubRetrieval::answer("  NAFLD is common.  \n"));
        let tool = tool(retrieval.clone());
        let args = ToolArgs::from([("topic".to_string(), "Prevalence".to_string())]);

        assert_eq!(text(&tool, args).await, "NAFLD is common.");
        let query = retrieval.last_query().unwrap();
        assert!(query.starts_with("Based ONLY on the provided context documents about NAFLD"));
        assert!(query.contains("'Prevalence'"));
    }

    #[tokio::test]
    async fn missing_topic_uses_default() {
        let retrieval = Arc::new(StubRetrieval::answer("ok"));
        let tool = tool(retrieval.clone());
        text(&tool, ToolArgs::new()).await;
        assert!(retrieval
            .last_query()
            .unwrap()
            .contains("'Overall Summary based on provided NAFLD documents'"));
    }

    #[tokio::test]
    async fn empty_answer_has_placeholder() {
        let tool = tool(Arc::new(StubRetrieval::answer("   ")));
        assert_eq!(
            text(&tool, ToolArgs::new()).await,
            "Summary could not be generated from the available context."
        );
    }

    #[tokio::test]
    async fn failure_becomes_text() {
        let tool = tool(Arc::new(StubRetrieval::failing()));
        let args = ToolArgs::from([("topic".to_string(), "Risk".to_string())]);
        assert!(text(&tool, args).await.starts_with("Error generating summary for 'Risk':"));
    }
}
