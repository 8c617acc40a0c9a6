//! Retrieval-augmented answering over a [`DocumentIndex`].

use async_trait::async_trait;
use dossier_core::error::RetrievalError;
use dossier_core::knowledge::{Passage, Retrieval};
use dossier_core::message::{ModelTurn, Transcript};
use dossier_core::model::ModelClient;
use std::sync::Arc;
use tracing::debug;

use crate::index::DocumentIndex;

/// Retrieval collaborator backed by a document index and a model client.
///
/// The model client used here should advertise no tools: the answer is a
/// single plain completion over the retrieved context.
pub struct RagPipeline {
    index: Arc<DocumentIndex>,
    model: Arc<dyn ModelClient>,
}

impl RagPipeline {
    pub fn new(index: Arc<DocumentIndex>, model: Arc<dyn ModelClient>) -> Self {
        Self { index, model }
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    /// The prompt sent to the model for `question` over `passages`.
    pub fn prompt(question: &str, passages: &[Passage]) -> String {
        let context = passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        format!(
            "Answer the question based only on the following context:\n{context}\n---\nAnswer the question based on the above context: {question}"
        )
    }

    fn ensure_ready(&self) -> Result<(), RetrievalError> {
        if self.index.is_empty() {
            return Err(RetrievalError::NotReady(
                "no documents have been indexed".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Retrieval for RagPipeline {
    fn name(&self) -> &str {
        "document_index"
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, RetrievalError> {
        self.ensure_ready()?;
        let passages = self.index.search(query);
        debug!(query, hits = passages.len(), "Retrieved passages");
        Ok(passages)
    }

    async fn rag_answer(&self, query: &str) -> Result<String, RetrievalError> {
        let passages = self.retrieve(query).await?;
        let transcript = Transcript::new(Self::prompt(query, &passages));

        match self.model.send(&transcript).await {
            Ok(ModelTurn::Answer { text }) => Ok(text.trim().to_string()),
            Ok(ModelTurn::ToolRequests { .. }) => Err(RetrievalError::Generation(
                "model requested tools instead of answering".into(),
            )),
            Err(e) => Err(RetrievalError::Generation(e.to_string())),
        }
    }
}
