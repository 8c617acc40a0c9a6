//! The calling service: request in, document out.

use dossier_config::AppConfig;
use dossier_core::document::ReportDocument;
use dossier_core::error::{Error, RetrievalError};
use dossier_core::event::EventBus;
use dossier_core::knowledge::{AssetStore, Retrieval};
use dossier_core::model::ModelClient;
use dossier_knowledge::{DocumentIndex, FsAssetStore, IndexSettings, RagPipeline};
use dossier_tools::{ToolSettings, default_registry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::assembler::{AssembledReport, assemble};
use crate::instruction::InstructionTemplate;
use crate::orchestrator::{LoopRun, Orchestrator};
use crate::render::render_markdown;

/// One finished request: the assembled report and the run behind it.
#[derive(Debug)]
pub struct ReportRun {
    pub report: AssembledReport,
    pub run: LoopRun,
}

/// Generates reports for free-text requests.
///
/// Built once at startup; every collaborator is immutable and shared, so
/// one service can serve concurrent requests.
pub struct ReportService {
    orchestrator: Orchestrator,
    template: InstructionTemplate,
    retrieval: Arc<dyn Retrieval>,
    assets: Arc<dyn AssetStore>,
    title: String,
}

impl ReportService {
    pub fn new(
        orchestrator: Orchestrator,
        template: InstructionTemplate,
        retrieval: Arc<dyn Retrieval>,
        assets: Arc<dyn AssetStore>,
    ) -> Self {
        Self {
            orchestrator,
            template,
            retrieval,
            assets,
            title: "Generated Report".into(),
        }
    }

    /// Heading used by [`ReportService::render_markdown`].
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Wire the whole service from configuration.
    ///
    /// Loads the document index from `knowledge.data_dir`; fails when the
    /// directory is missing or the provider is not configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let knowledge = &config.knowledge;
        let settings = IndexSettings {
            chunk_size: knowledge.chunk_size,
            chunk_overlap: knowledge.chunk_overlap,
            top_k: knowledge.top_k,
        };
        let index = Arc::new(DocumentIndex::load_dir(&knowledge.data_dir, settings)?);

        // Retrieval answers are plain completions; only the loop's client
        // advertises tools.
        let rag_model: Arc<dyn ModelClient> =
            Arc::new(dossier_providers::build_from_config(config, Vec::new())?);
        let retrieval: Arc<dyn Retrieval> = Arc::new(RagPipeline::new(index.clone(), rag_model));
        let assets: Arc<dyn AssetStore> = Arc::new(FsAssetStore::new(knowledge.data_dir.clone()));

        let registry = default_registry(
            retrieval.clone(),
            assets.clone(),
            ToolSettings {
                subject: config.report.subject.clone(),
                max_extract_chars: knowledge.max_extract_chars,
            },
        );
        let definitions = registry.definitions();
        let model: Arc<dyn ModelClient> = Arc::new(dossier_providers::build_from_config(
            config,
            definitions.clone(),
        )?);

        let orchestration = &config.orchestration;
        let orchestrator = Orchestrator::new(model, Arc::new(registry))
            .with_max_round_trips(orchestration.max_round_trips)
            .with_model_timeout(Duration::from_secs(orchestration.model_timeout_secs))
            .with_parallel_tools(orchestration.parallel_tools)
            .with_event_bus(Arc::new(EventBus::default()));

        let template = InstructionTemplate::new(
            config.report.subject.clone(),
            config.report.domain.clone(),
            definitions,
        );

        info!(
            documents = index.document_count(),
            chunks = index.len(),
            tools = orchestrator.tools().len(),
            "Report service ready"
        );

        Ok(Self::new(orchestrator, template, retrieval, assets).with_title(config.report.title.clone()))
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.orchestrator.event_bus()
    }

    /// Generate a report. Always yields a document with at least one section.
    pub async fn run_orchestration(&self, request: &str) -> ReportDocument {
        self.generate(request, &CancellationToken::new())
            .await
            .report
            .document
    }

    /// Generate a report, stopping early when `cancel` fires. The fallback
    /// document is still produced from whatever the run gathered.
    pub async fn generate(&self, request: &str, cancel: &CancellationToken) -> ReportRun {
        info!(request, "Generating report");
        let instruction = self.template.render(request);
        let run = self.orchestrator.run_with_cancel(instruction, cancel).await;
        let report = assemble(&run);
        ReportRun { report, run }
    }

    /// Render a document as Markdown under the configured title.
    pub fn render_markdown(&self, doc: &ReportDocument) -> String {
        render_markdown(doc, &self.title, self.assets.as_ref())
    }

    /// Answer a free-form question from the documents.
    pub async fn ask(&self, question: &str) -> Result<String, RetrievalError> {
        self.retrieval.rag_answer(question).await
    }
}
