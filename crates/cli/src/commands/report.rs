//! `dossier report`: Generate a structured report.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use dossier_agent::{AssemblyPath, ReportService};
use dossier_config::AppConfig;
use dossier_core::document::ReportDocument;
use dossier_core::event::DomainEvent;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Markdown,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

pub async fn run(
    request: &str,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let service = ReportService::from_config(&config)?;

    // Progress goes to the debug log.
    let mut events = service.events().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.as_ref() {
                DomainEvent::RoundTripCompleted {
                    round,
                    tool_requests,
                    ..
                } => debug!(round, tool_requests, "Round-trip completed"),
                DomainEvent::ToolExecuted {
                    tool_name,
                    success,
                    duration_ms,
                    ..
                } => debug!(tool = %tool_name, success, duration_ms, "Tool executed"),
                _ => {}
            }
        }
    });

    // Ctrl+C stops the loop; whatever was gathered is still written.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with the content gathered so far");
            on_signal.cancel();
        }
    });

    let finished = service.generate(request, &cancel).await;
    if let AssemblyPath::Fallback { cause } = &finished.report.path {
        eprintln!("  ⚠️  Report reconstructed from tool results ({cause})");
    }

    let document = &finished.report.document;
    let body = render(&service, document, format)?;
    let path = output.unwrap_or_else(|| default_output_path(&config.report.output_dir, format, Utc::now()));
    write_report(&path, &body)?;

    info!(
        path = %path.display(),
        sections = document.len(),
        round_trips = finished.run.round_trips,
        "Report written"
    );
    println!("{}", path.display());
    Ok(())
}

fn render(
    service: &ReportService,
    document: &ReportDocument,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Markdown => Ok(service.render_markdown(document)),
        OutputFormat::Json => serde_json::to_string_pretty(document),
    }
}

/// `<dir>/report_<UTC timestamp>.<ext>`
fn default_output_path(dir: &Path, format: OutputFormat, now: DateTime<Utc>) -> PathBuf {
    dir.join(format!(
        "report_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    ))
}

fn write_report(path: &Path, body: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, body)
}
