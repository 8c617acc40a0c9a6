//! `dossier ask`: Answer a question from the document collection.

use dossier_agent::ReportService;
use dossier_config::AppConfig;

pub async fn run(question: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let service = ReportService::from_config(&config)?;

    eprint!("  Thinking...");
    let answer = service.ask(question).await;
    eprint!("\r              \r");

    println!("{}", answer?);
    Ok(())
}
