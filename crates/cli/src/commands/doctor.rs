//! `dossier doctor`: Diagnose system health.

use dossier_config::AppConfig;
use dossier_core::model::ModelClient;
use dossier_knowledge::{DocumentIndex, IndexSettings};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Dossier Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file — using defaults (run `dossier onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Fix the config file and re-run doctor.");
            return Ok(());
        }
    };

    // Documents
    let knowledge = &config.knowledge;
    let settings = IndexSettings {
        chunk_size: knowledge.chunk_size,
        chunk_overlap: knowledge.chunk_overlap,
        top_k: knowledge.top_k,
    };
    match DocumentIndex::load_dir(&knowledge.data_dir, settings) {
        Ok(index) if index.is_empty() => {
            println!(
                "  ⚠️  No .txt or .md documents in {}",
                knowledge.data_dir.display()
            );
            issues += 1;
        }
        Ok(index) => println!(
            "  ✅ Indexed {} document(s), {} chunk(s) from {}",
            index.document_count(),
            index.len(),
            knowledge.data_dir.display()
        ),
        Err(e) => {
            println!("  ❌ Data directory unusable: {e}");
            issues += 1;
        }
    }

    // Backend
    match dossier_providers::build_from_config(&config, Vec::new()) {
        Ok(client) => match client.health_check().await {
            Ok(true) => println!(
                "  ✅ Backend '{}' reachable at {} (model {})",
                client.name(),
                client.base_url(),
                client.model()
            ),
            Ok(false) => {
                println!("  ⚠️  Backend '{}' answered but reported unhealthy", client.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Backend '{}' unreachable: {e}", client.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Backend not configured: {e}");
            issues += 1;
        }
    }

    // Output directory
    let output_dir = &config.report.output_dir;
    if output_dir.is_dir() {
        println!("  ✅ Output directory exists: {}", output_dir.display());
    } else {
        println!("  ℹ️  Output directory {} will be created on first report", output_dir.display());
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
