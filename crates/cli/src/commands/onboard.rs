//! `dossier onboard`: First-time setup.

use dossier_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("📚 Dossier — First-Time Setup");
    println!("=============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());

    let defaults = AppConfig::default();
    println!("\n📝 Next steps:");
    println!(
        "   1. Put your documents and figures in {} (or set knowledge.data_dir)",
        defaults.knowledge.data_dir.display()
    );
    println!(
        "   2. Pick a backend: the default is {} with {}",
        defaults.default_provider, defaults.default_model
    );
    println!("   3. Run: dossier doctor");
    println!("   4. Run: dossier report --request \"generate a report on {}\"\n", defaults.report.subject);

    Ok(())
}
