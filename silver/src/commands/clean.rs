// silver/src/commands/clean.rs
//
// USE CASE: Clean build artifacts.

use std::path::Path;

use silver_core::application::clean_project;

pub fn execute(project_dir: &Path) -> anyhow::Result<()> {
    let config = super::load_config(project_dir)?;
    match clean_project(project_dir, &config) {
        Ok(removed) => {
            for path in &removed {
                println!("   🗑️  Artifact removed: {}", path);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Clean failed: {}", e);
            std::process::exit(1);
        }
    }
}
