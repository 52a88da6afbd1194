// silver-core/src/application/mod.rs

pub mod clean;
pub mod ingest;
pub mod load;
pub mod provision;
pub mod quality;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Cela permet au CLI de faire :
// `use silver_core::application::{run_batch, run_quality_suite, clean_project};`
// sans avoir à connaître la structure interne des fichiers.

pub use clean::clean_project;
pub use ingest::{IngestedSource, ingest_sources};
pub use load::{EntityLoad, run_batch};
pub use provision::provision_warehouse;
pub use quality::{project_suite, run_quality_suite};
