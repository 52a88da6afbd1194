// silver-core/src/lib.rs

// 1. Mandatory documentation for production code
#![allow(missing_docs)] // On autorise le manque de doc pour le moment

// 2. Memory safety
#![deny(unsafe_code)]
// 3. Robustness
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
// 4. Performance
#![warn(clippy::perf)]

// --- MODULES HEXAGONAUX ---

// 1. Ports (Interfaces / Traits)
// Contrat de stockage (Connector) indépendant du moteur.
pub mod ports;

// 2. Domain (Cœur du métier)
// Entités, règles de nettoyage, évaluateur, contrôles qualité, état du batch.
// Ne dépend de RIEN d'autre (ni infra, ni app).
pub mod domain;

// 3. Infrastructure (Adapters)
// DuckDB, chargement de la configuration, écritures atomiques.
pub mod infrastructure;

// 4. Application (Use Cases)
// Provisionnement, ingestion, full refresh, qualité, nettoyage.
pub mod application;

// --- GESTION DES ERREURS GLOBALE ---
pub mod error;

// --- RE-EXPORTS (FACADE) ---
// Permet d'importer l'erreur principale facilement : use silver_core::SilverError;
pub use error::SilverError;
