// silver-core/src/error.rs

use crate::domain::entity::EntityKind;
use crate::domain::error::DomainError;
use crate::infrastructure::error::InfrastructureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SilverError {
    // --- ERREURS DU DOMAINE (parsing, règles, état du batch) ---
    #[error(transparent)]
    Domain(#[from] DomainError),

    // --- ERREURS D'INFRASTRUCTURE (IO, config, moteur SQL) ---
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    /// A read or replace against the warehouse failed.
    #[error("Storage error during '{operation}' on {table}: {source}")]
    Storage {
        table: String,
        operation: &'static str,
        source: InfrastructureError,
    },

    /// A quality check could not run at all (as opposed to finding violations).
    #[error("Quality check '{check}' could not execute: {source}")]
    ValidationExecution {
        check: String,
        source: InfrastructureError,
    },

    #[error("Batch aborted at entity '{entity}' during {step} [{code}]: {source}")]
    BatchAborted {
        entity: EntityKind,
        step: &'static str,
        code: &'static str,
        source: Box<SilverError>,
    },

    // --- ERREURS GÉNÉRIQUES / APPLICATIVES ---
    #[error("Unsafe path traversal detected: {0}")]
    UnsafePath(String),
}

impl SilverError {
    /// Stable machine-readable code, written to the run report.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Domain(e) => e.code(),
            Self::Infrastructure(e) => e.code(),
            Self::Storage { .. } => "storage_error",
            Self::ValidationExecution { .. } => "validation_execution_error",
            Self::BatchAborted { .. } => "batch_aborted",
            Self::UnsafePath(_) => "unsafe_path",
        }
    }

    pub fn storage(table: impl Into<String>, operation: &'static str, source: SilverError) -> Self {
        match source {
            Self::Infrastructure(source) => Self::Storage {
                table: table.into(),
                operation,
                source,
            },
            other => other,
        }
    }
}

// Manual implementation to avoid duplicate enum variant but keep ergonomics
impl From<std::io::Error> for SilverError {
    fn from(err: std::io::Error) -> Self {
        SilverError::Infrastructure(InfrastructureError::Io(err))
    }
}
