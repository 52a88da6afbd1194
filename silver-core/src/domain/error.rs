// silver-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::entity::EntityKind;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Malformed '{entity}' record (key: {}): {reason}", .key.as_deref().unwrap_or("unknown"))]
    #[diagnostic(
        code(silver::domain::entity_parse),
        help("The bronze extent does not match the expected raw layout. Re-ingest the source.")
    )]
    EntityParse {
        entity: EntityKind,
        key: Option<String>,
        reason: String,
    },

    #[error("Rule '{step}' failed for '{entity}': {reason}")]
    #[diagnostic(
        code(silver::domain::rule_evaluation),
        help("Check the rule set declared for this entity (config/rules.yml).")
    )]
    RuleEvaluation {
        entity: EntityKind,
        step: String,
        reason: String,
    },

    #[error("Unknown entity type: {0}")]
    #[diagnostic(code(silver::domain::unknown_entity))]
    UnknownEntity(String),

    #[error("Illegal batch transition from {from} to {to}")]
    #[diagnostic(code(silver::domain::batch_state))]
    InvalidTransition { from: String, to: String },
}

impl DomainError {
    pub fn rule(entity: EntityKind, step: &str, reason: impl Into<String>) -> Self {
        Self::RuleEvaluation {
            entity,
            step: step.to_string(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::EntityParse { .. } => "entity_parse_error",
            Self::RuleEvaluation { .. } => "rule_evaluation_error",
            Self::UnknownEntity(_) => "unknown_entity",
            Self::InvalidTransition { .. } => "invalid_batch_transition",
        }
    }
}
