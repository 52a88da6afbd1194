// silver-core/src/domain/mod.rs

pub mod batch;
pub mod entity;
pub mod error;
pub mod project;
pub mod quality;
pub mod rules;
pub mod schema;
pub mod transform;
pub mod value;

// Re-exports pratiques pour simplifier les imports ailleurs
pub use entity::EntityKind;
pub use error::DomainError;
pub use value::{Record, Value};
