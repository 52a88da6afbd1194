// silver-core/src/domain/batch.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::domain::entity::EntityKind;
use crate::domain::error::DomainError;

/// Lifecycle of one full-refresh run.
///
/// `NotStarted → Running(e1) → Running(e2) … → Completed`, with `Aborted(e)`
/// reachable from `Running(e)`. `Aborted` and `Completed` are terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchState {
    NotStarted,
    Running {
        entity: EntityKind,
    },
    Aborted {
        entity: EntityKind,
        step: String,
        code: String,
        cause: String,
    },
    Completed,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Aborted { .. } | Self::Completed)
    }

    pub fn can_transition_to(&self, next: &BatchState) -> bool {
        match (self, next) {
            (Self::NotStarted, Self::Running { .. }) | (Self::NotStarted, Self::Completed) => true,
            (Self::Running { entity: a }, Self::Running { entity: b }) => a != b,
            (Self::Running { entity: a }, Self::Aborted { entity: b, .. }) => a == b,
            (Self::Running { .. }, Self::Completed) => true,
            _ => false,
        }
    }

    fn label(&self) -> String {
        match self {
            Self::NotStarted => "not_started".to_string(),
            Self::Running { entity } => format!("running({})", entity),
            Self::Aborted { entity, .. } => format!("aborted({})", entity),
            Self::Completed => "completed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
}

/// Wall-clock record of one entity step.
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub entity: EntityKind,
    pub table: String,
    pub status: StepStatus,
    pub rows_read: usize,
    pub rows_written: usize,
    pub duration_ms: u128,
}

/// Explicit per-run state, threaded through the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct BatchContext {
    pub batch_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub plan: Vec<EntityKind>,
    pub state: BatchState,
    pub steps: Vec<StepTiming>,
    pub total_duration_ms: u128,
    #[serde(skip)]
    clock: Instant,
}

impl BatchContext {
    pub fn new(plan: Vec<EntityKind>) -> Self {
        let started_at = Utc::now();
        Self {
            batch_id: format!("batch-{}", started_at.format("%Y%m%dT%H%M%S%.3fZ")),
            started_at,
            finished_at: None,
            plan,
            state: BatchState::NotStarted,
            steps: Vec::new(),
            total_duration_ms: 0,
            clock: Instant::now(),
        }
    }

    fn transition(&mut self, next: BatchState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(&next) {
            return Err(DomainError::InvalidTransition {
                from: self.state.label(),
                to: next.label(),
            });
        }
        self.state = next;
        if self.state.is_terminal() {
            self.finished_at = Some(Utc::now());
            self.total_duration_ms = self.clock.elapsed().as_millis();
        }
        Ok(())
    }

    /// Entities are started strictly in plan order.
    pub fn begin(&mut self, entity: EntityKind) -> Result<(), DomainError> {
        let expected = self.plan.get(self.steps.len()).copied();
        if expected != Some(entity) {
            return Err(DomainError::InvalidTransition {
                from: self.state.label(),
                to: format!("running({}) out of plan order", entity),
            });
        }
        self.transition(BatchState::Running { entity })
    }

    pub fn record_success(
        &mut self,
        entity: EntityKind,
        rows_read: usize,
        rows_written: usize,
        duration: Duration,
    ) {
        self.steps.push(StepTiming {
            entity,
            table: entity.table_name().to_string(),
            status: StepStatus::Success,
            rows_read,
            rows_written,
            duration_ms: duration.as_millis(),
        });
    }

    pub fn abort(
        &mut self,
        entity: EntityKind,
        step: &str,
        code: &str,
        cause: String,
        duration: Duration,
    ) -> Result<(), DomainError> {
        self.steps.push(StepTiming {
            entity,
            table: entity.table_name().to_string(),
            status: StepStatus::Failed,
            rows_read: 0,
            rows_written: 0,
            duration_ms: duration.as_millis(),
        });
        self.transition(BatchState::Aborted {
            entity,
            step: step.to_string(),
            code: code.to_string(),
            cause,
        })
    }

    /// Completes the batch once every planned entity has succeeded.
    pub fn complete(&mut self) -> Result<(), DomainError> {
        if self.steps.len() != self.plan.len() {
            return Err(DomainError::InvalidTransition {
                from: self.state.label(),
                to: format!("completed with {}/{} entities", self.steps.len(), self.plan.len()),
            });
        }
        self.transition(BatchState::Completed)
    }

    pub fn rows_written(&self) -> usize {
        self.steps.iter().map(|s| s.rows_written).sum()
    }

    pub fn succeeded(&self) -> bool {
        self.state == BatchState::Completed
    }
}
