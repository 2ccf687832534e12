//! Error types for evaluation, scheduling and dispatch

use thiserror::Error;

use crate::world::EntityId;

/// Failure of one evaluation cycle. Never fatal: the cycle yields no outcome.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("entity {0} has a non-finite position or velocity")]
    NonFiniteEntity(EntityId),

    #[error("actor has a non-finite position")]
    NonFiniteActor,

    #[error("evaluation job panicked: {0}")]
    Panicked(String),
}

/// Failure to emit a network action
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("transport rejected {action}: {reason}")]
    Rejected { action: &'static str, reason: String },

    #[error("transport channel closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("evaluation scheduler requires a tokio runtime")]
    NoRuntime(#[source] tokio::runtime::TryCurrentError),
}
