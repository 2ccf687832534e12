//! Evaluation, scheduling and decision modules

pub mod combat;
pub mod engine;
pub mod evaluator;
pub mod feed;
pub mod latency;
pub mod physics;
pub mod rotation;
pub mod scheduler;
pub mod tracker;

pub use engine::{DecisionEngine, Dispatch, Phase, TickReport};
pub use evaluator::{evaluate, DamageResult, EvaluationJob, EvaluationOutcome};
pub use physics::{BlastOptions, BlastPhysics};
pub use scheduler::EvaluationScheduler;
