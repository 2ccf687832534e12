//! Detonation engine - asynchronous target evaluation and action sequencing
//! for area-damage combat automation
//!
//! The per-tick driver is [`game::DecisionEngine`]. It captures a
//! [`world::WorldSnapshot`] from a [`world::WorldView`], evaluates it on a
//! blocking worker through [`game::EvaluationScheduler`], and hands the chosen
//! actions to a [`net::ActionSink`].

pub mod config;
pub mod error;
pub mod game;
pub mod net;
pub mod sandbox;
pub mod util;
pub mod world;

pub use config::{Config, EngineSettings};
pub use game::{DecisionEngine, Dispatch, TickReport};
