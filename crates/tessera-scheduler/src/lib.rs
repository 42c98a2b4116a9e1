//! Run orchestration for Tessera.
//!
//! Admit once, fan out one worker per matrix cell, barrier-join, then hand
//! the terminal results to the coverage aggregator.

pub mod bus;
pub mod gate;
pub mod matrix;
pub mod orchestrator;

pub use bus::MemoryEventBus;
pub use gate::{ChangeEvent, ReadyState, TriggerGate};
pub use matrix::MatrixExpander;
pub use orchestrator::Orchestrator;
