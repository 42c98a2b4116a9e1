//! Tessera Core
//!
//! Core domain types, traits, and error handling for Tessera.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used across all other crates.

pub mod cache;
pub mod cell;
pub mod error;
pub mod events;
pub mod ids;
pub mod job;
pub mod pipeline;
pub mod ports;

pub use error::{Error, Result};
pub use ids::*;
