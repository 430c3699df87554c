#![forbid(unsafe_code)]

//! Streaming artifact parser and action runner.
//!
//! Turns cumulative model output into narrative text plus `<boltArtifact>`
//! / `<boltAction>` events, and executes the actions against a workspace
//! in order while honoring file locks.

pub mod config;
pub mod errors;
pub mod locks;
pub mod models;
pub mod parser;
pub mod runner;
pub mod session;
pub mod workspace;

pub use config::RuntimeConfig;
pub use errors::{AppError, Result};
