//! practica-core — Test assembly engine, session lifecycle and scoring.
//!
//! This crate defines the scope catalog and session model, the weighted
//! allocation planner, the history-aware sampler, official exam replicas,
//! and the storage traits the rest of practica builds on.

pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod planner;
pub mod replica;
pub mod sampler;
pub mod scoring;
pub mod session;
pub mod traits;

pub use error::EngineError;
