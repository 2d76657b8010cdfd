//! practica-store — Persistence backends for practica.
//!
//! Both backends implement the `QuestionRepository` and `SessionStore`
//! traits from `practica-core`: `SqliteStore` for real deployments and the
//! CLI, `MemoryStore` for tests and embedding.

pub mod error;
pub mod memory;
pub mod sqlite;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::{ImportSummary, SqliteStore};
