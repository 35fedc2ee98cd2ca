//! # Student Import Testing Utils
//!
//! Shared test doubles for the import orchestrator workspace: in-memory
//! repositories, a scripted importer factory, recording alert and maintenance
//! doubles, and builders for district configuration.
//!
//! ```toml
//! [dev-dependencies]
//! student-import-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
