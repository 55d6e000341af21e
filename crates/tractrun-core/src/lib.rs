//! `tractrun` Core Library
//!
//! Shared functionality for the tractrun dispatcher:
//! - Batch-file line tokenization with quote handling
//! - Subject specification model
//! - VEP parcellation lookup-table generation
//! - Configuration resolution and defaults
//! - Common error types

pub mod config;
pub mod error;
pub mod lut;
pub mod spec;
pub mod tokenize;
pub mod tracing_init;

pub use config::{Config, SlurmConfig};
pub use error::{Error, Result};
pub use spec::SubjectSpec;
