//! tractrun CLI library.
//!
//! Split from the binary so the dispatch loop and submission backends
//! are unit-testable.

pub mod dispatch;
pub mod submit;
