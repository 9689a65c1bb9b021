//! In-process source and target used by tests and dry runs.

pub mod source;
pub mod target;
