pub mod writer;

pub use writer::{BatchWriter, WriteOutcome};
