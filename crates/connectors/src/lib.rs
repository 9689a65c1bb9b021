pub mod error;
pub mod kv;
pub mod memory;
pub mod source;
pub mod sql;
pub mod target;
