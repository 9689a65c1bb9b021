pub mod metadata;
pub mod source;
