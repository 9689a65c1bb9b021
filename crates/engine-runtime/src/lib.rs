pub mod error;
pub mod execution;
pub mod validation;

#[cfg(test)]
mod tests;
