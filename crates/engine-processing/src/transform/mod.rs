use crate::error::TransformError;
use model::records::{item::Item, row::RowsByTable};

pub mod index;
pub mod mapping;
pub mod template;

/// Turns the materialized rows of one group into target items.
///
/// Implementations must derive keys deterministically: running the same rows
/// through the transform twice has to yield the same `(pk, sk)` pairs.
pub trait Transform: Send + Sync {
    fn apply(&self, rows: &RowsByTable) -> Result<Vec<Item>, TransformError>;
}

impl<F> Transform for F
where
    F: Fn(&RowsByTable) -> Result<Vec<Item>, TransformError> + Send + Sync,
{
    fn apply(&self, rows: &RowsByTable) -> Result<Vec<Item>, TransformError> {
        self(rows)
    }
}
