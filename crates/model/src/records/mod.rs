pub mod item;
pub mod row;
