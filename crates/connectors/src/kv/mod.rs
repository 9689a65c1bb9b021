pub mod sled;
