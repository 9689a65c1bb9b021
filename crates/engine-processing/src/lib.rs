pub mod consumer;
pub mod error;
pub mod provisioning;
pub mod retry;
pub mod transform;
