//! Application layer - orchestrates the gateway use case over its ports

pub mod gateway;
pub mod traits;

pub use gateway::Gateway;
pub use traits::*;
