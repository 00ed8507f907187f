pub mod error;
pub mod exchange;
pub mod media_type;
pub mod utils;

pub use error::{Error, Result};
pub use exchange::{CommandOutput, GatewayRequest, GatewayResponse, HttpMethod, RequestBody};
