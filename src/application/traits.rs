//! Port interfaces for the application layer

use async_trait::async_trait;

use crate::core::{CommandOutput, GatewayRequest, Result};
use crate::openapi::ServiceSpec;

/// Runs rendered command lines
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs `command`, writing `stdin` to the child's standard input.
    ///
    /// A non-zero exit status is a successful execution; only failures to run
    /// the command at all are errors.
    async fn execute(&self, command: &str, stdin: Option<Vec<u8>>) -> Result<CommandOutput>;
}

/// Verifies the credentials of a request for one security scheme
#[async_trait]
pub trait AuthCheck: Send + Sync {
    /// Fails with [`Error::Auth`](crate::core::Error::Auth) carrying the
    /// rejection reason
    async fn check(&self, request: &GatewayRequest) -> Result<()>;
}

/// Loads service descriptions
#[async_trait]
pub trait SpecLoader: Send + Sync {
    async fn load(&self, source: &str) -> Result<ServiceSpec>;
}
