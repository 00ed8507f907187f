//! Infrastructure layer - concrete implementations of the application ports

pub mod auth;
pub mod http;
pub mod openapi;
pub mod shell;

pub use auth::build_security_checks;
pub use openapi::FileSpecLoader;
pub use shell::ShellCommandExecutor;
