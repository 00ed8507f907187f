//! # clapi
//!
//! Exposes command-line tools as HTTP operations. An OpenAPI 3.0 or
//! Swagger 2.0 document describes the operations; its `x-cli` extensions say
//! which command to run for each one, how request parameters are substituted
//! into the command line and how the command's output becomes the response.
//!
//! ## Architecture
//!
//! - [`core`](crate::core): error type, request/response views and shared utilities
//! - [`openapi`]: dialect-neutral view of the service description
//! - [`engine`]: transforms, parameter extraction, templating and response mapping
//! - [`application`]: ports and the [`Gateway`](application::Gateway) use case
//! - [`infrastructure`]: document loader, shell executor, security checks and
//!   the axum transport

#![deny(unsafe_code)]

pub mod application;
pub mod core;
pub mod engine;
pub mod infrastructure;
pub mod openapi;

pub use application::Gateway;
pub use crate::core::{Error, Result};
pub use openapi::ServiceSpec;
