//! API key check (`type: apiKey`)

use async_trait::async_trait;

use super::connectors::CredentialStore;
use crate::application::AuthCheck;
use crate::core::{Error, GatewayRequest, Result};

/// Where the key is carried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLocation {
    Header,
    Query,
    Cookie,
}

impl KeyLocation {
    pub fn parse(location: &str) -> Result<Self> {
        match location {
            "header" => Ok(Self::Header),
            "query" => Ok(Self::Query),
            "cookie" => Ok(Self::Cookie),
            other => Err(Error::config(format!("Unsupported API key location '{other}'"))),
        }
    }
}

/// Accepts requests whose key has a record in the store
pub struct ApiKeyCheck {
    location: KeyLocation,
    name: String,
    store: Box<dyn CredentialStore>,
}

impl ApiKeyCheck {
    pub fn new(location: KeyLocation, name: impl Into<String>, store: Box<dyn CredentialStore>) -> Self {
        Self {
            location,
            name: name.into(),
            store,
        }
    }

    fn key<'r>(&self, request: &'r GatewayRequest) -> Option<&'r str> {
        match self.location {
            KeyLocation::Header => request.header(&self.name),
            KeyLocation::Query => request.query.get(&self.name).map(String::as_str),
            KeyLocation::Cookie => request.cookie(&self.name),
        }
    }
}

#[async_trait]
impl AuthCheck for ApiKeyCheck {
    async fn check(&self, request: &GatewayRequest) -> Result<()> {
        let key = match self.key(request) {
            Some(key) if !key.is_empty() => key,
            _ => return Err(Error::auth("Unauthorized (missing API Key)")),
        };
        match self.store.get(key) {
            Some(_) => Ok(()),
            None => Err(Error::auth("Unauthorized (invalid API Key)")),
        }
    }
}
