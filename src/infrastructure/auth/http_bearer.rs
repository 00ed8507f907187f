//! HTTP bearer token check (`type: http`, `scheme: bearer`)

use async_trait::async_trait;

use super::connectors::CredentialStore;
use crate::application::AuthCheck;
use crate::core::{Error, GatewayRequest, RequestBody, Result};

const ACCESS_TOKEN: &str = "access_token";

/// Extracts the bearer token of a request.
///
/// The `Authorization` header is overridden by an `access_token` form field,
/// which in turn is overridden by an `access_token` query parameter.
pub fn bearer_token(request: &GatewayRequest) -> Option<String> {
    let mut token = request.header("authorization").map(str::to_string);
    if let RequestBody::Form(fields) = &request.body {
        if let Some(field) = fields.get(ACCESS_TOKEN) {
            token = Some(field.clone());
        }
    }
    if let Some(query) = request.query.get(ACCESS_TOKEN) {
        token = Some(query.clone());
    }
    token
        .map(|token| match token.strip_prefix("Bearer ") {
            Some(stripped) => stripped.to_string(),
            None => token,
        })
        .filter(|token| !token.is_empty())
}

/// Accepts requests whose token has a record in the store
pub struct HttpBearerCheck {
    store: Box<dyn CredentialStore>,
}

impl HttpBearerCheck {
    pub fn new(store: Box<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuthCheck for HttpBearerCheck {
    async fn check(&self, request: &GatewayRequest) -> Result<()> {
        let token =
            bearer_token(request).ok_or_else(|| Error::auth("Unauthorized (missing Bearer token)"))?;
        match self.store.get(&token) {
            Some(_) => Ok(()),
            None => Err(Error::auth("Unauthorized (invalid Bearer token)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HttpMethod;
    use crate::infrastructure::auth::connectors::CredentialRecord;

    struct OneToken;

    impl CredentialStore for OneToken {
        fn get(&self, id: &str) -> Option<CredentialRecord> {
            (id == "t0k3n").then(CredentialRecord::new)
        }
    }

    fn request() -> GatewayRequest {
        GatewayRequest::new(HttpMethod::Post, "/api/items")
    }

    #[test]
    fn test_token_precedence() {
        let header = request().with_header("Authorization", "Bearer from-header");
        assert_eq!(bearer_token(&header).as_deref(), Some("from-header"));

        let form = header
            .clone()
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_raw_body(b"access_token=from-form");
        assert_eq!(bearer_token(&form).as_deref(), Some("from-form"));

        let query = form.with_query("access_token", "from-query");
        assert_eq!(bearer_token(&query).as_deref(), Some("from-query"));

        assert_eq!(bearer_token(&request()), None);
    }

    #[tokio::test]
    async fn test_bearer_check() {
        let check = HttpBearerCheck::new(Box::new(OneToken));

        let ok = request().with_header("Authorization", "Bearer t0k3n");
        assert!(check.check(&ok).await.is_ok());

        let err = check.check(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized (missing Bearer token)");

        let invalid = request().with_query("access_token", "nope");
        let err = check.check(&invalid).await.unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized (invalid Bearer token)");
    }
}
