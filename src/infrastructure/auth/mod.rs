//! Security checks built from the declared security schemes

pub mod api_key;
pub mod connectors;
pub mod http_basic;
pub mod http_bearer;

use std::collections::HashMap;
use std::sync::Arc;

use crate::application::AuthCheck;
use crate::core::{Error, Result};
use crate::openapi::{SecurityScheme, ServiceSpec};

pub use api_key::{ApiKeyCheck, KeyLocation};
pub use connectors::{CredentialRecord, CredentialStore, CsvConnector};
pub use http_basic::HttpBasicCheck;
pub use http_bearer::HttpBearerCheck;

/// Builds the check of one security scheme, keyed by its type and scheme
pub fn build_check(scheme: &SecurityScheme) -> Result<Arc<dyn AuthCheck>> {
    let connector = scheme.connector.as_ref().ok_or_else(|| {
        Error::config(format!(
            "Security scheme '{}' has no x-connector configuration",
            scheme.name
        ))
    })?;

    let check: Arc<dyn AuthCheck> = match (scheme.kind.as_str(), scheme.scheme.as_deref()) {
        ("apiKey", _) => {
            let location = KeyLocation::parse(scheme.location.as_deref().unwrap_or_default())?;
            let name = scheme.parameter_name.as_deref().ok_or_else(|| {
                Error::config(format!("API key scheme '{}' has no name", scheme.name))
            })?;
            Arc::new(ApiKeyCheck::new(location, name, connectors::open(connector)?))
        }
        ("http", Some("basic")) => Arc::new(HttpBasicCheck::new(connectors::open(connector)?)),
        ("http", Some("bearer")) => Arc::new(HttpBearerCheck::new(connectors::open(connector)?)),
        (kind, scheme_name) => {
            return Err(Error::config(format!(
                "Unsupported security scheme '{}' (type {kind}, scheme {})",
                scheme.name,
                scheme_name.unwrap_or("none")
            )));
        }
    };
    Ok(check)
}

/// Builds a check for every security scheme an operation enforces
pub fn build_security_checks(spec: &ServiceSpec) -> Result<HashMap<String, Arc<dyn AuthCheck>>> {
    let mut checks: HashMap<String, Arc<dyn AuthCheck>> = HashMap::new();
    for operation in spec.operations() {
        let Some(name) = spec.operation_securities(operation).into_iter().next() else {
            continue;
        };
        if checks.contains_key(&name) {
            continue;
        }
        let scheme = spec.security_scheme(&name).ok_or_else(|| {
            Error::config(format!("Security scheme '{name}' is not declared"))
        })?;
        tracing::debug!("Enabling security scheme '{name}' ({})", scheme.kind);
        checks.insert(name, build_check(scheme)?);
    }
    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn keys_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "key,owner\nsecret,hans").expect("Failed to write temp file");
        file
    }

    fn spec(scheme: serde_json::Value) -> ServiceSpec {
        ServiceSpec::from_document(json!({
            "openapi": "3.0.0",
            "servers": [{"url": "/", "variables": {"basePath": {"default": ""}}}],
            "security": [{"main": []}],
            "components": {"securitySchemes": {"main": scheme, "unused": {"type": "oauth2"}}},
            "paths": {"/items": {"get": {"x-cli": {"command": "ls"}}}}
        }))
        .unwrap()
    }

    #[test]
    fn test_builds_checks_for_enforced_schemes() {
        let file = keys_file();
        let spec = spec(json!({
            "type": "apiKey",
            "in": "header",
            "name": "X-Key",
            "x-connector": {"type": "csv", "source": file.path(), "index": "key"}
        }));

        let checks = build_security_checks(&spec).unwrap();
        assert_eq!(checks.len(), 1);
        assert!(checks.contains_key("main"));
    }

    #[test]
    fn test_unsupported_scheme() {
        let file = keys_file();
        let spec = spec(json!({
            "type": "http",
            "scheme": "digest",
            "x-connector": {"type": "csv", "source": file.path(), "index": "key"}
        }));

        let err = build_security_checks(&spec).err().unwrap();
        assert!(err.to_string().contains("Unsupported security scheme 'main'"));
    }

    #[test]
    fn test_missing_connector() {
        let spec = spec(json!({"type": "http", "scheme": "bearer"}));

        let err = build_security_checks(&spec).err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("no x-connector"));
    }

    #[test]
    fn test_missing_credential_file() {
        let spec = spec(json!({
            "type": "http",
            "scheme": "basic",
            "x-connector": {"type": "csv", "source": "/nonexistent/users.csv", "index": "user"}
        }));

        assert!(build_security_checks(&spec).is_err());
    }
}
