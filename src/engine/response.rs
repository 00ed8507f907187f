//! Maps a finished command execution onto an HTTP response

use indexmap::IndexMap;
use std::path::Path;

use crate::core::media_type;
use crate::core::{CommandOutput, Error, GatewayResponse, Result};
use crate::engine::environment::{ParamValue, ParameterEnvironment};
use crate::engine::template::TemplateResolver;
use crate::engine::transform::{Transform, TransformRegistry};
use crate::openapi::ResponseSpec;

/// The response chosen for an exit code
#[derive(Debug, Clone, Copy)]
pub struct SelectedResponse<'a> {
    pub status: u16,
    /// `None` when neither a binding nor a fallback entry is declared
    pub spec: Option<&'a ResponseSpec>,
}

/// Selects the response for a process exit code.
///
/// A response whose `x-code` equals the exit code wins. Otherwise exit code
/// 0 falls back to the `200` entry and every other code to the `500` entry.
///
/// # Examples
/// ```
/// use clapi::engine::response::select;
/// use indexmap::IndexMap;
///
/// let responses = IndexMap::new();
/// let selected = select(&responses, 3);
/// assert_eq!(selected.status, 500);
/// assert!(selected.spec.is_none());
/// ```
pub fn select(responses: &IndexMap<String, ResponseSpec>, exit_code: i32) -> SelectedResponse<'_> {
    let fallback = if exit_code == 0 { 200 } else { 500 };

    if let Some((status, spec)) = responses
        .iter()
        .find(|(_, response)| response.exit_code == Some(exit_code))
    {
        return SelectedResponse {
            status: status.parse().unwrap_or(fallback),
            spec: Some(spec),
        };
    }

    SelectedResponse {
        status: fallback,
        spec: responses.get(&fallback.to_string()),
    }
}

/// Renders selected responses
#[derive(Debug, Clone, Copy)]
pub struct ResponseMapper<'a> {
    transforms: &'a TransformRegistry,
}

impl<'a> ResponseMapper<'a> {
    pub fn new(transforms: &'a TransformRegistry) -> Self {
        Self { transforms }
    }

    /// Builds status, headers and body.
    ///
    /// The content type is an explicit `Content-Type` header template, else
    /// the `Accept` negotiation result, else the type implied by the first
    /// declared content. The body is, in order of preference: the content's
    /// `x-value` template, stderr for a non-zero exit, the output file, or
    /// stdout passed through the content's transform.
    pub async fn render(
        &self,
        selected: &SelectedResponse<'_>,
        env: &ParameterEnvironment,
        accept: Option<&str>,
        output: &CommandOutput,
        output_file: Option<&Path>,
    ) -> Result<GatewayResponse> {
        let resolver = TemplateResolver::new(env);
        let mut response = GatewayResponse::new(selected.status);

        if let Some(spec) = selected.spec {
            for (name, header) in &spec.headers {
                if let Some(template) = &header.value_template {
                    response
                        .headers
                        .insert(name.clone(), resolver.resolve(template)?);
                }
            }
        }

        let explicit = response.header("content-type").map(str::to_string);
        let content_type = match &explicit {
            Some(explicit) => Some(explicit.clone()),
            None => {
                let negotiated = selected.spec.and_then(|spec| {
                    accept.and_then(|accept| media_type::negotiate(accept, &spec.media_types()))
                });
                let content_type = negotiated
                    .or_else(|| selected.spec.and_then(ResponseSpec::implied_content_type));
                if let Some(content_type) = &content_type {
                    response
                        .headers
                        .insert("Content-Type".to_string(), content_type.clone());
                }
                content_type
            }
        };

        let content = selected
            .spec
            .and_then(|spec| spec.content_for(content_type.as_deref()));

        response.body = if let Some(template) =
            content.and_then(|content| content.body_template.as_deref())
        {
            resolver.resolve(template)?.into_bytes()
        } else if !output.success() {
            output.stderr.clone()
        } else if let Some(path) = output_file {
            tokio::fs::read(path).await.map_err(|err| {
                Error::execution(format!(
                    "Unable to read output file {}: {err}",
                    path.display()
                ))
            })?
        } else {
            let transform = match content {
                Some(content) => self.transforms.resolve(&content.transform)?,
                None => Transform::Identity,
            };
            transform
                .apply(&ParamValue::from_bytes(output.stdout.clone()))
                .to_bytes()
                .unwrap_or_default()
        };

        Ok(response)
    }
}
