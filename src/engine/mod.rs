//! Request processing engine: transforms, parameter extraction, template
//! resolution and response mapping

pub mod environment;
pub mod extractor;
pub mod response;
pub mod template;
pub mod transform;

pub use environment::{ParamValue, ParameterEnvironment};
pub use extractor::{Extraction, ParameterExtractor};
pub use response::{ResponseMapper, SelectedResponse, select};
pub use template::TemplateResolver;
pub use transform::{Transform, TransformRegistry, TransformSpec};
