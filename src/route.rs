use http::Method;
use serde_json::Value;

use crate::pipeline::StageName;

/// Default route path of an upload endpoint.
pub const DEFAULT_ROUTE_PATH: &str = "/files";
/// Content type accepted by upload endpoints.
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
/// Human-readable description of the route.
pub const ROUTE_DESCRIPTION: &str = "Uploads a file";

/// How the transport hands the request body to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadOutput {
    /// Each part is exposed as a byte stream.
    Stream,
}

/// Payload handling requested from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDirective {
    /// Body representation handed to the handler.
    pub output: PayloadOutput,
    /// Whether the transport parses the multipart body into parts.
    pub parse: bool,
    /// Accepted request content type.
    pub allow: &'static str,
    /// Maximum request body size in bytes.
    pub max_bytes: Option<u64>,
}

/// Route the transport registers for an uploader.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDefinition {
    /// Always `POST`.
    pub method: Method,
    /// Route path.
    pub path: String,
    /// Route tags, passed through.
    pub tags: Vec<String>,
    /// CORS settings, passed through.
    pub cors: Option<Value>,
    /// Auth settings, passed through. `false` disables auth.
    pub auth: Value,
    /// Payload handling directive.
    pub payload: PayloadDirective,
    /// Stages run before the terminal handler, in order.
    pub pre: Vec<StageName>,
    /// Route description.
    pub description: &'static str,
}
