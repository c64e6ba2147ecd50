use std::{collections::BTreeMap, fmt};

use bytes::Bytes;
use futures::{stream, stream::BoxStream};
use http::{header, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

/// Byte stream carried by an uploaded part.
pub type PartStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// One uploaded file entry of an incoming request.
///
/// The stream is consumed exactly once, by the save stage.
pub struct UploadedPart {
    filename: Option<String>,
    headers: HeaderMap,
    stream: Option<PartStream>,
}

impl fmt::Debug for UploadedPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedPart")
            .field("filename", &self.filename)
            .field("headers", &self.headers)
            .field("stream", &self.stream.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

impl UploadedPart {
    /// Creates a part from a chunk stream with no declared metadata.
    pub fn from_stream(stream: PartStream) -> Self {
        Self {
            filename: None,
            headers: HeaderMap::new(),
            stream: Some(stream),
        }
    }

    /// Creates a part whose stream yields `body` as a single chunk.
    pub fn from_bytes(body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self::from_stream(Box::pin(stream::iter([Ok::<_, std::io::Error>(body)])))
    }

    /// Sets the declared filename.
    ///
    /// A `content-disposition` header carrying the filename is added when the
    /// part does not declare one yet.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        if !self.headers.contains_key(header::CONTENT_DISPOSITION) {
            let disposition = format!("form-data; filename=\"{}\"", filename.replace('"', "\\\""));
            if let Ok(value) = HeaderValue::from_str(&disposition) {
                self.headers.insert(header::CONTENT_DISPOSITION, value);
            }
        }
        self.filename = Some(filename);
        self
    }

    /// Sets the declared `content-type` header.
    pub fn with_content_type(self, content_type: &str) -> Self {
        self.with_header(header::CONTENT_TYPE, content_type)
    }

    /// Sets an arbitrary declared header. Invalid header values are ignored.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Removes a declared header.
    pub fn without_header(mut self, name: HeaderName) -> Self {
        self.headers.remove(name);
        self
    }

    /// Replaces all declared headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Returns the declared filename, if any.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Returns the declared headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the declared `content-type` header value.
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE)
    }

    /// Returns the declared `content-disposition` header value.
    pub fn content_disposition(&self) -> Option<&str> {
        self.header_str(header::CONTENT_DISPOSITION)
    }

    /// Returns `true` while the byte stream has not been taken.
    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Takes the byte stream, leaving the part without one.
    pub fn take_stream(&mut self) -> Option<PartStream> {
        self.stream.take()
    }

    fn header_str(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Request sections passed through untouched to rules, generators and hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Query string parameters.
    pub query: Value,
    /// Route path parameters.
    pub params: Value,
    /// Request headers.
    pub headers: Value,
    /// Authentication credentials resolved by the transport.
    pub auth: Value,
}

/// Declared metadata of one uploaded part, without its stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartInfo {
    /// Declared filename.
    pub filename: Option<String>,
    /// Declared part headers.
    pub headers: HeaderMap,
}

impl PartInfo {
    /// Returns the declared `content-type` header value.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

impl From<&UploadedPart> for PartInfo {
    fn from(part: &UploadedPart) -> Self {
        Self {
            filename: part.filename.clone(),
            headers: part.headers.clone(),
        }
    }
}

/// Read-only view of an upload request handed to pre-save and post-save hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookRequest {
    /// Pass-through request sections.
    pub context: RequestContext,
    /// Declared metadata of every uploaded entry, keyed by form field name.
    pub parts: BTreeMap<String, PartInfo>,
}

impl HookRequest {
    /// Builds the view from the request sections and its payload.
    pub fn new(context: RequestContext, payload: &BTreeMap<String, UploadedPart>) -> Self {
        let parts = payload
            .iter()
            .map(|(field, part)| (field.clone(), PartInfo::from(part)))
            .collect();
        Self { context, parts }
    }
}

/// An inbound upload request as delivered by the transport.
#[derive(Debug, Default)]
pub struct UploadRequest {
    /// Pass-through request sections.
    pub context: RequestContext,
    /// Uploaded entries keyed by form field name.
    pub payload: BTreeMap<String, UploadedPart>,
}

impl UploadRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an uploaded entry under `field`.
    pub fn with_part(mut self, field: impl Into<String>, part: UploadedPart) -> Self {
        self.payload.insert(field.into(), part);
        self
    }

    /// Sets the query section.
    pub fn with_query(mut self, query: Value) -> Self {
        self.context.query = query;
        self
    }

    /// Sets the path parameters section.
    pub fn with_params(mut self, params: Value) -> Self {
        self.context.params = params;
        self
    }

    /// Sets the headers section.
    pub fn with_headers(mut self, headers: Value) -> Self {
        self.context.headers = headers;
        self
    }

    /// Sets the auth section.
    pub fn with_auth(mut self, auth: Value) -> Self {
        self.context.auth = auth;
        self
    }
}
