//! Axum integration: mounts a [`FileUploader`] as a POST route.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Extension, Multipart, Query, RawPathParams, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::stream;
use serde_json::{json, Map, Value};

use crate::{FileUploader, UploadError, UploadRequest, UploadedPart, ValidationError};

/// Credentials resolved by an auth layer, forwarded as the request's `auth` section.
#[derive(Debug, Clone)]
pub struct UploadAuth(pub Value);

/// Rejection returned by the upload handler.
#[derive(Debug)]
pub enum UploadRejection {
    /// The multipart body could not be read.
    Multipart {
        /// Status reported by the multipart reader.
        status: StatusCode,
        /// Reader message.
        message: String,
    },
    /// Validation or a pipeline stage failed.
    Upload(UploadError),
}

impl IntoResponse for UploadRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Multipart { status, message } => (status, message),
            Self::Upload(err) => (err.status_code(), err.public_message()),
        };
        let body = json!({
            "statusCode": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}

/// Builds a router serving the uploader's route.
///
/// Path parameters written as `{name}` are mounted as `:name`.
pub fn router(uploader: Arc<FileUploader>) -> Router {
    let route = uploader.route();
    let path = axum_path(&route.path);

    let mut method_router = post(handle_upload);
    if let Some(max_bytes) = route.payload.max_bytes {
        let limit = usize::try_from(max_bytes).unwrap_or(usize::MAX);
        method_router = method_router.layer(DefaultBodyLimit::max(limit));
    }

    Router::new().route(&path, method_router).with_state(uploader)
}

async fn handle_upload(
    State(uploader): State<Arc<FileUploader>>,
    params: Option<RawPathParams>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    auth: Option<Extension<UploadAuth>>,
    multipart: Multipart,
) -> Result<Response, UploadRejection> {
    let params: Map<String, Value> = params
        .iter()
        .flat_map(|params| params.iter())
        .map(|(key, value)| (key.to_owned(), Value::String(value.to_owned())))
        .collect();

    let request = read_request(multipart)
        .await?
        .with_query(string_map(query))
        .with_params(Value::Object(params))
        .with_headers(header_map(&headers))
        .with_auth(auth.map_or(Value::Null, |Extension(UploadAuth(auth))| auth));

    let response = uploader
        .handle(request)
        .await
        .map_err(UploadRejection::Upload)?;
    Ok(Json(response).into_response())
}

/// Reads every multipart field into an [`UploadRequest`] payload entry.
///
/// Each field's body is collected before the next field is read, so every
/// part owns an independent stream by the time the pipeline runs.
pub async fn read_request(mut multipart: Multipart) -> Result<UploadRequest, UploadRejection> {
    let mut request = UploadRequest::new();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_rejection)? {
        let name = field.name().unwrap_or_default().to_owned();
        if request.payload.contains_key(&name) {
            #[cfg(feature = "tracing")]
            tracing::warn!(field = name.as_str(), "axum: repeated multipart field");
            return Err(UploadRejection::Upload(
                ValidationError::DuplicateField { field: name }.into(),
            ));
        }
        let filename = field.file_name().map(ToOwned::to_owned);
        let headers = field.headers().clone();

        let mut chunks: Vec<Result<Bytes, std::io::Error>> = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_rejection)? {
            chunks.push(Ok(chunk));
        }

        let mut part = UploadedPart::from_stream(Box::pin(stream::iter(chunks))).with_headers(headers);
        if let Some(filename) = filename {
            part = part.with_filename(filename);
        }
        request.payload.insert(name, part);
    }

    Ok(request)
}

fn multipart_rejection(err: axum::extract::multipart::MultipartError) -> UploadRejection {
    #[cfg(feature = "tracing")]
    tracing::warn!(error = %err, "axum: failed to read multipart body");
    UploadRejection::Multipart {
        status: err.status(),
        message: err.body_text(),
    }
}

fn string_map(values: HashMap<String, String>) -> Value {
    Value::Object(
        values
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
    )
}

fn header_map(headers: &HeaderMap) -> Value {
    Value::Object(
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), Value::String(value.to_owned())))
            })
            .collect(),
    )
}

/// Converts `{name}` path segments to axum's `:name` form.
pub fn axum_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
                .map_or_else(|| segment.to_owned(), |name| format!(":{name}"))
        })
        .collect::<Vec<_>>()
        .join("/")
}
