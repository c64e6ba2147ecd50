use http::StatusCode;
use thiserror::Error;

/// Boxed error type returned by caller-supplied generators and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registration-time errors. A `FileUploader` is never built when one occurs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No storage root was configured.
    #[error("Must define a path to upload files")]
    MissingStoragePath,
    /// The storage root does not exist, is not a directory, or is read-only.
    #[error("Must define a valid accessible path to upload files - {reason}")]
    InaccessibleStoragePath {
        /// Underlying reason reported by the filesystem check.
        reason: String,
    },
    /// Extension and MIME type allowlists were both supplied.
    #[error("Can't validate both extensions and mime type.")]
    ConflictingAllowLists,
    /// The extension allowlist is not a sequence of strings.
    #[error("Extensions provided to validation must be an array.")]
    ExtensionsNotArray,
    /// The MIME type allowlist is not a sequence of strings.
    #[error("MimeTypes provided to validation must be an array.")]
    MimeTypesNotArray,
    /// A declarative settings document could not be decoded.
    #[error("invalid upload settings: {message}")]
    InvalidSettings {
        /// Decoder message.
        message: String,
    },
    /// The route path is empty or does not start with `/`.
    #[error("route path `{path}` must start with `/`")]
    InvalidRoutePath {
        /// Offending path.
        path: String,
    },
    /// `max_bytes` was configured as zero.
    #[error("max bytes must be greater than 0")]
    InvalidMaxBytes,
}

/// A request does not satisfy the structural contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The payload holds fewer or more entries than the contract allows.
    #[error("payload must contain between {min} and {max} file entries, got {actual}")]
    EntryCount {
        /// Minimum accepted entry count.
        min: usize,
        /// Maximum accepted entry count.
        max: usize,
        /// Observed entry count.
        actual: usize,
    },
    /// More than one part was submitted under the same field name.
    #[error("field `{field}` carries more than one file entry")]
    DuplicateField {
        /// Repeated field name.
        field: String,
    },
    /// A part carries no readable stream.
    #[error("entry `{field}` is missing a readable file stream")]
    MissingStream {
        /// Payload field name.
        field: String,
    },
    /// A part's filename was rejected by the filename rule.
    #[error("entry `{field}` has an invalid filename: {reason}")]
    InvalidFilename {
        /// Payload field name.
        field: String,
        /// Rule failure message.
        reason: String,
    },
    /// A part has no `content-type` header.
    #[error("entry `{field}` is missing the content-type header")]
    MissingContentType {
        /// Payload field name.
        field: String,
    },
    /// A part's content type is outside the allowed set.
    #[error("entry `{field}` has disallowed content type `{content_type}`")]
    ContentTypeNotAllowed {
        /// Payload field name.
        field: String,
        /// Declared content type.
        content_type: String,
    },
    /// A part's `content-disposition` header is missing or lacks a filename token.
    #[error("entry `{field}` has no content-disposition header carrying a filename")]
    MissingDispositionFilename {
        /// Payload field name.
        field: String,
    },
    /// A pass-through section rule rejected the request.
    #[error("request {section} failed validation: {reason}")]
    Section {
        /// Section name (`query`, `params`, `headers` or `auth`).
        section: &'static str,
        /// Rule failure message.
        reason: String,
    },
}

/// Final-name computation failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NamingError {
    /// The configured generator failed for a field.
    #[error("name generation failed for field `{field}`: {source}")]
    Generator {
        /// Payload field name.
        field: String,
        /// Generator error.
        #[source]
        source: BoxError,
    },
    /// The declared filename is not valid percent-encoded UTF-8.
    #[error("declared filename `{filename}` is not valid percent-encoded UTF-8")]
    InvalidEncoding {
        /// Declared filename as received.
        filename: String,
    },
}

/// Persistence failures for a single part.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The destination file could not be opened for writing.
    #[error("failed to open destination file, possible issue with path: {message}")]
    Open {
        /// Payload field name.
        field: String,
        /// I/O error message.
        message: String,
    },
    /// Writing or flushing the destination file failed.
    #[error("failed to write destination file: {message}")]
    Write {
        /// Payload field name.
        field: String,
        /// I/O error message.
        message: String,
    },
    /// The part's byte stream reported an error while being read.
    #[error("failed to read upload stream for field `{field}`: {message}")]
    Source {
        /// Payload field name.
        field: String,
        /// Stream error message.
        message: String,
    },
    /// The part's byte stream was already consumed.
    #[error("upload stream for field `{field}` was already consumed")]
    StreamConsumed {
        /// Payload field name.
        field: String,
    },
    /// The payload held no parts to persist.
    #[error("payload contains no files")]
    NoFiles,
}

impl StorageError {
    /// Returns `true` when the failure is attributable to the submitted data
    /// rather than to the server.
    pub fn is_bad_data(&self) -> bool {
        matches!(self, Self::Source { .. } | Self::NoFiles)
    }
}

/// Which caller hook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Hook running before any file is written.
    PreSave,
    /// Hook running after every file is written.
    PostSave,
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreSave => f.write_str("pre-save"),
            Self::PostSave => f.write_str("post-save"),
        }
    }
}

/// A caller hook failed.
#[derive(Debug, Error)]
#[error("{kind} hook failed: {source}")]
pub struct HookError {
    /// Hook slot that failed.
    pub kind: HookKind,
    /// Hook error.
    #[source]
    pub source: BoxError,
}

/// Per-request error type returned by `FileUploader::handle`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UploadError {
    /// The request was rejected by the structural contract.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Final-name computation failed; no file was written.
    #[error(transparent)]
    Naming(#[from] NamingError),
    /// Persisting a part failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A caller hook failed.
    #[error(transparent)]
    Hook(#[from] HookError),
}

impl UploadError {
    /// Maps the error to the response status category.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Storage(err) if err.is_bad_data() => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Naming(_) | Self::Storage(_) | Self::Hook(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message safe to send to the client.
    ///
    /// Internal failures collapse to a generic message so that storage paths
    /// and hook internals never leave the process.
    pub fn public_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => "An internal server error occurred".to_owned(),
            StatusCode::UNPROCESSABLE_ENTITY => match self {
                Self::Storage(StorageError::NoFiles) => StorageError::NoFiles.to_string(),
                _ => "Unable to process the uploaded data".to_owned(),
            },
            _ => self.to_string(),
        }
    }
}
