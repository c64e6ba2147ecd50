//! Structural request contract derived from declarative validation options.

use std::{collections::BTreeSet, fmt, sync::Arc};

use serde_json::Value;

use crate::{
    error::{ConfigError, ValidationError},
    mime_table,
    part::{UploadRequest, UploadedPart},
};

/// A caller-supplied check over one request section.
pub trait Rule: Send + Sync {
    /// Returns `Err(reason)` when `value` is rejected.
    fn check(&self, value: &Value) -> Result<(), String>;
}

impl<F> Rule for F
where
    F: Fn(&Value) -> Result<(), String> + Send + Sync,
{
    fn check(&self, value: &Value) -> Result<(), String> {
        self(value)
    }
}

/// Shared handle to a [`Rule`].
pub type SharedRule = Arc<dyn Rule>;

/// Declarative validation options for one upload endpoint.
#[derive(Clone, Default)]
pub struct ValidationOptions {
    /// Allowed file extensions. Mutually exclusive with `mime_types`.
    pub extensions: Option<Vec<String>>,
    /// Allowed MIME types. Mutually exclusive with `extensions`.
    pub mime_types: Option<Vec<String>>,
    /// Filename rule replacing the default "required non-empty string".
    pub filename: Option<SharedRule>,
    /// Query section rule.
    pub query: Option<SharedRule>,
    /// Path parameters section rule.
    pub params: Option<SharedRule>,
    /// Headers section rule.
    pub headers: Option<SharedRule>,
    /// Auth section rule.
    pub auth: Option<SharedRule>,
    /// Maximum number of file entries. `None` means exactly one.
    pub max_parts: Option<usize>,
}

impl fmt::Debug for ValidationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = |rule: &Option<SharedRule>| rule.as_ref().map(|_| "<rule>");
        f.debug_struct("ValidationOptions")
            .field("extensions", &self.extensions)
            .field("mime_types", &self.mime_types)
            .field("filename", &rule(&self.filename))
            .field("query", &rule(&self.query))
            .field("params", &rule(&self.params))
            .field("headers", &rule(&self.headers))
            .field("auth", &rule(&self.auth))
            .field("max_parts", &self.max_parts)
            .finish()
    }
}

impl ValidationOptions {
    /// Creates options with no constraints beyond the file entry shape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the data-only options (`extensions`, `mimeTypes`, `maxParts`)
    /// from a JSON document.
    ///
    /// Rules are code and cannot be expressed in JSON; set them on the
    /// returned value.
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        let mut options = Self::default();
        let Value::Object(map) = value else {
            return Ok(options);
        };

        options.extensions = string_list(map.get("extensions"))
            .map_err(|()| ConfigError::ExtensionsNotArray)?;
        options.mime_types = string_list(map.get("mimeTypes"))
            .map_err(|()| ConfigError::MimeTypesNotArray)?;

        if let Some(max) = map.get("maxParts").filter(|value| !value.is_null()) {
            let max = max
                .as_u64()
                .and_then(|max| usize::try_from(max).ok())
                .ok_or_else(|| ConfigError::InvalidSettings {
                    message: "maxParts must be a positive integer".to_owned(),
                })?;
            options.max_parts = Some(max);
        }

        Ok(options)
    }

    /// Sets the allowed extensions.
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the allowed MIME types.
    pub fn mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mime_types = Some(mime_types.into_iter().map(Into::into).collect());
        self
    }

    /// Sets a custom filename rule.
    pub fn filename_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.filename = Some(Arc::new(rule));
        self
    }

    /// Sets the query section rule.
    pub fn query_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.query = Some(Arc::new(rule));
        self
    }

    /// Sets the path parameters section rule.
    pub fn params_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.params = Some(Arc::new(rule));
        self
    }

    /// Sets the headers section rule.
    pub fn headers_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.headers = Some(Arc::new(rule));
        self
    }

    /// Sets the auth section rule.
    pub fn auth_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.auth = Some(Arc::new(rule));
        self
    }

    /// Allows up to `max_parts` file entries per request.
    pub fn max_parts(mut self, max_parts: usize) -> Self {
        self.max_parts = Some(max_parts);
        self
    }
}

fn string_list(value: Option<&Value>) -> Result<Option<Vec<String>>, ()> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(ToOwned::to_owned).ok_or(()))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(()),
    }
}

/// Constraint on a part's `filename`.
#[derive(Clone)]
pub enum FilenameRule {
    /// The filename must be present and non-empty.
    RequiredNonEmpty,
    /// A caller rule receives the filename as a JSON string, or `null` when absent.
    Custom(SharedRule),
}

impl fmt::Debug for FilenameRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequiredNonEmpty => f.write_str("RequiredNonEmpty"),
            Self::Custom(_) => f.write_str("Custom(<rule>)"),
        }
    }
}

impl FilenameRule {
    fn check(&self, filename: Option<&str>) -> Result<(), String> {
        match self {
            Self::RequiredNonEmpty => match filename {
                Some(name) if !name.is_empty() => Ok(()),
                Some(_) => Err("filename cannot be empty".to_owned()),
                None => Err("filename is required".to_owned()),
            },
            Self::Custom(rule) => {
                let value = filename.map_or(Value::Null, |name| Value::String(name.to_owned()));
                rule.check(&value)
            }
        }
    }
}

/// Constraint on a part's `content-type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentTypeRule {
    /// Any content type is accepted as long as the header is present.
    Any,
    /// The content type essence must be one of these lowercase MIME types.
    OneOf(BTreeSet<String>),
}

impl ContentTypeRule {
    /// Returns `true` when `content_type` satisfies the rule.
    pub fn allows(&self, content_type: &str) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(allowed) => mime_table::essence_of(content_type)
                .is_some_and(|essence| allowed.contains(&essence)),
        }
    }
}

/// Shape required of each file entry.
#[derive(Debug, Clone)]
pub struct FilePartContract {
    /// Filename constraint.
    pub filename: FilenameRule,
    /// Content type constraint.
    pub content_type: ContentTypeRule,
}

/// Shape required of the payload section.
#[derive(Debug, Clone)]
pub struct PayloadContract {
    /// Minimum number of entries.
    pub min_entries: usize,
    /// Maximum number of entries.
    pub max_entries: usize,
    /// Constraint applied to every entry.
    pub file: FilePartContract,
}

/// Structural contract an upload request must satisfy before the pipeline runs.
#[derive(Clone)]
pub struct StructuralContract {
    /// Query rule, passed through from the options.
    pub query: Option<SharedRule>,
    /// Path parameters rule, passed through from the options.
    pub params: Option<SharedRule>,
    /// Headers rule, passed through from the options.
    pub headers: Option<SharedRule>,
    /// Auth rule, passed through from the options.
    pub auth: Option<SharedRule>,
    /// Payload shape.
    pub payload: PayloadContract,
}

impl fmt::Debug for StructuralContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = |rule: &Option<SharedRule>| rule.as_ref().map(|_| "<rule>");
        f.debug_struct("StructuralContract")
            .field("query", &rule(&self.query))
            .field("params", &rule(&self.params))
            .field("headers", &rule(&self.headers))
            .field("auth", &rule(&self.auth))
            .field("payload", &self.payload)
            .finish()
    }
}

impl StructuralContract {
    /// Checks `request` against the contract.
    pub fn validate(&self, request: &UploadRequest) -> Result<(), ValidationError> {
        let context = &request.context;
        for (section, rule, value) in [
            ("query", &self.query, &context.query),
            ("params", &self.params, &context.params),
            ("headers", &self.headers, &context.headers),
            ("auth", &self.auth, &context.auth),
        ] {
            if let Some(rule) = rule {
                rule.check(value)
                    .map_err(|reason| ValidationError::Section { section, reason })?;
            }
        }

        let actual = request.payload.len();
        if actual < self.payload.min_entries || actual > self.payload.max_entries {
            return Err(ValidationError::EntryCount {
                min: self.payload.min_entries,
                max: self.payload.max_entries,
                actual,
            });
        }

        request
            .payload
            .iter()
            .try_for_each(|(field, part)| self.validate_part(field, part))
    }

    fn validate_part(&self, field: &str, part: &UploadedPart) -> Result<(), ValidationError> {
        let contract = &self.payload.file;

        if !part.has_stream() {
            return Err(ValidationError::MissingStream {
                field: field.to_owned(),
            });
        }

        contract
            .filename
            .check(part.filename())
            .map_err(|reason| ValidationError::InvalidFilename {
                field: field.to_owned(),
                reason,
            })?;

        let content_type = part
            .content_type()
            .ok_or_else(|| ValidationError::MissingContentType {
                field: field.to_owned(),
            })?;
        if !contract.content_type.allows(content_type) {
            return Err(ValidationError::ContentTypeNotAllowed {
                field: field.to_owned(),
                content_type: content_type.to_owned(),
            });
        }

        let has_filename_token = part
            .content_disposition()
            .is_some_and(|value| value.to_ascii_lowercase().contains("filename"));
        if !has_filename_token {
            return Err(ValidationError::MissingDispositionFilename {
                field: field.to_owned(),
            });
        }

        Ok(())
    }
}

/// Derives a [`StructuralContract`] from [`ValidationOptions`].
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    options: ValidationOptions,
}

impl SchemaBuilder {
    /// Creates a builder for the given options.
    pub fn new(options: ValidationOptions) -> Self {
        Self { options }
    }

    /// Builds the contract.
    ///
    /// Extensions are resolved to MIME types here, once. Extensions with no
    /// known MIME type are dropped from the allowed set without error.
    pub fn build(self) -> Result<StructuralContract, ConfigError> {
        let options = self.options;

        let content_type = match (options.extensions, options.mime_types) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingAllowLists),
            (Some(extensions), None) => ContentTypeRule::OneOf(
                extensions
                    .iter()
                    .filter_map(|ext| mime_table::mime_for_extension(ext))
                    .collect(),
            ),
            (None, Some(mime_types)) => ContentTypeRule::OneOf(
                mime_types
                    .iter()
                    .map(|mime| mime_table::essence_of(mime).unwrap_or_else(|| mime.to_ascii_lowercase()))
                    .collect(),
            ),
            (None, None) => ContentTypeRule::Any,
        };

        let filename = options
            .filename
            .map_or(FilenameRule::RequiredNonEmpty, FilenameRule::Custom);

        #[cfg(feature = "tracing")]
        tracing::debug!(content_type = ?content_type, "schema: built upload contract");

        Ok(StructuralContract {
            query: options.query,
            params: options.params,
            headers: options.headers,
            auth: options.auth,
            payload: PayloadContract {
                min_entries: 1,
                max_entries: options.max_parts.unwrap_or(1).max(1),
                file: FilePartContract {
                    filename,
                    content_type,
                },
            },
        })
    }
}
