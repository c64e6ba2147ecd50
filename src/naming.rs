//! Final on-disk name resolution.
//!
//! Without a generator the declared filename is percent-decoded and used
//! verbatim: there is no collision detection, and path separators survive
//! decoding. Callers that need collision safety configure a generator such as
//! [`RandomName`]; callers that need traversal safety enable
//! [`sanitize_filename`] on the builder.

use std::{collections::BTreeMap, fmt, path::Path, sync::Arc};

use percent_encoding::percent_decode_str;
use uuid::Uuid;

use crate::{
    error::{BoxError, NamingError},
    part::{RequestContext, UploadedPart},
};

/// Computes the final name of an uploaded file.
pub trait NameGenerator: Send + Sync {
    /// Returns the final name for a part declared as `filename`.
    fn generate(&self, filename: &str, context: &RequestContext) -> Result<String, BoxError>;
}

impl<F> NameGenerator for F
where
    F: Fn(&str, &RequestContext) -> Result<String, BoxError> + Send + Sync,
{
    fn generate(&self, filename: &str, context: &RequestContext) -> Result<String, BoxError> {
        self(filename, context)
    }
}

/// Generator producing a random uuid name that keeps the declared extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomName;

impl NameGenerator for RandomName {
    fn generate(&self, filename: &str, _context: &RequestContext) -> Result<String, BoxError> {
        let basename = Uuid::new_v4().simple().to_string();
        let decoded = decode_filename(filename).unwrap_or_else(|_| filename.to_owned());
        let extension = Path::new(&decoded)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty());

        Ok(match extension {
            Some(ext) => format!("{basename}.{}", sanitize_filename(ext)),
            None => basename,
        })
    }
}

/// Percent-decodes a declared filename as UTF-8.
pub fn decode_filename(filename: &str) -> Result<String, NamingError> {
    percent_decode_str(filename)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| NamingError::InvalidEncoding {
            filename: filename.to_owned(),
        })
}

/// Reduces a name to a single safe path component.
///
/// Directory parts are stripped and every character outside
/// `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_filename(input: &str) -> String {
    let base = Path::new(input)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("file");

    let sanitized: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.trim_matches(['.', ' ']);
    if sanitized.is_empty() {
        return "file".to_owned();
    }

    sanitized.to_owned()
}

/// Resolves final names, either through a generator or by decoding.
#[derive(Clone, Default)]
pub struct NamingResolver {
    generator: Option<Arc<dyn NameGenerator>>,
}

impl fmt::Debug for NamingResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamingResolver")
            .field("generator", &self.generator.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl NamingResolver {
    /// Creates a resolver. `None` falls back to decoding the declared name.
    pub fn new(generator: Option<Arc<dyn NameGenerator>>) -> Self {
        Self { generator }
    }

    /// Returns `true` when a generator is configured.
    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Resolves the final name of one part.
    pub fn resolve(
        &self,
        field: &str,
        declared: &str,
        context: &RequestContext,
    ) -> Result<String, NamingError> {
        match &self.generator {
            Some(generator) => {
                generator
                    .generate(declared, context)
                    .map_err(|source| NamingError::Generator {
                        field: field.to_owned(),
                        source,
                    })
            }
            None => decode_filename(declared),
        }
    }

    /// Resolves every part of a payload. The first failure aborts the whole
    /// batch so that no file is saved under a partial naming.
    pub fn resolve_all(
        &self,
        payload: &BTreeMap<String, UploadedPart>,
        context: &RequestContext,
    ) -> Result<BTreeMap<String, String>, NamingError> {
        payload
            .iter()
            .map(|(field, part)| {
                let declared = part.filename().unwrap_or_default();
                self.resolve(field, declared, context)
                    .map(|name| (field.clone(), name))
            })
            .collect()
    }
}
