use std::{fmt, path::PathBuf, sync::Arc};

use serde::Deserialize;
use serde_json::Value;

use crate::{
    builder::UploaderBuilder,
    error::ConfigError,
    naming::NameGenerator,
    pipeline::UploadHook,
    route::DEFAULT_ROUTE_PATH,
    schema::ValidationOptions,
};

/// Immutable upload configuration, fixed once the uploader is built.
#[derive(Clone)]
pub struct UploadConfig {
    /// Directory every file is written under. Checked for write access at build time.
    pub storage_root: PathBuf,
    /// Maximum request body size in bytes.
    pub max_bytes: Option<u64>,
    /// Final-name generator.
    pub generator: Option<Arc<dyn NameGenerator>>,
    /// Hook run before any file is written.
    pub pre_save: Option<Arc<dyn UploadHook>>,
    /// Hook run after every file is written.
    pub post_save: Option<Arc<dyn UploadHook>>,
    /// Whether final names are sanitized before saving.
    pub sanitize_names: bool,
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("storage_root", &self.storage_root)
            .field("max_bytes", &self.max_bytes)
            .field("generator", &self.generator.as_ref().map(|_| "<fn>"))
            .field("pre_save", &self.pre_save.as_ref().map(|_| "<fn>"))
            .field("post_save", &self.post_save.as_ref().map(|_| "<fn>"))
            .field("sanitize_names", &self.sanitize_names)
            .finish()
    }
}

/// Route-level options passed through to the transport.
#[derive(Debug, Clone)]
pub struct RouteOptions {
    /// Route path.
    pub path: String,
    /// Route tags.
    pub tags: Vec<String>,
    /// CORS settings.
    pub cors: Option<Value>,
    /// Auth settings. `false` disables auth.
    pub auth: Value,
    /// Request validation options.
    pub validate: ValidationOptions,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_ROUTE_PATH.to_owned(),
            tags: Vec::new(),
            cors: None,
            auth: Value::Bool(false),
            validate: ValidationOptions::default(),
        }
    }
}

/// Declarative upload settings, typically read from a JSON document.
///
/// ```json
/// {
///   "upload": { "path": "/var/uploads", "maxBytes": 1048576 },
///   "route": { "path": "/files", "validate": { "extensions": ["pdf"] } }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadSettings {
    /// Storage settings.
    pub upload: UploadSection,
    /// Route settings.
    pub route: RouteSection,
}

/// `upload` section of [`UploadSettings`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadSection {
    /// Storage root.
    pub path: Option<PathBuf>,
    /// Maximum request body size in bytes.
    pub max_bytes: Option<u64>,
}

/// `route` section of [`UploadSettings`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouteSection {
    /// Route path.
    pub path: Option<String>,
    /// Route tags.
    pub tags: Option<Vec<String>>,
    /// CORS settings.
    pub cors: Option<Value>,
    /// Auth settings.
    pub auth: Option<Value>,
    /// Raw validation options, see [`ValidationOptions::from_json`].
    pub validate: Option<Value>,
}

impl UploadSettings {
    /// Decodes settings from a JSON value. `null` yields empty settings.
    pub fn from_json(value: Value) -> Result<Self, ConfigError> {
        if value.is_null() {
            return Ok(Self::default());
        }

        serde_json::from_value(value).map_err(|err| ConfigError::InvalidSettings {
            message: err.to_string(),
        })
    }

    /// Turns the settings into a builder. Hooks and rules are added on the
    /// returned builder.
    pub fn into_builder(self) -> Result<UploaderBuilder, ConfigError> {
        let mut route = RouteOptions::default();
        if let Some(path) = self.route.path {
            route.path = path;
        }
        route.tags = self.route.tags.unwrap_or_default();
        route.cors = self.route.cors;
        if let Some(auth) = self.route.auth {
            route.auth = auth;
        }
        if let Some(validate) = &self.route.validate {
            route.validate = ValidationOptions::from_json(validate)?;
        }

        let mut builder = UploaderBuilder::new().route(route);
        if let Some(path) = self.upload.path {
            builder = builder.storage_path(path);
        }
        if let Some(max_bytes) = self.upload.max_bytes {
            builder = builder.max_bytes(max_bytes);
        }
        Ok(builder)
    }
}
