use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use http::Method;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    config::{RouteOptions, UploadConfig},
    error::ConfigError,
    naming::{NameGenerator, NamingResolver},
    pipeline::{PipelineOrchestrator, UploadHook},
    route::{PayloadDirective, PayloadOutput, RouteDefinition, MULTIPART_FORM_DATA, ROUTE_DESCRIPTION},
    schema::{SchemaBuilder, ValidationOptions},
    storage::DiskStorage,
    FileUploader,
};

/// Builder for a [`FileUploader`].
///
/// `build` plays the part of route registration: when it fails no uploader,
/// and therefore no route, exists.
#[derive(Clone, Default)]
pub struct UploaderBuilder {
    storage_root: Option<PathBuf>,
    max_bytes: Option<u64>,
    generator: Option<Arc<dyn NameGenerator>>,
    pre_save: Option<Arc<dyn UploadHook>>,
    post_save: Option<Arc<dyn UploadHook>>,
    sanitize_names: bool,
    route: RouteOptions,
}

impl fmt::Debug for UploaderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploaderBuilder")
            .field("storage_root", &self.storage_root)
            .field("max_bytes", &self.max_bytes)
            .field("generator", &self.generator.as_ref().map(|_| "<fn>"))
            .field("pre_save", &self.pre_save.as_ref().map(|_| "<fn>"))
            .field("post_save", &self.post_save.as_ref().map(|_| "<fn>"))
            .field("sanitize_names", &self.sanitize_names)
            .field("route", &self.route)
            .finish()
    }
}

impl UploaderBuilder {
    /// Creates a builder with default route options and no storage root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory uploaded files are written under.
    pub fn storage_path(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = Some(root.into());
        self
    }

    /// Sets the maximum request body size in bytes.
    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Sets the final-name generator.
    pub fn generate_name(mut self, generator: impl NameGenerator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Sets the hook run before any file is written.
    pub fn pre_upload(mut self, hook: impl UploadHook + 'static) -> Self {
        self.pre_save = Some(Arc::new(hook));
        self
    }

    /// Sets the hook run after every file is written.
    pub fn post_upload(mut self, hook: impl UploadHook + 'static) -> Self {
        self.post_save = Some(Arc::new(hook));
        self
    }

    /// Reduces final names to a safe single path component before saving.
    pub fn sanitize_names(mut self, enabled: bool) -> Self {
        self.sanitize_names = enabled;
        self
    }

    /// Replaces all route options.
    pub fn route(mut self, route: RouteOptions) -> Self {
        self.route = route;
        self
    }

    /// Sets the route path.
    pub fn route_path(mut self, path: impl Into<String>) -> Self {
        self.route.path = path.into();
        self
    }

    /// Sets the route tags.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.route.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the CORS settings passed through to the transport.
    pub fn cors(mut self, cors: Value) -> Self {
        self.route.cors = Some(cors);
        self
    }

    /// Sets the auth settings passed through to the transport.
    pub fn auth(mut self, auth: Value) -> Self {
        self.route.auth = auth;
        self
    }

    /// Sets the request validation options.
    pub fn validation(mut self, options: ValidationOptions) -> Self {
        self.route.validate = options;
        self
    }

    /// Runs every registration check and builds the uploader.
    pub fn build(self) -> Result<FileUploader, ConfigError> {
        let storage_root = self.storage_root.ok_or(ConfigError::MissingStoragePath)?;
        if storage_root.as_os_str().is_empty() {
            return Err(ConfigError::MissingStoragePath);
        }
        check_writable_dir(&storage_root)?;

        if self.max_bytes == Some(0) {
            return Err(ConfigError::InvalidMaxBytes);
        }
        if !self.route.path.starts_with('/') {
            return Err(ConfigError::InvalidRoutePath {
                path: self.route.path,
            });
        }

        let contract = SchemaBuilder::new(self.route.validate).build()?;

        let config = UploadConfig {
            storage_root,
            max_bytes: self.max_bytes,
            generator: self.generator,
            pre_save: self.pre_save,
            post_save: self.post_save,
            sanitize_names: self.sanitize_names,
        };

        let orchestrator = PipelineOrchestrator::new(DiskStorage::new(&config.storage_root))
            .with_naming(NamingResolver::new(config.generator.clone()))
            .with_pre_save(config.pre_save.clone())
            .with_post_save(config.post_save.clone())
            .with_sanitized_names(config.sanitize_names);

        let route = RouteDefinition {
            method: Method::POST,
            path: self.route.path,
            tags: self.route.tags,
            cors: self.route.cors,
            auth: self.route.auth,
            payload: PayloadDirective {
                output: PayloadOutput::Stream,
                parse: true,
                allow: MULTIPART_FORM_DATA,
                max_bytes: config.max_bytes,
            },
            pre: orchestrator.stages(),
            description: ROUTE_DESCRIPTION,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            path = route.path.as_str(),
            stages = ?route.pre,
            "uploader: route registered"
        );

        Ok(FileUploader {
            config: Arc::new(config),
            contract,
            orchestrator,
            route,
        })
    }
}

fn check_writable_dir(path: &Path) -> Result<(), ConfigError> {
    let inaccessible = |reason: String| ConfigError::InaccessibleStoragePath { reason };

    let metadata = std::fs::metadata(path).map_err(|err| inaccessible(err.to_string()))?;
    if !metadata.is_dir() {
        return Err(inaccessible("not a directory".to_owned()));
    }

    // Mode bits ignore ownership and the search bit; only a real create
    // answers for this process.
    let marker = path.join(format!(".write-check-{}", Uuid::new_v4().simple()));
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&marker)
        .map_err(|err| inaccessible(err.to_string()))?;
    std::fs::remove_file(&marker).map_err(|err| inaccessible(err.to_string()))?;

    Ok(())
}
