#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Streamed multipart file upload endpoint.
//!
//! A [`FileUploader`] validates an incoming [`UploadRequest`] against a
//! [`StructuralContract`], then runs the fixed stage pipeline: name
//! generation, pre-save hook, save to disk, post-save hook.

/// Uploader builder and registration checks.
pub mod builder;
/// Upload and route configuration.
pub mod config;
/// Error types exposed by this crate.
pub mod error;
/// Extension and MIME type lookups.
pub mod mime_table;
/// Final-name resolution.
pub mod naming;
/// Uploaded parts and inbound requests.
pub mod part;
/// Stage pipeline.
pub mod pipeline;
/// Route definition handed to the transport.
pub mod route;
/// Request structural contract.
pub mod schema;
/// Disk persistence.
pub mod storage;

#[cfg(feature = "axum")]
pub mod axum;

use std::sync::Arc;

pub use builder::UploaderBuilder;
pub use config::{RouteOptions, UploadConfig, UploadSettings};
pub use error::{
    BoxError, ConfigError, HookError, HookKind, NamingError, StorageError, UploadError,
    ValidationError,
};
pub use naming::{NameGenerator, NamingResolver, RandomName};
pub use part::{HookRequest, PartInfo, PartStream, RequestContext, UploadRequest, UploadedPart};
pub use pipeline::{PipelineContext, PipelineOrchestrator, StageName, UploadHook, UploadResponse};
pub use route::{PayloadDirective, PayloadOutput, RouteDefinition};
pub use schema::{SchemaBuilder, StructuralContract, ValidationOptions};
pub use storage::{DiskStorage, FileMetadata, FileRecord, SaveOutcome, UploadedFiles};

/// A registered upload endpoint.
#[derive(Debug)]
pub struct FileUploader {
    config: Arc<UploadConfig>,
    contract: StructuralContract,
    orchestrator: PipelineOrchestrator,
    route: RouteDefinition,
}

impl FileUploader {
    /// Creates a builder.
    pub fn builder() -> UploaderBuilder {
        UploaderBuilder::default()
    }

    /// Returns the immutable upload configuration.
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Returns the structural contract requests are checked against.
    pub fn contract(&self) -> &StructuralContract {
        &self.contract
    }

    /// Returns the route the transport should register.
    pub fn route(&self) -> &RouteDefinition {
        &self.route
    }

    /// Checks a request against the structural contract.
    pub fn validate(&self, request: &UploadRequest) -> Result<(), ValidationError> {
        self.contract.validate(request)
    }

    /// Validates `request`, then runs the stage pipeline over it.
    ///
    /// No stage runs, and no file is written, when validation fails.
    pub async fn handle(&self, request: UploadRequest) -> Result<UploadResponse, UploadError> {
        if let Err(err) = self.validate(&request) {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %err, "uploader: request rejected by contract");
            return Err(err.into());
        }

        self.orchestrator.run(request).await
    }
}
