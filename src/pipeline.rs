//! Ordered upload stages: name generation, pre-save, save, post-save.
//!
//! Stage order is fixed. Only the presence of the optional stages is decided,
//! once, when the uploader is built.

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::Serialize;
use serde_json::Value;

use crate::{
    error::{BoxError, HookError, HookKind, UploadError},
    naming::{sanitize_filename, NamingResolver},
    part::{HookRequest, UploadRequest},
    storage::{DiskStorage, SaveOutcome, UploadedFiles},
};

/// Caller hook run before or after the save stage.
#[async_trait::async_trait]
pub trait UploadHook: Send + Sync {
    /// Runs the hook. A returned value is stored in the pipeline context; for
    /// the post-save hook it also replaces the response body.
    async fn invoke(
        &self,
        request: &HookRequest,
        context: &PipelineContext,
    ) -> Result<Option<Value>, BoxError>;
}

#[async_trait::async_trait]
impl<F> UploadHook for F
where
    F: Fn(&HookRequest, &PipelineContext) -> Result<Option<Value>, BoxError> + Send + Sync,
{
    async fn invoke(
        &self,
        request: &HookRequest,
        context: &PipelineContext,
    ) -> Result<Option<Value>, BoxError> {
        self(request, context)
    }
}

/// Name under which a stage is registered and its output is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageName {
    /// Final-name computation through the configured generator.
    FileNames,
    /// Pre-save hook.
    PreUpload,
    /// Persistence.
    File,
    /// Post-save hook.
    PostUpload,
}

impl StageName {
    /// Returns the assignment key of the stage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileNames => "fileNames",
            Self::PreUpload => "preUpload",
            Self::File => "file",
            Self::PostUpload => "postUpload",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request accumulator threading stage outputs forward.
#[derive(Debug, Default)]
pub struct PipelineContext {
    /// Names computed by the generator stage, keyed by field.
    pub file_names: Option<BTreeMap<String, String>>,
    /// Value returned by the pre-save hook.
    pub pre_upload: Option<Value>,
    /// Records produced by the save stage.
    pub file: Option<SaveOutcome>,
    /// Value returned by the post-save hook.
    pub post_upload: Option<Value>,
}

/// Response body of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UploadResponse {
    /// Output of the post-save hook, returned verbatim.
    Custom(Value),
    /// Metadata of the persisted files, with paths removed.
    Files(UploadedFiles),
}

/// Runs the configured stages over a validated request.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    naming: NamingResolver,
    pre_save: Option<Arc<dyn UploadHook>>,
    storage: DiskStorage,
    post_save: Option<Arc<dyn UploadHook>>,
    sanitize_names: bool,
}

impl fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("stages", &self.stages())
            .field("storage", &self.storage)
            .field("sanitize_names", &self.sanitize_names)
            .finish()
    }
}

impl PipelineOrchestrator {
    /// Creates an orchestrator that only saves.
    pub fn new(storage: DiskStorage) -> Self {
        Self {
            naming: NamingResolver::default(),
            pre_save: None,
            storage,
            post_save: None,
            sanitize_names: false,
        }
    }

    /// Fills the name-generation slot.
    pub fn with_naming(mut self, naming: NamingResolver) -> Self {
        self.naming = naming;
        self
    }

    /// Fills the pre-save slot.
    pub fn with_pre_save(mut self, hook: Option<Arc<dyn UploadHook>>) -> Self {
        self.pre_save = hook;
        self
    }

    /// Fills the post-save slot.
    pub fn with_post_save(mut self, hook: Option<Arc<dyn UploadHook>>) -> Self {
        self.post_save = hook;
        self
    }

    /// Reduces every final name to a safe single path component before saving.
    pub fn with_sanitized_names(mut self, enabled: bool) -> Self {
        self.sanitize_names = enabled;
        self
    }

    /// Returns the storage engine.
    pub fn storage(&self) -> &DiskStorage {
        &self.storage
    }

    /// Returns the configured stages in execution order.
    pub fn stages(&self) -> Vec<StageName> {
        let mut stages = Vec::with_capacity(4);
        if self.naming.has_generator() {
            stages.push(StageName::FileNames);
        }
        if self.pre_save.is_some() {
            stages.push(StageName::PreUpload);
        }
        stages.push(StageName::File);
        if self.post_save.is_some() {
            stages.push(StageName::PostUpload);
        }
        stages
    }

    /// Runs every configured stage over `request` and assembles the response.
    ///
    /// The request is assumed to satisfy the structural contract.
    pub async fn run(&self, request: UploadRequest) -> Result<UploadResponse, UploadError> {
        let UploadRequest { context, payload } = request;
        let request = HookRequest::new(context, &payload);
        let mut context = PipelineContext::default();

        if self.naming.has_generator() {
            let names = self
                .naming
                .resolve_all(&payload, &request.context)
                .map_err(|err| failed(StageName::FileNames, err.into()))?;
            context.file_names = Some(names);
        }

        if let Some(hook) = &self.pre_save {
            let output = hook
                .invoke(&request, &context)
                .await
                .map_err(|source| {
                    failed(
                        StageName::PreUpload,
                        HookError {
                            kind: HookKind::PreSave,
                            source,
                        }
                        .into(),
                    )
                })?;
            context.pre_upload = output;
        }

        let mut names = match &context.file_names {
            Some(names) => names.clone(),
            None => NamingResolver::default()
                .resolve_all(&payload, &request.context)
                .map_err(|err| failed(StageName::File, err.into()))?,
        };
        if self.sanitize_names {
            for name in names.values_mut() {
                *name = sanitize_filename(name);
            }
        }
        let saved = self
            .storage
            .save(payload, &names)
            .await
            .map_err(|err| failed(StageName::File, err.into()))?;
        let files = saved.metadata();
        context.file = Some(saved);

        if let Some(hook) = &self.post_save {
            let output = hook
                .invoke(&request, &context)
                .await
                .map_err(|source| {
                    failed(
                        StageName::PostUpload,
                        HookError {
                            kind: HookKind::PostSave,
                            source,
                        }
                        .into(),
                    )
                })?;
            context.post_upload = output;
        }

        Ok(match context.post_upload {
            Some(custom) if replaces_response(&custom) => UploadResponse::Custom(custom),
            _ => UploadResponse::Files(files),
        })
    }
}

/// Empty post-save outputs (`null`, `false`, `0`, `""`) keep the file metadata.
fn replaces_response(output: &Value) -> bool {
    match output {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn failed(stage: StageName, err: UploadError) -> UploadError {
    #[cfg(feature = "tracing")]
    tracing::error!(stage = stage.as_str(), error = %err, "upload pipeline stage failed");
    #[cfg(not(feature = "tracing"))]
    let _ = stage;
    err
}
