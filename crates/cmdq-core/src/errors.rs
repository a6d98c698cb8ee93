use thiserror::Error;

/// Result type alias using QueueError
pub type Result<T> = std::result::Result<T, QueueError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code usable for programmatic handling and
/// for assertions in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Validation
    InvalidInput,
    UnknownStatus,
    IllegalTransition,
    RetryUnavailable,
    AlreadyExists,
    NotFound,

    // Batch passes
    MigrationRecord,
    UnsupportedSchemaVersion,
    AudioArtifactMissing,

    // Collaborators
    PipelineFailure,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    Config,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::UnknownStatus => "ERR_UNKNOWN_STATUS",
            ExErrorKind::IllegalTransition => "ERR_ILLEGAL_TRANSITION",
            ExErrorKind::RetryUnavailable => "ERR_RETRY_UNAVAILABLE",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::MigrationRecord => "ERR_MIGRATION_RECORD",
            ExErrorKind::UnsupportedSchemaVersion => "ERR_UNSUPPORTED_SCHEMA_VERSION",
            ExErrorKind::AudioArtifactMissing => "ERR_AUDIO_ARTIFACT_MISSING",
            ExErrorKind::PipelineFailure => "ERR_PIPELINE_FAILURE",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification kind for programmatic handling plus the operation
/// and command it relates to.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    command_id: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            command_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add command ID context
    pub fn with_command_id(mut self, id: impl Into<String>) -> Self {
        self.command_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn command_id(&self) -> Option<&str> {
        self.command_id.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(command_id) = &self.command_id {
            write!(f, " (command_id: {})", command_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    // ===== Persistence =====
    #[error("Store rejected write for command {command_id}: {reason}")]
    StoreWrite { command_id: String, reason: String },

    #[error("Command not found: {command_id}")]
    RecordNotFound { command_id: String },

    #[error("Command id already in use: {command_id}")]
    DuplicateId { command_id: String },

    #[error("Migration to v{version} skipped command {command_id}: {reason}")]
    MigrationRecord {
        version: u32,
        command_id: String,
        reason: String,
    },

    // ===== Audio =====
    #[error("Audio artifact missing for command {command_id}: {audio_path}")]
    AudioArtifactMissing {
        command_id: String,
        audio_path: String,
    },

    #[error("Audio path must be a bare file name: {audio_path}")]
    InvalidAudioPath { audio_path: String },

    // ===== Lifecycle =====
    #[error("Unknown command status: {value}")]
    UnknownStatus { value: String },

    #[error("Illegal status transition for command {command_id}: {from} -> {to}")]
    IllegalTransition {
        command_id: String,
        from: String,
        to: String,
    },

    #[error("Retry unavailable for command {command_id} in status {status} (failed={failed})")]
    RetryUnavailable {
        command_id: String,
        status: String,
        failed: bool,
    },

    #[error("A failed command needs an error message: {command_id}")]
    MissingErrorMessage { command_id: String },

    #[error("Pipeline failure for command {command_id}: {message}")]
    PipelineFailure { command_id: String, message: String },

    // ===== Generic =====
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<QueueError> for ExError {
    fn from(err: QueueError) -> Self {
        let message = err.to_string();
        match err {
            QueueError::StoreWrite { command_id, .. } => ExError::new(ExErrorKind::Persistence)
                .with_command_id(command_id)
                .with_message(message),

            QueueError::RecordNotFound { command_id } => ExError::new(ExErrorKind::NotFound)
                .with_command_id(command_id)
                .with_message(message),

            QueueError::DuplicateId { command_id } => ExError::new(ExErrorKind::AlreadyExists)
                .with_command_id(command_id)
                .with_message(message),

            QueueError::MigrationRecord { command_id, .. } => {
                ExError::new(ExErrorKind::MigrationRecord)
                    .with_op("migration")
                    .with_command_id(command_id)
                    .with_message(message)
            }

            QueueError::AudioArtifactMissing { command_id, .. } => {
                ExError::new(ExErrorKind::AudioArtifactMissing)
                    .with_command_id(command_id)
                    .with_message(message)
            }

            QueueError::InvalidAudioPath { .. } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(message)
            }

            QueueError::UnknownStatus { .. } => {
                ExError::new(ExErrorKind::UnknownStatus).with_message(message)
            }

            QueueError::IllegalTransition { command_id, .. } => {
                ExError::new(ExErrorKind::IllegalTransition)
                    .with_command_id(command_id)
                    .with_message(message)
            }

            QueueError::RetryUnavailable { command_id, .. } => {
                ExError::new(ExErrorKind::RetryUnavailable)
                    .with_op("retry")
                    .with_command_id(command_id)
                    .with_message(message)
            }

            QueueError::MissingErrorMessage { command_id } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_command_id(command_id)
                    .with_message(message)
            }

            QueueError::PipelineFailure { command_id, .. } => {
                ExError::new(ExErrorKind::PipelineFailure)
                    .with_command_id(command_id)
                    .with_message(message)
            }

            QueueError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            QueueError::Internal { .. } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}
