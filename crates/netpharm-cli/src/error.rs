//! Error types for the netpharm CLI
//!
//! User-facing errors with messages that say what to do next. Pipeline
//! failures keep the underlying [`NetpharmError`] reachable through
//! [`CliError::pipeline_error`] so callers can match on the taxonomy.

use netpharm_common::NetpharmError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Comprehensive error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Error raised by a pipeline component
    #[error(transparent)]
    Pipeline(#[from] NetpharmError),

    /// A stage failed; completed stages are kept for resume
    #[error("Stage '{stage}' failed: {source}. Fix the cause and re-run with 'netpharm run --resume {run_dir}'.")]
    StageFailed {
        stage: String,
        run_dir: String,
        source: Box<CliError>,
    },

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check netpharm.yml or NETPHARM__* environment variables.")]
    Config(String),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// YAML parsing failed
    #[error("Failed to parse YAML: {0}. Check the file syntax at the indicated line/column.")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}. Check the file syntax.")]
    JsonParse(#[from] serde_json::Error),

    /// Reading or writing a stage table failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Figure rendering failed
    #[error("Rendering failed: {0}")]
    Render(String),

    /// Directory already has a netpharm.yml
    #[error("Project already initialized: {0}. Use --force to reinitialize.")]
    AlreadyInitialized(String),

    /// Directory is not a pipeline run
    #[error("Not a netpharm run directory: {0}. Pass the directory created by 'netpharm run'.")]
    RunNotFound(String),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a rendering error
    pub fn render(msg: impl std::fmt::Display) -> Self {
        Self::Render(msg.to_string())
    }

    /// Wrap an error with the stage it happened in
    pub fn stage_failed(stage: impl Into<String>, run_dir: impl Into<String>, source: CliError) -> Self {
        Self::StageFailed {
            stage: stage.into(),
            run_dir: run_dir.into(),
            source: Box::new(source),
        }
    }

    /// Underlying pipeline error, looking through stage wrappers
    ///
    /// ```
    /// use netpharm_cli::error::CliError;
    /// use netpharm_common::NetpharmError;
    ///
    /// let err = CliError::stage_failed(
    ///     "pathways",
    ///     "results/run",
    ///     NetpharmError::not_found("no pathways").into(),
    /// );
    /// assert!(matches!(err.pipeline_error(), Some(NetpharmError::NotFound(_))));
    /// ```
    pub fn pipeline_error(&self) -> Option<&NetpharmError> {
        match self {
            Self::Pipeline(e) => Some(e),
            Self::StageFailed { source, .. } => source.pipeline_error(),
            _ => None,
        }
    }
}

impl<E> From<plotters::drawing::DrawingAreaErrorKind<E>> for CliError
where
    E: std::error::Error + Send + Sync,
{
    fn from(e: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        Self::render(e)
    }
}
