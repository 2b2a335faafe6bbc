//! Error taxonomy for the content pipeline.
//!
//! Every stage that can halt the pipeline reports a [`PipelineError`]. Internals use
//! [`eyre::Result`] with context; the stage boundary flattens the report chain into the
//! matching variant so the operator sees the stage name together with the underlying cause.

use std::fmt;
use std::path::PathBuf;

/// The stage of synthesis that invoked the external renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Video,
    Thumbnail,
}

impl RenderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStage::Video => "video",
            RenderStage::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the renderer process ended (or why it never ran).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    /// The process exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Extra detail, such as a spawn failure or a terminating signal.
    pub detail: Option<String>,
}

impl ExitInfo {
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            detail: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub(crate) fn failed_to_run(report: &eyre::Report) -> Self {
        Self {
            code: None,
            detail: Some(format!("{report:#}")),
        }
    }
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
            detail: if status.code().is_none() {
                Some(status.to_string())
            } else {
                None
            },
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.detail) {
            (Some(code), None) => write!(f, "exit status {code}"),
            (Some(code), Some(detail)) => write!(f, "exit status {code} ({detail})"),
            (None, Some(detail)) => f.write_str(detail),
            (None, None) => f.write_str("terminated without exit status"),
        }
    }
}

/// A halting pipeline failure.
///
/// None of these are retried automatically; a retry is an operator-level re-run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// There is no client configuration file. Needs operator action.
    #[error("configuration error: client configuration not found at {}", path.display())]
    MissingClientConfiguration { path: PathBuf },

    /// Configuration exists but is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The external renderer did not exit successfully.
    ///
    /// The output file of the failed stage must not be treated as usable.
    #[error("render error in {stage} stage: {exit}")]
    Render { stage: RenderStage, exit: ExitInfo },

    /// The authorization code was empty or the token exchange was rejected.
    #[error("authorization error: {0}")]
    Auth(String),

    /// The remote API rejected the publish call. The artifact is left in place.
    #[error("upload error: {reason}")]
    Upload { reason: String },
}

impl PipelineError {
    pub(crate) fn configuration(report: eyre::Report) -> Self {
        Self::Configuration(format!("{report:#}"))
    }

    pub(crate) fn auth(report: eyre::Report) -> Self {
        Self::Auth(format!("{report:#}"))
    }

    pub(crate) fn upload(report: eyre::Report) -> Self {
        Self::Upload {
            reason: format!("{report:#}"),
        }
    }

    /// Short name of the stage that failed, for log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::MissingClientConfiguration { .. } | PipelineError::Configuration(_) => {
                "configuration"
            }
            PipelineError::Render { .. } => "render",
            PipelineError::Auth(_) => "authorization",
            PipelineError::Upload { .. } => "upload",
        }
    }

    /// Setup steps worth printing alongside this failure, if any.
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            PipelineError::MissingClientConfiguration { .. } => Some(crate::CONFIGURATION_GUIDANCE),
            _ => None,
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Failure of a post-publish follow-up. Only ever logged.
#[derive(Debug, thiserror::Error)]
pub enum EngagementError {
    #[error("comment could not be posted: {0}")]
    Comment(String),
    #[error("channel statistics unavailable: {0}")]
    ChannelStats(String),
}
