//! Error taxonomy for the Shepherd core.
//!
//! Mirrors the error-handling design in the core spec: precondition errors,
//! config errors, filesystem errors, and engine errors are all fatal and
//! surface through [`ShepherdError`]; resolution misses are *not* modeled as
//! errors at all (they resolve to a literal passthrough, see
//! [`crate::config::resolver`]).

use std::path::PathBuf;
use std::time::Duration;

/// The result type used throughout the crate.
pub type ShepherdResult<T> = Result<T, ShepherdError>;

#[derive(Debug, thiserror::Error)]
pub enum ShepherdError {
    #[error("environment '{0}' not found")]
    EnvironmentNotFound(String),

    #[error("environment '{0}' already exists")]
    EnvironmentAlreadyExists(String),

    #[error("environment template '{0}' not found")]
    EnvironmentTemplateNotFound(String),

    #[error("service template '{0}' not found")]
    ServiceTemplateNotFound(String),

    #[error("service '{0}' not found in environment '{1}'")]
    ServiceNotFound(String, String),

    #[error("no active environment")]
    NoActiveEnvironment,

    #[error("probe '{tag}' not found in environment '{env}'. Available probes: {available}")]
    ProbeNotFound {
        tag: String,
        env: String,
        available: String,
    },

    #[error("environment '{0}' is not running")]
    EnvironmentNotRunning(String),

    #[error("malformed line in value file {path}:{line_no}: {content:?} (expected key=value)")]
    MalformedValueLine {
        path: PathBuf,
        line_no: usize,
        content: String,
    },

    #[error("malformed config document: {0}")]
    MalformedConfig(String),

    #[error("network '{0}' is declared both external and managed")]
    ConflictingNetworkMode(String),

    #[error("volume '{0}' is declared both external and managed")]
    ConflictingVolumeMode(String),

    #[error("container '{0}' has an incomplete build block: both dockerfile_path and context_path are required")]
    IncompleteBuildBlock(String),

    #[error("dockerfile not found at {0}")]
    DockerfileNotFound(PathBuf),

    #[error("build context not found at {0}")]
    BuildContextNotFound(PathBuf),

    #[error("{operation} failed: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {context}: {source}")]
    Yaml {
        context: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("command '{command}' failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("command '{command}' timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("engine binary not found: {0}")]
    EngineNotFound(String),

    #[error("operation aborted by user")]
    Aborted,

    #[error("invalid usage: {0}")]
    InvalidUsage(String),

    #[error("{0}")]
    Generic(String),
}

impl ShepherdError {
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn yaml(context: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    pub fn command_failed(
        command: impl Into<String>,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn command_timeout(command: impl Into<String>, timeout: Duration) -> Self {
        Self::CommandTimeout {
            command: command.into(),
            timeout,
        }
    }

    pub fn probe_not_found(tag: impl Into<String>, env: impl Into<String>, available: &[String]) -> Self {
        Self::ProbeNotFound {
            tag: tag.into(),
            env: env.into(),
            available: available.join(", "),
        }
    }

    /// Exit code this error should surface as, per the CLI exit-code contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidUsage(_) => 2,
            Self::CommandFailed { exit_code, .. } => *exit_code,
            Self::CommandTimeout { .. } => 124,
            _ => 1,
        }
    }

    /// Whether the error represents a condition the caller can reasonably
    /// retry or work around, as opposed to a fatal precondition failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CommandFailed { .. } | Self::CommandTimeout { .. }
        )
    }
}
