// Error taxonomy for one notifier invocation.
//
// Evaluation itself is total over strings and has no error type. Dispatch
// failures travel as `DispatchOutcome` values and are only lifted into
// `UrgencyError` by the pipeline.

use std::path::PathBuf;
use std::time::Duration;

/// Invalid or incomplete configuration. Detected before any dispatch.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("threshold {0} is outside [0.0, 1.0]")]
    ThresholdOutOfRange(f64),
    #[error("no destination channel: pass --channel or set a default channel")]
    MissingChannel,
    #[error("live delivery requires credential variable {0}")]
    MissingCredential(String),
    #[error("signal #{index} is invalid: {reason}")]
    InvalidSignal { index: usize, reason: String },
    #[error("unsupported signal table version {0}")]
    UnsupportedSignalVersion(u32),
    #[error("server '{name}' is not defined in {path:?}")]
    UnknownServer { name: String, path: PathBuf },
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The text to evaluate could not be obtained.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to read input file {path:?}: {source}")]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read standard input: {0}")]
    Stdin(#[source] std::io::Error),
    #[error("standard input is empty and no text or file was given")]
    EmptyStdin,
    #[error("no input: pass TEXT, --file, or pipe text on standard input")]
    NoInput,
}

/// The external tool server could not be brought up.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server did not become ready within {0:?}")]
    StartupTimeout(Duration),
    #[error("server handshake failed: {0}")]
    Handshake(#[source] TransportError),
}

/// Failure talking to the tool server once it is running.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("i/o error on server pipe: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed server message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("server closed its output")]
    Closed,
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("server returned error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("tool `{tool}` failed: {message}")]
    Tool { tool: String, message: String },
    #[error("transport is not connected")]
    NotConnected,
}

/// Top-level error of an invocation, mapped onto the process exit code.
#[derive(Debug, thiserror::Error)]
pub enum UrgencyError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("transport startup failed: {0}")]
    TransportStartup(#[from] LifecycleError),
    #[error("destination '{0}' was not found")]
    DestinationNotFound(String),
    #[error("dispatch failed: {0}")]
    DispatchTransport(String),
}

impl UrgencyError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Input(_) => 3,
            Self::TransportStartup(_) => 4,
            Self::DestinationNotFound(_) => 5,
            Self::DispatchTransport(_) => 6,
        }
    }
}
