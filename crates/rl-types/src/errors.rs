//! Error taxonomy shared by the resolver, the session controller and the
//! engine adapters.
//!
//! Format and validation failures are [`ConfigError`]; lifecycle failures are
//! [`SessionError`]; anything an engine adapter reports is an [`EngineError`]
//! that the controller wraps with the lifecycle step it happened in.

use crate::fault::RuntimeFault;
use crate::Provenance;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// One failed parse attempt of the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatAttempt {
    pub provenance: Provenance,
    pub reason: String,
}

impl FormatAttempt {
    pub fn new(provenance: Provenance, reason: impl Into<String>) -> Self {
        Self {
            provenance,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FormatAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provenance, self.reason)
    }
}

fn render_attempts(attempts: &[FormatAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure reported by a config checker. The message is the checker's own
/// wording, untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct CheckError(pub String);

impl CheckError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors produced while turning raw input into a canonical document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither inline content nor a readable non-empty file was supplied.
    #[error("empty config")]
    EmptyInput,

    /// The referenced file could not be read. Never a fallback trigger.
    #[error("failed to read config from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No branch could parse the content; one attempt per branch.
    #[error("unsupported config format ({})", render_attempts(.attempts))]
    Unsupported { attempts: Vec<FormatAttempt> },

    /// A proxy-list document parsed but listed no proxies.
    #[error("no outbounds found")]
    NoOutbounds,

    /// A branch parsed but its entries could not be converted.
    #[error("[{provenance}] conversion failed: {message}")]
    Conversion {
        provenance: Provenance,
        message: String,
    },

    /// A branch produced a document the checker rejected.
    #[error("[{provenance}] invalid config: {source}")]
    Validation {
        provenance: Provenance,
        #[source]
        source: CheckError,
    },

    /// The canonical document could not be persisted.
    #[error("failed to write config to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fault(#[from] RuntimeFault),
}

impl ConfigError {
    /// Provenance of the branch that failed, when the failure belongs to one.
    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            Self::Conversion { provenance, .. } | Self::Validation { provenance, .. } => {
                Some(*provenance)
            }
            Self::NoOutbounds => Some(Provenance::Yaml),
            _ => None,
        }
    }
}

/// Errors reported by an engine adapter or one of its instances.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Message(String),

    #[error("{0} is not supported by this engine")]
    Unsupported(&'static str),
}

impl EngineError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Errors returned by the session controller's public operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Stop was called with no retained instance. Normal and non-fatal.
    #[error("engine is not running")]
    NotRunning,

    /// Restart was called with no retained instance.
    #[error("instance not found")]
    InstanceNotFound,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("error creating engine instance: {0}")]
    Construction(#[source] EngineError),

    #[error("error starting engine instance: {0}")]
    Start(#[source] EngineError),

    #[error("error while stopping engine instance: {0}")]
    Close(#[source] EngineError),

    #[error("url test failed: {0}")]
    UrlTest(#[source] EngineError),

    #[error("engine setup failed: {0}")]
    Setup(#[source] EngineError),

    #[error(transparent)]
    Fault(#[from] RuntimeFault),
}

impl SessionError {
    /// Stable short name, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotRunning => "not_running",
            Self::InstanceNotFound => "instance_not_found",
            Self::Config(_) => "config",
            Self::Construction(_) => "construction",
            Self::Start(_) => "start",
            Self::Close(_) => "close",
            Self::UrlTest(_) => "url_test",
            Self::Setup(_) => "setup",
            Self::Fault(_) => "fault",
        }
    }
}
