//! rl-types: cross-crate stable contracts (error taxonomy, provenance tags,
//! issue codes, the fault boundary).
//!
//! Library crates return the typed errors defined here; `anyhow` is reserved
//! for the binary edge.
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub mod errors;
pub mod fault;

pub use errors::{CheckError, ConfigError, EngineError, FormatAttempt, SessionError};
pub use fault::{boundary, install_trace_hook, RuntimeFault};

/// Which resolution branch produced a canonical document.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// The input already was an engine-native document.
    Native,
    /// The input was a list of proxy share links.
    Uri,
    /// The input was a proxy-list (Clash style) YAML document.
    Yaml,
}

impl Provenance {
    /// All branches in resolution order.
    pub const ORDER: [Provenance; 3] = [Provenance::Native, Provenance::Uri, Provenance::Yaml];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Native => "native",
            Provenance::Uri => "uri",
            Provenance::Yaml => "yaml",
        }
    }
}

impl Display for Provenance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable issue codes reported by the structural config checker.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    UnknownField,
    MissingRequired,
    TypeMismatch,
    RangeExceeded,
    InvalidEnum,
    DuplicateTag,
    DanglingReference,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        use IssueCode::*;
        match self {
            UnknownField => "UnknownField",
            MissingRequired => "MissingRequired",
            TypeMismatch => "TypeMismatch",
            RangeExceeded => "RangeExceeded",
            InvalidEnum => "InvalidEnum",
            DuplicateTag => "DuplicateTag",
            DanglingReference => "DanglingReference",
        }
    }
}

impl Display for IssueCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
