//! Configuration resolution for relation.
//!
//! Untrusted text goes in, a validated sing-box document comes out:
//!
//! `RawInput` -> `load` -> `native JSON | share links | proxy-list YAML` ->
//! `convert` -> `check` -> [`CanonicalConfig`]
//!
//! ## Key Modules
//! - [`resolve`]: the fixed-order fallback chain ([`FormatResolver`]).
//! - [`share_link`] / [`clash`]: per-format conversion adapters, both
//!   producing [`node::ProxyNode`]s.
//! - [`template`]: the base document proxy-list entries are merged into.
//! - [`check`]: the [`ConfigChecker`] seam and the offline
//!   [`StructuralChecker`].
//! - [`validator`]: tags checker failures with the branch that produced them.
//!
//! Nothing here holds shared mutable state; every entry point is safe to
//! call from any number of threads at once.

pub mod canonical;
pub mod check;
pub mod clash;
pub mod input;
pub mod node;
pub mod resolve;
pub mod share_link;
pub mod template;
pub mod validator;
pub mod writer;

pub use canonical::CanonicalConfig;
pub use check::{ConfigChecker, StructuralChecker};
pub use input::RawInput;
pub use resolve::FormatResolver;
pub use rl_types::{ConfigError, Provenance};
pub use writer::write_canonical;

/// Resolve `raw` with `checker` as the validation backend.
///
/// # Errors
/// See [`FormatResolver::resolve`].
pub fn resolve(raw: &RawInput, checker: &dyn ConfigChecker) -> Result<CanonicalConfig, ConfigError> {
    FormatResolver::new(checker).resolve(raw)
}
