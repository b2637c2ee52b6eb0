//! Engine configuration

use serde::{Deserialize, Serialize};

/// What to do when a reference to a static member of the old owner has no
/// counterpart in the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Keep referring to the original declaration and warn
    #[default]
    Reuse,
    /// Report an error
    Reject,
}

/// Injection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectConfig {
    /// Maximum nesting of constant evaluation (variable initializers, calls)
    pub max_eval_depth: u32,
    /// Policy for unresolved references to static members
    pub static_capture_fallback: FallbackPolicy,
    /// Report warnings as errors
    pub warnings_as_errors: bool,
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            max_eval_depth: 64,
            static_capture_fallback: FallbackPolicy::Reuse,
            warnings_as_errors: false,
        }
    }
}
