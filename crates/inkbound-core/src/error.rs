//! Engine-reported error types.

use thiserror::Error;

use crate::value::Value;

/// Errors surfaced by a [`crate::engine::StoryEngine`] implementation.
///
/// `UndeclaredVariable` and `InvalidValue` are distinguishable so callers can
/// react to the two variable-write failure modes separately.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A variable name that the loaded story never declares.
    #[error("variable '{0}' has not been declared in the story")]
    UndeclaredVariable(String),

    /// A value incompatible with the variable's declared type.
    #[error("invalid value '{value}' for variable '{name}'")]
    InvalidValue {
        /// The variable that rejected the write.
        name: String,
        /// The rejected value.
        value: Value,
    },

    /// Script text that failed to compile into an engine instance.
    #[error("story script failed to compile: {0}")]
    InvalidScript(String),

    /// Any other failure inside the engine.
    #[error("engine error: {0}")]
    Internal(String),
}
