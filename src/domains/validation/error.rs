//! Validation-specific error types.

use thiserror::Error;

/// Errors raised while compiling field rules into validators.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The assembled schema was rejected by the compiler.
    #[error("Schema compilation failed: {0}")]
    Compile(String),
}

impl SchemaError {
    /// Create a new compile error.
    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }
}
