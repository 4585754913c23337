use std::fmt;

/// Errors raised while bringing up a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Window, context or device creation failed.
    Init(String),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::Init(msg) => write!(f, "platform initialization failed: {msg}"),
        }
    }
}

impl std::error::Error for PlatformError {}
