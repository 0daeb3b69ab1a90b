use thiserror::Error;

use crate::check::CheckError;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("not yet supported by the C backend: {construct}")]
    NotYetSupported { construct: String },
    #[error("unreachable state: {message}")]
    Unreachable { message: String },
    #[error("invalid program: {0}")]
    Invalid(#[from] CheckError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}

impl CodegenError {
    pub(crate) fn not_yet_supported(construct: impl Into<String>) -> Self {
        Self::NotYetSupported {
            construct: construct.into(),
        }
    }

    pub(crate) fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }
}
