use thiserror::Error;

use crate::{check::CheckError, runtime::RuntimeError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterpretError {
    #[error("not yet supported by the interpreter: {construct}")]
    NotYetSupported { construct: String },
    #[error("unreachable state: {message}")]
    Unreachable { message: String },
    #[error("recursion deeper than {limit} calls")]
    RecursionLimit { limit: usize },
    #[error("executed more than {limit} instructions")]
    InstructionLimit { limit: u64 },
    #[error("assertion failed")]
    AssertionFailed,
    #[error("invalid program: {0}")]
    Invalid(#[from] CheckError),
    #[error("runtime invariant violated: {0}")]
    Runtime(#[from] RuntimeError),
}

impl InterpretError {
    pub(crate) fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    pub(crate) fn not_yet_supported(construct: impl Into<String>) -> Self {
        Self::NotYetSupported {
            construct: construct.into(),
        }
    }
}
