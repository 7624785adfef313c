//! Engine-level error taxonomy.
//!
//! The engine is pure arithmetic: nothing fails under correct inputs. Every
//! error here is a broken invocation contract, detected up front so the
//! streaming loops never read or write out of bounds. There is no retry or
//! partial recovery; an error fails the whole invocation.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The caller broke the invocation contract: mismatched buffer lengths,
    /// out-of-range indices in a range table, a malformed shape table.
    #[error("contract violation: {message}")]
    Contract { message: String },

    /// The formula tree itself is width-inconsistent and cannot be evaluated.
    #[error("malformed formula: {message}")]
    MalformedFormula { message: String },
}

impl EngineError {
    pub fn contract(message: impl Into<String>) -> Self {
        EngineError::Contract {
            message: message.into(),
        }
    }

    pub fn formula(message: impl Into<String>) -> Self {
        EngineError::MalformedFormula {
            message: message.into(),
        }
    }
}
