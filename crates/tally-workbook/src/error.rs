//! Error types for document generation.
//!
//! Every variant is fatal to the document being built. None of them are
//! user-recoverable: they indicate a broken catalogue, a broken builder set
//! or a layout bug, and each names the offending key or coordinate.

use std::fmt;

use serde::Serialize;
use tally_core::{CellAddress, LogicalKey, RegistryError};
use tally_formula::EvalError;

/// Why a formula reference was rejected by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DanglingReason {
    /// No logical key owns the target coordinate.
    Unallocated,
    /// The target lives in another document.
    ForeignDocument,
    /// The target was allocated after the referencing cell.
    Forward,
    /// The target holds text, not a number.
    TextTarget,
}

impl fmt::Display for DanglingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unallocated => "target was never allocated",
            Self::ForeignDocument => "target belongs to another document",
            Self::Forward => "target was allocated after the referencing cell",
            Self::TextTarget => "target holds text",
        })
    }
}

/// Errors raised while assembling a document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// A builder asked for a catalogue key that does not exist.
    #[error("unknown parameter: {key}")]
    UnknownParameter { key: String },

    #[error("parameter {key} is not numeric")]
    NotNumeric { key: String },

    /// Two owners claimed the same coordinate.
    #[error("address collision at {address}: held by {existing}, requested by {requested}")]
    AddressCollision {
        address: CellAddress,
        existing: String,
        requested: String,
    },

    /// A logical key was referenced before any builder placed it.
    #[error("unresolved reference: {key} has not been placed")]
    UnresolvedReference { key: LogicalKey },

    #[error("cyclic builder dependency among: {}", builders.join(", "))]
    CyclicDependency { builders: Vec<String> },

    /// Two builders declare the same product.
    #[error("{key} is produced by both {first} and {second}")]
    DuplicateProducer {
        key: LogicalKey,
        first: String,
        second: String,
    },

    /// A builder touched a key outside its declared sets.
    #[error("builder {builder} used {key} without declaring it")]
    UndeclaredDependency { builder: String, key: LogicalKey },

    /// A builder finished without placing a key it declared.
    #[error("builder {builder} declared {key} but never placed it")]
    MissingProduct { builder: String, key: LogicalKey },

    /// A reserved section received more rows than it holds.
    #[error("section '{section}' on sheet {sheet} is full ({capacity} rows) and cannot take {key}")]
    SectionOverflow {
        sheet: String,
        section: String,
        capacity: u32,
        key: String,
    },

    #[error("dangling reference from {cell} to {target}: {reason}")]
    DanglingReference {
        cell: CellAddress,
        target: CellAddress,
        reason: DanglingReason,
    },

    #[error("protection policy violated at {address}: {reason}")]
    ProtectionPolicy { address: CellAddress, reason: String },

    /// A scenario name or selector value outside the enumerated set.
    #[error("invalid scenario '{value}' for {group} (expected one of: {})", options.join(", "))]
    InvalidScenario {
        group: String,
        value: String,
        options: Vec<String>,
    },

    #[error(transparent)]
    Registry(RegistryError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl From<RegistryError> for EngineError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownParameter { key } => Self::UnknownParameter { key },
            RegistryError::NotNumeric { key } => Self::NotNumeric { key },
            other => Self::Registry(other),
        }
    }
}

impl EngineError {
    pub fn unresolved(key: &LogicalKey) -> Self {
        Self::UnresolvedReference { key: key.clone() }
    }

    pub fn protection(address: &CellAddress, reason: impl Into<String>) -> Self {
        Self::ProtectionPolicy {
            address: address.clone(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the catalogue or the builder set rather
    /// than by a layout mistake inside one builder.
    pub fn is_configuration_bug(&self) -> bool {
        matches!(
            self,
            Self::UnknownParameter { .. }
                | Self::NotNumeric { .. }
                | Self::CyclicDependency { .. }
                | Self::DuplicateProducer { .. }
                | Self::UndeclaredDependency { .. }
                | Self::InvalidScenario { .. }
                | Self::Registry(_)
        )
    }
}

/// A specialized `Result` type for generation.
pub type Result<T> = std::result::Result<T, EngineError>;
