//! Errors of the layout engine.

use thiserror::Error;

use crate::layout::{Extent, PartitionKey};

/// Error planning, recovering, or checking a partition layout.
///
/// None of these errors are recoverable for the current build. Callers should abort
/// instead of continuing with a partial layout.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum LayoutError {
    /// A configuration value is not recognized.
    #[error("invalid {setting} {value:?}, expected one of {expected}")]
    Configuration {
        setting: &'static str,
        value: String,
        expected: &'static str,
    },
    /// A computed size is not positive.
    #[error("size of {what} is not positive ({reason})")]
    ArithmeticRange { what: String, reason: String },
    /// An existing partition table lacks an entry or has unparseable fields.
    #[error("unable to recover layout: {reason}")]
    IntrospectionParse { reason: String },
    /// A layout violates one of its structural invariants.
    #[error("inconsistent layout: {reason}")]
    InconsistentLayout { reason: String },
    /// A recovered layout does not match the computed layout.
    #[error("partition {key} does not match (expected {expected}, found {found})")]
    LayoutMismatch {
        key: PartitionKey,
        expected: String,
        found: String,
    },
}

impl LayoutError {
    pub(crate) fn arithmetic_range(what: impl ToString, reason: impl ToString) -> Self {
        Self::ArithmeticRange {
            what: what.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn introspection(reason: impl ToString) -> Self {
        Self::IntrospectionParse {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn inconsistent(reason: impl ToString) -> Self {
        Self::InconsistentLayout {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn mismatch(key: PartitionKey, expected: Option<Extent>, found: Option<Extent>) -> Self {
        fn describe(extent: Option<Extent>) -> String {
            extent
                .map(|extent| extent.to_string())
                .unwrap_or_else(|| "nothing".to_owned())
        }
        Self::LayoutMismatch {
            key,
            expected: describe(expected),
            found: describe(found),
        }
    }
}

/// [`Result`] with [`LayoutError`] as error type.
pub type LayoutResult<T> = Result<T, LayoutError>;
