//! Error taxonomy for the marshaling layer
//!
//! Every variant is a contract violation by the caller. Nothing is retried
//! internally and a failed operation leaves prior state unchanged.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    /// Malformed or unsupported type description
    InvalidLayout { reason: String },
    /// Value/layout or read/write shape disagreement
    LayoutMismatch { expected: String, found: String },
    /// Append attempted on a finalized builder
    ClosedBuilder,
    /// Operation on memory whose scope has ended
    UseAfterScopeClosed,
    /// Reader advanced past the last appended argument
    ArgumentListExhausted { consumed: usize },
    /// Scope touched from a thread other than its owner
    ScopeConfinementViolation,
    /// The global allocator refused a scope arena
    AllocationFailed { size: usize, align: usize },
    /// Address range not owned by the scope
    InvalidAddress { address: usize, len: usize },
}

impl MarshalError {
    pub fn invalid_layout(reason: impl Into<String>) -> Self {
        Self::InvalidLayout { reason: reason.into() }
    }

    pub fn mismatch(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        Self::LayoutMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Short stable name, used as a structured logging field
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidLayout { .. } => "invalid_layout",
            Self::LayoutMismatch { .. } => "layout_mismatch",
            Self::ClosedBuilder => "closed_builder",
            Self::UseAfterScopeClosed => "use_after_scope_closed",
            Self::ArgumentListExhausted { .. } => "argument_list_exhausted",
            Self::ScopeConfinementViolation => "scope_confinement_violation",
            Self::AllocationFailed { .. } => "allocation_failed",
            Self::InvalidAddress { .. } => "invalid_address",
        }
    }
}

impl fmt::Display for MarshalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLayout { reason } => write!(f, "Invalid layout: {}", reason),
            Self::LayoutMismatch { expected, found } => {
                write!(f, "Layout mismatch: expected {}, found {}", expected, found)
            }
            Self::ClosedBuilder => write!(f, "Builder already finalized"),
            Self::UseAfterScopeClosed => write!(f, "Scope already closed"),
            Self::ArgumentListExhausted { consumed } => {
                write!(f, "Argument list exhausted after {} arguments", consumed)
            }
            Self::ScopeConfinementViolation => {
                write!(f, "Scope accessed outside its owning thread")
            }
            Self::AllocationFailed { size, align } => {
                write!(f, "Failed to allocate {} bytes (align {})", size, align)
            }
            Self::InvalidAddress { address, len } => {
                write!(f, "Address range {:#x}+{} is not owned by this scope", address, len)
            }
        }
    }
}

impl std::error::Error for MarshalError {}

pub type Result<T> = std::result::Result<T, MarshalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = MarshalError::mismatch("i32", "f64");
        assert_eq!(err.to_string(), "Layout mismatch: expected i32, found f64");

        let err = MarshalError::ArgumentListExhausted { consumed: 4 };
        assert_eq!(err.to_string(), "Argument list exhausted after 4 arguments");
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            MarshalError::invalid_layout("x"),
            MarshalError::mismatch("a", "b"),
            MarshalError::ClosedBuilder,
            MarshalError::UseAfterScopeClosed,
            MarshalError::ArgumentListExhausted { consumed: 0 },
            MarshalError::ScopeConfinementViolation,
            MarshalError::AllocationFailed { size: 1, align: 1 },
            MarshalError::InvalidAddress { address: 0, len: 1 },
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
