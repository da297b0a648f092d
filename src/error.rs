//! Error taxonomy for the storage core.
//!
//! Validation, type, I/O and size errors are recoverable data problems and are
//! returned as [`CoreError`]. Programming errors (violated preconditions such as
//! calling `set_table` twice, or reading a field before a page is attached) are
//! not represented here: they `panic!`/`expect()` at the point of violation,
//! the same way internal `assert!`/`debug_assert!` chains do for invariants
//! that should never be false in correct calling code.

use thiserror::Error;

/// Recoverable error conditions raised by the storage core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A structure field accessor was given a name not present in the description.
    #[error("field not found: {0}")]
    FieldNotFound(String),

    /// A typed accessor was called on a field whose stored type disagrees.
    #[error("type mismatch for field {field}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A numeric value, length, or array index fell outside its permitted range.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// A virtual buffer read or write exceeded the buffer without growth permission.
    #[error("invalid size: {0}")]
    InvalidSize(String),

    /// A page file lookup failed to find a previously handed-out page.
    #[error("page not found at offset {0}")]
    PageNotFound(u64),

    /// A name failed identifier validation (empty, starts with a digit, reserved prefix, etc).
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A type name did not resolve to a basic type or a known complex type.
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// Two mutually exclusive options/fields were both supplied.
    #[error("exclusive fields: {0}")]
    ExclusiveFields(String),

    /// A complex-type dependency graph contains a cycle.
    #[error("type cycle detected: {0}")]
    TypeCycle(String),

    /// A parsed parameter had the wrong shape or an unparsable value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A required parameter/section was absent from a text definition.
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// A name or version mismatched between a file's contents and its file name/location.
    #[error("type mismatch: {0}")]
    SchemaMismatch(String),

    /// Two things that should compare equal (e.g. a table name) did not.
    #[error("logic error: {0}")]
    LogicError(String),

    /// Underlying I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A named file could not be found and was required.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The requested behavior is a documented gap, not a bug: the original never
    /// settled on one (e.g. right-shifting a virtual buffer).
    #[error("not yet implemented: {0}")]
    NotYetImplemented(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
