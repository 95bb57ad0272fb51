//! Error types for the interpreter.
//!
//! Two domains are kept strictly apart. `NativeError` is the user domain: it
//! describes an error that will be reified into a pseudo-object of class
//! `Error` and thrown inside the running program. `DecodeError` is the host
//! domain: snapshot decoding failures returned to the embedder, never visible
//! to user code.

use thiserror::Error;

use crate::value::Value;

/// The user-level error classes of the world language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Error,
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
    UriError,
    /// Host-defined class for world permission checks.
    PermissionError,
}

impl ErrorKind {
    /// The constructor/prototype name, as registered in the registry.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::UriError => "URIError",
            ErrorKind::PermissionError => "PermissionError",
        }
    }
}

/// An error raised from native code, before the step engine reifies it into a
/// pseudo `Error` object and threads it as a throw completion.
#[derive(Debug, Clone)]
pub enum NativeError {
    /// An error of the given class to be built and thrown.
    Raise { kind: ErrorKind, message: String },
    /// An already-reified user value to rethrow as-is.
    Thrown(Value),
}

impl NativeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        NativeError::Raise {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    pub fn reference_error(name: impl AsRef<str>) -> Self {
        NativeError::Raise {
            kind: ErrorKind::ReferenceError,
            message: format!("{} is not defined", name.as_ref()),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        NativeError::Raise {
            kind: ErrorKind::RangeError,
            message: message.into(),
        }
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        NativeError::Raise {
            kind: ErrorKind::SyntaxError,
            message: message.into(),
        }
    }

    pub fn permission_error(message: impl Into<String>) -> Self {
        NativeError::Raise {
            kind: ErrorKind::PermissionError,
            message: message.into(),
        }
    }
}

/// Snapshot decode failures, per the boundary taxonomy.
///
/// Every variant is fatal to the decode and leaves the target interpreter in
/// its pre-decode state.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Top level is not an ordered record array, or record 0 is not the
    /// interpreter root, or the version is unknown.
    #[error("ShapeError: {0}")]
    Shape(String),

    /// A `{"#": n}` reference points outside the record array.
    #[error("ReferenceError: dangling record reference #{0}")]
    DanglingReference(usize),

    /// A record carries a `type` tag the decoder does not know.
    #[error("TypeError: unknown record type '{0}'")]
    UnknownType(String),

    /// A `Date` record payload is not valid ISO-8601.
    #[error("TypeError: invalid date payload '{0}'")]
    InvalidDate(String),

    /// A `Function` record names a native id absent from this interpreter's
    /// native table.
    #[error("RangeError: missing native function '{0}'")]
    MissingNative(String),

    /// Applying recorded prototypes would create a prototype cycle.
    #[error("TypeError: prototype chain cycle through record #{0}")]
    PrototypeCycle(usize),

    /// A record field has the wrong JSON shape.
    #[error("TypeError: malformed record #{index}: {message}")]
    MalformedRecord { index: usize, message: String },
}
