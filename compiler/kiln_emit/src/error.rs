//! Emission errors.
//!
//! These are invariant violations inside the compiler, never errors of the
//! program being compiled. Target-program failures are handled by the code
//! this crate emits.

use kiln_calls::ClassifyError;
use kiln_ir::ResultShape;
use thiserror::Error;

/// Failure to render a helper or trampoline body.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("generated body has no signature line")]
    MissingSignature,
    #[error("no template for helper {name}")]
    UnsupportedHelper { name: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("temporary {temp} used after its reference was released")]
    UseAfterRelease { temp: String },
    #[error("temporary {temp} released twice")]
    DoubleRelease { temp: String },
    #[error("temporaries still live at end of statement: {}", .temps.join(", "))]
    LeakedTemporaries { temps: Vec<String> },
    #[error("temporary #{index} does not belong to this function")]
    UnknownTemporary { index: usize },
    #[error("exception target stack popped past the function exit")]
    UnbalancedExceptionTarget,
    #[error("no exception handler is active")]
    NoActiveHandler,
    #[error("cannot convert a {from} result to {to}")]
    UnsupportedConversion { from: ResultShape, to: ResultShape },
    #[error("variable {name} holds {expected} values, not {found}")]
    VariableTypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("expression #{expr} was classified as constant but has no value")]
    MissingConstant { expr: u32 },
    #[error("helper {helper} returns an object and cannot be negated")]
    InvalidNegation { helper: String },
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Render(#[from] RenderError),
}
