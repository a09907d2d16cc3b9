use kiln_emit::{EmitError, RenderError};
use thiserror::Error;

/// Failure while assembling a compilation unit.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("in function `{function}`: {source}")]
    Function {
        function: String,
        #[source]
        source: EmitError,
    },
    #[error("function `{0}` emitted twice")]
    DuplicateFunction(String),
    #[error(transparent)]
    Render(#[from] RenderError),
}
