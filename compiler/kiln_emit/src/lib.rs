//! Kiln Emit - C code emission for the Kiln compiler.
//!
//! Lowers expressions and statements into C text against the runtime API:
//!
//! - every intermediate value lives in a named temporary with tracked
//!   reference ownership ([`temps`]);
//! - every fallible operation is followed by the error propagation
//!   protocol ([`EmitContext::emit_failure_check`]);
//! - operations go through the helper chosen by the [`HelperRegistry`],
//!   calls through the convention chosen by the call classifier;
//! - count-parameterized call helpers beyond the prebuilt set are
//!   requested per unit and generated once each ([`TrampolineRegistry`]).
//!
//! [`HelperRegistry`]: kiln_ops::HelperRegistry

mod call;
mod config;
mod constants;
mod context;
mod declaration;
mod emitter;
mod error;
mod expr;
mod operation;
mod protocol;
mod render;
pub mod temps;
#[cfg(test)]
mod test_support;
mod trampoline;

pub use config::EmitConfig;
pub use constants::{deep_copy_function, ConstantPool};
pub use context::{EmitContext, ExceptionKeeper, FUNCTION_EXCEPTION_EXIT, FUNCTION_RETURN_EXIT};
pub use declaration::extract_declaration;
pub use emitter::{Emitter, Lowered, Stmt, UnitState};
pub use error::{EmitError, RenderError};
pub use protocol::c_string_literal;
pub use render::{
    box_expression, c_param, OperationBodyData, Renderer, TextRenderer, TrampolineBodyData,
};
pub use trampoline::{SealedTrampolines, TrampolineCode, TrampolineRegistry};
