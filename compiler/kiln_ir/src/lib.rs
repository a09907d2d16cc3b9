//! Kiln IR - shapes, operators and the expression interface.
//!
//! This crate contains the leaf data of the specialization core:
//! - The closed [`Shape`] catalog with per-shape facts ([`ShapeInfo`])
//! - Operator enums ([`BinaryOp`], [`ComparisonOp`]) and the result
//!   shapes helpers can produce ([`ResultShape`])
//! - The interface consumed from the optimizer ([`ExprQuery`]), plus a
//!   flat arena implementation ([`ExprArena`]) used by tests and drivers
//!
//! # Design Philosophy
//!
//! - **Static tables**: shapes are constants, never created at run time
//! - **Flatten everything**: expressions are `ExprId(u32)` indices
//! - **Capability queries**: callers ask `has_slot_iter()`, not "is it a list"

mod expr;
mod operator;
mod shape;
mod version;

pub use expr::{
    ConstValue, ExceptionFilter, ExprArena, ExprId, ExprKind, ExprNode, ExprQuery, SourcePos,
};
pub use operator::{BinaryOp, ComparisonOp, OperationMode, ResultShape};
pub use shape::{Hashability, Shape, ShapeFlags, ShapeInfo};
pub use version::PythonVersion;
