//! Table-construction errors.
//!
//! These indicate an incomplete or inconsistent rule table, never a
//! condition of the program being compiled.

use kiln_ir::{BinaryOp, Shape};
use thiserror::Error;

use crate::HelperId;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TableError {
    /// A rule names a shape that has no helpers of its own.
    #[error("operator {op}: shape {shape} cannot appear in helper identifiers")]
    UnknownOperandShape { op: String, shape: Shape },

    /// A friend declaration pairs a shape with itself.
    #[error("operator {op}: shape {shape} declared as its own friend")]
    SelfFriend { op: String, shape: Shape },

    /// A declared-but-inactive entry that no rule would generate.
    #[error("inactive entry {id} is not produced by any rule")]
    InactiveNotGenerated { id: HelperId },

    /// String formatting identifiers requested for an operator other than `%`.
    #[error("operator {op}: string formatting rule only applies to MOD")]
    StringFormatOnNonMod { op: BinaryOp },

    /// An in-place rule for an operator that has no in-place form.
    #[error("operator {op}: no in-place form exists")]
    InplaceWithoutSlot { op: BinaryOp },

    /// An identifier ended up both specialized and non-specialized.
    #[error("{id} is both specialized and non-specialized")]
    Overlap { id: HelperId },

    /// Two descriptors for the same operator.
    #[error("operator {op} described twice")]
    DuplicateDescriptor { op: String },

    /// An operator without a descriptor.
    #[error("operator {op} has no descriptor")]
    MissingDescriptor { op: String },
}
