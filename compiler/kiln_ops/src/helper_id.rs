//! Helper identifiers.
//!
//! A [`HelperId`] names one runtime helper function. Its textual form is a
//! link-time contract with the hand-written runtime library:
//!
//! ```text
//! BINARY_OPERATION_<OP>_<RESULT>_<LEFT>_<RIGHT>
//! INPLACE_OPERATION_<OP>_<LEFT>_<RIGHT>
//! RICH_COMPARE_<CMP>_<RESULT>_<LEFT>_<RIGHT>
//! ```
//!
//! In-place identifiers have no result component: the left operand is
//! updated and reused as the result.

use std::fmt;

use kiln_ir::{BinaryOp, ComparisonOp, OperationMode, ResultShape, Shape};

/// What family a helper belongs to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
pub enum HelperKind {
    Operation(OperationMode, BinaryOp),
    Comparison(ComparisonOp),
}

/// Canonical key of one runtime helper.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct HelperId {
    pub kind: HelperKind,
    /// `None` exactly for in-place operations.
    pub result: Option<ResultShape>,
    pub left: Shape,
    pub right: Shape,
}

impl HelperId {
    pub fn binary(op: BinaryOp, result: ResultShape, left: Shape, right: Shape) -> Self {
        Self {
            kind: HelperKind::Operation(OperationMode::Binary, op),
            result: Some(result),
            left,
            right,
        }
    }

    pub fn inplace(op: BinaryOp, left: Shape, right: Shape) -> Self {
        Self {
            kind: HelperKind::Operation(OperationMode::Inplace, op),
            result: None,
            left,
            right,
        }
    }

    pub fn comparison(op: ComparisonOp, result: ResultShape, left: Shape, right: Shape) -> Self {
        Self {
            kind: HelperKind::Comparison(op),
            result: Some(result),
            left,
            right,
        }
    }

    /// Operation helper in `mode`; `result` is dropped for in-place.
    pub fn operation(
        op: BinaryOp,
        mode: OperationMode,
        result: ResultShape,
        left: Shape,
        right: Shape,
    ) -> Self {
        match mode {
            OperationMode::Binary => Self::binary(op, result, left, right),
            OperationMode::Inplace => Self::inplace(op, left, right),
        }
    }

    /// The same helper with operands exchanged.
    pub fn swapped(self) -> Self {
        let kind = match self.kind {
            HelperKind::Comparison(cmp) => HelperKind::Comparison(cmp.swapped()),
            operation @ HelperKind::Operation(..) => operation,
        };
        Self {
            kind,
            result: self.result,
            left: self.right,
            right: self.left,
        }
    }

    /// The same helper with different operand shapes.
    pub fn with_operands(self, left: Shape, right: Shape) -> Self {
        Self {
            left,
            right,
            ..self
        }
    }

    /// The same helper with a different result; in-place helpers keep none.
    pub fn with_result(self, result: ResultShape) -> Self {
        match self.kind {
            HelperKind::Operation(OperationMode::Inplace, _) => self,
            _ => Self {
                result: Some(result),
                ..self
            },
        }
    }

    /// Rewrite a binary helper into its in-place counterpart.
    ///
    /// Returns `None` for comparisons and for helpers already in-place.
    pub fn to_inplace(self) -> Option<Self> {
        match self.kind {
            HelperKind::Operation(OperationMode::Binary, op) => {
                Some(Self::inplace(op, self.left, self.right))
            }
            _ => None,
        }
    }

    pub fn mode(self) -> Option<OperationMode> {
        match self.kind {
            HelperKind::Operation(mode, _) => Some(mode),
            HelperKind::Comparison(_) => None,
        }
    }

    pub fn is_default(self) -> bool {
        self.left.is_object() && self.right.is_object()
    }

    /// Parse the textual form back into an identifier.
    pub fn parse(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('_').collect();
        match parts.as_slice() {
            ["BINARY", "OPERATION", op, result, left, right] => Some(Self::binary(
                BinaryOp::from_code(op)?,
                ResultShape::from_code(result)?,
                Shape::from_name(left)?,
                Shape::from_name(right)?,
            )),
            ["INPLACE", "OPERATION", op, left, right] => Some(Self::inplace(
                BinaryOp::from_code(op)?,
                Shape::from_name(left)?,
                Shape::from_name(right)?,
            )),
            ["RICH", "COMPARE", cmp, result, left, right] => Some(Self::comparison(
                ComparisonOp::from_code(cmp)?,
                ResultShape::from_code(result)?,
                Shape::from_name(left)?,
                Shape::from_name(right)?,
            )),
            _ => None,
        }
    }
}

impl fmt::Display for HelperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            HelperKind::Operation(mode, op) => {
                write!(f, "{}_OPERATION_{}_", mode.prefix(), op.code())?;
                if let Some(result) = self.result {
                    write!(f, "{}_", result.code())?;
                }
            }
            HelperKind::Comparison(cmp) => {
                write!(f, "RICH_COMPARE_{}_", cmp.code())?;
                if let Some(result) = self.result {
                    write!(f, "{}_", result.code())?;
                }
            }
        }
        write!(f, "{}_{}", self.left.name(), self.right.name())
    }
}

impl fmt::Debug for HelperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
