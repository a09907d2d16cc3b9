//! Operators and result shapes.
//!
//! Operator codes are part of the helper naming contract with the runtime
//! library (`BINARY_OPERATION_ADD_...`, `RICH_COMPARE_LT_...`), so
//! [`BinaryOp::code`] and [`ComparisonOp::code`] must never change.

use std::fmt;

/// Arithmetic, bitwise, shift, power and matrix operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mult,
    FloorDiv,
    TrueDiv,
    /// Python 2 classic division.
    OldDiv,
    Mod,
    Divmod,
    Pow,
    LShift,
    RShift,
    BitAnd,
    BitOr,
    BitXor,
    MatMult,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 15] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mult,
        BinaryOp::FloorDiv,
        BinaryOp::TrueDiv,
        BinaryOp::OldDiv,
        BinaryOp::Mod,
        BinaryOp::Divmod,
        BinaryOp::Pow,
        BinaryOp::LShift,
        BinaryOp::RShift,
        BinaryOp::BitAnd,
        BinaryOp::BitOr,
        BinaryOp::BitXor,
        BinaryOp::MatMult,
    ];

    /// Operator code used in helper identifiers.
    pub fn code(self) -> &'static str {
        match self {
            BinaryOp::Add => "ADD",
            BinaryOp::Sub => "SUB",
            BinaryOp::Mult => "MULT",
            BinaryOp::FloorDiv => "FLOORDIV",
            BinaryOp::TrueDiv => "TRUEDIV",
            BinaryOp::OldDiv => "OLDDIV",
            BinaryOp::Mod => "MOD",
            BinaryOp::Divmod => "DIVMOD",
            BinaryOp::Pow => "POW",
            BinaryOp::LShift => "LSHIFT",
            BinaryOp::RShift => "RSHIFT",
            BinaryOp::BitAnd => "BITAND",
            BinaryOp::BitOr => "BITOR",
            BinaryOp::BitXor => "BITXOR",
            BinaryOp::MatMult => "MATMULT",
        }
    }

    pub fn from_code(code: &str) -> Option<BinaryOp> {
        BinaryOp::ALL.into_iter().find(|op| op.code() == code)
    }

    /// Source-level operator symbol, for diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mult => "*",
            BinaryOp::FloorDiv => "//",
            BinaryOp::TrueDiv | BinaryOp::OldDiv => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Divmod => "divmod()",
            BinaryOp::Pow => "**",
            BinaryOp::LShift => "<<",
            BinaryOp::RShift => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::MatMult => "@",
        }
    }

    /// `a op b == b op a` for the numeric tower.
    ///
    /// Only these operators may have their arguments swapped at a call
    /// site to reuse a helper generated for the reverse ordering.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Mult | BinaryOp::BitOr | BinaryOp::BitAnd | BinaryOp::BitXor
        )
    }

    /// Whether an augmented-assignment form exists.
    pub fn has_inplace(self) -> bool {
        self != BinaryOp::Divmod
    }

    /// Number protocol slot implementing the binary form.
    pub fn slot(self) -> &'static str {
        match self {
            BinaryOp::Add => "nb_add",
            BinaryOp::Sub => "nb_subtract",
            BinaryOp::Mult => "nb_multiply",
            BinaryOp::FloorDiv => "nb_floor_divide",
            BinaryOp::TrueDiv => "nb_true_divide",
            BinaryOp::OldDiv => "nb_divide",
            BinaryOp::Mod => "nb_remainder",
            BinaryOp::Divmod => "nb_divmod",
            BinaryOp::Pow => "nb_power",
            BinaryOp::LShift => "nb_lshift",
            BinaryOp::RShift => "nb_rshift",
            BinaryOp::BitAnd => "nb_and",
            BinaryOp::BitOr => "nb_or",
            BinaryOp::BitXor => "nb_xor",
            BinaryOp::MatMult => "nb_matrix_multiply",
        }
    }

    /// Number protocol slot implementing the in-place form.
    pub fn inplace_slot(self) -> Option<&'static str> {
        let slot = match self {
            BinaryOp::Add => "nb_inplace_add",
            BinaryOp::Sub => "nb_inplace_subtract",
            BinaryOp::Mult => "nb_inplace_multiply",
            BinaryOp::FloorDiv => "nb_inplace_floor_divide",
            BinaryOp::TrueDiv => "nb_inplace_true_divide",
            BinaryOp::OldDiv => "nb_inplace_divide",
            BinaryOp::Mod => "nb_inplace_remainder",
            BinaryOp::Divmod => return None,
            BinaryOp::Pow => "nb_inplace_power",
            BinaryOp::LShift => "nb_inplace_lshift",
            BinaryOp::RShift => "nb_inplace_rshift",
            BinaryOp::BitAnd => "nb_inplace_and",
            BinaryOp::BitOr => "nb_inplace_or",
            BinaryOp::BitXor => "nb_inplace_xor",
            BinaryOp::MatMult => "nb_inplace_matrix_multiply",
        };
        Some(slot)
    }

    /// Sequence protocol slot consulted after the number slots.
    pub fn sequence_slot(self) -> Option<&'static str> {
        match self {
            BinaryOp::Add => Some("sq_concat"),
            BinaryOp::Mult => Some("sq_repeat"),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Rich comparison operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
pub enum ComparisonOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
}

impl ComparisonOp {
    pub const ALL: [ComparisonOp; 6] = [
        ComparisonOp::Lt,
        ComparisonOp::Le,
        ComparisonOp::Eq,
        ComparisonOp::Ne,
        ComparisonOp::Gt,
        ComparisonOp::Ge,
    ];

    /// The comparators a runtime can answer for the reverse comparator
    /// by swapping operands, without a second slot call.
    pub const SHORTCUT: [ComparisonOp; 3] = [ComparisonOp::Lt, ComparisonOp::Le, ComparisonOp::Eq];

    pub fn code(self) -> &'static str {
        match self {
            ComparisonOp::Lt => "LT",
            ComparisonOp::Le => "LE",
            ComparisonOp::Eq => "EQ",
            ComparisonOp::Ne => "NE",
            ComparisonOp::Gt => "GT",
            ComparisonOp::Ge => "GE",
        }
    }

    pub fn from_code(code: &str) -> Option<ComparisonOp> {
        ComparisonOp::ALL.into_iter().find(|op| op.code() == code)
    }

    /// The comparator that gives the same answer with operands swapped.
    pub fn swapped(self) -> ComparisonOp {
        match self {
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::Le => ComparisonOp::Ge,
            ComparisonOp::Eq => ComparisonOp::Eq,
            ComparisonOp::Ne => ComparisonOp::Ne,
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::Ge => ComparisonOp::Le,
        }
    }

    /// `Py_LT` and friends, as passed to `tp_richcompare`.
    pub fn runtime_constant(self) -> &'static str {
        match self {
            ComparisonOp::Lt => "Py_LT",
            ComparisonOp::Le => "Py_LE",
            ComparisonOp::Eq => "Py_EQ",
            ComparisonOp::Ne => "Py_NE",
            ComparisonOp::Gt => "Py_GT",
            ComparisonOp::Ge => "Py_GE",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Eq => "==",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Whether an operation produces a fresh result or updates its left operand.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
pub enum OperationMode {
    Binary,
    Inplace,
}

impl OperationMode {
    pub fn prefix(self) -> &'static str {
        match self {
            OperationMode::Binary => "BINARY",
            OperationMode::Inplace => "INPLACE",
        }
    }
}

/// What kind of value a helper returns.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
pub enum ResultShape {
    /// New reference, `NULL` on error.
    Object,
    /// `NUITKA_BOOL_TRUE` / `NUITKA_BOOL_FALSE` / `NUITKA_BOOL_EXCEPTION`.
    NBool,
    /// Raw C `bool`. Only for operations that cannot fail.
    CBool,
    /// Integer accumulator, error signalled through the error indicator.
    NiLong,
}

impl ResultShape {
    pub fn code(self) -> &'static str {
        match self {
            ResultShape::Object => "OBJECT",
            ResultShape::NBool => "NBOOL",
            ResultShape::CBool => "CBOOL",
            ResultShape::NiLong => "NILONG",
        }
    }

    pub fn from_code(code: &str) -> Option<ResultShape> {
        [
            ResultShape::Object,
            ResultShape::NBool,
            ResultShape::CBool,
            ResultShape::NiLong,
        ]
        .into_iter()
        .find(|r| r.code() == code)
    }

    /// C type of the helper's return value.
    pub fn c_type(self) -> &'static str {
        match self {
            ResultShape::Object => "PyObject *",
            ResultShape::NBool => "nuitka_bool",
            ResultShape::CBool => "bool",
            ResultShape::NiLong => "nuitka_ilong",
        }
    }

    /// Whether the result is a reference the caller must release.
    pub fn is_owned_reference(self) -> bool {
        self == ResultShape::Object
    }

    /// Whether a helper with this result can report failure at all.
    pub fn can_fail(self) -> bool {
        self != ResultShape::CBool
    }
}

impl fmt::Display for ResultShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
