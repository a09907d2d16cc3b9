//! Declarative operator descriptors.
//!
//! Each operator's helper sets are described as data: which shapes get
//! same-type helpers, which shape pairs are friends, which identifiers are
//! declared but held back. [`crate::derive`] turns a descriptor into ordered
//! helper sets; nothing about an operator is encoded in control flow.

use kiln_ir::{BinaryOp, ResultShape, Shape};

/// Result shapes for plain object results.
pub const OBJECT: &[ResultShape] = &[ResultShape::Object];
/// Object results plus the truth-value (`NBOOL`) variant.
pub const OBJECT_NBOOL: &[ResultShape] = &[ResultShape::Object, ResultShape::NBool];
/// Object results plus the unboxed accumulator variant.
pub const OBJECT_NILONG: &[ResultShape] = &[ResultShape::Object, ResultShape::NiLong];

/// Shapes that may have their order swapped at a call site for a
/// commutative operator.
pub const COMMUTATIVE_ELIGIBLE: [Shape; 6] = [
    Shape::Int,
    Shape::Long,
    Shape::Float,
    Shape::CLong,
    Shape::Digit,
    Shape::CFloat,
];

/// Right operands a format string may be combined with under `%`.
pub const FORMAT_ARGUMENTS: [Shape; 10] = [
    Shape::Int,
    Shape::Long,
    Shape::Float,
    Shape::Str,
    Shape::Unicode,
    Shape::Bytes,
    Shape::Tuple,
    Shape::List,
    Shape::Dict,
    Shape::Object,
];

/// Left operands acting as format strings under `%`.
pub const FORMAT_STRINGS: [Shape; 3] = [Shape::Str, Shape::Unicode, Shape::Bytes];

pub fn is_commutative_eligible(shape: Shape) -> bool {
    COMMUTATIVE_ELIGIBLE.contains(&shape)
}

/// Whether `format % argument` is a combination the runtime supports.
///
/// `bytes % str` and `bytes % int`-as-`INT` and `str % bytes` mix the two
/// string worlds and always raise.
pub fn format_combination_supported(format: Shape, argument: Shape) -> bool {
    !matches!(
        (format, argument),
        (Shape::Bytes, Shape::Str | Shape::Int) | (Shape::Str, Shape::Bytes)
    )
}

/// Same-type rule: `(S, S)`, `(S, OBJECT)`, `(OBJECT, S)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SameType {
    pub shape: Shape,
    pub results: &'static [ResultShape],
}

/// Friend rule: cross-type helpers for two distinct shapes.
///
/// `dominant` is the ordering kept when a commutative operator drops the
/// reverse one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Friends {
    pub dominant: Shape,
    pub other: Shape,
    pub results: &'static [ResultShape],
}

/// How the in-place helper sets of an operator come about.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InplaceRule {
    /// The operator has no in-place form.
    None,
    /// Apply the same-type/friend/default rules directly in in-place mode.
    Direct,
    /// Derive from the binary `OBJECT`-result sets by renaming.
    Derived,
}

/// Everything the rules need to know about one binary operator.
#[derive(Clone, Debug)]
pub struct OperatorDescriptor {
    pub op: BinaryOp,
    pub commutative: bool,
    pub same_type: Vec<SameType>,
    pub friends: Vec<Friends>,
    /// Emit `%` string formatting identifiers.
    pub string_format: bool,
    /// Ordered `(left, right)` pairs that rules produce but that are held
    /// back from generation.
    pub inactive: Vec<(Shape, Shape)>,
    pub inplace: InplaceRule,
    /// Shapes that can never be an in-place target.
    pub no_inplace_targets: Vec<Shape>,
    /// Result shapes of the default `(OBJECT, OBJECT)` helper, and of the
    /// non-specialized enumeration.
    pub default_results: &'static [ResultShape],
    /// Shapes that may meet at run time; pairs over these (plus `OBJECT`)
    /// must be covered by some helper.
    pub operand_shapes: Vec<Shape>,
}

impl OperatorDescriptor {
    /// A descriptor with no rules beyond the default helper.
    pub fn new(op: BinaryOp) -> Self {
        Self {
            op,
            commutative: op.is_commutative(),
            same_type: Vec::new(),
            friends: Vec::new(),
            string_format: false,
            inactive: Vec::new(),
            inplace: if op.has_inplace() {
                InplaceRule::Direct
            } else {
                InplaceRule::None
            },
            no_inplace_targets: Shape::NO_INPLACE_TARGET.to_vec(),
            default_results: OBJECT_NBOOL,
            operand_shapes: Shape::OPERAND.to_vec(),
        }
    }

    #[must_use]
    pub fn same(mut self, shapes: &[Shape], results: &'static [ResultShape]) -> Self {
        self.same_type
            .extend(shapes.iter().map(|&shape| SameType { shape, results }));
        self
    }

    #[must_use]
    pub fn friend(mut self, dominant: Shape, other: Shape, results: &'static [ResultShape]) -> Self {
        self.friends.push(Friends {
            dominant,
            other,
            results,
        });
        self
    }

    /// Every pair of a group are friends; earlier shapes dominate.
    #[must_use]
    pub fn friend_group(mut self, shapes: &[Shape], results: &'static [ResultShape]) -> Self {
        for (i, &dominant) in shapes.iter().enumerate() {
            for &other in &shapes[i + 1..] {
                self.friends.push(Friends {
                    dominant,
                    other,
                    results,
                });
            }
        }
        self
    }

    #[must_use]
    pub fn with_string_format(mut self) -> Self {
        self.string_format = true;
        self
    }

    #[must_use]
    pub fn with_inactive(mut self, left: Shape, right: Shape) -> Self {
        self.inactive.push((left, right));
        self
    }

    #[must_use]
    pub fn with_inplace(mut self, rule: InplaceRule) -> Self {
        self.inplace = rule;
        self
    }

    #[must_use]
    pub fn with_default_results(mut self, results: &'static [ResultShape]) -> Self {
        self.default_results = results;
        self
    }

    pub fn is_inactive(&self, left: Shape, right: Shape) -> bool {
        self.inactive.contains(&(left, right))
    }

    pub fn allows_inplace_target(&self, shape: Shape) -> bool {
        !self.no_inplace_targets.contains(&shape)
    }
}

/// Rules for the rich comparison helpers, shared by all comparators.
#[derive(Clone, Debug)]
pub struct ComparisonDescriptor {
    /// Shapes getting `(OBJECT, S)`, `(S, OBJECT)` and `(S, S)` helpers.
    pub shapes: Vec<Shape>,
    pub results: &'static [ResultShape],
    /// Cross-type pairs specialized for every comparator, both orders.
    pub friends: Vec<(Shape, Shape)>,
    /// Pairs specialized only for the shortcut comparators (`LT`, `LE`,
    /// `EQ`). The others are answered by negating one of those.
    pub shortcut_pairs: Vec<(Shape, Shape)>,
    pub operand_shapes: Vec<Shape>,
}

impl ComparisonDescriptor {
    /// Whether a `(left, right)` pair may have its answers negated.
    pub fn is_shortcut_pair(&self, left: Shape, right: Shape) -> bool {
        self.shortcut_pairs.contains(&(left, right))
    }
}
