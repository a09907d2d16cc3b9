//! The process-wide helper registry and helper selection.
//!
//! [`HelperRegistry`] holds the derived sets of every operator in both
//! modes and of every comparator. It is built once, validated as a whole,
//! and read-only afterwards.
//!
//! Selection answers "which helper does this call site use": the exact
//! specialized helper if there is one, otherwise the cheapest rewrite that
//! reaches a specialized helper (argument swap, reversed comparator,
//! negation, one-sided helper), otherwise the generic default.

use std::sync::OnceLock;

use kiln_ir::{BinaryOp, ComparisonOp, OperationMode, ResultShape, Shape};

use crate::derive::{derive_comparison, derive_operation, DerivedSets};
use crate::descriptor::{is_commutative_eligible, ComparisonDescriptor, OperatorDescriptor};
use crate::{tables, HelperId, HelperKind, HelperSet, TableError};

/// Which of an operator's two sets to look at.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SetKind {
    Specialized,
    NonSpecialized,
}

/// The helper chosen for one operation site.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HelperSelection {
    pub id: HelperId,
    /// A dedicated helper rather than the `(OBJECT, OBJECT)` generic path.
    pub specialized: bool,
    /// Pass the operands in reverse order.
    pub swapped: bool,
    /// Invert the boolean result.
    pub negated: bool,
    /// The left operand is unboxed and must be boxed before the call.
    pub box_left: bool,
    /// The right operand is unboxed and must be boxed before the call.
    pub box_right: bool,
}

impl HelperSelection {
    fn new(id: HelperId, left: Shape, right: Shape, swapped: bool, negated: bool) -> Self {
        let (for_left, for_right) = if swapped {
            (id.right, id.left)
        } else {
            (id.left, id.right)
        };
        Self {
            id,
            specialized: !id.is_default(),
            swapped,
            negated,
            box_left: left.is_machine() && !for_left.is_machine(),
            box_right: right.is_machine() && !for_right.is_machine(),
        }
    }

    /// The result shape the helper actually returns.
    pub fn result(&self) -> Option<ResultShape> {
        self.id.result
    }
}

/// Derived helper sets for every operator, mode and comparator.
#[derive(Debug)]
pub struct HelperRegistry {
    descriptors: Vec<OperatorDescriptor>,
    binary: Vec<DerivedSets>,
    inplace: Vec<DerivedSets>,
    comparison_rules: ComparisonDescriptor,
    comparisons: Vec<DerivedSets>,
}

#[inline]
fn op_index(op: BinaryOp) -> usize {
    op as usize
}

#[inline]
fn cmp_index(cmp: ComparisonOp) -> usize {
    cmp as usize
}

impl HelperRegistry {
    /// Build from the built-in rule tables.
    pub fn build() -> Result<Self, TableError> {
        Self::from_descriptors(
            tables::operator_descriptors(),
            tables::comparison_descriptor(),
        )
    }

    /// Build from explicit descriptors; exactly one per binary operator.
    pub fn from_descriptors(
        descriptors: Vec<OperatorDescriptor>,
        comparison_rules: ComparisonDescriptor,
    ) -> Result<Self, TableError> {
        let mut slots: Vec<Option<OperatorDescriptor>> = vec![None; BinaryOp::ALL.len()];
        for desc in descriptors {
            let slot = &mut slots[op_index(desc.op)];
            if slot.is_some() {
                return Err(TableError::DuplicateDescriptor {
                    op: desc.op.code().to_owned(),
                });
            }
            *slot = Some(desc);
        }

        let mut ordered = Vec::with_capacity(slots.len());
        for (op, slot) in BinaryOp::ALL.into_iter().zip(slots) {
            match slot {
                Some(desc) => ordered.push(desc),
                None => {
                    return Err(TableError::MissingDescriptor {
                        op: op.code().to_owned(),
                    })
                }
            }
        }

        let mut binary = Vec::with_capacity(ordered.len());
        let mut inplace = Vec::with_capacity(ordered.len());
        for desc in &ordered {
            let b = derive_operation(desc, OperationMode::Binary)?;
            let i = derive_operation(desc, OperationMode::Inplace)?;
            tracing::debug!(
                op = desc.op.code(),
                binary_specialized = b.specialized.len(),
                binary_generic = b.non_specialized.len(),
                inplace_specialized = i.specialized.len(),
                inplace_generic = i.non_specialized.len(),
                "operator helper sets"
            );
            binary.push(b);
            inplace.push(i);
        }

        let comparisons = ComparisonOp::ALL
            .into_iter()
            .map(|cmp| derive_comparison(&comparison_rules, cmp))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            specialized = comparisons.iter().map(|s| s.specialized.len()).sum::<usize>(),
            "comparison helper sets"
        );

        Ok(Self {
            descriptors: ordered,
            binary,
            inplace,
            comparison_rules,
            comparisons,
        })
    }

    /// The shared registry built from the built-in tables.
    ///
    /// # Panics
    ///
    /// Panics if the built-in tables are inconsistent.
    pub fn global() -> &'static HelperRegistry {
        static REGISTRY: OnceLock<HelperRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| match HelperRegistry::build() {
            Ok(registry) => registry,
            Err(err) => panic!("inconsistent helper tables: {err}"),
        })
    }

    pub fn descriptor(&self, op: BinaryOp) -> &OperatorDescriptor {
        &self.descriptors[op_index(op)]
    }

    pub fn comparison_rules(&self) -> &ComparisonDescriptor {
        &self.comparison_rules
    }

    pub fn operation_sets(&self, op: BinaryOp, mode: OperationMode) -> &DerivedSets {
        match mode {
            OperationMode::Binary => &self.binary[op_index(op)],
            OperationMode::Inplace => &self.inplace[op_index(op)],
        }
    }

    pub fn comparison_sets(&self, cmp: ComparisonOp) -> &DerivedSets {
        &self.comparisons[cmp_index(cmp)]
    }

    /// The ordered specialized or non-specialized set of one operator.
    pub fn helper_set(&self, op: BinaryOp, mode: OperationMode, kind: SetKind) -> &HelperSet {
        let sets = self.operation_sets(op, mode);
        match kind {
            SetKind::Specialized => &sets.specialized,
            SetKind::NonSpecialized => &sets.non_specialized,
        }
    }

    /// All operation sets, operator-major, binary before in-place.
    pub fn operation_tables(
        &self,
    ) -> impl Iterator<Item = (BinaryOp, OperationMode, &DerivedSets)> + '_ {
        BinaryOp::ALL.into_iter().flat_map(move |op| {
            [OperationMode::Binary, OperationMode::Inplace]
                .into_iter()
                .map(move |mode| (op, mode, self.operation_sets(op, mode)))
        })
    }

    /// All comparison sets in comparator order.
    pub fn comparison_tables(&self) -> impl Iterator<Item = (ComparisonOp, &DerivedSets)> + '_ {
        ComparisonOp::ALL
            .into_iter()
            .map(move |cmp| (cmp, self.comparison_sets(cmp)))
    }

    fn sets_of(&self, id: &HelperId) -> &DerivedSets {
        match id.kind {
            HelperKind::Operation(mode, op) => self.operation_sets(op, mode),
            HelperKind::Comparison(cmp) => self.comparison_sets(cmp),
        }
    }

    /// Whether a dedicated body is generated for `id`.
    pub fn is_specialized(&self, id: &HelperId) -> bool {
        self.sets_of(id).specialized.contains(id)
    }

    /// Whether `id` is known to occur but uses the generic path.
    pub fn is_non_specialized(&self, id: &HelperId) -> bool {
        self.sets_of(id).non_specialized.contains(id)
    }

    pub fn select_binary(
        &self,
        op: BinaryOp,
        result: ResultShape,
        left: Shape,
        right: Shape,
    ) -> HelperSelection {
        self.select_operation(op, OperationMode::Binary, result, left, right)
    }

    pub fn select_inplace(&self, op: BinaryOp, left: Shape, right: Shape) -> HelperSelection {
        self.select_operation(op, OperationMode::Inplace, ResultShape::Object, left, right)
    }

    /// Choose the helper for `left op right`.
    ///
    /// `result` is ignored for in-place operations. When no helper with the
    /// requested result exists the `OBJECT`-result default is chosen;
    /// callers convert via [`HelperSelection::result`].
    pub fn select_operation(
        &self,
        op: BinaryOp,
        mode: OperationMode,
        result: ResultShape,
        left: Shape,
        right: Shape,
    ) -> HelperSelection {
        let (l, r) = (left.helper_shape(), right.helper_shape());
        let sets = self.operation_sets(op, mode);
        let desc = self.descriptor(op);
        let make = |l, r| HelperId::operation(op, mode, result, l, r);

        let exact = make(l, r);
        let selection = if sets.specialized.contains(&exact) {
            Some(HelperSelection::new(exact, left, right, false, false))
        } else if sets.non_specialized.contains(&exact) {
            tracing::debug!(helper = %exact, "using generic path for non-specialized helper");
            None
        } else {
            let swappable = mode == OperationMode::Binary
                && desc.commutative
                && is_commutative_eligible(l)
                && is_commutative_eligible(r);
            let swapped = exact.swapped();
            if swappable && sets.specialized.contains(&swapped) {
                Some(HelperSelection::new(swapped, left, right, true, false))
            } else {
                [make(l, Shape::Object), make(Shape::Object, r)]
                    .into_iter()
                    .find(|id| !id.is_default() && sets.specialized.contains(id))
                    .map(|id| HelperSelection::new(id, left, right, false, false))
            }
        };

        let selection = selection.unwrap_or_else(|| {
            let default = make(Shape::Object, Shape::Object);
            let default = if sets.specialized.contains(&default) {
                default
            } else {
                HelperId::operation(op, mode, ResultShape::Object, Shape::Object, Shape::Object)
            };
            HelperSelection::new(default, left, right, false, false)
        });
        tracing::trace!(
            op = op.code(),
            left = left.name(),
            right = right.name(),
            helper = %selection.id,
            swapped = selection.swapped,
            "selected operation helper"
        );
        selection
    }

    /// Choose the helper for `left cmp right`.
    ///
    /// A `CBOOL` request that cannot be met falls back to `NBOOL`.
    pub fn select_comparison(
        &self,
        cmp: ComparisonOp,
        result: ResultShape,
        left: Shape,
        right: Shape,
    ) -> HelperSelection {
        let (l, r) = (left.helper_shape(), right.helper_shape());
        let found = |id: HelperId| self.is_specialized(&id);
        let exact = HelperId::comparison(cmp, result, l, r);

        let mut selection = None;
        if found(exact) {
            selection = Some(HelperSelection::new(exact, left, right, false, false));
        } else if self.comparison_sets(cmp).non_specialized.contains(&exact) {
            tracing::debug!(helper = %exact, "using generic path for non-specialized helper");
        } else if found(exact.swapped()) {
            selection = Some(HelperSelection::new(exact.swapped(), left, right, true, false));
        } else if let Some(negated) = self.negation(cmp, result, l, r) {
            selection = Some(negated);
        } else {
            selection = [
                HelperId::comparison(cmp, result, l, Shape::Object),
                HelperId::comparison(cmp, result, Shape::Object, r),
            ]
            .into_iter()
            .find(|&id| !id.is_default() && found(id))
            .map(|id| HelperSelection::new(id, left, right, false, false));
        }

        let selection = match selection {
            Some(selection) => selection,
            None if result == ResultShape::CBool => {
                return self.select_comparison(cmp, ResultShape::NBool, left, right);
            }
            None => {
                let default = HelperId::comparison(cmp, result, Shape::Object, Shape::Object);
                let default = if found(default) {
                    default
                } else {
                    default.with_result(ResultShape::Object)
                };
                HelperSelection::new(default, left, right, false, false)
            }
        };
        tracing::trace!(
            cmp = cmp.code(),
            left = left.name(),
            right = right.name(),
            helper = %selection.id,
            swapped = selection.swapped,
            negated = selection.negated,
            "selected comparison helper"
        );
        selection
    }

    /// `a > b` as `not (a <= b)` and friends, only where the operands
    /// are totally ordered integers.
    fn negation(
        &self,
        cmp: ComparisonOp,
        result: ResultShape,
        left: Shape,
        right: Shape,
    ) -> Option<HelperSelection> {
        if result == ResultShape::Object {
            return None;
        }
        let rules = &self.comparison_rules;
        if !rules.is_shortcut_pair(left, right) && !rules.is_shortcut_pair(right, left) {
            return None;
        }
        let inverse = match cmp {
            ComparisonOp::Gt => ComparisonOp::Le,
            ComparisonOp::Ge => ComparisonOp::Lt,
            ComparisonOp::Ne => ComparisonOp::Eq,
            ComparisonOp::Lt => ComparisonOp::Ge,
            ComparisonOp::Le => ComparisonOp::Gt,
            ComparisonOp::Eq => ComparisonOp::Ne,
        };
        let direct = HelperId::comparison(inverse, result, left, right);
        let sets = self.comparison_sets(inverse);
        if sets.specialized.contains(&direct) {
            return Some(HelperSelection::new(direct, left, right, false, true));
        }
        let swapped = direct.swapped();
        if self.is_specialized(&swapped) {
            return Some(HelperSelection::new(swapped, left, right, true, true));
        }
        None
    }
}
