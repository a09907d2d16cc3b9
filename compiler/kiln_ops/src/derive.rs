//! Helper set derivation.
//!
//! Pure functions from descriptors to ordered helper sets. Rules apply in a
//! fixed order (same-type, friends, string formatting, default) and the
//! resulting order is the emission order of helper bodies.

use kiln_ir::{BinaryOp, ComparisonOp, OperationMode, ResultShape, Shape};

use crate::descriptor::{
    format_combination_supported, is_commutative_eligible, ComparisonDescriptor, InplaceRule,
    OperatorDescriptor, FORMAT_ARGUMENTS, FORMAT_STRINGS,
};
use crate::{HelperId, HelperSet, TableError};

/// The three sets derived for one operator in one mode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DerivedSets {
    /// Helpers with dedicated bodies, in emission order.
    pub specialized: HelperSet,
    /// Helpers known to occur that use the generic path.
    pub non_specialized: HelperSet,
    /// Declared but held back; also members of `non_specialized`.
    pub inactive: HelperSet,
}

impl DerivedSets {
    fn check_disjoint(&self) -> Result<(), TableError> {
        match self
            .specialized
            .iter()
            .find(|id| self.non_specialized.contains(id))
        {
            Some(&id) => Err(TableError::Overlap { id }),
            None => Ok(()),
        }
    }
}

/// Check a descriptor for inconsistencies the rules cannot recover from.
pub fn validate(desc: &OperatorDescriptor) -> Result<(), TableError> {
    let op = desc.op.code().to_owned();
    let rule_shapes = desc
        .same_type
        .iter()
        .map(|rule| rule.shape)
        .chain(desc.friends.iter().flat_map(|f| [f.dominant, f.other]))
        .chain(desc.inactive.iter().flat_map(|&(l, r)| [l, r]));
    for shape in rule_shapes {
        if shape.helper_shape() != shape {
            return Err(TableError::UnknownOperandShape { op, shape });
        }
    }
    if let Some(f) = desc.friends.iter().find(|f| f.dominant == f.other) {
        return Err(TableError::SelfFriend {
            op,
            shape: f.dominant,
        });
    }
    if desc.string_format && desc.op != BinaryOp::Mod {
        return Err(TableError::StringFormatOnNonMod { op: desc.op });
    }
    if desc.inplace != InplaceRule::None && !desc.op.has_inplace() {
        return Err(TableError::InplaceWithoutSlot { op: desc.op });
    }
    Ok(())
}

/// Derive the helper sets of a binary operator in `mode`.
///
/// Returns empty sets for the in-place mode of an operator without an
/// in-place form.
pub fn derive_operation(
    desc: &OperatorDescriptor,
    mode: OperationMode,
) -> Result<DerivedSets, TableError> {
    validate(desc)?;
    match (mode, desc.inplace) {
        (OperationMode::Binary, _) | (OperationMode::Inplace, InplaceRule::Direct) => {
            apply_rules(desc, mode)
        }
        (OperationMode::Inplace, InplaceRule::Derived) => {
            let binary = apply_rules(desc, OperationMode::Binary)?;
            Ok(derive_inplace(desc, &binary))
        }
        (OperationMode::Inplace, InplaceRule::None) => Ok(DerivedSets::default()),
    }
}

/// Rewrite binary `OBJECT`-result sets into in-place sets.
///
/// Entries with a boolean or accumulator result, and entries whose left
/// shape cannot be an in-place target, are dropped.
pub fn derive_inplace(desc: &OperatorDescriptor, binary: &DerivedSets) -> DerivedSets {
    let rewrite = |set: &HelperSet| -> HelperSet {
        set.iter()
            .filter(|id| id.result == Some(ResultShape::Object))
            .filter(|id| desc.allows_inplace_target(id.left))
            .filter_map(|id| id.to_inplace())
            .collect()
    };
    DerivedSets {
        specialized: rewrite(&binary.specialized),
        non_specialized: rewrite(&binary.non_specialized),
        inactive: rewrite(&binary.inactive),
    }
}

fn apply_rules(desc: &OperatorDescriptor, mode: OperationMode) -> Result<DerivedSets, TableError> {
    let mut out = Emitter {
        desc,
        mode,
        set: HelperSet::new(),
    };

    for rule in &desc.same_type {
        for &result in rule.results {
            out.emit(result, rule.shape, rule.shape);
            out.emit(result, rule.shape, Shape::Object);
            out.emit(result, Shape::Object, rule.shape);
        }
    }

    for friend in &desc.friends {
        for &result in friend.results {
            out.emit(result, friend.dominant, friend.other);
            let swap_covers_reverse = desc.commutative
                && mode == OperationMode::Binary
                && is_commutative_eligible(friend.dominant)
                && is_commutative_eligible(friend.other);
            if !swap_covers_reverse {
                out.emit(result, friend.other, friend.dominant);
            }
        }
    }

    if desc.string_format {
        for format in FORMAT_STRINGS {
            for argument in FORMAT_ARGUMENTS {
                if format_combination_supported(format, argument) {
                    out.emit(ResultShape::Object, format, argument);
                }
            }
        }
    }

    for &result in desc.default_results {
        out.emit(result, Shape::Object, Shape::Object);
    }

    let mut sets = DerivedSets {
        specialized: out.set,
        ..DerivedSets::default()
    };

    for &(left, right) in &desc.inactive {
        let held: Vec<HelperId> = sets
            .specialized
            .iter()
            .filter(|id| id.left == left && id.right == right)
            .copied()
            .collect();
        if held.is_empty() {
            let result = desc
                .default_results
                .first()
                .copied()
                .unwrap_or(ResultShape::Object);
            return Err(TableError::InactiveNotGenerated {
                id: HelperId::operation(desc.op, mode, result, left, right),
            });
        }
        for id in held {
            sets.specialized.remove(&id);
            sets.inactive.insert(id);
        }
    }

    sets.non_specialized = enumerate_non_specialized(desc, mode, &sets);
    sets.check_disjoint()?;

    tracing::trace!(
        op = desc.op.code(),
        mode = mode.prefix(),
        specialized = sets.specialized.len(),
        non_specialized = sets.non_specialized.len(),
        "derived operation helpers"
    );
    Ok(sets)
}

/// Every pair over the operand shapes not covered by a specialized helper
/// or by swapping into one.
fn enumerate_non_specialized(
    desc: &OperatorDescriptor,
    mode: OperationMode,
    sets: &DerivedSets,
) -> HelperSet {
    let mut out = HelperSet::new();
    let universe: Vec<Shape> = desc
        .operand_shapes
        .iter()
        .copied()
        .chain(std::iter::once(Shape::Object))
        .collect();

    for &left in &universe {
        if mode == OperationMode::Inplace && !desc.allows_inplace_target(left) {
            continue;
        }
        for &right in &universe {
            for &result in desc.default_results {
                let id = HelperId::operation(desc.op, mode, result, left, right);
                if sets.specialized.contains(&id) {
                    continue;
                }
                let swappable = desc.commutative
                    && mode == OperationMode::Binary
                    && is_commutative_eligible(left)
                    && is_commutative_eligible(right);
                if swappable && sets.specialized.contains(&id.swapped()) {
                    continue;
                }
                out.insert(id);
            }
        }
    }
    out.extend(sets.inactive.iter().copied());
    out
}

struct Emitter<'a> {
    desc: &'a OperatorDescriptor,
    mode: OperationMode,
    set: HelperSet,
}

impl Emitter<'_> {
    fn emit(&mut self, result: ResultShape, left: Shape, right: Shape) {
        if self.mode == OperationMode::Inplace && !self.desc.allows_inplace_target(left) {
            return;
        }
        self.set.insert(HelperId::operation(
            self.desc.op,
            self.mode,
            result,
            left,
            right,
        ));
    }
}

/// Validate the shared comparison rules.
pub fn validate_comparison(desc: &ComparisonDescriptor) -> Result<(), TableError> {
    let shapes = desc
        .shapes
        .iter()
        .copied()
        .chain(desc.friends.iter().flat_map(|&(a, b)| [a, b]))
        .chain(desc.shortcut_pairs.iter().flat_map(|&(a, b)| [a, b]));
    for shape in shapes {
        if shape.helper_shape() != shape {
            return Err(TableError::UnknownOperandShape {
                op: "RICH_COMPARE".to_owned(),
                shape,
            });
        }
    }
    let mut pairs = desc.friends.iter().chain(&desc.shortcut_pairs);
    if let Some(&(shape, _)) = pairs.find(|(a, b)| a == b) {
        return Err(TableError::SelfFriend {
            op: "RICH_COMPARE".to_owned(),
            shape,
        });
    }
    Ok(())
}

/// Derive the helper sets of one comparator.
pub fn derive_comparison(
    desc: &ComparisonDescriptor,
    cmp: ComparisonOp,
) -> Result<DerivedSets, TableError> {
    validate_comparison(desc)?;
    let mut specialized = HelperSet::new();

    for &shape in &desc.shapes {
        for &result in desc.results {
            specialized.insert(HelperId::comparison(cmp, result, shape, shape));
            specialized.insert(HelperId::comparison(cmp, result, shape, Shape::Object));
            specialized.insert(HelperId::comparison(cmp, result, Shape::Object, shape));
        }
        if shape.compares_without_raising() {
            specialized.insert(HelperId::comparison(cmp, ResultShape::CBool, shape, shape));
        }
    }

    for &(a, b) in &desc.friends {
        for &result in desc.results {
            specialized.insert(HelperId::comparison(cmp, result, a, b));
            specialized.insert(HelperId::comparison(cmp, result, b, a));
        }
    }

    if ComparisonOp::SHORTCUT.contains(&cmp) {
        for &(a, b) in &desc.shortcut_pairs {
            for result in [ResultShape::Object, ResultShape::NBool, ResultShape::CBool] {
                specialized.insert(HelperId::comparison(cmp, result, a, b));
            }
        }
    }

    for &result in desc.results {
        specialized.insert(HelperId::comparison(cmp, result, Shape::Object, Shape::Object));
    }

    let mut non_specialized = HelperSet::new();
    let universe: Vec<Shape> = desc
        .operand_shapes
        .iter()
        .copied()
        .chain(std::iter::once(Shape::Object))
        .collect();
    for &left in &universe {
        for &right in &universe {
            for &result in desc.results {
                let id = HelperId::comparison(cmp, result, left, right);
                if !specialized.contains(&id) {
                    non_specialized.insert(id);
                }
            }
        }
    }

    let sets = DerivedSets {
        specialized,
        non_specialized,
        inactive: HelperSet::new(),
    };
    sets.check_disjoint()?;
    tracing::trace!(
        cmp = cmp.code(),
        specialized = sets.specialized.len(),
        non_specialized = sets.non_specialized.len(),
        "derived comparison helpers"
    );
    Ok(sets)
}
