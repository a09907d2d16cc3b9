//! Helper registry tests.
//!
//! The process-wide registry as the emitter sees it: set contents for the
//! shipped operator tables and the selection protocol on top of them.

use kiln_ir::{BinaryOp, ComparisonOp, OperationMode, ResultShape, Shape};
use kiln_ops::HelperRegistry;
use proptest::prelude::*;

use crate::common::specialized;

#[test]
fn add_keeps_one_order_of_commutative_friends() {
    let add = specialized(BinaryOp::Add, OperationMode::Binary);
    for name in [
        "BINARY_OPERATION_ADD_OBJECT_INT_INT",
        "BINARY_OPERATION_ADD_NBOOL_INT_INT",
        "BINARY_OPERATION_ADD_OBJECT_INT_LONG",
        "BINARY_OPERATION_ADD_OBJECT_STR_STR",
        "BINARY_OPERATION_ADD_NILONG_LONG_DIGIT",
    ] {
        assert!(add.iter().any(|n| n == name), "missing {name}");
    }
    assert!(!add.iter().any(|n| n == "BINARY_OPERATION_ADD_OBJECT_LONG_INT"));
}

#[test]
fn string_formatting_skips_mixed_string_worlds() {
    let modulo = specialized(BinaryOp::Mod, OperationMode::Binary);
    assert!(modulo.iter().any(|n| n == "BINARY_OPERATION_MOD_OBJECT_STR_INT"));
    assert!(modulo.iter().any(|n| n == "BINARY_OPERATION_MOD_OBJECT_UNICODE_TUPLE"));
    assert!(!modulo.iter().any(|n| n == "BINARY_OPERATION_MOD_OBJECT_BYTES_INT"));
    assert!(!modulo.iter().any(|n| n == "BINARY_OPERATION_MOD_OBJECT_BYTES_STR"));
}

#[test]
fn inplace_add_has_no_result_shape() {
    let add = specialized(BinaryOp::Add, OperationMode::Inplace);
    assert!(!add.is_empty());
    assert!(add.iter().all(|n| n.starts_with("INPLACE_OPERATION_ADD_")));
    assert!(add.iter().any(|n| n == "INPLACE_OPERATION_ADD_LIST_LIST"));
}

#[test]
fn sets_are_disjoint_everywhere() {
    let registry = HelperRegistry::global();
    for (op, mode, sets) in registry.operation_tables() {
        for id in sets.specialized.iter() {
            assert!(!sets.non_specialized.contains(id), "{op} {mode:?}: {id}");
        }
    }
    for (cmp, sets) in registry.comparison_tables() {
        for id in sets.specialized.iter() {
            assert!(!sets.non_specialized.contains(id), "{cmp}: {id}");
        }
    }
}

#[test]
fn same_type_int_comparison_has_a_dedicated_helper() {
    let sel = HelperRegistry::global().select_comparison(
        ComparisonOp::Lt,
        ResultShape::NBool,
        Shape::Int,
        Shape::Int,
    );
    assert_eq!(sel.id.to_string(), "RICH_COMPARE_LT_NBOOL_INT_INT");
    assert!(sel.specialized);
    assert!(!sel.swapped && !sel.negated);
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    proptest::sample::select(Shape::ALL.to_vec())
}

fn arb_op() -> impl Strategy<Value = BinaryOp> {
    proptest::sample::select(BinaryOp::ALL.to_vec())
}

fn arb_cmp() -> impl Strategy<Value = ComparisonOp> {
    proptest::sample::select(ComparisonOp::ALL.to_vec())
}

proptest! {
    #[test]
    fn binary_selection_names_a_generated_helper(
        op in arb_op(),
        left in arb_shape(),
        right in arb_shape(),
        nbool in any::<bool>(),
    ) {
        let registry = HelperRegistry::global();
        let result = if nbool { ResultShape::NBool } else { ResultShape::Object };
        let sel = registry.select_binary(op, result, left, right);
        prop_assert_eq!(sel, registry.select_binary(op, result, left, right));
        if sel.specialized {
            prop_assert!(registry.is_specialized(&sel.id));
        } else {
            prop_assert!(sel.id.is_default());
        }
        prop_assert!(!sel.negated);
    }

    #[test]
    fn inplace_selection_never_swaps(
        op in arb_op(),
        left in arb_shape(),
        right in arb_shape(),
    ) {
        let sel = HelperRegistry::global().select_inplace(op, left, right);
        prop_assert!(!sel.swapped);
        prop_assert_eq!(sel.id.result, None);
    }

    #[test]
    fn negation_only_on_boolean_results(
        cmp in arb_cmp(),
        left in arb_shape(),
        right in arb_shape(),
    ) {
        let sel = HelperRegistry::global().select_comparison(cmp, ResultShape::Object, left, right);
        prop_assert!(!sel.negated);
        prop_assert_eq!(sel.id.result, Some(ResultShape::Object));
    }
}
