#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_ir::{BinaryOp, ComparisonOp, ConstValue, ExprArena, ResultShape, Shape};
use kiln_ops::HelperRegistry;
use pretty_assertions::assert_eq;

use crate::temps::{Ownership, TempStats};
use crate::test_support::{emit, emit_with, line_index, lines, try_emit_with, POS};
use crate::{EmitConfig, EmitError, Emitter, Stmt, UnitState};

fn assign(name: &str, value: kiln_ir::ExprId) -> Stmt {
    Stmt::Assign {
        name: name.to_owned(),
        value,
    }
}

#[test]
fn binary_add_is_checked_and_assigned() {
    let mut arena = ExprArena::new();
    let a = arena.variable("a", Shape::Long, POS);
    let b = arena.variable("b", Shape::Long, POS);
    let sum = arena.binary(BinaryOp::Add, a, b, Shape::Object, POS);

    let out = emit(&arena, &[assign("x", sum)]);
    assert_eq!(
        out.code,
        "    tmp_left_value_1 = var_a;
    tmp_right_value_1 = var_b;
    tmp_binop_result_1 = BINARY_OPERATION_ADD_OBJECT_LONG_LONG(tmp_left_value_1, tmp_right_value_1);
    if (tmp_binop_result_1 == NULL) {
        assert(HAS_ERROR_OCCURRED(tstate));
        FETCH_ERROR_OCCURRED(tstate, &exception_type, &exception_value, &exception_tb);
        exception_lineno = 3;
        goto function_exception_exit;
    }
    {
        PyObject *old = var_x;
        var_x = tmp_binop_result_1;
        Py_XDECREF(old);
    }
"
    );
    assert_eq!(
        out.stats,
        vec![TempStats {
            allocated: 3,
            released: 2,
            handed_off: 1,
            decrefs: 0,
        }]
    );
}

#[test]
fn same_type_int_comparison_only_asserts() {
    let mut arena = ExprArena::new();
    let a = arena.variable("a", Shape::Int, POS);
    let b = arena.variable("b", Shape::Int, POS);
    let less = arena.compare(ComparisonOp::Lt, a, b, POS);
    let none = arena.literal(ConstValue::None, POS);
    let stmt = Stmt::If {
        condition: less,
        then: vec![Stmt::Expression(none)],
        otherwise: Vec::new(),
    };

    let out = emit(&arena, &[stmt.clone()]);
    assert_eq!(
        lines(&out.code),
        vec![
            "tmp_compexpr_left_1 = var_a;",
            "tmp_compexpr_right_1 = var_b;",
            "tmp_compare_result_1 = RICH_COMPARE_LT_NBOOL_INT_INT(tmp_compexpr_left_1, tmp_compexpr_right_1);",
            "assert(!(tmp_compare_result_1 == NUITKA_BOOL_EXCEPTION));",
            "if (tmp_compare_result_1 == NUITKA_BOOL_TRUE) {",
            "tmp_constant_1 = Py_None;",
            "}",
        ]
    );
    assert!(!out.code.contains("goto"));

    let release = EmitConfig::default().with_debug_assertions(false);
    let out = emit_with(&arena, &[stmt], &release);
    assert!(!out.code.contains("assert"));
}

#[test]
fn negated_comparison_flips_the_result() {
    let mut arena = ExprArena::new();
    let a = arena.variable("a", Shape::Long, POS);
    let d = arena.variable("d", Shape::Digit, POS);
    let ne = arena.compare(ComparisonOp::Ne, a, d, POS);
    let stmt = Stmt::If {
        condition: ne,
        then: Vec::new(),
        otherwise: Vec::new(),
    };

    let out = emit(&arena, &[stmt]);
    let helper = line_index(&out.code, "tmp_compare_result_1 = RICH_COMPARE_EQ_NBOOL_LONG_DIGIT(");
    let check = line_index(&out.code, "if (tmp_compare_result_1 == NUITKA_BOOL_EXCEPTION) {");
    let negation = line_index(
        &out.code,
        "tmp_compare_result_1 = tmp_compare_result_1 == NUITKA_BOOL_TRUE ? NUITKA_BOOL_FALSE : NUITKA_BOOL_TRUE;",
    );
    assert!(helper < check);
    assert!(check < negation);
}

#[test]
fn swapped_helper_keeps_evaluation_order() {
    let mut arena = ExprArena::new();
    let a = arena.variable("a", Shape::Long, POS);
    let b = arena.variable("b", Shape::Int, POS);
    let sum = arena.binary(BinaryOp::Add, a, b, Shape::Object, POS);
    let stmt = Stmt::If {
        condition: sum,
        then: Vec::new(),
        otherwise: Vec::new(),
    };

    let out = emit(&arena, &[stmt]);
    assert!(line_index(&out.code, "tmp_left_value_1 = var_a;") < line_index(&out.code, "tmp_right_value_1 = var_b;"));
    assert!(lines(&out.code).contains(
        &"tmp_binop_result_1 = BINARY_OPERATION_ADD_NBOOL_INT_LONG(tmp_right_value_1, tmp_left_value_1);"
    ));
    assert!(lines(&out.code).contains(&"if (tmp_binop_result_1 == NUITKA_BOOL_EXCEPTION) {"));
}

#[test]
fn machine_operand_is_boxed_for_object_helper() {
    let mut arena = ExprArena::new();
    let a = arena.variable("a", Shape::Long, POS);
    let n = arena.variable("n", Shape::CLong, POS);
    let product = arena.binary(BinaryOp::Mult, a, n, Shape::Object, POS);

    let out = emit(&arena, &[Stmt::Expression(product)]);
    let code = lines(&out.code);
    let boxed = line_index(&out.code, "tmp_boxed_value_1 = PyLong_FromLong(tmp_right_value_1);");
    let call = line_index(
        &out.code,
        "tmp_binop_result_1 = BINARY_OPERATION_MULT_OBJECT_LONG_OBJECT(tmp_left_value_1, tmp_boxed_value_1);",
    );
    assert!(boxed < call);
    assert_eq!(code[call + 1], "Py_DECREF(tmp_boxed_value_1);");
    assert_eq!(code.last().copied(), Some("Py_DECREF(tmp_binop_result_1);"));
}

#[test]
fn inplace_replaces_the_target_reference() {
    let mut arena = ExprArena::new();
    let x = arena.variable("x", Shape::List, POS);
    let y = arena.variable("y", Shape::List, POS);
    let update = arena.inplace(BinaryOp::Add, x, y, POS);

    let out = emit(&arena, &[assign("x", update)]);
    assert_eq!(
        lines(&out.code),
        vec![
            "tmp_inplace_target_1 = var_x;",
            "Py_INCREF(tmp_inplace_target_1);",
            "tmp_inplace_value_1 = var_y;",
            "tmp_inplace_ok_1 = INPLACE_OPERATION_ADD_LIST_LIST(&tmp_inplace_target_1, tmp_inplace_value_1);",
            "if (tmp_inplace_ok_1 == false) {",
            "assert(HAS_ERROR_OCCURRED(tstate));",
            "FETCH_ERROR_OCCURRED(tstate, &exception_type, &exception_value, &exception_tb);",
            "Py_DECREF(tmp_inplace_target_1);",
            "exception_lineno = 3;",
            "goto function_exception_exit;",
            "}",
            "{",
            "PyObject *old = var_x;",
            "var_x = tmp_inplace_target_1;",
            "Py_XDECREF(old);",
            "}",
        ]
    );
}

#[test]
fn machine_inplace_target_falls_back_to_binary() {
    let mut arena = ExprArena::new();
    let n = arena.variable("n", Shape::CLong, POS);
    let m = arena.variable("m", Shape::Long, POS);
    let update = arena.inplace(BinaryOp::Add, n, m, POS);

    let out = emit(&arena, &[Stmt::Expression(update)]);
    assert!(!out.code.contains("INPLACE_OPERATION"));
    assert!(out.code.contains("BINARY_OPERATION_ADD_"));

    // The object result cannot be stored back into the machine variable.
    let err = try_emit_with(
        &arena,
        &[assign("n", update)],
        &EmitConfig::default(),
        UnitState::new(),
    )
    .err();
    assert_eq!(
        err,
        Some(EmitError::VariableTypeMismatch {
            name: "n".to_owned(),
            expected: "long",
            found: "PyObject *",
        })
    );
}

#[test]
fn object_condition_goes_through_truth_check() {
    let mut arena = ExprArena::new();
    let x = arena.variable("x", Shape::Object, POS);
    let flag = arena.variable("flag", Shape::Bool, POS);
    let stmts = [
        Stmt::If {
            condition: x,
            then: Vec::new(),
            otherwise: Vec::new(),
        },
        Stmt::If {
            condition: flag,
            then: Vec::new(),
            otherwise: Vec::new(),
        },
    ];

    let out = emit(&arena, &stmts);
    let code = lines(&out.code);
    assert_eq!(
        &code[..3],
        &[
            "tmp_condition_value_1 = var_x;",
            "tmp_truth_value_1 = CHECK_IF_TRUE(tmp_condition_value_1);",
            "if (tmp_truth_value_1 == -1) {",
        ]
    );
    assert!(code.contains(
        &"tmp_condition_result_1 = tmp_truth_value_1 == 1 ? NUITKA_BOOL_TRUE : NUITKA_BOOL_FALSE;"
    ));
    assert!(code.contains(&"if (tmp_condition_result_1 == NUITKA_BOOL_TRUE) {"));
    // Truth of an exact bool cannot fail.
    assert!(code.contains(&"assert(!(tmp_truth_value_2 == -1));"));
}

#[test]
fn nilong_results_cannot_become_objects() {
    let arena = ExprArena::new();
    let config = EmitConfig::default();
    let mut unit = UnitState::new();
    let mut emitter = Emitter::new(&arena, HelperRegistry::global(), &config, &mut unit);
    let temp = emitter
        .ctx
        .allocate("binop_result", "nuitka_ilong", Ownership::Owned);
    assert_eq!(
        emitter.convert_result(temp, ResultShape::NiLong, ResultShape::Object, true, POS),
        Err(EmitError::UnsupportedConversion {
            from: ResultShape::NiLong,
            to: ResultShape::Object,
        })
    );
    // A NILONG request accepts whatever the helper produced.
    assert_eq!(
        emitter.convert_result(temp, ResultShape::Object, ResultShape::NiLong, true, POS),
        Ok((temp, ResultShape::Object))
    );
}

#[test]
fn bool_results_convert_between_representations() {
    let arena = ExprArena::new();
    let config = EmitConfig::default();
    let mut unit = UnitState::new();
    let mut emitter = Emitter::new(&arena, HelperRegistry::global(), &config, &mut unit);
    let flag = emitter.ctx.allocate("compare_result", "nuitka_bool", Ownership::Owned);
    let (object, shape) = emitter
        .convert_result(flag, ResultShape::NBool, ResultShape::Object, false, POS)
        .unwrap();
    assert_eq!(shape, ResultShape::Object);
    assert_eq!(
        emitter.ctx.output(),
        "    tmp_bool_value_1 = BOOL_FROM(tmp_compare_result_1 == NUITKA_BOOL_TRUE);\n"
    );
    // The runtime singletons are borrowed.
    emitter.ctx.release(object).unwrap();
    assert!(!emitter.ctx.output().contains("Py_DECREF"));
}
