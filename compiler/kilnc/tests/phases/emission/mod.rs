//! Unit and helper library tests.
//!
//! Whole compilation units through `kilnc`: shared trampolines, the error
//! protocol across statements, and generation of the runtime helpers.

use kiln_ir::{BinaryOp, ComparisonOp, ConstValue, ExprArena, ExprId, Shape};
use kiln_ops::HelperRegistry;
use kilnc::{generate_helper_library, CompilationUnit, EmitConfig, Stmt, TextRenderer};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::common::{compile, lines, POS};

fn call_with(arena: &mut ExprArena, count: usize) -> ExprId {
    let f = arena.variable("f", Shape::Object, POS);
    let args = (0..count)
        .map(|i| arena.variable(&format!("a{i}"), Shape::Object, POS))
        .collect();
    let args = arena.make_tuple(args, POS);
    arena.call(f, Some(args), None, POS)
}

#[test]
fn same_type_int_comparison_is_assert_only() {
    let mut arena = ExprArena::new();
    let a = arena.variable("a", Shape::Int, POS);
    let b = arena.variable("b", Shape::Int, POS);
    let less = arena.compare(ComparisonOp::Lt, a, b, POS);
    let one = arena.literal(ConstValue::Int(1), POS);
    let body = [Stmt::If {
        condition: less,
        then: vec![Stmt::Return(one)],
        otherwise: Vec::new(),
    }];

    let output = compile(&arena, &body);
    let code = lines(&output.source);
    let helper = code
        .iter()
        .position(|line| line.contains("RICH_COMPARE_LT_NBOOL_INT_INT("))
        .unwrap();
    assert_eq!(
        code[helper + 1],
        "assert(!(tmp_compare_result_1 == NUITKA_BOOL_EXCEPTION));"
    );
    // Only the function epilogue jumps to the exception exit.
    assert!(!output.source.contains("goto function_exception_exit;"));
}

#[test]
fn failing_operation_leaves_through_the_exception_exit() {
    let mut arena = ExprArena::new();
    let a = arena.variable("a", Shape::Object, POS);
    let b = arena.variable("b", Shape::Long, POS);
    let sum = arena.binary(BinaryOp::Add, a, b, Shape::Object, POS);
    let body = [Stmt::Return(sum)];

    let mut unit = CompilationUnit::new("errors", EmitConfig::default());
    unit.emit_function("add", &arena, &body, &["a", "b"]).unwrap();
    let source = unit.finish(&TextRenderer).unwrap().source;
    let code = lines(&source);

    let check = code
        .iter()
        .position(|line| *line == "if (tmp_binop_result_1 == NULL) {")
        .unwrap();
    assert_eq!(code[check + 3], "exception_lineno = 7;");
    assert_eq!(code[check + 4], "goto function_exception_exit;");
    assert!(code.contains(
        &"tmp_binop_result_1 = BINARY_OPERATION_ADD_OBJECT_OBJECT_LONG(tmp_left_value_1, tmp_right_value_1);"
    ));
    let exit = code.iter().position(|line| *line == "function_exception_exit:;").unwrap();
    assert_eq!(&code[exit + 1..exit + 3], &["Py_XDECREF(var_a);", "Py_XDECREF(var_b);"]);
}

#[test]
fn trampolines_are_generated_once_per_unit() {
    let mut arena = ExprArena::new();
    let calls: Vec<ExprId> = [12, 12, 15, 3, 12]
        .into_iter()
        .map(|count| call_with(&mut arena, count))
        .collect();

    let mut unit = CompilationUnit::new("dedup", EmitConfig::default());
    for (i, call) in calls.iter().enumerate() {
        unit.emit_function(&format!("f{i}"), &arena, &[Stmt::Expression(*call)], &[])
            .unwrap();
    }
    let output = unit.finish(&TextRenderer).unwrap();
    assert_eq!(output.trampolines, 2);
    assert_eq!(output.declarations.len(), 2);
    assert!(output.declarations[0].contains("CALL_FUNCTION_WITH_ARGS12("));
    assert!(output.declarations[1].contains("CALL_FUNCTION_WITH_ARGS15("));
    assert_eq!(output.source.matches("\nPyObject *CALL_FUNCTION_WITH_ARGS12(PyThreadState").count(), 1);
}

#[test]
fn raising_the_prebuilt_limit_removes_trampolines() {
    let mut arena = ExprArena::new();
    let call = call_with(&mut arena, 12);
    let config = EmitConfig::default().with_max_prebuilt_call_args(16);
    let mut unit = CompilationUnit::new("prebuilt", config);
    unit.emit_function("main", &arena, &[Stmt::Expression(call)], &[])
        .unwrap();
    let output = unit.finish(&TextRenderer).unwrap();
    assert_eq!(output.trampolines, 0);
    assert!(output.source.contains("CALL_FUNCTION_WITH_ARGS12(tstate, "));
}

#[test]
fn helper_library_is_reproducible_across_registries() {
    let first = HelperRegistry::build().unwrap();
    let second = HelperRegistry::build().unwrap();
    let a = generate_helper_library(&first, &TextRenderer).unwrap();
    let b = generate_helper_library(&second, &TextRenderer).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, generate_helper_library(HelperRegistry::global(), &TextRenderer).unwrap());
    assert_eq!(a.header.lines().count(), a.len());
    assert!(a.header.lines().all(|line| line.starts_with("extern ")));
}

proptest! {
    #[test]
    fn one_body_per_distinct_large_count(counts in proptest::collection::vec(0usize..16, 1..12)) {
        let mut arena = ExprArena::new();
        let calls: Vec<Stmt> = counts
            .iter()
            .map(|&count| Stmt::Expression(call_with(&mut arena, count)))
            .collect();
        let (front, back) = calls.split_at(calls.len() / 2);

        let mut unit = CompilationUnit::new("prop", EmitConfig::default());
        unit.emit_function("front", &arena, front, &[]).unwrap();
        unit.emit_function("back", &arena, back, &[]).unwrap();
        let output = unit.finish(&TextRenderer).unwrap();

        let mut expected: Vec<usize> = counts.iter().copied().filter(|&count| count > 10).collect();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(output.trampolines, expected.len());
        prop_assert_eq!(output.declarations.len(), expected.len());
    }
}
