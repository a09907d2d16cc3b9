//! Call-site tests.
//!
//! Classification through `kiln_calls` and the text the emitter produces
//! for the chosen convention.

use kiln_calls::{classify_call, CallConfig, CallPlan, CallShape, ParameterSpec, RaiseCause};
use kiln_ir::{ConstValue, ExprArena, Shape};
use kilnc::{CompilationUnit, EmitConfig, Stmt, TextRenderer};
use pretty_assertions::assert_eq;

use crate::common::{compile, lines, POS};

fn ints(values: &[i64]) -> ConstValue {
    ConstValue::Tuple(values.iter().copied().map(ConstValue::Int).collect())
}

#[test]
fn constant_arguments_use_the_tuple_directly() {
    let mut arena = ExprArena::new();
    let f = arena.variable("f", Shape::Object, POS);
    let args = arena.literal(ints(&[1, 2, 3]), POS);
    let call = arena.call(f, Some(args), None, POS);

    let CallPlan::Call(site) = classify_call(&arena, call, &CallConfig::default(), None).unwrap() else {
        panic!("call was not kept");
    };
    assert_eq!(site.shape, CallShape::ConstantPositional);
    assert_eq!(site.helper, "CALL_FUNCTION_WITH_POSARGS3");
    assert_eq!(site.trampoline, None);

    let output = compile(&arena, &[Stmt::Expression(call)]);
    assert_eq!(output.constants, vec!["(1, 2, 3)".to_owned()]);
    assert!(lines(&output.source).contains(
        &"tmp_call_result_1 = CALL_FUNCTION_WITH_POSARGS3(tstate, tmp_called_value_1, mod_consts[0]);"
    ));
    assert_eq!(output.trampolines, 0);
}

#[test]
fn star_args_with_constant_kwargs_is_generic() {
    let mut arena = ExprArena::new();
    let f = arena.variable("f", Shape::Object, POS);
    let args = arena.variable("args", Shape::Tuple, POS);
    let kwargs = arena.literal(
        ConstValue::Dict(vec![(ConstValue::Str("a".to_owned()), ConstValue::Int(1))]),
        POS,
    );
    let call = arena.call(f, Some(args), Some(kwargs), POS);

    let CallPlan::Call(site) = classify_call(&arena, call, &CallConfig::default(), None).unwrap() else {
        panic!("call was not kept");
    };
    assert_eq!(site.shape, CallShape::Generic);
    assert_eq!(site.helper, "CALL_FUNCTION");

    let output = compile(&arena, &[Stmt::Expression(call)]);
    let code = lines(&output.source);
    let copy = code
        .iter()
        .position(|line| line.starts_with("tmp_constant_copy_1 = DEEP_COPY_DICT(tstate, mod_consts["))
        .unwrap();
    let call_line = code
        .iter()
        .position(|line| {
            line.starts_with("tmp_call_result_1 = CALL_FUNCTION(tstate, tmp_called_value_1, ")
        })
        .unwrap();
    assert!(copy < call_line);
    assert!(!output.source.contains("PySequence_Tuple"));
}

#[test]
fn arity_errors_become_raises_in_the_unit() {
    let mut arena = ExprArena::new();
    let f = arena.variable("f", Shape::Object, POS);
    let call = arena.call(f, None, None, POS);
    let spec = ParameterSpec::new("f").positional(&["a", "b", "c"]);

    let plan = classify_call(&arena, call, &CallConfig::default(), Some(&spec)).unwrap();
    let CallPlan::Raises(raise) = plan else {
        panic!("arity mismatch was not detected");
    };
    let RaiseCause::Arity(err) = raise.cause else {
        panic!("wrong cause");
    };
    assert_eq!(
        err.to_string(),
        "f() missing 3 required positional arguments: 'a', 'b', and 'c'"
    );

    let mut unit = CompilationUnit::new("calls", EmitConfig::default());
    unit.declare_function(spec);
    unit.emit_function("main", &arena, &[Stmt::Expression(call)], &[])
        .unwrap();
    let source = unit.finish(&TextRenderer).unwrap().source;
    assert!(source.contains("PyExc_TypeError"));
    assert!(source.contains("'a', 'b', and 'c'"));
    assert!(!source.contains("CALL_FUNCTION_NO_ARGS"));
}

#[test]
fn method_calls_skip_the_attribute_lookup() {
    let mut arena = ExprArena::new();
    let items = arena.variable("items", Shape::List, POS);
    let append = arena.attribute(items, "append", POS);
    let x = arena.variable("x", Shape::Object, POS);
    let args = arena.make_tuple(vec![x], POS);
    let call = arena.call(append, Some(args), None, POS);

    let output = compile(&arena, &[Stmt::Expression(call)]);
    assert!(output.source.contains("CALL_METHOD_WITH_SINGLE_ARG(tstate, "));
    assert!(!output.source.contains("LOOKUP_ATTRIBUTE(tstate"));
    assert_eq!(output.constants, vec!["'append'".to_owned()]);
}
