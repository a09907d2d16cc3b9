#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_ir::{ConstValue, ExprArena, Shape, SourcePos};
use pretty_assertions::assert_eq;

use super::*;

const POS: SourcePos = SourcePos::new(1, 0);

fn int(arena: &mut ExprArena, value: i64) -> ExprId {
    arena.literal(ConstValue::Int(value), POS)
}

fn var(arena: &mut ExprArena, name: &str) -> ExprId {
    arena.variable(name, Shape::Object, POS)
}

fn site(plan: CallPlan) -> CallSite {
    match plan {
        CallPlan::Call(site) => site,
        CallPlan::Raises(plan) => panic!("expected a call, got {plan:?}"),
    }
}

fn raises(plan: CallPlan) -> RaisePlan {
    match plan {
        CallPlan::Raises(plan) => plan,
        CallPlan::Call(site) => panic!("expected a raise, got {site:?}"),
    }
}

fn classify(arena: &ExprArena, call: ExprId) -> CallPlan {
    classify_call(arena, call, &CallConfig::default(), None).unwrap()
}

#[test]
fn constant_tuple_is_tier_two() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let args = arena.literal(
        ConstValue::Tuple(vec![ConstValue::Int(1), ConstValue::Int(2), ConstValue::Int(3)]),
        POS,
    );
    let call = arena.call(f, Some(args), None, POS);

    let site = site(classify(&arena, call));
    assert_eq!(site.shape, CallShape::ConstantPositional);
    assert_eq!(site.positional, Positional::Constant { expr: args, count: 3 });
    assert_eq!(site.helper, "CALL_FUNCTION_WITH_POSARGS3");
    assert_eq!(site.trampoline, None);
}

#[test]
fn mutable_constant_tuple_is_materialized() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let args = arena.literal(
        ConstValue::Tuple(vec![ConstValue::List(vec![]), ConstValue::Int(2)]),
        POS,
    );
    let call = arena.call(f, Some(args), None, POS);

    let site = site(classify(&arena, call));
    assert_eq!(site.shape, CallShape::MaterializedPositional);
    assert_eq!(site.helper, "CALL_FUNCTION_WITH_ARGS2");
}

#[test]
fn star_args_with_constant_kwargs_is_generic() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let args = arena.variable("args", Shape::Tuple, POS);
    let kwargs = arena.literal(
        ConstValue::Dict(vec![(ConstValue::Str("a".into()), ConstValue::Int(1))]),
        POS,
    );
    let call = arena.call(f, Some(args), Some(kwargs), POS);

    let site = site(classify(&arena, call));
    assert_eq!(site.shape, CallShape::Generic);
    assert_eq!(site.helper, CALL_GENERIC);
    assert_eq!(site.positional, Positional::Dynamic(args));
    assert_eq!(
        site.keywords,
        Keywords::Constant {
            expr: kwargs,
            names: vec!["a".to_owned()]
        }
    );
}

#[test]
fn empty_aggregates_count_as_absent() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let args = arena.literal(ConstValue::Tuple(vec![]), POS);
    let kwargs = arena.make_dict(vec![], POS);
    let call = arena.call(f, Some(args), Some(kwargs), POS);

    let site = site(classify(&arena, call));
    assert_eq!(site.shape, CallShape::NoArgs);
    assert_eq!(site.helper, "CALL_FUNCTION_NO_ARGS");
}

#[test]
fn keyword_display_is_split() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let key = arena.literal(ConstValue::Str("k".into()), POS);
    let value = var(&mut arena, "v");
    let kwargs = arena.make_dict(vec![(key, value)], POS);
    let call = arena.call(f, None, Some(kwargs), POS);

    let site = site(classify(&arena, call));
    assert_eq!(site.shape, CallShape::KeywordSplit);
    assert_eq!(site.helper, CALL_KWSPLIT);
    assert_eq!(
        site.keywords,
        Keywords::Split {
            names: vec!["k".to_owned()],
            keys: vec![key],
            values: vec![value]
        }
    );
}

#[test]
fn non_string_keyword_keys_are_dynamic() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let key = var(&mut arena, "name");
    let value = var(&mut arena, "v");
    let kwargs = arena.make_dict(vec![(key, value)], POS);
    let call = arena.call(f, None, Some(kwargs), POS);

    let site = site(classify(&arena, call));
    assert_eq!(site.keywords, Keywords::Dynamic(kwargs));
    assert_eq!(site.shape, CallShape::Generic);
}

#[test]
fn repeated_display_keys_are_dynamic() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let first_key = arena.literal(ConstValue::Str("a".into()), POS);
    let first = var(&mut arena, "x");
    let second_key = arena.literal(ConstValue::Str("a".into()), POS);
    let second = var(&mut arena, "y");
    let kwargs = arena.make_dict(vec![(first_key, first), (second_key, second)], POS);
    let call = arena.call(f, None, Some(kwargs), POS);

    let site = site(classify(&arena, call));
    assert_eq!(site.keywords, Keywords::Dynamic(kwargs));
    assert_eq!(site.shape, CallShape::Generic);
    assert_eq!(site.helper, CALL_GENERIC);
}

#[test]
fn repeated_constant_keys_are_dynamic() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let kwargs = arena.literal(
        ConstValue::Dict(vec![
            (ConstValue::Str("a".into()), ConstValue::Int(1)),
            (ConstValue::Str("a".into()), ConstValue::Int(2)),
        ]),
        POS,
    );
    let call = arena.call(f, None, Some(kwargs), POS);

    let site = site(classify(&arena, call));
    assert_eq!(site.keywords, Keywords::Dynamic(kwargs));
    assert_eq!(site.shape, CallShape::Generic);
}

#[test]
fn mutable_constant_keywords_are_materialized() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let kwargs = arena.literal(
        ConstValue::Dict(vec![(
            ConstValue::Str("a".into()),
            ConstValue::List(vec![ConstValue::Int(1)]),
        )]),
        POS,
    );
    let call = arena.call(f, None, Some(kwargs), POS);

    let split = site(classify(&arena, call));
    assert_eq!(
        split.keywords,
        Keywords::Materialized {
            expr: kwargs,
            names: vec!["a".to_owned()]
        }
    );
    assert!(split.keywords.values_per_call());
    assert_eq!(split.shape, CallShape::KeywordSplit);
    assert_eq!(split.helper, CALL_KWSPLIT);

    let args = arena.literal(ConstValue::Tuple(vec![ConstValue::Int(1)]), POS);
    let mixed = arena.call(f, Some(args), Some(kwargs), POS);
    let site = site(classify(&arena, mixed));
    assert_eq!(site.shape, CallShape::Mixed);
    assert_eq!(site.helper, "CALL_FUNCTION_WITH_POSARGS1_KWSPLIT");
}

#[test]
fn materialized_keywords_are_checked_against_the_signature() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let kwargs = arena.literal(
        ConstValue::Dict(vec![(ConstValue::Str("x".into()), ConstValue::List(vec![]))]),
        POS,
    );
    let call = arena.call(f, None, Some(kwargs), POS);
    let spec = ParameterSpec::new("f").positional(&["a"]);

    let plan = raises(classify_call(&arena, call, &CallConfig::default(), Some(&spec)).unwrap());
    match &plan.cause {
        RaiseCause::Arity(err) => {
            assert_eq!(err.to_string(), "f() got an unexpected keyword argument 'x'");
        }
        other => panic!("expected an arity error, got {other:?}"),
    }
}

#[test]
fn mixed_call_names_its_helper() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let x = var(&mut arena, "x");
    let args = arena.make_tuple(vec![x], POS);
    let key = arena.literal(ConstValue::Str("k".into()), POS);
    let value = var(&mut arena, "y");
    let kwargs = arena.make_dict(vec![(key, value)], POS);
    let call = arena.call(f, Some(args), Some(kwargs), POS);

    let site = site(classify(&arena, call));
    assert_eq!(site.shape, CallShape::Mixed);
    assert_eq!(site.helper, "CALL_FUNCTION_WITH_ARGS1_KWSPLIT");
}

#[test]
fn attribute_callee_becomes_method_call() {
    let mut arena = ExprArena::new();
    let obj = var(&mut arena, "o");
    let method = arena.attribute(obj, "append", POS);
    let x = var(&mut arena, "x");
    let y = var(&mut arena, "y");
    let args = arena.make_tuple(vec![x, y], POS);
    let call = arena.call(method, Some(args), None, POS);

    let site = site(classify(&arena, call));
    assert!(site.is_method_call());
    assert_eq!(
        site.callee,
        Callee::Method {
            lookup: method,
            receiver: obj,
            attribute: "append".to_owned()
        }
    );
    assert_eq!(site.helper, "CALL_METHOD_WITH_ARGS2");
}

#[test]
fn effectful_arguments_keep_plain_lookup() {
    let mut arena = ExprArena::new();
    let obj = var(&mut arena, "o");
    let method = arena.attribute(obj, "append", POS);
    let g = var(&mut arena, "g");
    let inner = arena.call(g, None, None, POS);
    let args = arena.make_tuple(vec![inner], POS);
    let call = arena.call(method, Some(args), None, POS);

    let site = site(classify(&arena, call));
    assert_eq!(site.callee, Callee::Function(method));
    assert_eq!(site.helper, "CALL_FUNCTION_WITH_SINGLE_ARG");
}

#[test]
fn blacklisted_attribute_is_not_a_method() {
    let mut arena = ExprArena::new();
    let obj = var(&mut arena, "o");
    let method = arena.attribute(obj, "__class__", POS);
    let call = arena.call(method, None, None, POS);

    let site = site(classify(&arena, call));
    assert_eq!(site.callee, Callee::Function(method));
}

#[test]
fn large_counts_request_a_trampoline() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let elements: Vec<ExprId> = (0..12).map(|i| var(&mut arena, &format!("a{i}"))).collect();
    let args = arena.make_tuple(elements, POS);
    let call = arena.call(f, Some(args), None, POS);

    let default_site = site(classify(&arena, call));
    assert_eq!(default_site.trampoline, Some(TrampolineKey::Positional(12)));
    assert_eq!(default_site.helper, "CALL_FUNCTION_WITH_ARGS12");

    let config = CallConfig {
        max_prebuilt_call_args: 12,
        ..CallConfig::default()
    };
    let plan = classify_call(&arena, call, &config, None).unwrap();
    assert_eq!(site(plan).trampoline, None);
}

#[test]
fn raising_argument_drops_the_call() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let g = var(&mut arena, "g");
    let first = arena.call(g, None, None, POS);
    let raise = arena.raise("ZeroDivisionError", "division by zero", POS);
    let h = var(&mut arena, "h");
    let last = arena.call(h, None, None, POS);
    let args = arena.make_tuple(vec![first, raise, last], POS);
    let call = arena.call(f, Some(args), None, POS);

    let plan = raises(classify(&arena, call));
    assert_eq!(plan.side_effects, vec![first]);
    assert_eq!(plan.cause, RaiseCause::Expression(raise));
}

#[test]
fn arity_mismatch_raises_type_error() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let one = int(&mut arena, 1);
    let g = var(&mut arena, "g");
    let effect = arena.call(g, None, None, POS);
    let args = arena.make_tuple(vec![one, effect], POS);
    let call = arena.call(f, Some(args), None, POS);
    let spec = ParameterSpec::new("f").positional(&["a"]);

    let plan = classify_call(&arena, call, &CallConfig::default(), Some(&spec)).unwrap();
    let plan = raises(plan);
    assert_eq!(plan.side_effects, vec![effect]);
    let RaiseCause::Arity(err) = plan.cause else {
        panic!("expected an arity error");
    };
    assert_eq!(
        err.to_string(),
        "f() takes 1 positional argument but 2 were given"
    );
}

#[test]
fn dynamic_arguments_skip_arity_check() {
    let mut arena = ExprArena::new();
    let f = var(&mut arena, "f");
    let args = arena.variable("args", Shape::Tuple, POS);
    let call = arena.call(f, Some(args), None, POS);
    let spec = ParameterSpec::new("f");

    let plan = classify_call(&arena, call, &CallConfig::default(), Some(&spec)).unwrap();
    assert_eq!(site(plan).helper, CALL_POSARGS);
}

#[test]
fn non_call_is_rejected() {
    let mut arena = ExprArena::new();
    let x = arena.variable("x", Shape::Object, SourcePos::new(4, 2));
    let err = classify_call(&arena, x, &CallConfig::default(), None).unwrap_err();
    assert_eq!(err, ClassifyError::NotACall { line: 4, column: 2 });
}
