use pretty_assertions::assert_eq;

use super::*;

fn pos(line: u32) -> SourcePos {
    SourcePos::new(line, 0)
}

#[test]
fn constant_shapes_and_mutability() {
    assert_eq!(ConstValue::Int(3).shape(), Shape::Long);
    assert_eq!(ConstValue::Str("a".into()).shape(), Shape::Unicode);
    assert!(!ConstValue::Tuple(vec![ConstValue::Int(1)]).is_mutable());
    assert!(ConstValue::Tuple(vec![ConstValue::List(vec![])]).is_mutable());
    assert!(ConstValue::Dict(vec![]).is_mutable());
}

#[test]
fn constant_repr_matches_source_language() {
    let value = ConstValue::Tuple(vec![
        ConstValue::Int(1),
        ConstValue::Str("x".into()),
        ConstValue::None,
        ConstValue::Float(2.0),
    ]);
    assert_eq!(value.repr(), "(1, 'x', None, 2.0)");
    assert_eq!(ConstValue::Tuple(vec![ConstValue::Bool(true)]).repr(), "(True,)");
    assert_eq!(ConstValue::Bytes(b"a\x00".to_vec()).repr(), "b'a\\x00'");
    assert_eq!(
        ConstValue::Dict(vec![(ConstValue::Str("k".into()), ConstValue::Int(1))]).repr(),
        "{'k': 1}"
    );
}

#[test]
fn float_repr_uses_shortest_round_trip_digits() {
    let repr = |v: f64| ConstValue::Float(v).repr();
    assert_eq!(repr(0.0), "0.0");
    assert_eq!(repr(-0.0), "-0.0");
    assert_eq!(repr(0.5), "0.5");
    assert_eq!(repr(0.1 + 0.2), "0.30000000000000004");
    assert_eq!(repr(123.456), "123.456");
    assert_eq!(repr(1e15), "1000000000000000.0");
    assert_eq!(repr(1e16), "1e+16");
    assert_eq!(repr(1e20), "1e+20");
    assert_eq!(repr(-2.5e100), "-2.5e+100");
    assert_eq!(repr(0.0001), "0.0001");
    assert_eq!(repr(1e-5), "1e-05");
    assert_eq!(repr(1.5e-7), "1.5e-07");
    assert_eq!(repr(f64::NAN), "nan");
    assert_eq!(repr(f64::INFINITY), "inf");
    assert_eq!(repr(f64::NEG_INFINITY), "-inf");
}

#[test]
fn children_follow_evaluation_order() {
    let mut arena = ExprArena::new();
    let k = arena.literal(ConstValue::Str("k".into()), pos(1));
    let v = arena.variable("v", Shape::Object, pos(1));
    let dict = arena.make_dict(vec![(k, v)], pos(1));
    assert_eq!(arena.kind(dict).children().as_slice(), &[k, v]);

    let f = arena.variable("f", Shape::Object, pos(2));
    let call = arena.call(f, None, Some(dict), pos(2));
    assert_eq!(arena.kind(call).children().as_slice(), &[f, dict]);
}

#[test]
fn same_type_exact_comparison_cannot_raise() {
    let mut arena = ExprArena::new();
    let a = arena.variable("a", Shape::Long, pos(1));
    let b = arena.variable("b", Shape::Long, pos(1));
    let cmp = arena.compare(ComparisonOp::Lt, a, b, pos(1));
    assert!(!arena.may_raise(cmp, ExceptionFilter::Any));

    let c = arena.variable("c", Shape::List, pos(1));
    let d = arena.variable("d", Shape::List, pos(1));
    let cmp = arena.compare(ComparisonOp::Lt, c, d, pos(1));
    assert!(arena.may_raise(cmp, ExceptionFilter::Any));

    let e = arena.variable("e", Shape::Object, pos(1));
    let cmp = arena.compare(ComparisonOp::Eq, a, e, pos(1));
    assert!(arena.may_raise(cmp, ExceptionFilter::Any));
}

#[test]
fn dict_display_with_unhashable_key_may_raise() {
    let mut arena = ExprArena::new();
    let key = arena.variable("k", Shape::List, pos(1));
    let value = arena.literal(ConstValue::Int(1), pos(1));
    let dict = arena.make_dict(vec![(key, value)], pos(1));
    assert!(arena.may_raise(dict, ExceptionFilter::Any));

    let key = arena.literal(ConstValue::Str("k".into()), pos(1));
    let dict = arena.make_dict(vec![(key, value)], pos(1));
    assert!(!arena.may_raise(dict, ExceptionFilter::Any));
}

#[test]
fn raise_propagates_to_enclosing_displays() {
    let mut arena = ExprArena::new();
    let one = arena.literal(ConstValue::Int(1), pos(1));
    let boom = arena.raise("ZeroDivisionError", "division by zero", pos(1));
    let tuple = arena.make_tuple(vec![one, boom], pos(1));
    assert!(arena.will_raise(boom));
    assert!(arena.will_raise(tuple));
    assert!(!arena.will_raise(one));
    assert!(arena.may_raise(boom, ExceptionFilter::Named("ZeroDivisionError")));
    assert!(arena.may_raise(boom, ExceptionFilter::Named("Exception")));
    assert!(!arena.may_raise(boom, ExceptionFilter::Named("KeyError")));
}

#[test]
fn explicit_facts_override_derivation() {
    let mut arena = ExprArena::new();
    let a = arena.variable("a", Shape::Long, pos(1));
    let b = arena.variable("b", Shape::Long, pos(1));
    let add = arena.binary(BinaryOp::Add, a, b, Shape::Long, pos(1));
    assert!(arena.may_raise(add, ExceptionFilter::Any));
    arena.set_may_raise(add, false);
    arena.set_side_effects(add, false);
    assert!(!arena.may_raise(add, ExceptionFilter::Any));
    assert!(!arena.has_side_effects(add));
}

#[test]
fn known_attribute_lookup_has_no_side_effects() {
    let mut arena = ExprArena::new();
    let list = arena.variable("l", Shape::List, pos(1));
    let append = arena.attribute(list, "append", pos(1));
    assert!(!arena.has_side_effects(append));

    let obj = arena.variable("o", Shape::Object, pos(1));
    let attr = arena.attribute(obj, "append", pos(1));
    assert!(arena.has_side_effects(attr));
}

#[test]
fn inplace_takes_target_shape() {
    let mut arena = ExprArena::new();
    let target = arena.variable("x", Shape::List, pos(3));
    let value = arena.variable("y", Shape::Tuple, pos(3));
    let inplace = arena.inplace(BinaryOp::Add, target, value, pos(3));
    assert_eq!(arena.shape(inplace), Shape::List);
    assert_eq!(arena.source_pos(inplace), pos(3));
    assert_eq!(arena.constant(inplace), None);
}
