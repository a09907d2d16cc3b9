//! The operator rule tables.
//!
//! One descriptor per binary operator and one shared comparison
//! descriptor. The `match` in [`operator_descriptor`] is exhaustive, so a
//! new operator cannot be added without deciding its rules here.

use kiln_ir::{BinaryOp, Shape};

use crate::descriptor::{
    ComparisonDescriptor, InplaceRule, OperatorDescriptor, OBJECT, OBJECT_NBOOL, OBJECT_NILONG,
};

/// Shapes of the numeric tower, in dominance order.
const NUMBERS: [Shape; 3] = [Shape::Int, Shape::Long, Shape::Float];

/// Integer shapes used by the shift and bitwise operators.
const INTEGERS: [Shape; 2] = [Shape::Int, Shape::Long];

/// Sequence shapes supporting concatenation with themselves.
const SEQUENCES: [Shape; 5] = [
    Shape::Str,
    Shape::Unicode,
    Shape::Bytes,
    Shape::Tuple,
    Shape::List,
];

/// Unboxed companions of `LONG` and `FLOAT` for `+` and `-`.
fn with_machine_friends(desc: OperatorDescriptor) -> OperatorDescriptor {
    desc.friend(Shape::Long, Shape::Digit, OBJECT_NILONG)
        .friend(Shape::Long, Shape::CLong, OBJECT_NILONG)
        .friend(Shape::Int, Shape::CLong, OBJECT)
        .friend(Shape::Float, Shape::CFloat, OBJECT)
}

/// `sequence * count` for every sequence and integer shape.
fn with_repeat_friends(desc: OperatorDescriptor) -> OperatorDescriptor {
    desc.friend(Shape::Str, Shape::Int, OBJECT)
        .friend(Shape::Unicode, Shape::Int, OBJECT)
        .friend(Shape::Tuple, Shape::Int, OBJECT)
        .friend(Shape::List, Shape::Int, OBJECT)
        .friend(Shape::Bytes, Shape::Long, OBJECT)
        .friend(Shape::Unicode, Shape::Long, OBJECT)
        .friend(Shape::Tuple, Shape::Long, OBJECT)
        .friend(Shape::List, Shape::Long, OBJECT)
        .friend(Shape::Str, Shape::Long, OBJECT)
}

/// The rule table of one binary operator.
pub fn operator_descriptor(op: BinaryOp) -> OperatorDescriptor {
    let base = OperatorDescriptor::new(op);
    match op {
        BinaryOp::Add => with_machine_friends(
            base.with_inplace(InplaceRule::Derived)
                .same(&NUMBERS, OBJECT_NBOOL)
                .same(&SEQUENCES, OBJECT)
                .friend_group(&NUMBERS, OBJECT_NBOOL),
        )
        .friend(Shape::Str, Shape::Unicode, OBJECT),
        BinaryOp::Sub => with_machine_friends(
            base.with_inplace(InplaceRule::Direct)
                .same(&NUMBERS, OBJECT_NBOOL)
                .same(&[Shape::Set], OBJECT)
                .friend_group(&NUMBERS, OBJECT_NBOOL),
        ),
        BinaryOp::Mult => with_repeat_friends(
            base.with_inplace(InplaceRule::Derived)
                .same(&NUMBERS, OBJECT_NBOOL)
                .friend_group(&NUMBERS, OBJECT_NBOOL),
        ),
        BinaryOp::FloorDiv | BinaryOp::TrueDiv | BinaryOp::OldDiv => base
            .with_inplace(InplaceRule::Direct)
            .same(&NUMBERS, OBJECT_NBOOL)
            .friend_group(&NUMBERS, OBJECT_NBOOL),
        BinaryOp::Mod => base
            .with_inplace(InplaceRule::Direct)
            .same(&NUMBERS, OBJECT_NBOOL)
            .friend_group(&NUMBERS, OBJECT_NBOOL)
            .with_string_format(),
        BinaryOp::Divmod => base
            .with_inplace(InplaceRule::None)
            .with_default_results(OBJECT)
            .same(&NUMBERS, OBJECT)
            .friend_group(&NUMBERS, OBJECT),
        BinaryOp::Pow => base
            .with_inplace(InplaceRule::Direct)
            .same(&NUMBERS, OBJECT)
            .friend(Shape::Int, Shape::Long, OBJECT)
            .friend(Shape::Long, Shape::Float, OBJECT)
            .friend(Shape::Int, Shape::Float, OBJECT)
            .with_inactive(Shape::Long, Shape::Float),
        BinaryOp::LShift | BinaryOp::RShift => base
            .with_inplace(InplaceRule::Direct)
            .same(&INTEGERS, OBJECT_NBOOL)
            .friend(Shape::Int, Shape::Long, OBJECT_NBOOL),
        BinaryOp::BitAnd | BinaryOp::BitXor => base
            .with_inplace(InplaceRule::Derived)
            .same(&INTEGERS, OBJECT_NBOOL)
            .same(&[Shape::Set], OBJECT)
            .friend(Shape::Int, Shape::Long, OBJECT_NBOOL),
        BinaryOp::BitOr => base
            .with_inplace(InplaceRule::Derived)
            .same(&INTEGERS, OBJECT_NBOOL)
            .same(&[Shape::Set, Shape::Dict], OBJECT)
            .friend(Shape::Int, Shape::Long, OBJECT_NBOOL),
        BinaryOp::MatMult => base
            .with_inplace(InplaceRule::Direct)
            .same(&[Shape::Long, Shape::Float], OBJECT),
    }
}

/// Every binary operator's rule table, in operator order.
pub fn operator_descriptors() -> Vec<OperatorDescriptor> {
    BinaryOp::ALL.into_iter().map(operator_descriptor).collect()
}

/// The rule table shared by all rich comparisons.
pub fn comparison_descriptor() -> ComparisonDescriptor {
    ComparisonDescriptor {
        shapes: vec![
            Shape::Int,
            Shape::Long,
            Shape::Float,
            Shape::Str,
            Shape::Unicode,
            Shape::Bytes,
            Shape::Tuple,
            Shape::List,
        ],
        results: OBJECT_NBOOL,
        friends: vec![
            (Shape::Int, Shape::Long),
            (Shape::Long, Shape::Float),
            (Shape::Int, Shape::Float),
            (Shape::Float, Shape::CFloat),
        ],
        shortcut_pairs: vec![
            (Shape::Long, Shape::CLong),
            (Shape::Long, Shape::Digit),
            (Shape::Int, Shape::CLong),
        ],
        operand_shapes: Shape::OPERAND.to_vec(),
    }
}
