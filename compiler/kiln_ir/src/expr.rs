//! Expression interface consumed from the optimizer.
//!
//! The specialization core never decides shapes itself. It asks the
//! optimizer, through [`ExprQuery`], for each node's shape, whether it may
//! raise, whether it always raises, whether it is a compile-time constant,
//! and where it came from.
//!
//! [`ExprArena`] is a flat, index-based implementation of that interface.
//! Facts not given explicitly are derived conservatively from the node
//! kind and operand shapes.

use std::fmt::Write as _;

use smallvec::SmallVec;

use crate::{BinaryOp, ComparisonOp, Shape};

// ── IDs and positions ───────────────────────────────────────────────

/// Index of an expression node within an [`ExprArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ExprId(u32);

impl ExprId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Source position, used only for line tracking and diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

// ── Constants ───────────────────────────────────────────────────────

/// A compile-time constant value.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Text string.
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<ConstValue>),
    List(Vec<ConstValue>),
    Dict(Vec<(ConstValue, ConstValue)>),
}

impl ConstValue {
    /// The exact shape of this constant.
    pub fn shape(&self) -> Shape {
        match self {
            ConstValue::None => Shape::Object,
            ConstValue::Bool(_) => Shape::Bool,
            ConstValue::Int(_) => Shape::Long,
            ConstValue::Float(_) => Shape::Float,
            ConstValue::Str(_) => Shape::Unicode,
            ConstValue::Bytes(_) => Shape::Bytes,
            ConstValue::Tuple(_) => Shape::Tuple,
            ConstValue::List(_) => Shape::List,
            ConstValue::Dict(_) => Shape::Dict,
        }
    }

    /// Whether the value, or anything it contains, can be mutated.
    ///
    /// Mutable constants cannot be shared between uses; each use needs a
    /// fresh copy.
    pub fn is_mutable(&self) -> bool {
        match self {
            ConstValue::List(_) | ConstValue::Dict(_) => true,
            ConstValue::Tuple(elements) => elements.iter().any(ConstValue::is_mutable),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn tuple_elements(&self) -> Option<&[ConstValue]> {
        match self {
            ConstValue::Tuple(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn dict_items(&self) -> Option<&[(ConstValue, ConstValue)]> {
        match self {
            ConstValue::Dict(items) => Some(items),
            _ => None,
        }
    }

    /// Empty tuple or empty dict.
    pub fn is_empty_container(&self) -> bool {
        match self {
            ConstValue::Tuple(v) | ConstValue::List(v) => v.is_empty(),
            ConstValue::Dict(v) => v.is_empty(),
            _ => false,
        }
    }

    /// Source-language `repr()` of the value.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out);
        out
    }

    fn write_repr(&self, out: &mut String) {
        match self {
            ConstValue::None => out.push_str("None"),
            ConstValue::Bool(true) => out.push_str("True"),
            ConstValue::Bool(false) => out.push_str("False"),
            ConstValue::Int(v) => {
                let _ = write!(out, "{v}");
            }
            ConstValue::Float(v) => write_float_repr(*v, out),
            ConstValue::Str(s) => {
                let _ = write!(out, "'{}'", s.escape_default());
            }
            ConstValue::Bytes(b) => {
                out.push_str("b'");
                for byte in b {
                    if byte.is_ascii_graphic() || *byte == b' ' {
                        out.push(char::from(*byte));
                    } else {
                        let _ = write!(out, "\\x{byte:02x}");
                    }
                }
                out.push('\'');
            }
            ConstValue::Tuple(elements) => {
                out.push('(');
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    element.write_repr(out);
                }
                if elements.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            ConstValue::List(elements) => {
                out.push('[');
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    element.write_repr(out);
                }
                out.push(']');
            }
            ConstValue::Dict(items) => {
                out.push('{');
                for (i, (key, value)) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.write_repr(out);
                    out.push_str(": ");
                    value.write_repr(out);
                }
                out.push('}');
            }
        }
    }
}

/// Shortest round-trip digits, positional between `1e-4` and `1e16`,
/// exponent form with a signed two-digit exponent elsewhere.
fn write_float_repr(v: f64, out: &mut String) {
    if v.is_nan() {
        out.push_str("nan");
        return;
    }
    if v.is_sign_negative() {
        out.push('-');
    }
    let v = v.abs();
    if v.is_infinite() {
        out.push_str("inf");
        return;
    }
    let scientific = format!("{v:e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let point = exponent + 1;

    if point <= -4 || point > 16 {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(out, "e{sign}{:02}", exponent.unsigned_abs());
    } else if point <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take(point.unsigned_abs() as usize));
        out.push_str(&digits);
    } else {
        let point = point.unsigned_abs() as usize;
        if point >= digits.len() {
            out.push_str(&digits);
            out.extend(std::iter::repeat('0').take(point - digits.len()));
            out.push_str(".0");
        } else {
            out.push_str(&digits[..point]);
            out.push('.');
            out.push_str(&digits[point..]);
        }
    }
}

// ── Expression nodes ────────────────────────────────────────────────

/// The structural kind of an expression node.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Constant(ConstValue),
    /// Read of a local or module variable. Yields a borrowed reference.
    Variable(String),
    /// A value the optimizer knows nothing structural about.
    Opaque(String),
    MakeTuple(Vec<ExprId>),
    MakeList(Vec<ExprId>),
    /// Dict display, `(key, value)` pairs in source order.
    MakeDict(Vec<(ExprId, ExprId)>),
    AttributeLookup {
        source: ExprId,
        attribute: String,
    },
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    /// Augmented assignment value: `target op= value`.
    Inplace {
        op: BinaryOp,
        target: ExprId,
        value: ExprId,
    },
    Compare {
        op: ComparisonOp,
        left: ExprId,
        right: ExprId,
    },
    /// Call with optional positional-args and keyword-args aggregates.
    ///
    /// `args` is a tuple-valued expression (display, constant or dynamic),
    /// `kwargs` a dict-valued one.
    Call {
        callee: ExprId,
        args: Option<ExprId>,
        kwargs: Option<ExprId>,
    },
    /// An expression proven to always raise.
    Raise {
        exception: String,
        message: String,
    },
}

impl ExprKind {
    /// Direct operands, in evaluation order.
    pub fn children(&self) -> SmallVec<[ExprId; 4]> {
        let mut out = SmallVec::new();
        match self {
            ExprKind::Constant(_)
            | ExprKind::Variable(_)
            | ExprKind::Opaque(_)
            | ExprKind::Raise { .. } => {}
            ExprKind::MakeTuple(elements) | ExprKind::MakeList(elements) => {
                out.extend(elements.iter().copied());
            }
            ExprKind::MakeDict(pairs) => {
                for &(key, value) in pairs {
                    out.push(key);
                    out.push(value);
                }
            }
            ExprKind::AttributeLookup { source, .. } => out.push(*source),
            ExprKind::Binary { left, right, .. } | ExprKind::Compare { left, right, .. } => {
                out.push(*left);
                out.push(*right);
            }
            ExprKind::Inplace { target, value, .. } => {
                out.push(*target);
                out.push(*value);
            }
            ExprKind::Call {
                callee,
                args,
                kwargs,
            } => {
                out.push(*callee);
                out.extend(*args);
                out.extend(*kwargs);
            }
        }
        out
    }
}

/// One expression with its optimizer-provided facts.
#[derive(Clone, Debug, PartialEq)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub shape: Shape,
    pub pos: SourcePos,
    /// Explicit may-raise fact; derived when `None`.
    pub may_raise: Option<bool>,
    /// Explicit side-effect fact; derived when `None`.
    pub side_effects: Option<bool>,
}

/// Which exceptions a may-raise query is interested in.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ExceptionFilter<'a> {
    /// Any exception at all.
    Any,
    /// Only the named exception class (and what it catches).
    Named(&'a str),
}

impl ExceptionFilter<'_> {
    /// Whether raising `exception` is caught by this filter.
    pub fn catches(self, exception: &str) -> bool {
        match self {
            ExceptionFilter::Any => true,
            ExceptionFilter::Named(name) => {
                name == exception || name == "BaseException" || name == "Exception"
            }
        }
    }
}

// ── Query interface ─────────────────────────────────────────────────

/// What the specialization core asks the optimizer about expressions.
pub trait ExprQuery {
    fn kind(&self, id: ExprId) -> &ExprKind;

    /// Statically known shape, `OBJECT` when unknown.
    fn shape(&self, id: ExprId) -> Shape;

    /// Whether evaluating the node can raise an exception matching `filter`.
    fn may_raise(&self, id: ExprId, filter: ExceptionFilter<'_>) -> bool;

    /// Whether evaluating the node is proven to always raise.
    fn will_raise(&self, id: ExprId) -> bool;

    /// Whether evaluating the node has effects observable by user code.
    fn has_side_effects(&self, id: ExprId) -> bool;

    fn source_pos(&self, id: ExprId) -> SourcePos;

    /// The constant value, for compile-time constants.
    fn constant(&self, id: ExprId) -> Option<&ConstValue> {
        match self.kind(id) {
            ExprKind::Constant(value) => Some(value),
            _ => None,
        }
    }
}

// ── Arena ───────────────────────────────────────────────────────────

/// Flat storage for expression nodes.
#[derive(Clone, Debug, Default)]
pub struct ExprArena {
    nodes: Vec<ExprNode>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node and return its ID.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "expression counts never exceed u32"
    )]
    pub fn push(&mut self, kind: ExprKind, shape: Shape, pos: SourcePos) -> ExprId {
        let id = ExprId::new(self.nodes.len() as u32);
        self.nodes.push(ExprNode {
            kind,
            shape,
            pos,
            may_raise: None,
            side_effects: None,
        });
        id
    }

    #[inline]
    pub fn node(&self, id: ExprId) -> &ExprNode {
        &self.nodes[id.index()]
    }

    /// Override the derived may-raise fact of a node.
    pub fn set_may_raise(&mut self, id: ExprId, may_raise: bool) {
        self.nodes[id.index()].may_raise = Some(may_raise);
    }

    /// Override the derived side-effect fact of a node.
    pub fn set_side_effects(&mut self, id: ExprId, side_effects: bool) {
        self.nodes[id.index()].side_effects = Some(side_effects);
    }

    // Convenience constructors

    pub fn literal(&mut self, value: ConstValue, pos: SourcePos) -> ExprId {
        let shape = value.shape();
        self.push(ExprKind::Constant(value), shape, pos)
    }

    pub fn variable(&mut self, name: &str, shape: Shape, pos: SourcePos) -> ExprId {
        self.push(ExprKind::Variable(name.to_owned()), shape, pos)
    }

    pub fn opaque(&mut self, label: &str, shape: Shape, pos: SourcePos) -> ExprId {
        self.push(ExprKind::Opaque(label.to_owned()), shape, pos)
    }

    pub fn make_tuple(&mut self, elements: Vec<ExprId>, pos: SourcePos) -> ExprId {
        self.push(ExprKind::MakeTuple(elements), Shape::Tuple, pos)
    }

    pub fn make_list(&mut self, elements: Vec<ExprId>, pos: SourcePos) -> ExprId {
        self.push(ExprKind::MakeList(elements), Shape::List, pos)
    }

    pub fn make_dict(&mut self, pairs: Vec<(ExprId, ExprId)>, pos: SourcePos) -> ExprId {
        self.push(ExprKind::MakeDict(pairs), Shape::Dict, pos)
    }

    pub fn attribute(&mut self, source: ExprId, attribute: &str, pos: SourcePos) -> ExprId {
        self.push(
            ExprKind::AttributeLookup {
                source,
                attribute: attribute.to_owned(),
            },
            Shape::Object,
            pos,
        )
    }

    pub fn binary(
        &mut self,
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
        shape: Shape,
        pos: SourcePos,
    ) -> ExprId {
        self.push(ExprKind::Binary { op, left, right }, shape, pos)
    }

    pub fn inplace(
        &mut self,
        op: BinaryOp,
        target: ExprId,
        value: ExprId,
        pos: SourcePos,
    ) -> ExprId {
        let shape = self.node(target).shape;
        self.push(ExprKind::Inplace { op, target, value }, shape, pos)
    }

    pub fn compare(
        &mut self,
        op: ComparisonOp,
        left: ExprId,
        right: ExprId,
        pos: SourcePos,
    ) -> ExprId {
        self.push(ExprKind::Compare { op, left, right }, Shape::Object, pos)
    }

    pub fn call(
        &mut self,
        callee: ExprId,
        args: Option<ExprId>,
        kwargs: Option<ExprId>,
        pos: SourcePos,
    ) -> ExprId {
        self.push(
            ExprKind::Call {
                callee,
                args,
                kwargs,
            },
            Shape::Object,
            pos,
        )
    }

    pub fn raise(&mut self, exception: &str, message: &str, pos: SourcePos) -> ExprId {
        self.push(
            ExprKind::Raise {
                exception: exception.to_owned(),
                message: message.to_owned(),
            },
            Shape::Object,
            pos,
        )
    }

    fn any_child(&self, id: ExprId, mut pred: impl FnMut(ExprId) -> bool) -> bool {
        self.node(id).kind.children().into_iter().any(&mut pred)
    }

    fn attribute_known(&self, source: ExprId, attribute: &str) -> bool {
        self.node(source).shape.has_attribute(attribute) == Some(true)
    }
}

impl ExprQuery for ExprArena {
    fn kind(&self, id: ExprId) -> &ExprKind {
        &self.node(id).kind
    }

    fn shape(&self, id: ExprId) -> Shape {
        self.node(id).shape
    }

    fn may_raise(&self, id: ExprId, filter: ExceptionFilter<'_>) -> bool {
        let node = self.node(id);
        if let Some(explicit) = node.may_raise {
            return explicit;
        }
        let children_raise = self.any_child(id, |child| self.may_raise(child, filter));
        match &node.kind {
            ExprKind::Constant(_) | ExprKind::Variable(_) | ExprKind::Opaque(_) => false,
            ExprKind::MakeTuple(_) | ExprKind::MakeList(_) => children_raise,
            ExprKind::MakeDict(pairs) => {
                children_raise
                    || pairs
                        .iter()
                        .any(|&(key, _)| !self.node(key).shape.is_known_hashable())
            }
            ExprKind::AttributeLookup { source, attribute } => {
                children_raise || !self.attribute_known(*source, attribute)
            }
            ExprKind::Compare { left, right, .. } => {
                let (l, r) = (self.node(*left).shape, self.node(*right).shape);
                children_raise || !(l == r && l.is_exact() && l.compares_without_raising())
            }
            ExprKind::Binary { .. } | ExprKind::Inplace { .. } | ExprKind::Call { .. } => true,
            ExprKind::Raise { exception, .. } => filter.catches(exception),
        }
    }

    fn will_raise(&self, id: ExprId) -> bool {
        match &self.node(id).kind {
            ExprKind::Raise { .. } => true,
            ExprKind::Constant(_) | ExprKind::Variable(_) | ExprKind::Opaque(_) => false,
            _ => self.any_child(id, |child| self.will_raise(child)),
        }
    }

    fn has_side_effects(&self, id: ExprId) -> bool {
        let node = self.node(id);
        if let Some(explicit) = node.side_effects {
            return explicit;
        }
        match &node.kind {
            ExprKind::Constant(_) | ExprKind::Variable(_) | ExprKind::Opaque(_) => false,
            ExprKind::MakeTuple(_) | ExprKind::MakeList(_) | ExprKind::MakeDict(_) => {
                self.may_raise(id, ExceptionFilter::Any)
                    || self.any_child(id, |child| self.has_side_effects(child))
            }
            ExprKind::AttributeLookup { .. }
            | ExprKind::Binary { .. }
            | ExprKind::Inplace { .. }
            | ExprKind::Compare { .. } => {
                self.may_raise(id, ExceptionFilter::Any)
                    || self.any_child(id, |child| self.has_side_effects(child))
            }
            ExprKind::Call { .. } | ExprKind::Raise { .. } => true,
        }
    }

    fn source_pos(&self, id: ExprId) -> SourcePos {
        self.node(id).pos
    }
}

#[cfg(test)]
mod tests;
