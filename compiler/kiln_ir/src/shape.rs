//! The shape catalog.
//!
//! A [`Shape`] is a coarse runtime type category known ahead of time. The
//! catalog is closed: every shape is a constant, looked up by name with
//! [`Shape::from_name`], and described by a static [`ShapeInfo`] row.
//!
//! # Shape Categories
//!
//! - **Exact boxed shapes**: `INT`, `LONG`, `FLOAT`, `STR`, `UNICODE`, `BYTES`,
//!   `TUPLE`, `LIST`, `DICT`, `SET`, `FROZENSET`, `BOOL`. Values are reference
//!   counted objects of exactly that runtime type.
//! - **Derived shapes**: subclass-compatible or union categories. They carry
//!   useful capability facts but have no helpers of their own; their
//!   [`helper_shape`](Shape::helper_shape) is `OBJECT`.
//! - **Machine shapes**: `CLONG`, `CFLOAT`, `DIGIT`, `NILONG`. Unboxed values
//!   used by fast paths. They are never reference counted and can never be
//!   the target of an in-place operation.
//! - **`OBJECT`**: nothing is known.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Pre-computed capability facts for a shape.
    ///
    /// Stored once per catalog row, queried in O(1).
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct ShapeFlags: u32 {
        // === Slot presence (bits 0-7) ===

        /// Values support `iter()` through a type slot.
        const HAS_SLOT_ITER = 1 << 0;
        /// Values support `len()` through a type slot.
        const HAS_SLOT_LEN = 1 << 1;
        /// Sequence concatenation slot (`sq_concat`).
        const HAS_SEQ_CONCAT = 1 << 2;
        /// Sequence repeat slot (`sq_repeat`).
        const HAS_SEQ_REPEAT = 1 << 3;
        /// Mapping protocol (`mp_subscript`).
        const HAS_MAPPING = 1 << 4;
        /// Number protocol.
        const NUMERIC = 1 << 5;

        // === Hashability (bits 8-9) ===
        // Neither bit set means "unknown".

        /// Hashing can never fail.
        const HASHABLE_ALWAYS = 1 << 8;
        /// Hashing always raises `TypeError`.
        const HASHABLE_NEVER = 1 << 9;

        // === Representation (bits 16-23) ===

        /// Reference counted object (as opposed to a machine value).
        const BOXED = 1 << 16;
        /// Exactly one runtime type, no subclasses.
        const EXACT = 1 << 17;
        /// Subclass-compatible or union category.
        const DERIVED = 1 << 18;
        /// Unboxed machine-level value.
        const MACHINE = 1 << 19;
        /// Values can be mutated in place.
        const MUTABLE = 1 << 20;

        // === Behaviour (bits 24-31) ===

        /// Rich comparison against the same shape can never raise.
        const CMP_NEVER_RAISES = 1 << 24;
    }
}

/// Static hashability knowledge for a shape.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Hashability {
    Always,
    Never,
    Unknown,
}

/// A coarse runtime type category.
///
/// `Copy` and one byte wide; all facts live in the static catalog.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Shape {
    // === Exact boxed shapes ===
    /// Python 2 `int` (machine-word integer object).
    Int = 0,
    /// Arbitrary precision integer (`long` on Python 2, `int` on Python 3).
    Long = 1,
    Float = 2,
    /// Python 2 `str` (byte string).
    Str = 3,
    /// Unicode text (`unicode` on Python 2, `str` on Python 3).
    Unicode = 4,
    /// Python 3 `bytes`.
    Bytes = 5,
    Tuple = 6,
    List = 7,
    Dict = 8,
    Set = 9,
    FrozenSet = 10,
    Bool = 11,

    // === Unknown ===
    Object = 16,

    // === Derived shapes ===
    /// Either `INT` or `LONG`, decided at run time.
    IntOrLong = 20,
    /// Either `STR` or `UNICODE`, decided at run time.
    StrOrUnicode = 21,
    /// `LONG` or a subclass of it.
    LongDerived = 22,
    /// `UNICODE` or a subclass of it.
    UnicodeDerived = 23,

    // === Machine shapes ===
    /// C `long`.
    CLong = 32,
    /// C `double`.
    CFloat = 33,
    /// One bignum digit.
    Digit = 34,
    /// Integer accumulator holding either a C `long` or an object.
    NiLong = 35,
}

/// One row of the shape catalog.
#[derive(Copy, Clone, Debug)]
pub struct ShapeInfo {
    /// Canonical upper-case name, also used in helper identifiers.
    pub name: &'static str,
    pub flags: ShapeFlags,
    /// C declaration type of a value of this shape in emitted code.
    pub c_type: &'static str,
    /// Runtime type object, for exact shapes.
    pub type_object: Option<&'static str>,
    /// Exact type check macro, for exact shapes.
    pub check_exact: Option<&'static str>,
    /// Attribute names a value is known to have, when the shape is exact.
    pub attributes: Option<&'static [&'static str]>,
}

const SEQ_ATTRS_STR: &[&str] = &[
    "capitalize",
    "center",
    "count",
    "decode",
    "encode",
    "endswith",
    "find",
    "format",
    "index",
    "join",
    "lower",
    "lstrip",
    "partition",
    "replace",
    "rfind",
    "rindex",
    "rsplit",
    "rstrip",
    "split",
    "splitlines",
    "startswith",
    "strip",
    "upper",
];
const TUPLE_ATTRS: &[&str] = &["count", "index"];
const LIST_ATTRS: &[&str] = &[
    "append", "clear", "copy", "count", "extend", "index", "insert", "pop", "remove", "reverse",
    "sort",
];
const DICT_ATTRS: &[&str] = &[
    "clear",
    "copy",
    "fromkeys",
    "get",
    "items",
    "keys",
    "pop",
    "popitem",
    "setdefault",
    "update",
    "values",
];
const SET_ATTRS: &[&str] = &[
    "add",
    "clear",
    "copy",
    "difference",
    "discard",
    "intersection",
    "isdisjoint",
    "issubset",
    "issuperset",
    "pop",
    "remove",
    "symmetric_difference",
    "union",
    "update",
];
const FROZENSET_ATTRS: &[&str] = &[
    "copy",
    "difference",
    "intersection",
    "isdisjoint",
    "issubset",
    "issuperset",
    "symmetric_difference",
    "union",
];
const INT_ATTRS: &[&str] = &[
    "bit_length",
    "conjugate",
    "denominator",
    "imag",
    "numerator",
    "real",
];
const FLOAT_ATTRS: &[&str] = &[
    "as_integer_ratio",
    "conjugate",
    "fromhex",
    "hex",
    "imag",
    "is_integer",
    "real",
];

const EXACT_BOXED: ShapeFlags = ShapeFlags::BOXED.union(ShapeFlags::EXACT);
const NUMBER: ShapeFlags = EXACT_BOXED
    .union(ShapeFlags::NUMERIC)
    .union(ShapeFlags::HASHABLE_ALWAYS)
    .union(ShapeFlags::CMP_NEVER_RAISES);
const TEXT: ShapeFlags = EXACT_BOXED
    .union(ShapeFlags::HAS_SLOT_ITER)
    .union(ShapeFlags::HAS_SLOT_LEN)
    .union(ShapeFlags::HAS_SEQ_CONCAT)
    .union(ShapeFlags::HAS_SEQ_REPEAT)
    .union(ShapeFlags::HASHABLE_ALWAYS)
    .union(ShapeFlags::CMP_NEVER_RAISES);
const CONTAINER: ShapeFlags = EXACT_BOXED
    .union(ShapeFlags::HAS_SLOT_ITER)
    .union(ShapeFlags::HAS_SLOT_LEN);
const MACHINE_NUMBER: ShapeFlags = ShapeFlags::MACHINE
    .union(ShapeFlags::NUMERIC)
    .union(ShapeFlags::HASHABLE_ALWAYS)
    .union(ShapeFlags::CMP_NEVER_RAISES);

const fn exact(
    name: &'static str,
    flags: ShapeFlags,
    type_object: &'static str,
    check_exact: &'static str,
    attributes: &'static [&'static str],
) -> ShapeInfo {
    ShapeInfo {
        name,
        flags,
        c_type: "PyObject *",
        type_object: Some(type_object),
        check_exact: Some(check_exact),
        attributes: Some(attributes),
    }
}

const fn inexact(name: &'static str, flags: ShapeFlags, c_type: &'static str) -> ShapeInfo {
    ShapeInfo {
        name,
        flags,
        c_type,
        type_object: None,
        check_exact: None,
        attributes: None,
    }
}

static INT_INFO: ShapeInfo = exact("INT", NUMBER, "PyInt_Type", "PyInt_CheckExact", INT_ATTRS);
static LONG_INFO: ShapeInfo = exact(
    "LONG",
    NUMBER,
    "PyLong_Type",
    "PyLong_CheckExact",
    INT_ATTRS,
);
static FLOAT_INFO: ShapeInfo = exact(
    "FLOAT",
    NUMBER,
    "PyFloat_Type",
    "PyFloat_CheckExact",
    FLOAT_ATTRS,
);
static STR_INFO: ShapeInfo = exact(
    "STR",
    TEXT,
    "PyString_Type",
    "PyString_CheckExact",
    SEQ_ATTRS_STR,
);
static UNICODE_INFO: ShapeInfo = exact(
    "UNICODE",
    TEXT,
    "PyUnicode_Type",
    "PyUnicode_CheckExact",
    SEQ_ATTRS_STR,
);
static BYTES_INFO: ShapeInfo = exact(
    "BYTES",
    TEXT,
    "PyBytes_Type",
    "PyBytes_CheckExact",
    SEQ_ATTRS_STR,
);
static TUPLE_INFO: ShapeInfo = exact(
    "TUPLE",
    CONTAINER
        .union(ShapeFlags::HAS_SEQ_CONCAT)
        .union(ShapeFlags::HAS_SEQ_REPEAT),
    "PyTuple_Type",
    "PyTuple_CheckExact",
    TUPLE_ATTRS,
);
static LIST_INFO: ShapeInfo = exact(
    "LIST",
    CONTAINER
        .union(ShapeFlags::HAS_SEQ_CONCAT)
        .union(ShapeFlags::HAS_SEQ_REPEAT)
        .union(ShapeFlags::HASHABLE_NEVER)
        .union(ShapeFlags::MUTABLE),
    "PyList_Type",
    "PyList_CheckExact",
    LIST_ATTRS,
);
static DICT_INFO: ShapeInfo = exact(
    "DICT",
    CONTAINER
        .union(ShapeFlags::HAS_MAPPING)
        .union(ShapeFlags::HASHABLE_NEVER)
        .union(ShapeFlags::MUTABLE),
    "PyDict_Type",
    "PyDict_CheckExact",
    DICT_ATTRS,
);
static SET_INFO: ShapeInfo = exact(
    "SET",
    CONTAINER
        .union(ShapeFlags::HASHABLE_NEVER)
        .union(ShapeFlags::MUTABLE),
    "PySet_Type",
    "PySet_CheckExact",
    SET_ATTRS,
);
static FROZENSET_INFO: ShapeInfo = exact(
    "FROZENSET",
    CONTAINER.union(ShapeFlags::HASHABLE_ALWAYS),
    "PyFrozenSet_Type",
    "PyFrozenSet_CheckExact",
    FROZENSET_ATTRS,
);
static BOOL_INFO: ShapeInfo = exact("BOOL", NUMBER, "PyBool_Type", "PyBool_Check", INT_ATTRS);
static OBJECT_INFO: ShapeInfo = inexact("OBJECT", ShapeFlags::BOXED, "PyObject *");
static INT_OR_LONG_INFO: ShapeInfo = inexact(
    "INT_OR_LONG",
    ShapeFlags::BOXED
        .union(ShapeFlags::DERIVED)
        .union(ShapeFlags::NUMERIC)
        .union(ShapeFlags::HASHABLE_ALWAYS)
        .union(ShapeFlags::CMP_NEVER_RAISES),
    "PyObject *",
);
static STR_OR_UNICODE_INFO: ShapeInfo = inexact(
    "STR_OR_UNICODE",
    TEXT.difference(ShapeFlags::EXACT)
        .union(ShapeFlags::DERIVED),
    "PyObject *",
);
static LONG_DERIVED_INFO: ShapeInfo = inexact(
    "LONG_DERIVED",
    ShapeFlags::BOXED
        .union(ShapeFlags::DERIVED)
        .union(ShapeFlags::NUMERIC),
    "PyObject *",
);
static UNICODE_DERIVED_INFO: ShapeInfo = inexact(
    "UNICODE_DERIVED",
    ShapeFlags::BOXED
        .union(ShapeFlags::DERIVED)
        .union(ShapeFlags::HAS_SLOT_ITER)
        .union(ShapeFlags::HAS_SLOT_LEN),
    "PyObject *",
);
static CLONG_INFO: ShapeInfo = inexact("CLONG", MACHINE_NUMBER, "long");
static CFLOAT_INFO: ShapeInfo = inexact("CFLOAT", MACHINE_NUMBER, "double");
static DIGIT_INFO: ShapeInfo = inexact("DIGIT", MACHINE_NUMBER, "digit");
static NILONG_INFO: ShapeInfo = inexact(
    "NILONG",
    MACHINE_NUMBER.union(ShapeFlags::MUTABLE),
    "nuitka_ilong",
);

impl Shape {
    /// Every shape in the catalog, in declaration order.
    pub const ALL: [Shape; 21] = [
        Shape::Int,
        Shape::Long,
        Shape::Float,
        Shape::Str,
        Shape::Unicode,
        Shape::Bytes,
        Shape::Tuple,
        Shape::List,
        Shape::Dict,
        Shape::Set,
        Shape::FrozenSet,
        Shape::Bool,
        Shape::Object,
        Shape::IntOrLong,
        Shape::StrOrUnicode,
        Shape::LongDerived,
        Shape::UnicodeDerived,
        Shape::CLong,
        Shape::CFloat,
        Shape::Digit,
        Shape::NiLong,
    ];

    /// Exact boxed shapes that operand pairs are enumerated over.
    pub const OPERAND: [Shape; 12] = [
        Shape::Int,
        Shape::Long,
        Shape::Float,
        Shape::Str,
        Shape::Unicode,
        Shape::Bytes,
        Shape::Tuple,
        Shape::List,
        Shape::Dict,
        Shape::Set,
        Shape::FrozenSet,
        Shape::Bool,
    ];

    /// Machine shapes that can never be the target of an in-place operation.
    pub const NO_INPLACE_TARGET: [Shape; 3] = [Shape::CLong, Shape::Digit, Shape::CFloat];

    /// The catalog row for this shape.
    pub fn info(self) -> &'static ShapeInfo {
        match self {
            Shape::Int => &INT_INFO,
            Shape::Long => &LONG_INFO,
            Shape::Float => &FLOAT_INFO,
            Shape::Str => &STR_INFO,
            Shape::Unicode => &UNICODE_INFO,
            Shape::Bytes => &BYTES_INFO,
            Shape::Tuple => &TUPLE_INFO,
            Shape::List => &LIST_INFO,
            Shape::Dict => &DICT_INFO,
            Shape::Set => &SET_INFO,
            Shape::FrozenSet => &FROZENSET_INFO,
            Shape::Bool => &BOOL_INFO,
            Shape::Object => &OBJECT_INFO,
            Shape::IntOrLong => &INT_OR_LONG_INFO,
            Shape::StrOrUnicode => &STR_OR_UNICODE_INFO,
            Shape::LongDerived => &LONG_DERIVED_INFO,
            Shape::UnicodeDerived => &UNICODE_DERIVED_INFO,
            Shape::CLong => &CLONG_INFO,
            Shape::CFloat => &CFLOAT_INFO,
            Shape::Digit => &DIGIT_INFO,
            Shape::NiLong => &NILONG_INFO,
        }
    }

    /// Look up a shape by its canonical name.
    pub fn from_name(name: &str) -> Option<Shape> {
        Shape::ALL.into_iter().find(|shape| shape.name() == name)
    }

    /// Canonical name (`"INT"`, `"OBJECT"`, ...).
    #[inline]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    #[inline]
    pub fn flags(self) -> ShapeFlags {
        self.info().flags
    }

    /// The shape whose name appears in helper identifiers.
    ///
    /// Exact and machine shapes name themselves; derived shapes and
    /// `OBJECT` use the generic `OBJECT` helpers.
    pub fn helper_shape(self) -> Shape {
        if self.flags().intersects(ShapeFlags::EXACT | ShapeFlags::MACHINE) {
            self
        } else {
            Shape::Object
        }
    }

    #[inline]
    pub fn is_object(self) -> bool {
        self == Shape::Object
    }

    #[inline]
    pub fn is_exact(self) -> bool {
        self.flags().contains(ShapeFlags::EXACT)
    }

    #[inline]
    pub fn is_machine(self) -> bool {
        self.flags().contains(ShapeFlags::MACHINE)
    }

    /// Whether values are reference counted objects.
    #[inline]
    pub fn is_boxed(self) -> bool {
        self.flags().contains(ShapeFlags::BOXED)
    }

    /// Whether an in-place operation may use this shape as its target.
    pub fn can_be_inplace_target(self) -> bool {
        !Shape::NO_INPLACE_TARGET.contains(&self)
    }

    #[inline]
    pub fn has_slot_iter(self) -> bool {
        self.flags().contains(ShapeFlags::HAS_SLOT_ITER)
    }

    #[inline]
    pub fn has_slot_len(self) -> bool {
        self.flags().contains(ShapeFlags::HAS_SLOT_LEN)
    }

    pub fn hashability(self) -> Hashability {
        let flags = self.flags();
        if flags.contains(ShapeFlags::HASHABLE_ALWAYS) {
            Hashability::Always
        } else if flags.contains(ShapeFlags::HASHABLE_NEVER) {
            Hashability::Never
        } else {
            Hashability::Unknown
        }
    }

    /// Hashing a value of this shape is statically known to succeed.
    #[inline]
    pub fn is_known_hashable(self) -> bool {
        self.hashability() == Hashability::Always
    }

    /// Comparing two values of this same shape can never raise.
    #[inline]
    pub fn compares_without_raising(self) -> bool {
        self.flags().contains(ShapeFlags::CMP_NEVER_RAISES)
    }

    /// Whether values of this shape have the named attribute.
    ///
    /// `None` when the shape is not exact enough to know.
    pub fn has_attribute(self, attribute: &str) -> Option<bool> {
        self.info()
            .attributes
            .map(|attributes| attributes.contains(&attribute))
    }

    /// The C declaration type used for values of this shape.
    #[inline]
    pub fn c_type(self) -> &'static str {
        self.info().c_type
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
