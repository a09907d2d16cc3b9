//! Call helper names and trampoline keys.
//!
//! Calls with a fixed argument count go through count-parameterized
//! helpers (`CALL_FUNCTION_WITH_ARGS3`). The runtime library ships these
//! up to a fixed count; larger counts are generated per unit, keyed by
//! [`TrampolineKey`].

use std::fmt;

/// Identity of one count-parameterized call helper.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrampolineKey {
    /// Positional arguments from an array of values.
    Positional(usize),
    /// Positional arguments from an existing tuple object.
    PositionalTuple(usize),
    /// Method call: receiver, attribute name, positional array.
    Method(usize),
    /// Positional arguments plus split keyword arguments.
    Mixed {
        count: usize,
        /// Positional arguments come from a tuple object.
        has_tuple: bool,
        /// Keyword values are passed as their own array rather than
        /// appended to the positional array.
        has_dict_values: bool,
    },
}

impl TrampolineKey {
    /// The positional argument count the helper is specialized for.
    pub fn count(self) -> usize {
        match self {
            TrampolineKey::Positional(n)
            | TrampolineKey::PositionalTuple(n)
            | TrampolineKey::Method(n)
            | TrampolineKey::Mixed { count: n, .. } => n,
        }
    }

    /// Whether a hand-written 0/1-argument form replaces the generated body.
    pub fn has_fixed_form(self) -> bool {
        match self {
            TrampolineKey::Positional(n) | TrampolineKey::Method(n) => n <= 1,
            TrampolineKey::PositionalTuple(_) | TrampolineKey::Mixed { .. } => false,
        }
    }

    /// Runtime helper name.
    pub fn helper_name(self) -> String {
        match self {
            TrampolineKey::Positional(0) => "CALL_FUNCTION_NO_ARGS".to_owned(),
            TrampolineKey::Positional(1) => "CALL_FUNCTION_WITH_SINGLE_ARG".to_owned(),
            TrampolineKey::Positional(n) => format!("CALL_FUNCTION_WITH_ARGS{n}"),
            TrampolineKey::PositionalTuple(n) => format!("CALL_FUNCTION_WITH_POSARGS{n}"),
            TrampolineKey::Method(0) => "CALL_METHOD_NO_ARGS".to_owned(),
            TrampolineKey::Method(1) => "CALL_METHOD_WITH_SINGLE_ARG".to_owned(),
            TrampolineKey::Method(n) => format!("CALL_METHOD_WITH_ARGS{n}"),
            TrampolineKey::Mixed {
                count,
                has_tuple,
                has_dict_values,
            } => {
                let source = if has_tuple { "POSARGS" } else { "ARGS" };
                let suffix = if has_dict_values { "KWSPLIT" } else { "VECTORCALL" };
                format!("CALL_FUNCTION_WITH_{source}{count}_{suffix}")
            }
        }
    }
}

impl fmt::Display for TrampolineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.helper_name())
    }
}

/// Keyword-only call with split names and values.
pub const CALL_KWSPLIT: &str = "CALL_FUNCTION_WITH_NO_ARGS_KWSPLIT";
/// Positional-only call with a tuple of unknown length.
pub const CALL_POSARGS: &str = "CALL_FUNCTION_WITH_POSARGS";
/// Fully generic call with optional tuple and dict.
pub const CALL_GENERIC: &str = "CALL_FUNCTION";
