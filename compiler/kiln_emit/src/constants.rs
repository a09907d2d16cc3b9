//! Module constant pool.
//!
//! Constants are created once at module load and referenced as
//! `mod_consts[N]`. Equal constants share one slot; slots are numbered in
//! first-use order.

use indexmap::IndexMap;
use kiln_ir::ConstValue;
use rustc_hash::FxBuildHasher;

#[derive(Clone, Debug, Default)]
pub struct ConstantPool {
    // Keyed by source repr, which distinguishes `1` from `1.0` and `True`.
    values: IndexMap<String, ConstValue, FxBuildHasher>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot index of `value`, adding it on first use.
    pub fn index_of(&mut self, value: &ConstValue) -> usize {
        let key = value.repr();
        if let Some(index) = self.values.get_index_of(&key) {
            return index;
        }
        self.values.insert_full(key, value.clone()).0
    }

    /// C expression for `value`.
    ///
    /// Singletons use their runtime objects directly.
    pub fn reference(&mut self, value: &ConstValue) -> String {
        match value {
            ConstValue::None => "Py_None".to_owned(),
            ConstValue::Bool(true) => "Py_True".to_owned(),
            ConstValue::Bool(false) => "Py_False".to_owned(),
            _ => format!("mod_consts[{}]", self.index_of(value)),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(index, repr)` for every slot, in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.values.keys().enumerate().map(|(i, key)| (i, key.as_str()))
    }
}

/// Copy function producing a fresh instance of a mutable constant.
pub fn deep_copy_function(value: &ConstValue) -> &'static str {
    match value {
        ConstValue::List(_) => "DEEP_COPY_LIST",
        ConstValue::Dict(_) => "DEEP_COPY_DICT",
        _ => "DEEP_COPY_TUPLE",
    }
}
