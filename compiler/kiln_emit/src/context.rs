//! Per-function emission state.
//!
//! [`EmitContext`] owns everything that must not be shared between
//! functions or compilation units: the output buffer, the temporaries of
//! the statement being emitted, the exception target stack and the active
//! exception handlers.

use kiln_ir::SourcePos;

use crate::temps::{Ownership, TempAllocator, TempId, TempStats};
use crate::EmitError;

/// Label reached when an exception leaves the function.
pub const FUNCTION_EXCEPTION_EXIT: &str = "function_exception_exit";
/// Label reached by `return`.
pub const FUNCTION_RETURN_EXIT: &str = "function_return_exit";

/// Saved exception state of one active handler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExceptionKeeper {
    pub index: u32,
    /// Control left the frame and came back since the exception was caught.
    pub frame_reentered: bool,
}

impl ExceptionKeeper {
    pub fn type_var(self) -> String {
        format!("exception_keeper_type_{}", self.index)
    }

    pub fn value_var(self) -> String {
        format!("exception_keeper_value_{}", self.index)
    }

    pub fn tb_var(self) -> String {
        format!("exception_keeper_tb_{}", self.index)
    }

    pub fn lineno_var(self) -> String {
        format!("exception_keeper_lineno_{}", self.index)
    }
}

#[derive(Debug)]
pub struct EmitContext {
    output: String,
    indent: usize,
    pub(crate) temps: TempAllocator,
    /// Innermost last. Never empty.
    targets: Vec<String>,
    pub(crate) handlers: Vec<ExceptionKeeper>,
    pub(crate) keeper_count: u32,
    label_counter: u32,
    pub(crate) debug_assertions: bool,
}

impl EmitContext {
    pub fn new(debug_assertions: bool) -> Self {
        Self {
            output: String::with_capacity(4096),
            indent: 1,
            temps: TempAllocator::new(),
            targets: vec![FUNCTION_EXCEPTION_EXIT.to_owned()],
            handlers: Vec::new(),
            keeper_count: 0,
            label_counter: 0,
            debug_assertions,
        }
    }

    // Output

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        debug_assert!(self.indent > 0, "dedent called with zero indent");
        self.indent = self.indent.saturating_sub(1);
    }

    /// Write one indented line.
    pub fn writeln(&mut self, line: &str) {
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
        self.output.push_str(line);
        self.output.push('\n');
    }

    /// Write a label at column zero.
    pub fn write_label(&mut self, label: &str) {
        self.output.push_str(label);
        self.output.push_str(":;\n");
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// A fresh label `<prefix>_<n>`.
    pub fn fresh_label(&mut self, prefix: &str) -> String {
        self.label_counter += 1;
        format!("{prefix}_{}", self.label_counter)
    }

    // Temporaries

    pub fn allocate(&mut self, purpose: &str, c_type: &'static str, ownership: Ownership) -> TempId {
        self.temps.allocate(purpose, c_type, ownership)
    }

    /// The C name of a live temporary, owned for use in `format!`.
    pub fn temp(&self, id: TempId) -> Result<String, EmitError> {
        self.temps.name(id).map(str::to_owned)
    }

    pub fn temp_c_type(&self, id: TempId) -> Result<&'static str, EmitError> {
        self.temps.c_type(id)
    }

    /// Release `id`, writing its decrement if it owns a reference.
    pub fn release(&mut self, id: TempId) -> Result<(), EmitError> {
        if let Some(code) = self.temps.release(id)? {
            self.writeln(&code);
        }
        Ok(())
    }

    /// Release each temporary in order.
    pub fn release_all(&mut self, ids: &[TempId]) -> Result<(), EmitError> {
        ids.iter().try_for_each(|&id| self.release(id))
    }

    pub fn hand_off(&mut self, id: TempId) -> Result<(), EmitError> {
        self.temps.hand_off(id)
    }

    /// Make `id` own its reference, writing the increment if needed.
    pub fn take_reference(&mut self, id: TempId) -> Result<(), EmitError> {
        if let Some(code) = self.temps.take_reference(id)? {
            self.writeln(&code);
        }
        Ok(())
    }

    /// Own the new reference stored in a checked result temporary.
    pub fn adopt(&mut self, id: TempId) -> Result<(), EmitError> {
        self.temps.adopt(id)
    }

    pub fn finish_statement(&mut self) -> Result<TempStats, EmitError> {
        self.temps.finish_statement()
    }

    // Exception targets

    /// Where a failure in the current position jumps to.
    pub fn exception_target(&self) -> &str {
        self.targets
            .last()
            .map_or(FUNCTION_EXCEPTION_EXIT, String::as_str)
    }

    pub fn push_exception_target(&mut self, label: impl Into<String>) {
        self.targets.push(label.into());
    }

    pub fn pop_exception_target(&mut self) -> Result<String, EmitError> {
        if self.targets.len() <= 1 {
            return Err(EmitError::UnbalancedExceptionTarget);
        }
        self.targets.pop().ok_or(EmitError::UnbalancedExceptionTarget)
    }

    pub fn exception_target_depth(&self) -> usize {
        self.targets.len() - 1
    }

    /// Write `exception_lineno = N;` when the line is known.
    pub(crate) fn write_lineno(&mut self, pos: SourcePos) {
        if pos.line > 0 {
            self.writeln(&format!("exception_lineno = {};", pos.line));
        }
    }

    /// Local declarations every emitted function needs, then one per
    /// temporary and keeper.
    pub fn declarations(&self) -> Vec<String> {
        let mut out = vec![
            "PyObject *exception_type = NULL;".to_owned(),
            "PyObject *exception_value = NULL;".to_owned(),
            "PyTracebackObject *exception_tb = NULL;".to_owned(),
            "NUITKA_MAY_BE_UNUSED int exception_lineno = 0;".to_owned(),
            "PyObject *tmp_return_value = NULL;".to_owned(),
        ];
        for index in 1..=self.keeper_count {
            let keeper = ExceptionKeeper {
                index,
                frame_reentered: false,
            };
            out.push(format!("PyObject *{};", keeper.type_var()));
            out.push(format!("PyObject *{};", keeper.value_var()));
            out.push(format!("PyTracebackObject *{};", keeper.tb_var()));
            out.push(format!("int {};", keeper.lineno_var()));
        }
        for (c_type, name) in self.temps.declarations() {
            if c_type.ends_with('*') {
                out.push(format!("{c_type}{name} = NULL;"));
            } else {
                out.push(format!("{c_type} {name};"));
            }
        }
        out
    }
}
