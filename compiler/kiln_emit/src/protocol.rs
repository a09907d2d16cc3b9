//! The error propagation protocol.
//!
//! Every emitted operation that can fail is followed by a check. On
//! failure the generated code fetches the in-flight exception, releases
//! every owned temporary of the statement, records the line and jumps to
//! the current exception target. Checks that are statically impossible
//! become debug assertions instead.

use std::fmt::Write as _;

use kiln_ir::SourcePos;

use crate::context::{EmitContext, ExceptionKeeper};
use crate::EmitError;

/// Escape `text` for a C string literal.
pub fn c_string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    let _ = write!(out, "\\{byte:03o}");
                }
            }
        }
    }
    out.push('"');
    out
}

impl EmitContext {
    /// Emit the check following an operation.
    ///
    /// `condition` is true exactly when the operation failed. With
    /// `needs_check` false the failure is impossible by construction and
    /// only an assertion is written.
    pub fn emit_failure_check(&mut self, condition: &str, needs_check: bool, pos: SourcePos) {
        if !needs_check {
            if self.debug_assertions {
                self.writeln(&format!("assert(!({condition}));"));
            }
            return;
        }
        self.writeln(&format!("if ({condition}) {{"));
        self.indent();
        self.write_exit_body(false, pos);
        self.dedent();
        self.writeln("}");
    }

    /// Leave the statement for the exception target unconditionally.
    ///
    /// Every live temporary of the statement is consumed.
    pub fn emit_unconditional_exit(&mut self, pos: SourcePos) {
        self.write_exit_body(true, pos);
    }

    fn write_exit_body(&mut self, abandon: bool, pos: SourcePos) {
        self.writeln("assert(HAS_ERROR_OCCURRED(tstate));");
        self.writeln(
            "FETCH_ERROR_OCCURRED(tstate, &exception_type, &exception_value, &exception_tb);",
        );
        let releases = if abandon {
            self.temps.abandon_live()
        } else {
            self.temps.failure_releases()
        };
        for code in &releases {
            self.writeln(code);
        }
        self.write_lineno(pos);
        let target = self.exception_target().to_owned();
        self.writeln(&format!("goto {target};"));
    }

    /// Raise `exception(message)` and leave the statement.
    pub fn emit_raise(&mut self, exception: &str, message: &str, pos: SourcePos) {
        tracing::trace!(exception, line = pos.line, "emitting unconditional raise");
        self.writeln(&format!(
            "SET_CURRENT_EXCEPTION_TYPE0_STR(tstate, PyExc_{exception}, {});",
            c_string_literal(message)
        ));
        self.emit_unconditional_exit(pos);
    }

    /// Start an exception handler: move the in-flight exception into
    /// keeper variables and clear it.
    pub fn enter_handler(&mut self) -> ExceptionKeeper {
        self.keeper_count += 1;
        let keeper = ExceptionKeeper {
            index: self.keeper_count,
            frame_reentered: false,
        };
        self.writeln(&format!("{} = exception_type;", keeper.type_var()));
        self.writeln(&format!("{} = exception_value;", keeper.value_var()));
        self.writeln(&format!("{} = exception_tb;", keeper.tb_var()));
        self.writeln(&format!("{} = exception_lineno;", keeper.lineno_var()));
        self.writeln("exception_type = NULL;");
        self.writeln("exception_value = NULL;");
        self.writeln("exception_tb = NULL;");
        self.writeln("exception_lineno = 0;");
        self.handlers.push(keeper);
        keeper
    }

    /// Record that the innermost handler's frame was left and re-entered.
    pub fn mark_frame_reentered(&mut self) -> Result<(), EmitError> {
        let keeper = self.handlers.last_mut().ok_or(EmitError::NoActiveHandler)?;
        keeper.frame_reentered = true;
        Ok(())
    }

    /// End the innermost handler after it completed normally, dropping the
    /// kept exception.
    pub fn exit_handler(&mut self) -> Result<ExceptionKeeper, EmitError> {
        let keeper = self.handlers.pop().ok_or(EmitError::NoActiveHandler)?;
        self.release_keeper(keeper);
        Ok(keeper)
    }

    /// Drop the exception held by `keeper`.
    pub fn release_keeper(&mut self, keeper: ExceptionKeeper) {
        self.writeln(&format!("Py_DECREF({});", keeper.type_var()));
        self.writeln(&format!("Py_XDECREF({});", keeper.value_var()));
        self.writeln(&format!("Py_XDECREF({});", keeper.tb_var()));
    }

    /// Drop the kept exceptions of every active handler, innermost first,
    /// for a path leaving all of them.
    pub fn release_active_keepers(&mut self) {
        let active: Vec<ExceptionKeeper> = self.handlers.iter().rev().copied().collect();
        for keeper in active {
            self.release_keeper(keeper);
        }
    }

    /// Re-raise the exception being handled.
    ///
    /// While the frame has not been left, the kept traceback and line are
    /// restored unchanged. Otherwise the runtime re-raises, adding a new
    /// traceback entry for the current line. The keeper keeps its own
    /// references either way and is released by the handler's cleanup.
    pub fn emit_reraise(&mut self, pos: SourcePos) {
        let target = self.exception_target().to_owned();
        match self.handlers.last().copied() {
            Some(keeper) if !keeper.frame_reentered => {
                self.writeln(&format!("exception_type = {};", keeper.type_var()));
                self.writeln(&format!("exception_value = {};", keeper.value_var()));
                self.writeln(&format!("exception_tb = {};", keeper.tb_var()));
                self.writeln(&format!("exception_lineno = {};", keeper.lineno_var()));
                self.writeln("Py_INCREF(exception_type);");
                self.writeln("Py_XINCREF(exception_value);");
                self.writeln("Py_XINCREF(exception_tb);");
                let releases = self.temps.abandon_live();
                for code in &releases {
                    self.writeln(code);
                }
            }
            _ => {
                self.writeln(
                    "RERAISE_EXCEPTION(tstate, &exception_type, &exception_value, &exception_tb);",
                );
                let releases = self.temps.abandon_live();
                for code in &releases {
                    self.writeln(code);
                }
                self.write_lineno(pos);
            }
        }
        self.writeln(&format!("goto {target};"));
    }
}

#[cfg(test)]
mod tests;
