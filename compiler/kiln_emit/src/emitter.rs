//! Statement and function emission.
//!
//! An [`Emitter`] emits one function. State shared by all functions of a
//! compilation unit (constants, trampoline requests, known signatures)
//! lives in [`UnitState`] and is borrowed for the emitter's lifetime.

use std::fmt::Write as _;

use indexmap::IndexMap;
use kiln_calls::ParameterSpec;
use kiln_ir::{ExprId, ExprQuery, SourcePos};
use kiln_ops::HelperRegistry;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::constants::ConstantPool;
use crate::context::{EmitContext, FUNCTION_EXCEPTION_EXIT, FUNCTION_RETURN_EXIT};
use crate::temps::{TempId, TempStats, OBJECT_TYPE};
use crate::trampoline::TrampolineRegistry;
use crate::{EmitConfig, EmitError};

/// Per-unit state shared by every function emitted into it.
#[derive(Clone, Debug, Default)]
pub struct UnitState {
    pub constants: ConstantPool,
    pub trampolines: TrampolineRegistry,
    signatures: FxHashMap<String, ParameterSpec>,
}

impl UnitState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make calls to `spec.name` subject to static arity checks.
    pub fn declare_function(&mut self, spec: ParameterSpec) {
        self.signatures.insert(spec.name.clone(), spec);
    }

    pub fn signature(&self, name: &str) -> Option<&ParameterSpec> {
        self.signatures.get(name)
    }
}

/// Outcome of lowering one expression.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lowered {
    /// The value lives in this temporary.
    Value(TempId),
    /// Evaluation always raises; control already left the statement.
    Raised,
}

/// Statements understood by the emitter.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// Evaluate and discard.
    Expression(ExprId),
    Assign {
        name: String,
        value: ExprId,
    },
    Return(ExprId),
    If {
        condition: ExprId,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    /// `try: body except: handler`, catching everything.
    TryExcept {
        body: Vec<Stmt>,
        handler: Vec<Stmt>,
    },
    /// Bare `raise` re-raising the exception being handled.
    Reraise(SourcePos),
}

pub struct Emitter<'a, Q: ExprQuery + ?Sized> {
    pub(crate) query: &'a Q,
    pub(crate) registry: &'a HelperRegistry,
    pub(crate) config: &'a EmitConfig,
    pub(crate) unit: &'a mut UnitState,
    pub(crate) ctx: EmitContext,
    /// Variable name to C type, in first-use order.
    variables: IndexMap<String, &'static str, FxBuildHasher>,
    stats: Vec<TempStats>,
}

impl<'a, Q: ExprQuery + ?Sized> Emitter<'a, Q> {
    pub fn new(
        query: &'a Q,
        registry: &'a HelperRegistry,
        config: &'a EmitConfig,
        unit: &'a mut UnitState,
    ) -> Self {
        Self {
            query,
            registry,
            config,
            unit,
            ctx: EmitContext::new(config.debug_assertions),
            variables: IndexMap::default(),
            stats: Vec::new(),
        }
    }

    pub fn context(&self) -> &EmitContext {
        &self.ctx
    }

    /// Temporary bookkeeping of every statement emitted so far.
    pub fn statement_stats(&self) -> &[TempStats] {
        &self.stats
    }

    /// Record a variable, returning its C type.
    pub(crate) fn note_variable(&mut self, name: &str, c_type: &'static str) -> &'static str {
        *self.variables.entry(name.to_owned()).or_insert(c_type)
    }

    fn close_statement(&mut self) -> Result<(), EmitError> {
        let stats = self.ctx.finish_statement()?;
        tracing::trace!(
            allocated = stats.allocated,
            released = stats.released,
            handed_off = stats.handed_off,
            decrefs = stats.decrefs,
            "statement finished"
        );
        self.stats.push(stats);
        Ok(())
    }

    pub fn emit_block(&mut self, stmts: &[Stmt]) -> Result<(), EmitError> {
        stmts.iter().try_for_each(|stmt| self.emit_statement(stmt))
    }

    pub fn emit_statement(&mut self, stmt: &Stmt) -> Result<(), EmitError> {
        match stmt {
            Stmt::Expression(expr) => {
                if let Lowered::Value(temp) = self.lower(*expr)? {
                    self.ctx.release(temp)?;
                }
                self.close_statement()
            }
            Stmt::Assign { name, value } => self.emit_assign(name, *value),
            Stmt::Return(value) => self.emit_return(*value),
            Stmt::If {
                condition,
                then,
                otherwise,
            } => self.emit_if(*condition, then, otherwise),
            Stmt::TryExcept { body, handler } => self.emit_try_except(body, handler),
            Stmt::Reraise(pos) => {
                self.ctx.emit_reraise(*pos);
                self.close_statement()
            }
        }
    }

    fn emit_assign(&mut self, name: &str, value: ExprId) -> Result<(), EmitError> {
        let Lowered::Value(temp) = self.lower_as(value, "assign_source")? else {
            return self.close_statement();
        };
        let found = self.ctx.temp_c_type(temp)?;
        let expected = self.note_variable(name, found);
        let temp = if expected == found {
            temp
        } else if expected == OBJECT_TYPE {
            self.box_value(value, temp)?
        } else {
            return Err(EmitError::VariableTypeMismatch {
                name: name.to_owned(),
                expected,
                found,
            });
        };
        let source = self.ctx.temp(temp)?;
        if expected == OBJECT_TYPE {
            self.ctx.take_reference(temp)?;
            self.ctx.writeln("{");
            self.ctx.indent();
            self.ctx.writeln(&format!("PyObject *old = var_{name};"));
            self.ctx.writeln(&format!("var_{name} = {source};"));
            self.ctx.writeln("Py_XDECREF(old);");
            self.ctx.dedent();
            self.ctx.writeln("}");
            self.ctx.hand_off(temp)?;
        } else {
            self.ctx.writeln(&format!("var_{name} = {source};"));
            self.ctx.release(temp)?;
        }
        self.close_statement()
    }

    fn emit_return(&mut self, value: ExprId) -> Result<(), EmitError> {
        let Lowered::Value(temp) = self.lower_object(value, "return_value")? else {
            return self.close_statement();
        };
        self.ctx.take_reference(temp)?;
        let source = self.ctx.temp(temp)?;
        self.ctx.writeln(&format!("tmp_return_value = {source};"));
        self.ctx.hand_off(temp)?;
        self.ctx.release_active_keepers();
        self.ctx.writeln(&format!("goto {FUNCTION_RETURN_EXIT};"));
        self.close_statement()
    }

    fn emit_if(&mut self, condition: ExprId, then: &[Stmt], otherwise: &[Stmt]) -> Result<(), EmitError> {
        let Lowered::Value(temp) = self.lower_condition(condition)? else {
            return self.close_statement();
        };
        let name = self.ctx.temp(temp)?;
        let test = if self.ctx.temp_c_type(temp)? == "bool" {
            name
        } else {
            format!("{name} == NUITKA_BOOL_TRUE")
        };
        self.ctx.release(temp)?;
        self.close_statement()?;

        self.ctx.writeln(&format!("if ({test}) {{"));
        self.ctx.indent();
        self.emit_block(then)?;
        self.ctx.dedent();
        if !otherwise.is_empty() {
            self.ctx.writeln("} else {");
            self.ctx.indent();
            self.emit_block(otherwise)?;
            self.ctx.dedent();
        }
        self.ctx.writeln("}");
        Ok(())
    }

    fn emit_try_except(&mut self, body: &[Stmt], handler: &[Stmt]) -> Result<(), EmitError> {
        let handler_label = self.ctx.fresh_label("try_except_handler");
        let end_label = self.ctx.fresh_label("try_end");

        self.ctx.push_exception_target(handler_label.clone());
        self.emit_block(body)?;
        self.ctx.pop_exception_target()?;
        self.ctx.writeln(&format!("goto {end_label};"));

        self.ctx.write_label(&handler_label);
        let keeper = self.ctx.enter_handler();
        let cleanup_label = self.ctx.fresh_label("try_handler_exit");
        self.ctx.push_exception_target(cleanup_label.clone());
        self.emit_block(handler)?;
        self.ctx.pop_exception_target()?;
        self.ctx.exit_handler()?;
        self.ctx.writeln(&format!("goto {end_label};"));

        // Failures inside the handler drop the kept exception on the way out.
        self.ctx.write_label(&cleanup_label);
        self.ctx.release_keeper(keeper);
        let outer = self.ctx.exception_target().to_owned();
        self.ctx.writeln(&format!("goto {outer};"));

        self.ctx.write_label(&end_label);
        Ok(())
    }

    /// Render the complete C function.
    ///
    /// `parameters` name the variables passed in by the caller, each with
    /// a reference the function owns.
    pub fn finish_function(mut self, name: &str, parameters: &[&str]) -> Result<String, EmitError> {
        if self.ctx.exception_target_depth() != 0 {
            return Err(EmitError::UnbalancedExceptionTarget);
        }
        let body = self.ctx.take_output();
        let c_type_of = |var: &str| self.variables.get(var).copied().unwrap_or(OBJECT_TYPE);

        let mut out = String::with_capacity(body.len() + 1024);
        let mut signature = String::from("PyThreadState *tstate");
        for param in parameters {
            let _ = write!(signature, ", {}", crate::render::c_param(c_type_of(param), &format!("var_{param}")));
        }
        let _ = writeln!(out, "static PyObject *impl_{name}({signature}) {{");
        for (var, c_type) in &self.variables {
            if parameters.contains(&var.as_str()) {
                continue;
            }
            if *c_type == OBJECT_TYPE {
                let _ = writeln!(out, "    PyObject *var_{var} = NULL;");
            } else {
                let _ = writeln!(out, "    {c_type} var_{var} = 0;");
            }
        }
        for declaration in self.ctx.declarations() {
            let _ = writeln!(out, "    {declaration}");
        }
        out.push('\n');
        out.push_str(&body);
        out.push_str("    tmp_return_value = Py_None;\n");
        out.push_str("    Py_INCREF(tmp_return_value);\n");
        let _ = writeln!(out, "    goto {FUNCTION_RETURN_EXIT};");
        out.push('\n');

        let releases: Vec<String> = self
            .variables
            .iter()
            .filter(|(_, c_type)| **c_type == OBJECT_TYPE)
            .map(|(var, _)| format!("    Py_XDECREF(var_{var});\n"))
            .collect();
        let _ = writeln!(out, "{FUNCTION_EXCEPTION_EXIT}:;");
        for release in &releases {
            out.push_str(release);
        }
        out.push_str("    assert(exception_type);\n");
        out.push_str(
            "    RESTORE_ERROR_OCCURRED(tstate, exception_type, exception_value, exception_tb);\n",
        );
        out.push_str("    return NULL;\n\n");
        let _ = writeln!(out, "{FUNCTION_RETURN_EXIT}:;");
        for release in &releases {
            out.push_str(release);
        }
        out.push_str("    CHECK_OBJECT(tmp_return_value);\n");
        out.push_str("    return tmp_return_value;\n");
        out.push_str("}\n");

        tracing::debug!(
            function = name,
            statements = self.stats.len(),
            temporaries = self.ctx.temps.len(),
            "function emitted"
        );
        Ok(out)
    }
}
