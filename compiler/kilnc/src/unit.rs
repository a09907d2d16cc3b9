//! Compilation units.
//!
//! A [`CompilationUnit`] owns everything its functions share: the constant
//! pool, the trampoline requests and the signatures used for static arity
//! checks. Units share nothing with each other, so separate units can be
//! compiled on separate threads against the same global registry.

use std::fmt::Write as _;

use kiln_calls::ParameterSpec;
use kiln_emit::{EmitConfig, Emitter, Renderer, Stmt, UnitState};
use kiln_ir::ExprQuery;
use kiln_ops::HelperRegistry;

use crate::UnitError;

/// One emitted C function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmittedFunction {
    pub name: String,
    pub code: String,
}

/// The finished C source of a unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitOutput {
    pub module: String,
    /// Source representation of every module constant, in slot order.
    pub constants: Vec<String>,
    /// Forward declarations of the trampolines generated for this unit.
    pub declarations: Vec<String>,
    /// Number of trampoline bodies in `source`.
    pub trampolines: usize,
    pub source: String,
}

pub struct CompilationUnit {
    name: String,
    config: EmitConfig,
    registry: &'static HelperRegistry,
    state: UnitState,
    functions: Vec<EmittedFunction>,
}

impl CompilationUnit {
    pub fn new(name: impl Into<String>, config: EmitConfig) -> Self {
        Self::with_registry(name, config, HelperRegistry::global())
    }

    pub fn with_registry(
        name: impl Into<String>,
        config: EmitConfig,
        registry: &'static HelperRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            registry,
            state: UnitState::new(),
            functions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EmitConfig {
        &self.config
    }

    /// State shared by the functions emitted so far.
    pub fn state(&self) -> &UnitState {
        &self.state
    }

    pub fn functions(&self) -> &[EmittedFunction] {
        &self.functions
    }

    /// Make calls to `spec.name` subject to static arity checks.
    pub fn declare_function(&mut self, spec: ParameterSpec) {
        tracing::trace!(function = %spec.name, "signature declared");
        self.state.declare_function(spec);
    }

    /// Emit `body` as the function `name`.
    ///
    /// Constants and trampoline requests land in the unit, so later
    /// functions reuse the slots and helpers of earlier ones.
    pub fn emit_function<Q: ExprQuery + ?Sized>(
        &mut self,
        name: &str,
        query: &Q,
        body: &[Stmt],
        parameters: &[&str],
    ) -> Result<&EmittedFunction, UnitError> {
        if self.functions.iter().any(|function| function.name == name) {
            return Err(UnitError::DuplicateFunction(name.to_owned()));
        }
        let with_name = |source| UnitError::Function {
            function: name.to_owned(),
            source,
        };
        let mut emitter = Emitter::new(query, self.registry, &self.config, &mut self.state);
        emitter.emit_block(body).map_err(with_name)?;
        let code = emitter
            .finish_function(name, parameters)
            .map_err(with_name)?;
        tracing::debug!(
            unit = %self.name,
            function = name,
            constants = self.state.constants.len(),
            trampolines = self.state.trampolines.len(),
            "function added to unit"
        );
        let index = self.functions.len();
        self.functions.push(EmittedFunction {
            name: name.to_owned(),
            code,
        });
        Ok(&self.functions[index])
    }

    /// Assemble the unit's C source.
    ///
    /// Layout: constant table, trampoline declarations, trampoline bodies,
    /// then the functions in emission order.
    pub fn finish(self, renderer: &dyn Renderer) -> Result<UnitOutput, UnitError> {
        let UnitState {
            constants,
            trampolines,
            ..
        } = self.state;
        let sealed = trampolines.seal();
        let code = sealed.emit(renderer)?;

        let mut source = String::new();
        let _ = writeln!(source, "/* Generated code for module {}. */", self.name);
        source.push_str("#include \"nuitka/prelude.h\"\n\n");
        if !constants.is_empty() {
            let _ = writeln!(source, "static PyObject *mod_consts[{}];\n", constants.len());
        }
        if !code.declarations.is_empty() {
            for declaration in &code.declarations {
                source.push_str(declaration);
                source.push('\n');
            }
            source.push('\n');
            for body in &code.bodies {
                source.push_str(body);
                source.push('\n');
            }
        }
        for function in &self.functions {
            source.push_str(&function.code);
            source.push('\n');
        }

        tracing::debug!(
            unit = %self.name,
            functions = self.functions.len(),
            constants = constants.len(),
            trampolines = code.bodies.len(),
            "unit finished"
        );
        Ok(UnitOutput {
            module: self.name,
            constants: constants
                .entries()
                .map(|(_, repr)| repr.to_owned())
                .collect(),
            trampolines: code.bodies.len(),
            declarations: code.declarations,
            source,
        })
    }
}
