//! Fixtures shared by the emission tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_ir::{ExprArena, SourcePos};
use kiln_ops::HelperRegistry;

use crate::temps::TempStats;
use crate::{EmitConfig, EmitError, Emitter, Stmt, UnitState};

pub(crate) const POS: SourcePos = SourcePos::new(3, 4);

/// Body text, per-statement bookkeeping and unit state of one emission.
pub(crate) struct Emitted {
    pub code: String,
    pub stats: Vec<TempStats>,
    pub unit: UnitState,
}

pub(crate) fn try_emit_with(
    arena: &ExprArena,
    stmts: &[Stmt],
    config: &EmitConfig,
    mut unit: UnitState,
) -> Result<Emitted, EmitError> {
    let (code, stats) = {
        let mut emitter = Emitter::new(arena, HelperRegistry::global(), config, &mut unit);
        emitter.emit_block(stmts)?;
        let stats = emitter.statement_stats().to_vec();
        (emitter.ctx.take_output(), stats)
    };
    Ok(Emitted { code, stats, unit })
}

pub(crate) fn emit_with(arena: &ExprArena, stmts: &[Stmt], config: &EmitConfig) -> Emitted {
    try_emit_with(arena, stmts, config, UnitState::new()).unwrap()
}

pub(crate) fn emit(arena: &ExprArena, stmts: &[Stmt]) -> Emitted {
    emit_with(arena, stmts, &EmitConfig::default())
}

/// Body lines with indentation removed.
pub(crate) fn lines(code: &str) -> Vec<&str> {
    code.lines().map(str::trim).collect()
}

/// Position of the first line starting with `prefix`.
pub(crate) fn line_index(code: &str, prefix: &str) -> usize {
    lines(code)
        .iter()
        .position(|line| line.starts_with(prefix))
        .unwrap_or_else(|| panic!("no line starting with {prefix:?} in:\n{code}"))
}
