//! Shared test utilities for phase tests.

use kiln_ir::{BinaryOp, ExprArena, OperationMode, SourcePos};
use kiln_ops::HelperRegistry;
use kilnc::{CompilationUnit, EmitConfig, Stmt, TextRenderer, UnitOutput};

pub const POS: SourcePos = SourcePos::new(7, 0);

/// Specialized helper names of `op` in `mode`.
pub fn specialized(op: BinaryOp, mode: OperationMode) -> Vec<String> {
    HelperRegistry::global()
        .operation_sets(op, mode)
        .specialized
        .names()
}

/// Compile `body` as the single function `main` of a unit.
pub fn compile(arena: &ExprArena, body: &[Stmt]) -> UnitOutput {
    let mut unit = CompilationUnit::new("test_module", EmitConfig::default());
    unit.emit_function("main", arena, body, &[]).unwrap();
    unit.finish(&TextRenderer).unwrap()
}

/// Trimmed non-empty lines.
pub fn lines(code: &str) -> Vec<&str> {
    code.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}
