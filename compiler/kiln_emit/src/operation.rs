//! Emission of binary, in-place and comparison operations.
//!
//! Operands are evaluated left to right, the registry picks the helper and
//! the result is checked according to its result shape. Results of a
//! different shape than requested are converted afterwards.

use kiln_ir::{BinaryOp, ComparisonOp, ExceptionFilter, ExprId, ExprQuery, ResultShape, Shape, SourcePos};
use kiln_ops::HelperSelection;

use crate::emitter::{Emitter, Lowered};
use crate::temps::{Ownership, TempId};
use crate::EmitError;

/// Condition that is true when a helper returning `shape` failed.
fn failure_condition(shape: ResultShape, value: &str) -> Option<String> {
    match shape {
        ResultShape::Object => Some(format!("{value} == NULL")),
        ResultShape::NBool => Some(format!("{value} == NUITKA_BOOL_EXCEPTION")),
        ResultShape::NiLong => Some(format!("{value}.validity == NUITKA_ILONG_EXCEPTION")),
        ResultShape::CBool => None,
    }
}

impl<Q: ExprQuery + ?Sized> Emitter<'_, Q> {
    pub fn emit_binary(
        &mut self,
        id: ExprId,
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
        wanted: ResultShape,
    ) -> Result<Lowered, EmitError> {
        let (l, r) = (self.query.shape(left), self.query.shape(right));
        let selection = self.registry.select_binary(op, wanted, l, r);
        let Some((a, b)) = self.lower_operands(left, right, "left_value", "right_value")? else {
            return Ok(Lowered::Raised);
        };
        let (result, shape) = self.call_helper(id, &selection, (left, a), (right, b), "binop_result")?;
        self.finish_result(id, result, shape, wanted)
    }

    pub fn emit_comparison(
        &mut self,
        id: ExprId,
        cmp: ComparisonOp,
        left: ExprId,
        right: ExprId,
        wanted: ResultShape,
    ) -> Result<Lowered, EmitError> {
        let (l, r) = (self.query.shape(left), self.query.shape(right));
        let selection = self.registry.select_comparison(cmp, wanted, l, r);
        let Some((a, b)) = self.lower_operands(left, right, "compexpr_left", "compexpr_right")?
        else {
            return Ok(Lowered::Raised);
        };
        let (result, shape) = self.call_helper(id, &selection, (left, a), (right, b), "compare_result")?;
        self.finish_result(id, result, shape, wanted)
    }

    /// `target op= value`, leaving the updated target in the returned
    /// temporary. Targets that cannot be updated in place fall back to the
    /// binary operation.
    pub fn emit_inplace(
        &mut self,
        id: ExprId,
        op: BinaryOp,
        target: ExprId,
        value: ExprId,
    ) -> Result<Lowered, EmitError> {
        let target_shape = self.query.shape(target);
        if !target_shape.can_be_inplace_target() {
            return self.emit_binary(id, op, target, value, ResultShape::Object);
        }
        let selection = self
            .registry
            .select_inplace(op, target_shape, self.query.shape(value));
        let Lowered::Value(t) = self.lower_object(target, "inplace_target")? else {
            return Ok(Lowered::Raised);
        };
        // The helper replaces the reference it is given.
        self.ctx.take_reference(t)?;
        let Lowered::Value(v) = self.lower_as(value, "inplace_value")? else {
            return Ok(Lowered::Raised);
        };
        let v = if selection.box_right {
            self.box_value(value, v)?
        } else {
            v
        };

        let ok = self.ctx.allocate("inplace_ok", "bool", Ownership::Owned);
        let ok_name = self.ctx.temp(ok)?;
        let target_name = self.ctx.temp(t)?;
        let value_name = self.ctx.temp(v)?;
        self.ctx.writeln(&format!(
            "{ok_name} = {}(&{target_name}, {value_name});",
            selection.id
        ));
        self.ctx.release(v)?;
        let needs_check = self.query.may_raise(id, ExceptionFilter::Any);
        self.ctx
            .emit_failure_check(&format!("{ok_name} == false"), needs_check, self.query.source_pos(id));
        self.ctx.release(ok)?;
        Ok(Lowered::Value(t))
    }

    fn lower_operands(
        &mut self,
        left: ExprId,
        right: ExprId,
        left_purpose: &str,
        right_purpose: &str,
    ) -> Result<Option<(TempId, TempId)>, EmitError> {
        let Lowered::Value(a) = self.lower_as(left, left_purpose)? else {
            return Ok(None);
        };
        let Lowered::Value(b) = self.lower_as(right, right_purpose)? else {
            return Ok(None);
        };
        Ok(Some((a, b)))
    }

    /// Invoke the selected helper on two evaluated operands.
    fn call_helper(
        &mut self,
        id: ExprId,
        selection: &HelperSelection,
        (left, a): (ExprId, TempId),
        (right, b): (ExprId, TempId),
        purpose: &str,
    ) -> Result<(TempId, ResultShape), EmitError> {
        let a = if selection.box_left {
            self.box_value(left, a)?
        } else {
            a
        };
        let b = if selection.box_right {
            self.box_value(right, b)?
        } else {
            b
        };
        let (first, second) = if selection.swapped { (b, a) } else { (a, b) };
        let shape = selection.result().unwrap_or(ResultShape::Object);

        let result = self.ctx.allocate(purpose, shape.c_type(), Ownership::Borrowed);
        let target = self.ctx.temp(result)?;
        let first_name = self.ctx.temp(first)?;
        let second_name = self.ctx.temp(second)?;
        self.ctx.writeln(&format!(
            "{target} = {}({first_name}, {second_name});",
            selection.id
        ));
        self.ctx.release(a)?;
        self.ctx.release(b)?;
        if let Some(condition) = failure_condition(shape, &target) {
            let needs_check = self.query.may_raise(id, ExceptionFilter::Any);
            self.ctx
                .emit_failure_check(&condition, needs_check, self.query.source_pos(id));
        }
        self.ctx.adopt(result)?;

        if selection.negated {
            match shape {
                ResultShape::NBool => self.ctx.writeln(&format!(
                    "{target} = {target} == NUITKA_BOOL_TRUE ? NUITKA_BOOL_FALSE : NUITKA_BOOL_TRUE;"
                )),
                ResultShape::CBool => self.ctx.writeln(&format!("{target} = !{target};")),
                ResultShape::Object | ResultShape::NiLong => {
                    return Err(EmitError::InvalidNegation {
                        helper: selection.id.to_string(),
                    })
                }
            }
        }
        Ok((result, shape))
    }

    fn finish_result(
        &mut self,
        id: ExprId,
        result: TempId,
        shape: ResultShape,
        wanted: ResultShape,
    ) -> Result<Lowered, EmitError> {
        let may_raise = self.query.shape(id) != Shape::Bool;
        let (converted, _) =
            self.convert_result(result, shape, wanted, may_raise, self.query.source_pos(id))?;
        Ok(Lowered::Value(converted))
    }

    /// Convert a helper result to the shape the consumer asked for.
    ///
    /// A `NILONG` request is met by whatever the helper returned, since
    /// only the caller knows how to unpack it.
    pub fn convert_result(
        &mut self,
        temp: TempId,
        from: ResultShape,
        to: ResultShape,
        may_raise: bool,
        pos: SourcePos,
    ) -> Result<(TempId, ResultShape), EmitError> {
        if from == to || to == ResultShape::NiLong {
            return Ok((temp, from));
        }
        let source = self.ctx.temp(temp)?;
        let (expression, ownership) = match (from, to) {
            (ResultShape::Object, ResultShape::NBool | ResultShape::CBool) => {
                let truth = self.ctx.allocate("truth_value", "int", Ownership::Owned);
                let truth_name = self.ctx.temp(truth)?;
                self.ctx
                    .writeln(&format!("{truth_name} = CHECK_IF_TRUE({source});"));
                self.ctx
                    .emit_failure_check(&format!("{truth_name} == -1"), may_raise, pos);
                self.ctx.release(truth)?;
                let expression = if to == ResultShape::NBool {
                    format!("{truth_name} == 1 ? NUITKA_BOOL_TRUE : NUITKA_BOOL_FALSE")
                } else {
                    format!("{truth_name} == 1")
                };
                (expression, Ownership::Owned)
            }
            (ResultShape::NBool, ResultShape::Object) => (
                format!("BOOL_FROM({source} == NUITKA_BOOL_TRUE)"),
                Ownership::Borrowed,
            ),
            (ResultShape::CBool, ResultShape::Object) => {
                (format!("BOOL_FROM({source})"), Ownership::Borrowed)
            }
            (ResultShape::NBool, ResultShape::CBool) => {
                (format!("{source} == NUITKA_BOOL_TRUE"), Ownership::Owned)
            }
            (ResultShape::CBool, ResultShape::NBool) => (
                format!("{source} ? NUITKA_BOOL_TRUE : NUITKA_BOOL_FALSE"),
                Ownership::Owned,
            ),
            _ => return Err(EmitError::UnsupportedConversion { from, to }),
        };
        let purpose = if to == ResultShape::Object {
            "bool_value"
        } else {
            "condition_result"
        };
        let converted = self.ctx.allocate(purpose, to.c_type(), ownership);
        let target = self.ctx.temp(converted)?;
        self.ctx.writeln(&format!("{target} = {expression};"));
        self.ctx.release(temp)?;
        Ok((converted, to))
    }
}

#[cfg(test)]
mod tests;
