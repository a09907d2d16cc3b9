//! Expression lowering.
//!
//! Each expression is evaluated into a temporary. Children are evaluated
//! left to right before their parent, so a failure in a child releases
//! exactly the siblings evaluated before it.

use kiln_ir::{ConstValue, ExceptionFilter, ExprId, ExprKind, ExprQuery, ResultShape, Shape, SourcePos};

use crate::constants::deep_copy_function;
use crate::emitter::{Emitter, Lowered};
use crate::render::box_expression;
use crate::temps::{Ownership, TempId, OBJECT_TYPE};
use crate::EmitError;

impl<Q: ExprQuery + ?Sized> Emitter<'_, Q> {
    /// Lower `id` into a temporary named after its kind.
    pub fn lower(&mut self, id: ExprId) -> Result<Lowered, EmitError> {
        let purpose = match self.query.kind(id) {
            ExprKind::Constant(_) => "constant",
            ExprKind::Variable(_) | ExprKind::Opaque(_) => "expression_value",
            ExprKind::MakeTuple(_) => "tuple_value",
            ExprKind::MakeList(_) => "list_value",
            ExprKind::MakeDict(_) => "dict_value",
            ExprKind::AttributeLookup { .. } => "attribute_value",
            ExprKind::Binary { .. } | ExprKind::Inplace { .. } => "binop_result",
            ExprKind::Compare { .. } => "compare_result",
            ExprKind::Call { .. } | ExprKind::Raise { .. } => "call_result",
        };
        self.lower_as(id, purpose)
    }

    /// Lower `id`; `purpose` names the temporary for leaf values.
    pub fn lower_as(&mut self, id: ExprId, purpose: &str) -> Result<Lowered, EmitError> {
        let query = self.query;
        match query.kind(id) {
            ExprKind::Constant(value) => self.lower_constant(value, purpose),
            ExprKind::Variable(name) => {
                let c_type = query.shape(id).c_type();
                self.note_variable(name, c_type);
                let temp = self.ctx.allocate(purpose, c_type, Ownership::Borrowed);
                let target = self.ctx.temp(temp)?;
                self.ctx.writeln(&format!("{target} = var_{name};"));
                Ok(Lowered::Value(temp))
            }
            ExprKind::Opaque(label) => {
                let temp = self
                    .ctx
                    .allocate(purpose, query.shape(id).c_type(), Ownership::Borrowed);
                let target = self.ctx.temp(temp)?;
                self.ctx.writeln(&format!("{target} = {label};"));
                Ok(Lowered::Value(temp))
            }
            ExprKind::MakeTuple(elements) => self.lower_sequence(id, elements, true),
            ExprKind::MakeList(elements) => self.lower_sequence(id, elements, false),
            ExprKind::MakeDict(pairs) => self.lower_dict(id, pairs),
            ExprKind::AttributeLookup { source, attribute } => {
                self.lower_attribute(id, *source, attribute)
            }
            ExprKind::Binary { op, left, right } => {
                self.emit_binary(id, *op, *left, *right, ResultShape::Object)
            }
            ExprKind::Inplace { op, target, value } => self.emit_inplace(id, *op, *target, *value),
            ExprKind::Compare { op, left, right } => {
                self.emit_comparison(id, *op, *left, *right, ResultShape::Object)
            }
            ExprKind::Call { .. } => self.emit_call(id),
            ExprKind::Raise { exception, message } => {
                self.ctx.emit_raise(exception, message, query.source_pos(id));
                Ok(Lowered::Raised)
            }
        }
    }

    /// Lower `id` into an object temporary, boxing machine values.
    pub(crate) fn lower_object(&mut self, id: ExprId, purpose: &str) -> Result<Lowered, EmitError> {
        let Lowered::Value(temp) = self.lower_as(id, purpose)? else {
            return Ok(Lowered::Raised);
        };
        Ok(Lowered::Value(self.box_value(id, temp)?))
    }

    /// Lower a branch condition to a `nuitka_bool` or C `bool` temporary.
    pub fn lower_condition(&mut self, id: ExprId) -> Result<Lowered, EmitError> {
        let query = self.query;
        let lowered = match query.kind(id) {
            ExprKind::Compare { op, left, right } => {
                self.emit_comparison(id, *op, *left, *right, ResultShape::NBool)?
            }
            ExprKind::Binary { op, left, right } => {
                self.emit_binary(id, *op, *left, *right, ResultShape::NBool)?
            }
            _ => self.lower_object(id, "condition_value")?,
        };
        let Lowered::Value(temp) = lowered else {
            return Ok(Lowered::Raised);
        };
        let shape = match self.ctx.temp_c_type(temp)? {
            "nuitka_bool" => ResultShape::NBool,
            "bool" => ResultShape::CBool,
            _ => ResultShape::Object,
        };
        if shape == ResultShape::Object {
            let pos = self.query.source_pos(id);
            let may_raise = self.query.shape(id) != Shape::Bool;
            let (converted, _) =
                self.convert_result(temp, ResultShape::Object, ResultShape::NBool, may_raise, pos)?;
            return Ok(Lowered::Value(converted));
        }
        Ok(Lowered::Value(temp))
    }

    /// Box a machine value held in `temp`; object temporaries pass through.
    pub(crate) fn box_value(&mut self, id: ExprId, temp: TempId) -> Result<TempId, EmitError> {
        if self.ctx.temp_c_type(temp)? == OBJECT_TYPE {
            return Ok(temp);
        }
        let shape = self.query.shape(id);
        let source = self.ctx.temp(temp)?;
        let Some(boxing) = box_expression(shape, &source) else {
            return Err(EmitError::UnsupportedConversion {
                from: ResultShape::NiLong,
                to: ResultShape::Object,
            });
        };
        let boxed = self.ctx.allocate("boxed_value", OBJECT_TYPE, Ownership::Borrowed);
        let target = self.ctx.temp(boxed)?;
        self.ctx.writeln(&format!("{target} = {boxing};"));
        self.ctx.release(temp)?;
        self.ctx
            .emit_failure_check(&format!("{target} == NULL"), true, self.query.source_pos(id));
        self.ctx.adopt(boxed)?;
        Ok(boxed)
    }

    pub(crate) fn lower_constant(&mut self, value: &ConstValue, purpose: &str) -> Result<Lowered, EmitError> {
        if value.is_mutable() {
            let temp = self.ctx.allocate("constant_copy", OBJECT_TYPE, Ownership::Owned);
            let target = self.ctx.temp(temp)?;
            let make = match value {
                ConstValue::Dict(items) if items.is_empty() => "MAKE_DICT_EMPTY(tstate)".to_owned(),
                ConstValue::List(items) if items.is_empty() => "MAKE_LIST_EMPTY(tstate, 0)".to_owned(),
                _ => {
                    let reference = self.unit.constants.reference(value);
                    format!("{}(tstate, {reference})", deep_copy_function(value))
                }
            };
            self.ctx.writeln(&format!("{target} = {make};"));
            self.ctx
                .emit_failure_check(&format!("{target} == NULL"), false, SourcePos::default());
            return Ok(Lowered::Value(temp));
        }
        let reference = self.unit.constants.reference(value);
        let temp = self.ctx.allocate(purpose, OBJECT_TYPE, Ownership::Borrowed);
        let target = self.ctx.temp(temp)?;
        self.ctx.writeln(&format!("{target} = {reference};"));
        Ok(Lowered::Value(temp))
    }

    fn lower_sequence(&mut self, id: ExprId, elements: &[ExprId], tuple: bool) -> Result<Lowered, EmitError> {
        if tuple && elements.is_empty() {
            return self.lower_constant(&ConstValue::Tuple(Vec::new()), "tuple_value");
        }
        let (element_purpose, purpose, make, set) = if tuple {
            ("tuple_element", "tuple_value", "MAKE_TUPLE_EMPTY", "PyTuple_SET_ITEM")
        } else {
            ("list_element", "list_value", "MAKE_LIST_EMPTY", "PyList_SET_ITEM")
        };
        let mut values = Vec::with_capacity(elements.len());
        for &element in elements {
            let Lowered::Value(temp) = self.lower_object(element, element_purpose)? else {
                return Ok(Lowered::Raised);
            };
            self.ctx.take_reference(temp)?;
            values.push(temp);
        }
        let container = self.ctx.allocate(purpose, OBJECT_TYPE, Ownership::Owned);
        let target = self.ctx.temp(container)?;
        self.ctx
            .writeln(&format!("{target} = {make}(tstate, {});", elements.len()));
        self.ctx
            .emit_failure_check(&format!("{target} == NULL"), false, self.query.source_pos(id));
        for (index, temp) in values.into_iter().enumerate() {
            let value = self.ctx.temp(temp)?;
            self.ctx
                .writeln(&format!("{set}({target}, {index}, {value});"));
            self.ctx.hand_off(temp)?;
        }
        Ok(Lowered::Value(container))
    }

    fn lower_dict(&mut self, id: ExprId, pairs: &[(ExprId, ExprId)]) -> Result<Lowered, EmitError> {
        if pairs.is_empty() {
            return self.lower_constant(&ConstValue::Dict(Vec::new()), "dict_value");
        }
        let values_first = self.config.dict_values_first();
        let mut evaluated = Vec::with_capacity(pairs.len());
        for &(key, value) in pairs {
            let (first, second) = if values_first {
                ((value, "dict_value"), (key, "dict_key"))
            } else {
                ((key, "dict_key"), (value, "dict_value"))
            };
            let Lowered::Value(first_temp) = self.lower_object(first.0, first.1)? else {
                return Ok(Lowered::Raised);
            };
            let Lowered::Value(second_temp) = self.lower_object(second.0, second.1)? else {
                return Ok(Lowered::Raised);
            };
            let (key_temp, value_temp) = if values_first {
                (second_temp, first_temp)
            } else {
                (first_temp, second_temp)
            };
            evaluated.push((key, key_temp, value_temp));
        }

        let dict = self.ctx.allocate("dict_result", OBJECT_TYPE, Ownership::Owned);
        let target = self.ctx.temp(dict)?;
        self.ctx
            .writeln(&format!("{target} = _PyDict_NewPresized({});", pairs.len()));
        self.ctx
            .emit_failure_check(&format!("{target} == NULL"), false, self.query.source_pos(id));
        for (key, key_temp, value_temp) in evaluated {
            let status = self.ctx.allocate("res", "int", Ownership::Owned);
            let status_name = self.ctx.temp(status)?;
            let key_name = self.ctx.temp(key_temp)?;
            let value_name = self.ctx.temp(value_temp)?;
            self.ctx.writeln(&format!(
                "{status_name} = PyDict_SetItem({target}, {key_name}, {value_name});"
            ));
            self.ctx.release(value_temp)?;
            self.ctx.release(key_temp)?;
            let needs_check = !self.query.shape(key).is_known_hashable();
            self.ctx.emit_failure_check(
                &format!("{status_name} != 0"),
                needs_check,
                self.query.source_pos(key),
            );
            self.ctx.release(status)?;
        }
        Ok(Lowered::Value(dict))
    }

    fn lower_attribute(&mut self, id: ExprId, source: ExprId, attribute: &str) -> Result<Lowered, EmitError> {
        let Lowered::Value(source_temp) = self.lower_object(source, "expression_value")? else {
            return Ok(Lowered::Raised);
        };
        let name = self
            .unit
            .constants
            .reference(&ConstValue::Str(attribute.to_owned()));
        let result = self.ctx.allocate("attribute_value", OBJECT_TYPE, Ownership::Borrowed);
        let target = self.ctx.temp(result)?;
        let source_name = self.ctx.temp(source_temp)?;
        self.ctx.writeln(&format!(
            "{target} = LOOKUP_ATTRIBUTE(tstate, {source_name}, {name});"
        ));
        self.ctx.release(source_temp)?;
        let needs_check = self.query.may_raise(id, ExceptionFilter::Any);
        self.ctx
            .emit_failure_check(&format!("{target} == NULL"), needs_check, self.query.source_pos(id));
        self.ctx.adopt(result)?;
        Ok(Lowered::Value(result))
    }
}
