//! Emission of classified call sites.
//!
//! The callee is evaluated first, then positional arguments, then keyword
//! values. Every argument temporary is released after the helper returns
//! and before its result is checked.

use kiln_calls::{
    classify_call, CallPlan, CallShape, CallSite, Callee, ClassifyError, Keywords, Positional,
    RaiseCause, RaisePlan,
};
use kiln_ir::{ConstValue, ExceptionFilter, ExprId, ExprKind, ExprQuery, Shape};

use crate::emitter::{Emitter, Lowered};
use crate::temps::{Ownership, TempId, OBJECT_TYPE};
use crate::EmitError;

/// Evaluated positional arguments.
enum PositionalArgs {
    None,
    /// Constant tuple reference.
    Tuple(String),
    /// Element expressions, in order.
    Array(Vec<String>),
}

impl<Q: ExprQuery + ?Sized> Emitter<'_, Q> {
    /// Classify and emit the call `id`.
    pub fn emit_call(&mut self, id: ExprId) -> Result<Lowered, EmitError> {
        let query = self.query;
        let signature = match query.kind(id) {
            ExprKind::Call { callee, .. } => match query.kind(*callee) {
                ExprKind::Variable(name) => self.unit.signature(name),
                _ => None,
            },
            _ => None,
        };
        let plan = classify_call(query, id, &self.config.call_config(), signature)?;
        match plan {
            CallPlan::Call(site) => {
                if let Some(key) = site.trampoline {
                    self.unit.trampolines.request(key);
                }
                self.emit_call_site(&site)
            }
            CallPlan::Raises(plan) => self.emit_raise_plan(&plan),
        }
    }

    /// Evaluate what must still run of a call that never happens, then raise.
    pub fn emit_raise_plan(&mut self, plan: &RaisePlan) -> Result<Lowered, EmitError> {
        for &expr in &plan.side_effects {
            match self.lower(expr)? {
                Lowered::Value(temp) => self.ctx.release(temp)?,
                Lowered::Raised => return Ok(Lowered::Raised),
            }
        }
        let pos = self.query.source_pos(plan.call);
        match &plan.cause {
            RaiseCause::Expression(expr) => {
                if let Lowered::Value(temp) = self.lower(*expr)? {
                    // Unreachable while the raise analysis is sound.
                    self.ctx.release(temp)?;
                    self.ctx.emit_raise(
                        "SystemError",
                        "expression expected to raise produced a value",
                        pos,
                    );
                }
            }
            RaiseCause::Arity(err) => {
                tracing::debug!(call = plan.call.raw(), error = %err, "emitting arity error");
                self.ctx.emit_raise(err.exception(), &err.to_string(), pos);
            }
        }
        Ok(Lowered::Raised)
    }

    pub fn emit_call_site(&mut self, site: &CallSite) -> Result<Lowered, EmitError> {
        let mut owned: Vec<TempId> = Vec::new();

        let callee = match &site.callee {
            Callee::Function(expr) => {
                let Lowered::Value(temp) = self.lower_object(*expr, "called_value")? else {
                    return Ok(Lowered::Raised);
                };
                owned.push(temp);
                self.ctx.temp(temp)?
            }
            Callee::Method {
                receiver,
                attribute,
                ..
            } => {
                let Lowered::Value(temp) = self.lower_object(*receiver, "called_instance")? else {
                    return Ok(Lowered::Raised);
                };
                owned.push(temp);
                let name = self
                    .unit
                    .constants
                    .reference(&ConstValue::Str(attribute.clone()));
                format!("{}, {name}", self.ctx.temp(temp)?)
            }
        };

        let call = match site.shape {
            CallShape::DynamicPositional | CallShape::Generic => {
                let Some(call) = self.generic_call(site, &callee, &mut owned)? else {
                    return Ok(Lowered::Raised);
                };
                call
            }
            _ => {
                let Some(positional) = self.positional_args(&site.positional, &mut owned)? else {
                    return Ok(Lowered::Raised);
                };
                let Some(keywords) = self.keyword_values(&site.keywords, &mut owned)? else {
                    return Ok(Lowered::Raised);
                };
                self.structured_call(site, &callee, positional, keywords)?
            }
        };

        let result = self.ctx.allocate("call_result", OBJECT_TYPE, Ownership::Borrowed);
        let target = self.ctx.temp(result)?;
        match call {
            CallText::Direct(text) => self.ctx.writeln(&format!("{target} = {text};")),
            CallText::Block { arrays, text } => {
                self.ctx.writeln("{");
                self.ctx.indent();
                for array in &arrays {
                    self.ctx.writeln(array);
                }
                self.ctx.writeln(&format!("{target} = {text};"));
                self.ctx.dedent();
                self.ctx.writeln("}");
            }
        }
        self.ctx.release_all(&owned)?;
        let needs_check = self.query.may_raise(site.call, ExceptionFilter::Any);
        self.ctx.emit_failure_check(
            &format!("{target} == NULL"),
            needs_check,
            self.query.source_pos(site.call),
        );
        self.ctx.adopt(result)?;
        Ok(Lowered::Value(result))
    }

    /// Tiers passing whole argument objects: evaluate the call's own
    /// argument expressions.
    fn generic_call(
        &mut self,
        site: &CallSite,
        callee: &str,
        owned: &mut Vec<TempId>,
    ) -> Result<Option<CallText>, EmitError> {
        let query = self.query;
        let ExprKind::Call { args, kwargs, .. } = query.kind(site.call) else {
            let pos = query.source_pos(site.call);
            return Err(ClassifyError::NotACall {
                line: pos.line,
                column: pos.column,
            }
            .into());
        };
        let positional = match (*args, &site.positional) {
            (Some(expr), positional) if !matches!(positional, Positional::None) => {
                let Lowered::Value(temp) = self.lower_object(expr, "call_args")? else {
                    return Ok(None);
                };
                let temp = self.ensure_tuple(expr, temp)?;
                owned.push(temp);
                self.ctx.temp(temp)?
            }
            _ => self.unit.constants.reference(&ConstValue::Tuple(Vec::new())),
        };
        if site.shape == CallShape::DynamicPositional {
            return Ok(Some(CallText::Direct(format!(
                "{}(tstate, {callee}, {positional})",
                site.helper
            ))));
        }
        let keywords = match (*kwargs, &site.keywords) {
            (Some(expr), keywords) if !matches!(keywords, Keywords::None) => {
                let Lowered::Value(temp) = self.lower_object(expr, "call_kw")? else {
                    return Ok(None);
                };
                owned.push(temp);
                self.ctx.temp(temp)?
            }
            _ => "NULL".to_owned(),
        };
        Ok(Some(CallText::Direct(format!(
            "{}(tstate, {callee}, {positional}, {keywords})",
            site.helper
        ))))
    }

    /// Convert a positional argument sequence that is not known to be a
    /// tuple.
    fn ensure_tuple(&mut self, expr: ExprId, temp: TempId) -> Result<TempId, EmitError> {
        if self.query.shape(expr) == Shape::Tuple {
            return Ok(temp);
        }
        let tuple = self.ctx.allocate("call_args_tuple", OBJECT_TYPE, Ownership::Borrowed);
        let target = self.ctx.temp(tuple)?;
        let source = self.ctx.temp(temp)?;
        self.ctx
            .writeln(&format!("{target} = PySequence_Tuple({source});"));
        self.ctx.release(temp)?;
        self.ctx
            .emit_failure_check(&format!("{target} == NULL"), true, self.query.source_pos(expr));
        self.ctx.adopt(tuple)?;
        Ok(tuple)
    }

    fn positional_args(
        &mut self,
        positional: &Positional,
        owned: &mut Vec<TempId>,
    ) -> Result<Option<PositionalArgs>, EmitError> {
        let args = match positional {
            Positional::None => PositionalArgs::None,
            Positional::Constant { expr, .. } => {
                let value = self.constant_of(*expr)?;
                PositionalArgs::Tuple(self.unit.constants.reference(&value))
            }
            Positional::Materialized { expr, count } => {
                let Lowered::Value(temp) = self.lower_as(*expr, "call_args")? else {
                    return Ok(None);
                };
                owned.push(temp);
                let name = self.ctx.temp(temp)?;
                PositionalArgs::Array(
                    (0..*count)
                        .map(|index| format!("PyTuple_GET_ITEM({name}, {index})"))
                        .collect(),
                )
            }
            Positional::Elements(elements) => {
                let mut names = Vec::with_capacity(elements.len());
                for &element in elements {
                    let Lowered::Value(temp) = self.lower_object(element, "call_arg_element")?
                    else {
                        return Ok(None);
                    };
                    owned.push(temp);
                    names.push(self.ctx.temp(temp)?);
                }
                PositionalArgs::Array(names)
            }
            Positional::Dynamic(_) => PositionalArgs::None,
        };
        Ok(Some(args))
    }

    /// Keyword values as C expressions, with the constant names tuple.
    fn keyword_values(
        &mut self,
        keywords: &Keywords,
        owned: &mut Vec<TempId>,
    ) -> Result<Option<Option<(Vec<String>, String)>>, EmitError> {
        let (names, values) = match keywords {
            Keywords::None | Keywords::Dynamic(_) => return Ok(Some(None)),
            Keywords::Constant { expr, names } => {
                let value = self.constant_of(*expr)?;
                let values = value
                    .dict_items()
                    .unwrap_or_default()
                    .iter()
                    .map(|(_, item)| self.unit.constants.reference(item))
                    .collect();
                (names, values)
            }
            Keywords::Materialized { expr, names } => {
                let value = self.constant_of(*expr)?;
                let items = value.dict_items().unwrap_or_default();
                let mut values = Vec::with_capacity(items.len());
                for (_, item) in items {
                    if item.is_mutable() {
                        // The callee may keep or mutate it.
                        let Lowered::Value(temp) = self.lower_constant(item, "kw_call_value")?
                        else {
                            return Ok(None);
                        };
                        owned.push(temp);
                        values.push(self.ctx.temp(temp)?);
                    } else {
                        values.push(self.unit.constants.reference(item));
                    }
                }
                (names, values)
            }
            Keywords::Split { names, values, .. } => {
                let mut evaluated = Vec::with_capacity(values.len());
                for &value in values {
                    let Lowered::Value(temp) = self.lower_object(value, "kw_call_value")? else {
                        return Ok(None);
                    };
                    owned.push(temp);
                    evaluated.push(self.ctx.temp(temp)?);
                }
                (names, evaluated)
            }
        };
        let names = ConstValue::Tuple(names.iter().cloned().map(ConstValue::Str).collect());
        Ok(Some(Some((values, self.unit.constants.reference(&names)))))
    }

    fn constant_of(&self, expr: ExprId) -> Result<ConstValue, EmitError> {
        self.query
            .constant(expr)
            .cloned()
            .ok_or(EmitError::MissingConstant { expr: expr.raw() })
    }

    fn structured_call(
        &mut self,
        site: &CallSite,
        callee: &str,
        positional: PositionalArgs,
        keywords: Option<(Vec<String>, String)>,
    ) -> Result<CallText, EmitError> {
        let helper = &site.helper;
        let Some((values, names)) = keywords else {
            return Ok(match positional {
                PositionalArgs::None => CallText::Direct(format!("{helper}(tstate, {callee})")),
                PositionalArgs::Tuple(tuple) if site.is_method_call() => {
                    let count = site.positional.count().unwrap_or(0);
                    if count == 1 {
                        CallText::Direct(format!(
                            "{helper}(tstate, {callee}, PyTuple_GET_ITEM({tuple}, 0))"
                        ))
                    } else {
                        CallText::Direct(format!(
                            "{helper}(tstate, {callee}, &PyTuple_GET_ITEM({tuple}, 0))"
                        ))
                    }
                }
                PositionalArgs::Tuple(tuple) => {
                    CallText::Direct(format!("{helper}(tstate, {callee}, {tuple})"))
                }
                PositionalArgs::Array(args) if args.len() == 1 => {
                    CallText::Direct(format!("{helper}(tstate, {callee}, {})", args[0]))
                }
                PositionalArgs::Array(args) => CallText::Block {
                    arrays: vec![array_declaration("call_args", &args)],
                    text: format!("{helper}(tstate, {callee}, call_args)"),
                },
            });
        };

        // Keyword values evaluated per call travel in their own array.
        let split = site.keywords.values_per_call();
        Ok(match positional {
            PositionalArgs::None => CallText::Block {
                arrays: vec![array_declaration("kw_values", &values)],
                text: format!("{helper}(tstate, {callee}, kw_values, {names})"),
            },
            PositionalArgs::Tuple(tuple) if split => CallText::Block {
                arrays: vec![array_declaration("kw_values", &values)],
                text: format!("{helper}(tstate, {callee}, {tuple}, kw_values, {names})"),
            },
            PositionalArgs::Tuple(_) => {
                // Positional and keyword values are both constant: pass
                // them as one tuple.
                let combined = self.combined_constant(site)?;
                CallText::Direct(format!("{helper}(tstate, {callee}, {combined}, {names})"))
            }
            PositionalArgs::Array(args) if split => CallText::Block {
                arrays: vec![
                    array_declaration("call_args", &args),
                    array_declaration("kw_values", &values),
                ],
                text: format!("{helper}(tstate, {callee}, call_args, kw_values, {names})"),
            },
            PositionalArgs::Array(mut args) => {
                args.extend(values);
                CallText::Block {
                    arrays: vec![array_declaration("call_args", &args)],
                    text: format!("{helper}(tstate, {callee}, call_args, {names})"),
                }
            }
        })
    }

    /// One constant tuple of the positional values followed by the keyword
    /// values.
    fn combined_constant(&mut self, site: &CallSite) -> Result<String, EmitError> {
        let (Positional::Constant { expr: args, .. }, Keywords::Constant { expr: kwargs, .. }) =
            (&site.positional, &site.keywords)
        else {
            return Err(EmitError::MissingConstant {
                expr: site.call.raw(),
            });
        };
        let positional = self.constant_of(*args)?;
        let keywords = self.constant_of(*kwargs)?;
        let mut values: Vec<ConstValue> = positional.tuple_elements().unwrap_or_default().to_vec();
        values.extend(
            keywords
                .dict_items()
                .unwrap_or_default()
                .iter()
                .map(|(_, value)| value.clone()),
        );
        Ok(self.unit.constants.reference(&ConstValue::Tuple(values)))
    }
}

/// Source text of a helper invocation.
enum CallText {
    Direct(String),
    /// Needs local argument arrays declared in a nested block.
    Block { arrays: Vec<String>, text: String },
}

fn array_declaration(name: &str, values: &[String]) -> String {
    format!("PyObject *{name}[] = {{{}}};", values.join(", "))
}
