//! Call-site classification.
//!
//! [`classify_call`] inspects one call expression through [`ExprQuery`]
//! and produces a [`CallPlan`]: either a [`CallSite`] naming the calling
//! convention, the helper and the argument sources, or a [`RaisePlan`]
//! when the call can never happen because an argument always raises or
//! the arguments cannot match the statically known signature.

use kiln_ir::{ExprId, ExprKind, ExprQuery};
use smallvec::SmallVec;
use thiserror::Error;

use crate::arity::{check_arguments, ArityError, ParameterSpec};
use crate::shape::{CallFlags, CallShape};
use crate::trampoline::{TrampolineKey, CALL_GENERIC, CALL_KWSPLIT, CALL_POSARGS};

/// Classifier settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallConfig {
    /// Largest count whose call helpers the runtime library ships.
    pub max_prebuilt_call_args: usize,
    /// Attributes never turned into method calls.
    pub method_call_blacklist: Vec<String>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            max_prebuilt_call_args: 10,
            method_call_blacklist: vec!["__class__".to_owned(), "__dict__".to_owned()],
        }
    }
}

impl CallConfig {
    fn allows_method(&self, attribute: &str) -> bool {
        !self.method_call_blacklist.iter().any(|a| a == attribute)
    }
}

/// How the called object is obtained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Callee {
    /// Evaluate the expression and call the result.
    Function(ExprId),
    /// Pass receiver and attribute name; the lookup happens in the helper.
    Method {
        lookup: ExprId,
        receiver: ExprId,
        attribute: String,
    },
}

impl Callee {
    /// The expression evaluated first.
    pub fn first_expr(&self) -> ExprId {
        match self {
            Callee::Function(expr) => *expr,
            Callee::Method { receiver, .. } => *receiver,
        }
    }
}

/// Where positional arguments come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Positional {
    None,
    /// Immutable constant tuple.
    Constant { expr: ExprId, count: usize },
    /// Mutable constant tuple, copied per call.
    Materialized { expr: ExprId, count: usize },
    /// Tuple or list display elements.
    Elements(Vec<ExprId>),
    /// Tuple object of unknown length.
    Dynamic(ExprId),
}

impl Positional {
    /// Statically known argument count.
    pub fn count(&self) -> Option<usize> {
        match self {
            Positional::None => Some(0),
            Positional::Constant { count, .. } | Positional::Materialized { count, .. } => {
                Some(*count)
            }
            Positional::Elements(elements) => Some(elements.len()),
            Positional::Dynamic(_) => None,
        }
    }
}

/// Where keyword arguments come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Keywords {
    None,
    /// Immutable constant mapping with string keys.
    Constant { expr: ExprId, names: Vec<String> },
    /// Constant mapping with string keys holding mutable values, copied per
    /// call.
    Materialized { expr: ExprId, names: Vec<String> },
    /// Dict display with constant string keys.
    Split {
        names: Vec<String>,
        keys: Vec<ExprId>,
        values: Vec<ExprId>,
    },
    /// Mapping object of unknown content.
    Dynamic(ExprId),
}

impl Keywords {
    /// Statically known keyword names.
    pub fn names(&self) -> Option<&[String]> {
        match self {
            Keywords::None => Some(&[]),
            Keywords::Constant { names, .. }
            | Keywords::Materialized { names, .. }
            | Keywords::Split { names, .. } => Some(names),
            Keywords::Dynamic(_) => None,
        }
    }

    /// Whether the keyword values are produced at each call rather than
    /// taken from one shared constant.
    pub fn values_per_call(&self) -> bool {
        matches!(self, Keywords::Materialized { .. } | Keywords::Split { .. })
    }
}

/// A call that will be emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSite {
    pub call: ExprId,
    pub shape: CallShape,
    pub callee: Callee,
    pub positional: Positional,
    pub keywords: Keywords,
    /// Runtime helper invoked.
    pub helper: String,
    /// Count-parameterized helper this unit must generate.
    pub trampoline: Option<TrampolineKey>,
}

impl CallSite {
    pub fn is_method_call(&self) -> bool {
        matches!(self.callee, Callee::Method { .. })
    }
}

/// Why a call is replaced by a raise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RaiseCause {
    /// This sub-expression always raises.
    Expression(ExprId),
    /// The arguments cannot bind to the known signature.
    Arity(ArityError),
}

/// A call that never happens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaisePlan {
    pub call: ExprId,
    /// Sub-expressions still evaluated for their effects, in source order.
    pub side_effects: Vec<ExprId>,
    pub cause: RaiseCause,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallPlan {
    Call(CallSite),
    Raises(RaisePlan),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("expression at {line}:{column} is not a call")]
    NotACall { line: u32, column: u32 },
}

/// Classify one call expression.
///
/// `target` is the callee's signature when it is statically known.
pub fn classify_call<Q: ExprQuery + ?Sized>(
    query: &Q,
    call: ExprId,
    config: &CallConfig,
    target: Option<&ParameterSpec>,
) -> Result<CallPlan, ClassifyError> {
    let ExprKind::Call {
        callee,
        args,
        kwargs,
    } = query.kind(call)
    else {
        let pos = query.source_pos(call);
        return Err(ClassifyError::NotACall {
            line: pos.line,
            column: pos.column,
        });
    };
    let (callee, args, kwargs) = (*callee, *args, *kwargs);

    let positional = analyze_positional(query, args);
    let keywords = analyze_keywords(query, kwargs);
    let order = evaluation_order(callee, &positional, &keywords);

    if let Some(index) = order.iter().position(|&expr| query.will_raise(expr)) {
        let side_effects = order[..index]
            .iter()
            .copied()
            .filter(|&expr| query.has_side_effects(expr))
            .collect();
        tracing::debug!(call = call.raw(), "argument always raises, call dropped");
        return Ok(CallPlan::Raises(RaisePlan {
            call,
            side_effects,
            cause: RaiseCause::Expression(order[index]),
        }));
    }

    if let Some(spec) = target {
        if let (Some(count), Some(names)) = (positional.count(), keywords.names()) {
            let names: SmallVec<[&str; 8]> = names.iter().map(String::as_str).collect();
            if let Err(err) = check_arguments(spec, count, &names) {
                tracing::debug!(call = call.raw(), error = %err, "call can never bind");
                let side_effects = order
                    .iter()
                    .copied()
                    .filter(|&expr| query.has_side_effects(expr))
                    .collect();
                return Ok(CallPlan::Raises(RaisePlan {
                    call,
                    side_effects,
                    cause: RaiseCause::Arity(err),
                }));
            }
        }
    }

    let flags = call_flags(&positional, &keywords);
    let shape = CallShape::classify(flags);
    let callee = choose_callee(query, callee, shape, &order, config);
    let (helper, key) = helper_for(shape, &callee, &positional, &keywords);
    let trampoline = key.filter(|key| {
        !key.has_fixed_form() && key.count() > config.max_prebuilt_call_args
    });
    if let Some(key) = trampoline {
        tracing::debug!(helper = %key, "call helper requested");
    }

    tracing::trace!(
        call = call.raw(),
        shape = %shape,
        helper = helper.as_str(),
        method = matches!(callee, Callee::Method { .. }),
        "classified call"
    );
    Ok(CallPlan::Call(CallSite {
        call,
        shape,
        callee,
        positional,
        keywords,
        helper,
        trampoline,
    }))
}

fn analyze_positional<Q: ExprQuery + ?Sized>(query: &Q, args: Option<ExprId>) -> Positional {
    let Some(expr) = args else {
        return Positional::None;
    };
    match query.kind(expr) {
        ExprKind::Constant(value) => match value.tuple_elements() {
            Some([]) => Positional::None,
            Some(elements) if value.is_mutable() => Positional::Materialized {
                expr,
                count: elements.len(),
            },
            Some(elements) => Positional::Constant {
                expr,
                count: elements.len(),
            },
            None => Positional::Dynamic(expr),
        },
        ExprKind::MakeTuple(elements) | ExprKind::MakeList(elements) => {
            if elements.is_empty() {
                Positional::None
            } else {
                Positional::Elements(elements.clone())
            }
        }
        _ => Positional::Dynamic(expr),
    }
}

fn analyze_keywords<Q: ExprQuery + ?Sized>(query: &Q, kwargs: Option<ExprId>) -> Keywords {
    let Some(expr) = kwargs else {
        return Keywords::None;
    };
    match query.kind(expr) {
        ExprKind::Constant(value) => match value.dict_items() {
            Some([]) => Keywords::None,
            Some(items) => {
                let names: Option<Vec<String>> = items
                    .iter()
                    .map(|(key, _)| key.as_str().map(str::to_owned))
                    .collect();
                match names.filter(|names| !has_repeats(names)) {
                    Some(names) if items.iter().any(|(_, item)| item.is_mutable()) => {
                        Keywords::Materialized { expr, names }
                    }
                    Some(names) => Keywords::Constant { expr, names },
                    None => Keywords::Dynamic(expr),
                }
            }
            None => Keywords::Dynamic(expr),
        },
        ExprKind::MakeDict(pairs) => {
            if pairs.is_empty() {
                return Keywords::None;
            }
            let names: Option<Vec<String>> = pairs
                .iter()
                .map(|&(key, _)| {
                    query
                        .constant(key)
                        .and_then(|value| value.as_str())
                        .map(str::to_owned)
                })
                .collect();
            // A repeated key keeps its last value, which only building the
            // dict reproduces.
            match names.filter(|names| !has_repeats(names)) {
                Some(names) => Keywords::Split {
                    names,
                    keys: pairs.iter().map(|&(key, _)| key).collect(),
                    values: pairs.iter().map(|&(_, value)| value).collect(),
                },
                None => Keywords::Dynamic(expr),
            }
        }
        _ => Keywords::Dynamic(expr),
    }
}

fn has_repeats(names: &[String]) -> bool {
    names
        .iter()
        .enumerate()
        .any(|(i, name)| names[..i].contains(name))
}

/// Sub-expressions in the order the call evaluates them.
fn evaluation_order(callee: ExprId, positional: &Positional, keywords: &Keywords) -> Vec<ExprId> {
    let mut order = vec![callee];
    match positional {
        Positional::None => {}
        Positional::Constant { expr, .. }
        | Positional::Materialized { expr, .. }
        | Positional::Dynamic(expr) => order.push(*expr),
        Positional::Elements(elements) => order.extend(elements.iter().copied()),
    }
    match keywords {
        Keywords::None => {}
        Keywords::Constant { expr, .. }
        | Keywords::Materialized { expr, .. }
        | Keywords::Dynamic(expr) => order.push(*expr),
        Keywords::Split { values, .. } => order.extend(values.iter().copied()),
    }
    order
}

fn call_flags(positional: &Positional, keywords: &Keywords) -> CallFlags {
    CallFlags {
        has_positional: !matches!(positional, Positional::None),
        positional_constant: matches!(
            positional,
            Positional::Constant { .. } | Positional::Materialized { .. }
        ),
        positional_mutable: matches!(positional, Positional::Materialized { .. }),
        positional_display: matches!(positional, Positional::Elements(_)),
        has_keywords: !matches!(keywords, Keywords::None),
        keywords_constant: matches!(keywords, Keywords::Constant { .. }),
        keywords_display: keywords.values_per_call(),
    }
}

fn choose_callee<Q: ExprQuery + ?Sized>(
    query: &Q,
    callee: ExprId,
    shape: CallShape,
    order: &[ExprId],
    config: &CallConfig,
) -> Callee {
    let ExprKind::AttributeLookup { source, attribute } = query.kind(callee) else {
        return Callee::Function(callee);
    };
    if !shape.supports_method_call() || !config.allows_method(attribute) {
        return Callee::Function(callee);
    }
    // The lookup moves after argument evaluation.
    let arguments_have_effects = order[1..].iter().any(|&arg| query.has_side_effects(arg));
    if arguments_have_effects && query.has_side_effects(callee) {
        return Callee::Function(callee);
    }
    Callee::Method {
        lookup: callee,
        receiver: *source,
        attribute: attribute.clone(),
    }
}

fn helper_for(
    shape: CallShape,
    callee: &Callee,
    positional: &Positional,
    keywords: &Keywords,
) -> (String, Option<TrampolineKey>) {
    let method = matches!(callee, Callee::Method { .. });
    let count = positional.count().unwrap_or(0);
    let key = match shape {
        CallShape::NoArgs
        | CallShape::MaterializedPositional
        | CallShape::PositionalArray => {
            if method {
                TrampolineKey::Method(count)
            } else {
                TrampolineKey::Positional(count)
            }
        }
        CallShape::ConstantPositional => {
            if method {
                TrampolineKey::Method(count)
            } else {
                TrampolineKey::PositionalTuple(count)
            }
        }
        CallShape::Mixed => TrampolineKey::Mixed {
            count,
            has_tuple: matches!(positional, Positional::Constant { .. }),
            has_dict_values: keywords.values_per_call(),
        },
        CallShape::DynamicPositional => return (CALL_POSARGS.to_owned(), None),
        CallShape::KeywordSplitConstant | CallShape::KeywordSplit => {
            return (CALL_KWSPLIT.to_owned(), None)
        }
        CallShape::Generic => return (CALL_GENERIC.to_owned(), None),
    };
    (key.helper_name(), Some(key))
}

#[cfg(test)]
mod tests;
