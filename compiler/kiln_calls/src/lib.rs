//! Kiln Calls - call-site classification for the Kiln compiler.
//!
//! Every call expression is reduced to one of nine calling conventions
//! ([`CallShape`]), tried in precedence order. [`classify_call`] turns a
//! call into a [`CallPlan`] naming the runtime helper, the argument
//! sources and any count-parameterized helper the unit must generate.
//!
//! Calls whose arguments cannot bind to a statically known signature are
//! replaced by the `TypeError` the runtime would raise ([`check_arguments`]).

mod arity;
mod classify;
mod shape;
mod trampoline;

pub use arity::{check_arguments, ArityError, MissingKind, ParameterSpec};
pub use classify::{
    classify_call, CallConfig, CallPlan, CallSite, Callee, ClassifyError, Keywords, Positional,
    RaiseCause, RaisePlan,
};
pub use shape::{CallFlags, CallShape};
pub use trampoline::{TrampolineKey, CALL_GENERIC, CALL_KWSPLIT, CALL_POSARGS};
