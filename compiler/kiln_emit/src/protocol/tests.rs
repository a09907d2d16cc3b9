#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_ir::SourcePos;
use pretty_assertions::assert_eq;

use super::*;
use crate::temps::{Ownership, OBJECT_TYPE};

const LINE_7: SourcePos = SourcePos::new(7, 4);

#[test]
fn failure_check_releases_owned_temporaries_and_jumps() {
    let mut ctx = EmitContext::new(true);
    let left = ctx.allocate("left_value", OBJECT_TYPE, Ownership::Owned);
    let _right = ctx.allocate("right_value", OBJECT_TYPE, Ownership::Borrowed);
    let result = ctx.allocate("call_result", OBJECT_TYPE, Ownership::Borrowed);
    ctx.emit_failure_check("tmp_call_result_1 == NULL", true, LINE_7);

    assert_eq!(
        ctx.output(),
        "    if (tmp_call_result_1 == NULL) {
        assert(HAS_ERROR_OCCURRED(tstate));
        FETCH_ERROR_OCCURRED(tstate, &exception_type, &exception_value, &exception_tb);
        Py_DECREF(tmp_left_value_1);
        exception_lineno = 7;
        goto function_exception_exit;
    }
"
    );
    // The success path still owns everything.
    ctx.adopt(result).unwrap();
    ctx.release(left).unwrap();
    assert!(ctx.output().ends_with("    Py_DECREF(tmp_left_value_1);\n"));
    ctx.hand_off(result).unwrap();
}

#[test]
fn impossible_failure_is_only_asserted() {
    let mut ctx = EmitContext::new(true);
    ctx.emit_failure_check("tmp_cmp_1 == NUITKA_BOOL_EXCEPTION", false, LINE_7);
    assert_eq!(ctx.output(), "    assert(!(tmp_cmp_1 == NUITKA_BOOL_EXCEPTION));\n");
    assert!(!ctx.output().contains("goto"));

    let mut release_build = EmitContext::new(false);
    release_build.emit_failure_check("tmp_cmp_1 == NUITKA_BOOL_EXCEPTION", false, LINE_7);
    assert_eq!(release_build.output(), "");
}

#[test]
fn failure_jumps_to_innermost_target() {
    let mut ctx = EmitContext::new(true);
    ctx.push_exception_target("try_except_handler_1");
    ctx.emit_failure_check("x == NULL", true, SourcePos::default());
    assert!(ctx.output().contains("goto try_except_handler_1;"));
    assert!(!ctx.output().contains("exception_lineno"));
}

#[test]
fn raise_consumes_live_temporaries() {
    let mut ctx = EmitContext::new(true);
    let _arg = ctx.allocate("arg", OBJECT_TYPE, Ownership::Owned);
    ctx.emit_raise("TypeError", "f() takes 0 positional arguments but 1 was given", LINE_7);

    assert_eq!(
        ctx.output(),
        "    SET_CURRENT_EXCEPTION_TYPE0_STR(tstate, PyExc_TypeError, \"f() takes 0 positional arguments but 1 was given\");
    assert(HAS_ERROR_OCCURRED(tstate));
    FETCH_ERROR_OCCURRED(tstate, &exception_type, &exception_value, &exception_tb);
    Py_DECREF(tmp_arg_1);
    exception_lineno = 7;
    goto function_exception_exit;
"
    );
    let stats = ctx.finish_statement().unwrap();
    assert_eq!(stats.released, 1);
}

#[test]
fn reraise_in_same_frame_restores_keepers() {
    let mut ctx = EmitContext::new(true);
    let keeper = ctx.enter_handler();
    assert_eq!(keeper.index, 1);
    let before = ctx.output().len();
    ctx.emit_reraise(LINE_7);

    assert_eq!(
        &ctx.output()[before..],
        "    exception_type = exception_keeper_type_1;
    exception_value = exception_keeper_value_1;
    exception_tb = exception_keeper_tb_1;
    exception_lineno = exception_keeper_lineno_1;
    Py_INCREF(exception_type);
    Py_XINCREF(exception_value);
    Py_XINCREF(exception_tb);
    goto function_exception_exit;
"
    );
}

#[test]
fn reraise_after_reentry_adds_traceback_entry() {
    let mut ctx = EmitContext::new(true);
    ctx.enter_handler();
    ctx.mark_frame_reentered().unwrap();
    let before = ctx.output().len();
    ctx.emit_reraise(LINE_7);

    let emitted = &ctx.output()[before..];
    assert!(emitted.contains("RERAISE_EXCEPTION(tstate"));
    assert!(emitted.contains("exception_lineno = 7;"));
    assert!(!emitted.contains("exception_keeper"));
}

#[test]
fn handlers_must_be_balanced() {
    let mut ctx = EmitContext::new(true);
    assert_eq!(ctx.exit_handler(), Err(EmitError::NoActiveHandler));
    assert_eq!(ctx.mark_frame_reentered(), Err(EmitError::NoActiveHandler));

    ctx.enter_handler();
    let keeper = ctx.exit_handler().unwrap();
    assert_eq!(keeper.index, 1);
    assert!(ctx.output().ends_with(
        "    Py_DECREF(exception_keeper_type_1);
    Py_XDECREF(exception_keeper_value_1);
    Py_XDECREF(exception_keeper_tb_1);
"
    ));
}

#[test]
fn leaving_nested_handlers_releases_innermost_first() {
    let mut ctx = EmitContext::new(true);
    ctx.enter_handler();
    ctx.enter_handler();
    let before = ctx.output().len();
    ctx.release_active_keepers();

    let emitted = &ctx.output()[before..];
    let inner = emitted.find("Py_DECREF(exception_keeper_type_2);").unwrap();
    let outer = emitted.find("Py_DECREF(exception_keeper_type_1);").unwrap();
    assert!(inner < outer);
    assert_eq!(ctx.exit_handler().unwrap().index, 2);
}

#[test]
fn string_literals_are_escaped() {
    assert_eq!(c_string_literal("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
    assert_eq!(c_string_literal("é"), "\"\\303\\251\"");
}
