//! Error domains: user throws, built-in error classes, uncaught reporting.

use jsmud::ast::build::*;
use jsmud::ast::BinaryOp;
use jsmud::Value;

use crate::{eval, eval_in, interp};

#[test]
fn throw_and_catch_error_instance() {
    let v = eval(vec![
        var("r", Some(string(""))),
        try_stmt(
            vec![throw(new_expr(
                ident("TypeError"),
                vec![string("bad thing")],
            ))],
            Some((
                "e",
                vec![expr_stmt(assign(
                    ident("r"),
                    binary(
                        BinaryOp::Add,
                        member(ident("e"), "name"),
                        binary(BinaryOp::Add, string(": "), member(ident("e"), "message")),
                    ),
                ))],
            )),
            None,
        ),
        expr_stmt(ident("r")),
    ]);
    assert_eq!(v.as_str(), Some("TypeError: bad thing"));
}

#[test]
fn error_subclass_instanceof_chains() {
    let v = eval(vec![
        var("e", Some(new_expr(ident("RangeError"), vec![string("x")]))),
        expr_stmt(binary(
            BinaryOp::Add,
            conditional(
                binary(BinaryOp::InstanceOf, ident("e"), ident("RangeError")),
                number(1.0),
                number(0.0),
            ),
            conditional(
                binary(BinaryOp::InstanceOf, ident("e"), ident("Error")),
                number(2.0),
                number(0.0),
            ),
        )),
    ]);
    assert_eq!(v.as_number(), Some(3.0));
}

#[test]
fn unresolved_read_throws_reference_error() {
    let v = eval(vec![
        var("r", Some(string(""))),
        try_stmt(
            vec![expr_stmt(ident("missing"))],
            Some(("e", vec![expr_stmt(assign(
                ident("r"),
                member(ident("e"), "name"),
            ))])),
            None,
        ),
        expr_stmt(ident("r")),
    ]);
    assert_eq!(v.as_str(), Some("ReferenceError"));
}

#[test]
fn unresolved_assignment_throws_by_default() {
    let v = eval(vec![
        var("r", Some(string("no-throw"))),
        try_stmt(
            vec![expr_stmt(assign(ident("never_declared"), number(1.0)))],
            Some(("e", vec![expr_stmt(assign(
                ident("r"),
                member(ident("e"), "name"),
            ))])),
            None,
        ),
        expr_stmt(ident("r")),
    ]);
    assert_eq!(v.as_str(), Some("ReferenceError"));
}

#[test]
fn unresolved_assignment_can_fall_back_to_global() {
    use jsmud::{Interpreter, InterpreterConfig, ManualClock, ScopeId};
    let config = InterpreterConfig {
        set_unresolved_is_error: false,
        ..InterpreterConfig::default()
    };
    let mut world = Interpreter::with_config(Box::new(ManualClock::new()), config);
    eval_in_world(&mut world);
    assert_eq!(
        world
            .scopes
            .get_var(ScopeId::GLOBAL, "implicit")
            .unwrap()
            .as_number(),
        Some(7.0)
    );

    fn eval_in_world(world: &mut Interpreter) {
        crate::eval_in(
            world,
            vec![expr_stmt(assign(ident("implicit"), number(7.0)))],
        );
    }
}

#[test]
fn uncaught_error_terminates_thread_and_is_reported() {
    let (mut world, _clock) = interp();
    let main = eval_in(
        &mut world,
        vec![
            var("reached", Some(boolean(false))),
            throw(new_expr(ident("Error"), vec![string("unhandled")])),
            expr_stmt(assign(ident("reached"), boolean(true))),
        ],
    );
    assert!(world.scheduler.get(main).unwrap().is_done());
    let uncaught = world.take_uncaught();
    assert_eq!(uncaught.len(), 1);
    assert_eq!(uncaught[0].0, main);
    // The statement after the throw never ran.
    assert_eq!(
        world
            .scopes
            .get_var(jsmud::ScopeId::GLOBAL, "reached")
            .unwrap(),
        Value::Boolean(false)
    );
}

#[test]
fn rethrow_from_catch_propagates() {
    let v = eval(vec![
        var("r", Some(string(""))),
        try_stmt(
            vec![try_stmt(
                vec![throw(string("inner"))],
                Some(("e", vec![throw(ident("e"))])),
                None,
            )],
            Some(("outer", vec![expr_stmt(assign(ident("r"), ident("outer")))])),
            None,
        ),
        expr_stmt(ident("r")),
    ]);
    assert_eq!(v.as_str(), Some("inner"));
}

#[test]
fn thrown_primitive_passes_through_unwrapped() {
    let v = eval(vec![
        var("r", Some(number(0.0))),
        try_stmt(
            vec![throw(number(42.0))],
            Some(("e", vec![expr_stmt(assign(ident("r"), ident("e")))])),
            None,
        ),
        expr_stmt(ident("r")),
    ]);
    assert_eq!(v.as_number(), Some(42.0));
}

#[test]
fn stack_overflow_raises_range_error() {
    let v = eval(vec![
        var("r", Some(string(""))),
        func_decl("spin", &[], vec![ret(Some(call(ident("spin"), vec![])))]),
        try_stmt(
            vec![expr_stmt(call(ident("spin"), vec![]))],
            Some(("e", vec![expr_stmt(assign(
                ident("r"),
                member(ident("e"), "name"),
            ))])),
            None,
        ),
        expr_stmt(ident("r")),
    ]);
    assert_eq!(v.as_str(), Some("RangeError"));
}
