//! Fibers: spawning, fairness, sleep, yield, blocking, kill.

use jsmud::ast::build::*;
use jsmud::ast::{AssignmentOp, BinaryOp, UpdateOp};
use jsmud::{HostHandle, IoEvent, ScopeId, ThreadStatus, Value};

use crate::{interp, run_until_idle};

fn global_num(world: &jsmud::Interpreter, name: &str) -> f64 {
    world
        .scopes
        .get_var(ScopeId::GLOBAL, name)
        .unwrap()
        .as_number()
        .unwrap()
}

#[test]
fn spawned_thread_runs_after_main() {
    let (mut world, _clock) = interp();
    let program = program_with(vec![
        var("done", Some(boolean(false))),
        expr_stmt(call(
            member(ident("Thread"), "spawn"),
            vec![func_expr(
                None,
                &[],
                vec![expr_stmt(assign(ident("done"), boolean(true)))],
            )],
        )),
    ]);
    world.load_program(&program);
    run_until_idle(&mut world);
    assert_eq!(
        world.scopes.get_var(ScopeId::GLOBAL, "done").unwrap(),
        Value::Boolean(true)
    );
}

fn program_with(stmts: Vec<jsmud::ast::Statement>) -> jsmud::ast::Program {
    jsmud::ast::build::program(stmts)
}

#[test]
fn round_robin_interleaves_two_counters() {
    // Two fibers each bump their own counter and yield; with a small budget
    // neither can starve the other.
    let (mut world, _clock) = interp();
    world.config.step_budget = 20;
    let worker = |counter: &str| {
        func_expr(
            None,
            &[],
            vec![while_stmt(
                binary(BinaryOp::Less, ident(counter), number(50.0)),
                vec![
                    expr_stmt(update(UpdateOp::Increment, false, ident(counter))),
                    expr_stmt(call(member(ident("Thread"), "yield"), vec![])),
                ],
            )],
        )
    };
    let program = program_with(vec![
        var("a", Some(number(0.0))),
        var("b", Some(number(0.0))),
        expr_stmt(call(member(ident("Thread"), "spawn"), vec![worker("a")])),
        expr_stmt(call(member(ident("Thread"), "spawn"), vec![worker("b")])),
    ]);
    world.load_program(&program);

    // After a modest number of ticks both counters have moved.
    for _ in 0..40 {
        world.tick();
    }
    let a = global_num(&world, "a");
    let b = global_num(&world, "b");
    assert!(a > 0.0 && b > 0.0, "both fibers progressed: a={a} b={b}");
    assert!((a - b).abs() <= 2.0, "fair interleaving: a={a} b={b}");

    run_until_idle(&mut world);
    assert_eq!(global_num(&world, "a"), 50.0);
    assert_eq!(global_num(&world, "b"), 50.0);
}

#[test]
fn sleep_parks_until_clock_advances() {
    let (mut world, clock) = interp();
    let program = program_with(vec![
        var("woke", Some(boolean(false))),
        expr_stmt(call(
            member(ident("Thread"), "spawn"),
            vec![func_expr(
                None,
                &[],
                vec![
                    expr_stmt(call(
                        member(ident("Thread"), "sleep"),
                        vec![number(100.0)],
                    )),
                    expr_stmt(assign(ident("woke"), boolean(true))),
                ],
            )],
        )),
    ]);
    world.load_program(&program);
    run_until_idle(&mut world);
    assert_eq!(
        world.scopes.get_var(ScopeId::GLOBAL, "woke").unwrap(),
        Value::Boolean(false)
    );

    clock.advance(50.0);
    run_until_idle(&mut world);
    assert_eq!(
        world.scopes.get_var(ScopeId::GLOBAL, "woke").unwrap(),
        Value::Boolean(false)
    );

    clock.advance(60.0);
    run_until_idle(&mut world);
    assert_eq!(
        world.scopes.get_var(ScopeId::GLOBAL, "woke").unwrap(),
        Value::Boolean(true)
    );
}

#[test]
fn sleepers_wake_in_deadline_order() {
    let (mut world, clock) = interp();
    let sleeper = |ms: f64, tag: &str| {
        func_expr(
            None,
            &[],
            vec![
                expr_stmt(call(member(ident("Thread"), "sleep"), vec![number(ms)])),
                expr_stmt(assign_op(AssignmentOp::AddAssign, ident("order"), string(tag))),
            ],
        )
    };
    let program = program_with(vec![
        var("order", Some(string(""))),
        expr_stmt(call(
            member(ident("Thread"), "spawn"),
            vec![sleeper(30.0, "slow")],
        )),
        expr_stmt(call(
            member(ident("Thread"), "spawn"),
            vec![sleeper(10.0, "fast")],
        )),
    ]);
    world.load_program(&program);
    run_until_idle(&mut world);
    clock.advance(100.0);
    run_until_idle(&mut world);
    let order = world.scopes.get_var(ScopeId::GLOBAL, "order").unwrap();
    assert_eq!(order.as_str(), Some("fastslow"));
}

#[test]
fn blocked_thread_wakes_on_io_readiness() {
    fn recv(
        interp: &mut jsmud::Interpreter,
        _this: Value,
        _args: &[Value],
    ) -> Result<Value, jsmud::NativeError> {
        interp.block_current_thread(HostHandle(3));
        Ok(Value::Undefined)
    }

    let (mut world, _clock) = interp();
    let recv_fn = world.register_native("host.recv", recv, 0);
    world.bind_global("recv", Value::Object(recv_fn));

    let program = program_with(vec![
        var("got", Some(boolean(false))),
        expr_stmt(call(ident("recv"), vec![])),
        expr_stmt(assign(ident("got"), boolean(true))),
    ]);
    let main = world.load_program(&program);
    run_until_idle(&mut world);
    assert_eq!(
        world.scheduler.get(main).unwrap().status,
        ThreadStatus::Blocked
    );

    // Readiness on a different handle does nothing.
    world.io_ready(IoEvent {
        handle: HostHandle(9),
    });
    run_until_idle(&mut world);
    assert_eq!(
        world.scopes.get_var(ScopeId::GLOBAL, "got").unwrap(),
        Value::Boolean(false)
    );

    world.io_ready(IoEvent {
        handle: HostHandle(3),
    });
    run_until_idle(&mut world);
    assert_eq!(
        world.scopes.get_var(ScopeId::GLOBAL, "got").unwrap(),
        Value::Boolean(true)
    );
}

#[test]
fn killed_thread_skips_finally() {
    let (mut world, clock) = interp();
    let program = program_with(vec![
        var("cleanup", Some(boolean(false))),
        var(
            "t",
            Some(call(
                member(ident("Thread"), "spawn"),
                vec![func_expr(
                    None,
                    &[],
                    vec![try_stmt(
                        vec![
                            while_stmt(
                                boolean(true),
                                vec![expr_stmt(call(
                                    member(ident("Thread"), "sleep"),
                                    vec![number(10.0)],
                                ))],
                            ),
                        ],
                        None,
                        Some(vec![expr_stmt(assign(ident("cleanup"), boolean(true)))]),
                    )],
                )],
            )),
        ),
    ]);
    world.load_program(&program);
    run_until_idle(&mut world);

    // Kill through the user-level builtin.
    let kill_program = program_with(vec![expr_stmt(call(
        member(ident("Thread"), "kill"),
        vec![ident("t")],
    ))]);
    world.load_program(&kill_program);
    run_until_idle(&mut world);
    clock.advance(1000.0);
    run_until_idle(&mut world);

    // The fiber is done and its finally block never ran.
    assert_eq!(
        world.scopes.get_var(ScopeId::GLOBAL, "cleanup").unwrap(),
        Value::Boolean(false)
    );
    let all_done = world
        .scheduler
        .threads()
        .iter()
        .all(|t| t.status == ThreadStatus::Done);
    assert!(all_done);
}

#[test]
fn spawn_passes_arguments() {
    let (mut world, _clock) = interp();
    let program = program_with(vec![
        var("sum", Some(number(0.0))),
        expr_stmt(call(
            member(ident("Thread"), "spawn"),
            vec![
                func_expr(
                    None,
                    &["a", "b"],
                    vec![expr_stmt(assign(
                        ident("sum"),
                        binary(BinaryOp::Add, ident("a"), ident("b")),
                    ))],
                ),
                number(20.0),
                number(22.0),
            ],
        )),
    ]);
    world.load_program(&program);
    run_until_idle(&mut world);
    assert_eq!(global_num(&world, "sum"), 42.0);
}
