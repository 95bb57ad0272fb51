//! Integration tests for the interpreter, organized by feature.
//!
//! Programs are assembled with `ast::build` since parsing is a host
//! collaborator. The shared helpers run a program on a fresh interpreter
//! with a manually-advanced clock and hand back the completion value.

mod basics;
mod control_flow;
mod errors;
mod functions;
mod objects;
mod scheduler;
mod snapshot;
mod weak;

use std::rc::Rc;

use jsmud::ast::{build, Statement};
use jsmud::{Interpreter, ManualClock, ThreadId, Value};

/// A fresh interpreter plus the clock handle that drives it.
pub fn interp() -> (Interpreter, Rc<ManualClock>) {
    let clock = Rc::new(ManualClock::new());
    (Interpreter::new(Box::new(clock.clone())), clock)
}

/// Load and run a program to completion; returns the completion value.
pub fn eval(stmts: Vec<Statement>) -> Value {
    let (mut interp, _clock) = interp();
    let main = eval_in(&mut interp, stmts);
    interp.thread_result(main).expect("main thread exists")
}

/// Load and run a program on an existing interpreter.
pub fn eval_in(interp: &mut Interpreter, stmts: Vec<Statement>) -> ThreadId {
    let program = build::program(stmts);
    let id = interp.load_program(&program);
    run_until_idle(interp);
    id
}

/// Drive until no thread is runnable (sleepers may remain parked).
pub fn run_until_idle(interp: &mut Interpreter) {
    for _ in 0..10_000 {
        if interp.run(10_000) == 0 {
            return;
        }
    }
    panic!("program did not settle within the step budget");
}

