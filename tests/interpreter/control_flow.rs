//! Statements: branches, loops, switch, labels, try/catch/finally.

use std::rc::Rc;

use jsmud::ast::build::*;
use jsmud::ast::{
    BinaryOp, BreakStatement, ContinueStatement, DoWhileStatement, ForInLeft, ForInStatement,
    LabeledStatement, Statement, SwitchCase, SwitchStatement, UpdateOp,
};
use jsmud::Value;

use crate::eval;

fn brk() -> Statement {
    Statement::Break(BreakStatement { label: None })
}

fn brk_label(l: &str) -> Statement {
    Statement::Break(BreakStatement {
        label: Some(l.to_string()),
    })
}

fn cont() -> Statement {
    Statement::Continue(ContinueStatement { label: None })
}

#[test]
fn if_else_branches() {
    let v = eval(vec![
        var("x", Some(number(1.0))),
        if_stmt(
            binary(BinaryOp::Greater, ident("x"), number(0.0)),
            vec![expr_stmt(assign(ident("x"), string("pos")))],
            Some(vec![expr_stmt(assign(ident("x"), string("neg")))]),
        ),
        expr_stmt(ident("x")),
    ]);
    assert_eq!(v.as_str(), Some("pos"));
}

#[test]
fn while_loop_counts() {
    let v = eval(vec![
        var("i", Some(number(0.0))),
        while_stmt(
            binary(BinaryOp::Less, ident("i"), number(10.0)),
            vec![expr_stmt(update(UpdateOp::Increment, false, ident("i")))],
        ),
        expr_stmt(ident("i")),
    ]);
    assert_eq!(v.as_number(), Some(10.0));
}

#[test]
fn do_while_runs_body_at_least_once() {
    let body = vec![expr_stmt(update(UpdateOp::Increment, false, ident("i")))];
    let v = eval(vec![
        var("i", Some(number(0.0))),
        Statement::DoWhile(DoWhileStatement {
            body: Rc::new(Statement::Block(block(body))),
            test: Rc::new(boolean(false)),
        }),
        expr_stmt(ident("i")),
    ]);
    assert_eq!(v.as_number(), Some(1.0));
}

#[test]
fn for_loop_with_init_test_update() {
    let v = eval(vec![
        var("sum", Some(number(0.0))),
        for_stmt(
            Some(var("i", Some(number(0.0)))),
            Some(binary(BinaryOp::Less, ident("i"), number(5.0))),
            Some(update(UpdateOp::Increment, false, ident("i"))),
            vec![expr_stmt(assign_op(
                jsmud::ast::AssignmentOp::AddAssign,
                ident("sum"),
                ident("i"),
            ))],
        ),
        expr_stmt(ident("sum")),
    ]);
    assert_eq!(v.as_number(), Some(10.0));
}

#[test]
fn break_and_continue() {
    // for (i=0; i<10; i++) { if (i==3) continue; if (i==6) break; sum+=i }
    let v = eval(vec![
        var("sum", Some(number(0.0))),
        for_stmt(
            Some(var("i", Some(number(0.0)))),
            Some(binary(BinaryOp::Less, ident("i"), number(10.0))),
            Some(update(UpdateOp::Increment, false, ident("i"))),
            vec![
                if_stmt(
                    binary(BinaryOp::StrictEqual, ident("i"), number(3.0)),
                    vec![cont()],
                    None,
                ),
                if_stmt(
                    binary(BinaryOp::StrictEqual, ident("i"), number(6.0)),
                    vec![brk()],
                    None,
                ),
                expr_stmt(assign_op(
                    jsmud::ast::AssignmentOp::AddAssign,
                    ident("sum"),
                    ident("i"),
                )),
            ],
        ),
        expr_stmt(ident("sum")),
    ]);
    // 0+1+2+4+5 = 12
    assert_eq!(v.as_number(), Some(12.0));
}

#[test]
fn labeled_break_exits_outer_loop() {
    // outer: while (true) { while (true) { break outer; } count++ } — count stays 0
    let inner = while_stmt(boolean(true), vec![brk_label("outer")]);
    let outer = Statement::Labeled(LabeledStatement {
        label: "outer".to_string(),
        body: Rc::new(while_stmt(
            boolean(true),
            vec![
                inner,
                expr_stmt(update(UpdateOp::Increment, false, ident("count"))),
            ],
        )),
    });
    let v = eval(vec![
        var("count", Some(number(0.0))),
        outer,
        expr_stmt(ident("count")),
    ]);
    assert_eq!(v.as_number(), Some(0.0));
}

#[test]
fn switch_matches_and_falls_through() {
    // switch (2) { case 1: r+="a"; case 2: r+="b"; case 3: r+="c"; break; default: r+="d" }
    let case = |test: Option<jsmud::ast::Expression>, body: Vec<Statement>| SwitchCase {
        test: test.map(Rc::new),
        consequent: body.into(),
    };
    let append = |s: &str| {
        expr_stmt(assign_op(
            jsmud::ast::AssignmentOp::AddAssign,
            ident("r"),
            string(s),
        ))
    };
    let v = eval(vec![
        var("r", Some(string(""))),
        Statement::Switch(SwitchStatement {
            discriminant: Rc::new(number(2.0)),
            cases: vec![
                case(Some(number(1.0)), vec![append("a")]),
                case(Some(number(2.0)), vec![append("b")]),
                case(Some(number(3.0)), vec![append("c"), brk()]),
                case(None, vec![append("d")]),
            ]
            .into(),
        }),
        expr_stmt(ident("r")),
    ]);
    assert_eq!(v.as_str(), Some("bc"));
}

#[test]
fn switch_uses_default_when_nothing_matches() {
    let case = |test: Option<jsmud::ast::Expression>, body: Vec<Statement>| SwitchCase {
        test: test.map(Rc::new),
        consequent: body.into(),
    };
    let v = eval(vec![
        var("r", Some(string("none"))),
        Statement::Switch(SwitchStatement {
            discriminant: Rc::new(number(9.0)),
            cases: vec![
                case(Some(number(1.0)), vec![expr_stmt(assign(ident("r"), string("one")))]),
                case(None, vec![expr_stmt(assign(ident("r"), string("default")))]),
            ]
            .into(),
        }),
        expr_stmt(ident("r")),
    ]);
    assert_eq!(v.as_str(), Some("default"));
}

#[test]
fn for_in_iterates_own_enumerable_keys_in_insertion_order() {
    let v = eval(vec![
        var(
            "o",
            Some(object(vec![
                ("b", number(1.0)),
                ("a", number(2.0)),
                ("c", number(3.0)),
            ])),
        ),
        var("keys", Some(string(""))),
        Statement::ForIn(ForInStatement {
            left: ForInLeft::Variable("k".to_string()),
            right: Rc::new(ident("o")),
            body: Rc::new(Statement::Block(block(vec![expr_stmt(assign_op(
                jsmud::ast::AssignmentOp::AddAssign,
                ident("keys"),
                ident("k"),
            ))]))),
        }),
        expr_stmt(ident("keys")),
    ]);
    assert_eq!(v.as_str(), Some("bac"));
}

#[test]
fn try_catch_catches_thrown_value() {
    let v = eval(vec![
        var("r", Some(string("untouched"))),
        try_stmt(
            vec![throw(string("boom")), expr_stmt(assign(ident("r"), string("after-throw")))],
            Some(("e", vec![expr_stmt(assign(ident("r"), ident("e")))])),
            None,
        ),
        expr_stmt(ident("r")),
    ]);
    assert_eq!(v.as_str(), Some("boom"));
}

#[test]
fn finally_always_runs() {
    let v = eval(vec![
        var("log", Some(string(""))),
        try_stmt(
            vec![expr_stmt(assign_op(
                jsmud::ast::AssignmentOp::AddAssign,
                ident("log"),
                string("t"),
            ))],
            None,
            Some(vec![expr_stmt(assign_op(
                jsmud::ast::AssignmentOp::AddAssign,
                ident("log"),
                string("f"),
            ))]),
        ),
        try_stmt(
            vec![throw(string("x"))],
            Some(("e", vec![expr_stmt(assign_op(
                jsmud::ast::AssignmentOp::AddAssign,
                ident("log"),
                string("c"),
            ))])),
            Some(vec![expr_stmt(assign_op(
                jsmud::ast::AssignmentOp::AddAssign,
                ident("log"),
                string("F"),
            ))]),
        ),
        expr_stmt(ident("log")),
    ]);
    assert_eq!(v.as_str(), Some("tfcF"));
}

#[test]
fn finally_overrides_completion() {
    // function f() { try { return "try"; } finally { return "finally"; } }
    let v = eval(vec![
        func_decl(
            "f",
            &[],
            vec![try_stmt(
                vec![ret(Some(string("try")))],
                None,
                Some(vec![ret(Some(string("finally")))]),
            )],
        ),
        expr_stmt(call(ident("f"), vec![])),
    ]);
    assert_eq!(v.as_str(), Some("finally"));
}

#[test]
fn return_threads_through_finally() {
    // function f() { try { return 1; } finally { log += "f"; } }
    let v = eval(vec![
        var("log", Some(string(""))),
        func_decl(
            "f",
            &[],
            vec![try_stmt(
                vec![ret(Some(number(1.0)))],
                None,
                Some(vec![expr_stmt(assign_op(
                    jsmud::ast::AssignmentOp::AddAssign,
                    ident("log"),
                    string("f"),
                ))]),
            )],
        ),
        var("r", Some(call(ident("f"), vec![]))),
        expr_stmt(binary(BinaryOp::Add, ident("log"), ident("r"))),
    ]);
    assert_eq!(v.as_str(), Some("f1"));
}

#[test]
fn empty_statement_is_noop() {
    let v = eval(vec![
        Statement::Empty,
        expr_stmt(number(7.0)),
        Statement::Empty,
    ]);
    assert_eq!(v, Value::Number(7.0));
}
