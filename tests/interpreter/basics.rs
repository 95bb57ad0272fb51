//! Expressions, coercion, and completion values.

use jsmud::ast::build::*;
use jsmud::ast::{AssignmentOp, BinaryOp, LogicalOp, UnaryOp, UpdateOp};
use jsmud::Value;

use crate::eval;

#[test]
fn arithmetic_completion_value() {
    // (3 + 12/4) * (10 - 3) = 42
    let v = eval(vec![expr_stmt(binary(
        BinaryOp::Mul,
        binary(
            BinaryOp::Add,
            number(3.0),
            binary(BinaryOp::Div, number(12.0), number(4.0)),
        ),
        binary(BinaryOp::Sub, number(10.0), number(3.0)),
    ))]);
    assert_eq!(v.as_number(), Some(42.0));
}

#[test]
fn var_declare_assign_read() {
    let v = eval(vec![
        var("x", Some(number(0.0))),
        expr_stmt(assign(ident("x"), number(44.0))),
        expr_stmt(ident("x")),
    ]);
    assert_eq!(v.as_number(), Some(44.0));
}

#[test]
fn string_concat_coerces() {
    let v = eval(vec![expr_stmt(binary(
        BinaryOp::Add,
        string("answer: "),
        number(42.0),
    ))]);
    assert_eq!(v.as_str(), Some("answer: 42"));
}

#[test]
fn loose_and_strict_equality() {
    let loose = eval(vec![expr_stmt(binary(
        BinaryOp::Equal,
        string("1"),
        number(1.0),
    ))]);
    assert_eq!(loose, Value::Boolean(true));

    let strict = eval(vec![expr_stmt(binary(
        BinaryOp::StrictEqual,
        string("1"),
        number(1.0),
    ))]);
    assert_eq!(strict, Value::Boolean(false));

    let null_undef = eval(vec![expr_stmt(binary(
        BinaryOp::Equal,
        null(),
        ident("undefined"),
    ))]);
    assert_eq!(null_undef, Value::Boolean(true));
}

#[test]
fn negative_zero_equals_zero_but_prints_plain() {
    let v = eval(vec![expr_stmt(binary(
        BinaryOp::StrictEqual,
        unary(UnaryOp::Minus, number(0.0)),
        number(0.0),
    ))]);
    assert_eq!(v, Value::Boolean(true));

    let s = eval(vec![expr_stmt(binary(
        BinaryOp::Add,
        string(""),
        unary(UnaryOp::Minus, number(0.0)),
    ))]);
    assert_eq!(s.as_str(), Some("0"));
}

#[test]
fn short_circuit_never_evaluates_right() {
    let v = eval(vec![
        var("touched", Some(boolean(false))),
        expr_stmt(logical(
            LogicalOp::And,
            boolean(false),
            assign(ident("touched"), boolean(true)),
        )),
        expr_stmt(ident("touched")),
    ]);
    assert_eq!(v, Value::Boolean(false));

    let v = eval(vec![
        var("touched", Some(boolean(false))),
        expr_stmt(logical(
            LogicalOp::Or,
            boolean(true),
            assign(ident("touched"), boolean(true)),
        )),
        expr_stmt(ident("touched")),
    ]);
    assert_eq!(v, Value::Boolean(false));
}

#[test]
fn logical_yields_operand_value() {
    let v = eval(vec![expr_stmt(logical(
        LogicalOp::Or,
        string(""),
        string("fallback"),
    ))]);
    assert_eq!(v.as_str(), Some("fallback"));

    let v = eval(vec![expr_stmt(logical(
        LogicalOp::And,
        number(1.0),
        string("right"),
    ))]);
    assert_eq!(v.as_str(), Some("right"));
}

#[test]
fn typeof_unresolved_identifier_is_undefined_not_throw() {
    let v = eval(vec![expr_stmt(unary(UnaryOp::TypeOf, ident("nope")))]);
    assert_eq!(v.as_str(), Some("undefined"));
}

#[test]
fn typeof_classifies() {
    let v = eval(vec![expr_stmt(unary(UnaryOp::TypeOf, number(1.0)))]);
    assert_eq!(v.as_str(), Some("number"));
    let v = eval(vec![expr_stmt(unary(UnaryOp::TypeOf, null()))]);
    assert_eq!(v.as_str(), Some("object"));
    let v = eval(vec![expr_stmt(unary(
        UnaryOp::TypeOf,
        func_expr(None, &[], vec![]),
    ))]);
    assert_eq!(v.as_str(), Some("function"));
}

#[test]
fn update_prefix_and_postfix() {
    let v = eval(vec![
        var("i", Some(number(5.0))),
        expr_stmt(update(UpdateOp::Increment, false, ident("i"))),
    ]);
    assert_eq!(v.as_number(), Some(5.0));

    let v = eval(vec![
        var("i", Some(number(5.0))),
        expr_stmt(update(UpdateOp::Increment, true, ident("i"))),
    ]);
    assert_eq!(v.as_number(), Some(6.0));
}

#[test]
fn compound_assignment() {
    let v = eval(vec![
        var("x", Some(number(10.0))),
        expr_stmt(assign_op(AssignmentOp::AddAssign, ident("x"), number(4.0))),
        expr_stmt(ident("x")),
    ]);
    assert_eq!(v.as_number(), Some(14.0));
}

#[test]
fn sequence_yields_last() {
    use jsmud::ast::{Expression, SequenceExpression};
    use std::rc::Rc;
    let seq = Expression::Sequence(SequenceExpression {
        expressions: vec![
            Rc::new(number(1.0)),
            Rc::new(number(2.0)),
            Rc::new(number(3.0)),
        ]
        .into(),
    });
    let v = eval(vec![expr_stmt(seq)]);
    assert_eq!(v.as_number(), Some(3.0));
}

#[test]
fn string_to_number_rules() {
    let v = eval(vec![expr_stmt(unary(UnaryOp::Plus, string("  42  ")))]);
    assert_eq!(v.as_number(), Some(42.0));
    let v = eval(vec![expr_stmt(unary(UnaryOp::Plus, string("")))]);
    assert_eq!(v.as_number(), Some(0.0));
    let v = eval(vec![expr_stmt(unary(UnaryOp::Plus, string("12px")))]);
    assert!(v.as_number().unwrap().is_nan());
}

#[test]
fn conditional_picks_branch() {
    let v = eval(vec![expr_stmt(conditional(
        binary(BinaryOp::Greater, number(2.0), number(1.0)),
        string("yes"),
        string("no"),
    ))]);
    assert_eq!(v.as_str(), Some("yes"));
}

#[test]
fn bit_ops_wrap_to_int32() {
    let v = eval(vec![expr_stmt(binary(
        BinaryOp::BitOr,
        number(4294967296.0),
        number(0.0),
    ))]);
    assert_eq!(v.as_number(), Some(0.0));

    let v = eval(vec![expr_stmt(binary(
        BinaryOp::ShiftRightUnsigned,
        number(-1.0),
        number(0.0),
    ))]);
    assert_eq!(v.as_number(), Some(4294967295.0));
}
