//! Functions: hoisting, closures, calls, constructors, `this`.

use jsmud::ast::build::*;
use jsmud::ast::{BinaryOp, UpdateOp};
use jsmud::Value;

use crate::eval;

#[test]
fn function_declaration_and_call() {
    let v = eval(vec![
        func_decl(
            "add",
            &["a", "b"],
            vec![ret(Some(binary(BinaryOp::Add, ident("a"), ident("b"))))],
        ),
        expr_stmt(call(ident("add"), vec![number(1.0), number(2.0)])),
    ]);
    assert_eq!(v.as_number(), Some(3.0));
}

#[test]
fn function_is_callable_before_its_declaration() {
    // Declarations bind at scope entry, so earlier statements see them.
    let v = eval(vec![
        var("r", Some(call(ident("later"), vec![]))),
        func_decl("later", &[], vec![ret(Some(string("bound early")))]),
        expr_stmt(ident("r")),
    ]);
    assert_eq!(v.as_str(), Some("bound early"));
}

#[test]
fn hoisted_var_is_undefined_before_initializer() {
    // typeof x before `var x = 1` sees the hoisted undefined binding.
    let v = eval(vec![
        var(
            "probe",
            Some(unary(jsmud::ast::UnaryOp::TypeOf, ident("x"))),
        ),
        var("x", Some(number(1.0))),
        expr_stmt(ident("probe")),
    ]);
    assert_eq!(v.as_str(), Some("undefined"));
}

#[test]
fn hoisting_reaches_into_nested_statements() {
    // if (false) { var deep; } — deep still exists, as undefined.
    let v = eval(vec![
        if_stmt(boolean(false), vec![var("deep", Some(number(1.0)))], None),
        expr_stmt(unary(jsmud::ast::UnaryOp::TypeOf, ident("deep"))),
    ]);
    assert_eq!(v.as_str(), Some("undefined"));
}

#[test]
fn closures_capture_environment() {
    // function counter() { var n = 0; return function() { n++; return n; }; }
    let v = eval(vec![
        func_decl(
            "counter",
            &[],
            vec![
                var("n", Some(number(0.0))),
                ret(Some(func_expr(
                    None,
                    &[],
                    vec![
                        expr_stmt(update(UpdateOp::Increment, false, ident("n"))),
                        ret(Some(ident("n"))),
                    ],
                ))),
            ],
        ),
        var("c", Some(call(ident("counter"), vec![]))),
        expr_stmt(call(ident("c"), vec![])),
        expr_stmt(call(ident("c"), vec![])),
        expr_stmt(call(ident("c"), vec![])),
    ]);
    assert_eq!(v.as_number(), Some(3.0));
}

#[test]
fn recursion() {
    // function fact(n) { if (n < 2) return 1; return n * fact(n - 1); }
    let v = eval(vec![
        func_decl(
            "fact",
            &["n"],
            vec![
                if_stmt(
                    binary(BinaryOp::Less, ident("n"), number(2.0)),
                    vec![ret(Some(number(1.0)))],
                    None,
                ),
                ret(Some(binary(
                    BinaryOp::Mul,
                    ident("n"),
                    call(
                        ident("fact"),
                        vec![binary(BinaryOp::Sub, ident("n"), number(1.0))],
                    ),
                ))),
            ],
        ),
        expr_stmt(call(ident("fact"), vec![number(6.0)])),
    ]);
    assert_eq!(v.as_number(), Some(720.0));
}

#[test]
fn named_function_expression_sees_itself() {
    let v = eval(vec![
        var(
            "f",
            Some(func_expr(
                Some("self_"),
                &["n"],
                vec![
                    if_stmt(
                        binary(BinaryOp::Less, ident("n"), number(1.0)),
                        vec![ret(Some(number(0.0)))],
                        None,
                    ),
                    ret(Some(binary(
                        BinaryOp::Add,
                        number(1.0),
                        call(
                            ident("self_"),
                            vec![binary(BinaryOp::Sub, ident("n"), number(1.0))],
                        ),
                    ))),
                ],
            )),
        ),
        expr_stmt(call(ident("f"), vec![number(4.0)])),
    ]);
    assert_eq!(v.as_number(), Some(4.0));
}

#[test]
fn missing_arguments_are_undefined() {
    let v = eval(vec![
        func_decl(
            "probe",
            &["a", "b"],
            vec![ret(Some(unary(jsmud::ast::UnaryOp::TypeOf, ident("b"))))],
        ),
        expr_stmt(call(ident("probe"), vec![number(1.0)])),
    ]);
    assert_eq!(v.as_str(), Some("undefined"));
}

#[test]
fn arguments_object_is_array_like() {
    // function f() { return arguments.length + ":" + arguments[1]; }
    let v = eval(vec![
        func_decl(
            "f",
            &[],
            vec![ret(Some(binary(
                BinaryOp::Add,
                binary(
                    BinaryOp::Add,
                    member(ident("arguments"), "length"),
                    string(":"),
                ),
                index(ident("arguments"), number(1.0)),
            )))],
        ),
        expr_stmt(call(
            ident("f"),
            vec![string("x"), string("y"), string("z")],
        )),
    ]);
    assert_eq!(v.as_str(), Some("3:y"));
}

#[test]
fn method_call_binds_this() {
    use jsmud::ast::Expression;
    let this_n = Expression::Member(jsmud::ast::MemberExpression {
        object: std::rc::Rc::new(Expression::This),
        property: jsmud::ast::MemberProperty::Static("n".to_string()),
    });
    let v = eval(vec![
        var(
            "o",
            Some(object(vec![
                ("n", number(41.0)),
                (
                    "bump",
                    func_expr(
                        None,
                        &[],
                        vec![ret(Some(binary(BinaryOp::Add, this_n, number(1.0))))],
                    ),
                ),
            ])),
        ),
        expr_stmt(call(member(ident("o"), "bump"), vec![])),
    ]);
    assert_eq!(v.as_number(), Some(42.0));
}

#[test]
fn plain_call_this_is_undefined() {
    use jsmud::ast::Expression;
    let typeof_this = unary(
        jsmud::ast::UnaryOp::TypeOf,
        Expression::This,
    );
    let v = eval(vec![
        func_decl("f", &[], vec![ret(Some(typeof_this))]),
        expr_stmt(call(ident("f"), vec![])),
    ]);
    assert_eq!(v.as_str(), Some("undefined"));
}

#[test]
fn new_builds_instance_with_prototype_chain() {
    use jsmud::ast::Expression;
    // function Point(x) { this.x = x; }
    // Point.prototype.getX = function() { return this.x; };
    // var p = new Point(7); p.getX() + (p instanceof Point ? 100 : 0)
    let this_x_set = expr_stmt(assign(
        Expression::Member(jsmud::ast::MemberExpression {
            object: std::rc::Rc::new(Expression::This),
            property: jsmud::ast::MemberProperty::Static("x".to_string()),
        }),
        ident("x"),
    ));
    let this_x_get = Expression::Member(jsmud::ast::MemberExpression {
        object: std::rc::Rc::new(Expression::This),
        property: jsmud::ast::MemberProperty::Static("x".to_string()),
    });
    let v = eval(vec![
        func_decl("Point", &["x"], vec![this_x_set]),
        expr_stmt(assign(
            member(member(ident("Point"), "prototype"), "getX"),
            func_expr(None, &[], vec![ret(Some(this_x_get))]),
        )),
        var("p", Some(new_expr(ident("Point"), vec![number(7.0)]))),
        expr_stmt(binary(
            BinaryOp::Add,
            call(member(ident("p"), "getX"), vec![]),
            conditional(
                binary(BinaryOp::InstanceOf, ident("p"), ident("Point")),
                number(100.0),
                number(0.0),
            ),
        )),
    ]);
    assert_eq!(v.as_number(), Some(107.0));
}

#[test]
fn constructor_object_return_overrides_this() {
    let v = eval(vec![
        func_decl(
            "Maker",
            &[],
            vec![ret(Some(object(vec![("custom", boolean(true))])))],
        ),
        var("m", Some(new_expr(ident("Maker"), vec![]))),
        expr_stmt(member(ident("m"), "custom")),
    ]);
    assert_eq!(v, Value::Boolean(true));
}

#[test]
fn calling_a_non_function_throws_type_error() {
    let v = eval(vec![
        var("r", Some(string(""))),
        try_stmt(
            vec![expr_stmt(call(number(5.0), vec![]))],
            Some(("e", vec![expr_stmt(assign(
                ident("r"),
                member(ident("e"), "name"),
            ))])),
            None,
        ),
        expr_stmt(ident("r")),
    ]);
    assert_eq!(v.as_str(), Some("TypeError"));
}
