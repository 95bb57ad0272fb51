//! Objects, arrays, property attributes, prototypes, Map/Set.

use jsmud::ast::build::*;
use jsmud::ast::{BinaryOp, UnaryOp};
use jsmud::object::ClassTag;
use jsmud::{ScopeId, Value};

use crate::{eval, eval_in, interp};

#[test]
fn object_literal_shape() {
    // ({foo: "bar", answer: 42}) — two own properties, Object.prototype.
    let (mut world, _clock) = interp();
    let main = eval_in(
        &mut world,
        vec![expr_stmt(object(vec![
            ("foo", string("bar")),
            ("answer", number(42.0)),
        ]))],
    );
    let result = world.thread_result(main).unwrap();
    let obj_ref = result.as_object().expect("object literal result");
    let obj = world.heap.get(obj_ref).unwrap();
    assert_eq!(obj.class, ClassTag::Object);
    let keys: Vec<String> = obj
        .enumerable_keys()
        .into_iter()
        .map(|k| k.as_str().to_string())
        .collect();
    assert_eq!(keys, vec!["foo", "answer"]);
    assert_eq!(
        obj.get_own("foo").unwrap().value.as_str(),
        Some("bar")
    );
    assert_eq!(obj.get_own("answer").unwrap().value.as_number(), Some(42.0));
    assert_eq!(obj.proto, world.registry.lookup("Object.prototype"));
}

#[test]
fn member_read_write_and_computed_access() {
    let v = eval(vec![
        var("o", Some(object(vec![("a", number(1.0))]))),
        expr_stmt(assign(member(ident("o"), "b"), number(2.0))),
        expr_stmt(assign(
            index(ident("o"), string("c")),
            number(3.0),
        )),
        expr_stmt(binary(
            BinaryOp::Add,
            binary(
                BinaryOp::Add,
                member(ident("o"), "a"),
                member(ident("o"), "b"),
            ),
            index(ident("o"), string("c")),
        )),
    ]);
    assert_eq!(v.as_number(), Some(6.0));
}

#[test]
fn delete_removes_own_property() {
    let v = eval(vec![
        var("o", Some(object(vec![("a", number(1.0))]))),
        expr_stmt(unary(UnaryOp::Delete, member(ident("o"), "a"))),
        expr_stmt(binary(BinaryOp::In, string("a"), ident("o"))),
    ]);
    assert_eq!(v, Value::Boolean(false));
}

#[test]
fn in_operator_walks_prototype_chain() {
    let v = eval(vec![
        var("o", Some(object(vec![]))),
        // "constructor" lives on Object.prototype.
        expr_stmt(binary(BinaryOp::In, string("constructor"), ident("o"))),
    ]);
    assert_eq!(v, Value::Boolean(true));
}

#[test]
fn array_literal_length_and_growth() {
    let v = eval(vec![
        var(
            "a",
            Some(array(vec![number(10.0), number(20.0), number(30.0)])),
        ),
        expr_stmt(member(ident("a"), "length")),
    ]);
    assert_eq!(v.as_number(), Some(3.0));

    // Writing past the end grows length to index + 1.
    let v = eval(vec![
        var("a", Some(array(vec![number(1.0)]))),
        expr_stmt(assign(index(ident("a"), number(9.0)), number(2.0))),
        expr_stmt(member(ident("a"), "length")),
    ]);
    assert_eq!(v.as_number(), Some(10.0));
}

#[test]
fn array_length_truncates() {
    let v = eval(vec![
        var(
            "a",
            Some(array(vec![number(1.0), number(2.0), number(3.0), number(4.0)])),
        ),
        expr_stmt(assign(member(ident("a"), "length"), number(2.0))),
        expr_stmt(unary(UnaryOp::TypeOf, index(ident("a"), number(2.0)))),
    ]);
    assert_eq!(v.as_str(), Some("undefined"));
}

#[test]
fn array_push_pop_join() {
    let v = eval(vec![
        var("a", Some(array(vec![number(1.0)]))),
        expr_stmt(call(
            member(ident("a"), "push"),
            vec![number(2.0), number(3.0)],
        )),
        expr_stmt(call(member(ident("a"), "pop"), vec![])),
        expr_stmt(call(member(ident("a"), "join"), vec![string("-")])),
    ]);
    assert_eq!(v.as_str(), Some("1-2"));
}

#[test]
fn prevent_extensions_blocks_additions_not_updates() {
    let v = eval(vec![
        var("o", Some(object(vec![("a", number(1.0))]))),
        expr_stmt(call(
            member(ident("Object"), "preventExtensions"),
            vec![ident("o")],
        )),
        expr_stmt(assign(member(ident("o"), "b"), number(2.0))),
        expr_stmt(assign(member(ident("o"), "a"), number(9.0))),
        expr_stmt(binary(
            BinaryOp::Add,
            member(ident("o"), "a"),
            conditional(
                binary(BinaryOp::In, string("b"), ident("o")),
                number(100.0),
                number(0.0),
            ),
        )),
    ]);
    assert_eq!(v.as_number(), Some(9.0));
}

#[test]
fn get_and_set_prototype() {
    let v = eval(vec![
        var("base", Some(object(vec![("inherited", number(5.0))]))),
        var("o", Some(object(vec![]))),
        expr_stmt(call(
            member(ident("Object"), "setPrototypeOf"),
            vec![ident("o"), ident("base")],
        )),
        expr_stmt(member(ident("o"), "inherited")),
    ]);
    assert_eq!(v.as_number(), Some(5.0));
}

#[test]
fn prototype_cycle_is_rejected() {
    let v = eval(vec![
        var("a", Some(object(vec![]))),
        var("b", Some(object(vec![]))),
        var("r", Some(string("no-throw"))),
        expr_stmt(call(
            member(ident("Object"), "setPrototypeOf"),
            vec![ident("a"), ident("b")],
        )),
        try_stmt(
            vec![expr_stmt(call(
                member(ident("Object"), "setPrototypeOf"),
                vec![ident("b"), ident("a")],
            ))],
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

#[test]
fn object_keys_lists_enumerable_own() {
    let v = eval(vec![
        var(
            "o",
            Some(object(vec![("x", number(1.0)), ("y", number(2.0))])),
        ),
        expr_stmt(call(
            member(
                call(member(ident("Object"), "keys"), vec![ident("o")]),
                "join",
            ),
            vec![string(",")],
        )),
    ]);
    assert_eq!(v.as_str(), Some("x,y"));
}

#[test]
fn map_basic_operations() {
    let v = eval(vec![
        var("m", Some(new_expr(ident("Map"), vec![]))),
        var("key", Some(object(vec![]))),
        expr_stmt(call(
            member(ident("m"), "set"),
            vec![ident("key"), number(1.0)],
        )),
        expr_stmt(call(
            member(ident("m"), "set"),
            vec![string("s"), number(2.0)],
        )),
        expr_stmt(binary(
            BinaryOp::Add,
            call(member(ident("m"), "get"), vec![ident("key")]),
            binary(
                BinaryOp::Add,
                call(member(ident("m"), "get"), vec![string("s")]),
                call(member(ident("m"), "size"), vec![]),
            ),
        )),
    ]);
    assert_eq!(v.as_number(), Some(5.0));
}

#[test]
fn set_deduplicates() {
    let v = eval(vec![
        var("s", Some(new_expr(ident("Set"), vec![]))),
        expr_stmt(call(member(ident("s"), "add"), vec![number(1.0)])),
        expr_stmt(call(member(ident("s"), "add"), vec![number(1.0)])),
        expr_stmt(call(member(ident("s"), "add"), vec![number(2.0)])),
        expr_stmt(call(member(ident("s"), "size"), vec![])),
    ]);
    assert_eq!(v.as_number(), Some(2.0));
}

#[test]
fn date_roundtrips_timestamp() {
    let v = eval(vec![
        var("d", Some(new_expr(ident("Date"), vec![number(86400000.0)]))),
        expr_stmt(call(member(ident("d"), "getTime"), vec![])),
    ]);
    assert_eq!(v.as_number(), Some(86400000.0));
}

#[test]
fn string_members() {
    let v = eval(vec![
        var("s", Some(string("héllo"))),
        expr_stmt(binary(
            BinaryOp::Add,
            member(ident("s"), "length"),
            index(ident("s"), number(1.0)),
        )),
    ]);
    assert_eq!(v.as_str(), Some("5é"));
}

#[test]
fn member_access_on_null_throws() {
    let v = eval(vec![
        var("r", Some(string(""))),
        try_stmt(
            vec![expr_stmt(member(null(), "x"))],
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

#[test]
fn globals_are_bound() {
    let (world, _clock) = interp();
    assert!(world
        .scopes
        .get_var(ScopeId::GLOBAL, "undefined")
        .unwrap()
        .strict_equals(&Value::Undefined));
    assert!(world
        .scopes
        .get_var(ScopeId::GLOBAL, "NaN")
        .unwrap()
        .as_number()
        .unwrap()
        .is_nan());
}
