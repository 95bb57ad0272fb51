//! Iterable weak containers: lifetime, drop-on-observation, ordering.

use jsmud::ast::build::*;
use jsmud::ast::BinaryOp;
use jsmud::Value;

use crate::{eval, eval_in, interp};

/// Three members, one loses its last strong reference, the collector runs:
/// size goes 3 -> 2 and iteration yields the survivors in insertion order.
#[test]
fn weak_set_drops_collected_members() {
    let (mut world, _clock) = interp();
    eval_in(
        &mut world,
        vec![
            var("a", Some(object(vec![("tag", string("a"))]))),
            var("b", Some(object(vec![("tag", string("b"))]))),
            var("c", Some(object(vec![("tag", string("c"))]))),
            var("ws", Some(new_expr(ident("WeakSet"), vec![]))),
            expr_stmt(call(member(ident("ws"), "add"), vec![ident("a")])),
            expr_stmt(call(member(ident("ws"), "add"), vec![ident("b")])),
            expr_stmt(call(member(ident("ws"), "add"), vec![ident("c")])),
        ],
    );

    let size_before = eval_in(
        &mut world,
        vec![expr_stmt(call(member(ident("ws"), "size"), vec![]))],
    );
    assert_eq!(world.thread_result(size_before).unwrap().as_number(), Some(3.0));

    // Drop the only strong reference to b, then force a collection.
    eval_in(
        &mut world,
        vec![expr_stmt(assign(ident("b"), ident("undefined")))],
    );
    world.collect();

    let size_after = eval_in(
        &mut world,
        vec![expr_stmt(call(member(ident("ws"), "size"), vec![]))],
    );
    assert_eq!(world.thread_result(size_after).unwrap().as_number(), Some(2.0));

    // Iteration preserves insertion order over the survivors.
    let order = eval_in(
        &mut world,
        vec![
            var("vals", Some(call(member(ident("ws"), "values"), vec![]))),
            expr_stmt(binary(
                BinaryOp::Add,
                member(index(ident("vals"), number(0.0)), "tag"),
                member(index(ident("vals"), number(1.0)), "tag"),
            )),
        ],
    );
    assert_eq!(world.thread_result(order).unwrap().as_str(), Some("ac"));

    // Identity check: the surviving members are the original objects.
    let identity = eval_in(
        &mut world,
        vec![expr_stmt(binary(
            BinaryOp::StrictEqual,
            index(call(member(ident("ws"), "values"), vec![]), number(0.0)),
            ident("a"),
        ))],
    );
    assert_eq!(world.thread_result(identity).unwrap(), Value::Boolean(true));
}

#[test]
fn weak_map_api() {
    let v = eval(vec![
        var("k", Some(object(vec![]))),
        var("wm", Some(new_expr(ident("WeakMap"), vec![]))),
        expr_stmt(call(
            member(ident("wm"), "set"),
            vec![ident("k"), string("payload")],
        )),
        expr_stmt(binary(
            BinaryOp::Add,
            call(member(ident("wm"), "get"), vec![ident("k")]),
            conditional(
                call(member(ident("wm"), "has"), vec![ident("k")]),
                string("+has"),
                string("+missing"),
            ),
        )),
    ]);
    assert_eq!(v.as_str(), Some("payload+has"));

    let v = eval(vec![
        var("k", Some(object(vec![]))),
        var("wm", Some(new_expr(ident("WeakMap"), vec![]))),
        expr_stmt(call(
            member(ident("wm"), "set"),
            vec![ident("k"), number(1.0)],
        )),
        expr_stmt(call(member(ident("wm"), "delete"), vec![ident("k")])),
        expr_stmt(call(member(ident("wm"), "size"), vec![])),
    ]);
    assert_eq!(v.as_number(), Some(0.0));
}

#[test]
fn weak_map_rejects_primitive_keys() {
    let v = eval(vec![
        var("wm", Some(new_expr(ident("WeakMap"), vec![]))),
        var("r", Some(string(""))),
        try_stmt(
            vec![expr_stmt(call(
                member(ident("wm"), "set"),
                vec![number(1.0), number(2.0)],
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

/// A weak-map value lives exactly as long as its key does.
#[test]
fn weak_map_values_follow_key_lifetime() {
    let (mut world, _clock) = interp();
    eval_in(
        &mut world,
        vec![
            var("k", Some(object(vec![]))),
            var("wm", Some(new_expr(ident("WeakMap"), vec![]))),
            // The value object has no other strong reference.
            expr_stmt(call(
                member(ident("wm"), "set"),
                vec![ident("k"), object(vec![("alive", boolean(true))])],
            )),
        ],
    );
    world.collect();

    // Key still strong: value retrievable after collection.
    let alive = eval_in(
        &mut world,
        vec![expr_stmt(member(
            call(member(ident("wm"), "get"), vec![ident("k")]),
            "alive",
        ))],
    );
    assert_eq!(world.thread_result(alive).unwrap(), Value::Boolean(true));

    // Drop the key: the entry disappears at the next observation.
    eval_in(
        &mut world,
        vec![expr_stmt(assign(ident("k"), ident("undefined")))],
    );
    world.collect();
    let size = eval_in(
        &mut world,
        vec![expr_stmt(call(member(ident("wm"), "size"), vec![]))],
    );
    assert_eq!(world.thread_result(size).unwrap().as_number(), Some(0.0));
}

/// Containers themselves are ordinary objects: strong entries in Map keep
/// their referents, weak entries do not.
#[test]
fn strong_map_keeps_entries_weak_set_does_not() {
    let (mut world, _clock) = interp();
    eval_in(
        &mut world,
        vec![
            var("m", Some(new_expr(ident("Map"), vec![]))),
            var("ws", Some(new_expr(ident("WeakSet"), vec![]))),
            expr_stmt(call(
                member(ident("m"), "set"),
                vec![string("strong"), object(vec![])],
            )),
            expr_stmt(call(
                member(ident("ws"), "add"),
                vec![object(vec![])],
            )),
        ],
    );
    world.collect();

    let sizes = eval_in(
        &mut world,
        vec![expr_stmt(binary(
            BinaryOp::Add,
            call(member(ident("m"), "size"), vec![]),
            call(member(ident("ws"), "size"), vec![]),
        ))],
    );
    assert_eq!(world.thread_result(sizes).unwrap().as_number(), Some(1.0));
}
