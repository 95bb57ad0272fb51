//! Checkpoint/restore: round trips, shared structure, failure taxonomy.

use jsmud::ast::build::*;
use jsmud::ast::{BinaryOp, UpdateOp};
use jsmud::{DecodeError, ScopeId, ThreadId, Value};
use serde_json::Value as Json;

use crate::{eval_in, interp, run_until_idle};

/// Snapshot after `var x = 0;` has executed, restore into a fresh world,
/// and let it finish: the final completion value is 44.
#[test]
fn resume_mid_program() {
    let (mut world, _clock) = interp();
    let program = program(vec![
        var("x", Some(number(0.0))),
        expr_stmt(assign(ident("x"), number(44.0))),
        expr_stmt(ident("x")),
    ]);
    let main = world.load_program(&program);

    // Step until the initializer has run but the program has not finished.
    loop {
        assert!(world.step(), "program ended before the checkpoint");
        let x = world.scopes.get_var(ScopeId::GLOBAL, "x").unwrap();
        if x.as_number() == Some(0.0) {
            break;
        }
    }
    let records = world.snapshot();

    let (mut fresh, _clock2) = interp();
    fresh.restore(&records).expect("restore succeeds");
    run_until_idle(&mut fresh);
    assert_eq!(fresh.thread_result(main).unwrap().as_number(), Some(44.0));
    // And the original keeps running too.
    run_until_idle(&mut world);
    assert_eq!(world.thread_result(main).unwrap().as_number(), Some(44.0));
}

/// `var a = {}; var b = [a, a];` — the two slots reference one record, and
/// identity survives the round trip.
#[test]
fn shared_substructure_is_encoded_once() {
    let (mut world, _clock) = interp();
    eval_in(
        &mut world,
        vec![
            var("a", Some(object(vec![("tag", string("shared"))]))),
            var("b", Some(array(vec![ident("a"), ident("a")]))),
        ],
    );
    let records = world.snapshot();

    // Find the array record and check both element refs point at one index.
    let array_rec = records
        .iter()
        .find_map(|r| {
            let map = r.as_object()?;
            if map.get("type")?.as_str()? != "Array" {
                return None;
            }
            let props = map.get("props")?.as_object()?;
            Some((props.get("0")?.clone(), props.get("1")?.clone()))
        })
        .expect("array record present");
    let ref_index = |j: &Json| j.as_object().unwrap().get("#").unwrap().as_u64().unwrap();
    assert_eq!(ref_index(&array_rec.0), ref_index(&array_rec.1));

    let (mut fresh, _clock2) = interp();
    fresh.restore(&records).expect("restore succeeds");
    let check = eval_in(
        &mut fresh,
        vec![expr_stmt(binary(
            BinaryOp::StrictEqual,
            index(ident("b"), number(0.0)),
            index(ident("b"), number(1.0)),
        ))],
    );
    assert_eq!(fresh.thread_result(check).unwrap(), Value::Boolean(true));
}

/// A fiber looping with sleeps continues from where the checkpoint caught it
/// and the array it appends to ends complete and gap-free.
#[test]
fn cross_checkpoint_sleep_loop() {
    const TOTAL: f64 = 200.0;

    let (mut world, clock) = interp();
    let worker = func_expr(
        None,
        &[],
        vec![
            var("i", Some(number(0.0))),
            while_stmt(
                binary(BinaryOp::Less, ident("i"), number(TOTAL)),
                vec![
                    expr_stmt(call(member(ident("arr"), "push"), vec![ident("i")])),
                    expr_stmt(call(member(ident("Thread"), "sleep"), vec![number(1.0)])),
                    expr_stmt(update(UpdateOp::Increment, false, ident("i"))),
                ],
            ),
        ],
    );
    let program = program(vec![
        var("arr", Some(array(vec![]))),
        expr_stmt(call(member(ident("Thread"), "spawn"), vec![worker])),
    ]);
    world.load_program(&program);

    let arr_len = |w: &jsmud::Interpreter| -> u32 {
        let arr = w
            .scopes
            .get_var(ScopeId::GLOBAL, "arr")
            .unwrap()
            .as_object()
            .unwrap();
        w.heap.get(arr).unwrap().array_length()
    };

    // Run until at least 50 appends happened, then checkpoint.
    while arr_len(&world) < 50 {
        run_until_idle(&mut world);
        clock.advance(1.0);
    }
    let records = world.snapshot();
    let halfway = arr_len(&world);

    let (mut fresh, clock2) = interp();
    fresh.restore(&records).expect("restore succeeds");
    assert_eq!(arr_len(&fresh), halfway);

    for _ in 0..(TOTAL as usize * 2 + 10) {
        run_until_idle(&mut fresh);
        clock2.advance(1.0);
    }
    assert_eq!(arr_len(&fresh), TOTAL as u32);

    // Gap-free: arr[i] === i for every index.
    let check = eval_in(
        &mut fresh,
        vec![
            var("ok", Some(boolean(true))),
            var("j", Some(number(0.0))),
            while_stmt(
                binary(BinaryOp::Less, ident("j"), number(TOTAL)),
                vec![
                    if_stmt(
                        binary(
                            BinaryOp::StrictNotEqual,
                            index(ident("arr"), ident("j")),
                            ident("j"),
                        ),
                        vec![expr_stmt(assign(ident("ok"), boolean(false)))],
                        None,
                    ),
                    expr_stmt(update(UpdateOp::Increment, false, ident("j"))),
                ],
            ),
            expr_stmt(ident("ok")),
        ],
    );
    assert_eq!(fresh.thread_result(check).unwrap(), Value::Boolean(true));
}

/// Snapshot, restore, snapshot again: byte-identical records.
#[test]
fn round_trip_is_deterministic() {
    let (mut world, _clock) = interp();
    eval_in(
        &mut world,
        vec![
            var("o", Some(object(vec![("n", number(1.0))]))),
            var("list", Some(array(vec![ident("o"), string("x")]))),
            func_decl("f", &["a"], vec![ret(Some(ident("a")))]),
        ],
    );
    let first = world.snapshot();

    let (mut fresh, _clock2) = interp();
    fresh.restore(&first).expect("restore succeeds");
    let second = fresh.snapshot();
    assert_eq!(first, second);
}

/// Special numbers survive a round trip bit-for-bit.
#[test]
fn numeric_fidelity() {
    let (mut world, _clock) = interp();
    eval_in(
        &mut world,
        vec![
            var("negzero", Some(unary(jsmud::ast::UnaryOp::Minus, number(0.0)))),
            var("inf", Some(ident("Infinity"))),
            var("ninf", Some(unary(jsmud::ast::UnaryOp::Minus, ident("Infinity")))),
            var("nan", Some(ident("NaN"))),
        ],
    );
    let records = world.snapshot();
    let (mut fresh, _clock2) = interp();
    fresh.restore(&records).expect("restore succeeds");

    let get = |name: &str| {
        fresh
            .scopes
            .get_var(ScopeId::GLOBAL, name)
            .unwrap()
            .as_number()
            .unwrap()
    };
    assert_eq!(get("negzero").to_bits(), (-0.0f64).to_bits());
    assert_eq!(get("inf"), f64::INFINITY);
    assert_eq!(get("ninf"), f64::NEG_INFINITY);
    assert!(get("nan").is_nan());
}

#[test]
fn date_and_regexp_round_trip() {
    use jsmud::object::InternalSlots;

    let (mut world, _clock) = interp();
    eval_in(
        &mut world,
        vec![
            var("d", Some(new_expr(ident("Date"), vec![number(86400000.0)]))),
            var(
                "re",
                Some(new_expr(
                    ident("RegExp"),
                    vec![string("a+b"), string("gi")],
                )),
            ),
        ],
    );
    let records = world.snapshot();

    // Date records carry an ISO payload; RegExp records carry source+flags.
    let date_rec = records
        .iter()
        .find(|r| r["type"] == "Date")
        .expect("date record");
    assert_eq!(date_rec["data"], "1970-01-02T00:00:00.000Z");
    let re_rec = records
        .iter()
        .find(|r| r["type"] == "RegExp")
        .expect("regexp record");
    assert_eq!(re_rec["source"], "a+b");
    assert_eq!(re_rec["flags"], "gi");

    let (mut fresh, _clock2) = interp();
    fresh.restore(&records).expect("restore succeeds");
    let check = eval_in(
        &mut fresh,
        vec![expr_stmt(call(member(ident("d"), "getTime"), vec![]))],
    );
    assert_eq!(
        fresh.thread_result(check).unwrap().as_number(),
        Some(86400000.0)
    );
    let re = fresh
        .scopes
        .get_var(ScopeId::GLOBAL, "re")
        .unwrap()
        .as_object()
        .unwrap();
    match &fresh.heap.get(re).unwrap().slots {
        InternalSlots::RegExp { source, flags } => {
            assert_eq!(source.as_str(), "a+b");
            assert_eq!(flags.as_str(), "gi");
        }
        other => panic!("expected regexp slots, got {other:?}"),
    }
}

/// Server-class objects are excluded: references encode as null and restore
/// as null.
#[test]
fn server_objects_are_excluded() {
    let (mut world, _clock) = interp();
    let sock = world.create_server_object(jsmud::HostHandle(11));
    world.bind_global("sock", Value::Object(sock));
    let records = world.snapshot();

    let global = records
        .iter()
        .find_map(|r| {
            let map = r.as_object()?;
            if map.get("type")?.as_str()? != "Scope" {
                return None;
            }
            map.get("vars")?.as_object()?.get("sock").cloned()
        })
        .expect("global scope carries sock");
    assert_eq!(global, Json::Null);

    let (mut fresh, _clock2) = interp();
    fresh.restore(&records).expect("restore succeeds");
    assert_eq!(
        fresh.scopes.get_var(ScopeId::GLOBAL, "sock").unwrap(),
        Value::Null
    );
}

#[test]
fn weak_only_objects_are_absent_from_snapshot() {
    let (mut world, _clock) = interp();
    eval_in(
        &mut world,
        vec![
            var("ws", Some(new_expr(ident("WeakSet"), vec![]))),
            var("keep", Some(object(vec![("k", number(1.0))]))),
            expr_stmt(call(member(ident("ws"), "add"), vec![ident("keep")])),
            // This one is reachable only through the weak set afterwards.
            expr_stmt(call(
                member(ident("ws"), "add"),
                vec![object(vec![("gone", number(2.0))])],
            )),
        ],
    );
    let records = world.snapshot();
    let (mut fresh, _clock2) = interp();
    fresh.restore(&records).expect("restore succeeds");

    let check = eval_in(
        &mut fresh,
        vec![expr_stmt(call(member(ident("ws"), "size"), vec![]))],
    );
    assert_eq!(fresh.thread_result(check).unwrap().as_number(), Some(1.0));
}

// ── failure taxonomy ──────────────────────────────────────────────────

fn snapshot_of_simple_world() -> Vec<Json> {
    let (mut world, _clock) = interp();
    eval_in(
        &mut world,
        vec![
            var("x", Some(number(1.0))),
            var("d", Some(new_expr(ident("Date"), vec![number(0.0)]))),
        ],
    );
    world.snapshot()
}

fn assert_untouched_after_failure(world: &mut jsmud::Interpreter) {
    let check = eval_in(
        world,
        vec![expr_stmt(binary(BinaryOp::Add, number(40.0), number(2.0)))],
    );
    assert_eq!(world.thread_result(check).unwrap().as_number(), Some(42.0));
}

#[test]
fn decode_rejects_empty_top_level() {
    let (mut world, _clock) = interp();
    let err = world.restore(&[]).unwrap_err();
    assert!(matches!(err, DecodeError::Shape(_)));
    assert_untouched_after_failure(&mut world);
}

#[test]
fn decode_rejects_wrong_root() {
    let (mut world, _clock) = interp();
    let err = world
        .restore(&[serde_json::json!({"type": "Object"})])
        .unwrap_err();
    assert!(matches!(err, DecodeError::Shape(_)));
}

#[test]
fn decode_rejects_future_version() {
    let mut records = snapshot_of_simple_world();
    records[0]["version"] = serde_json::json!(999);
    let (mut world, _clock) = interp();
    let err = world.restore(&records).unwrap_err();
    assert!(matches!(err, DecodeError::Shape(_)));
}

#[test]
fn decode_rejects_dangling_reference() {
    let mut records = snapshot_of_simple_world();
    // Point the global scope's `x` at a record index past the end.
    for rec in &mut records {
        if rec["type"] == "Scope" {
            if let Some(vars) = rec.get_mut("vars").and_then(Json::as_object_mut) {
                if vars.contains_key("x") {
                    vars.insert("x".into(), serde_json::json!({"#": 99999}));
                }
            }
        }
    }
    let (mut world, _clock) = interp();
    let err = world.restore(&records).unwrap_err();
    assert!(matches!(err, DecodeError::DanglingReference(99999)));
    assert_untouched_after_failure(&mut world);
}

#[test]
fn decode_rejects_unknown_type_tag() {
    let mut records = snapshot_of_simple_world();
    let idx = records
        .iter()
        .position(|r| r["type"] == "Date")
        .expect("date record present");
    records[idx]["type"] = serde_json::json!("Gremlin");
    let (mut world, _clock) = interp();
    let err = world.restore(&records).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownType(t) if t == "Gremlin"));
}

#[test]
fn decode_rejects_missing_native() {
    let mut records = snapshot_of_simple_world();
    let idx = records
        .iter()
        .position(|r| {
            r["type"] == "Function" && r.get("id").is_some()
        })
        .expect("native function record present");
    records[idx]["id"] = serde_json::json!("no.such.native");
    let (mut world, _clock) = interp();
    let err = world.restore(&records).unwrap_err();
    assert!(matches!(err, DecodeError::MissingNative(id) if id == "no.such.native"));
    assert_untouched_after_failure(&mut world);
}

#[test]
fn decode_rejects_invalid_date() {
    let mut records = snapshot_of_simple_world();
    let idx = records
        .iter()
        .position(|r| r["type"] == "Date")
        .expect("date record present");
    records[idx]["data"] = serde_json::json!("yesterday-ish");
    let (mut world, _clock) = interp();
    let err = world.restore(&records).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidDate(_)));
}

#[test]
fn user_class_tags_require_registration() {
    let (mut world, _clock) = interp();
    world.register_class_tag("Portal");
    // Hand-build a snapshot carrying a Portal object in the global scope.
    let mut records = snapshot_of_simple_world();
    let portal_index = records.len();
    records.push(serde_json::json!({
        "type": "Portal",
        "#": portal_index,
        "props": {"dest": "nexus"}
    }));
    for rec in &mut records {
        if rec["type"] == "Scope" {
            if let Some(vars) = rec.get_mut("vars").and_then(Json::as_object_mut) {
                if vars.contains_key("x") {
                    vars.insert("portal".into(), serde_json::json!({"#": portal_index}));
                }
            }
        }
    }
    world.restore(&records).expect("registered tag decodes");

    // Without registration the same snapshot is rejected.
    let (mut strict_world, _clock2) = interp();
    let err = strict_world.restore(&records).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownType(t) if t == "Portal"));
}

/// Thread ids survive restore and newly spawned threads do not collide.
#[test]
fn thread_ids_are_preserved() {
    let (mut world, _clock) = interp();
    let main = eval_in(&mut world, vec![var("x", Some(number(1.0)))]);
    assert_eq!(main, ThreadId(0));
    let records = world.snapshot();

    let (mut fresh, _clock2) = interp();
    fresh.restore(&records).expect("restore succeeds");
    let next = eval_in(&mut fresh, vec![expr_stmt(number(2.0))]);
    assert!(next.0 > main.0, "fresh thread id continues after restored ids");
}
