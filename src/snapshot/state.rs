//! State-record codec: one record per suspended frame.
//!
//! Each frame kind serializes its progress fields under a `kind` tag. Big
//! shared AST pieces (statement lists, statements, expressions, function
//! expressions) go through deduplicated `AST-Node` records; small per-frame
//! AST scraps (operators, declarator lists, switch cases) are inlined with
//! serde.

use serde_json::{Map, Value as Json};

use crate::error::DecodeError;
use crate::interpreter::lvalue::LValue;
use crate::interpreter::step::{
    Abrupt, CallPhase, ForInPhase, ForPhase, FrameKind, LoopPhase, SavedCompletion, StateFrame,
    SwitchPhase, TryPhase,
};
use crate::value::{JsString, Value};

use super::decode::Decoder;
use super::encode::Encoder;

fn bad(index: usize, message: impl Into<String>) -> DecodeError {
    DecodeError::MalformedRecord {
        index,
        message: message.into(),
    }
}

// ── encoding ──────────────────────────────────────────────────────────

pub(crate) fn encode_abrupt(enc: &mut Encoder<'_>, abrupt: &Abrupt) -> Json {
    match abrupt {
        Abrupt::Break(label) => serde_json::json!({
            "kind": "break",
            "label": label.as_ref().map(|l| l.as_str()),
        }),
        Abrupt::Continue(label) => serde_json::json!({
            "kind": "continue",
            "label": label.as_ref().map(|l| l.as_str()),
        }),
        Abrupt::Return(v) => {
            let value = enc.value(v);
            serde_json::json!({"kind": "return", "value": value})
        }
        Abrupt::Throw(v) => {
            let value = enc.value(v);
            serde_json::json!({"kind": "throw", "value": value})
        }
    }
}

fn encode_lvalue(enc: &mut Encoder<'_>, lv: &LValue) -> Json {
    match lv {
        LValue::Identifier { name } => {
            serde_json::json!({"kind": "ident", "name": name.as_str()})
        }
        LValue::Member {
            object,
            property,
            base,
            key,
        } => {
            let object = enc.ast_expr(object);
            let mut map = Map::new();
            map.insert("kind".into(), "member".into());
            map.insert("object".into(), object);
            map.insert(
                "property".into(),
                serde_json::to_value(property).expect("AST serializes"),
            );
            if let Some(base) = base {
                let v = enc.value(base);
                map.insert("base".into(), v);
            }
            if let Some(key) = key {
                map.insert("key".into(), key.as_str().into());
            }
            Json::Object(map)
        }
    }
}

fn opt_value(enc: &mut Encoder<'_>, map: &mut Map<String, Json>, name: &str, v: &Option<Value>) {
    if let Some(v) = v {
        let encoded = enc.value(v);
        map.insert(name.into(), encoded);
    }
}

fn opt_ref(
    enc: &mut Encoder<'_>,
    map: &mut Map<String, Json>,
    name: &str,
    r: &Option<crate::heap::ObjRef>,
) {
    if let Some(r) = r {
        let encoded = enc.value(&Value::Object(*r));
        map.insert(name.into(), encoded);
    }
}

fn inline<T: serde::Serialize + ?Sized>(t: &T) -> Json {
    serde_json::to_value(t).expect("AST serializes")
}

fn loop_phase_str(p: LoopPhase) -> &'static str {
    match p {
        LoopPhase::Test => "test",
        LoopPhase::TestDone => "testDone",
        LoopPhase::RunBody => "runBody",
        LoopPhase::BodyDone => "bodyDone",
    }
}

fn for_phase_str(p: ForPhase) -> &'static str {
    match p {
        ForPhase::Init => "init",
        ForPhase::InitDone => "initDone",
        ForPhase::Test => "test",
        ForPhase::TestDone => "testDone",
        ForPhase::BodyDone => "bodyDone",
        ForPhase::UpdateDone => "updateDone",
    }
}

fn for_in_phase_str(p: ForInPhase) -> &'static str {
    match p {
        ForInPhase::Right => "right",
        ForInPhase::RightDone => "rightDone",
        ForInPhase::Next => "next",
        ForInPhase::BodyDone => "bodyDone",
    }
}

fn try_phase_str(p: TryPhase) -> &'static str {
    match p {
        TryPhase::Start => "start",
        TryPhase::BlockDone => "blockDone",
        TryPhase::HandlerDone => "handlerDone",
        TryPhase::FinallyDone => "finallyDone",
    }
}

fn switch_phase_str(p: SwitchPhase) -> &'static str {
    match p {
        SwitchPhase::Disc => "disc",
        SwitchPhase::FindCase => "findCase",
        SwitchPhase::TestDone => "testDone",
        SwitchPhase::Run => "run",
    }
}

fn call_phase_str(p: CallPhase) -> &'static str {
    match p {
        CallPhase::Callee => "callee",
        CallPhase::Args => "args",
        CallPhase::Invoke => "invoke",
    }
}

/// Encode one frame's kind tag and progress fields.
pub(crate) fn encode_frame(enc: &mut Encoder<'_>, frame: &StateFrame) -> Map<String, Json> {
    let mut map = Map::new();
    macro_rules! put {
        ($name:expr, $value:expr) => {
            map.insert($name.into(), $value)
        };
    }
    match &frame.kind {
        FrameKind::Block { body, index } => {
            put!("kind", "Block".into());
            let body = enc.ast_stmts(body);
            put!("body", body);
            put!("index", serde_json::json!(index));
        }
        FrameKind::CallBody { body, index } => {
            put!("kind", "CallBody".into());
            let body = enc.ast_stmts(body);
            put!("body", body);
            put!("index", serde_json::json!(index));
        }
        FrameKind::ExprStmt {
            expr,
            value,
            started,
        } => {
            put!("kind", "ExprStmt".into());
            let expr = enc.ast_expr(expr);
            put!("expr", expr);
            put!("started", Json::Bool(*started));
            opt_value(enc, &mut map, "value", value);
        }
        FrameKind::VarDecl {
            decls,
            index,
            value,
            waiting,
        } => {
            put!("kind", "VarDecl".into());
            put!("decls", inline(&**decls));
            put!("index", serde_json::json!(index));
            put!("waiting", Json::Bool(*waiting));
            opt_value(enc, &mut map, "value", value);
        }
        FrameKind::If {
            test,
            consequent,
            alternate,
            decided,
            started,
        } => {
            put!("kind", "If".into());
            let test = enc.ast_expr(test);
            put!("test", test);
            let consequent = enc.ast_stmt(consequent);
            put!("consequent", consequent);
            if let Some(alt) = alternate {
                let alt = enc.ast_stmt(alt);
                put!("alternate", alt);
            }
            put!("started", Json::Bool(*started));
            if let Some(d) = decided {
                put!("decided", Json::Bool(*d));
            }
        }
        FrameKind::While {
            test,
            body,
            label,
            phase,
            test_result,
        }
        | FrameKind::DoWhile {
            test,
            body,
            label,
            phase,
            test_result,
        } => {
            let kind = match &frame.kind {
                FrameKind::While { .. } => "While",
                _ => "DoWhile",
            };
            put!("kind", kind.into());
            let test = enc.ast_expr(test);
            put!("test", test);
            let body = enc.ast_stmt(body);
            put!("body", body);
            if let Some(label) = label {
                put!("label", label.as_str().into());
            }
            put!("phase", loop_phase_str(*phase).into());
            if let Some(t) = test_result {
                put!("testResult", Json::Bool(*t));
            }
        }
        FrameKind::For {
            init,
            test,
            update,
            body,
            label,
            phase,
            test_result,
        } => {
            put!("kind", "For".into());
            if let Some(init) = init {
                put!("init", inline(init));
            }
            if let Some(test) = test {
                let test = enc.ast_expr(test);
                put!("test", test);
            }
            if let Some(update) = update {
                let update = enc.ast_expr(update);
                put!("update", update);
            }
            let body = enc.ast_stmt(body);
            put!("body", body);
            if let Some(label) = label {
                put!("label", label.as_str().into());
            }
            put!("phase", for_phase_str(*phase).into());
            if let Some(t) = test_result {
                put!("testResult", Json::Bool(*t));
            }
        }
        FrameKind::ForIn {
            left,
            right,
            body,
            label,
            phase,
            keys,
            index,
            object,
        } => {
            put!("kind", "ForIn".into());
            put!("left", inline(left));
            let right = enc.ast_expr(right);
            put!("right", right);
            let body = enc.ast_stmt(body);
            put!("body", body);
            if let Some(label) = label {
                put!("label", label.as_str().into());
            }
            put!("phase", for_in_phase_str(*phase).into());
            let keys: Vec<Json> = keys.iter().map(|k| Json::String(k.as_str().into())).collect();
            put!("keys", Json::Array(keys));
            put!("index", serde_json::json!(index));
            opt_ref(enc, &mut map, "object", object);
        }
        FrameKind::Switch {
            discriminant,
            cases,
            phase,
            disc,
            test_value,
            case_index,
            stmt_index,
        } => {
            put!("kind", "Switch".into());
            let discriminant = enc.ast_expr(discriminant);
            put!("discriminant", discriminant);
            put!("cases", inline(&**cases));
            put!("phase", switch_phase_str(*phase).into());
            opt_value(enc, &mut map, "disc", disc);
            opt_value(enc, &mut map, "testValue", test_value);
            put!("caseIndex", serde_json::json!(case_index));
            put!("stmtIndex", serde_json::json!(stmt_index));
        }
        FrameKind::Try {
            block,
            handler_param,
            handler_body,
            finalizer,
            phase,
            saved,
        } => {
            put!("kind", "Try".into());
            let block = enc.ast_stmts(block);
            put!("block", block);
            if let Some(p) = handler_param {
                put!("handlerParam", p.as_str().into());
            }
            if let Some(b) = handler_body {
                let b = enc.ast_stmts(b);
                put!("handlerBody", b);
            }
            if let Some(f) = finalizer {
                let f = enc.ast_stmts(f);
                put!("finalizer", f);
            }
            put!("phase", try_phase_str(*phase).into());
            let saved = match saved {
                SavedCompletion::NotSaved => serde_json::json!({"state": "none"}),
                SavedCompletion::Normal => serde_json::json!({"state": "normal"}),
                SavedCompletion::Abrupt(a) => {
                    let completion = encode_abrupt(enc, a);
                    serde_json::json!({"state": "abrupt", "completion": completion})
                }
            };
            put!("saved", saved);
        }
        FrameKind::Labeled {
            label,
            body,
            started,
        } => {
            put!("kind", "Labeled".into());
            put!("label", label.as_str().into());
            let body = enc.ast_stmt(body);
            put!("body", body);
            put!("started", Json::Bool(*started));
        }
        FrameKind::Return {
            argument,
            value,
            started,
        } => {
            put!("kind", "Return".into());
            if let Some(a) = argument {
                let a = enc.ast_expr(a);
                put!("argument", a);
            }
            put!("started", Json::Bool(*started));
            opt_value(enc, &mut map, "value", value);
        }
        FrameKind::Throw {
            argument,
            value,
            started,
        } => {
            put!("kind", "Throw".into());
            let argument = enc.ast_expr(argument);
            put!("argument", argument);
            put!("started", Json::Bool(*started));
            opt_value(enc, &mut map, "value", value);
        }
        FrameKind::Literal { literal } => {
            put!("kind", "Literal".into());
            put!("literal", inline(literal));
        }
        FrameKind::Ident { name } => {
            put!("kind", "Ident".into());
            put!("name", name.as_str().into());
        }
        FrameKind::This => {
            put!("kind", "This".into());
        }
        FrameKind::FunctionExpr { func } => {
            put!("kind", "FunctionExpr".into());
            let func = enc.ast_func(func);
            put!("func", func);
        }
        FrameKind::ObjectLit {
            props,
            object,
            index,
        } => {
            put!("kind", "ObjectLit".into());
            put!("props", inline(&**props));
            opt_ref(enc, &mut map, "object", object);
            put!("index", serde_json::json!(index));
        }
        FrameKind::ArrayLit {
            elements,
            array,
            index,
        } => {
            put!("kind", "ArrayLit".into());
            put!("elements", inline(&**elements));
            opt_ref(enc, &mut map, "array", array);
            put!("index", serde_json::json!(index));
        }
        FrameKind::Member {
            object,
            property,
            base,
            key,
        } => {
            put!("kind", "Member".into());
            let object = enc.ast_expr(object);
            put!("object", object);
            put!("property", inline(property));
            opt_value(enc, &mut map, "base", base);
            if let Some(key) = key {
                put!("key", key.as_str().into());
            }
        }
        FrameKind::Call {
            callee,
            args,
            phase,
            this_val,
            base,
            key,
            func,
            done_args,
        } => {
            put!("kind", "Call".into());
            let callee = enc.ast_expr(callee);
            put!("callee", callee);
            put!("args", inline(&**args));
            put!("phase", call_phase_str(*phase).into());
            let this_val = enc.value(this_val);
            put!("thisVal", this_val);
            opt_value(enc, &mut map, "base", base);
            if let Some(key) = key {
                put!("key", key.as_str().into());
            }
            opt_value(enc, &mut map, "func", func);
            let done: Vec<Json> = done_args.iter().map(|v| enc.value(v)).collect();
            put!("doneArgs", Json::Array(done));
        }
        FrameKind::New {
            callee,
            args,
            phase,
            func,
            done_args,
            this_obj,
            result,
        } => {
            put!("kind", "New".into());
            let callee = enc.ast_expr(callee);
            put!("callee", callee);
            put!("args", inline(&**args));
            put!("phase", call_phase_str(*phase).into());
            opt_value(enc, &mut map, "func", func);
            let done: Vec<Json> = done_args.iter().map(|v| enc.value(v)).collect();
            put!("doneArgs", Json::Array(done));
            opt_ref(enc, &mut map, "thisObj", this_obj);
            opt_value(enc, &mut map, "result", result);
        }
        FrameKind::Assign {
            op,
            target,
            right,
            old,
            rhs,
            rhs_started,
        } => {
            put!("kind", "Assign".into());
            put!("op", inline(op));
            let target = encode_lvalue(enc, target);
            put!("target", target);
            let right = enc.ast_expr(right);
            put!("right", right);
            opt_value(enc, &mut map, "old", old);
            opt_value(enc, &mut map, "rhs", rhs);
            put!("rhsStarted", Json::Bool(*rhs_started));
        }
        FrameKind::Update { op, prefix, target } => {
            put!("kind", "Update".into());
            put!("op", inline(op));
            put!("prefix", Json::Bool(*prefix));
            let target = encode_lvalue(enc, target);
            put!("target", target);
        }
        FrameKind::Binary {
            op,
            left,
            right,
            left_val,
            right_val,
            phase,
        } => {
            put!("kind", "Binary".into());
            put!("op", inline(op));
            let left = enc.ast_expr(left);
            put!("left", left);
            let right = enc.ast_expr(right);
            put!("right", right);
            opt_value(enc, &mut map, "leftVal", left_val);
            opt_value(enc, &mut map, "rightVal", right_val);
            put!("phase", serde_json::json!(phase));
        }
        FrameKind::Logical {
            op,
            left,
            right,
            left_val,
            started,
        } => {
            put!("kind", "Logical".into());
            put!("op", inline(op));
            let left = enc.ast_expr(left);
            put!("left", left);
            let right = enc.ast_expr(right);
            put!("right", right);
            opt_value(enc, &mut map, "leftVal", left_val);
            put!("started", Json::Bool(*started));
        }
        FrameKind::Unary {
            op,
            argument,
            value,
            started,
        } => {
            put!("kind", "Unary".into());
            put!("op", inline(op));
            let argument = enc.ast_expr(argument);
            put!("argument", argument);
            opt_value(enc, &mut map, "value", value);
            put!("started", Json::Bool(*started));
        }
        FrameKind::Delete {
            object,
            property,
            base,
            key,
            trivial,
        } => {
            put!("kind", "Delete".into());
            if let Some(o) = object {
                let o = enc.ast_expr(o);
                put!("object", o);
            }
            if let Some(p) = property {
                put!("property", inline(p));
            }
            opt_value(enc, &mut map, "base", base);
            if let Some(key) = key {
                put!("key", key.as_str().into());
            }
            if let Some(t) = trivial {
                put!("trivial", Json::Bool(*t));
            }
        }
        FrameKind::Conditional {
            test,
            consequent,
            alternate,
            decided,
            started,
        } => {
            put!("kind", "Conditional".into());
            let test = enc.ast_expr(test);
            put!("test", test);
            let consequent = enc.ast_expr(consequent);
            put!("consequent", consequent);
            let alternate = enc.ast_expr(alternate);
            put!("alternate", alternate);
            if let Some(d) = decided {
                put!("decided", Json::Bool(*d));
            }
            put!("started", Json::Bool(*started));
        }
        FrameKind::Sequence { exprs, index, last } => {
            put!("kind", "Sequence".into());
            put!("exprs", inline(&**exprs));
            put!("index", serde_json::json!(index));
            let last = enc.value(last);
            put!("last", last);
        }
        FrameKind::Invalid { message } => {
            put!("kind", "Invalid".into());
            put!("message", message.as_str().into());
        }
    }
    map
}

// ── decoding ──────────────────────────────────────────────────────────

pub(crate) fn parse_abrupt(
    dec: &mut Decoder<'_>,
    index: usize,
    json: &Json,
) -> Result<Abrupt, DecodeError> {
    let map = json
        .as_object()
        .ok_or_else(|| bad(index, "abrupt completion is not a map"))?;
    let label = || -> Option<JsString> {
        map.get("label")
            .and_then(Json::as_str)
            .map(JsString::from)
    };
    match map.get("kind").and_then(Json::as_str) {
        Some("break") => Ok(Abrupt::Break(label())),
        Some("continue") => Ok(Abrupt::Continue(label())),
        Some("return") => Ok(Abrupt::Return(
            dec.value(index, map.get("value").unwrap_or(&Json::Null))?,
        )),
        Some("throw") => Ok(Abrupt::Throw(
            dec.value(index, map.get("value").unwrap_or(&Json::Null))?,
        )),
        _ => Err(bad(index, "unknown abrupt completion kind")),
    }
}

fn parse_lvalue(dec: &mut Decoder<'_>, index: usize, json: &Json) -> Result<LValue, DecodeError> {
    let map = json
        .as_object()
        .ok_or_else(|| bad(index, "lvalue is not a map"))?;
    match map.get("kind").and_then(Json::as_str) {
        Some("ident") => Ok(LValue::Identifier {
            name: JsString::from(
                map.get("name")
                    .and_then(Json::as_str)
                    .ok_or_else(|| bad(index, "lvalue missing name"))?,
            ),
        }),
        Some("member") => Ok(LValue::Member {
            object: dec.ast_expr(
                index,
                map.get("object")
                    .ok_or_else(|| bad(index, "lvalue missing object"))?,
            )?,
            property: parse_inline(index, map.get("property"))?,
            base: opt_val(dec, index, map, "base")?,
            key: map.get("key").and_then(Json::as_str).map(JsString::from),
        }),
        _ => Err(bad(index, "unknown lvalue kind")),
    }
}

fn parse_inline<T: serde::de::DeserializeOwned>(
    index: usize,
    json: Option<&Json>,
) -> Result<T, DecodeError> {
    let json = json.ok_or_else(|| bad(index, "missing inline AST field"))?;
    serde_json::from_value(json.clone()).map_err(|e| bad(index, format!("inline AST: {e}")))
}

fn opt_val(
    dec: &mut Decoder<'_>,
    index: usize,
    map: &Map<String, Json>,
    name: &str,
) -> Result<Option<Value>, DecodeError> {
    match map.get(name) {
        None => Ok(None),
        Some(json) => Ok(Some(dec.value(index, json)?)),
    }
}

fn opt_obj(
    dec: &mut Decoder<'_>,
    index: usize,
    map: &Map<String, Json>,
    name: &str,
) -> Result<Option<crate::heap::ObjRef>, DecodeError> {
    match opt_val(dec, index, map, name)? {
        Some(Value::Object(r)) => Ok(Some(r)),
        _ => Ok(None),
    }
}

fn req_str<'j>(
    index: usize,
    map: &'j Map<String, Json>,
    name: &str,
) -> Result<&'j str, DecodeError> {
    map.get(name)
        .and_then(Json::as_str)
        .ok_or_else(|| bad(index, format!("missing string field '{name}'")))
}

fn req_usize(index: usize, map: &Map<String, Json>, name: &str) -> Result<usize, DecodeError> {
    map.get(name)
        .and_then(Json::as_u64)
        .map(|n| n as usize)
        .ok_or_else(|| bad(index, format!("missing numeric field '{name}'")))
}

fn req_bool(index: usize, map: &Map<String, Json>, name: &str) -> Result<bool, DecodeError> {
    map.get(name)
        .and_then(Json::as_bool)
        .ok_or_else(|| bad(index, format!("missing boolean field '{name}'")))
}

fn opt_bool(map: &Map<String, Json>, name: &str) -> Option<bool> {
    map.get(name).and_then(Json::as_bool)
}

fn parse_loop_phase(index: usize, s: &str) -> Result<LoopPhase, DecodeError> {
    Ok(match s {
        "test" => LoopPhase::Test,
        "testDone" => LoopPhase::TestDone,
        "runBody" => LoopPhase::RunBody,
        "bodyDone" => LoopPhase::BodyDone,
        _ => return Err(bad(index, format!("unknown loop phase '{s}'"))),
    })
}

fn parse_for_phase(index: usize, s: &str) -> Result<ForPhase, DecodeError> {
    Ok(match s {
        "init" => ForPhase::Init,
        "initDone" => ForPhase::InitDone,
        "test" => ForPhase::Test,
        "testDone" => ForPhase::TestDone,
        "bodyDone" => ForPhase::BodyDone,
        "updateDone" => ForPhase::UpdateDone,
        _ => return Err(bad(index, format!("unknown for phase '{s}'"))),
    })
}

fn parse_for_in_phase(index: usize, s: &str) -> Result<ForInPhase, DecodeError> {
    Ok(match s {
        "right" => ForInPhase::Right,
        "rightDone" => ForInPhase::RightDone,
        "next" => ForInPhase::Next,
        "bodyDone" => ForInPhase::BodyDone,
        _ => return Err(bad(index, format!("unknown for-in phase '{s}'"))),
    })
}

fn parse_try_phase(index: usize, s: &str) -> Result<TryPhase, DecodeError> {
    Ok(match s {
        "start" => TryPhase::Start,
        "blockDone" => TryPhase::BlockDone,
        "handlerDone" => TryPhase::HandlerDone,
        "finallyDone" => TryPhase::FinallyDone,
        _ => return Err(bad(index, format!("unknown try phase '{s}'"))),
    })
}

fn parse_switch_phase(index: usize, s: &str) -> Result<SwitchPhase, DecodeError> {
    Ok(match s {
        "disc" => SwitchPhase::Disc,
        "findCase" => SwitchPhase::FindCase,
        "testDone" => SwitchPhase::TestDone,
        "run" => SwitchPhase::Run,
        _ => return Err(bad(index, format!("unknown switch phase '{s}'"))),
    })
}

fn parse_call_phase(index: usize, s: &str) -> Result<CallPhase, DecodeError> {
    Ok(match s {
        "callee" => CallPhase::Callee,
        "args" => CallPhase::Args,
        "invoke" => CallPhase::Invoke,
        _ => return Err(bad(index, format!("unknown call phase '{s}'"))),
    })
}

/// Decode one state record's kind and fields into a frame kind.
pub(crate) fn parse_frame(
    dec: &mut Decoder<'_>,
    index: usize,
    map: &Map<String, Json>,
) -> Result<FrameKind, DecodeError> {
    let kind = req_str(index, map, "kind")?.to_string();
    Ok(match kind.as_str() {
        "Block" => FrameKind::Block {
            body: dec.ast_stmts(index, map.get("body").ok_or_else(|| bad(index, "no body"))?)?,
            index: req_usize(index, map, "index")?,
        },
        "CallBody" => FrameKind::CallBody {
            body: dec.ast_stmts(index, map.get("body").ok_or_else(|| bad(index, "no body"))?)?,
            index: req_usize(index, map, "index")?,
        },
        "ExprStmt" => FrameKind::ExprStmt {
            expr: dec.ast_expr(index, map.get("expr").ok_or_else(|| bad(index, "no expr"))?)?,
            value: opt_val(dec, index, map, "value")?,
            started: req_bool(index, map, "started")?,
        },
        "VarDecl" => FrameKind::VarDecl {
            decls: parse_inline(index, map.get("decls"))?,
            index: req_usize(index, map, "index")?,
            value: opt_val(dec, index, map, "value")?,
            waiting: req_bool(index, map, "waiting")?,
        },
        "If" => FrameKind::If {
            test: dec.ast_expr(index, map.get("test").ok_or_else(|| bad(index, "no test"))?)?,
            consequent: dec.ast_stmt(
                index,
                map.get("consequent")
                    .ok_or_else(|| bad(index, "no consequent"))?,
            )?,
            alternate: match map.get("alternate") {
                None => None,
                Some(j) => Some(dec.ast_stmt(index, j)?),
            },
            decided: opt_bool(map, "decided"),
            started: req_bool(index, map, "started")?,
        },
        "While" | "DoWhile" => {
            let test =
                dec.ast_expr(index, map.get("test").ok_or_else(|| bad(index, "no test"))?)?;
            let body =
                dec.ast_stmt(index, map.get("body").ok_or_else(|| bad(index, "no body"))?)?;
            let label = map.get("label").and_then(Json::as_str).map(JsString::from);
            let phase = parse_loop_phase(index, req_str(index, map, "phase")?)?;
            let test_result = opt_bool(map, "testResult");
            if kind == "While" {
                FrameKind::While {
                    test,
                    body,
                    label,
                    phase,
                    test_result,
                }
            } else {
                FrameKind::DoWhile {
                    test,
                    body,
                    label,
                    phase,
                    test_result,
                }
            }
        }
        "For" => FrameKind::For {
            init: match map.get("init") {
                None => None,
                Some(j) => Some(
                    serde_json::from_value(j.clone())
                        .map_err(|e| bad(index, format!("for-init: {e}")))?,
                ),
            },
            test: match map.get("test") {
                None => None,
                Some(j) => Some(dec.ast_expr(index, j)?),
            },
            update: match map.get("update") {
                None => None,
                Some(j) => Some(dec.ast_expr(index, j)?),
            },
            body: dec.ast_stmt(index, map.get("body").ok_or_else(|| bad(index, "no body"))?)?,
            label: map.get("label").and_then(Json::as_str).map(JsString::from),
            phase: parse_for_phase(index, req_str(index, map, "phase")?)?,
            test_result: opt_bool(map, "testResult"),
        },
        "ForIn" => FrameKind::ForIn {
            left: parse_inline(index, map.get("left"))?,
            right: dec.ast_expr(index, map.get("right").ok_or_else(|| bad(index, "no right"))?)?,
            body: dec.ast_stmt(index, map.get("body").ok_or_else(|| bad(index, "no body"))?)?,
            label: map.get("label").and_then(Json::as_str).map(JsString::from),
            phase: parse_for_in_phase(index, req_str(index, map, "phase")?)?,
            keys: map
                .get("keys")
                .and_then(Json::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Json::as_str)
                        .map(JsString::from)
                        .collect()
                })
                .unwrap_or_default(),
            index: req_usize(index, map, "index")?,
            object: opt_obj(dec, index, map, "object")?,
        },
        "Switch" => FrameKind::Switch {
            discriminant: dec.ast_expr(
                index,
                map.get("discriminant")
                    .ok_or_else(|| bad(index, "no discriminant"))?,
            )?,
            cases: parse_inline(index, map.get("cases"))?,
            phase: parse_switch_phase(index, req_str(index, map, "phase")?)?,
            disc: opt_val(dec, index, map, "disc")?,
            test_value: opt_val(dec, index, map, "testValue")?,
            case_index: req_usize(index, map, "caseIndex")?,
            stmt_index: req_usize(index, map, "stmtIndex")?,
        },
        "Try" => FrameKind::Try {
            block: dec.ast_stmts(index, map.get("block").ok_or_else(|| bad(index, "no block"))?)?,
            handler_param: map
                .get("handlerParam")
                .and_then(Json::as_str)
                .map(JsString::from),
            handler_body: match map.get("handlerBody") {
                None => None,
                Some(j) => Some(dec.ast_stmts(index, j)?),
            },
            finalizer: match map.get("finalizer") {
                None => None,
                Some(j) => Some(dec.ast_stmts(index, j)?),
            },
            phase: parse_try_phase(index, req_str(index, map, "phase")?)?,
            saved: {
                let saved = map
                    .get("saved")
                    .and_then(Json::as_object)
                    .ok_or_else(|| bad(index, "no saved completion"))?;
                match saved.get("state").and_then(Json::as_str) {
                    Some("none") => SavedCompletion::NotSaved,
                    Some("normal") => SavedCompletion::Normal,
                    Some("abrupt") => SavedCompletion::Abrupt(parse_abrupt(
                        dec,
                        index,
                        saved
                            .get("completion")
                            .ok_or_else(|| bad(index, "no saved.completion"))?,
                    )?),
                    _ => return Err(bad(index, "unknown saved completion state")),
                }
            },
        },
        "Labeled" => FrameKind::Labeled {
            label: JsString::from(req_str(index, map, "label")?),
            body: dec.ast_stmt(index, map.get("body").ok_or_else(|| bad(index, "no body"))?)?,
            started: req_bool(index, map, "started")?,
        },
        "Return" => FrameKind::Return {
            argument: match map.get("argument") {
                None => None,
                Some(j) => Some(dec.ast_expr(index, j)?),
            },
            value: opt_val(dec, index, map, "value")?,
            started: req_bool(index, map, "started")?,
        },
        "Throw" => FrameKind::Throw {
            argument: dec.ast_expr(
                index,
                map.get("argument").ok_or_else(|| bad(index, "no argument"))?,
            )?,
            value: opt_val(dec, index, map, "value")?,
            started: req_bool(index, map, "started")?,
        },
        "Literal" => FrameKind::Literal {
            literal: parse_inline(index, map.get("literal"))?,
        },
        "Ident" => FrameKind::Ident {
            name: JsString::from(req_str(index, map, "name")?),
        },
        "This" => FrameKind::This,
        "FunctionExpr" => FrameKind::FunctionExpr {
            func: dec.ast_func(index, map.get("func").ok_or_else(|| bad(index, "no func"))?)?,
        },
        "ObjectLit" => FrameKind::ObjectLit {
            props: parse_inline(index, map.get("props"))?,
            object: opt_obj(dec, index, map, "object")?,
            index: req_usize(index, map, "index")?,
        },
        "ArrayLit" => FrameKind::ArrayLit {
            elements: parse_inline(index, map.get("elements"))?,
            array: opt_obj(dec, index, map, "array")?,
            index: req_usize(index, map, "index")?,
        },
        "Member" => FrameKind::Member {
            object: dec.ast_expr(index, map.get("object").ok_or_else(|| bad(index, "no object"))?)?,
            property: parse_inline(index, map.get("property"))?,
            base: opt_val(dec, index, map, "base")?,
            key: map.get("key").and_then(Json::as_str).map(JsString::from),
        },
        "Call" => FrameKind::Call {
            callee: dec.ast_expr(index, map.get("callee").ok_or_else(|| bad(index, "no callee"))?)?,
            args: parse_inline(index, map.get("args"))?,
            phase: parse_call_phase(index, req_str(index, map, "phase")?)?,
            this_val: dec.value(index, map.get("thisVal").unwrap_or(&Json::Null))?,
            base: opt_val(dec, index, map, "base")?,
            key: map.get("key").and_then(Json::as_str).map(JsString::from),
            func: opt_val(dec, index, map, "func")?,
            done_args: {
                let mut out = Vec::new();
                for j in map
                    .get("doneArgs")
                    .and_then(Json::as_array)
                    .ok_or_else(|| bad(index, "no doneArgs"))?
                {
                    out.push(dec.value(index, j)?);
                }
                out
            },
        },
        "New" => FrameKind::New {
            callee: dec.ast_expr(index, map.get("callee").ok_or_else(|| bad(index, "no callee"))?)?,
            args: parse_inline(index, map.get("args"))?,
            phase: parse_call_phase(index, req_str(index, map, "phase")?)?,
            func: opt_val(dec, index, map, "func")?,
            done_args: {
                let mut out = Vec::new();
                for j in map
                    .get("doneArgs")
                    .and_then(Json::as_array)
                    .ok_or_else(|| bad(index, "no doneArgs"))?
                {
                    out.push(dec.value(index, j)?);
                }
                out
            },
            this_obj: opt_obj(dec, index, map, "thisObj")?,
            result: opt_val(dec, index, map, "result")?,
        },
        "Assign" => FrameKind::Assign {
            op: parse_inline(index, map.get("op"))?,
            target: parse_lvalue(
                dec,
                index,
                map.get("target").ok_or_else(|| bad(index, "no target"))?,
            )?,
            right: dec.ast_expr(index, map.get("right").ok_or_else(|| bad(index, "no right"))?)?,
            old: opt_val(dec, index, map, "old")?,
            rhs: opt_val(dec, index, map, "rhs")?,
            rhs_started: req_bool(index, map, "rhsStarted")?,
        },
        "Update" => FrameKind::Update {
            op: parse_inline(index, map.get("op"))?,
            prefix: req_bool(index, map, "prefix")?,
            target: parse_lvalue(
                dec,
                index,
                map.get("target").ok_or_else(|| bad(index, "no target"))?,
            )?,
        },
        "Binary" => FrameKind::Binary {
            op: parse_inline(index, map.get("op"))?,
            left: dec.ast_expr(index, map.get("left").ok_or_else(|| bad(index, "no left"))?)?,
            right: dec.ast_expr(index, map.get("right").ok_or_else(|| bad(index, "no right"))?)?,
            left_val: opt_val(dec, index, map, "leftVal")?,
            right_val: opt_val(dec, index, map, "rightVal")?,
            phase: req_usize(index, map, "phase")? as u8,
        },
        "Logical" => FrameKind::Logical {
            op: parse_inline(index, map.get("op"))?,
            left: dec.ast_expr(index, map.get("left").ok_or_else(|| bad(index, "no left"))?)?,
            right: dec.ast_expr(index, map.get("right").ok_or_else(|| bad(index, "no right"))?)?,
            left_val: opt_val(dec, index, map, "leftVal")?,
            started: req_bool(index, map, "started")?,
        },
        "Unary" => FrameKind::Unary {
            op: parse_inline(index, map.get("op"))?,
            argument: dec.ast_expr(
                index,
                map.get("argument").ok_or_else(|| bad(index, "no argument"))?,
            )?,
            value: opt_val(dec, index, map, "value")?,
            started: req_bool(index, map, "started")?,
        },
        "Delete" => FrameKind::Delete {
            object: match map.get("object") {
                None => None,
                Some(j) => Some(dec.ast_expr(index, j)?),
            },
            property: match map.get("property") {
                None => None,
                Some(j) => Some(
                    serde_json::from_value(j.clone())
                        .map_err(|e| bad(index, format!("property: {e}")))?,
                ),
            },
            base: opt_val(dec, index, map, "base")?,
            key: map.get("key").and_then(Json::as_str).map(JsString::from),
            trivial: opt_bool(map, "trivial"),
        },
        "Conditional" => FrameKind::Conditional {
            test: dec.ast_expr(index, map.get("test").ok_or_else(|| bad(index, "no test"))?)?,
            consequent: dec.ast_expr(
                index,
                map.get("consequent")
                    .ok_or_else(|| bad(index, "no consequent"))?,
            )?,
            alternate: dec.ast_expr(
                index,
                map.get("alternate")
                    .ok_or_else(|| bad(index, "no alternate"))?,
            )?,
            decided: opt_bool(map, "decided"),
            started: req_bool(index, map, "started")?,
        },
        "Sequence" => FrameKind::Sequence {
            exprs: parse_inline(index, map.get("exprs"))?,
            index: req_usize(index, map, "index")?,
            last: dec.value(index, map.get("last").unwrap_or(&Json::Null))?,
        },
        "Invalid" => FrameKind::Invalid {
            message: req_str(index, map, "message")?.to_string(),
        },
        other => return Err(bad(index, format!("unknown state kind '{other}'"))),
    })
}
