//! Snapshot decoder: stubs, then population, then post-restore fixups.
//!
//! Decoding is all-or-nothing. Everything fallible — shape checks, reference
//! resolution, AST deserialization, frame parsing, prototype-cycle
//! detection — happens against staging buffers before the first
//! pre-existing object, scope, queue, or registry entry is touched; the
//! apply phase then cannot fail. Stub allocations made before a failure are
//! unreachable and vanish at the next collection, which the error path runs.

use std::rc::Rc;

use serde_json::{Map, Value as Json};

use crate::ast::{Expression, FunctionExpression, Statement};
use crate::error::DecodeError;
use crate::heap::ObjRef;
use crate::interpreter::step::StateFrame;
use crate::interpreter::Interpreter;
use crate::object::{
    ClassTag, FunctionSlot, InternalSlots, InterpretedFunction, PropertySlot, PseudoObject,
};
use crate::prelude::{FxHashMap, FxHashSet};
use crate::scheduler::{Blocker, Scheduler, Thread, ThreadId, ThreadStatus};
use crate::scope::ScopeId;
use crate::value::{JsString, Value};

use super::{as_ref, decode_scalar, parse_date, state, SNAPSHOT_VERSION};

pub(crate) struct Decoder<'a> {
    records: &'a [Json],
    /// Stub (or reused singleton) per object record.
    objects: Vec<Option<ObjRef>>,
    /// Stub (or the reused global) per scope record.
    scopes: Vec<Option<ScopeId>>,
    stmts_cache: FxHashMap<usize, Rc<[Statement]>>,
    stmt_cache: FxHashMap<usize, Rc<Statement>>,
    expr_cache: FxHashMap<usize, Rc<Expression>>,
    func_cache: FxHashMap<usize, Rc<FunctionExpression>>,
}

fn bad(index: usize, message: impl Into<String>) -> DecodeError {
    DecodeError::MalformedRecord {
        index,
        message: message.into(),
    }
}

impl<'a> Decoder<'a> {
    fn record(&self, index: usize) -> Result<&'a Map<String, Json>, DecodeError> {
        self.records
            .get(index)
            .ok_or(DecodeError::DanglingReference(index))?
            .as_object()
            .ok_or_else(|| bad(index, "record is not a map"))
    }

    /// Resolve a record value into a runtime value.
    pub(crate) fn value(&mut self, at: usize, json: &Json) -> Result<Value, DecodeError> {
        if let Some(v) = decode_scalar(json) {
            return Ok(v);
        }
        if let Some(target) = as_ref(json) {
            let r = self
                .objects
                .get(target)
                .copied()
                .flatten()
                .ok_or_else(|| bad(at, format!("#{target} is not an object record")))?;
            return Ok(Value::Object(r));
        }
        Err(bad(at, "unrecognized value encoding"))
    }

    fn object_at(&self, at: usize, json: &Json) -> Result<ObjRef, DecodeError> {
        let target = as_ref(json).ok_or_else(|| bad(at, "expected a record reference"))?;
        self.objects
            .get(target)
            .copied()
            .flatten()
            .ok_or_else(|| bad(at, format!("#{target} is not an object record")))
    }

    pub(crate) fn scope(&self, at: usize, json: &Json) -> Result<ScopeId, DecodeError> {
        let target = as_ref(json).ok_or_else(|| bad(at, "expected a scope reference"))?;
        self.scopes
            .get(target)
            .copied()
            .flatten()
            .ok_or_else(|| bad(at, format!("#{target} is not a scope record")))
    }

    fn ast_payload(&self, at: usize, json: &Json, field: &str) -> Result<(usize, &'a Json), DecodeError> {
        let target = as_ref(json).ok_or_else(|| bad(at, "expected an AST reference"))?;
        let rec = self.record(target)?;
        if rec.get("type").and_then(Json::as_str) != Some("AST-Node") {
            return Err(bad(at, format!("#{target} is not an AST record")));
        }
        let payload = rec
            .get(field)
            .ok_or_else(|| bad(target, format!("AST record lacks '{field}'")))?;
        Ok((target, payload))
    }

    pub(crate) fn ast_stmts(&mut self, at: usize, json: &Json) -> Result<Rc<[Statement]>, DecodeError> {
        let (target, payload) = self.ast_payload(at, json, "stmts")?;
        if let Some(cached) = self.stmts_cache.get(&target) {
            return Ok(cached.clone());
        }
        let stmts: Vec<Statement> = serde_json::from_value(payload.clone())
            .map_err(|e| bad(target, format!("statements: {e}")))?;
        let rc: Rc<[Statement]> = stmts.into();
        self.stmts_cache.insert(target, rc.clone());
        Ok(rc)
    }

    pub(crate) fn ast_stmt(&mut self, at: usize, json: &Json) -> Result<Rc<Statement>, DecodeError> {
        let (target, payload) = self.ast_payload(at, json, "stmt")?;
        if let Some(cached) = self.stmt_cache.get(&target) {
            return Ok(cached.clone());
        }
        let stmt: Statement = serde_json::from_value(payload.clone())
            .map_err(|e| bad(target, format!("statement: {e}")))?;
        let rc = Rc::new(stmt);
        self.stmt_cache.insert(target, rc.clone());
        Ok(rc)
    }

    pub(crate) fn ast_expr(&mut self, at: usize, json: &Json) -> Result<Rc<Expression>, DecodeError> {
        let (target, payload) = self.ast_payload(at, json, "expr")?;
        if let Some(cached) = self.expr_cache.get(&target) {
            return Ok(cached.clone());
        }
        let expr: Expression = serde_json::from_value(payload.clone())
            .map_err(|e| bad(target, format!("expression: {e}")))?;
        let rc = Rc::new(expr);
        self.expr_cache.insert(target, rc.clone());
        Ok(rc)
    }

    pub(crate) fn ast_func(
        &mut self,
        at: usize,
        json: &Json,
    ) -> Result<Rc<FunctionExpression>, DecodeError> {
        let (target, payload) = self.ast_payload(at, json, "func")?;
        if let Some(cached) = self.func_cache.get(&target) {
            return Ok(cached.clone());
        }
        let func: FunctionExpression = serde_json::from_value(payload.clone())
            .map_err(|e| bad(target, format!("function: {e}")))?;
        let rc = Rc::new(func);
        self.func_cache.insert(target, rc.clone());
        Ok(rc)
    }
}

/// Everything needed to overwrite one object in the apply phase.
struct StagedObject {
    target: ObjRef,
    proto: Option<ObjRef>,
    props: Vec<(JsString, PropertySlot)>,
    slots: InternalSlots,
    extensible: bool,
}

struct StagedScope {
    target: ScopeId,
    parent: Option<ScopeId>,
    vars: Vec<(JsString, Value)>,
}

pub(crate) fn restore(interp: &mut Interpreter, records: &[Json]) -> Result<(), DecodeError> {
    match stage_and_apply(interp, records) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Stub allocations made during staging are unreachable; reap
            // them so a failed decode leaves no residue.
            interp.collect();
            log::warn!("snapshot decode failed: {e}");
            Err(e)
        }
    }
}

fn stage_and_apply(interp: &mut Interpreter, records: &[Json]) -> Result<(), DecodeError> {
    // ── shape validation ────────────────────────────────────────────────
    if records.is_empty() {
        return Err(DecodeError::Shape("empty record array".into()));
    }
    let rec0 = records[0]
        .as_object()
        .ok_or_else(|| DecodeError::Shape("record 0 is not a map".into()))?;
    if rec0.get("type").and_then(Json::as_str) != Some("Interpreter") {
        return Err(DecodeError::Shape(
            "record 0 is not the interpreter root".into(),
        ));
    }
    let version = rec0.get("version").and_then(Json::as_u64).unwrap_or(1);
    if version > SNAPSHOT_VERSION {
        return Err(DecodeError::Shape(format!(
            "snapshot version {version} is newer than supported {SNAPSHOT_VERSION}"
        )));
    }
    for (i, rec) in records.iter().enumerate() {
        let map = rec
            .as_object()
            .ok_or_else(|| DecodeError::Shape(format!("record {i} is not a map")))?;
        if map.get("type").and_then(Json::as_str).is_none() {
            return Err(bad(i, "missing type tag"));
        }
        check_refs(rec, records.len())?;
    }

    let mut dec = Decoder {
        records,
        objects: vec![None; records.len()],
        scopes: vec![None; records.len()],
        stmts_cache: FxHashMap::default(),
        stmt_cache: FxHashMap::default(),
        expr_cache: FxHashMap::default(),
        func_cache: FxHashMap::default(),
    };

    let global_scope_idx = as_ref(
        rec0.get("global")
            .ok_or_else(|| bad(0, "missing global scope"))?,
    )
    .ok_or_else(|| bad(0, "global is not a reference"))?;

    // ── stubs ───────────────────────────────────────────────────────────
    for (i, rec) in records.iter().enumerate() {
        let map = rec.as_object().expect("validated above");
        let ty = map.get("type").and_then(Json::as_str).expect("validated");
        match ty {
            "Interpreter" => {
                if i != 0 {
                    return Err(bad(i, "interpreter record outside index 0"));
                }
            }
            "Scope" => {
                let id = if i == global_scope_idx {
                    ScopeId::GLOBAL
                } else {
                    interp.scopes.alloc(None)
                };
                dec.scopes[i] = Some(id);
            }
            "Thread" | "State" | "Registry" | "AST-Node" => {}
            "Function" if map.contains_key("id") => {
                let id = map.get("id").and_then(Json::as_str).ok_or_else(|| {
                    bad(i, "native function id is not a string")
                })?;
                let obj = interp
                    .native_object(id)
                    .ok_or_else(|| DecodeError::MissingNative(id.to_string()))?;
                dec.objects[i] = Some(obj);
            }
            other => {
                let class = class_from_type(interp, i, other)?;
                // A registry-named record rebinds to the pre-initialized
                // singleton rather than a fresh stub.
                let named = map
                    .get("name")
                    .and_then(Json::as_str)
                    .and_then(|n| interp.registry.lookup(n));
                let target = match named {
                    Some(existing) => existing,
                    None => {
                        let mut obj = PseudoObject::new(class.clone(), None);
                        obj.slots = default_slots(&class);
                        interp.alloc(obj)
                    }
                };
                dec.objects[i] = Some(target);
            }
        }
    }

    // ── staged parsing (all remaining fallible work) ────────────────────
    let mut staged_objects: Vec<(usize, StagedObject)> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let Some(target) = dec.objects[i] else { continue };
        let map = rec.as_object().expect("validated");
        if map.get("type").and_then(Json::as_str) == Some("Function") && map.contains_key("id") {
            // Native function identity record: no properties to apply.
            continue;
        }
        let staged = stage_object(interp, &mut dec, i, target, map)?;
        staged_objects.push((i, staged));
    }

    // Prototype cycles would hang every chain walk; reject them now.
    check_proto_cycles(interp, &staged_objects)?;

    let mut staged_scopes: Vec<StagedScope> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let Some(target) = dec.scopes[i] else { continue };
        let map = rec.as_object().expect("validated");
        let vars_json = map
            .get("vars")
            .and_then(Json::as_object)
            .ok_or_else(|| bad(i, "scope lacks vars"))?;
        let mut vars = Vec::with_capacity(vars_json.len());
        for (k, v) in vars_json {
            vars.push((JsString::from(k.as_str()), dec.value(i, v)?));
        }
        let parent = match map.get("parent") {
            None => None,
            Some(j) => Some(dec.scope(i, j)?),
        };
        staged_scopes.push(StagedScope {
            target,
            parent,
            vars,
        });
    }

    // Registry entries.
    let registry_idx = as_ref(
        rec0.get("registry")
            .ok_or_else(|| bad(0, "missing registry"))?,
    )
    .ok_or_else(|| bad(0, "registry is not a reference"))?;
    let registry_rec = dec.record(registry_idx)?;
    if registry_rec.get("type").and_then(Json::as_str) != Some("Registry") {
        return Err(bad(registry_idx, "not a registry record"));
    }
    let mut staged_registry: Vec<(JsString, ObjRef)> = Vec::new();
    for entry in registry_rec
        .get("entries")
        .and_then(Json::as_array)
        .ok_or_else(|| bad(registry_idx, "registry lacks entries"))?
    {
        let pair = entry
            .as_array()
            .filter(|p| p.len() == 2)
            .ok_or_else(|| bad(registry_idx, "registry entry is not a pair"))?;
        let name = pair[0]
            .as_str()
            .ok_or_else(|| bad(registry_idx, "registry name is not a string"))?;
        let obj = dec.object_at(registry_idx, &pair[1])?;
        staged_registry.push((JsString::from(name), obj));
    }

    // Threads.
    let mut staged_threads: Vec<Thread> = Vec::new();
    for tref in rec0
        .get("threads")
        .and_then(Json::as_array)
        .ok_or_else(|| bad(0, "missing threads"))?
    {
        let idx = as_ref(tref).ok_or_else(|| bad(0, "thread entry is not a reference"))?;
        staged_threads.push(stage_thread(&mut dec, idx)?);
    }
    let runnable: Vec<ThreadId> = rec0
        .get("runnable")
        .and_then(Json::as_array)
        .ok_or_else(|| bad(0, "missing runnable order"))?
        .iter()
        .map(|j| {
            j.as_u64()
                .map(ThreadId)
                .ok_or_else(|| bad(0, "runnable entry is not an id"))
        })
        .collect::<Result<_, _>>()?;

    // ── apply (infallible from here on) ─────────────────────────────────
    for (_, staged) in staged_objects {
        if let Some(obj) = interp.heap.get_mut(staged.target) {
            obj.proto = staged.proto;
            obj.properties.clear();
            for (k, slot) in staged.props {
                obj.properties.insert(k, slot);
            }
            obj.slots = staged.slots;
            obj.extensible = staged.extensible;
        }
    }
    for staged in staged_scopes {
        if let Some(scope) = interp.scopes.get_mut(staged.target) {
            scope.vars.clear();
            for (k, v) in staged.vars {
                scope.vars.insert(k, v);
            }
            scope.parent = staged.parent;
        }
    }
    for (name, obj) in staged_registry {
        interp.registry.register(name, obj);
    }
    interp.scheduler = Scheduler::new();
    for thread in staged_threads {
        interp.scheduler.restore_thread(thread);
    }
    interp.scheduler.requeue_restored(&runnable);

    post_deserialize(interp);
    log::debug!("snapshot restored {} records", records.len());
    Ok(())
}

/// Post-decode fixups: thread queues were rebuilt from recorded statuses;
/// here class-tag/slot consistency is checked and orphaned boot objects are
/// reaped. Server handles stay null until the host reconnects them.
fn post_deserialize(interp: &mut Interpreter) {
    for thread in interp.scheduler.threads() {
        debug_assert!(
            thread.status != ThreadStatus::Sleeping || thread.wake_at.is_some(),
            "sleeping thread without wake time"
        );
    }
    interp.collect();
}

/// Any `{"#": n}` anywhere in the record must be in bounds.
fn check_refs(json: &Json, len: usize) -> Result<(), DecodeError> {
    if let Some(n) = as_ref(json) {
        if n >= len {
            return Err(DecodeError::DanglingReference(n));
        }
        return Ok(());
    }
    match json {
        Json::Array(items) => {
            for item in items {
                check_refs(item, len)?;
            }
        }
        Json::Object(map) => {
            for v in map.values() {
                check_refs(v, len)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn class_from_type(
    interp: &Interpreter,
    index: usize,
    ty: &str,
) -> Result<ClassTag, DecodeError> {
    Ok(match ty {
        "Object" => ClassTag::Object,
        "Function" => ClassTag::Function,
        "Array" => ClassTag::Array,
        "Date" => ClassTag::Date,
        "RegExp" => ClassTag::RegExp,
        "Error" => ClassTag::Error,
        "Arguments" => ClassTag::Arguments,
        "Map" => ClassTag::Map,
        "Set" => ClassTag::Set,
        "IterableWeakMap" => ClassTag::WeakMap,
        "IterableWeakSet" => ClassTag::WeakSet,
        "ThreadHandle" => ClassTag::Thread,
        "Box" => ClassTag::Box,
        other => {
            if interp.user_tags.contains(other) {
                ClassTag::User(JsString::from(other))
            } else {
                let _ = index;
                return Err(DecodeError::UnknownType(other.to_string()));
            }
        }
    })
}

fn default_slots(class: &ClassTag) -> InternalSlots {
    match class {
        ClassTag::Array => InternalSlots::Array { length: 0 },
        ClassTag::Date => InternalSlots::Date { timestamp: 0.0 },
        ClassTag::RegExp => InternalSlots::RegExp {
            source: JsString::from(""),
            flags: JsString::from(""),
        },
        ClassTag::Map => InternalSlots::Map {
            entries: Vec::new(),
        },
        ClassTag::Set => InternalSlots::Set {
            entries: Vec::new(),
        },
        ClassTag::WeakMap => InternalSlots::WeakMap(Default::default()),
        ClassTag::WeakSet => InternalSlots::WeakSet(Default::default()),
        ClassTag::Thread => InternalSlots::Thread {
            thread: ThreadId(0),
        },
        _ => InternalSlots::None,
    }
}

fn stage_object(
    interp: &Interpreter,
    dec: &mut Decoder<'_>,
    index: usize,
    target: ObjRef,
    map: &Map<String, Json>,
) -> Result<StagedObject, DecodeError> {
    let ty = map.get("type").and_then(Json::as_str).expect("validated");
    let class = class_from_type(interp, index, ty)?;

    // Prototype: explicit null, explicit reference, or the class default.
    let proto = match map.get("proto") {
        Some(Json::Null) => None,
        Some(j) => Some(dec.object_at(index, j)?),
        None => super::encode::default_proto_name(&class)
            .and_then(|name| interp.registry.lookup(name)),
    };

    let set_of = |name: &str| -> FxHashSet<String> {
        map.get(name)
            .and_then(Json::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Json::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };
    let non_configurable = set_of("nonConfigurable");
    let non_enumerable = set_of("nonEnumerable");
    let non_writable = set_of("nonWritable");

    let mut props = Vec::new();
    if let Some(props_json) = map.get("props") {
        let props_json = props_json
            .as_object()
            .ok_or_else(|| bad(index, "props is not a map"))?;
        for (k, v) in props_json {
            let value = dec.value(index, v)?;
            props.push((
                JsString::from(k.as_str()),
                PropertySlot::with_attributes(
                    value,
                    !non_writable.contains(k),
                    !non_enumerable.contains(k),
                    !non_configurable.contains(k),
                ),
            ));
        }
    }

    let slots = match &class {
        ClassTag::Array => {
            let length = props
                .iter()
                .find(|(k, _)| k.as_str() == "length")
                .map(|(_, slot)| slot.value.to_number_primitive())
                .unwrap_or(0.0);
            InternalSlots::Array {
                length: if length.is_finite() && length >= 0.0 {
                    length as u32
                } else {
                    0
                },
            }
        }
        ClassTag::Date => {
            let data = map
                .get("data")
                .and_then(Json::as_str)
                .ok_or_else(|| bad(index, "date lacks data"))?;
            let timestamp = parse_date(data)
                .ok_or_else(|| DecodeError::InvalidDate(data.to_string()))?;
            InternalSlots::Date { timestamp }
        }
        ClassTag::RegExp => InternalSlots::RegExp {
            source: JsString::from(
                map.get("source")
                    .and_then(Json::as_str)
                    .ok_or_else(|| bad(index, "regexp lacks source"))?,
            ),
            flags: JsString::from(
                map.get("flags")
                    .and_then(Json::as_str)
                    .ok_or_else(|| bad(index, "regexp lacks flags"))?,
            ),
        },
        ClassTag::Map => {
            let mut entries = Vec::new();
            for entry in map
                .get("entries")
                .and_then(Json::as_array)
                .ok_or_else(|| bad(index, "map lacks entries"))?
            {
                let pair = entry
                    .as_array()
                    .filter(|p| p.len() == 2)
                    .ok_or_else(|| bad(index, "map entry is not a pair"))?;
                entries.push((dec.value(index, &pair[0])?, dec.value(index, &pair[1])?));
            }
            InternalSlots::Map { entries }
        }
        ClassTag::Set => {
            let mut entries = Vec::new();
            for item in map
                .get("data")
                .and_then(Json::as_array)
                .ok_or_else(|| bad(index, "set lacks data"))?
            {
                entries.push(dec.value(index, item)?);
            }
            InternalSlots::Set { entries }
        }
        ClassTag::WeakMap => {
            let mut entries = Vec::new();
            for entry in map
                .get("entries")
                .and_then(Json::as_array)
                .ok_or_else(|| bad(index, "weak map lacks entries"))?
            {
                let pair = entry
                    .as_array()
                    .filter(|p| p.len() == 2)
                    .ok_or_else(|| bad(index, "weak map entry is not a pair"))?;
                let key = dec.object_at(index, &pair[0])?;
                entries.push((key.id(), dec.value(index, &pair[1])?));
            }
            let mut weak = crate::weak::IterableWeakMap::new();
            weak.restore_entries(entries);
            InternalSlots::WeakMap(weak)
        }
        ClassTag::WeakSet => {
            let mut members = Vec::new();
            for item in map
                .get("data")
                .and_then(Json::as_array)
                .ok_or_else(|| bad(index, "weak set lacks data"))?
            {
                members.push(dec.object_at(index, item)?.id());
            }
            let mut weak = crate::weak::IterableWeakSet::new();
            weak.restore_members(members);
            InternalSlots::WeakSet(weak)
        }
        ClassTag::Function => {
            // Interpreted functions only; native ids were resolved in the
            // stub pass and never reach here.
            let params: Vec<String> = map
                .get("params")
                .and_then(Json::as_array)
                .ok_or_else(|| bad(index, "function lacks params"))?
                .iter()
                .map(|j| {
                    j.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| bad(index, "param is not a string"))
                })
                .collect::<Result<_, _>>()?;
            let body = dec.ast_stmts(
                index,
                map.get("body").ok_or_else(|| bad(index, "function lacks body"))?,
            )?;
            let scope = dec.scope(
                index,
                map.get("scope")
                    .ok_or_else(|| bad(index, "function lacks scope"))?,
            )?;
            InternalSlots::Function(FunctionSlot::Interpreted(InterpretedFunction {
                name: map.get("fname").and_then(Json::as_str).map(JsString::from),
                params: params.into(),
                body,
                scope,
            }))
        }
        ClassTag::Thread => InternalSlots::Thread {
            thread: ThreadId(
                map.get("thread")
                    .and_then(Json::as_u64)
                    .ok_or_else(|| bad(index, "thread handle lacks id"))?,
            ),
        },
        _ => InternalSlots::None,
    };

    Ok(StagedObject {
        target,
        proto,
        props,
        slots,
        extensible: map.get("isExtensible").and_then(Json::as_bool) != Some(false),
    })
}

fn check_proto_cycles(
    interp: &Interpreter,
    staged: &[(usize, StagedObject)],
) -> Result<(), DecodeError> {
    let staged_protos: FxHashMap<u64, Option<ObjRef>> = staged
        .iter()
        .map(|(_, s)| (s.target.id(), s.proto))
        .collect();
    for (index, s) in staged {
        let mut seen: FxHashSet<u64> = FxHashSet::default();
        seen.insert(s.target.id());
        let mut current = s.proto;
        while let Some(r) = current {
            if !seen.insert(r.id()) {
                return Err(DecodeError::PrototypeCycle(*index));
            }
            current = match staged_protos.get(&r.id()) {
                Some(p) => *p,
                None => interp.heap.get(r).and_then(|o| o.proto),
            };
        }
    }
    Ok(())
}

fn stage_thread(dec: &mut Decoder<'_>, index: usize) -> Result<Thread, DecodeError> {
    let map = dec.record(index)?;
    if map.get("type").and_then(Json::as_str) != Some("Thread") {
        return Err(bad(index, "not a thread record"));
    }
    let id = ThreadId(
        map.get("id")
            .and_then(Json::as_u64)
            .ok_or_else(|| bad(index, "thread lacks id"))?,
    );
    let status = match map.get("status").and_then(Json::as_str) {
        Some("runnable") => ThreadStatus::Runnable,
        Some("sleeping") => ThreadStatus::Sleeping,
        Some("blocked") => ThreadStatus::Blocked,
        Some("done") => ThreadStatus::Done,
        _ => return Err(bad(index, "unknown thread status")),
    };
    let wake_at = map.get("wakeAt").and_then(Json::as_f64);
    let blocker = map
        .get("blocker")
        .and_then(Json::as_u64)
        .map(|h| Blocker::Io(crate::host::HostHandle(h)));
    let killed = map.get("killed").and_then(Json::as_bool) == Some(true);
    let result = dec.value(index, map.get("result").unwrap_or(&Json::Null))?;
    let pending = match map.get("pending") {
        None => None,
        Some(j) => Some(state::parse_abrupt(dec, index, j)?),
    };

    // Walk the state chain leaf -> root, then reverse into stack order.
    let mut chain: Vec<usize> = Vec::new();
    let mut seen: FxHashSet<usize> = FxHashSet::default();
    let mut current = match map.get("state") {
        None | Some(Json::Null) => None,
        Some(j) => Some(as_ref(j).ok_or_else(|| bad(index, "state is not a reference"))?),
    };
    while let Some(state_idx) = current {
        if !seen.insert(state_idx) {
            return Err(bad(index, "state chain cycle"));
        }
        chain.push(state_idx);
        let srec = dec.record(state_idx)?;
        if srec.get("type").and_then(Json::as_str) != Some("State") {
            return Err(bad(state_idx, "not a state record"));
        }
        current = match srec.get("parent") {
            None | Some(Json::Null) => None,
            Some(j) => Some(as_ref(j).ok_or_else(|| bad(state_idx, "parent is not a reference"))?),
        };
    }
    chain.reverse();

    let mut frames = Vec::with_capacity(chain.len());
    for state_idx in chain {
        let srec = dec.record(state_idx)?;
        let scope = dec.scope(
            state_idx,
            srec.get("scope")
                .ok_or_else(|| bad(state_idx, "state lacks scope"))?,
        )?;
        let kind = state::parse_frame(dec, state_idx, srec)?;
        frames.push(StateFrame::new(scope, kind));
    }

    let mut thread = Thread::new(id, frames);
    thread.status = status;
    thread.wake_at = wake_at;
    thread.blocker = blocker;
    thread.killed = killed;
    thread.result = result;
    thread.pending = pending;
    Ok(thread)
}
