//! Snapshot encoder: depth-first walk from the interpreter root, assigning
//! record indices at first visit.

use std::rc::Rc;

use serde_json::{Map, Value as Json};

use crate::ast::{Expression, FunctionExpression, Statement};
use crate::heap::ObjRef;
use crate::interpreter::Interpreter;
use crate::object::{ClassTag, FunctionSlot, InternalSlots};
use crate::prelude::{FxHashMap, FxHashSet};
use crate::scheduler::{Blocker, Thread};
use crate::scope::ScopeId;
use crate::value::Value;

use super::{encode_scalar, make_ref, state, SNAPSHOT_VERSION};

pub(crate) struct Encoder<'a> {
    pub(crate) interp: &'a Interpreter,
    /// Strongly-live object ids; weak entries outside this set are dropped.
    live: FxHashSet<u64>,
    records: Vec<Option<Map<String, Json>>>,
    obj_index: FxHashMap<u64, usize>,
    scope_index: FxHashMap<usize, usize>,
    ast_index: FxHashMap<usize, usize>,
}

pub(crate) fn encode(interp: &Interpreter) -> Vec<Json> {
    let (live, _) = interp.trace_reachable();
    let mut enc = Encoder {
        interp,
        live,
        records: Vec::new(),
        obj_index: FxHashMap::default(),
        scope_index: FxHashMap::default(),
        ast_index: FxHashMap::default(),
    };

    let root = enc.reserve();
    let global = enc.scope_record(ScopeId::GLOBAL);
    let registry = enc.registry_record();
    let threads: Vec<Json> = interp
        .scheduler
        .threads()
        .into_iter()
        .map(|t| make_ref(enc.thread_record(t)))
        .collect();
    let runnable: Vec<Json> = interp
        .scheduler
        .runnable_order()
        .into_iter()
        .map(|id| serde_json::json!(id.0))
        .collect();

    let mut rec = Map::new();
    rec.insert("type".into(), "Interpreter".into());
    rec.insert("#".into(), serde_json::json!(root));
    rec.insert("version".into(), serde_json::json!(SNAPSHOT_VERSION));
    rec.insert("global".into(), make_ref(global));
    rec.insert("registry".into(), make_ref(registry));
    rec.insert("threads".into(), Json::Array(threads));
    rec.insert("runnable".into(), Json::Array(runnable));
    enc.fill(root, rec);

    let count = enc.records.len();
    log::debug!("snapshot encoded {count} records");
    enc.records
        .into_iter()
        .map(|r| Json::Object(r.expect("all reserved records are filled")))
        .collect()
}

impl<'a> Encoder<'a> {
    fn reserve(&mut self) -> usize {
        self.records.push(None);
        self.records.len() - 1
    }

    fn fill(&mut self, index: usize, rec: Map<String, Json>) {
        self.records[index] = Some(rec);
    }

    /// Encode a value; `Server`-class references and dead handles collapse
    /// to null.
    pub(crate) fn value(&mut self, v: &Value) -> Json {
        if let Some(scalar) = encode_scalar(v) {
            return scalar;
        }
        let Value::Object(r) = v else { unreachable!("scalar handled") };
        match self.interp.heap.get(*r) {
            None => Json::Null,
            Some(obj) if matches!(obj.class, ClassTag::Server) => Json::Null,
            Some(_) => make_ref(self.object_record(*r)),
        }
    }

    pub(crate) fn object_record(&mut self, r: ObjRef) -> usize {
        if let Some(&idx) = self.obj_index.get(&r.id()) {
            return idx;
        }
        let idx = self.reserve();
        self.obj_index.insert(r.id(), idx);

        let Some(obj) = self.interp.heap.get(r) else {
            // Dead handle that slipped past a value check; emit an empty
            // object so the index stays dense.
            let mut rec = Map::new();
            rec.insert("type".into(), "Object".into());
            rec.insert("#".into(), serde_json::json!(idx));
            self.fill(idx, rec);
            return idx;
        };

        let mut rec = Map::new();

        // Native functions are pure identity: id only, no properties.
        if let InternalSlots::Function(FunctionSlot::Native { id }) = &obj.slots {
            rec.insert("type".into(), "Function".into());
            rec.insert("#".into(), serde_json::json!(idx));
            rec.insert("id".into(), id.as_str().into());
            if let Some(name) = self.interp.registry.name_of(r) {
                rec.insert("name".into(), name.as_str().into());
            }
            self.fill(idx, rec);
            return idx;
        }

        rec.insert("type".into(), record_type(&obj.class).into());
        rec.insert("#".into(), serde_json::json!(idx));
        if let Some(name) = self.interp.registry.name_of(r) {
            rec.insert("name".into(), name.as_str().into());
        }

        // Prototype: omitted when it is the class default singleton.
        let default_proto = default_proto_name(&obj.class)
            .and_then(|name| self.interp.registry.lookup(name));
        let proto = obj.proto;
        if proto != default_proto {
            match proto {
                None => {
                    rec.insert("proto".into(), Json::Null);
                }
                Some(p) => {
                    let proto_ref = self.object_record(p);
                    rec.insert("proto".into(), make_ref(proto_ref));
                }
            }
        }

        // Properties, minus the per-class prune list, with companion
        // attribute lists.
        let prune = pruned_props(&obj.class);
        let keys: Vec<(String, Value, bool, bool, bool)> = obj
            .properties
            .iter()
            .filter(|(k, _)| !prune.contains(&k.as_str()))
            .map(|(k, slot)| {
                (
                    k.as_str().to_string(),
                    slot.value.clone(),
                    slot.configurable,
                    slot.enumerable,
                    slot.writable,
                )
            })
            .collect();
        let mut props = Map::new();
        let mut non_configurable = Vec::new();
        let mut non_enumerable = Vec::new();
        let mut non_writable = Vec::new();
        for (k, v, configurable, enumerable, writable) in keys {
            let encoded = self.value(&v);
            if !configurable {
                non_configurable.push(Json::String(k.clone()));
            }
            if !enumerable {
                non_enumerable.push(Json::String(k.clone()));
            }
            if !writable {
                non_writable.push(Json::String(k.clone()));
            }
            props.insert(k, encoded);
        }
        if !props.is_empty() {
            rec.insert("props".into(), Json::Object(props));
        }
        if !non_configurable.is_empty() {
            rec.insert("nonConfigurable".into(), Json::Array(non_configurable));
        }
        if !non_enumerable.is_empty() {
            rec.insert("nonEnumerable".into(), Json::Array(non_enumerable));
        }
        if !non_writable.is_empty() {
            rec.insert("nonWritable".into(), Json::Array(non_writable));
        }

        let obj = self.interp.heap.get(r).expect("still live");
        if !obj.extensible {
            rec.insert("isExtensible".into(), Json::Bool(false));
        }

        // Type-specific extras.
        let slots = obj.slots.clone();
        match slots {
            InternalSlots::Date { timestamp } => {
                rec.insert("data".into(), super::format_date(timestamp).into());
            }
            InternalSlots::RegExp { source, flags } => {
                rec.insert("source".into(), source.as_str().into());
                rec.insert("flags".into(), flags.as_str().into());
            }
            InternalSlots::Map { entries } => {
                let encoded: Vec<Json> = entries
                    .iter()
                    .map(|(k, v)| Json::Array(vec![self.value(k), self.value(v)]))
                    .collect();
                rec.insert("entries".into(), Json::Array(encoded));
            }
            InternalSlots::Set { entries } => {
                let encoded: Vec<Json> = entries.iter().map(|v| self.value(v)).collect();
                rec.insert("data".into(), Json::Array(encoded));
            }
            InternalSlots::WeakMap(map) => {
                // Entries whose key the collector would have reaped are
                // absent; encoding is not an observation, so the container
                // itself is untouched.
                let mut encoded = Vec::new();
                for (key_id, v) in map.raw_entries() {
                    if self.live.contains(key_id) && self.interp.heap.is_live(*key_id) {
                        let key_ref = self.object_record(ObjRef::from_id(*key_id));
                        encoded.push(Json::Array(vec![make_ref(key_ref), self.value(v)]));
                    }
                }
                rec.insert("entries".into(), Json::Array(encoded));
            }
            InternalSlots::WeakSet(set) => {
                let mut encoded = Vec::new();
                for member_id in set.raw_members() {
                    if self.live.contains(member_id) && self.interp.heap.is_live(*member_id) {
                        let member_ref = self.object_record(ObjRef::from_id(*member_id));
                        encoded.push(make_ref(member_ref));
                    }
                }
                rec.insert("data".into(), Json::Array(encoded));
            }
            InternalSlots::Function(FunctionSlot::Interpreted(f)) => {
                let params: Vec<Json> = f
                    .params
                    .iter()
                    .map(|p| Json::String(p.clone()))
                    .collect();
                rec.insert("params".into(), Json::Array(params));
                let body = self.ast_stmts(&f.body);
                rec.insert("body".into(), body);
                let scope = self.scope_record(f.scope);
                rec.insert("scope".into(), make_ref(scope));
                if let Some(name) = &f.name {
                    rec.insert("fname".into(), name.as_str().into());
                }
            }
            InternalSlots::Thread { thread } => {
                rec.insert("thread".into(), serde_json::json!(thread.0));
            }
            InternalSlots::Function(FunctionSlot::Native { .. }) => unreachable!("handled above"),
            InternalSlots::Array { .. } | InternalSlots::Server { .. } | InternalSlots::None => {}
        }

        self.fill(idx, rec);
        idx
    }

    pub(crate) fn scope_record(&mut self, id: ScopeId) -> usize {
        if let Some(&idx) = self.scope_index.get(&id.index()) {
            return idx;
        }
        let idx = self.reserve();
        self.scope_index.insert(id.index(), idx);

        let mut rec = Map::new();
        rec.insert("type".into(), "Scope".into());
        rec.insert("#".into(), serde_json::json!(idx));
        let (vars, parent) = match self.interp.scopes.get(id) {
            Some(scope) => (
                scope
                    .vars
                    .iter()
                    .map(|(k, v)| (k.as_str().to_string(), v.clone()))
                    .collect::<Vec<_>>(),
                scope.parent,
            ),
            None => (Vec::new(), None),
        };
        let mut encoded_vars = Map::new();
        for (k, v) in vars {
            let ev = self.value(&v);
            encoded_vars.insert(k, ev);
        }
        rec.insert("vars".into(), Json::Object(encoded_vars));
        if let Some(parent) = parent {
            let parent_ref = self.scope_record(parent);
            rec.insert("parent".into(), make_ref(parent_ref));
        }
        self.fill(idx, rec);
        idx
    }

    fn registry_record(&mut self) -> usize {
        let idx = self.reserve();
        let entries: Vec<(String, ObjRef)> = self
            .interp
            .registry
            .iter()
            .map(|(name, r)| (name.as_str().to_string(), r))
            .collect();
        let mut encoded = Vec::new();
        for (name, r) in entries {
            let obj_ref = self.object_record(r);
            encoded.push(Json::Array(vec![Json::String(name), make_ref(obj_ref)]));
        }
        let mut rec = Map::new();
        rec.insert("type".into(), "Registry".into());
        rec.insert("#".into(), serde_json::json!(idx));
        rec.insert("entries".into(), Json::Array(encoded));
        self.fill(idx, rec);
        idx
    }

    fn thread_record(&mut self, thread: &Thread) -> usize {
        let idx = self.reserve();

        // State records chain leaf -> root through `parent`.
        let mut parent: Option<usize> = None;
        for frame in &thread.frames {
            let state_idx = self.reserve();
            let mut rec = state::encode_frame(self, frame);
            rec.insert("type".into(), "State".into());
            rec.insert("#".into(), serde_json::json!(state_idx));
            let scope = self.scope_record(frame.scope);
            rec.insert("scope".into(), make_ref(scope));
            match parent {
                Some(p) => rec.insert("parent".into(), make_ref(p)),
                None => rec.insert("parent".into(), Json::Null),
            };
            self.fill(state_idx, rec);
            parent = Some(state_idx);
        }

        let mut rec = Map::new();
        rec.insert("type".into(), "Thread".into());
        rec.insert("#".into(), serde_json::json!(idx));
        rec.insert("id".into(), serde_json::json!(thread.id.0));
        rec.insert("status".into(), thread.status.name().into());
        if let Some(at) = thread.wake_at {
            rec.insert("wakeAt".into(), serde_json::json!(at));
        }
        if let Some(Blocker::Io(handle)) = thread.blocker {
            rec.insert("blocker".into(), serde_json::json!(handle.0));
        }
        if thread.killed {
            rec.insert("killed".into(), Json::Bool(true));
        }
        let result = self.value(&thread.result.clone());
        rec.insert("result".into(), result);
        if let Some(pending) = &thread.pending {
            let encoded = state::encode_abrupt(self, &pending.clone());
            rec.insert("pending".into(), encoded);
        }
        match parent {
            Some(leaf) => rec.insert("state".into(), make_ref(leaf)),
            None => rec.insert("state".into(), Json::Null),
        };
        self.fill(idx, rec);
        idx
    }

    // ── AST records, deduplicated by shared pointer ─────────────────────

    pub(crate) fn ast_stmts(&mut self, body: &Rc<[Statement]>) -> Json {
        let key = Rc::as_ptr(body) as *const u8 as usize;
        self.ast_record(key, "stmts", || serde_json::to_value(&**body))
    }

    pub(crate) fn ast_stmt(&mut self, stmt: &Rc<Statement>) -> Json {
        let key = Rc::as_ptr(stmt) as *const u8 as usize;
        self.ast_record(key, "stmt", || serde_json::to_value(&**stmt))
    }

    pub(crate) fn ast_expr(&mut self, expr: &Rc<Expression>) -> Json {
        let key = Rc::as_ptr(expr) as *const u8 as usize;
        self.ast_record(key, "expr", || serde_json::to_value(&**expr))
    }

    pub(crate) fn ast_func(&mut self, func: &Rc<FunctionExpression>) -> Json {
        let key = Rc::as_ptr(func) as *const u8 as usize;
        self.ast_record(key, "func", || serde_json::to_value(&**func))
    }

    fn ast_record(
        &mut self,
        key: usize,
        field: &str,
        to_json: impl FnOnce() -> serde_json::Result<Json>,
    ) -> Json {
        if let Some(&idx) = self.ast_index.get(&key) {
            return make_ref(idx);
        }
        let idx = self.reserve();
        self.ast_index.insert(key, idx);
        let mut rec = Map::new();
        rec.insert("type".into(), "AST-Node".into());
        rec.insert("#".into(), serde_json::json!(idx));
        rec.insert(
            field.into(),
            to_json().expect("AST types serialize infallibly"),
        );
        self.fill(idx, rec);
        make_ref(idx)
    }
}

/// Record type tag per class.
pub(crate) fn record_type(class: &ClassTag) -> &str {
    match class {
        // The scheduler's threads own the "Thread" tag; the pseudo-object
        // wrapper gets its own.
        ClassTag::Thread => "ThreadHandle",
        other => other.name(),
    }
}

/// The registry name of each class's default prototype.
pub(crate) fn default_proto_name(class: &ClassTag) -> Option<&'static str> {
    Some(match class {
        ClassTag::Object | ClassTag::Arguments | ClassTag::User(_) => "Object.prototype",
        ClassTag::Function => "Function.prototype",
        ClassTag::Array => "Array.prototype",
        ClassTag::Date => "Date.prototype",
        ClassTag::RegExp => "RegExp.prototype",
        ClassTag::Error => "Error.prototype",
        ClassTag::Map => "Map.prototype",
        ClassTag::Set => "Set.prototype",
        ClassTag::WeakMap => "WeakMap.prototype",
        ClassTag::WeakSet => "WeakSet.prototype",
        ClassTag::Thread => "Thread.prototype",
        ClassTag::Box => "Box.prototype",
        ClassTag::Server => return None,
    })
}

/// Per-class property prune list: internal book-keeping that must not be
/// recorded. Most classes carry their extras in internal slots instead, so
/// the lists are short.
pub(crate) fn pruned_props(class: &ClassTag) -> &'static [&'static str] {
    match class {
        ClassTag::Server => &["connection"],
        _ => &[],
    }
}
