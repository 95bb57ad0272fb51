//! `Map`, `Set`, and the iterable weak containers.
//!
//! Strong containers keep entries in insertion order in their internal
//! slots. The weak variants are backed by `IterableWeakMap`/`IterableWeakSet`
//! and expose the same associative API plus ordered iteration over the
//! currently-live entries; `size`, `has`, and the iteration methods are the
//! observation points that drop dead entries.

use crate::error::NativeError;
use crate::heap::ObjRef;
use crate::object::{ClassTag, InternalSlots, PseudoObject};
use crate::value::Value;
use crate::weak::{IterableWeakMap, IterableWeakSet};

use super::super::Interpreter;
use super::{define_constructor, define_method};

pub fn register(interp: &mut Interpreter) {
    interp.natives.register("Map", map_ctor, 0);
    interp.natives.register("Map.prototype.get", map_get, 1);
    interp.natives.register("Map.prototype.set", map_set, 2);
    interp.natives.register("Map.prototype.has", map_has, 1);
    interp.natives.register("Map.prototype.delete", map_delete, 1);
    interp.natives.register("Map.prototype.size", map_size, 0);

    interp.natives.register("Set", set_ctor, 0);
    interp.natives.register("Set.prototype.add", set_add, 1);
    interp.natives.register("Set.prototype.has", set_has, 1);
    interp.natives.register("Set.prototype.delete", set_delete, 1);
    interp.natives.register("Set.prototype.size", set_size, 0);
    interp.natives.register("Set.prototype.values", set_values, 0);

    interp.natives.register("WeakMap", weak_map_ctor, 0);
    interp
        .natives
        .register("WeakMap.prototype.get", weak_map_get, 1);
    interp
        .natives
        .register("WeakMap.prototype.set", weak_map_set, 2);
    interp
        .natives
        .register("WeakMap.prototype.has", weak_map_has, 1);
    interp
        .natives
        .register("WeakMap.prototype.delete", weak_map_delete, 1);
    interp
        .natives
        .register("WeakMap.prototype.size", weak_map_size, 0);
    interp
        .natives
        .register("WeakMap.prototype.keys", weak_map_keys, 0);

    interp.natives.register("WeakSet", weak_set_ctor, 0);
    interp
        .natives
        .register("WeakSet.prototype.add", weak_set_add, 1);
    interp
        .natives
        .register("WeakSet.prototype.has", weak_set_has, 1);
    interp
        .natives
        .register("WeakSet.prototype.delete", weak_set_delete, 1);
    interp
        .natives
        .register("WeakSet.prototype.size", weak_set_size, 0);
    interp
        .natives
        .register("WeakSet.prototype.values", weak_set_values, 0);

    define_constructor(interp, "Map");
    define_constructor(interp, "Set");
    define_constructor(interp, "WeakMap");
    define_constructor(interp, "WeakSet");

    let map_proto = interp.registry.lookup("Map.prototype").expect("booted");
    define_method(interp, map_proto, "get", "Map.prototype.get");
    define_method(interp, map_proto, "set", "Map.prototype.set");
    define_method(interp, map_proto, "has", "Map.prototype.has");
    define_method(interp, map_proto, "delete", "Map.prototype.delete");
    define_method(interp, map_proto, "size", "Map.prototype.size");

    let set_proto = interp.registry.lookup("Set.prototype").expect("booted");
    define_method(interp, set_proto, "add", "Set.prototype.add");
    define_method(interp, set_proto, "has", "Set.prototype.has");
    define_method(interp, set_proto, "delete", "Set.prototype.delete");
    define_method(interp, set_proto, "size", "Set.prototype.size");
    define_method(interp, set_proto, "values", "Set.prototype.values");

    let wm_proto = interp.registry.lookup("WeakMap.prototype").expect("booted");
    define_method(interp, wm_proto, "get", "WeakMap.prototype.get");
    define_method(interp, wm_proto, "set", "WeakMap.prototype.set");
    define_method(interp, wm_proto, "has", "WeakMap.prototype.has");
    define_method(interp, wm_proto, "delete", "WeakMap.prototype.delete");
    define_method(interp, wm_proto, "size", "WeakMap.prototype.size");
    define_method(interp, wm_proto, "keys", "WeakMap.prototype.keys");

    let ws_proto = interp.registry.lookup("WeakSet.prototype").expect("booted");
    define_method(interp, ws_proto, "add", "WeakSet.prototype.add");
    define_method(interp, ws_proto, "has", "WeakSet.prototype.has");
    define_method(interp, ws_proto, "delete", "WeakSet.prototype.delete");
    define_method(interp, ws_proto, "size", "WeakSet.prototype.size");
    define_method(interp, ws_proto, "values", "WeakSet.prototype.values");
}

/// SameValueZero: strict equality, except NaN matches NaN.
fn same_value_zero(a: &Value, b: &Value) -> bool {
    if let (Value::Number(x), Value::Number(y)) = (a, b) {
        if x.is_nan() && y.is_nan() {
            return true;
        }
    }
    a.strict_equals(b)
}

fn this_tagged(
    interp: &Interpreter,
    this: &Value,
    class: ClassTag,
    who: &str,
) -> Result<ObjRef, NativeError> {
    match this {
        Value::Object(r) if interp.heap.get(*r).map(|o| o.class == class).unwrap_or(false) => {
            Ok(*r)
        }
        _ => Err(NativeError::type_error(format!(
            "{who} called on an incompatible receiver"
        ))),
    }
}

fn arg_object(args: &[Value], who: &str) -> Result<ObjRef, NativeError> {
    match args.first() {
        Some(Value::Object(r)) => Ok(*r),
        _ => Err(NativeError::type_error(format!(
            "{who}: key must be an object"
        ))),
    }
}

// ── Map ───────────────────────────────────────────────────────────────

fn map_ctor(interp: &mut Interpreter, _this: Value, _args: &[Value]) -> Result<Value, NativeError> {
    let proto = interp.proto_for("Map.prototype");
    let mut obj = PseudoObject::new(ClassTag::Map, proto);
    obj.slots = InternalSlots::Map {
        entries: Vec::new(),
    };
    Ok(Value::Object(interp.alloc(obj)))
}

fn map_entries<'a>(
    interp: &'a mut Interpreter,
    r: ObjRef,
) -> Result<&'a mut Vec<(Value, Value)>, NativeError> {
    match interp.heap.get_mut(r).map(|o| &mut o.slots) {
        Some(InternalSlots::Map { entries }) => Ok(entries),
        _ => Err(NativeError::type_error("not a Map")),
    }
}

fn map_get(interp: &mut Interpreter, this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::Map, "Map.prototype.get")?;
    let key = args.first().cloned().unwrap_or(Value::Undefined);
    let entries = map_entries(interp, r)?;
    Ok(entries
        .iter()
        .find(|(k, _)| same_value_zero(k, &key))
        .map(|(_, v)| v.clone())
        .unwrap_or(Value::Undefined))
}

fn map_set(interp: &mut Interpreter, this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::Map, "Map.prototype.set")?;
    let key = args.first().cloned().unwrap_or(Value::Undefined);
    let value = args.get(1).cloned().unwrap_or(Value::Undefined);
    let entries = map_entries(interp, r)?;
    match entries.iter_mut().find(|(k, _)| same_value_zero(k, &key)) {
        Some((_, v)) => *v = value,
        None => entries.push((key, value)),
    }
    Ok(Value::Object(r))
}

fn map_has(interp: &mut Interpreter, this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::Map, "Map.prototype.has")?;
    let key = args.first().cloned().unwrap_or(Value::Undefined);
    let entries = map_entries(interp, r)?;
    Ok(Value::Boolean(
        entries.iter().any(|(k, _)| same_value_zero(k, &key)),
    ))
}

fn map_delete(interp: &mut Interpreter, this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::Map, "Map.prototype.delete")?;
    let key = args.first().cloned().unwrap_or(Value::Undefined);
    let entries = map_entries(interp, r)?;
    let before = entries.len();
    entries.retain(|(k, _)| !same_value_zero(k, &key));
    Ok(Value::Boolean(entries.len() != before))
}

fn map_size(interp: &mut Interpreter, this: Value, _args: &[Value]) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::Map, "Map.prototype.size")?;
    let entries = map_entries(interp, r)?;
    Ok(Value::Number(entries.len() as f64))
}

// ── Set ───────────────────────────────────────────────────────────────

fn set_ctor(interp: &mut Interpreter, _this: Value, _args: &[Value]) -> Result<Value, NativeError> {
    let proto = interp.proto_for("Set.prototype");
    let mut obj = PseudoObject::new(ClassTag::Set, proto);
    obj.slots = InternalSlots::Set {
        entries: Vec::new(),
    };
    Ok(Value::Object(interp.alloc(obj)))
}

fn set_entries<'a>(
    interp: &'a mut Interpreter,
    r: ObjRef,
) -> Result<&'a mut Vec<Value>, NativeError> {
    match interp.heap.get_mut(r).map(|o| &mut o.slots) {
        Some(InternalSlots::Set { entries }) => Ok(entries),
        _ => Err(NativeError::type_error("not a Set")),
    }
}

fn set_add(interp: &mut Interpreter, this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::Set, "Set.prototype.add")?;
    let member = args.first().cloned().unwrap_or(Value::Undefined);
    let entries = set_entries(interp, r)?;
    if !entries.iter().any(|v| same_value_zero(v, &member)) {
        entries.push(member);
    }
    Ok(Value::Object(r))
}

fn set_has(interp: &mut Interpreter, this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::Set, "Set.prototype.has")?;
    let member = args.first().cloned().unwrap_or(Value::Undefined);
    let entries = set_entries(interp, r)?;
    Ok(Value::Boolean(
        entries.iter().any(|v| same_value_zero(v, &member)),
    ))
}

fn set_delete(interp: &mut Interpreter, this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::Set, "Set.prototype.delete")?;
    let member = args.first().cloned().unwrap_or(Value::Undefined);
    let entries = set_entries(interp, r)?;
    let before = entries.len();
    entries.retain(|v| !same_value_zero(v, &member));
    Ok(Value::Boolean(entries.len() != before))
}

fn set_size(interp: &mut Interpreter, this: Value, _args: &[Value]) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::Set, "Set.prototype.size")?;
    let entries = set_entries(interp, r)?;
    Ok(Value::Number(entries.len() as f64))
}

fn set_values(interp: &mut Interpreter, this: Value, _args: &[Value]) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::Set, "Set.prototype.values")?;
    let values = set_entries(interp, r)?.clone();
    Ok(Value::Object(interp.create_array_from(values)))
}

// ── weak containers ───────────────────────────────────────────────────
//
// The container is taken out of the object's slot while heap liveness is
// consulted, then put back; that keeps the borrow on the heap free for the
// liveness checks.

fn with_weak_map<T>(
    interp: &mut Interpreter,
    r: ObjRef,
    f: impl FnOnce(&mut IterableWeakMap, &crate::heap::Heap) -> T,
) -> Result<T, NativeError> {
    let mut map = match interp.heap.get_mut(r).map(|o| &mut o.slots) {
        Some(InternalSlots::WeakMap(map)) => std::mem::take(map),
        _ => return Err(NativeError::type_error("not a WeakMap")),
    };
    let out = f(&mut map, &interp.heap);
    if let Some(InternalSlots::WeakMap(slot)) = interp.heap.get_mut(r).map(|o| &mut o.slots) {
        *slot = map;
    }
    Ok(out)
}

fn with_weak_set<T>(
    interp: &mut Interpreter,
    r: ObjRef,
    f: impl FnOnce(&mut IterableWeakSet, &crate::heap::Heap) -> T,
) -> Result<T, NativeError> {
    let mut set = match interp.heap.get_mut(r).map(|o| &mut o.slots) {
        Some(InternalSlots::WeakSet(set)) => std::mem::take(set),
        _ => return Err(NativeError::type_error("not a WeakSet")),
    };
    let out = f(&mut set, &interp.heap);
    if let Some(InternalSlots::WeakSet(slot)) = interp.heap.get_mut(r).map(|o| &mut o.slots) {
        *slot = set;
    }
    Ok(out)
}

fn weak_map_ctor(
    interp: &mut Interpreter,
    _this: Value,
    _args: &[Value],
) -> Result<Value, NativeError> {
    let proto = interp.proto_for("WeakMap.prototype");
    let mut obj = PseudoObject::new(ClassTag::WeakMap, proto);
    obj.slots = InternalSlots::WeakMap(IterableWeakMap::new());
    Ok(Value::Object(interp.alloc(obj)))
}

fn weak_map_get(
    interp: &mut Interpreter,
    this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::WeakMap, "WeakMap.prototype.get")?;
    let key = arg_object(args, "WeakMap.prototype.get")?;
    with_weak_map(interp, r, |map, heap| {
        map.get(heap, key).unwrap_or(Value::Undefined)
    })
}

fn weak_map_set(
    interp: &mut Interpreter,
    this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::WeakMap, "WeakMap.prototype.set")?;
    let key = arg_object(args, "WeakMap.prototype.set")?;
    let value = args.get(1).cloned().unwrap_or(Value::Undefined);
    with_weak_map(interp, r, |map, heap| map.set(heap, key, value))?;
    Ok(Value::Object(r))
}

fn weak_map_has(
    interp: &mut Interpreter,
    this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::WeakMap, "WeakMap.prototype.has")?;
    let key = arg_object(args, "WeakMap.prototype.has")?;
    let has = with_weak_map(interp, r, |map, heap| map.has(heap, key))?;
    Ok(Value::Boolean(has))
}

fn weak_map_delete(
    interp: &mut Interpreter,
    this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::WeakMap, "WeakMap.prototype.delete")?;
    let key = arg_object(args, "WeakMap.prototype.delete")?;
    let removed = with_weak_map(interp, r, |map, heap| map.delete(heap, key))?;
    Ok(Value::Boolean(removed))
}

fn weak_map_size(
    interp: &mut Interpreter,
    this: Value,
    _args: &[Value],
) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::WeakMap, "WeakMap.prototype.size")?;
    let size = with_weak_map(interp, r, |map, heap| map.size(heap))?;
    Ok(Value::Number(size as f64))
}

fn weak_map_keys(
    interp: &mut Interpreter,
    this: Value,
    _args: &[Value],
) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::WeakMap, "WeakMap.prototype.keys")?;
    let keys = with_weak_map(interp, r, |map, heap| {
        map.entries(heap)
            .into_iter()
            .map(|(k, _)| Value::Object(k))
            .collect::<Vec<_>>()
    })?;
    Ok(Value::Object(interp.create_array_from(keys)))
}

fn weak_set_ctor(
    interp: &mut Interpreter,
    _this: Value,
    _args: &[Value],
) -> Result<Value, NativeError> {
    let proto = interp.proto_for("WeakSet.prototype");
    let mut obj = PseudoObject::new(ClassTag::WeakSet, proto);
    obj.slots = InternalSlots::WeakSet(IterableWeakSet::new());
    Ok(Value::Object(interp.alloc(obj)))
}

fn weak_set_add(
    interp: &mut Interpreter,
    this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::WeakSet, "WeakSet.prototype.add")?;
    let member = arg_object(args, "WeakSet.prototype.add")?;
    with_weak_set(interp, r, |set, heap| set.add(heap, member))?;
    Ok(Value::Object(r))
}

fn weak_set_has(
    interp: &mut Interpreter,
    this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::WeakSet, "WeakSet.prototype.has")?;
    let member = arg_object(args, "WeakSet.prototype.has")?;
    let has = with_weak_set(interp, r, |set, heap| set.has(heap, member))?;
    Ok(Value::Boolean(has))
}

fn weak_set_delete(
    interp: &mut Interpreter,
    this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::WeakSet, "WeakSet.prototype.delete")?;
    let member = arg_object(args, "WeakSet.prototype.delete")?;
    let removed = with_weak_set(interp, r, |set, heap| set.delete(heap, member))?;
    Ok(Value::Boolean(removed))
}

fn weak_set_size(
    interp: &mut Interpreter,
    this: Value,
    _args: &[Value],
) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::WeakSet, "WeakSet.prototype.size")?;
    let size = with_weak_set(interp, r, |set, heap| set.size(heap))?;
    Ok(Value::Number(size as f64))
}

fn weak_set_values(
    interp: &mut Interpreter,
    this: Value,
    _args: &[Value],
) -> Result<Value, NativeError> {
    let r = this_tagged(interp, &this, ClassTag::WeakSet, "WeakSet.prototype.values")?;
    let members = with_weak_set(interp, r, |set, heap| {
        set.members(heap)
            .into_iter()
            .map(Value::Object)
            .collect::<Vec<_>>()
    })?;
    Ok(Value::Object(interp.create_array_from(members)))
}
