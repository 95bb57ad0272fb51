//! Built-in seed set.
//!
//! `install` runs at interpreter construction: it creates the prototype and
//! constructor singletons, registers every native in the function table under
//! its stable id, and binds the globals. A snapshot can only be restored into
//! an interpreter that ran the same install, because records reference
//! natives by id and singletons by registry name.

pub mod array;
pub mod collections;
pub mod date;
pub mod error;
pub mod global;
pub mod object;
pub mod thread;

use crate::heap::ObjRef;
use crate::object::{ClassTag, PropertySlot, PseudoObject};
use crate::scope::ScopeId;
use crate::value::{JsString, Value};

use super::Interpreter;

pub fn install(interp: &mut Interpreter) {
    // Root prototypes first; everything else hangs off them.
    let object_proto = interp.alloc(PseudoObject::new(ClassTag::Object, None));
    interp.registry.register("Object.prototype", object_proto);
    let function_proto = interp.alloc(PseudoObject::new(ClassTag::Object, Some(object_proto)));
    interp.registry.register("Function.prototype", function_proto);

    for name in [
        "Array.prototype",
        "String.prototype",
        "Number.prototype",
        "Boolean.prototype",
        "Map.prototype",
        "Set.prototype",
        "WeakMap.prototype",
        "WeakSet.prototype",
        "Date.prototype",
        "RegExp.prototype",
        "Thread.prototype",
        "Box.prototype",
    ] {
        let proto = interp.alloc(PseudoObject::new(ClassTag::Object, Some(object_proto)));
        interp.registry.register(name, proto);
    }

    // Error.prototype, then one prototype per subclass chained to it.
    let error_proto = interp.alloc(PseudoObject::new(ClassTag::Error, Some(object_proto)));
    interp.registry.register("Error.prototype", error_proto);
    for name in [
        "EvalError",
        "RangeError",
        "ReferenceError",
        "SyntaxError",
        "TypeError",
        "URIError",
        "PermissionError",
    ] {
        let proto = interp.alloc(PseudoObject::new(ClassTag::Error, Some(error_proto)));
        interp.registry.register(format!("{name}.prototype"), proto);
    }

    global::register(interp);
    object::register(interp);
    array::register(interp);
    error::register(interp);
    collections::register(interp);
    date::register(interp);
    thread::register(interp);

    global::bind_globals(interp);
}

/// Build a constructor: a native function object whose `prototype` is the
/// canonical prototype from the registry, bound as a global and registered
/// under its own name.
pub(crate) fn define_constructor(interp: &mut Interpreter, name: &str) -> ObjRef {
    let ctor = interp.create_native_function(name);
    let proto = interp
        .registry
        .lookup(&format!("{name}.prototype"))
        .unwrap_or_else(|| panic!("prototype for '{name}' not booted"));
    if let Some(f) = interp.heap.get_mut(ctor) {
        f.define_property(
            JsString::from("prototype"),
            PropertySlot::hidden(Value::Object(proto)),
        );
    }
    if let Some(p) = interp.heap.get_mut(proto) {
        p.define_property(
            JsString::from("constructor"),
            PropertySlot::hidden(Value::Object(ctor)),
        );
    }
    interp.registry.register(name, ctor);
    interp
        .scopes
        .declare_with(ScopeId::GLOBAL, name, Value::Object(ctor));
    ctor
}

/// Attach a native as a method property on an object.
pub(crate) fn define_method(interp: &mut Interpreter, target: ObjRef, name: &str, id: &str) {
    let func = interp.create_native_function(id);
    if let Some(obj) = interp.heap.get_mut(target) {
        obj.define_property(
            JsString::from(name),
            PropertySlot::with_attributes(Value::Object(func), true, false, true),
        );
    }
}
