//! `Object` constructor and its static methods.

use crate::error::NativeError;
use crate::heap::ObjRef;
use crate::object::{ClassTag, PseudoObject};
use crate::value::Value;

use super::super::Interpreter;
use super::{define_constructor, define_method};

pub fn register(interp: &mut Interpreter) {
    interp.natives.register("Object", object_ctor, 1);
    interp.natives.register("Object.keys", keys, 1);
    interp
        .natives
        .register("Object.getPrototypeOf", get_prototype_of, 1);
    interp
        .natives
        .register("Object.setPrototypeOf", set_prototype_of, 2);
    interp.natives.register("Object.create", create, 1);
    interp
        .natives
        .register("Object.preventExtensions", prevent_extensions, 1);
    interp
        .natives
        .register("Object.isExtensible", is_extensible, 1);

    let ctor = define_constructor(interp, "Object");
    define_method(interp, ctor, "keys", "Object.keys");
    define_method(interp, ctor, "getPrototypeOf", "Object.getPrototypeOf");
    define_method(interp, ctor, "setPrototypeOf", "Object.setPrototypeOf");
    define_method(interp, ctor, "create", "Object.create");
    define_method(interp, ctor, "preventExtensions", "Object.preventExtensions");
    define_method(interp, ctor, "isExtensible", "Object.isExtensible");
}

fn require_object(interp: &Interpreter, v: Option<&Value>, who: &str) -> Result<ObjRef, NativeError> {
    match v {
        Some(Value::Object(r)) if interp.heap.get(*r).is_some() => Ok(*r),
        _ => Err(NativeError::type_error(format!("{who} called on non-object"))),
    }
}

fn object_ctor(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    Ok(match args.first() {
        Some(Value::Object(r)) => Value::Object(*r),
        _ => Value::Object(interp.create_plain_object()),
    })
}

fn keys(interp: &mut Interpreter, _this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let r = require_object(interp, args.first(), "Object.keys")?;
    let names: Vec<Value> = interp
        .heap
        .get(r)
        .map(|o| {
            o.enumerable_keys()
                .into_iter()
                .map(Value::String)
                .collect()
        })
        .unwrap_or_default();
    Ok(Value::Object(interp.create_array_from(names)))
}

fn get_prototype_of(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    let r = require_object(interp, args.first(), "Object.getPrototypeOf")?;
    Ok(match interp.heap.get(r).and_then(|o| o.proto) {
        Some(p) => Value::Object(p),
        None => Value::Null,
    })
}

fn set_prototype_of(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    let r = require_object(interp, args.first(), "Object.setPrototypeOf")?;
    let proto = match args.get(1) {
        Some(Value::Object(p)) => Some(*p),
        Some(Value::Null) => None,
        _ => {
            return Err(NativeError::type_error(
                "prototype must be an object or null",
            ))
        }
    };
    interp.set_prototype(r, proto)?;
    Ok(Value::Object(r))
}

fn create(interp: &mut Interpreter, _this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let proto = match args.first() {
        Some(Value::Object(p)) => Some(*p),
        Some(Value::Null) => None,
        _ => {
            return Err(NativeError::type_error(
                "prototype must be an object or null",
            ))
        }
    };
    let obj = interp.alloc(PseudoObject::new(ClassTag::Object, proto));
    Ok(Value::Object(obj))
}

fn prevent_extensions(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    let r = require_object(interp, args.first(), "Object.preventExtensions")?;
    if let Some(obj) = interp.heap.get_mut(r) {
        obj.extensible = false;
    }
    Ok(Value::Object(r))
}

fn is_extensible(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    let r = require_object(interp, args.first(), "Object.isExtensible")?;
    Ok(Value::Boolean(
        interp.heap.get(r).map(|o| o.extensible).unwrap_or(false),
    ))
}
