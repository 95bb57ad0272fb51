//! `Array` constructor and prototype methods.

use crate::error::NativeError;
use crate::heap::ObjRef;
use crate::value::{JsString, Value};

use super::super::Interpreter;
use super::{define_constructor, define_method};

pub fn register(interp: &mut Interpreter) {
    interp.natives.register("Array", array_ctor, 0);
    interp.natives.register("Array.isArray", is_array, 1);
    interp.natives.register("Array.prototype.push", push, 1);
    interp.natives.register("Array.prototype.pop", pop, 0);
    interp.natives.register("Array.prototype.join", join, 1);
    interp
        .natives
        .register("Array.prototype.indexOf", index_of, 1);

    let ctor = define_constructor(interp, "Array");
    define_method(interp, ctor, "isArray", "Array.isArray");
    let proto = interp
        .registry
        .lookup("Array.prototype")
        .expect("booted in install");
    define_method(interp, proto, "push", "Array.prototype.push");
    define_method(interp, proto, "pop", "Array.prototype.pop");
    define_method(interp, proto, "join", "Array.prototype.join");
    define_method(interp, proto, "indexOf", "Array.prototype.indexOf");
}

fn this_array(interp: &Interpreter, this: &Value, who: &str) -> Result<ObjRef, NativeError> {
    match this {
        Value::Object(r)
            if interp
                .heap
                .get(*r)
                .map(|o| matches!(o.class, crate::object::ClassTag::Array))
                .unwrap_or(false) =>
        {
            Ok(*r)
        }
        _ => Err(NativeError::type_error(format!("{who} called on non-array"))),
    }
}

fn array_ctor(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    // `Array(n)` with one numeric argument presets the length.
    if let [Value::Number(n)] = args {
        let len = *n;
        if len.fract() != 0.0 || !(0.0..=u32::MAX as f64).contains(&len) {
            return Err(NativeError::range_error("invalid array length"));
        }
        let arr = interp.create_array_object();
        if let Some(obj) = interp.heap.get_mut(arr) {
            obj.set_property(JsString::from("length"), Value::Number(len));
        }
        return Ok(Value::Object(arr));
    }
    Ok(Value::Object(interp.create_array_from(args.to_vec())))
}

fn is_array(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    Ok(Value::Boolean(matches!(
        args.first(),
        Some(Value::Object(r))
            if interp
                .heap
                .get(*r)
                .map(|o| matches!(o.class, crate::object::ClassTag::Array))
                .unwrap_or(false)
    )))
}

fn push(interp: &mut Interpreter, this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let arr = this_array(interp, &this, "push")?;
    let mut len = interp.heap.get(arr).map(|o| o.array_length()).unwrap_or(0);
    for v in args {
        if let Some(obj) = interp.heap.get_mut(arr) {
            obj.set_property(JsString::from(len.to_string()), v.clone());
        }
        len += 1;
    }
    Ok(Value::Number(len as f64))
}

fn pop(interp: &mut Interpreter, this: Value, _args: &[Value]) -> Result<Value, NativeError> {
    let arr = this_array(interp, &this, "pop")?;
    let len = interp.heap.get(arr).map(|o| o.array_length()).unwrap_or(0);
    if len == 0 {
        return Ok(Value::Undefined);
    }
    let key = (len - 1).to_string();
    let value = interp
        .heap
        .get(arr)
        .and_then(|o| o.get_own(&key).map(|s| s.value.clone()))
        .unwrap_or_default();
    if let Some(obj) = interp.heap.get_mut(arr) {
        obj.delete_property(&key);
        obj.set_property(JsString::from("length"), Value::Number((len - 1) as f64));
    }
    Ok(value)
}

fn join(interp: &mut Interpreter, this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let arr = this_array(interp, &this, "join")?;
    let sep = match args.first() {
        Some(Value::Undefined) | None => JsString::from(","),
        Some(v) => interp.to_string(v),
    };
    let len = interp.heap.get(arr).map(|o| o.array_length()).unwrap_or(0);
    let mut parts = Vec::with_capacity(len as usize);
    for i in 0..len {
        let v = interp
            .heap
            .get_property_value(arr, &i.to_string())
            .unwrap_or_default();
        parts.push(match v {
            Value::Undefined | Value::Null => String::new(),
            other => interp.to_string(&other).as_str().to_string(),
        });
    }
    Ok(Value::from(parts.join(sep.as_str())))
}

fn index_of(interp: &mut Interpreter, this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let arr = this_array(interp, &this, "indexOf")?;
    let needle = args.first().cloned().unwrap_or(Value::Undefined);
    let len = interp.heap.get(arr).map(|o| o.array_length()).unwrap_or(0);
    for i in 0..len {
        let v = interp
            .heap
            .get_property_value(arr, &i.to_string())
            .unwrap_or_default();
        if v.strict_equals(&needle) {
            return Ok(Value::Number(i as f64));
        }
    }
    Ok(Value::Number(-1.0))
}
