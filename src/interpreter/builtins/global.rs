//! Global constructors for the primitive wrappers, plus the global value
//! bindings.

use crate::error::NativeError;
use crate::object::{ClassTag, InternalSlots, PseudoObject};
use crate::scope::ScopeId;
use crate::value::Value;

use super::super::Interpreter;
use super::define_constructor;

pub fn register(interp: &mut Interpreter) {
    interp.natives.register("String", string_ctor, 1);
    interp.natives.register("Number", number_ctor, 1);
    interp.natives.register("Boolean", boolean_ctor, 1);
    interp.natives.register("Box", box_ctor, 0);
    interp.natives.register("RegExp", regexp_ctor, 2);

    define_constructor(interp, "String");
    define_constructor(interp, "Number");
    define_constructor(interp, "Boolean");
    define_constructor(interp, "Box");
    define_constructor(interp, "RegExp");
}

pub fn bind_globals(interp: &mut Interpreter) {
    interp
        .scopes
        .declare_with(ScopeId::GLOBAL, "undefined", Value::Undefined);
    interp
        .scopes
        .declare_with(ScopeId::GLOBAL, "NaN", Value::Number(f64::NAN));
    interp
        .scopes
        .declare_with(ScopeId::GLOBAL, "Infinity", Value::Number(f64::INFINITY));
}

fn string_ctor(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    Ok(match args.first() {
        Some(v) => Value::String(interp.to_string(v)),
        None => Value::from(""),
    })
}

fn number_ctor(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    Ok(match args.first() {
        Some(v) => Value::Number(interp.to_number(v)),
        None => Value::Number(0.0),
    })
}

fn boolean_ctor(
    _interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    Ok(Value::Boolean(
        args.first().map(Value::to_boolean).unwrap_or(false),
    ))
}

fn box_ctor(interp: &mut Interpreter, _this: Value, _args: &[Value]) -> Result<Value, NativeError> {
    let proto = interp.proto_for("Box.prototype");
    let obj = interp.alloc(PseudoObject::new(ClassTag::Box, proto));
    Ok(Value::Object(obj))
}

fn regexp_ctor(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    let source = match args.first() {
        Some(Value::Object(r)) => {
            // new RegExp(other_regexp) clones source and flags.
            if let Some(InternalSlots::RegExp { source, flags }) =
                interp.heap.get(*r).map(|o| o.slots.clone())
            {
                let obj = interp.create_regexp(source.as_str(), flags.as_str());
                return Ok(Value::Object(obj));
            }
            interp.to_string(&Value::Object(*r))
        }
        Some(v) => interp.to_string(v),
        None => return Ok(Value::Object(interp.create_regexp("", ""))),
    };
    let flags = match args.get(1) {
        Some(Value::Undefined) | None => crate::value::JsString::from(""),
        Some(v) => interp.to_string(v),
    };
    Ok(Value::Object(
        interp.create_regexp(source.as_str(), flags.as_str()),
    ))
}
