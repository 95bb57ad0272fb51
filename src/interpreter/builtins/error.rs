//! `Error` constructors, one per user-visible class.
//!
//! Each constructor builds and returns a fresh error object, so both
//! `new TypeError("x")` and the bare call form produce a proper instance.

use crate::error::{ErrorKind, NativeError};
use crate::value::Value;

use super::super::Interpreter;
use super::define_constructor;

pub fn register(interp: &mut Interpreter) {
    interp.natives.register("Error", error_ctor, 1);
    interp.natives.register("EvalError", eval_error_ctor, 1);
    interp.natives.register("RangeError", range_error_ctor, 1);
    interp
        .natives
        .register("ReferenceError", reference_error_ctor, 1);
    interp.natives.register("SyntaxError", syntax_error_ctor, 1);
    interp.natives.register("TypeError", type_error_ctor, 1);
    interp.natives.register("URIError", uri_error_ctor, 1);
    interp
        .natives
        .register("PermissionError", permission_error_ctor, 1);

    for name in [
        "Error",
        "EvalError",
        "RangeError",
        "ReferenceError",
        "SyntaxError",
        "TypeError",
        "URIError",
        "PermissionError",
    ] {
        define_constructor(interp, name);
    }
}

fn make(interp: &mut Interpreter, kind: ErrorKind, args: &[Value]) -> Result<Value, NativeError> {
    let message = match args.first() {
        Some(Value::Undefined) | None => String::new(),
        Some(v) => interp.to_string(v).as_str().to_string(),
    };
    Ok(interp.create_error(kind, &message))
}

fn error_ctor(interp: &mut Interpreter, _this: Value, args: &[Value]) -> Result<Value, NativeError> {
    make(interp, ErrorKind::Error, args)
}

fn eval_error_ctor(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    make(interp, ErrorKind::EvalError, args)
}

fn range_error_ctor(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    make(interp, ErrorKind::RangeError, args)
}

fn reference_error_ctor(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    make(interp, ErrorKind::ReferenceError, args)
}

fn syntax_error_ctor(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    make(interp, ErrorKind::SyntaxError, args)
}

fn type_error_ctor(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    make(interp, ErrorKind::TypeError, args)
}

fn uri_error_ctor(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    make(interp, ErrorKind::UriError, args)
}

fn permission_error_ctor(
    interp: &mut Interpreter,
    _this: Value,
    args: &[Value],
) -> Result<Value, NativeError> {
    make(interp, ErrorKind::PermissionError, args)
}
