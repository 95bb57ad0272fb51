//! `Date` constructor and methods. Timestamps are milliseconds on the host
//! clock; ISO-8601 formatting goes through the snapshot helpers so wire and
//! user formats agree.

use crate::error::NativeError;
use crate::object::InternalSlots;
use crate::snapshot::{format_date, parse_date};
use crate::value::Value;

use super::super::Interpreter;
use super::{define_constructor, define_method};

pub fn register(interp: &mut Interpreter) {
    interp.natives.register("Date", date_ctor, 1);
    interp.natives.register("Date.now", now, 0);
    interp
        .natives
        .register("Date.prototype.getTime", get_time, 0);
    interp
        .natives
        .register("Date.prototype.toISOString", to_iso_string, 0);

    let ctor = define_constructor(interp, "Date");
    define_method(interp, ctor, "now", "Date.now");
    let proto = interp.registry.lookup("Date.prototype").expect("booted");
    define_method(interp, proto, "getTime", "Date.prototype.getTime");
    define_method(interp, proto, "toISOString", "Date.prototype.toISOString");
}

fn this_date(interp: &Interpreter, this: &Value, who: &str) -> Result<f64, NativeError> {
    if let Value::Object(r) = this {
        if let Some(InternalSlots::Date { timestamp }) = interp.heap.get(*r).map(|o| &o.slots) {
            return Ok(*timestamp);
        }
    }
    Err(NativeError::type_error(format!("{who} called on non-Date")))
}

fn date_ctor(interp: &mut Interpreter, _this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let timestamp = match args.first() {
        None | Some(Value::Undefined) => interp.now_ms(),
        Some(Value::String(s)) => {
            parse_date(s.as_str()).ok_or_else(|| NativeError::type_error("invalid date string"))?
        }
        Some(v) => interp.to_number(v),
    };
    Ok(Value::Object(interp.create_date(timestamp)))
}

fn now(interp: &mut Interpreter, _this: Value, _args: &[Value]) -> Result<Value, NativeError> {
    Ok(Value::Number(interp.now_ms()))
}

fn get_time(interp: &mut Interpreter, this: Value, _args: &[Value]) -> Result<Value, NativeError> {
    Ok(Value::Number(this_date(
        interp,
        &this,
        "Date.prototype.getTime",
    )?))
}

fn to_iso_string(
    interp: &mut Interpreter,
    this: Value,
    _args: &[Value],
) -> Result<Value, NativeError> {
    let ts = this_date(interp, &this, "Date.prototype.toISOString")?;
    Ok(Value::from(format_date(ts)))
}
