//! `Thread` builtins: the user-visible face of the scheduler.
//!
//! `Thread.sleep` and `Thread.yield` park the calling fiber after the
//! current step completes; the call returns undefined when the fiber is
//! next scheduled, which is how cross-checkpoint resumption works — a
//! snapshot taken while a fiber sleeps restores it still sleeping.

use crate::error::NativeError;
use crate::object::{ClassTag, InternalSlots, PseudoObject};
use crate::scheduler::ThreadId;
use crate::value::Value;

use super::super::Interpreter;
use super::{define_constructor, define_method};

pub fn register(interp: &mut Interpreter) {
    interp.natives.register("Thread", thread_ctor, 0);
    interp.natives.register("Thread.spawn", spawn, 1);
    interp.natives.register("Thread.sleep", sleep, 1);
    interp.natives.register("Thread.yield", yield_, 0);
    interp.natives.register("Thread.kill", kill, 1);
    interp.natives.register("Thread.current", current, 0);
    interp
        .natives
        .register("Thread.prototype.id", thread_id, 0);

    let ctor = define_constructor(interp, "Thread");
    define_method(interp, ctor, "spawn", "Thread.spawn");
    define_method(interp, ctor, "sleep", "Thread.sleep");
    define_method(interp, ctor, "yield", "Thread.yield");
    define_method(interp, ctor, "kill", "Thread.kill");
    define_method(interp, ctor, "current", "Thread.current");
    let proto = interp.registry.lookup("Thread.prototype").expect("booted");
    define_method(interp, proto, "id", "Thread.prototype.id");
}

pub(crate) fn make_thread_object(interp: &mut Interpreter, id: ThreadId) -> Value {
    let proto = interp.proto_for("Thread.prototype");
    let mut obj = PseudoObject::new(ClassTag::Thread, proto);
    obj.slots = InternalSlots::Thread { thread: id };
    Value::Object(interp.alloc(obj))
}

fn slot_thread(interp: &Interpreter, v: &Value) -> Option<ThreadId> {
    if let Value::Object(r) = v {
        if let Some(InternalSlots::Thread { thread }) = interp.heap.get(*r).map(|o| &o.slots) {
            return Some(*thread);
        }
    }
    None
}

fn thread_ctor(
    _interp: &mut Interpreter,
    _this: Value,
    _args: &[Value],
) -> Result<Value, NativeError> {
    Err(NativeError::type_error(
        "threads are created with Thread.spawn",
    ))
}

fn spawn(interp: &mut Interpreter, _this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let func = args.first().cloned().unwrap_or(Value::Undefined);
    let call_args = args.get(1..).unwrap_or_default().to_vec();
    let id = interp.spawn_call(func, call_args)?;
    Ok(make_thread_object(interp, id))
}

fn sleep(interp: &mut Interpreter, _this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let ms = args.first().map(|v| interp.to_number(v)).unwrap_or(0.0);
    let ms = if ms.is_nan() { 0.0 } else { ms };
    interp.request_sleep(ms);
    Ok(Value::Undefined)
}

fn yield_(interp: &mut Interpreter, _this: Value, _args: &[Value]) -> Result<Value, NativeError> {
    interp.request_yield();
    Ok(Value::Undefined)
}

fn kill(interp: &mut Interpreter, _this: Value, args: &[Value]) -> Result<Value, NativeError> {
    let Some(id) = args.first().and_then(|v| slot_thread(interp, v)) else {
        return Err(NativeError::type_error("Thread.kill expects a thread"));
    };
    interp.kill(id);
    Ok(Value::Undefined)
}

fn current(interp: &mut Interpreter, _this: Value, _args: &[Value]) -> Result<Value, NativeError> {
    match interp.current_thread {
        Some(id) => Ok(make_thread_object(interp, id)),
        None => Ok(Value::Null),
    }
}

fn thread_id(interp: &mut Interpreter, this: Value, _args: &[Value]) -> Result<Value, NativeError> {
    match slot_thread(interp, &this) {
        Some(id) => Ok(Value::Number(id.0 as f64)),
        None => Err(NativeError::type_error("not a thread")),
    }
}
