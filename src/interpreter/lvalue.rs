//! Assignment-target resolution.
//!
//! An `LValue` captures the target of an assignment or update expression.
//! Identifier targets are ready immediately; member targets become ready
//! after their base (and, for computed access, key) sub-expressions have been
//! evaluated by the enclosing frame. Once ready it exposes `get`/`set`.

use std::rc::Rc;

use crate::ast::{Expression, MemberProperty};
use crate::error::NativeError;
use crate::scope::ScopeId;
use crate::value::{JsString, Value};

use super::Interpreter;

#[derive(Debug)]
pub enum LValue {
    Identifier {
        name: JsString,
    },
    Member {
        object: Rc<Expression>,
        property: MemberProperty,
        base: Option<Value>,
        key: Option<JsString>,
    },
}

impl LValue {
    /// Classify an expression as an assignment target.
    pub fn from_expression(expr: &Expression) -> Result<LValue, NativeError> {
        match expr {
            Expression::Identifier(id) => Ok(LValue::Identifier {
                name: JsString::from(id.name.as_str()),
            }),
            Expression::Member(m) => Ok(LValue::Member {
                object: m.object.clone(),
                property: m.property.clone(),
                base: None,
                key: None,
            }),
            _ => Err(NativeError::syntax_error(
                "invalid assignment target",
            )),
        }
    }

    /// Whether `get`/`set` may be called yet.
    pub fn ready(&self) -> bool {
        match self {
            LValue::Identifier { .. } => true,
            LValue::Member { base, key, property, .. } => {
                base.is_some()
                    && (key.is_some() || matches!(property, MemberProperty::Static(_)))
            }
        }
    }

    /// The next sub-expression the enclosing frame must evaluate, if any.
    pub fn next_subexpr(&self) -> Option<Rc<Expression>> {
        match self {
            LValue::Identifier { .. } => None,
            LValue::Member {
                object,
                property,
                base,
                key,
            } => {
                if base.is_none() {
                    Some(object.clone())
                } else if key.is_none() {
                    match property {
                        MemberProperty::Computed(expr) => Some(expr.clone()),
                        MemberProperty::Static(_) => None,
                    }
                } else {
                    None
                }
            }
        }
    }

    /// Feed a sub-expression result: first the base, then the computed key.
    pub fn accept(&mut self, interp: &Interpreter, v: Value) {
        if let LValue::Member { base, key, .. } = self {
            if base.is_none() {
                *base = Some(v);
            } else if key.is_none() {
                *key = Some(interp.to_string(&v));
            }
        }
    }

    fn member_key(&self) -> JsString {
        match self {
            LValue::Identifier { name } => name.clone(),
            LValue::Member { property, key, .. } => match (key, property) {
                (Some(k), _) => k.clone(),
                (None, MemberProperty::Static(name)) => JsString::from(name.as_str()),
                (None, MemberProperty::Computed(_)) => unreachable!("lvalue not ready"),
            },
        }
    }

    pub fn get(&self, interp: &mut Interpreter, scope: ScopeId) -> Result<Value, NativeError> {
        match self {
            LValue::Identifier { name } => interp.scopes.get_var(scope, name.as_str()),
            LValue::Member { base, .. } => {
                let base = base.clone().expect("lvalue not ready");
                let key = self.member_key();
                interp.get_member(&base, key.as_str())
            }
        }
    }

    /// Visit captured values (for the collector).
    pub fn trace(&self, visit: &mut dyn FnMut(&Value)) {
        if let LValue::Member { base: Some(v), .. } = self {
            visit(v);
        }
    }

    pub fn set(
        &self,
        interp: &mut Interpreter,
        scope: ScopeId,
        value: Value,
    ) -> Result<(), NativeError> {
        match self {
            LValue::Identifier { name } => {
                let strict = interp.config.set_unresolved_is_error;
                interp.scopes.set_var(scope, name.as_str(), value, strict)
            }
            LValue::Member { base, .. } => {
                let base = base.clone().expect("lvalue not ready");
                let key = self.member_key();
                interp.set_member(&base, key.as_str(), value)
            }
        }
    }
}
