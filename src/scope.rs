//! Lexical scopes.
//!
//! Scopes live in an interpreter-owned arena and are referenced by `ScopeId`
//! indices, so closures and suspended frames can capture them without
//! reference cycles and snapshots can serialize them flat. The outermost
//! scope (id 0) is the global scope.

use std::rc::Rc;

use crate::ast::{ForInLeft, ForInit, FunctionDeclaration, Statement};
use crate::error::NativeError;
use crate::prelude::IndexMap;
use crate::value::{JsString, Value};

/// Index into the scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) usize);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// One scope: ordered bindings plus a parent link.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub vars: IndexMap<JsString, Value>,
    pub parent: Option<ScopeId>,
}

/// Arena of scopes with pooled slots.
#[derive(Debug)]
pub struct ScopeArena {
    scopes: Vec<Option<Scope>>,
    free: Vec<usize>,
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeArena {
    /// A fresh arena containing only the global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Some(Scope::default())],
            free: Vec::new(),
        }
    }

    pub fn alloc(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let scope = Scope {
            vars: IndexMap::default(),
            parent,
        };
        if let Some(index) = self.free.pop() {
            self.scopes[index] = Some(scope);
            ScopeId(index)
        } else {
            self.scopes.push(Some(scope));
            ScopeId(self.scopes.len() - 1)
        }
    }

    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: ScopeId) -> Option<&mut Scope> {
        self.scopes.get_mut(id.0).and_then(|s| s.as_mut())
    }

    /// Reclaim every scope not in `live`. The global scope is never swept.
    pub fn sweep(&mut self, live: &crate::prelude::FxHashSet<usize>) -> usize {
        let mut swept = 0;
        for index in 1..self.scopes.len() {
            if self.scopes[index].is_some() && !live.contains(&index) {
                self.scopes[index] = None;
                self.free.push(index);
                swept += 1;
            }
        }
        swept
    }

    pub fn live_count(&self) -> usize {
        self.scopes.iter().filter(|s| s.is_some()).count()
    }

    /// Declare `name` in `scope` with `undefined`, unless already declared
    /// there (hoisting is idempotent and must not clobber).
    pub fn declare(&mut self, scope: ScopeId, name: impl Into<JsString>) {
        if let Some(s) = self.get_mut(scope) {
            s.vars.entry(name.into()).or_insert(Value::Undefined);
        }
    }

    /// Declare `name` and immediately bind it (parameters, `catch` params).
    pub fn declare_with(&mut self, scope: ScopeId, name: impl Into<JsString>, value: Value) {
        if let Some(s) = self.get_mut(scope) {
            s.vars.insert(name.into(), value);
        }
    }

    /// Read `name`, walking outward. Unresolved reads throw `ReferenceError`.
    pub fn get_var(&self, scope: ScopeId, name: &str) -> Result<Value, NativeError> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let Some(s) = self.get(id) else { break };
            if let Some(v) = s.vars.get(name) {
                return Ok(v.clone());
            }
            current = s.parent;
        }
        Err(NativeError::reference_error(name))
    }

    /// Whether `name` resolves anywhere on the chain.
    pub fn has_var(&self, scope: ScopeId, name: &str) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            let Some(s) = self.get(id) else { break };
            if s.vars.contains_key(name) {
                return true;
            }
            current = s.parent;
        }
        false
    }

    /// Write `name` in the nearest scope declaring it. When no scope does,
    /// either throws `ReferenceError` (strict policy, the default) or creates
    /// the binding on the global scope.
    pub fn set_var(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: Value,
        unresolved_is_error: bool,
    ) -> Result<(), NativeError> {
        let mut current = Some(scope);
        let owner = loop {
            let Some(id) = current else { break None };
            let Some(s) = self.get(id) else { break None };
            if s.vars.contains_key(name) {
                break Some(id);
            }
            current = s.parent;
        };
        match owner {
            Some(id) => {
                if let Some(slot) = self.get_mut(id).and_then(|s| s.vars.get_mut(name)) {
                    *slot = value;
                }
                Ok(())
            }
            None if unresolved_is_error => Err(NativeError::reference_error(name)),
            None => {
                self.declare_with(ScopeId::GLOBAL, name, value);
                Ok(())
            }
        }
    }
}

/// Hoisting pre-pass: declare every `var` declarator and function-declaration
/// name found in `statements` (descending through blocks, conditionals,
/// loops, try/catch/finally, switch and labels, but not into nested function
/// bodies) with value `undefined`. Idempotent; evaluates nothing.
pub fn hoist(arena: &mut ScopeArena, scope: ScopeId, statements: &[Statement]) {
    let mut names = Vec::new();
    collect_declared_names(statements, &mut names);
    for name in names {
        arena.declare(scope, name.as_str());
    }
}

/// All function declarations in `statements`, in source order, at any
/// statement nesting depth short of nested function bodies. The interpreter
/// binds these to closures when the scope is entered.
pub fn collect_functions(statements: &[Statement]) -> Vec<Rc<FunctionDeclaration>> {
    let mut out = Vec::new();
    collect_functions_into(statements, &mut out);
    out
}

fn collect_declared_names(statements: &[Statement], names: &mut Vec<JsString>) {
    for stmt in statements {
        collect_declared_names_stmt(stmt, names);
    }
}

fn collect_declared_names_stmt(stmt: &Statement, names: &mut Vec<JsString>) {
    match stmt {
        Statement::VariableDeclaration(decl) => {
            for d in decl.declarations.iter() {
                names.push(JsString::from(d.id.as_str()));
            }
        }
        Statement::FunctionDeclaration(func) => {
            names.push(JsString::from(func.id.as_str()));
        }
        Statement::Block(block) => collect_declared_names(&block.body, names),
        Statement::If(if_stmt) => {
            collect_declared_names_stmt(&if_stmt.consequent, names);
            if let Some(alt) = &if_stmt.alternate {
                collect_declared_names_stmt(alt, names);
            }
        }
        Statement::While(w) => collect_declared_names_stmt(&w.body, names),
        Statement::DoWhile(d) => collect_declared_names_stmt(&d.body, names),
        Statement::For(f) => {
            if let Some(ForInit::Variable(decl)) = &f.init {
                for d in decl.declarations.iter() {
                    names.push(JsString::from(d.id.as_str()));
                }
            }
            collect_declared_names_stmt(&f.body, names);
        }
        Statement::ForIn(f) => {
            if let ForInLeft::Variable(name) = &f.left {
                names.push(JsString::from(name.as_str()));
            }
            collect_declared_names_stmt(&f.body, names);
        }
        Statement::Switch(s) => {
            for case in s.cases.iter() {
                collect_declared_names(&case.consequent, names);
            }
        }
        Statement::Try(t) => {
            collect_declared_names(&t.block.body, names);
            if let Some(handler) = &t.handler {
                collect_declared_names(&handler.body.body, names);
            }
            if let Some(finalizer) = &t.finalizer {
                collect_declared_names(&finalizer.body, names);
            }
        }
        Statement::Labeled(l) => collect_declared_names_stmt(&l.body, names),
        Statement::Return(_)
        | Statement::Break(_)
        | Statement::Continue(_)
        | Statement::Throw(_)
        | Statement::Expression(_)
        | Statement::Empty => {}
    }
}

fn collect_functions_into(statements: &[Statement], out: &mut Vec<Rc<FunctionDeclaration>>) {
    for stmt in statements {
        collect_functions_stmt(stmt, out);
    }
}

fn collect_functions_stmt(stmt: &Statement, out: &mut Vec<Rc<FunctionDeclaration>>) {
    match stmt {
        Statement::FunctionDeclaration(func) => out.push(func.clone()),
        Statement::Block(block) => collect_functions_into(&block.body, out),
        Statement::If(if_stmt) => {
            collect_functions_stmt(&if_stmt.consequent, out);
            if let Some(alt) = &if_stmt.alternate {
                collect_functions_stmt(alt, out);
            }
        }
        Statement::While(w) => collect_functions_stmt(&w.body, out),
        Statement::DoWhile(d) => collect_functions_stmt(&d.body, out),
        Statement::For(f) => collect_functions_stmt(&f.body, out),
        Statement::ForIn(f) => collect_functions_stmt(&f.body, out),
        Statement::Switch(s) => {
            for case in s.cases.iter() {
                collect_functions_into(&case.consequent, out);
            }
        }
        Statement::Try(t) => {
            collect_functions_into(&t.block.body, out);
            if let Some(handler) = &t.handler {
                collect_functions_into(&handler.body.body, out);
            }
            if let Some(finalizer) = &t.finalizer {
                collect_functions_into(&finalizer.body, out);
            }
        }
        Statement::Labeled(l) => collect_functions_stmt(&l.body, out),
        _ => {}
    }
}
