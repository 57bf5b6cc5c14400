//! Lexical scopes: a flat arena of scope frames linked by parent ids.
//!
//! Scope kinds mirror the places Cool introduces names: the global class
//! namespace, a class body (attributes plus the implicit `self`), a method
//! body (formals), and a block for each `let` binding and `case` arm.
//! Identifier lookup walks outward through the chain; class-level frames
//! additionally see inherited attributes through the class hierarchy.

use rustc_hash::FxHashMap;

use crate::symbols::{ClassId, MethodId, SymbolId, Symbols};

/// Index of a scope frame in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The class namespace itself; binds no identifiers.
    Global,
    Class(ClassId),
    Method(MethodId),
    /// One `let` binding or `case` arm.
    Block,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    bindings: FxHashMap<String, SymbolId>,
}

/// All scope frames of one compilation.
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            kind,
            parent,
            bindings: FxHashMap::default(),
        });
        id
    }

    /// Bind a name in a scope. Returns false if the name is already bound
    /// in this exact frame (a redefinition); outer shadowing is fine.
    pub fn bind(&mut self, scope: ScopeId, name: &str, sym: SymbolId) -> bool {
        let frame = &mut self.scopes[scope.0 as usize];
        if frame.bindings.contains_key(name) {
            return false;
        }
        frame.bindings.insert(name.to_string(), sym);
        true
    }

    pub fn kind(&self, scope: ScopeId) -> ScopeKind {
        self.scopes[scope.0 as usize].kind
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0 as usize].parent
    }

    /// Resolve an identifier, walking outward through the chain. A class
    /// frame resolves its own bindings (attributes and `self`) and then
    /// inherited attributes; the global frame binds no identifiers.
    pub fn lookup(&self, symbols: &Symbols, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut cur = Some(scope);
        while let Some(s) = cur {
            let frame = &self.scopes[s.0 as usize];
            if let Some(&sym) = frame.bindings.get(name) {
                return Some(sym);
            }
            if let ScopeKind::Class(class) = frame.kind {
                if let Some(sym) = symbols.lookup_attribute(class, name) {
                    return Some(sym);
                }
            }
            cur = frame.parent;
        }
        None
    }

    /// The class whose body lexically contains this scope.
    pub fn enclosing_class(&self, scope: ScopeId) -> Option<ClassId> {
        let mut cur = Some(scope);
        while let Some(s) = cur {
            let frame = &self.scopes[s.0 as usize];
            if let ScopeKind::Class(class) = frame.kind {
                return Some(class);
            }
            cur = frame.parent;
        }
        None
    }

    /// The method whose body lexically contains this scope, if any
    /// (attribute initializers have none).
    pub fn enclosing_method(&self, scope: ScopeId) -> Option<MethodId> {
        let mut cur = Some(scope);
        while let Some(s) = cur {
            let frame = &self.scopes[s.0 as usize];
            match frame.kind {
                ScopeKind::Method(m) => return Some(m),
                ScopeKind::Class(_) | ScopeKind::Global => return None,
                ScopeKind::Block => cur = frame.parent,
            }
        }
        None
    }
}
