//! Per-compilation state threaded through every pass.
//!
//! One [`CompilationContext`] is built per run: the symbol arena with the
//! five built-in classes pre-registered, the scope arena with its global
//! frame, the diagnostics sink, and the side tables that annotate AST nodes
//! (keyed by arena id) with the scopes, symbols, methods, and types the
//! passes resolve. Nothing here outlives a compilation.

use cool_ast::{DefId, ExprId, Program};
use rustc_hash::FxHashMap;

use crate::error::{Diagnostics, SemanticError};
use crate::scope::{ScopeArena, ScopeId, ScopeKind};
use crate::symbols::{ClassFlags, ClassId, IdSymbol, MethodId, StorageKind, SymbolId, Symbols, Ty};

/// What a definition site (attribute, method, formal, let binding, case
/// arm) resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefSym {
    Id(SymbolId),
    Method(MethodId),
}

/// Handles to the pre-registered built-in classes.
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    pub object: ClassId,
    pub io: ClassId,
    pub int: ClassId,
    pub string: ClassId,
    pub bool_: ClassId,
}

pub struct CompilationContext {
    pub symbols: Symbols,
    pub scopes: ScopeArena,
    pub global_scope: ScopeId,
    pub diagnostics: Diagnostics,
    pub builtins: Builtins,

    /// Scope active at each expression's use site, stamped by the
    /// definition pass for every expression in the program.
    pub expr_scopes: FxHashMap<ExprId, ScopeId>,
    /// Resolved identifier symbol per `Id` node and per `Assign` target.
    pub expr_symbols: FxHashMap<ExprId, SymbolId>,
    /// Resolved method per `Dispatch` node.
    pub expr_methods: FxHashMap<ExprId, MethodId>,
    /// Resolved static type per expression (absent where typing failed).
    pub expr_types: FxHashMap<ExprId, Ty>,

    /// Resolved symbol per definition site, indexed by `DefId`.
    pub def_symbols: Vec<Option<DefSym>>,
    /// Class symbol per `ClassDef`, parallel to `Program::classes`
    /// (`None` where the class was rejected by the definition pass).
    pub class_syms: Vec<Option<ClassId>>,
}

impl CompilationContext {
    /// Build a fresh context for a program: built-in classes and their
    /// fixed signatures, the global scope, and empty side tables sized to
    /// the program's arenas.
    pub fn new(program: &Program) -> Self {
        let mut symbols = Symbols::new();
        let mut scopes = ScopeArena::new();
        let global_scope = scopes.push(ScopeKind::Global, None);

        let builtins = install_builtins(&mut symbols);

        Self {
            symbols,
            scopes,
            global_scope,
            diagnostics: Diagnostics::new(),
            builtins,
            expr_scopes: FxHashMap::default(),
            expr_symbols: FxHashMap::default(),
            expr_methods: FxHashMap::default(),
            expr_types: FxHashMap::default(),
            def_symbols: vec![None; program.def_count()],
            class_syms: vec![None; program.classes.len()],
        }
    }

    pub fn report(&mut self, file: &str, span: cool_ast::Span, error: SemanticError) {
        self.diagnostics.report(file, span, error);
    }

    pub fn set_def(&mut self, def: DefId, sym: DefSym) {
        self.def_symbols[def.index()] = Some(sym);
    }

    pub fn def(&self, def: DefId) -> Option<DefSym> {
        self.def_symbols[def.index()]
    }

    pub fn def_id_symbol(&self, def: DefId) -> Option<SymbolId> {
        match self.def(def)? {
            DefSym::Id(s) => Some(s),
            DefSym::Method(_) => None,
        }
    }

    pub fn def_method(&self, def: DefId) -> Option<MethodId> {
        match self.def(def)? {
            DefSym::Method(m) => Some(m),
            DefSym::Id(_) => None,
        }
    }
}

/// Register the five built-in classes and their fixed method signatures.
/// Object is created first so it becomes the hierarchy root.
fn install_builtins(symbols: &mut Symbols) -> Builtins {
    // The arena is empty and the names are distinct, so registration
    // cannot collide here.
    let class = |symbols: &mut Symbols, name: &str, flags: ClassFlags| {
        symbols
            .add_class(name, flags)
            .expect("built-in class names are distinct")
    };

    let object = class(symbols, "Object", ClassFlags::BUILTIN);
    let io = class(symbols, "IO", ClassFlags::BUILTIN);
    let int = class(symbols, "Int", ClassFlags::BUILTIN | ClassFlags::PRIMITIVE);
    let string = class(symbols, "String", ClassFlags::BUILTIN | ClassFlags::PRIMITIVE);
    let bool_ = class(symbols, "Bool", ClassFlags::BUILTIN | ClassFlags::PRIMITIVE);

    symbols.set_parent(io, object);
    symbols.set_parent(int, object);
    symbols.set_parent(string, object);
    symbols.set_parent(bool_, object);

    let method = |symbols: &mut Symbols,
                  class: ClassId,
                  name: &str,
                  formals: &[(&str, Ty)],
                  ret: Ty| {
        if let Some(mid) = symbols.add_method(class, name) {
            let mut formal_syms = Vec::with_capacity(formals.len());
            for (index, (fname, fty)) in formals.iter().enumerate() {
                formal_syms.push(symbols.add_id(IdSymbol {
                    name: (*fname).to_string(),
                    ty: Some(*fty),
                    kind: StorageKind::Formal,
                    index: index as u32,
                }));
            }
            let m = symbols.method_mut(mid);
            m.ret = Some(ret);
            m.formals = formal_syms;
        }
    };

    let obj_t = Ty::Class(object);
    let int_t = Ty::Class(int);
    let str_t = Ty::Class(string);

    method(symbols, object, "abort", &[], obj_t);
    method(symbols, object, "type_name", &[], str_t);
    method(symbols, object, "copy", &[], Ty::SelfOf(object));

    method(symbols, io, "out_string", &[("x", str_t)], Ty::SelfOf(io));
    method(symbols, io, "out_int", &[("x", int_t)], Ty::SelfOf(io));
    method(symbols, io, "in_string", &[], str_t);
    method(symbols, io, "in_int", &[], int_t);

    method(symbols, string, "length", &[], int_t);
    method(symbols, string, "concat", &[("s", str_t)], str_t);
    method(
        symbols,
        string,
        "substr",
        &[("i", int_t), ("l", int_t)],
        str_t,
    );

    symbols.recompute_depths();

    Builtins {
        object,
        io,
        int,
        string,
        bool_,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cool_ast::AstBuilder;

    #[test]
    fn builtins_are_registered_with_signatures() {
        let program = AstBuilder::new().finish();
        let ctx = CompilationContext::new(&program);
        let syms = &ctx.symbols;

        assert_eq!(syms.class_by_name("Object"), Some(ctx.builtins.object));
        assert_eq!(syms.class_by_name("Bool"), Some(ctx.builtins.bool_));
        assert_eq!(syms.root(), ctx.builtins.object);
        assert!(syms.class(ctx.builtins.int).is_primitive());
        assert!(!syms.class(ctx.builtins.io).is_primitive());

        let copy = syms.lookup_method(ctx.builtins.object, "copy").unwrap();
        assert_eq!(syms.method(copy).ret, Some(Ty::SelfOf(ctx.builtins.object)));

        // IO inherits the Object methods.
        assert!(syms.lookup_method(ctx.builtins.io, "type_name").is_some());
        let substr = syms.lookup_method(ctx.builtins.string, "substr").unwrap();
        assert_eq!(syms.method(substr).formals.len(), 2);
    }
}
