//! Definition pass: symbol creation and scope construction.
//!
//! One walk over the program that registers every class in the global
//! namespace, creates member symbols (rejecting redefinitions and the
//! reserved name `self`), opens the lexical scope tree (class, method, one
//! block per `let` binding and per `case` arm), and stamps every expression
//! with the scope active at its use site. Local storage slots are counted
//! here as well: monotonically per enclosing method (or per class for
//! attribute initializers), with a `case` reserving a single slot shared by
//! all of its arms.

use cool_ast::{ClassDef, ExprId, ExprKind, Feature, Program};

use crate::context::{CompilationContext, DefSym};
use crate::error::SemanticError;
use crate::scope::{ScopeId, ScopeKind};
use crate::symbols::{ClassFlags, ClassId, IdSymbol, MethodId, StorageKind};

pub struct DefinitionPass<'a> {
    ctx: &'a mut CompilationContext,
    program: &'a Program,
    file: String,
}

impl<'a> DefinitionPass<'a> {
    pub fn run(ctx: &'a mut CompilationContext, program: &'a Program) {
        let mut pass = Self {
            ctx,
            program,
            file: String::new(),
        };

        // Register all class names first so no feature walk depends on
        // declaration order across files.
        for (index, class) in program.classes.iter().enumerate() {
            pass.file = program.file_name(class.file).to_string();
            pass.define_class(index, class);
        }

        for (index, class) in program.classes.iter().enumerate() {
            let Some(class_id) = pass.ctx.class_syms[index] else {
                continue;
            };
            pass.file = program.file_name(class.file).to_string();
            pass.define_features(class_id, class);
        }
    }

    fn report(&mut self, span: cool_ast::Span, error: SemanticError) {
        self.ctx.diagnostics.report(&self.file, span, error);
    }

    fn define_class(&mut self, index: usize, class: &ClassDef) {
        if class.name.is_self_type() {
            self.report(class.name.span, SemanticError::ClassNamedSelfType);
            return;
        }

        match self.ctx.symbols.add_class(&class.name.name, ClassFlags::empty()) {
            Some(id) => self.ctx.class_syms[index] = Some(id),
            None => {
                self.report(
                    class.name.span,
                    SemanticError::ClassRedefined(class.name.name.clone()),
                );
            }
        }
    }

    fn define_features(&mut self, class_id: ClassId, class: &ClassDef) {
        let class_scope = self
            .ctx
            .scopes
            .push(ScopeKind::Class(class_id), Some(self.ctx.global_scope));
        let self_symbol = self.ctx.symbols.class(class_id).self_symbol;
        self.ctx.scopes.bind(class_scope, "self", self_symbol);

        for feature in &class.features {
            match feature {
                Feature::Attribute(attr) => {
                    if attr.name.name == "self" {
                        let class_name = self.ctx.symbols.class(class_id).name.clone();
                        self.report(
                            attr.name.span,
                            SemanticError::AttributeNamedSelf { class: class_name },
                        );
                    } else {
                        match self.ctx.symbols.add_attribute(class_id, &attr.name.name) {
                            Some(sym) => self.ctx.set_def(attr.def, DefSym::Id(sym)),
                            None => {
                                let class_name = self.ctx.symbols.class(class_id).name.clone();
                                self.report(
                                    attr.name.span,
                                    SemanticError::AttributeRedefined {
                                        class: class_name,
                                        attribute: attr.name.name.clone(),
                                    },
                                );
                            }
                        }
                    }

                    // The initializer runs in class scope even when the
                    // attribute itself was rejected.
                    if let Some(init) = attr.init {
                        self.walk(init, class_scope);
                    }
                }
                Feature::Method(method) => {
                    let Some(method_id) = self.ctx.symbols.add_method(class_id, &method.name.name)
                    else {
                        let class_name = self.ctx.symbols.class(class_id).name.clone();
                        self.report(
                            method.name.span,
                            SemanticError::MethodRedefined {
                                class: class_name,
                                method: method.name.name.clone(),
                            },
                        );
                        continue;
                    };
                    self.ctx.set_def(method.def, DefSym::Method(method_id));

                    let method_scope = self
                        .ctx
                        .scopes
                        .push(ScopeKind::Method(method_id), Some(class_scope));
                    self.define_formals(class_id, method_id, method, method_scope);
                    self.walk(method.body, method_scope);
                }
            }
        }
    }

    fn define_formals(
        &mut self,
        class_id: ClassId,
        method_id: MethodId,
        method: &cool_ast::MethodDef,
        method_scope: ScopeId,
    ) {
        for (index, formal) in method.formals.iter().enumerate() {
            let sym = self.ctx.symbols.add_id(IdSymbol {
                name: formal.name.name.clone(),
                ty: None,
                kind: StorageKind::Formal,
                index: index as u32,
            });
            self.ctx.symbols.method_mut(method_id).formals.push(sym);

            if formal.name.name == "self" {
                let (class_name, method_name) = self.owner_names(class_id, method_id);
                self.report(
                    formal.name.span,
                    SemanticError::FormalNamedSelf {
                        class: class_name,
                        method: method_name,
                    },
                );
                continue;
            }

            if !self.ctx.scopes.bind(method_scope, &formal.name.name, sym) {
                let (class_name, method_name) = self.owner_names(class_id, method_id);
                self.report(
                    formal.name.span,
                    SemanticError::FormalRedefined {
                        class: class_name,
                        method: method_name,
                        formal: formal.name.name.clone(),
                    },
                );
                continue;
            }

            self.ctx.set_def(formal.def, DefSym::Id(sym));
        }
    }

    fn owner_names(&self, class_id: ClassId, method_id: MethodId) -> (String, String) {
        (
            self.ctx.symbols.class(class_id).name.clone(),
            self.ctx.symbols.method(method_id).name.clone(),
        )
    }

    /// Reserve the next local slot belonging to the nearest enclosing
    /// method, or to the class's init routine for attribute initializers.
    fn alloc_local(&mut self, scope: ScopeId) -> u32 {
        if let Some(method) = self.ctx.scopes.enclosing_method(scope) {
            let m = self.ctx.symbols.method_mut(method);
            let index = m.local_slots;
            m.local_slots += 1;
            return index;
        }
        if let Some(class) = self.ctx.scopes.enclosing_class(scope) {
            let c = self.ctx.symbols.class_mut(class);
            let index = c.init_local_slots;
            c.init_local_slots += 1;
            return index;
        }
        0
    }

    /// Stamp the expression with its use-site scope and descend, opening
    /// block scopes for `let` bindings and `case` arms.
    fn walk(&mut self, expr: ExprId, scope: ScopeId) {
        self.ctx.expr_scopes.insert(expr, scope);

        let program = self.program;
        match &program.expr(expr).kind {
            ExprKind::Int(_) | ExprKind::Str(_) | ExprKind::Bool(_) | ExprKind::Id(_) => {}
            ExprKind::New(_) => {}
            ExprKind::Assign { value, .. } => self.walk(*value, scope),
            ExprKind::Dispatch { receiver, args, .. } => {
                if let Some(receiver) = receiver {
                    self.walk(*receiver, scope);
                }
                for arg in args {
                    self.walk(*arg, scope);
                }
            }
            ExprKind::IsVoid(e) | ExprKind::Not(e) | ExprKind::Negate(e) => self.walk(*e, scope),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.walk(*cond, scope);
                self.walk(*then_branch, scope);
                self.walk(*else_branch, scope);
            }
            ExprKind::While { cond, body } => {
                self.walk(*cond, scope);
                self.walk(*body, scope);
            }
            ExprKind::Block(exprs) => {
                for e in exprs {
                    self.walk(*e, scope);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.walk(*lhs, scope);
                self.walk(*rhs, scope);
            }
            ExprKind::Let { bindings, body } => {
                // Bindings are sequential: each initializer is walked in
                // the scope outside its own binding, so a binding never
                // sees itself.
                let mut current = scope;
                for binding in bindings {
                    if let Some(init) = binding.init {
                        self.walk(init, current);
                    }

                    let block = self.ctx.scopes.push(ScopeKind::Block, Some(current));
                    if binding.name.name == "self" {
                        self.report(binding.name.span, SemanticError::LetNamedSelf);
                    } else {
                        let index = self.alloc_local(current);
                        let sym = self.ctx.symbols.add_id(IdSymbol {
                            name: binding.name.name.clone(),
                            ty: None,
                            kind: StorageKind::Local,
                            index,
                        });
                        self.ctx.scopes.bind(block, &binding.name.name, sym);
                        self.ctx.set_def(binding.def, DefSym::Id(sym));
                    }
                    current = block;
                }
                self.walk(*body, current);
            }
            ExprKind::Case { scrutinee, arms } => {
                self.walk(*scrutinee, scope);

                // Only one arm runs, so all arms share one local slot.
                let index = self.alloc_local(scope);
                for arm in arms {
                    let block = self.ctx.scopes.push(ScopeKind::Block, Some(scope));
                    if arm.name.name == "self" {
                        self.report(arm.name.span, SemanticError::CaseNamedSelf);
                    } else {
                        let sym = self.ctx.symbols.add_id(IdSymbol {
                            name: arm.name.name.clone(),
                            ty: None,
                            kind: StorageKind::Local,
                            index,
                        });
                        self.ctx.scopes.bind(block, &arm.name.name, sym);
                        self.ctx.set_def(arm.def, DefSym::Id(sym));
                    }
                    self.walk(arm.body, block);
                }
            }
        }
    }
}
