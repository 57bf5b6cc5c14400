//! Class-hierarchy binding pass.
//!
//! Resolves every class's declared parent (defaulting to the root class,
//! rejecting primitives, `SELF_TYPE`, and undefined names) and every
//! declared type name in the program: attribute types, method return
//! types, formal types, `let` binding types, and `case` arm types. Parent
//! pointers are not trustworthy during this pass, so nothing here depends
//! on inherited members; all lookups go through the global class
//! namespace. Hierarchy depths are recomputed once all parents are bound.

use cool_ast::{ClassDef, ExprId, ExprKind, Feature, Program, TypeName};

use crate::context::CompilationContext;
use crate::error::SemanticError;
use crate::symbols::{ClassId, MethodId, Ty};

pub struct BindingPass<'a> {
    ctx: &'a mut CompilationContext,
    program: &'a Program,
    file: String,
}

impl<'a> BindingPass<'a> {
    pub fn run(ctx: &'a mut CompilationContext, program: &'a Program) {
        let mut pass = Self {
            ctx,
            program,
            file: String::new(),
        };

        for (index, class) in program.classes.iter().enumerate() {
            let Some(class_id) = pass.ctx.class_syms[index] else {
                continue;
            };
            pass.file = program.file_name(class.file).to_string();
            pass.bind_parent(class_id, class);
            pass.bind_features(class_id, class);
        }

        pass.ctx.symbols.recompute_depths();
    }

    fn report(&mut self, span: cool_ast::Span, error: SemanticError) {
        self.ctx.diagnostics.report(&self.file, span, error);
    }

    fn bind_parent(&mut self, class_id: ClassId, class: &ClassDef) {
        let root = self.ctx.builtins.object;
        let Some(parent) = &class.parent else {
            self.ctx.symbols.set_parent(class_id, root);
            return;
        };

        if matches!(parent.name.as_str(), "Int" | "String" | "Bool" | "SELF_TYPE") {
            let class_name = self.ctx.symbols.class(class_id).name.clone();
            self.report(
                parent.span,
                SemanticError::IllegalParent {
                    class: class_name,
                    parent: parent.name.clone(),
                },
            );
            return;
        }

        match self.ctx.symbols.class_by_name(&parent.name) {
            Some(parent_id) => self.ctx.symbols.set_parent(class_id, parent_id),
            None => {
                let class_name = self.ctx.symbols.class(class_id).name.clone();
                self.report(
                    parent.span,
                    SemanticError::UndefinedParent {
                        class: class_name,
                        parent: parent.name.clone(),
                    },
                );
            }
        }
    }

    /// Resolve a declared type name against the global namespace.
    /// `SELF_TYPE` resolves to the self type of the enclosing class when
    /// the use site permits it.
    fn resolve_type(&self, name: &TypeName, enclosing: ClassId, allow_self: bool) -> Option<Ty> {
        if name.is_self_type() {
            return allow_self.then_some(Ty::SelfOf(enclosing));
        }
        self.ctx.symbols.class_by_name(&name.name).map(Ty::Class)
    }

    fn bind_features(&mut self, class_id: ClassId, class: &ClassDef) {
        for feature in &class.features {
            match feature {
                Feature::Attribute(attr) => {
                    if let Some(sym) = self.ctx.def_id_symbol(attr.def) {
                        match self.resolve_type(&attr.declared_type, class_id, true) {
                            Some(ty) => self.ctx.symbols.id_mut(sym).ty = Some(ty),
                            None => {
                                let class_name = self.ctx.symbols.class(class_id).name.clone();
                                self.report(
                                    attr.declared_type.span,
                                    SemanticError::AttributeUndefinedType {
                                        class: class_name,
                                        attribute: attr.name.name.clone(),
                                        ty: attr.declared_type.name.clone(),
                                    },
                                );
                            }
                        }
                    }
                    if let Some(init) = attr.init {
                        self.bind_expr(class_id, init);
                    }
                }
                Feature::Method(method) => {
                    if let Some(method_id) = self.ctx.def_method(method.def) {
                        self.bind_method_signature(class_id, method_id, method);
                    }
                    self.bind_expr(class_id, method.body);
                }
            }
        }
    }

    fn bind_method_signature(
        &mut self,
        class_id: ClassId,
        method_id: MethodId,
        method: &cool_ast::MethodDef,
    ) {
        match self.resolve_type(&method.return_type, class_id, true) {
            Some(ty) => self.ctx.symbols.method_mut(method_id).ret = Some(ty),
            None => {
                let class_name = self.ctx.symbols.class(class_id).name.clone();
                self.report(
                    method.return_type.span,
                    SemanticError::MethodUndefinedReturnType {
                        class: class_name,
                        method: method.name.name.clone(),
                        ty: method.return_type.name.clone(),
                    },
                );
            }
        }

        let formal_syms = self.ctx.symbols.method(method_id).formals.clone();
        for (formal, sym) in method.formals.iter().zip(formal_syms) {
            if formal.declared_type.is_self_type() {
                let class_name = self.ctx.symbols.class(class_id).name.clone();
                self.report(
                    formal.declared_type.span,
                    SemanticError::FormalSelfType {
                        class: class_name,
                        method: method.name.name.clone(),
                        formal: formal.name.name.clone(),
                    },
                );
                continue;
            }
            match self.resolve_type(&formal.declared_type, class_id, false) {
                Some(ty) => self.ctx.symbols.id_mut(sym).ty = Some(ty),
                None => {
                    let class_name = self.ctx.symbols.class(class_id).name.clone();
                    self.report(
                        formal.declared_type.span,
                        SemanticError::FormalUndefinedType {
                            class: class_name,
                            method: method.name.name.clone(),
                            formal: formal.name.name.clone(),
                            ty: formal.declared_type.name.clone(),
                        },
                    );
                }
            }
        }
    }

    /// Descend into an expression, resolving the declared types of `let`
    /// bindings and `case` arms.
    fn bind_expr(&mut self, class_id: ClassId, expr: ExprId) {
        let program = self.program;
        match &program.expr(expr).kind {
            ExprKind::Int(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Id(_)
            | ExprKind::New(_) => {}
            ExprKind::Assign { value, .. } => self.bind_expr(class_id, *value),
            ExprKind::Dispatch { receiver, args, .. } => {
                if let Some(receiver) = receiver {
                    self.bind_expr(class_id, *receiver);
                }
                for arg in args {
                    self.bind_expr(class_id, *arg);
                }
            }
            ExprKind::IsVoid(e) | ExprKind::Not(e) | ExprKind::Negate(e) => {
                self.bind_expr(class_id, *e)
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.bind_expr(class_id, *cond);
                self.bind_expr(class_id, *then_branch);
                self.bind_expr(class_id, *else_branch);
            }
            ExprKind::While { cond, body } => {
                self.bind_expr(class_id, *cond);
                self.bind_expr(class_id, *body);
            }
            ExprKind::Block(exprs) => {
                for e in exprs {
                    self.bind_expr(class_id, *e);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.bind_expr(class_id, *lhs);
                self.bind_expr(class_id, *rhs);
            }
            ExprKind::Let { bindings, body } => {
                for binding in bindings {
                    if let Some(init) = binding.init {
                        self.bind_expr(class_id, init);
                    }
                    let Some(sym) = self.ctx.def_id_symbol(binding.def) else {
                        continue;
                    };
                    match self.resolve_type(&binding.declared_type, class_id, true) {
                        Some(ty) => self.ctx.symbols.id_mut(sym).ty = Some(ty),
                        None => {
                            self.report(
                                binding.declared_type.span,
                                SemanticError::LetUndefinedType {
                                    name: binding.name.name.clone(),
                                    ty: binding.declared_type.name.clone(),
                                },
                            );
                        }
                    }
                }
                self.bind_expr(class_id, *body);
            }
            ExprKind::Case { scrutinee, arms } => {
                self.bind_expr(class_id, *scrutinee);
                for arm in arms {
                    if let Some(sym) = self.ctx.def_id_symbol(arm.def) {
                        if arm.declared_type.is_self_type() {
                            self.report(
                                arm.declared_type.span,
                                SemanticError::CaseSelfType {
                                    name: arm.name.name.clone(),
                                },
                            );
                        } else {
                            match self.resolve_type(&arm.declared_type, class_id, false) {
                                Some(ty) => self.ctx.symbols.id_mut(sym).ty = Some(ty),
                                None => {
                                    self.report(
                                        arm.declared_type.span,
                                        SemanticError::CaseUndefinedType {
                                            name: arm.name.name.clone(),
                                            ty: arm.declared_type.name.clone(),
                                        },
                                    );
                                }
                            }
                        }
                    }
                    self.bind_expr(class_id, arm.body);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::DefinitionPass;
    use cool_ast::{AstBuilder, ClassDef, Ident, Span, TypeName};

    fn sp() -> Span {
        Span::default()
    }

    fn bare_class(b: &mut AstBuilder, name: &str, parent: Option<&str>) {
        let file = b.add_file("test.cl");
        b.add_class(ClassDef {
            name: TypeName::new(name, sp()),
            parent: parent.map(|p| TypeName::new(p, sp())),
            features: vec![],
            file,
            span: sp(),
        });
    }

    fn run(program: &Program) -> CompilationContext {
        let mut ctx = CompilationContext::new(program);
        DefinitionPass::run(&mut ctx, program);
        BindingPass::run(&mut ctx, program);
        ctx
    }

    #[test]
    fn missing_parent_defaults_to_root() {
        let mut b = AstBuilder::new();
        bare_class(&mut b, "A", None);
        let program = b.finish();
        let ctx = run(&program);

        assert!(ctx.diagnostics.is_empty());
        let a = ctx.class_syms[0].unwrap();
        assert_eq!(ctx.symbols.class(a).parent, Some(ctx.builtins.object));
        assert_eq!(ctx.symbols.class(a).depth, 1);
    }

    #[test]
    fn primitive_parents_are_illegal() {
        for parent in ["Int", "String", "Bool", "SELF_TYPE"] {
            let mut b = AstBuilder::new();
            bare_class(&mut b, "A", Some(parent));
            let program = b.finish();
            let ctx = run(&program);

            assert_eq!(ctx.diagnostics.len(), 1, "parent {parent}");
            let a = ctx.class_syms[0].unwrap();
            assert_eq!(ctx.symbols.class(a).parent, None);
        }
    }

    #[test]
    fn undefined_parent_reported() {
        let mut b = AstBuilder::new();
        bare_class(&mut b, "A", Some("Missing"));
        let program = b.finish();
        let ctx = run(&program);

        assert_eq!(ctx.diagnostics.len(), 1);
        assert!(
            ctx.diagnostics
                .render()
                .contains("Class A has undefined parent Missing")
        );
    }

    #[test]
    fn attribute_self_type_binds_to_owner() {
        let mut b = AstBuilder::new();
        let file = b.add_file("test.cl");
        let attr = b.attribute(
            Ident::new("x", sp()),
            TypeName::new("SELF_TYPE", sp()),
            None,
        );
        let attr_def = match &attr {
            Feature::Attribute(a) => a.def,
            Feature::Method(_) => unreachable!(),
        };
        b.add_class(ClassDef {
            name: TypeName::new("A", sp()),
            parent: None,
            features: vec![attr],
            file,
            span: sp(),
        });
        let program = b.finish();
        let ctx = run(&program);

        assert!(ctx.diagnostics.is_empty());
        let a = ctx.class_syms[0].unwrap();
        let sym = ctx.def_id_symbol(attr_def).unwrap();
        assert_eq!(ctx.symbols.id(sym).ty, Some(Ty::SelfOf(a)));
    }
}
