//! Class-hierarchy validation pass.
//!
//! Runs after every parent pointer is bound: detects inheritance cycles,
//! enforces the override contract (same arity, exactly matching formal
//! types, matching return type with `SELF_TYPE` compatible on either
//! side), and rejects redefinition of inherited attributes. Broken
//! hierarchies are reported but left in place; the pipeline halts before
//! code generation anyway.

use cool_ast::{ClassDef, Feature, Program};

use crate::context::CompilationContext;
use crate::error::SemanticError;
use crate::symbols::{ClassId, MethodId};

pub struct ValidationPass<'a> {
    ctx: &'a mut CompilationContext,
    file: String,
}

impl<'a> ValidationPass<'a> {
    pub fn run(ctx: &'a mut CompilationContext, program: &'a Program) {
        let mut pass = Self {
            ctx,
            file: String::new(),
        };

        for (index, class) in program.classes.iter().enumerate() {
            let Some(class_id) = pass.ctx.class_syms[index] else {
                continue;
            };
            pass.file = program.file_name(class.file).to_string();
            pass.check_cycle(class_id, class);
            pass.check_features(class_id, class);
        }
    }

    fn report(&mut self, span: cool_ast::Span, error: SemanticError) {
        self.ctx.diagnostics.report(&self.file, span, error);
    }

    /// Walk the parent chain; revisiting the starting class means it sits
    /// on an inheritance cycle. The walk is fuel-capped, so a cycle that
    /// does not pass through the starting class just exhausts the fuel.
    fn check_cycle(&mut self, class_id: ClassId, class: &ClassDef) {
        let on_cycle = self
            .ctx
            .symbols
            .ancestry(class_id)
            .skip(1)
            .any(|c| c == class_id);
        if on_cycle {
            let name = self.ctx.symbols.class(class_id).name.clone();
            self.report(class.name.span, SemanticError::InheritanceCycle(name));
        }
    }

    fn check_features(&mut self, class_id: ClassId, class: &ClassDef) {
        for feature in &class.features {
            match feature {
                Feature::Method(method) => {
                    if let Some(method_id) = self.ctx.def_method(method.def) {
                        self.check_override(class_id, method_id, method);
                    }
                }
                Feature::Attribute(attr) => {
                    if self.ctx.def_id_symbol(attr.def).is_some()
                        && self
                            .ctx
                            .symbols
                            .lookup_inherited_attribute(class_id, &attr.name.name)
                            .is_some()
                    {
                        let class_name = self.ctx.symbols.class(class_id).name.clone();
                        self.report(
                            attr.name.span,
                            SemanticError::InheritedAttributeRedefined {
                                class: class_name,
                                attribute: attr.name.name.clone(),
                            },
                        );
                    }
                }
            }
        }
    }

    fn check_override(
        &mut self,
        class_id: ClassId,
        method_id: MethodId,
        method: &cool_ast::MethodDef,
    ) {
        let Some(overridden) = self
            .ctx
            .symbols
            .lookup_inherited_method(class_id, &method.name.name)
        else {
            return;
        };

        let class_name = self.ctx.symbols.class(class_id).name.clone();
        let method_name = method.name.name.clone();

        let new_formals = self.ctx.symbols.method(method_id).formals.clone();
        let old_formals = self.ctx.symbols.method(overridden).formals.clone();
        if new_formals.len() != old_formals.len() {
            self.report(
                method.name.span,
                SemanticError::OverrideArityMismatch {
                    class: class_name,
                    method: method_name,
                },
            );
            return;
        }

        let new_ret = self.ctx.symbols.method(method_id).ret;
        let old_ret = self.ctx.symbols.method(overridden).ret;
        if let (Some(new_ret), Some(old_ret)) = (new_ret, old_ret) {
            // SELF_TYPE on either side is compatible regardless of the
            // declaring class.
            if new_ret != old_ret && !new_ret.is_self_type() && !old_ret.is_self_type() {
                self.report(
                    method.return_type.span,
                    SemanticError::OverrideReturnMismatch {
                        class: class_name,
                        method: method_name,
                        old_ty: self.ctx.symbols.ty_name(old_ret).to_string(),
                        new_ty: self.ctx.symbols.ty_name(new_ret).to_string(),
                    },
                );
                return;
            }
        }

        for ((old_sym, new_sym), formal) in
            old_formals.iter().zip(&new_formals).zip(&method.formals)
        {
            let old_ty = self.ctx.symbols.id(*old_sym).ty;
            let new_ty = self.ctx.symbols.id(*new_sym).ty;
            if let (Some(old_ty), Some(new_ty)) = (old_ty, new_ty) {
                if old_ty != new_ty {
                    self.report(
                        formal.declared_type.span,
                        SemanticError::OverrideFormalMismatch {
                            class: class_name,
                            method: method_name,
                            formal: formal.name.name.clone(),
                            old_ty: self.ctx.symbols.ty_name(old_ty).to_string(),
                            new_ty: self.ctx.symbols.ty_name(new_ty).to_string(),
                        },
                    );
                    return;
                }
            }
        }
    }
}
