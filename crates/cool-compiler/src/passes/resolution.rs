//! Type resolution pass.
//!
//! A recursive, bottom-up expression typer. Every expression gets a static
//! type recorded in the context's side table; a failed sub-expression
//! reports one error at the point of failure and yields `None`, which
//! callers absorb without re-reporting (substituting the root class or a
//! fixed primitive where a result is still needed) so that one run
//! collects every independent error in the program.
//!
//! `SELF_TYPE` resolution is contextual: an identifier or `new` resolves
//! it against the lexically enclosing class, a dispatch result against the
//! receiver's type.

use cool_ast::{ExprId, ExprKind, Feature, Ident, Program, Span};

use crate::context::CompilationContext;
use crate::error::SemanticError;
use crate::symbols::{ClassId, SymbolId, Ty};

pub struct ResolutionPass<'a> {
    ctx: &'a mut CompilationContext,
    program: &'a Program,
    file: String,
    current_class: ClassId,
}

impl<'a> ResolutionPass<'a> {
    pub fn run(ctx: &'a mut CompilationContext, program: &'a Program) {
        let root = ctx.builtins.object;
        let mut pass = Self {
            ctx,
            program,
            file: String::new(),
            current_class: root,
        };

        for (index, class) in program.classes.iter().enumerate() {
            let Some(class_id) = pass.ctx.class_syms[index] else {
                continue;
            };
            pass.file = program.file_name(class.file).to_string();
            pass.current_class = class_id;

            for feature in &class.features {
                match feature {
                    Feature::Attribute(attr) => pass.check_attribute(attr),
                    Feature::Method(method) => pass.check_method(method),
                }
            }
        }
    }

    fn report(&mut self, span: Span, error: SemanticError) {
        self.ctx.diagnostics.report(&self.file, span, error);
    }

    fn span(&self, expr: ExprId) -> Span {
        self.program.expr(expr).span
    }

    fn ty_name(&self, ty: Ty) -> String {
        self.ctx.symbols.ty_name(ty).to_string()
    }

    fn bool_ty(&self) -> Ty {
        Ty::Class(self.ctx.builtins.bool_)
    }

    fn int_ty(&self) -> Ty {
        Ty::Class(self.ctx.builtins.int)
    }

    fn object_ty(&self) -> Ty {
        Ty::Class(self.ctx.builtins.object)
    }

    // ==========================================================================
    // Features
    // ==========================================================================

    fn check_attribute(&mut self, attr: &cool_ast::AttributeDef) {
        let declared = self
            .ctx
            .def_id_symbol(attr.def)
            .and_then(|sym| self.ctx.symbols.id(sym).ty);

        let Some(init) = attr.init else {
            return;
        };
        let init_ty = self.type_of(init);

        if let (Some(init_ty), Some(declared)) = (init_ty, declared) {
            if !self.ctx.symbols.is_subtype(init_ty, declared) {
                self.report(
                    self.span(init),
                    SemanticError::AttributeInitMismatch {
                        name: attr.name.name.clone(),
                        actual: self.ty_name(init_ty),
                        declared: self.ty_name(declared),
                    },
                );
            }
        }
    }

    fn check_method(&mut self, method: &cool_ast::MethodDef) {
        // A method the definition pass rejected has no symbol and its body
        // carries no scope stamps, so typing it would only cascade.
        let Some(method_id) = self.ctx.def_method(method.def) else {
            return;
        };
        let declared = self.ctx.symbols.method(method_id).ret;

        let body_ty = self.type_of(method.body);

        if let (Some(body_ty), Some(declared)) = (body_ty, declared) {
            if !self.ctx.symbols.is_subtype(body_ty, declared) {
                self.report(
                    self.span(method.body),
                    SemanticError::MethodBodyMismatch {
                        method: method.name.name.clone(),
                        actual: self.ty_name(body_ty),
                        declared: self.ty_name(declared),
                    },
                );
            }
        }
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    /// Type one expression, recording the result in the side table.
    /// `None` means a diagnostic has already been reported below.
    fn type_of(&mut self, expr: ExprId) -> Option<Ty> {
        let ty = self.compute(expr);
        if let Some(ty) = ty {
            self.ctx.expr_types.insert(expr, ty);
        }
        ty
    }

    fn compute(&mut self, expr: ExprId) -> Option<Ty> {
        let program = self.program;
        match &program.expr(expr).kind {
            ExprKind::Int(_) => Some(self.int_ty()),
            ExprKind::Str(_) => Some(Ty::Class(self.ctx.builtins.string)),
            ExprKind::Bool(_) => Some(self.bool_ty()),

            ExprKind::Id(ident) => self.type_id(expr, ident),

            ExprKind::Assign { target, value } => self.type_assign(expr, target, *value),

            ExprKind::Dispatch {
                receiver,
                static_type,
                method,
                args,
            } => self.type_dispatch(expr, *receiver, static_type.as_ref(), method, args),

            ExprKind::New(type_name) => {
                if type_name.is_self_type() {
                    return Some(Ty::SelfOf(self.current_class));
                }
                match self.ctx.symbols.class_by_name(&type_name.name) {
                    Some(class) => Some(Ty::Class(class)),
                    None => {
                        self.report(
                            type_name.span,
                            SemanticError::NewUndefinedType(type_name.name.clone()),
                        );
                        None
                    }
                }
            }

            ExprKind::IsVoid(e) => {
                self.type_of(*e);
                Some(self.bool_ty())
            }

            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_ty = self.type_of(*cond);
                let then_ty = self.type_of(*then_branch);
                let else_ty = self.type_of(*else_branch);

                if let Some(cond_ty) = cond_ty {
                    if cond_ty != self.bool_ty() {
                        self.report(
                            self.span(*cond),
                            SemanticError::IfCondNotBool(self.ty_name(cond_ty)),
                        );
                        return Some(self.object_ty());
                    }
                }

                match (cond_ty, then_ty, else_ty) {
                    (Some(_), Some(t), Some(e)) => Some(self.ctx.symbols.lub(t, e)),
                    _ => Some(self.object_ty()),
                }
            }

            ExprKind::While { cond, body } => {
                let cond_ty = self.type_of(*cond);
                self.type_of(*body);

                if let Some(cond_ty) = cond_ty {
                    if cond_ty != self.bool_ty() {
                        self.report(
                            self.span(*cond),
                            SemanticError::WhileCondNotBool(self.ty_name(cond_ty)),
                        );
                    }
                }
                Some(self.object_ty())
            }

            ExprKind::Block(exprs) => {
                let mut last = None;
                for e in exprs {
                    if let Some(ty) = self.type_of(*e) {
                        last = Some(ty);
                    }
                }
                last.or_else(|| Some(self.object_ty()))
            }

            ExprKind::Let { bindings, body } => {
                for binding in bindings {
                    let declared = self
                        .ctx
                        .def_id_symbol(binding.def)
                        .and_then(|sym| self.ctx.symbols.id(sym).ty);

                    let Some(init) = binding.init else {
                        continue;
                    };
                    let init_ty = self.type_of(init);

                    if let (Some(init_ty), Some(declared)) = (init_ty, declared) {
                        if !self.ctx.symbols.is_subtype(init_ty, declared) {
                            self.report(
                                self.span(init),
                                SemanticError::LetInitMismatch {
                                    name: binding.name.name.clone(),
                                    actual: self.ty_name(init_ty),
                                    declared: self.ty_name(declared),
                                },
                            );
                        }
                    }
                }
                self.type_of(*body)
            }

            ExprKind::Case { scrutinee, arms } => {
                self.type_of(*scrutinee);

                let mut result: Option<Ty> = None;
                for arm in arms {
                    let Some(arm_ty) = self.type_of(arm.body) else {
                        continue;
                    };
                    result = Some(match result {
                        Some(acc) => self.ctx.symbols.lub(acc, arm_ty),
                        None => arm_ty,
                    });
                }
                result.or_else(|| Some(self.object_ty()))
            }

            ExprKind::Binary { op, lhs, rhs } => {
                use cool_ast::BinaryOp;

                let lhs_ty = self.type_of(*lhs);
                let rhs_ty = self.type_of(*rhs);
                let (lhs_ty, rhs_ty) = (lhs_ty?, rhs_ty?);

                match op {
                    BinaryOp::Eq => {
                        let left_prim =
                            self.ctx.symbols.class(lhs_ty.actual_class()).is_primitive();
                        let right_prim =
                            self.ctx.symbols.class(rhs_ty.actual_class()).is_primitive();
                        if lhs_ty != rhs_ty && (left_prim || right_prim) {
                            self.report(
                                self.span(expr),
                                SemanticError::IllegalComparison {
                                    left: self.ty_name(lhs_ty),
                                    right: self.ty_name(rhs_ty),
                                },
                            );
                            return None;
                        }
                        Some(self.bool_ty())
                    }
                    _ => {
                        let int = self.int_ty();
                        if !self.check_operand(*lhs, lhs_ty, op.symbol(), int) {
                            return None;
                        }
                        if !self.check_operand(*rhs, rhs_ty, op.symbol(), int) {
                            return None;
                        }
                        if op.is_arithmetic() {
                            Some(int)
                        } else {
                            Some(self.bool_ty())
                        }
                    }
                }
            }

            ExprKind::Not(e) => {
                let ty = self.type_of(*e)?;
                if !self.check_operand(*e, ty, "not", self.bool_ty()) {
                    return None;
                }
                Some(self.bool_ty())
            }

            ExprKind::Negate(e) => {
                // Always Int: a bad operand is reported but does not
                // poison the enclosing expression.
                if let Some(ty) = self.type_of(*e) {
                    self.check_operand(*e, ty, "~", self.int_ty());
                }
                Some(self.int_ty())
            }
        }
    }

    fn check_operand(&mut self, operand: ExprId, ty: Ty, op: &str, expected: Ty) -> bool {
        if ty != expected {
            self.report(
                self.span(operand),
                SemanticError::OperandTypeMismatch {
                    op: op.to_string(),
                    actual: self.ty_name(ty),
                    expected: self.ty_name(expected),
                },
            );
            return false;
        }
        true
    }

    fn lookup_id(&self, expr: ExprId, name: &str) -> Option<SymbolId> {
        let scope = *self.ctx.expr_scopes.get(&expr)?;
        self.ctx.scopes.lookup(&self.ctx.symbols, scope, name)
    }

    /// A declared `SELF_TYPE` is stored pinned to the class that declared
    /// it; at a use site it means the self type of the class lexically
    /// enclosing the reference, so an inherited `SELF_TYPE` member is read
    /// and assigned as the subclass's self type.
    fn at_use_site(&self, ty: Ty) -> Ty {
        match ty {
            Ty::SelfOf(_) => Ty::SelfOf(self.current_class),
            other => other,
        }
    }

    fn type_id(&mut self, expr: ExprId, ident: &Ident) -> Option<Ty> {
        if ident.name == "self" {
            let self_symbol = self.ctx.symbols.class(self.current_class).self_symbol;
            self.ctx.expr_symbols.insert(expr, self_symbol);
            return Some(Ty::SelfOf(self.current_class));
        }

        let Some(sym) = self.lookup_id(expr, &ident.name) else {
            self.report(
                ident.span,
                SemanticError::UndefinedIdentifier(ident.name.clone()),
            );
            return None;
        };

        self.ctx.expr_symbols.insert(expr, sym);
        self.ctx.symbols.id(sym).ty.map(|ty| self.at_use_site(ty))
    }

    fn type_assign(&mut self, expr: ExprId, target: &Ident, value: ExprId) -> Option<Ty> {
        if target.name == "self" {
            self.type_of(value);
            self.report(target.span, SemanticError::AssignToSelf);
            return None;
        }

        let Some(sym) = self.lookup_id(expr, &target.name) else {
            self.report(
                target.span,
                SemanticError::UndefinedIdentifier(target.name.clone()),
            );
            self.type_of(value);
            return None;
        };
        self.ctx.expr_symbols.insert(expr, sym);

        let declared = self.ctx.symbols.id(sym).ty.map(|ty| self.at_use_site(ty));
        let value_ty = self.type_of(value);

        if let (Some(value_ty), Some(declared)) = (value_ty, declared) {
            if !self.ctx.symbols.is_subtype(value_ty, declared) {
                self.report(
                    self.span(value),
                    SemanticError::AssignTypeMismatch {
                        name: target.name.clone(),
                        actual: self.ty_name(value_ty),
                        declared: self.ty_name(declared),
                    },
                );
                return None;
            }
        }
        declared
    }

    fn type_dispatch(
        &mut self,
        expr: ExprId,
        receiver: Option<ExprId>,
        static_type: Option<&cool_ast::TypeName>,
        method: &Ident,
        args: &[ExprId],
    ) -> Option<Ty> {
        let receiver_ty = match receiver {
            Some(r) => self.type_of(r)?,
            None => Ty::SelfOf(self.current_class),
        };

        // The class the method is looked up in: the static qualifier if
        // present, the receiver's actual class otherwise.
        let lookup_class = match static_type {
            Some(qualifier) => {
                if qualifier.is_self_type() {
                    self.report(qualifier.span, SemanticError::StaticDispatchSelfType);
                    return None;
                }
                let Some(class) = self.ctx.symbols.class_by_name(&qualifier.name) else {
                    self.report(
                        qualifier.span,
                        SemanticError::StaticDispatchUndefinedType(qualifier.name.clone()),
                    );
                    return None;
                };
                if !self
                    .ctx
                    .symbols
                    .is_subclass(receiver_ty.actual_class(), class)
                {
                    let receiver_name =
                        self.ctx.symbols.class(receiver_ty.actual_class()).name.clone();
                    self.report(
                        qualifier.span,
                        SemanticError::StaticDispatchNotSuperclass {
                            qualifier: qualifier.name.clone(),
                            receiver: receiver_name,
                        },
                    );
                    return None;
                }
                class
            }
            None => receiver_ty.actual_class(),
        };

        let lookup_class_name = self.ctx.symbols.class(lookup_class).name.clone();
        let Some(method_id) = self.ctx.symbols.lookup_method(lookup_class, &method.name) else {
            self.report(
                method.span,
                SemanticError::UndefinedMethod {
                    method: method.name.clone(),
                    class: lookup_class_name,
                },
            );
            return None;
        };
        self.ctx.expr_methods.insert(expr, method_id);

        // A SELF_TYPE return resolves to the receiver's type, so a call on
        // a subclass instance yields the subclass.
        let result = self.ctx.symbols.method(method_id).ret.map(|ret| {
            if ret.is_self_type() {
                receiver_ty
            } else {
                ret
            }
        });

        let formals = self.ctx.symbols.method(method_id).formals.clone();
        if formals.len() != args.len() {
            self.report(
                method.span,
                SemanticError::DispatchArityMismatch {
                    method: method.name.clone(),
                    class: lookup_class_name,
                },
            );
            return result;
        }

        let arg_types: Vec<Option<Ty>> = args.iter().map(|&arg| self.type_of(arg)).collect();

        for ((&arg, arg_ty), &formal) in args.iter().zip(&arg_types).zip(&formals) {
            let (Some(arg_ty), Some(formal_ty)) = (*arg_ty, self.ctx.symbols.id(formal).ty)
            else {
                continue;
            };
            if !self.ctx.symbols.is_subtype(arg_ty, formal_ty) {
                let formal_name = self.ctx.symbols.id(formal).name.clone();
                self.report(
                    self.span(arg),
                    SemanticError::DispatchArgMismatch {
                        class: lookup_class_name,
                        method: method.name.clone(),
                        formal: formal_name,
                        actual: self.ty_name(arg_ty),
                        declared: self.ty_name(formal_ty),
                    },
                );
                return result;
            }
        }

        result
    }
}
