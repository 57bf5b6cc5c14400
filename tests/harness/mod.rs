//! Shared program-construction helpers for the integration suites.
//!
//! Tests build programs straight through [`AstBuilder`] the way the front
//! end would, with default spans except where a test asserts on positions.
#![allow(dead_code)]

use coolc::ast::{
    AstBuilder, CaseArm, ClassDef, ExprId, ExprKind, Feature, FileId, Ident, Program, Span,
    TypeName,
};

pub fn sp() -> Span {
    Span::default()
}

pub struct TestProgram {
    pub ast: AstBuilder,
    file: FileId,
}

impl TestProgram {
    pub fn new(file_name: &str) -> Self {
        let mut ast = AstBuilder::new();
        let file = ast.add_file(file_name);
        Self { ast, file }
    }

    pub fn expr(&mut self, kind: ExprKind) -> ExprId {
        self.ast.add_expr(kind, sp())
    }

    pub fn expr_at(&mut self, kind: ExprKind, line: u32, col: u32) -> ExprId {
        self.ast.add_expr(kind, Span::point(line, col))
    }

    pub fn int(&mut self, value: i64) -> ExprId {
        self.expr(ExprKind::Int(value))
    }

    pub fn string(&mut self, value: &str) -> ExprId {
        self.expr(ExprKind::Str(value.to_string()))
    }

    pub fn id(&mut self, name: &str) -> ExprId {
        self.expr(ExprKind::Id(Ident::new(name, sp())))
    }

    pub fn new_of(&mut self, ty: &str) -> ExprId {
        self.expr(ExprKind::New(TypeName::new(ty, sp())))
    }

    pub fn dispatch(&mut self, receiver: Option<ExprId>, method: &str, args: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Dispatch {
            receiver,
            static_type: None,
            method: Ident::new(method, sp()),
            args,
        })
    }

    pub fn static_dispatch(
        &mut self,
        receiver: ExprId,
        qualifier: &str,
        method: &str,
        args: Vec<ExprId>,
    ) -> ExprId {
        self.expr(ExprKind::Dispatch {
            receiver: Some(receiver),
            static_type: Some(TypeName::new(qualifier, sp())),
            method: Ident::new(method, sp()),
            args,
        })
    }

    pub fn let_in(&mut self, name: &str, ty: &str, init: Option<ExprId>, body: ExprId) -> ExprId {
        let binding = self
            .ast
            .let_binding(Ident::new(name, sp()), TypeName::new(ty, sp()), init);
        self.expr(ExprKind::Let {
            bindings: vec![binding],
            body,
        })
    }

    pub fn case_of(&mut self, scrutinee: ExprId, arms: Vec<(&str, &str, ExprId)>) -> ExprId {
        let arms: Vec<CaseArm> = arms
            .into_iter()
            .map(|(name, ty, body)| {
                self.ast
                    .case_arm(Ident::new(name, sp()), TypeName::new(ty, sp()), body)
            })
            .collect();
        self.expr(ExprKind::Case { scrutinee, arms })
    }

    pub fn attribute(&mut self, name: &str, ty: &str, init: Option<ExprId>) -> Feature {
        self.ast
            .attribute(Ident::new(name, sp()), TypeName::new(ty, sp()), init)
    }

    pub fn method(&mut self, name: &str, formals: &[(&str, &str)], ret: &str, body: ExprId) -> Feature {
        let formals = formals
            .iter()
            .map(|(f, ty)| self.ast.formal(Ident::new(*f, sp()), TypeName::new(*ty, sp())))
            .collect();
        self.ast
            .method(Ident::new(name, sp()), formals, TypeName::new(ret, sp()), body)
    }

    pub fn class(&mut self, name: &str, parent: Option<&str>, features: Vec<Feature>) {
        self.class_at(name, parent, features, sp());
    }

    pub fn class_at(&mut self, name: &str, parent: Option<&str>, features: Vec<Feature>, span: Span) {
        self.ast.add_class(ClassDef {
            name: TypeName::new(name, span),
            parent: parent.map(|p| TypeName::new(p, span)),
            features,
            file: self.file,
            span,
        });
    }

    /// A minimal `Main.main` so clean-program tests pass validation.
    pub fn default_main(&mut self) {
        let body = self.int(0);
        let main = self.method("main", &[], "Int", body);
        self.class("Main", None, vec![main]);
    }

    pub fn finish(self) -> Program {
        self.ast.finish()
    }
}

/// Compile and return the rendered diagnostics, asserting there are some.
pub fn compile_err(program: &Program) -> String {
    let result = coolc::compile(program);
    assert!(!result.is_success(), "expected diagnostics");
    result.diagnostics.render()
}

/// Compile and return the assembly image, asserting a clean run.
pub fn compile_ok(program: &Program) -> String {
    let result = coolc::compile(program);
    assert!(
        result.is_success(),
        "unexpected diagnostics:\n{}",
        result.diagnostics.render()
    );
    result.code.expect("clean run emits code")
}
