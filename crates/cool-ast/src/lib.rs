//! Front-end interface of the Cool compiler.
//!
//! The external lexer/parser produces a [`Program`] through [`AstBuilder`];
//! everything downstream (semantic analysis, code generation) lives in the
//! `cool-compiler` crate and treats the tree as read-only.

pub mod ast;
pub mod span;

pub use ast::{
    AstBuilder, AttributeDef, BinaryOp, CaseArm, ClassDef, DefId, Expr, ExprId, ExprKind, Feature,
    FileId, Formal, Ident, LetBinding, MethodDef, Program, TypeName,
};
pub use span::Span;
