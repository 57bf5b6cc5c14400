//! Cool compiler middle and back end.
//!
//! The front end builds a [`Program`](ast::Program) through
//! [`AstBuilder`](ast::AstBuilder); [`compile`] runs semantic analysis over
//! it and, when the program is clean, emits a MIPS assembly image for the
//! SPIM runtime.
//!
//! ```
//! use coolc::ast::{AstBuilder, ClassDef, ExprKind, Ident, Span, TypeName};
//!
//! let mut b = AstBuilder::new();
//! let file = b.add_file("hello.cl");
//! let body = b.add_expr(ExprKind::Int(1), Span::default());
//! let main = b.method(
//!     Ident::new("main", Span::default()),
//!     vec![],
//!     TypeName::new("Int", Span::default()),
//!     body,
//! );
//! b.add_class(ClassDef {
//!     name: TypeName::new("Main", Span::default()),
//!     parent: None,
//!     features: vec![main],
//!     file,
//!     span: Span::default(),
//! });
//!
//! let result = coolc::compile(&b.finish());
//! assert!(result.is_success());
//! ```

pub use cool_ast as ast;
pub use cool_compiler as compiler;

pub use cool_compiler::error::{Diagnostic, Diagnostics, SemanticError};
pub use cool_compiler::{compile, CompilationResult};
