//! Semantic analysis and code generation for Cool programs.
//!
//! The compiler consumes a [`Program`] built by the front end and drives
//! four semantic passes over it, in order:
//!
//! 1. [`DefinitionPass`] declares classes, features, formals, and local
//!    bindings, building the scope tree.
//! 2. [`BindingPass`] links classes to their parents and resolves every
//!    declared type name.
//! 3. [`ValidationPass`] rejects inheritance cycles and ill-formed
//!    overrides.
//! 4. [`ResolutionPass`] types every expression.
//!
//! If no pass reported an error, [`CodeGenPass`] then lowers the program to
//! a MIPS assembly image. Each pass degrades gracefully on error so a
//! single run reports as many problems as it can find.

pub mod codegen;
pub mod context;
pub mod error;
pub mod passes;
pub mod scope;
pub mod symbols;

use cool_ast::Program;

use codegen::CodeGenPass;
use context::CompilationContext;
use error::Diagnostics;
use passes::{BindingPass, DefinitionPass, ResolutionPass, ValidationPass};

/// Outcome of a compilation run: the assembly image when the program was
/// clean, and every diagnostic the passes produced when it was not.
#[derive(Debug)]
pub struct CompilationResult {
    pub code: Option<String>,
    pub diagnostics: Diagnostics,
}

impl CompilationResult {
    pub fn is_success(&self) -> bool {
        self.code.is_some()
    }
}

/// Run the full pipeline over a program.
///
/// Semantic passes always run to completion so the caller sees every
/// diagnostic; code generation runs only when none of them reported an
/// error.
pub fn compile(program: &Program) -> CompilationResult {
    let mut ctx = CompilationContext::new(program);

    DefinitionPass::run(&mut ctx, program);
    BindingPass::run(&mut ctx, program);
    ValidationPass::run(&mut ctx, program);
    ResolutionPass::run(&mut ctx, program);

    let code = if ctx.diagnostics.has_errors() {
        None
    } else {
        Some(CodeGenPass::run(&mut ctx, program))
    };

    CompilationResult {
        code,
        diagnostics: ctx.diagnostics,
    }
}
