//! Semantic error types and the diagnostics collector.
//!
//! Every check reports into [`Diagnostics`] and degrades its result so the
//! enclosing pass keeps running; nothing in the semantic passes panics on
//! user input. A recorded error only becomes fatal at the pipeline
//! checkpoint before code generation.

use std::fmt;

use cool_ast::Span;
use thiserror::Error;

// ============================================================================
// Error taxonomy
// ============================================================================

/// Errors detected by the semantic passes.
///
/// The `Display` strings are the exact message bodies quoted after the
/// `Semantic error:` prefix in rendered diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    // Class-level definition errors
    #[error("Class has illegal name SELF_TYPE")]
    ClassNamedSelfType,

    #[error("Class {0} is redefined")]
    ClassRedefined(String),

    #[error("Class {class} has illegal parent {parent}")]
    IllegalParent { class: String, parent: String },

    #[error("Class {class} has undefined parent {parent}")]
    UndefinedParent { class: String, parent: String },

    #[error("Inheritance cycle for class {0}")]
    InheritanceCycle(String),

    // Attribute definition errors
    #[error("Class {class} has attribute with illegal name self")]
    AttributeNamedSelf { class: String },

    #[error("Class {class} redefines attribute {attribute}")]
    AttributeRedefined { class: String, attribute: String },

    #[error("Class {class} redefines inherited attribute {attribute}")]
    InheritedAttributeRedefined { class: String, attribute: String },

    #[error("Class {class} has attribute {attribute} with undefined type {ty}")]
    AttributeUndefinedType {
        class: String,
        attribute: String,
        ty: String,
    },

    // Method definition errors
    #[error("Class {class} redefines method {method}")]
    MethodRedefined { class: String, method: String },

    #[error("Class {class} has method {method} with undefined return type {ty}")]
    MethodUndefinedReturnType {
        class: String,
        method: String,
        ty: String,
    },

    #[error("Method {method} of class {class} has formal parameter with illegal name self")]
    FormalNamedSelf { class: String, method: String },

    #[error("Method {method} of class {class} redefines formal parameter {formal}")]
    FormalRedefined {
        class: String,
        method: String,
        formal: String,
    },

    #[error("Method {method} of class {class} has formal parameter {formal} with illegal type SELF_TYPE")]
    FormalSelfType {
        class: String,
        method: String,
        formal: String,
    },

    #[error("Method {method} of class {class} has formal parameter {formal} with undefined type {ty}")]
    FormalUndefinedType {
        class: String,
        method: String,
        formal: String,
        ty: String,
    },

    // Let / case binding errors
    #[error("Let variable has illegal name self")]
    LetNamedSelf,

    #[error("Let variable {name} has undefined type {ty}")]
    LetUndefinedType { name: String, ty: String },

    #[error("Case variable has illegal name self")]
    CaseNamedSelf,

    #[error("Case variable {name} has illegal type SELF_TYPE")]
    CaseSelfType { name: String },

    #[error("Case variable {name} has undefined type {ty}")]
    CaseUndefinedType { name: String, ty: String },

    // Override errors
    #[error("Class {class} overrides method {method} with different number of formal parameters")]
    OverrideArityMismatch { class: String, method: String },

    #[error(
        "Class {class} overrides method {method} but changes return type from {old_ty} to {new_ty}"
    )]
    OverrideReturnMismatch {
        class: String,
        method: String,
        old_ty: String,
        new_ty: String,
    },

    #[error(
        "Class {class} overrides method {method} but changes type of formal parameter {formal} from {old_ty} to {new_ty}"
    )]
    OverrideFormalMismatch {
        class: String,
        method: String,
        formal: String,
        old_ty: String,
        new_ty: String,
    },

    // Type resolution errors
    #[error("Undefined identifier {0}")]
    UndefinedIdentifier(String),

    #[error("Cannot assign to self")]
    AssignToSelf,

    #[error(
        "Type {actual} of assigned expression is incompatible with declared type {declared} of identifier {name}"
    )]
    AssignTypeMismatch {
        name: String,
        actual: String,
        declared: String,
    },

    #[error(
        "Type {actual} of initialization expression of attribute {name} is incompatible with declared type {declared}"
    )]
    AttributeInitMismatch {
        name: String,
        actual: String,
        declared: String,
    },

    #[error(
        "Type {actual} of initialization expression of identifier {name} is incompatible with declared type {declared}"
    )]
    LetInitMismatch {
        name: String,
        actual: String,
        declared: String,
    },

    #[error(
        "Type {actual} of the body of method {method} is incompatible with declared return type {declared}"
    )]
    MethodBodyMismatch {
        method: String,
        actual: String,
        declared: String,
    },

    #[error("new is used with undefined type {0}")]
    NewUndefinedType(String),

    #[error("Type of static dispatch cannot be SELF_TYPE")]
    StaticDispatchSelfType,

    #[error("Type {0} of static dispatch is undefined")]
    StaticDispatchUndefinedType(String),

    #[error("Type {qualifier} of static dispatch is not a superclass of type {receiver}")]
    StaticDispatchNotSuperclass { qualifier: String, receiver: String },

    #[error("Undefined method {method} in class {class}")]
    UndefinedMethod { method: String, class: String },

    #[error("Method {method} of class {class} is applied to wrong number of arguments")]
    DispatchArityMismatch { method: String, class: String },

    #[error(
        "In call to method {method} of class {class}, actual type {actual} of formal parameter {formal} is incompatible with declared type {declared}"
    )]
    DispatchArgMismatch {
        class: String,
        method: String,
        formal: String,
        actual: String,
        declared: String,
    },

    #[error("If condition has type {0} instead of Bool")]
    IfCondNotBool(String),

    #[error("While condition has type {0} instead of Bool")]
    WhileCondNotBool(String),

    #[error("Operand of {op} has type {actual} instead of {expected}")]
    OperandTypeMismatch {
        op: String,
        actual: String,
        expected: String,
    },

    #[error("Cannot compare {left} with {right}")]
    IllegalComparison { left: String, right: String },
}

// ============================================================================
// Diagnostics
// ============================================================================

/// One reported semantic error, attributed to the source file of the class
/// it occurred in.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub file: String,
    pub span: Span,
    pub error: SemanticError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\", line {}:{}, Semantic error: {}",
            self.file, self.span.line, self.span.col, self.error
        )
    }
}

/// Collector for semantic errors, threaded through all passes.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one error.
    pub fn report(&mut self, file: &str, span: Span, error: SemanticError) {
        self.diagnostics.push(Diagnostic {
            file: file.to_string(),
            span,
            error,
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Render all diagnostics, one per line, followed by the halting marker
    /// when any error was recorded.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for d in &self.diagnostics {
            out.push_str(&d.to_string());
            out.push('\n');
        }
        if !self.diagnostics.is_empty() {
            out.push_str("Compilation halted\n");
        }
        out
    }
}
