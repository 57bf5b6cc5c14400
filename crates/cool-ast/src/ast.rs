//! Abstract syntax tree for Cool programs.
//!
//! The front end hands the compiler a fully built [`Program`]; the compiler
//! never restructures it. Expressions live in a flat arena indexed by
//! [`ExprId`], and every definition site (attribute, method, formal, `let`
//! binding, `case` arm) carries a [`DefId`], so semantic passes can annotate
//! nodes through side tables instead of mutating the tree.

use crate::span::Span;

// ============================================================================
// Ids
// ============================================================================

/// Index of an expression in the program's expression arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(u32);

impl ExprId {
    /// The arena slot this id refers to.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a definition site, used to key semantic side tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefId(u32);

impl DefId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a source file, used only for diagnostic attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(u32);

// ============================================================================
// Names
// ============================================================================

/// An identifier occurrence (variable, attribute, method name).
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// A type name occurrence (class name or `SELF_TYPE`).
#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub name: String,
    pub span: Span,
}

impl TypeName {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }

    /// Whether this names the polymorphic self type.
    pub fn is_self_type(&self) -> bool {
        self.name == "SELF_TYPE"
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// Binary operators of the expression grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Eq,
}

impl BinaryOp {
    /// The operator's source spelling, used in diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "=",
        }
    }

    /// Whether this is an arithmetic operator (operands and result are Int).
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        )
    }
}

/// One `let` binding. The initializer is evaluated in the scope *outside*
/// the binding, so a binding cannot see itself.
#[derive(Debug, Clone)]
pub struct LetBinding {
    pub name: Ident,
    pub declared_type: TypeName,
    pub init: Option<ExprId>,
    pub def: DefId,
}

/// One branch of a `case` expression.
#[derive(Debug, Clone)]
pub struct CaseArm {
    pub name: Ident,
    pub declared_type: TypeName,
    pub body: ExprId,
    pub def: DefId,
}

/// The closed set of expression forms.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    Str(String),
    Bool(bool),
    Id(Ident),
    Assign {
        target: Ident,
        value: ExprId,
    },
    /// A method call. `receiver` is `None` for implicit-`self` dispatch,
    /// `static_type` is `Some` for statically qualified dispatch `e@C.f(..)`.
    Dispatch {
        receiver: Option<ExprId>,
        static_type: Option<TypeName>,
        method: Ident,
        args: Vec<ExprId>,
    },
    New(TypeName),
    IsVoid(ExprId),
    If {
        cond: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
    },
    While {
        cond: ExprId,
        body: ExprId,
    },
    Block(Vec<ExprId>),
    Let {
        bindings: Vec<LetBinding>,
        body: ExprId,
    },
    Case {
        scrutinee: ExprId,
        arms: Vec<CaseArm>,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Not(ExprId),
    Negate(ExprId),
}

/// An expression node: its form plus its source position.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

// ============================================================================
// Declarations
// ============================================================================

/// A formal parameter of a method.
#[derive(Debug, Clone)]
pub struct Formal {
    pub name: Ident,
    pub declared_type: TypeName,
    pub def: DefId,
}

/// An attribute declaration, optionally initialized.
#[derive(Debug, Clone)]
pub struct AttributeDef {
    pub name: Ident,
    pub declared_type: TypeName,
    pub init: Option<ExprId>,
    pub def: DefId,
}

/// A method declaration.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: Ident,
    pub formals: Vec<Formal>,
    pub return_type: TypeName,
    pub body: ExprId,
    pub def: DefId,
}

/// A class member.
#[derive(Debug, Clone)]
pub enum Feature {
    Attribute(AttributeDef),
    Method(MethodDef),
}

/// A class declaration. `parent` is `None` when the class does not name a
/// superclass explicitly (it then inherits the root class).
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: TypeName,
    pub parent: Option<TypeName>,
    pub features: Vec<Feature>,
    pub file: FileId,
    pub span: Span,
}

// ============================================================================
// Program
// ============================================================================

/// A complete parsed program: all classes from all concatenated source files.
#[derive(Debug, Clone, Default)]
pub struct Program {
    files: Vec<String>,
    pub classes: Vec<ClassDef>,
    exprs: Vec<Expr>,
    def_count: u32,
}

impl Program {
    /// Look up an expression node by id.
    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    /// Number of expression nodes in the arena.
    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    /// Number of definition sites, for sizing side tables.
    pub fn def_count(&self) -> usize {
        self.def_count as usize
    }

    /// The source file name a class came from, for diagnostics.
    pub fn file_name(&self, id: FileId) -> &str {
        &self.files[id.0 as usize]
    }
}

/// Incremental builder the front end uses to assemble a [`Program`].
///
/// Interns expressions into the arena and allocates [`DefId`]s for
/// definition sites as they are constructed.
#[derive(Debug, Default)]
pub struct AstBuilder {
    program: Program,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source file and get its id.
    pub fn add_file(&mut self, name: impl Into<String>) -> FileId {
        let id = FileId(self.program.files.len() as u32);
        self.program.files.push(name.into());
        id
    }

    /// Intern an expression node.
    pub fn add_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId(self.program.exprs.len() as u32);
        self.program.exprs.push(Expr { kind, span });
        id
    }

    /// Allocate a fresh definition-site id.
    pub fn new_def(&mut self) -> DefId {
        let id = DefId(self.program.def_count);
        self.program.def_count += 1;
        id
    }

    pub fn formal(&mut self, name: Ident, declared_type: TypeName) -> Formal {
        Formal {
            name,
            declared_type,
            def: self.new_def(),
        }
    }

    pub fn let_binding(
        &mut self,
        name: Ident,
        declared_type: TypeName,
        init: Option<ExprId>,
    ) -> LetBinding {
        LetBinding {
            name,
            declared_type,
            init,
            def: self.new_def(),
        }
    }

    pub fn case_arm(&mut self, name: Ident, declared_type: TypeName, body: ExprId) -> CaseArm {
        CaseArm {
            name,
            declared_type,
            body,
            def: self.new_def(),
        }
    }

    pub fn attribute(
        &mut self,
        name: Ident,
        declared_type: TypeName,
        init: Option<ExprId>,
    ) -> Feature {
        Feature::Attribute(AttributeDef {
            name,
            declared_type,
            init,
            def: self.new_def(),
        })
    }

    pub fn method(
        &mut self,
        name: Ident,
        formals: Vec<Formal>,
        return_type: TypeName,
        body: ExprId,
    ) -> Feature {
        Feature::Method(MethodDef {
            name,
            formals,
            return_type,
            body,
            def: self.new_def(),
        })
    }

    /// Add a finished class declaration to the program.
    pub fn add_class(&mut self, class: ClassDef) {
        self.program.classes.push(class);
    }

    /// Finish building and hand over the immutable program.
    pub fn finish(self) -> Program {
        self.program
    }
}
