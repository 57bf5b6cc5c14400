//! The semantic passes, in pipeline order:
//!
//! 1. [`definition`] creates class/member/local symbols and the lexical
//!    scope tree, stamping every expression with its use-site scope.
//! 2. [`binding`] resolves parent classes and every declared type name.
//! 3. [`validation`] checks inheritance cycles, override contracts, and
//!    attribute redefinition.
//! 4. [`resolution`] types every expression and declaration.
//!
//! Each pass is a complete traversal over the whole program; later passes
//! rely on the annotations the earlier ones wrote. Every check reports into
//! the shared diagnostics sink and degrades locally, so one run collects
//! all independent errors.

pub mod binding;
pub mod definition;
pub mod resolution;
pub mod validation;

pub use binding::BindingPass;
pub use definition::DefinitionPass;
pub use resolution::ResolutionPass;
pub use validation::ValidationPass;
