#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # xsd-ir
//!
//! Intermediate schema-model graph produced by the exporter.
//!
//! The model is decoupled from XSD vocabulary: it only knows modules, named
//! or anonymous type declarations, their members and type references. The
//! import and sanitize passes and the TypeScript emitter all operate on it.

/// Type declarations, members and type references.
pub mod decl;
/// Source positions used for diagnostics.
pub mod metadata;
/// Module graph and type arena.
pub mod model;
/// Visitor helpers for walking type references.
pub mod traversal;

pub use decl::{DeclKind, Member, MemberKind, Primitive, TypeDecl, TypeId, TypeRef};
pub use metadata::{Position, SourceInfo};
pub use model::{Import, ModuleId, ModuleSpec, SchemaModel};
pub use traversal::{Traversal, walk_module, walk_type};

use thiserror::Error;

/// Errors that can occur when working with the model
#[derive(Error, Debug)]
pub enum Error {
    #[error("Type #{id} is not part of this model")]
    TypeNotFound { id: usize },

    #[error("Module #{id} is not part of this model")]
    ModuleNotFound { id: usize },
}

impl Error {
    /// Build a type-not-found error.
    pub fn type_not_found(id: TypeId) -> Self {
        Self::TypeNotFound { id: id.0 }
    }

    /// Build a module-not-found error.
    pub fn module_not_found(id: ModuleId) -> Self {
        Self::ModuleNotFound { id: id.0 }
    }
}

/// Crate-local result type for model operations.
pub type Result<T> = std::result::Result<T, Error>;
