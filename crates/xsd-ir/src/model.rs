//! Module graph of the intermediate model
#![allow(clippy::must_use_candidate)] // Accessors are clear at call sites without #[must_use].

use crate::decl::{TypeDecl, TypeId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Handle of a module inside a [`SchemaModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub usize);

/// An import of another module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Imported module
    pub module: ModuleId,

    /// Local name the module is bound to
    pub alias: String,
}

/// Exported declarations of one namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub id: ModuleId,

    /// Namespace URI the module was exported from (empty for no namespace)
    pub namespace: String,

    /// Virtual path without extension, `/`-separated
    pub path: String,

    /// Default local name when imported by other modules
    pub alias: String,

    /// Named declarations in declaration order
    pub types: Vec<TypeId>,

    /// Imports computed by the import pass
    pub imports: Vec<Import>,
}

/// The whole exported type graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaModel {
    modules: Vec<ModuleSpec>,
    types: Vec<TypeDecl>,
}

impl SchemaModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module for a namespace.
    ///
    /// Paths are unique within the model; a taken path gets a numeric suffix.
    pub fn add_module(&mut self, namespace: impl Into<String>, path: impl Into<String>) -> ModuleId {
        let base = path.into();
        let mut path = base.clone();
        let mut counter = 2;
        while self.modules.iter().any(|m| m.path == path) {
            path = format!("{base}_{counter}");
            counter += 1;
        }

        let alias = path.rsplit('/').next().unwrap_or(&path).to_string();
        let id = ModuleId(self.modules.len());
        let namespace = namespace.into();
        trace!("Adding module {} for namespace '{}'", path, namespace);

        self.modules.push(ModuleSpec {
            id,
            namespace,
            path,
            alias,
            types: Vec::new(),
            imports: Vec::new(),
        });
        id
    }

    /// Find the module exported from a namespace
    pub fn find_module(&self, namespace: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .find(|m| m.namespace == namespace)
            .map(|m| m.id)
    }

    /// Get a module
    pub fn module(&self, id: ModuleId) -> &ModuleSpec {
        &self.modules[id.0]
    }

    /// Get a module mutably
    pub fn module_mut(&mut self, id: ModuleId) -> &mut ModuleSpec {
        &mut self.modules[id.0]
    }

    /// Get a module, failing for handles from another model
    pub fn get_module(&self, id: ModuleId) -> Result<&ModuleSpec> {
        self.modules.get(id.0).ok_or_else(|| Error::module_not_found(id))
    }

    /// All modules in creation order
    pub fn modules(&self) -> &[ModuleSpec] {
        &self.modules
    }

    /// Add a declaration; named ones are listed in their module
    pub fn add_type(&mut self, decl: TypeDecl) -> TypeId {
        let id = TypeId(self.types.len());
        if decl.name.is_some() {
            self.modules[decl.module.0].types.push(id);
        }
        self.types.push(decl);
        id
    }

    /// Get a declaration
    pub fn type_decl(&self, id: TypeId) -> &TypeDecl {
        &self.types[id.0]
    }

    /// Get a declaration mutably
    pub fn type_decl_mut(&mut self, id: TypeId) -> &mut TypeDecl {
        &mut self.types[id.0]
    }

    /// Get a declaration, failing for handles from another model
    pub fn get_type(&self, id: TypeId) -> Result<&TypeDecl> {
        self.types.get(id.0).ok_or_else(|| Error::type_not_found(id))
    }

    /// All declarations, named and anonymous
    pub fn types(&self) -> impl Iterator<Item = (TypeId, &TypeDecl)> {
        self.types.iter().enumerate().map(|(idx, decl)| (TypeId(idx), decl))
    }

    /// Number of declarations
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Find a named declaration of a module by its schema name
    pub fn find_type(&self, module: ModuleId, xml_name: &str) -> Option<TypeId> {
        self.modules
            .get(module.0)?
            .types
            .iter()
            .copied()
            .find(|id| self.types[id.0].xml_name.as_deref() == Some(xml_name))
    }

    /// Relative import specifier from one module to another (`./x`, `../a/x`)
    pub fn relative_path(&self, from: ModuleId, to: ModuleId) -> String {
        relative_path(&self.module(from).path, &self.module(to).path)
    }
}

/// Relative specifier between two `/`-separated virtual paths
pub fn relative_path(from: &str, to: &str) -> String {
    let from_parts: Vec<&str> = from.split('/').collect();
    let from_dirs = &from_parts[..from_parts.len().saturating_sub(1)];
    let to_parts: Vec<&str> = to.split('/').collect();

    let common = from_dirs
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count()
        .min(to_parts.len().saturating_sub(1));

    let ups = from_dirs.len() - common;
    let rest = to_parts[common..].join("/");

    if ups == 0 {
        format!("./{rest}")
    } else {
        format!("{}{rest}", "../".repeat(ups))
    }
}
