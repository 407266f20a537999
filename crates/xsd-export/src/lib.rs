#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # xsd-export
//!
//! Lowers resolved schema namespaces into the [`xsd_ir`] type model,
//! finalizes it with the import and sanitize passes and renders TypeScript
//! declaration files through a [`Writer`].

pub mod add_imports;
pub mod exporter;
pub mod sanitize;
pub mod typescript;
pub mod writer;

pub use add_imports::{AddImports, ImportsAdded};
pub use exporter::{ExportOptions, TargetModel, export_namespace};
pub use sanitize::{Rename, Sanitize, is_valid_identifier, safe_identifier, safe_property};
pub use typescript::{RenderedModule, TypeScript};
pub use writer::{CacheWriter, InMemoryWriter, Writer};

use thiserror::Error;
use xsd_ir::SourceInfo;

/// Errors that can occur while exporting and writing
#[derive(Error, Debug)]
pub enum Error {
    #[error("Type '{name}' at {location} was not exported")]
    Unexported { name: String, location: SourceInfo },

    #[error("Module '{from}' references '{to}' without an import")]
    MissingImport { from: String, to: String },

    #[error("Model error: {0}")]
    Model(#[from] xsd_ir::Error),

    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },
}

impl Error {
    /// Build an unexported type error
    pub fn unexported(name: impl Into<String>, location: SourceInfo) -> Self {
        Self::Unexported {
            name: name.into(),
            location,
        }
    }

    /// Build a missing import error
    pub fn missing_import(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::MissingImport {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Build a writer error
    pub fn write(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Write {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
