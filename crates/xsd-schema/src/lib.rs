#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # xsd-schema
//!
//! Schema-object graph, namespace-scoped symbol tables and the two-phase
//! loader for XML Schema documents.
//!
//! Documents are fetched through a [`Fetcher`], streamed through the tag
//! state machine into [`Node`]s registered in per-namespace [`Scope`]s, and
//! resolved once the whole import closure has been loaded.

pub mod builtins;
pub mod context;
pub mod fetch;
#[cfg(feature = "http")]
pub mod http;
pub mod loader;
pub mod node;
pub mod parser;
pub mod qname;
pub mod scope;
pub mod tags;

pub use context::{Context, DocumentId, DocumentInfo, DocumentKind, LoadState, Namespace, NamespaceId};
pub use fetch::{
    CachingFetcher, DefaultFetcher, FetchOptions, FetchedDocument, Fetcher, FileFetcher,
    MemoryFetcher, resolve_location,
};
pub use loader::Loader;
pub use node::{Multiplicity, Node, NodeId, Occurs};
pub use qname::{NamespaceBindings, QName, UnboundPrefix, XML_NS, XSD_NS};
pub use scope::{Collision, CollisionPolicy, Declaration, EntryKind, Scope, ScopeId};
pub use tags::{NodeData, TagKind};

use thiserror::Error;
use xsd_ir::SourceInfo;

/// Errors that can occur while loading and resolving schemas
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unbound namespace prefix '{prefix}' in '{name}' at {location}")]
    UnboundPrefix {
        prefix: String,
        name: String,
        location: SourceInfo,
    },

    #[error("Unexpected <{tag}> inside <{parent}> at {location}")]
    UnexpectedTag {
        tag: String,
        parent: String,
        location: SourceInfo,
    },

    #[error("Duplicate {kind} '{name}' at {location}")]
    DuplicateDeclaration {
        kind: String,
        name: String,
        location: SourceInfo,
    },

    #[error("Unresolved {kind} '{name}' at {location}")]
    UnresolvedReference {
        kind: String,
        name: String,
        location: SourceInfo,
    },

    #[error("Failed to fetch {url}{}: {message}", referenced_from(.origin))]
    Fetch {
        url: String,
        message: String,

        /// The `import`/`include`/`redefine` tag that asked for the document
        origin: Option<SourceInfo>,
    },

    #[error("Malformed XML at {location}: {message}")]
    Xml { location: SourceInfo, message: String },

    #[error("Invalid value '{value}' for attribute '{attribute}' at {location}")]
    InvalidAttribute {
        attribute: String,
        value: String,
        location: SourceInfo,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an unbound prefix error from a resolver failure
    pub fn unbound_prefix(err: UnboundPrefix, location: SourceInfo) -> Self {
        Self::UnboundPrefix {
            prefix: err.prefix,
            name: err.name,
            location,
        }
    }

    /// Build an unexpected tag diagnostic
    pub fn unexpected_tag(
        tag: impl Into<String>,
        parent: impl Into<String>,
        location: SourceInfo,
    ) -> Self {
        Self::UnexpectedTag {
            tag: tag.into(),
            parent: parent.into(),
            location,
        }
    }

    /// Build a duplicate declaration error
    pub fn duplicate(kind: EntryKind, name: &QName, location: SourceInfo) -> Self {
        Self::DuplicateDeclaration {
            kind: kind.to_string(),
            name: name.to_string(),
            location,
        }
    }

    /// Build an unresolved reference error
    pub fn unresolved(kind: EntryKind, name: &QName, location: SourceInfo) -> Self {
        Self::UnresolvedReference {
            kind: kind.to_string(),
            name: name.to_string(),
            location,
        }
    }

    /// Build a fetch error
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
            origin: None,
        }
    }

    /// Attach the referencing tag's position to a fetch error that has none
    #[must_use]
    pub fn with_origin(mut self, position: Option<SourceInfo>) -> Self {
        if let Self::Fetch { origin, .. } = &mut self {
            if origin.is_none() {
                *origin = position;
            }
        }
        self
    }

    /// Build a malformed document error
    pub fn xml(location: SourceInfo, message: impl Into<String>) -> Self {
        Self::Xml {
            location,
            message: message.into(),
        }
    }

    /// Build an invalid attribute error
    pub fn invalid_attribute(
        attribute: impl Into<String>,
        value: impl Into<String>,
        location: SourceInfo,
    ) -> Self {
        Self::InvalidAttribute {
            attribute: attribute.into(),
            value: value.into(),
            location,
        }
    }

    /// Whether loading may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnexpectedTag { .. })
    }
}

fn referenced_from(origin: &Option<SourceInfo>) -> String {
    origin
        .as_ref()
        .map(|origin| format!(" (referenced at {origin})"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;
