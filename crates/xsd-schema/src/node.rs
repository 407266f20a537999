//! Schema-object nodes and occurrence bounds

use crate::context::DocumentId;
use crate::qname::QName;
use crate::scope::ScopeId;
use crate::tags::{NodeData, TagKind};
use std::fmt;
use xsd_ir::Position;

/// Handle of a node in the [`crate::Context`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Upper occurrence bound (`maxOccurs`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurs {
    Bounded(u32),
    Unbounded,
}

impl Occurs {
    /// Parse a `maxOccurs` value
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "unbounded" => Some(Occurs::Unbounded),
            other => other.parse().ok().map(Occurs::Bounded),
        }
    }

    /// More than one occurrence allowed
    pub fn is_many(self) -> bool {
        match self {
            Occurs::Bounded(n) => n > 1,
            Occurs::Unbounded => true,
        }
    }

    /// Product of two bounds (nested particles)
    #[must_use]
    pub fn times(self, other: Occurs) -> Occurs {
        match (self, other) {
            (Occurs::Bounded(0), _) | (_, Occurs::Bounded(0)) => Occurs::Bounded(0),
            (Occurs::Bounded(a), Occurs::Bounded(b)) => Occurs::Bounded(a.saturating_mul(b)),
            _ => Occurs::Unbounded,
        }
    }

    /// Sum of two bounds (repeated declarations)
    #[must_use]
    pub fn plus(self, other: Occurs) -> Occurs {
        match (self, other) {
            (Occurs::Bounded(a), Occurs::Bounded(b)) => Occurs::Bounded(a.saturating_add(b)),
            _ => Occurs::Unbounded,
        }
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occurs::Bounded(n) => write!(f, "{n}"),
            Occurs::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Occurrence range applied to content nested in particles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Multiplicity {
    pub min: u32,
    pub max: Occurs,
}

impl Multiplicity {
    /// Exactly once
    pub const ONE: Multiplicity = Multiplicity {
        min: 1,
        max: Occurs::Bounded(1),
    };

    pub fn new(min: u32, max: Occurs) -> Self {
        Self { min, max }
    }

    /// Combine with the range of a nested particle
    #[must_use]
    pub fn times(self, other: Multiplicity) -> Multiplicity {
        Multiplicity {
            min: self.min.saturating_mul(other.min),
            max: self.max.times(other.max),
        }
    }

    /// Same range with the lower bound dropped (choice branches)
    #[must_use]
    pub fn optional(self) -> Multiplicity {
        Multiplicity { min: 0, ..self }
    }
}

/// Parsed representation of one XSD tag instance
#[derive(Debug)]
pub struct Node {
    pub kind: TagKind,

    /// Per-kind payload
    pub data: NodeData,

    pub parent: Option<NodeId>,

    /// Child nodes in document order
    pub children: Vec<NodeId>,

    /// Scope the node was declared in (back-reference, not owned)
    pub scope: ScopeId,

    /// Scope opened by this node for its content
    pub own_scope: Option<ScopeId>,

    /// Document the tag came from; `None` for built-ins
    pub document: Option<DocumentId>,

    pub position: Position,

    /// Name the node was declared under
    pub name: Option<QName>,

    /// Raw attributes, `xmlns` declarations excluded
    pub attributes: Vec<(String, String)>,

    /// Documentation from a nested annotation
    pub comment: Option<String>,

    /// Resolve hook has run
    pub resolved: bool,
}

impl Node {
    /// Create a node for a tag
    pub fn new(kind: TagKind, scope: ScopeId, position: Position) -> Self {
        Self {
            kind,
            data: NodeData::for_kind(kind),
            parent: None,
            children: Vec::new(),
            scope,
            own_scope: None,
            document: None,
            position,
            name: None,
            attributes: Vec::new(),
            comment: None,
            resolved: false,
        }
    }

    /// Raw attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}
