//! Namespace-scoped symbol tables

use crate::context::NamespaceId;
use crate::node::{NodeId, Occurs};
use crate::qname::QName;
use std::collections::HashMap;
use std::fmt;

/// Handle of a scope in the [`crate::Context`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

/// Symbol space a declaration lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryKind {
    Element,
    Attribute,
    /// Complex and simple types share one symbol space
    Type,
    Group,
    AttributeGroup,
    /// `<group ref>` inside a content model
    GroupRef,
    /// `<attributeGroup ref>` inside a type
    AttributeGroupRef,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Element => "element",
            EntryKind::Attribute => "attribute",
            EntryKind::Type => "type",
            EntryKind::Group => "group",
            EntryKind::AttributeGroup => "attributeGroup",
            EntryKind::GroupRef => "group reference",
            EntryKind::AttributeGroupRef => "attributeGroup reference",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens when a `(kind, name)` pair is declared twice in one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    /// Keep both declarations in document order
    Accumulate,
    /// Fail with a duplicate declaration error
    Reject,
}

/// Collision rules per symbol space and scope level
#[derive(Debug, Clone)]
pub struct CollisionPolicy {
    root: HashMap<EntryKind, Collision>,
    local: HashMap<EntryKind, Collision>,
}

impl CollisionPolicy {
    /// Rule for a kind in a namespace root scope or a local scope
    pub fn decide(&self, kind: EntryKind, is_root: bool) -> Collision {
        let table = if is_root { &self.root } else { &self.local };
        table.get(&kind).copied().unwrap_or(Collision::Reject)
    }

    /// Override a rule
    pub fn set(&mut self, kind: EntryKind, is_root: bool, collision: Collision) {
        let table = if is_root { &mut self.root } else { &mut self.local };
        table.insert(kind, collision);
    }
}

impl Default for CollisionPolicy {
    fn default() -> Self {
        let mut local = HashMap::new();
        local.insert(EntryKind::Element, Collision::Accumulate);
        local.insert(EntryKind::GroupRef, Collision::Accumulate);
        local.insert(EntryKind::AttributeGroupRef, Collision::Accumulate);

        Self {
            root: HashMap::new(),
            local,
        }
    }
}

/// A named (or anonymous) child membership inside a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: Option<QName>,
    pub kind: EntryKind,
    pub node: NodeId,
    pub min: u32,
    pub max: Occurs,
}

/// Symbol table of one namespace or of one type / group / element
#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub namespace: NamespaceId,
    entries: Vec<Declaration>,
    index: HashMap<(EntryKind, QName), Vec<usize>>,
}

impl Scope {
    pub fn new(id: ScopeId, parent: Option<ScopeId>, namespace: NamespaceId) -> Self {
        Self {
            id,
            parent,
            namespace,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert a declaration.
    ///
    /// Returns the existing declaration when the name is taken and the
    /// collision rule rejects repeats.
    pub fn insert(
        &mut self,
        declaration: Declaration,
        collision: Collision,
    ) -> Result<(), &Declaration> {
        if let Some(name) = &declaration.name {
            let key = (declaration.kind, name.clone());
            if let Some(existing) = self.index.get(&key) {
                if collision == Collision::Reject {
                    return Err(&self.entries[existing[0]]);
                }
            }
            self.index.entry(key).or_default().push(self.entries.len());
        }
        self.entries.push(declaration);
        Ok(())
    }

    /// Insert a named declaration, replacing the first one of the same name
    pub fn replace(&mut self, declaration: Declaration) {
        let key = declaration
            .name
            .clone()
            .map(|name| (declaration.kind, name));

        match key.as_ref().and_then(|key| self.index.get(key)) {
            Some(positions) => {
                let idx = positions[0];
                self.entries[idx] = declaration;
            }
            None => {
                if let Some(key) = key {
                    self.index.insert(key, vec![self.entries.len()]);
                }
                self.entries.push(declaration);
            }
        }
    }

    /// All declarations in document order
    pub fn entries(&self) -> &[Declaration] {
        &self.entries
    }

    /// First declaration of a name in this scope only
    pub fn get(&self, kind: EntryKind, name: &QName) -> Option<&Declaration> {
        self.index
            .get(&(kind, name.clone()))
            .and_then(|positions| positions.first())
            .map(|idx| &self.entries[*idx])
    }

    /// Every declaration of a name in this scope, in document order
    pub fn get_all(&self, kind: EntryKind, name: &QName) -> Vec<&Declaration> {
        self.index
            .get(&(kind, name.clone()))
            .map(|positions| positions.iter().map(|idx| &self.entries[*idx]).collect())
            .unwrap_or_default()
    }

    /// Anonymous declarations of a kind
    pub fn anonymous(&self, kind: EntryKind) -> impl Iterator<Item = &Declaration> {
        self.entries
            .iter()
            .filter(move |d| d.kind == kind && d.name.is_none())
    }

    /// Declarations with accumulated repeats folded into their first position.
    ///
    /// Occurrence bounds of repeats are summed. Anonymous declarations are
    /// kept as they are.
    pub fn members(&self) -> Vec<Declaration> {
        let mut merged: Vec<Declaration> = Vec::with_capacity(self.entries.len());
        let mut positions: HashMap<(EntryKind, &QName), usize> = HashMap::new();

        for entry in &self.entries {
            let Some(name) = &entry.name else {
                merged.push(entry.clone());
                continue;
            };

            match positions.get(&(entry.kind, name)) {
                Some(idx) => {
                    let first = &mut merged[*idx];
                    first.min = first.min.saturating_add(entry.min);
                    first.max = first.max.plus(entry.max);
                }
                None => {
                    positions.insert((entry.kind, name), merged.len());
                    merged.push(entry.clone());
                }
            }
        }

        merged
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
