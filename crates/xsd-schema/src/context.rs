//! Per-compile registries: namespaces, scopes, nodes and documents

use crate::builtins::{BUILTINS, XML_ATTRIBUTES};
use crate::node::{Node, NodeId, Occurs};
use crate::qname::{QName, XML_NS, XSD_NS};
use crate::scope::{Collision, CollisionPolicy, Declaration, EntryKind, Scope, ScopeId};
use crate::tags::{AttributeData, NodeData, TagKind};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};
use xsd_ir::{Position, SourceInfo};

/// Handle of a namespace in the [`Context`] registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(pub usize);

/// Handle of a parsed document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub usize);

/// Load progress of a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Registered, documents still being fetched or parsed
    Loading,
    /// Closure loaded and resolved
    Loaded,
}

/// How a document was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Entry,
    Import,
    Include,
    Redefine,
}

/// Registry entry of one namespace
#[derive(Debug)]
pub struct Namespace {
    pub id: NamespaceId,

    /// Namespace URI, empty for no namespace
    pub uri: String,

    pub root_scope: ScopeId,

    pub load_state: LoadState,

    /// Documents contributing to the namespace, in parse order
    pub documents: Vec<DocumentId>,
}

/// A parsed schema document
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub url: String,
    pub namespace: NamespaceId,
    pub kind: DocumentKind,

    /// `elementFormDefault="qualified"`
    pub element_qualified: bool,

    /// `attributeFormDefault="qualified"`
    pub attribute_qualified: bool,
}

/// State of one compile.
///
/// Owns every arena; nodes and scopes refer to each other by index only.
#[derive(Debug)]
pub struct Context {
    namespaces: Vec<Namespace>,
    by_uri: HashMap<String, NamespaceId>,
    scopes: Vec<Scope>,
    nodes: Vec<Node>,
    documents: Vec<DocumentInfo>,
    primitive: NamespaceId,
    xml: NamespaceId,
    redefined: HashSet<(EntryKind, QName)>,

    /// Duplicate handling per symbol space
    pub policy: CollisionPolicy,

    /// Recoverable problems collected while parsing
    pub diagnostics: Vec<Error>,
}

impl Context {
    /// Create a context with the built-in namespaces seeded
    pub fn new() -> Self {
        Self::with_policy(CollisionPolicy::default())
    }

    /// Create a context with a custom collision policy
    pub fn with_policy(policy: CollisionPolicy) -> Self {
        let mut ctx = Self {
            namespaces: Vec::new(),
            by_uri: HashMap::new(),
            scopes: Vec::new(),
            nodes: Vec::new(),
            documents: Vec::new(),
            primitive: NamespaceId(0),
            xml: NamespaceId(0),
            redefined: HashSet::new(),
            policy,
            diagnostics: Vec::new(),
        };
        ctx.seed();
        ctx
    }

    fn seed(&mut self) {
        self.primitive = self.register(XSD_NS);
        let scope = self.namespace(self.primitive).root_scope;
        for (local, primitive) in BUILTINS {
            let mut node = Node::new(TagKind::Builtin, scope, Position::default());
            node.data = NodeData::Builtin(*primitive);
            node.name = Some(QName::new(Some(XSD_NS), *local));
            node.resolved = true;
            let id = self.add_node(node);
            let inserted = self
                .scope_mut(scope)
                .insert(
                    Declaration {
                        name: Some(QName::new(Some(XSD_NS), *local)),
                        kind: EntryKind::Type,
                        node: id,
                        min: 1,
                        max: Occurs::Bounded(1),
                    },
                    Collision::Reject,
                )
                .is_ok();
            debug_assert!(inserted, "duplicate built-in type '{local}'");
        }

        let string = self.builtin("string");
        self.xml = self.register(XML_NS);
        let scope = self.namespace(self.xml).root_scope;
        for local in XML_ATTRIBUTES {
            let name = QName::new(Some(XML_NS), *local);
            let mut node = Node::new(TagKind::Attribute, scope, Position::default());
            node.data = NodeData::Attribute(AttributeData {
                global: true,
                type_node: string,
                ..AttributeData::default()
            });
            node.name = Some(name.clone());
            node.resolved = true;
            let id = self.add_node(node);
            let inserted = self
                .scope_mut(scope)
                .insert(
                    Declaration {
                        name: Some(name),
                        kind: EntryKind::Attribute,
                        node: id,
                        min: 0,
                        max: Occurs::Bounded(1),
                    },
                    Collision::Reject,
                )
                .is_ok();
            debug_assert!(inserted, "duplicate built-in attribute 'xml:{local}'");
        }

        self.namespace_mut(self.primitive).load_state = LoadState::Loaded;
        self.namespace_mut(self.xml).load_state = LoadState::Loaded;
        trace!("Seeded {} built-in nodes", self.nodes.len());
    }

    /// Register a namespace, returning the existing entry when present
    pub fn register(&mut self, uri: &str) -> NamespaceId {
        if let Some(id) = self.by_uri.get(uri) {
            return *id;
        }

        let id = NamespaceId(self.namespaces.len());
        let root_scope = self.add_scope(None, id);
        debug!("Registering namespace '{}'", uri);

        self.namespaces.push(Namespace {
            id,
            uri: uri.to_string(),
            root_scope,
            load_state: LoadState::Loading,
            documents: Vec::new(),
        });
        self.by_uri.insert(uri.to_string(), id);
        id
    }

    /// Find a registered namespace
    pub fn namespace_id(&self, uri: &str) -> Option<NamespaceId> {
        self.by_uri.get(uri).copied()
    }

    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.0]
    }

    pub fn namespace_mut(&mut self, id: NamespaceId) -> &mut Namespace {
        &mut self.namespaces[id.0]
    }

    /// All namespaces in registration order
    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// The XML Schema namespace with the built-in types
    pub fn primitive(&self) -> NamespaceId {
        self.primitive
    }

    /// The `xml` namespace
    pub fn xml(&self) -> NamespaceId {
        self.xml
    }

    /// Whether a namespace is one of the seeded built-in namespaces
    pub fn is_builtin(&self, id: NamespaceId) -> bool {
        id == self.primitive || id == self.xml
    }

    /// Node of a built-in type
    pub fn builtin(&self, local: &str) -> Option<NodeId> {
        let scope = self.namespace(self.primitive).root_scope;
        self.scope(scope)
            .get(EntryKind::Type, &QName::new(Some(XSD_NS), local))
            .map(|d| d.node)
    }

    /// Create a scope
    pub fn add_scope(&mut self, parent: Option<ScopeId>, namespace: NamespaceId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(id, parent, namespace));
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    /// Add a node to the arena
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Number of nodes created so far
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Record a parsed document under its namespace
    pub fn add_document(
        &mut self,
        url: &str,
        namespace: NamespaceId,
        kind: DocumentKind,
        element_qualified: bool,
        attribute_qualified: bool,
    ) -> DocumentId {
        let id = DocumentId(self.documents.len());
        self.documents.push(DocumentInfo {
            id,
            url: url.to_string(),
            namespace,
            kind,
            element_qualified,
            attribute_qualified,
        });
        self.namespace_mut(namespace).documents.push(id);
        id
    }

    pub fn document(&self, id: DocumentId) -> &DocumentInfo {
        &self.documents[id.0]
    }

    /// Find a document by the URL it was fetched from
    pub fn document_by_url(&self, url: &str) -> Option<&DocumentInfo> {
        self.documents.iter().find(|doc| doc.url == url)
    }

    /// All parsed documents
    pub fn documents(&self) -> &[DocumentInfo] {
        &self.documents
    }

    /// Source location of a node for diagnostics
    pub fn location(&self, id: NodeId) -> SourceInfo {
        let node = self.node(id);
        let source = node
            .document
            .map_or_else(|| "<builtin>".to_string(), |doc| self.document(doc).url.clone());
        SourceInfo::new(source, node.position).with_context(node.kind.name())
    }

    /// Namespace URI of the document a node came from
    pub fn target_namespace(&self, id: NodeId) -> &str {
        let namespace = self.scope(self.node(id).scope).namespace;
        &self.namespace(namespace).uri
    }

    /// Register `node` as a child declaration of `target`
    pub fn add_to_parent(
        &mut self,
        name: Option<QName>,
        kind: EntryKind,
        node: NodeId,
        min: u32,
        max: Occurs,
        target: ScopeId,
    ) -> Result<()> {
        let is_root = self.scope(target).parent.is_none();

        if is_root {
            if let Some(name) = &name {
                if self.redefined.contains(&(kind, name.clone())) {
                    debug!("Keeping redefinition of {} '{}'", kind, name);
                    return Ok(());
                }
            }
        }

        let collision = self.policy.decide(kind, is_root);
        let declaration = Declaration {
            name: name.clone(),
            kind,
            node,
            min,
            max,
        };

        trace!(
            "Declaring {} '{}' in scope #{}",
            kind,
            name.as_ref().map_or("<anonymous>", QName::full),
            target.0
        );

        if self.scope_mut(target).insert(declaration, collision).is_err() {
            let name = name.unwrap_or_else(|| QName::new(None, ""));
            return Err(Error::duplicate(kind, &name, self.location(node)));
        }
        self.node_mut(node).name = name;
        Ok(())
    }

    /// Register a global declaration that replaces any other of the same name
    pub fn redefine(&mut self, name: QName, kind: EntryKind, node: NodeId, target: ScopeId) {
        debug!("Redefining {} '{}'", kind, name);
        self.scope_mut(target).replace(Declaration {
            name: Some(name.clone()),
            kind,
            node,
            min: 1,
            max: Occurs::Bounded(1),
        });
        self.node_mut(node).name = Some(name.clone());
        self.redefined.insert((kind, name));
    }

    /// Find the nearest declaration of a name.
    ///
    /// Walks from `from` outward through parent scopes, then falls back to the
    /// root scope of the name's namespace.
    pub fn lookup(&self, from: ScopeId, kind: EntryKind, name: &QName) -> Option<Declaration> {
        let mut current = Some(from);
        while let Some(id) = current {
            let scope = self.scope(id);
            if let Some(found) = scope.get(kind, name) {
                return Some(found.clone());
            }
            current = scope.parent;
        }

        let namespace = self.namespace_id(name.namespace().unwrap_or(""))?;
        let root = self.namespace(namespace).root_scope;
        self.scope(root).get(kind, name).cloned()
    }

    /// Look up a reference held by `node`, failing with its source position
    pub fn resolve_ref(&self, node: NodeId, kind: EntryKind, name: &QName) -> Result<NodeId> {
        self.lookup(self.node(node).scope, kind, name)
            .map(|d| d.node)
            .ok_or_else(|| Error::unresolved(kind, name, self.location(node)))
    }

    /// Root-scope declarations of a namespace in declaration order
    pub fn globals(&self, namespace: NamespaceId) -> &[Declaration] {
        self.scope(self.namespace(namespace).root_scope).entries()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_idempotent() {
        let mut ctx = Context::new();
        let a = ctx.register("urn:a");
        let b = ctx.register("urn:a");
        assert_eq!(a, b);
        assert_eq!(ctx.namespace(a).root_scope, ctx.namespace(b).root_scope);
        assert_eq!(ctx.namespace(a).load_state, LoadState::Loading);
        assert_ne!(ctx.register("urn:b"), a);
    }

    #[test]
    fn test_builtins_seeded() {
        let ctx = Context::new();
        let string = ctx.builtin("string").unwrap();
        assert!(matches!(
            ctx.node(string).data,
            NodeData::Builtin(xsd_ir::Primitive::String)
        ));
        assert_eq!(ctx.namespace(ctx.primitive()).load_state, LoadState::Loaded);

        let lang = QName::new(Some(XML_NS), "lang");
        let scope = ctx.namespace(ctx.xml()).root_scope;
        assert!(ctx.lookup(scope, EntryKind::Attribute, &lang).is_some());
    }

    #[test]
    fn test_every_builtin_is_declared_once() {
        let ctx = Context::new();
        let types = ctx.globals(ctx.primitive());
        assert_eq!(types.len(), BUILTINS.len());
        assert_eq!(ctx.globals(ctx.xml()).len(), XML_ATTRIBUTES.len());

        for (local, _) in BUILTINS {
            let name = QName::new(Some(XSD_NS), *local);
            let scope = ctx.scope(ctx.namespace(ctx.primitive()).root_scope);
            assert_eq!(scope.get_all(EntryKind::Type, &name).len(), 1, "{local}");
        }
    }

    #[test]
    fn test_lookup_falls_back_to_namespace_root() {
        let mut ctx = Context::new();
        let ns = ctx.register("urn:a");
        let root = ctx.namespace(ns).root_scope;
        let local = ctx.add_scope(Some(root), ns);

        let int = QName::new(Some(XSD_NS), "int");
        let found = ctx.lookup(local, EntryKind::Type, &int).unwrap();
        assert_eq!(Some(found.node), ctx.builtin("int"));

        let missing = QName::new(Some("urn:nowhere"), "Thing");
        assert!(ctx.lookup(local, EntryKind::Type, &missing).is_none());
    }

    #[test]
    fn test_add_to_parent_duplicate_global() {
        let mut ctx = Context::new();
        let ns = ctx.register("urn:a");
        let root = ctx.namespace(ns).root_scope;
        let name = QName::new(Some("urn:a"), "Person");

        let first = ctx.add_node(Node::new(TagKind::ComplexType, root, Position::new(2, 3, 20)));
        let second = ctx.add_node(Node::new(TagKind::ComplexType, root, Position::new(9, 3, 90)));

        ctx.add_to_parent(Some(name.clone()), EntryKind::Type, first, 1, Occurs::Bounded(1), root)
            .unwrap();
        let err = ctx
            .add_to_parent(Some(name.clone()), EntryKind::Type, second, 1, Occurs::Bounded(1), root)
            .unwrap_err();

        match err {
            Error::DuplicateDeclaration { name, location, .. } => {
                assert_eq!(name, "{urn:a}Person");
                assert_eq!(location.position.line, 9);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_add_to_parent_local_elements_accumulate() {
        let mut ctx = Context::new();
        let ns = ctx.register("urn:a");
        let root = ctx.namespace(ns).root_scope;
        let local = ctx.add_scope(Some(root), ns);
        let name = QName::new(None, "item");

        for _ in 0..2 {
            let node = ctx.add_node(Node::new(TagKind::Element, local, Position::default()));
            ctx.add_to_parent(Some(name.clone()), EntryKind::Element, node, 1, Occurs::Bounded(1), local)
                .unwrap();
        }

        assert_eq!(ctx.scope(local).get_all(EntryKind::Element, &name).len(), 2);
    }

    #[test]
    fn test_redefine_wins_over_later_definition() {
        let mut ctx = Context::new();
        let ns = ctx.register("urn:a");
        let root = ctx.namespace(ns).root_scope;
        let name = QName::new(Some("urn:a"), "Base");

        let redefinition = ctx.add_node(Node::new(TagKind::ComplexType, root, Position::default()));
        ctx.redefine(name.clone(), EntryKind::Type, redefinition, root);

        let original = ctx.add_node(Node::new(TagKind::ComplexType, root, Position::default()));
        ctx.add_to_parent(Some(name.clone()), EntryKind::Type, original, 1, Occurs::Bounded(1), root)
            .unwrap();

        assert_eq!(ctx.lookup(root, EntryKind::Type, &name).unwrap().node, redefinition);
    }
}
