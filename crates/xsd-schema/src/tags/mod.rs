//! Tag-handler state machine.
//!
//! Every recognized XSD tag maps to a [`TagKind`]. Each kind has a
//! [`Handler`] with hooks for the parse lifecycle (open, text, close) and for
//! the resolve pass that runs once the whole document closure is loaded.

mod element;
mod particle;
mod schema;
mod types;

use crate::context::{Context, DocumentId, DocumentInfo};
use crate::loader::ImportRequest;
use crate::node::{Multiplicity, NodeId, Occurs};
use crate::qname::{NamespaceBindings, QName, XSD_NS};
use crate::scope::{EntryKind, ScopeId};
use crate::{Error, Result};
use xsd_ir::{Primitive, SourceInfo};

/// Recognized tag kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Schema,
    Import,
    Include,
    Redefine,
    Annotation,
    Documentation,
    AppInfo,
    Element,
    Attribute,
    ComplexType,
    SimpleType,
    Sequence,
    Choice,
    All,
    Group,
    AttributeGroup,
    ComplexContent,
    SimpleContent,
    Extension,
    Restriction,
    Enumeration,
    /// Constraining facets other than enumeration
    Facet,
    List,
    Union,
    Any,
    AnyAttribute,
    /// `unique`, `key` and `keyref`
    IdentityConstraint,
    Selector,
    Field,
    Notation,
    /// Seeded built-in simple type
    Builtin,
}

use TagKind as K;

const PARTICLE_CONTENT: &[TagKind] = &[K::Annotation, K::Element, K::Group, K::Choice, K::Sequence, K::Any];
const TYPE_BODY: &[TagKind] = &[
    K::Annotation,
    K::Sequence,
    K::Choice,
    K::All,
    K::Group,
    K::Attribute,
    K::AttributeGroup,
    K::AnyAttribute,
];
const ANNOTATED: &[TagKind] = &[K::Annotation];

impl TagKind {
    /// Dispatch a tag name; only names in the XML Schema namespace are recognized
    pub fn from_qname(name: &QName) -> Option<TagKind> {
        if name.namespace() != Some(XSD_NS) {
            return None;
        }

        let kind = match name.local() {
            "schema" => K::Schema,
            "import" => K::Import,
            "include" => K::Include,
            "redefine" => K::Redefine,
            "annotation" => K::Annotation,
            "documentation" => K::Documentation,
            "appinfo" => K::AppInfo,
            "element" => K::Element,
            "attribute" => K::Attribute,
            "complexType" => K::ComplexType,
            "simpleType" => K::SimpleType,
            "sequence" => K::Sequence,
            "choice" => K::Choice,
            "all" => K::All,
            "group" => K::Group,
            "attributeGroup" => K::AttributeGroup,
            "complexContent" => K::ComplexContent,
            "simpleContent" => K::SimpleContent,
            "extension" => K::Extension,
            "restriction" => K::Restriction,
            "enumeration" => K::Enumeration,
            "pattern" | "length" | "minLength" | "maxLength" | "minInclusive" | "maxInclusive"
            | "minExclusive" | "maxExclusive" | "totalDigits" | "fractionDigits" | "whiteSpace" => {
                K::Facet
            }
            "list" => K::List,
            "union" => K::Union,
            "any" => K::Any,
            "anyAttribute" => K::AnyAttribute,
            "unique" | "key" | "keyref" => K::IdentityConstraint,
            "selector" => K::Selector,
            "field" => K::Field,
            "notation" => K::Notation,
            _ => return None,
        };
        Some(kind)
    }

    /// Tag name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            K::Schema => "schema",
            K::Import => "import",
            K::Include => "include",
            K::Redefine => "redefine",
            K::Annotation => "annotation",
            K::Documentation => "documentation",
            K::AppInfo => "appinfo",
            K::Element => "element",
            K::Attribute => "attribute",
            K::ComplexType => "complexType",
            K::SimpleType => "simpleType",
            K::Sequence => "sequence",
            K::Choice => "choice",
            K::All => "all",
            K::Group => "group",
            K::AttributeGroup => "attributeGroup",
            K::ComplexContent => "complexContent",
            K::SimpleContent => "simpleContent",
            K::Extension => "extension",
            K::Restriction => "restriction",
            K::Enumeration => "enumeration",
            K::Facet => "facet",
            K::List => "list",
            K::Union => "union",
            K::Any => "any",
            K::AnyAttribute => "anyAttribute",
            K::IdentityConstraint => "identityConstraint",
            K::Selector => "selector",
            K::Field => "field",
            K::Notation => "notation",
            K::Builtin => "builtin",
        }
    }

    /// Child kinds this tag may contain
    pub fn allowed_children(self) -> &'static [TagKind] {
        match self {
            K::Schema => &[
                K::Import,
                K::Include,
                K::Redefine,
                K::Annotation,
                K::Element,
                K::Attribute,
                K::ComplexType,
                K::SimpleType,
                K::Group,
                K::AttributeGroup,
                K::Notation,
            ],
            K::Redefine => &[
                K::Annotation,
                K::ComplexType,
                K::SimpleType,
                K::Group,
                K::AttributeGroup,
            ],
            K::Annotation => &[K::Documentation, K::AppInfo],
            K::Element => &[
                K::Annotation,
                K::ComplexType,
                K::SimpleType,
                K::IdentityConstraint,
            ],
            K::Attribute | K::List | K::Union => &[K::Annotation, K::SimpleType],
            K::ComplexType => &[
                K::Annotation,
                K::SimpleContent,
                K::ComplexContent,
                K::Sequence,
                K::Choice,
                K::All,
                K::Group,
                K::Attribute,
                K::AttributeGroup,
                K::AnyAttribute,
            ],
            K::SimpleType => &[K::Annotation, K::Restriction, K::List, K::Union],
            K::Sequence | K::Choice => PARTICLE_CONTENT,
            K::All => &[K::Annotation, K::Element],
            K::Group => &[K::Annotation, K::Sequence, K::Choice, K::All],
            K::AttributeGroup => &[K::Annotation, K::Attribute, K::AttributeGroup, K::AnyAttribute],
            K::ComplexContent | K::SimpleContent => &[K::Annotation, K::Extension, K::Restriction],
            K::Extension => TYPE_BODY,
            K::Restriction => &[
                K::Annotation,
                K::SimpleType,
                K::Enumeration,
                K::Facet,
                K::Sequence,
                K::Choice,
                K::All,
                K::Group,
                K::Attribute,
                K::AttributeGroup,
                K::AnyAttribute,
            ],
            K::IdentityConstraint => &[K::Annotation, K::Selector, K::Field],
            K::Import
            | K::Include
            | K::Enumeration
            | K::Facet
            | K::Any
            | K::AnyAttribute
            | K::Selector
            | K::Field
            | K::Notation => ANNOTATED,
            K::Documentation | K::AppInfo | K::Builtin => &[],
        }
    }

    /// Whether `child` is permitted directly inside this tag
    pub fn may_contain(self, child: TagKind) -> bool {
        self.allowed_children().contains(&child)
    }

    /// Content is free-form markup that is skipped without diagnostics
    pub fn skips_content(self) -> bool {
        matches!(self, K::Documentation | K::AppInfo)
    }

    /// Hook implementations for this kind
    pub fn handler(self) -> &'static dyn Handler {
        match self {
            K::Schema => &schema::SchemaHandler,
            K::Import | K::Include | K::Redefine => &schema::ImportHandler,
            K::Documentation => &schema::DocumentationHandler,
            K::Element => &element::ElementHandler,
            K::Attribute => &element::AttributeHandler,
            K::ComplexType | K::SimpleType => &types::TypeHandler,
            K::ComplexContent | K::SimpleContent => &types::ContentHandler,
            K::Extension | K::Restriction => &types::DerivationHandler,
            K::Enumeration => &types::EnumerationHandler,
            K::List => &types::ListHandler,
            K::Union => &types::UnionHandler,
            K::Sequence | K::Choice | K::All => &particle::ParticleHandler,
            K::Group | K::AttributeGroup => &particle::GroupHandler,
            _ => &Passive,
        }
    }
}

/// Element declaration payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementData {
    /// Declared at schema level
    pub global: bool,
    pub type_name: Option<QName>,
    pub ref_name: Option<QName>,

    /// Resolved type, named or inline
    pub type_node: Option<NodeId>,

    /// Resolved global declaration for `ref`
    pub target: Option<NodeId>,
}

/// Attribute declaration payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeData {
    pub global: bool,
    pub type_name: Option<QName>,
    pub ref_name: Option<QName>,
    pub type_node: Option<NodeId>,
    pub target: Option<NodeId>,

    /// `use="prohibited"`; never registered in a scope
    pub prohibited: bool,
}

/// `extension` / `restriction` payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivationData {
    pub extension: bool,
    pub base: Option<QName>,
    pub base_node: Option<NodeId>,

    /// Values of nested `enumeration` facets in document order
    pub enumerations: Vec<String>,
}

/// Per-kind payload of a node
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NodeData {
    /// Not yet initialized
    #[default]
    Placeholder,
    /// Kinds without a payload
    Empty,
    Schema,
    Import {
        namespace: Option<String>,
        location: Option<String>,
    },
    Documentation(String),
    Element(ElementData),
    Attribute(AttributeData),
    ComplexType {
        mixed: bool,
        is_abstract: bool,
    },
    SimpleType,
    /// Effective occurrence range of a `sequence`, `choice` or `all`
    Particle(Multiplicity),
    /// Definition (no `ref_name`) or reference of a group / attribute group
    Group {
        ref_name: Option<QName>,
        target: Option<NodeId>,
    },
    Derivation(DerivationData),
    Enumeration(String),
    List {
        item_type: Option<QName>,
        item_node: Option<NodeId>,
    },
    Union {
        member_types: Vec<QName>,
        member_nodes: Vec<NodeId>,
    },
    Builtin(Primitive),
}

impl NodeData {
    /// Initial payload for a freshly opened tag
    pub fn for_kind(kind: TagKind) -> Self {
        match kind {
            K::Schema => NodeData::Schema,
            K::Documentation => NodeData::Documentation(String::new()),
            K::Element => NodeData::Element(ElementData::default()),
            K::Attribute => NodeData::Attribute(AttributeData::default()),
            K::ComplexType => NodeData::ComplexType {
                mixed: false,
                is_abstract: false,
            },
            K::SimpleType => NodeData::SimpleType,
            K::Sequence | K::Choice | K::All => NodeData::Particle(Multiplicity::ONE),
            K::Group | K::AttributeGroup => NodeData::Group {
                ref_name: None,
                target: None,
            },
            K::Extension | K::Restriction => NodeData::Derivation(DerivationData {
                extension: kind == K::Extension,
                ..DerivationData::default()
            }),
            K::List => NodeData::List {
                item_type: None,
                item_node: None,
            },
            K::Union => NodeData::Union {
                member_types: Vec::new(),
                member_nodes: Vec::new(),
            },
            K::Builtin => NodeData::Placeholder,
            _ => NodeData::Empty,
        }
    }
}

/// Lifecycle hooks of one tag kind
pub trait Handler: Sync {
    /// Tag opened; attributes are available on the node
    fn open(&self, _state: &mut State<'_>) -> Result<()> {
        Ok(())
    }

    /// Non-whitespace character data directly inside the tag
    fn text(&self, _state: &mut State<'_>, _text: &str) -> Result<()> {
        Ok(())
    }

    /// Tag closed; all children are loaded
    fn close(&self, _state: &mut State<'_>) -> Result<()> {
        Ok(())
    }

    /// Bind references once the document closure is loaded
    fn resolve(&self, _state: &mut ResolveState<'_>) -> Result<()> {
        Ok(())
    }
}

/// Tags accepted and approximated away
struct Passive;

impl Handler for Passive {}

/// Parse-time view handed to the hooks of one node
pub struct State<'a> {
    pub ctx: &'a mut Context,
    pub node: NodeId,
    pub bindings: &'a mut NamespaceBindings,

    /// Request that produced the document being parsed
    pub request: &'a ImportRequest,

    /// Document being parsed, set once `schema` opens
    pub document: Option<DocumentId>,

    /// Occurrence range inherited from enclosing particles
    pub occurs: Multiplicity,

    /// Occurrence range passed on to children
    pub child_occurs: Multiplicity,

    /// Documents referenced by `import`, `include` and `redefine`
    pub requests: &'a mut Vec<ImportRequest>,
}

impl State<'_> {
    pub fn kind(&self) -> TagKind {
        self.ctx.node(self.node).kind
    }

    pub fn data_mut(&mut self) -> &mut NodeData {
        &mut self.ctx.node_mut(self.node).data
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.ctx.node(self.node).parent
    }

    pub fn parent_kind(&self) -> Option<TagKind> {
        self.parent().map(|id| self.ctx.node(id).kind)
    }

    /// Declared directly under `schema` or `redefine`
    pub fn is_global(&self) -> bool {
        matches!(self.parent_kind(), Some(K::Schema | K::Redefine))
    }

    /// Raw attribute value
    pub fn attr(&self, name: &str) -> Option<String> {
        self.ctx.node(self.node).attribute(name).map(str::to_string)
    }

    /// Attribute that must be present
    pub fn required_attr(&self, name: &str) -> Result<String> {
        self.attr(name)
            .ok_or_else(|| Error::invalid_attribute(name, "", self.location()))
    }

    /// Attribute holding a QName, resolved with the bindings in scope
    pub fn qname_attr(&self, name: &str) -> Result<Option<QName>> {
        self.attr(name).map(|raw| self.qname(&raw)).transpose()
    }

    /// Resolve a prefixed name with the bindings in scope
    pub fn qname(&self, raw: &str) -> Result<QName> {
        self.bindings
            .resolve(raw)
            .map_err(|err| Error::unbound_prefix(err, self.location()))
    }

    /// `minOccurs` / `maxOccurs` of the tag, both defaulting to 1
    pub fn occurs_attrs(&self) -> Result<Multiplicity> {
        let min = match self.attr("minOccurs") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| Error::invalid_attribute("minOccurs", raw.as_str(), self.location()))?,
            None => 1,
        };
        let max = match self.attr("maxOccurs") {
            Some(raw) => Occurs::parse(&raw)
                .ok_or_else(|| Error::invalid_attribute("maxOccurs", raw.as_str(), self.location()))?,
            None => Occurs::Bounded(1),
        };
        Ok(Multiplicity::new(min, max))
    }

    pub fn location(&self) -> SourceInfo {
        let node = self.ctx.node(self.node);
        SourceInfo::new(self.request.url.clone(), node.position).with_context(node.kind.name())
    }

    /// URI of the namespace the node is declared in
    pub fn target_namespace(&self) -> String {
        self.ctx.target_namespace(self.node).to_string()
    }

    pub fn document_info(&self) -> Option<&DocumentInfo> {
        self.document.map(|id| self.ctx.document(id))
    }

    /// Register the node in its enclosing scope
    pub fn define(&mut self, name: Option<QName>, kind: EntryKind, occurs: Multiplicity) -> Result<()> {
        let scope = self.ctx.node(self.node).scope;
        if let (Some(name), Some(K::Redefine)) = (&name, self.parent_kind()) {
            self.ctx.redefine(name.clone(), kind, self.node, scope);
            return Ok(());
        }
        self.ctx
            .add_to_parent(name, kind, self.node, occurs.min, occurs.max, scope)
    }

    /// Open a scope for the node's content
    pub fn open_scope(&mut self) -> ScopeId {
        let parent = self.ctx.node(self.node).scope;
        let namespace = self.ctx.scope(parent).namespace;
        let scope = self.ctx.add_scope(Some(parent), namespace);
        self.ctx.node_mut(self.node).own_scope = Some(scope);
        scope
    }
}

/// Resolve-pass view of one node
pub struct ResolveState<'a> {
    pub ctx: &'a mut Context,
    pub node: NodeId,
}

impl ResolveState<'_> {
    pub fn data(&self) -> &NodeData {
        &self.ctx.node(self.node).data
    }

    pub fn data_mut(&mut self) -> &mut NodeData {
        &mut self.ctx.node_mut(self.node).data
    }

    /// Find a declaration visible from the node's scope
    pub fn resolve(&self, kind: EntryKind, name: &QName) -> Result<NodeId> {
        self.ctx.resolve_ref(self.node, kind, name)
    }

    /// Find a global declaration of the name's namespace
    pub fn resolve_global(&self, kind: EntryKind, name: &QName) -> Result<NodeId> {
        self.ctx
            .namespace_id(name.namespace().unwrap_or(""))
            .and_then(|ns| {
                let root = self.ctx.namespace(ns).root_scope;
                self.ctx.scope(root).get(kind, name).map(|d| d.node)
            })
            .ok_or_else(|| Error::unresolved(kind, name, self.ctx.location(self.node)))
    }

    /// Inline type declared in the node's own scope
    pub fn inline_type(&self) -> Option<NodeId> {
        let scope = self.ctx.node(self.node).own_scope?;
        self.ctx
            .scope(scope)
            .anonymous(EntryKind::Type)
            .next()
            .map(|d| d.node)
    }

    /// Direct children of one kind in document order
    pub fn children_of(&self, kind: TagKind) -> Vec<NodeId> {
        self.ctx
            .node(self.node)
            .children
            .iter()
            .copied()
            .filter(|child| self.ctx.node(*child).kind == kind)
            .collect()
    }

    /// A built-in type node
    pub fn builtin(&self, local: &str) -> Result<NodeId> {
        self.ctx.builtin(local).ok_or_else(|| {
            Error::unresolved(
                EntryKind::Type,
                &QName::new(Some(XSD_NS), local),
                self.ctx.location(self.node),
            )
        })
    }
}
