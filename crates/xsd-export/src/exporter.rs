//! Lowering of resolved namespaces into the type model.
//!
//! Every named global type of a namespace is reserved before any body is
//! lowered, so references between namespaces that import each other find
//! their target already allocated. Namespaces referenced from a body are
//! exported on demand.

use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};
use xsd_ir::{DeclKind, Member, MemberKind, ModuleId, Primitive, SchemaModel, TypeDecl, TypeId, TypeRef};
use xsd_schema::{
    Context, Declaration, EntryKind, Multiplicity, NamespaceId, NodeData, NodeId, TagKind,
};

/// Settings of the export pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Name of the root class listing the global elements of a namespace
    pub document: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            document: "document".to_string(),
        }
    }
}

/// The model under construction plus the bookkeeping that makes exports
/// idempotent
#[derive(Debug, Default)]
pub struct TargetModel {
    pub model: SchemaModel,
    types: HashMap<NodeId, TypeId>,
    modules: HashMap<NamespaceId, ModuleId>,
    exported: HashSet<NamespaceId>,
}

impl TargetModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a namespace has been exported
    pub fn is_exported(&self, namespace: NamespaceId) -> bool {
        self.exported.contains(&namespace)
    }

    /// Module allocated for a namespace
    pub fn module_of(&self, namespace: NamespaceId) -> Option<ModuleId> {
        self.modules.get(&namespace).copied()
    }

    /// Declaration lowered from a schema type node
    pub fn type_of(&self, node: NodeId) -> Option<TypeId> {
        self.types.get(&node).copied()
    }

    pub fn into_model(self) -> SchemaModel {
        self.model
    }
}

/// Export a namespace (and, on demand, every namespace it references)
pub fn export_namespace(
    ctx: &Context,
    namespace: NamespaceId,
    target: &mut TargetModel,
    options: &ExportOptions,
) -> Result<ModuleId> {
    Exporter {
        ctx,
        target,
        options,
    }
    .export(namespace)
}

/// Virtual module path for a namespace URI
pub fn module_path(uri: &str) -> String {
    let rest = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    let segments: Vec<String> = rest
        .split(['/', ':', '#'])
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map(|segment| {
            segment
                .strip_suffix(".xsd")
                .unwrap_or(segment)
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect()
        })
        .collect();

    if segments.is_empty() {
        "default".to_string()
    } else {
        segments.join("/")
    }
}

struct Exporter<'a> {
    ctx: &'a Context,
    target: &'a mut TargetModel,
    options: &'a ExportOptions,
}

impl Exporter<'_> {
    fn export(&mut self, namespace: NamespaceId) -> Result<ModuleId> {
        let ctx = self.ctx;
        let module = self.module_for(namespace);
        if !self.target.exported.insert(namespace) {
            trace!("Namespace '{}' already exported", ctx.namespace(namespace).uri);
            return Ok(module);
        }
        debug!("Exporting namespace '{}'", ctx.namespace(namespace).uri);

        let mut reserved = Vec::new();
        for decl in ctx.globals(namespace) {
            let node = ctx.node(decl.node);
            if decl.kind != EntryKind::Type
                || !matches!(node.kind, TagKind::ComplexType | TagKind::SimpleType)
            {
                continue;
            }
            let Some(name) = &decl.name else { continue };

            let mut type_decl =
                TypeDecl::new(module, Some(name.local().to_string()), DeclKind::Interface);
            type_decl.comment = node.comment.clone();
            let id = self.target.model.add_type(type_decl);
            self.target.types.insert(decl.node, id);
            reserved.push((decl.node, id));
        }
        trace!("Reserved {} types", reserved.len());

        for (node, id) in reserved {
            self.lower(node, id, module)?;
        }

        self.document_class(namespace, module)?;
        Ok(module)
    }

    fn module_for(&mut self, namespace: NamespaceId) -> ModuleId {
        if let Some(module) = self.target.modules.get(&namespace) {
            return *module;
        }
        let uri = &self.ctx.namespace(namespace).uri;
        let module = self.target.model.add_module(uri.clone(), module_path(uri));
        self.target.modules.insert(namespace, module);
        module
    }

    fn lower(&mut self, node: NodeId, id: TypeId, module: ModuleId) -> Result<()> {
        match self.ctx.node(node).kind {
            TagKind::ComplexType => self.lower_complex(node, id, module),
            TagKind::SimpleType => self.lower_simple(node, id, module),
            _ => Ok(()),
        }
    }

    fn lower_complex(&mut self, node: NodeId, id: TypeId, module: ModuleId) -> Result<()> {
        let ctx = self.ctx;
        let type_node = ctx.node(node);
        let mixed = matches!(type_node.data, NodeData::ComplexType { mixed: true, .. });
        let mut base = None;
        let mut members = Vec::new();

        if let Some((content, derivation)) = self.derivation_of(node) {
            if let NodeData::Derivation(data) = &ctx.node(derivation).data {
                // A redefinition's base resolves to the redefining type itself
                let base_node = data.base_node.filter(|base| *base != node);

                if ctx.node(content).kind == TagKind::SimpleContent {
                    match base_node {
                        Some(base_node) if ctx.node(base_node).kind == TagKind::ComplexType => {
                            base = Some(self.type_ref(base_node, module)?);
                        }
                        _ => {
                            let type_ref = if !data.enumerations.is_empty() {
                                self.literal_union(module, &data.enumerations)
                            } else {
                                match base_node {
                                    Some(base_node) => self.type_ref(base_node, module)?,
                                    None => TypeRef::Primitive(Primitive::String),
                                }
                            };
                            members.push(Member::new("content", MemberKind::Content, type_ref));
                        }
                    }
                } else if data.extension {
                    if let Some(base_node) = base_node.filter(|b| !self.is_any_type(*b)) {
                        base = Some(self.type_ref(base_node, module)?);
                    }
                }
            }
        }

        if let Some(scope) = type_node.own_scope {
            let mut stack = vec![node];
            self.collect_members(scope, Multiplicity::ONE, module, &mut stack, &mut members)?;
        }

        if mixed && !members.iter().any(|m| m.kind == MemberKind::Content) {
            members.push(
                Member::new("content", MemberKind::Content, TypeRef::Primitive(Primitive::String))
                    .optional(true),
            );
        }

        let decl = self.target.model.type_decl_mut(id);
        decl.kind = DeclKind::Interface;
        decl.base = base;
        decl.members = members;
        Ok(())
    }

    fn lower_simple(&mut self, node: NodeId, id: TypeId, module: ModuleId) -> Result<()> {
        let ctx = self.ctx;
        let body = ctx.node(node).children.iter().copied().find(|child| {
            matches!(
                ctx.node(*child).kind,
                TagKind::Restriction | TagKind::List | TagKind::Union
            )
        });

        let mut kind = DeclKind::Alias;
        let mut variants = Vec::new();
        let mut target = None;

        match body.map(|child| &ctx.node(child).data) {
            Some(NodeData::Derivation(data)) if !data.enumerations.is_empty() => {
                kind = DeclKind::Union;
                variants = data.enumerations.iter().cloned().map(TypeRef::Literal).collect();
            }
            Some(NodeData::Derivation(data)) => {
                target = Some(match data.base_node.filter(|base| *base != node) {
                    Some(base) => self.type_ref(base, module)?,
                    None => TypeRef::Primitive(Primitive::Any),
                });
            }
            Some(NodeData::List { item_node, .. }) => {
                let item = match item_node {
                    Some(item) => self.type_ref(*item, module)?,
                    None => TypeRef::Primitive(Primitive::String),
                };
                target = Some(TypeRef::array(item));
            }
            Some(NodeData::Union { member_nodes, .. }) if !member_nodes.is_empty() => {
                kind = DeclKind::Union;
                variants = member_nodes
                    .iter()
                    .map(|member| self.type_ref(*member, module))
                    .collect::<Result<Vec<_>>>()?;
            }
            _ => target = Some(TypeRef::Primitive(Primitive::Any)),
        }

        let decl = self.target.model.type_decl_mut(id);
        decl.kind = kind;
        decl.variants = variants;
        decl.target = target;
        Ok(())
    }

    /// Global elements as members of the root class
    fn document_class(&mut self, namespace: NamespaceId, module: ModuleId) -> Result<()> {
        let ctx = self.ctx;
        let elements: Vec<&Declaration> = ctx
            .globals(namespace)
            .iter()
            .filter(|decl| decl.kind == EntryKind::Element)
            .collect();
        if elements.is_empty() {
            return Ok(());
        }

        let mut members = Vec::with_capacity(elements.len());
        for decl in elements {
            members.push(self.element_member(decl, Multiplicity::ONE, module)?);
        }

        let mut class = TypeDecl::new(module, Some(self.options.document.clone()), DeclKind::Class);
        class.members = members;
        self.target.model.add_type(class);
        Ok(())
    }

    /// Members of a scope, expanding group and attribute-group references
    fn collect_members(
        &mut self,
        scope: xsd_schema::ScopeId,
        factor: Multiplicity,
        module: ModuleId,
        stack: &mut Vec<NodeId>,
        out: &mut Vec<Member>,
    ) -> Result<()> {
        let ctx = self.ctx;
        for decl in ctx.scope(scope).members() {
            let occurs = Multiplicity::new(decl.min, decl.max).times(factor);
            match decl.kind {
                EntryKind::Element => {
                    let member = self.element_member(&decl, occurs, module)?;
                    push_member(out, member);
                }
                EntryKind::Attribute => {
                    let member = self.attribute_member(&decl, occurs, module)?;
                    push_member(out, member);
                }
                EntryKind::GroupRef | EntryKind::AttributeGroupRef => {
                    let NodeData::Group {
                        target: Some(group),
                        ..
                    } = &ctx.node(decl.node).data
                    else {
                        continue;
                    };
                    if stack.contains(group) {
                        warn!("Skipping recursive group reference at {}", ctx.location(decl.node));
                        continue;
                    }
                    let Some(group_scope) = ctx.node(*group).own_scope else {
                        continue;
                    };

                    stack.push(*group);
                    self.collect_members(group_scope, occurs, module, stack, out)?;
                    stack.pop();
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn element_member(
        &mut self,
        decl: &Declaration,
        occurs: Multiplicity,
        module: ModuleId,
    ) -> Result<Member> {
        let ctx = self.ctx;
        let node = ctx.node(decl.node);
        let (type_node, comment) = match &node.data {
            NodeData::Element(data) => match data.target {
                Some(global) => (
                    element_type(ctx, global),
                    node.comment.clone().or_else(|| ctx.node(global).comment.clone()),
                ),
                None => (data.type_node, node.comment.clone()),
            },
            _ => (None, node.comment.clone()),
        };

        let mut type_ref = match type_node {
            Some(type_node) => self.type_ref(type_node, module)?,
            None => TypeRef::Primitive(Primitive::Any),
        };
        if occurs.max.is_many() {
            type_ref = TypeRef::array(type_ref);
        }

        Ok(Member::new(local_name(decl), MemberKind::Element, type_ref)
            .optional(occurs.min == 0)
            .with_comment(comment))
    }

    fn attribute_member(
        &mut self,
        decl: &Declaration,
        occurs: Multiplicity,
        module: ModuleId,
    ) -> Result<Member> {
        let ctx = self.ctx;
        let node = ctx.node(decl.node);
        let (type_node, comment) = match &node.data {
            NodeData::Attribute(data) => match data.target {
                Some(global) => (
                    attribute_type(ctx, global),
                    node.comment.clone().or_else(|| ctx.node(global).comment.clone()),
                ),
                None => (data.type_node, node.comment.clone()),
            },
            _ => (None, node.comment.clone()),
        };

        let type_ref = match type_node {
            Some(type_node) => self.type_ref(type_node, module)?,
            None => TypeRef::Primitive(Primitive::String),
        };

        Ok(Member::new(local_name(decl), MemberKind::Attribute, type_ref)
            .optional(occurs.min == 0)
            .with_comment(comment))
    }

    /// Reference to a type node, lowering anonymous types in place
    fn type_ref(&mut self, node: NodeId, module: ModuleId) -> Result<TypeRef> {
        let ctx = self.ctx;
        let type_node = ctx.node(node);
        if let NodeData::Builtin(primitive) = &type_node.data {
            return Ok(TypeRef::Primitive(*primitive));
        }
        if let Some(id) = self.target.types.get(&node) {
            return Ok(TypeRef::Decl(*id));
        }

        if let Some(name) = &type_node.name {
            let namespace = ctx.scope(type_node.scope).namespace;
            self.export(namespace)?;
            return self
                .target
                .types
                .get(&node)
                .map(|id| TypeRef::Decl(*id))
                .ok_or_else(|| Error::unexported(name.full(), ctx.location(node)));
        }

        let id = self
            .target
            .model
            .add_type(TypeDecl::new(module, None, DeclKind::Interface));
        self.target.types.insert(node, id);
        self.lower(node, id, module)?;
        Ok(TypeRef::Decl(id))
    }

    fn literal_union(&mut self, module: ModuleId, values: &[String]) -> TypeRef {
        let mut decl = TypeDecl::new(module, None, DeclKind::Union);
        decl.variants = values.iter().cloned().map(TypeRef::Literal).collect();
        TypeRef::Decl(self.target.model.add_type(decl))
    }

    fn derivation_of(&self, node: NodeId) -> Option<(NodeId, NodeId)> {
        let ctx = self.ctx;
        ctx.node(node)
            .children
            .iter()
            .copied()
            .filter(|child| {
                matches!(
                    ctx.node(*child).kind,
                    TagKind::SimpleContent | TagKind::ComplexContent
                )
            })
            .find_map(|content| {
                ctx.node(content)
                    .children
                    .iter()
                    .copied()
                    .find(|child| {
                        matches!(ctx.node(*child).kind, TagKind::Extension | TagKind::Restriction)
                    })
                    .map(|derivation| (content, derivation))
            })
    }

    fn is_any_type(&self, node: NodeId) -> bool {
        matches!(self.ctx.node(node).data, NodeData::Builtin(Primitive::Any))
    }
}

fn local_name(decl: &Declaration) -> String {
    decl.name
        .as_ref()
        .map_or_else(String::new, |name| name.local().to_string())
}

fn element_type(ctx: &Context, element: NodeId) -> Option<NodeId> {
    match &ctx.node(element).data {
        NodeData::Element(data) => data.type_node,
        _ => None,
    }
}

fn attribute_type(ctx: &Context, attribute: NodeId) -> Option<NodeId> {
    match &ctx.node(attribute).data {
        NodeData::Attribute(data) => data.type_node,
        _ => None,
    }
}

/// Repeated element names from expanded groups fold into one array member
fn push_member(out: &mut Vec<Member>, member: Member) {
    match out
        .iter_mut()
        .find(|m| m.kind == member.kind && m.xml_name == member.xml_name)
    {
        Some(existing) => {
            if existing.kind == MemberKind::Element && !existing.type_ref.is_array() {
                existing.type_ref = TypeRef::array(existing.type_ref.clone());
            }
            existing.optional &= member.optional;
        }
        None => out.push(member),
    }
}
