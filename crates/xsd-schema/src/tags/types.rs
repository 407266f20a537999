//! Type definitions and their derivations

use super::{DerivationData, Handler, NodeData, ResolveState, State, TagKind};
use crate::node::Multiplicity;
use crate::qname::QName;
use crate::scope::EntryKind;
use crate::{Error, Result};

/// `complexType` and `simpleType`
pub(super) struct TypeHandler;

impl Handler for TypeHandler {
    fn open(&self, state: &mut State<'_>) -> Result<()> {
        if state.kind() == TagKind::ComplexType {
            let mixed = state.attr("mixed").as_deref() == Some("true");
            let is_abstract = state.attr("abstract").as_deref() == Some("true");
            *state.data_mut() = NodeData::ComplexType { mixed, is_abstract };
        }

        if state.is_global() {
            let local = state.required_attr("name")?;
            let namespace = state.target_namespace();
            let name = QName::new(Some(namespace.as_str()), local);
            state.define(Some(name), EntryKind::Type, Multiplicity::ONE)?;
        } else if matches!(state.parent_kind(), Some(TagKind::Element | TagKind::Attribute)) {
            state.define(None, EntryKind::Type, Multiplicity::ONE)?;
        }

        state.open_scope();
        state.child_occurs = Multiplicity::ONE;
        Ok(())
    }
}

/// `complexContent` and `simpleContent`
pub(super) struct ContentHandler;

impl Handler for ContentHandler {
    fn open(&self, state: &mut State<'_>) -> Result<()> {
        if state.kind() == TagKind::ComplexContent && state.attr("mixed").as_deref() == Some("true") {
            if let Some(parent) = state.parent() {
                if let NodeData::ComplexType { mixed, .. } = &mut state.ctx.node_mut(parent).data {
                    *mixed = true;
                }
            }
        }
        Ok(())
    }
}

/// `extension` and `restriction`
pub(super) struct DerivationHandler;

impl Handler for DerivationHandler {
    fn open(&self, state: &mut State<'_>) -> Result<()> {
        let base = state.qname_attr("base")?;
        let extension = state.kind() == TagKind::Extension;
        *state.data_mut() = NodeData::Derivation(DerivationData {
            extension,
            base,
            ..DerivationData::default()
        });
        Ok(())
    }

    fn resolve(&self, state: &mut ResolveState<'_>) -> Result<()> {
        let NodeData::Derivation(data) = state.data() else {
            return Ok(());
        };

        let base_node = match data.base.clone() {
            Some(base) => Some(state.resolve(EntryKind::Type, &base)?),
            None => state.children_of(TagKind::SimpleType).first().copied(),
        };

        if let NodeData::Derivation(data) = state.data_mut() {
            data.base_node = base_node;
        }
        Ok(())
    }
}

/// `enumeration` facet; the value is collected by the enclosing restriction
pub(super) struct EnumerationHandler;

impl Handler for EnumerationHandler {
    fn open(&self, state: &mut State<'_>) -> Result<()> {
        let value = state
            .attr("value")
            .ok_or_else(|| Error::invalid_attribute("value", "", state.location()))?;

        if let Some(parent) = state.parent() {
            if let NodeData::Derivation(data) = &mut state.ctx.node_mut(parent).data {
                data.enumerations.push(value.clone());
            }
        }

        *state.data_mut() = NodeData::Enumeration(value);
        Ok(())
    }
}

pub(super) struct ListHandler;

impl Handler for ListHandler {
    fn open(&self, state: &mut State<'_>) -> Result<()> {
        let item_type = state.qname_attr("itemType")?;
        *state.data_mut() = NodeData::List {
            item_type,
            item_node: None,
        };
        Ok(())
    }

    fn resolve(&self, state: &mut ResolveState<'_>) -> Result<()> {
        let NodeData::List { item_type, .. } = state.data() else {
            return Ok(());
        };

        let resolved = match item_type.clone() {
            Some(name) => state.resolve(EntryKind::Type, &name)?,
            None => match state.children_of(TagKind::SimpleType).first() {
                Some(inline) => *inline,
                None => state.builtin("anySimpleType")?,
            },
        };

        if let NodeData::List { item_node, .. } = state.data_mut() {
            *item_node = Some(resolved);
        }
        Ok(())
    }
}

pub(super) struct UnionHandler;

impl Handler for UnionHandler {
    fn open(&self, state: &mut State<'_>) -> Result<()> {
        let member_types = match state.attr("memberTypes") {
            Some(raw) => raw
                .split_whitespace()
                .map(|name| state.qname(name))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        *state.data_mut() = NodeData::Union {
            member_types,
            member_nodes: Vec::new(),
        };
        Ok(())
    }

    fn resolve(&self, state: &mut ResolveState<'_>) -> Result<()> {
        let NodeData::Union { member_types, .. } = state.data() else {
            return Ok(());
        };

        let member_types = member_types.clone();
        let mut resolved = member_types
            .iter()
            .map(|name| state.resolve(EntryKind::Type, name))
            .collect::<Result<Vec<_>>>()?;
        resolved.extend(state.children_of(TagKind::SimpleType));

        if let NodeData::Union { member_nodes, .. } = state.data_mut() {
            *member_nodes = resolved;
        }
        Ok(())
    }
}
