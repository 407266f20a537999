//! `element` and `attribute` declarations

use super::{AttributeData, ElementData, Handler, NodeData, ResolveState, State};
use crate::node::{Multiplicity, Occurs};
use crate::qname::QName;
use crate::scope::EntryKind;
use crate::Result;
use tracing::debug;

/// Name a declaration is registered under.
///
/// References take the referenced name. Local names are namespace-qualified
/// only when the `form` attribute or the document default says so.
fn declared_name(state: &State<'_>, ref_name: Option<&QName>, global: bool, element: bool) -> Result<QName> {
    if let Some(name) = ref_name {
        return Ok(name.clone());
    }

    let local = state.required_attr("name")?;
    let qualified = global
        || match state.attr("form").as_deref() {
            Some(form) => form == "qualified",
            None => state.document_info().is_some_and(|doc| {
                if element {
                    doc.element_qualified
                } else {
                    doc.attribute_qualified
                }
            }),
        };

    let namespace = state.target_namespace();
    Ok(QName::new(qualified.then_some(namespace.as_str()), local))
}

pub(super) struct ElementHandler;

impl Handler for ElementHandler {
    fn open(&self, state: &mut State<'_>) -> Result<()> {
        let global = state.is_global();
        let ref_name = state.qname_attr("ref")?;
        let type_name = state.qname_attr("type")?;
        let name = declared_name(state, ref_name.as_ref(), global, true)?;

        let occurs = if global {
            Multiplicity::ONE
        } else {
            state.occurs.times(state.occurs_attrs()?)
        };

        *state.data_mut() = NodeData::Element(ElementData {
            global,
            type_name,
            ref_name,
            ..ElementData::default()
        });

        state.define(Some(name), EntryKind::Element, occurs)?;
        state.open_scope();
        state.child_occurs = Multiplicity::ONE;
        Ok(())
    }

    fn resolve(&self, state: &mut ResolveState<'_>) -> Result<()> {
        let NodeData::Element(data) = state.data() else {
            return Ok(());
        };
        let mut data = data.clone();

        if let Some(name) = &data.type_name {
            data.type_node = Some(state.resolve(EntryKind::Type, name)?);
        } else if let Some(inline) = state.inline_type() {
            data.type_node = Some(inline);
        } else if let Some(name) = &data.ref_name {
            data.target = Some(state.resolve_global(EntryKind::Element, name)?);
        } else {
            data.type_node = Some(state.builtin("anyType")?);
        }

        *state.data_mut() = NodeData::Element(data);
        Ok(())
    }
}

pub(super) struct AttributeHandler;

impl Handler for AttributeHandler {
    fn open(&self, state: &mut State<'_>) -> Result<()> {
        let global = state.is_global();
        let ref_name = state.qname_attr("ref")?;
        let type_name = state.qname_attr("type")?;
        let name = declared_name(state, ref_name.as_ref(), global, false)?;

        let usage = state.attr("use");
        let prohibited = usage.as_deref() == Some("prohibited");
        let occurs = match usage.as_deref() {
            Some("required") => Multiplicity::ONE,
            _ => Multiplicity::new(0, Occurs::Bounded(1)),
        };

        *state.data_mut() = NodeData::Attribute(AttributeData {
            global,
            type_name,
            ref_name,
            prohibited,
            ..AttributeData::default()
        });

        if prohibited {
            debug!("Skipping prohibited attribute '{}'", name);
            state.ctx.node_mut(state.node).name = Some(name);
        } else {
            state.define(Some(name), EntryKind::Attribute, occurs)?;
        }
        state.open_scope();
        Ok(())
    }

    fn resolve(&self, state: &mut ResolveState<'_>) -> Result<()> {
        let NodeData::Attribute(data) = state.data() else {
            return Ok(());
        };
        let mut data = data.clone();

        if let Some(name) = &data.type_name {
            data.type_node = Some(state.resolve(EntryKind::Type, name)?);
        } else if let Some(inline) = state.inline_type() {
            data.type_node = Some(inline);
        } else if let Some(name) = &data.ref_name {
            data.target = Some(state.resolve_global(EntryKind::Attribute, name)?);
        } else {
            data.type_node = Some(state.builtin("anySimpleType")?);
        }

        *state.data_mut() = NodeData::Attribute(data);
        Ok(())
    }
}
