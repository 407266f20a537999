//! Content-model particles and named groups

use super::{Handler, NodeData, ResolveState, State, TagKind};
use crate::node::Multiplicity;
use crate::qname::QName;
use crate::scope::EntryKind;
use crate::{Error, Result};

/// `sequence`, `choice` and `all`
pub(super) struct ParticleHandler;

impl Handler for ParticleHandler {
    fn open(&self, state: &mut State<'_>) -> Result<()> {
        let occurs = state.occurs.times(state.occurs_attrs()?);
        *state.data_mut() = NodeData::Particle(occurs);

        // Any single branch of a choice may be absent
        state.child_occurs = if state.kind() == TagKind::Choice {
            occurs.optional()
        } else {
            occurs
        };
        Ok(())
    }
}

/// `group` and `attributeGroup`, both definitions and references
pub(super) struct GroupHandler;

impl GroupHandler {
    fn kinds(kind: TagKind) -> (EntryKind, EntryKind) {
        if kind == TagKind::Group {
            (EntryKind::Group, EntryKind::GroupRef)
        } else {
            (EntryKind::AttributeGroup, EntryKind::AttributeGroupRef)
        }
    }
}

impl Handler for GroupHandler {
    fn open(&self, state: &mut State<'_>) -> Result<()> {
        let kind = state.kind();
        let (definition, reference) = Self::kinds(kind);

        if state.is_global() {
            let local = state.required_attr("name")?;
            let namespace = state.target_namespace();
            let name = QName::new(Some(namespace.as_str()), local);
            state.define(Some(name), definition, Multiplicity::ONE)?;
            state.open_scope();
            state.child_occurs = Multiplicity::ONE;
            return Ok(());
        }

        let ref_name = state
            .qname_attr("ref")?
            .ok_or_else(|| Error::invalid_attribute("ref", "", state.location()))?;
        let occurs = if kind == TagKind::Group {
            state.occurs.times(state.occurs_attrs()?)
        } else {
            Multiplicity::ONE
        };

        *state.data_mut() = NodeData::Group {
            ref_name: Some(ref_name),
            target: None,
        };
        state.define(None, reference, occurs)
    }

    fn resolve(&self, state: &mut ResolveState<'_>) -> Result<()> {
        let NodeData::Group {
            ref_name: Some(name),
            ..
        } = state.data()
        else {
            return Ok(());
        };
        let name = name.clone();

        let (definition, _) = Self::kinds(state.ctx.node(state.node).kind);
        let resolved = state.resolve_global(definition, &name)?;

        if let NodeData::Group { target, .. } = state.data_mut() {
            *target = Some(resolved);
        }
        Ok(())
    }
}
