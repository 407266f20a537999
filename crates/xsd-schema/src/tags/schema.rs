//! Document-level tags: `schema`, `import`, `include`, `redefine`, `documentation`

use super::{Handler, NodeData, State, TagKind};
use crate::context::DocumentKind;
use crate::fetch::resolve_location;
use crate::loader::ImportRequest;
use crate::{Error, Result};
use tracing::{debug, warn};

pub(super) struct SchemaHandler;

impl Handler for SchemaHandler {
    fn open(&self, state: &mut State<'_>) -> Result<()> {
        let declared = state.attr("targetNamespace");
        let kind = state.request.kind;

        // Imported documents never adopt a namespace; included ones take the includer's
        let fallback = match kind {
            DocumentKind::Import => None,
            _ => state.request.namespace.clone(),
        };

        if let (Some(declared), Some(expected), DocumentKind::Include | DocumentKind::Redefine) =
            (&declared, &fallback, kind)
        {
            if declared != expected {
                warn!(
                    "{} declares namespace '{}' but is included into '{}'",
                    state.request.url, declared, expected
                );
            }
        }

        let uri = declared.clone().or(fallback).unwrap_or_default();

        // Chameleon documents resolve unprefixed references in the adopted namespace
        if declared.is_none()
            && !uri.is_empty()
            && state.bindings.lookup("").is_none_or(str::is_empty)
        {
            state.bindings.bind("", uri.as_str());
        }

        let namespace = state.ctx.register(&uri);
        let element_qualified = state.attr("elementFormDefault").as_deref() == Some("qualified");
        let attribute_qualified = state.attr("attributeFormDefault").as_deref() == Some("qualified");
        let document = state.ctx.add_document(
            &state.request.url,
            namespace,
            kind,
            element_qualified,
            attribute_qualified,
        );

        let root = state.ctx.namespace(namespace).root_scope;
        let node = state.ctx.node_mut(state.node);
        node.document = Some(document);
        node.scope = root;
        node.own_scope = Some(root);
        state.document = Some(document);

        debug!("Parsing {} into namespace '{}'", state.request.url, uri);
        Ok(())
    }
}

/// `import`, `include` and `redefine`
pub(super) struct ImportHandler;

impl Handler for ImportHandler {
    fn open(&self, state: &mut State<'_>) -> Result<()> {
        let kind = match state.kind() {
            TagKind::Import => DocumentKind::Import,
            TagKind::Include => DocumentKind::Include,
            _ => DocumentKind::Redefine,
        };
        let namespace = state.attr("namespace");
        let location = state.attr("schemaLocation");

        *state.data_mut() = NodeData::Import {
            namespace: namespace.clone(),
            location: location.clone(),
        };

        let Some(location) = location else {
            if kind != DocumentKind::Import {
                return Err(Error::invalid_attribute("schemaLocation", "", state.location()));
            }
            debug!(
                "Import of '{}' without schemaLocation",
                namespace.as_deref().unwrap_or("")
            );
            return Ok(());
        };

        let url = resolve_location(&state.request.url, &location);
        let namespace = match kind {
            DocumentKind::Import => Some(namespace.unwrap_or_default()),
            _ => Some(state.target_namespace()),
        };

        debug!("Queueing {:?} of {}", kind, url);
        state.requests.push(ImportRequest {
            url,
            kind,
            namespace,
            origin: Some(state.location()),
        });
        Ok(())
    }
}

/// Collects documentation text for the annotated node
pub(super) struct DocumentationHandler;

impl Handler for DocumentationHandler {
    fn text(&self, state: &mut State<'_>, text: &str) -> Result<()> {
        if let NodeData::Documentation(buffer) = state.data_mut() {
            buffer.push_str(text);
        }
        Ok(())
    }

    fn close(&self, state: &mut State<'_>) -> Result<()> {
        let NodeData::Documentation(buffer) = state.data_mut() else {
            return Ok(());
        };
        let text = buffer
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            return Ok(());
        }

        // documentation -> annotation -> annotated node
        let annotated = state
            .parent()
            .and_then(|annotation| state.ctx.node(annotation).parent);
        if let Some(target) = annotated {
            let node = state.ctx.node_mut(target);
            match &mut node.comment {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(&text);
                }
                None => node.comment = Some(text),
            }
        }
        Ok(())
    }
}
