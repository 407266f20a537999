//! Drives the tag state machine over the XML events of one document

use crate::context::{Context, DocumentId, NamespaceId};
use crate::loader::ImportRequest;
use crate::node::{Multiplicity, Node, NodeId};
use crate::qname::NamespaceBindings;
use crate::scope::ScopeId;
use crate::tags::{State, TagKind};
use crate::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{trace, warn};
use xsd_ir::{Position, SourceInfo};

/// Result of parsing one document
#[derive(Debug)]
pub struct ParsedDocument {
    pub document: DocumentId,
    pub namespace: NamespaceId,

    /// Documents referenced by `import`, `include` and `redefine`
    pub requests: Vec<ImportRequest>,
}

/// An open tag
#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeId,
    kind: TagKind,

    /// Scope children register in
    scope: ScopeId,

    /// Occurrence range children inherit
    occurs: Multiplicity,
}

/// Streaming parser feeding one document into a [`Context`]
pub struct DocumentParser<'a> {
    ctx: &'a mut Context,
    request: &'a ImportRequest,
    text: &'a str,
    bindings: NamespaceBindings,
    frames: Vec<Frame>,
    skip_depth: usize,
    document: Option<DocumentId>,
    requests: Vec<ImportRequest>,
}

impl<'a> DocumentParser<'a> {
    pub fn new(ctx: &'a mut Context, request: &'a ImportRequest, text: &'a str) -> Self {
        Self {
            ctx,
            request,
            text,
            bindings: NamespaceBindings::new(),
            frames: Vec::new(),
            skip_depth: 0,
            document: None,
            requests: Vec::new(),
        }
    }

    /// Run open, text and close hooks for every tag of the document
    pub fn parse(mut self) -> Result<ParsedDocument> {
        let mut reader = Reader::from_str(self.text);

        loop {
            let offset = offset_of(reader.buffer_position());
            match reader.read_event() {
                Ok(Event::Start(tag)) => self.start(&tag, offset)?,
                Ok(Event::Empty(tag)) => {
                    self.start(&tag, offset)?;
                    self.end()?;
                }
                Ok(Event::End(_)) => self.end()?,
                Ok(Event::Text(text)) => {
                    let text = text
                        .unescape()
                        .map_err(|err| Error::xml(self.source(offset), err.to_string()))?;
                    self.text(&text)?;
                }
                Ok(Event::CData(data)) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    self.text(&text)?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    let offset = offset_of(reader.error_position());
                    return Err(Error::xml(self.source(offset), err.to_string()));
                }
            }
        }

        if !self.frames.is_empty() {
            return Err(Error::xml(self.source(self.text.len()), "unexpected end of document"));
        }

        let document = self
            .document
            .ok_or_else(|| Error::xml(self.source(0), "document has no schema element"))?;
        let namespace = self.ctx.document(document).namespace;

        Ok(ParsedDocument {
            document,
            namespace,
            requests: self.requests,
        })
    }

    fn source(&self, offset: usize) -> SourceInfo {
        SourceInfo::new(
            self.request.url.clone(),
            Position::from_offset(self.text, offset),
        )
    }

    fn start(&mut self, tag: &BytesStart<'_>, offset: usize) -> Result<()> {
        let raw_name = std::str::from_utf8(tag.name().as_ref())
            .map_err(|err| Error::xml(self.source(offset), err.to_string()))?
            .to_string();

        let mut attributes = Vec::new();
        self.bindings.push_frame();
        for attr in tag.attributes() {
            let attr = attr.map_err(|err| Error::xml(self.source(offset), err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| Error::xml(self.source(offset), err.to_string()))?
                .into_owned();

            if key == "xmlns" {
                self.bindings.bind("", value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                self.bindings.bind(prefix, value);
            } else {
                attributes.push((key, value));
            }
        }

        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return Ok(());
        }

        let name = self
            .bindings
            .resolve(&raw_name)
            .map_err(|err| Error::unbound_prefix(err, self.source(offset)))?;
        let kind = TagKind::from_qname(&name);
        let parent = self.frames.last().copied();

        let kind = match (parent, kind) {
            (None, Some(TagKind::Schema)) => TagKind::Schema,
            (None, _) => {
                return Err(Error::xml(
                    self.source(offset),
                    format!("document root <{raw_name}> is not an XML Schema"),
                ));
            }
            (Some(frame), _) if frame.kind.skips_content() => {
                self.skip_depth = 1;
                return Ok(());
            }
            (Some(frame), Some(kind)) if frame.kind.may_contain(kind) => kind,
            (Some(frame), _) => {
                let diagnostic = Error::unexpected_tag(
                    raw_name,
                    frame.kind.name(),
                    self.source(offset).with_context(frame.kind.name()),
                );
                warn!("{}", diagnostic);
                self.ctx.diagnostics.push(diagnostic);
                self.skip_depth = 1;
                return Ok(());
            }
        };

        let scope = match parent {
            Some(frame) => frame.scope,
            None => self.ctx.namespace(self.ctx.primitive()).root_scope,
        };
        let occurs = parent.map_or(Multiplicity::ONE, |frame| frame.occurs);

        let mut node = Node::new(kind, scope, Position::from_offset(self.text, offset));
        node.parent = parent.map(|frame| frame.node);
        node.attributes = attributes;
        node.document = self.document;
        let id = self.ctx.add_node(node);
        if let Some(frame) = parent {
            self.ctx.node_mut(frame.node).children.push(id);
        }
        trace!("Opened <{}> as node #{}", kind.name(), id.0);

        let mut state = State {
            ctx: &mut *self.ctx,
            node: id,
            bindings: &mut self.bindings,
            request: self.request,
            document: self.document,
            occurs,
            child_occurs: occurs,
            requests: &mut self.requests,
        };
        kind.handler().open(&mut state)?;
        let child_occurs = state.child_occurs;
        self.document = state.document;

        let scope = self.ctx.node(id).own_scope.unwrap_or(scope);
        self.frames.push(Frame {
            node: id,
            kind,
            scope,
            occurs: child_occurs,
        });
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if self.skip_depth > 0 || text.trim().is_empty() {
            return Ok(());
        }
        let Some(frame) = self.frames.last().copied() else {
            return Ok(());
        };

        let mut state = self.state(frame);
        frame.kind.handler().text(&mut state, text)
    }

    fn end(&mut self) -> Result<()> {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            self.bindings.pop_frame();
            return Ok(());
        }

        let Some(frame) = self.frames.pop() else {
            return Ok(());
        };

        let mut state = self.state(frame);
        frame.kind.handler().close(&mut state)?;
        self.bindings.pop_frame();
        Ok(())
    }

    fn state(&mut self, frame: Frame) -> State<'_> {
        State {
            ctx: &mut *self.ctx,
            node: frame.node,
            bindings: &mut self.bindings,
            request: self.request,
            document: self.document,
            occurs: frame.occurs,
            child_occurs: frame.occurs,
            requests: &mut self.requests,
        }
    }
}

fn offset_of(position: impl TryInto<usize>) -> usize {
    position.try_into().unwrap_or(usize::MAX)
}

/// Parse one fetched document into the context
pub fn parse(ctx: &mut Context, request: &ImportRequest, text: &str) -> Result<ParsedDocument> {
    DocumentParser::new(ctx, request, text).parse()
}
