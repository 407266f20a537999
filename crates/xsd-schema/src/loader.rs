//! Two-phase schema loader.
//!
//! Phase one fetches the entry document and everything it transitively
//! imports or includes. Fetches run concurrently but documents are parsed in
//! request order, so node creation order does not depend on fetch latency.
//! Phase two runs the resolve hooks over every node created by the call, once
//! the work set is empty.

use crate::context::{Context, DocumentKind, LoadState, NamespaceId};
use crate::fetch::{FetchOptions, FetchedDocument, Fetcher};
use crate::node::NodeId;
use crate::parser;
use crate::tags::ResolveState;
use crate::{Error, Result};
use futures::future::BoxFuture;
use futures::stream::{FuturesOrdered, StreamExt};
use futures::FutureExt;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use xsd_ir::SourceInfo;

/// A document to fetch and parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub url: String,
    pub kind: DocumentKind,

    /// Imported namespace for imports; the includer's namespace for includes
    /// and redefines; the default namespace for the entry document
    pub namespace: Option<String>,

    /// Position of the `import`/`include`/`redefine` tag that asked for it
    pub origin: Option<SourceInfo>,
}

impl ImportRequest {
    /// Request for the document a load starts from
    pub fn entry(url: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            url: url.into(),
            kind: DocumentKind::Entry,
            namespace,
            origin: None,
        }
    }
}

type Pending = BoxFuture<'static, (ImportRequest, Result<FetchedDocument>)>;

/// Loads document closures into a [`Context`].
///
/// A failed `import` leaves the context partially populated; start over with
/// a fresh context.
pub struct Loader<'a> {
    ctx: &'a mut Context,
    fetcher: Arc<dyn Fetcher>,
    options: FetchOptions,
    default_namespace: Option<String>,
}

impl<'a> Loader<'a> {
    pub fn new(ctx: &'a mut Context, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            ctx,
            fetcher,
            options: FetchOptions::default(),
            default_namespace: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Namespace for an entry document without `targetNamespace`
    #[must_use]
    pub fn with_default_namespace(mut self, namespace: Option<String>) -> Self {
        self.default_namespace = namespace;
        self
    }

    pub fn context(&self) -> &Context {
        &*self.ctx
    }

    /// Load the closure of `url` and resolve it, returning the entry namespace
    pub async fn import(&mut self, url: &str) -> Result<NamespaceId> {
        if let Some(document) = self.ctx.document_by_url(url) {
            debug!("{} is already loaded", url);
            return Ok(document.namespace);
        }

        let first_node = self.ctx.node_count();
        let mut pending: FuturesOrdered<Pending> = FuturesOrdered::new();
        let mut queued = HashSet::new();
        let mut entry_namespace = None;
        let mut parsed_count = 0usize;

        let entry = ImportRequest::entry(url, self.default_namespace.clone());
        self.enqueue(entry, &mut pending, &mut queued);

        while let Some((request, fetched)) = pending.next().await {
            let document = match fetched {
                Ok(document) => document,
                Err(err) if self.is_redundant(&request) => {
                    warn!("Ignoring failed import of {}: {}", request.url, err);
                    continue;
                }
                Err(err) => return Err(err.with_origin(request.origin)),
            };

            let parsed = parser::parse(self.ctx, &request, &document.text)?;
            parsed_count += 1;
            trace!(
                "Parsed {} ({} further requests)",
                request.url,
                parsed.requests.len()
            );

            if request.kind == DocumentKind::Entry {
                entry_namespace = Some(parsed.namespace);
            }
            for child in parsed.requests {
                self.enqueue(child, &mut pending, &mut queued);
            }
        }

        info!("Loaded {} documents from {}", parsed_count, url);

        self.resolve(first_node)?;

        let loading: Vec<NamespaceId> = self
            .ctx
            .namespaces()
            .iter()
            .filter(|ns| ns.load_state == LoadState::Loading && !ns.documents.is_empty())
            .map(|ns| ns.id)
            .collect();
        for id in loading {
            self.ctx.namespace_mut(id).load_state = LoadState::Loaded;
        }

        entry_namespace.ok_or_else(|| Error::fetch(url, "entry document was not loaded"))
    }

    /// Queue a fetch unless the document or its namespace is already covered
    fn enqueue(
        &mut self,
        request: ImportRequest,
        pending: &mut FuturesOrdered<Pending>,
        queued: &mut HashSet<String>,
    ) {
        if queued.contains(&request.url) || self.ctx.document_by_url(&request.url).is_some() {
            trace!("Skipping {}: already requested", request.url);
            return;
        }

        if request.kind == DocumentKind::Import {
            let namespace = request.namespace.as_deref().unwrap_or("");
            if self.ctx.namespace_id(namespace).is_some() {
                debug!(
                    "Skipping {}: namespace '{}' is already registered",
                    request.url, namespace
                );
                return;
            }
            self.ctx.register(namespace);
        }

        queued.insert(request.url.clone());
        let fetcher = Arc::clone(&self.fetcher);
        let options = self.options.clone();
        debug!("Fetching {}", request.url);

        pending.push_back(
            async move {
                let result = fetcher.fetch(&request.url, &options).await;
                (request, result)
            }
            .boxed(),
        );
    }

    /// An import whose namespace already has a parsed document
    fn is_redundant(&self, request: &ImportRequest) -> bool {
        request.kind == DocumentKind::Import
            && request
                .namespace
                .as_deref()
                .and_then(|ns| self.ctx.namespace_id(ns))
                .is_some_and(|id| !self.ctx.namespace(id).documents.is_empty())
    }

    /// Run every pending resolve hook in creation order
    fn resolve(&mut self, first_node: usize) -> Result<()> {
        let count = self.ctx.node_count();
        debug!("Resolving {} nodes", count.saturating_sub(first_node));

        for idx in first_node..count {
            let id = NodeId(idx);
            let node = self.ctx.node(id);
            if node.resolved {
                continue;
            }
            let kind = node.kind;

            let mut state = ResolveState {
                ctx: &mut *self.ctx,
                node: id,
            };
            kind.handler().resolve(&mut state)?;
            self.ctx.node_mut(id).resolved = true;
        }
        Ok(())
    }
}
