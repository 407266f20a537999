//! Qualified names and prefix bindings

use std::fmt;
use thiserror::Error;

/// XML Schema namespace
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// Namespace bound to the reserved `xml` prefix
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// A namespace-qualified name.
///
/// `full` is Clark notation (`{uri}local`, or `local` without a namespace)
/// and serves as a stable map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    namespace: Option<String>,
    local: String,
    full: String,
}

impl QName {
    /// Create a name; an empty namespace means no namespace
    pub fn new(namespace: Option<&str>, local: impl Into<String>) -> Self {
        let namespace = namespace.filter(|ns| !ns.is_empty()).map(str::to_string);
        let local = local.into();
        let full = match &namespace {
            Some(ns) => format!("{{{ns}}}{local}"),
            None => local.clone(),
        };
        Self {
            namespace,
            local,
            full,
        }
    }

    /// Parse Clark notation
    pub fn from_clark(full: &str) -> Self {
        match full.strip_prefix('{').and_then(|rest| rest.split_once('}')) {
            Some((ns, local)) => Self::new(Some(ns), local),
            None => Self::new(None, full),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    /// Namespace-qualified key
    pub fn full(&self) -> &str {
        &self.full
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

/// A prefix with no binding in scope
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unbound namespace prefix '{prefix}' in '{name}'")]
pub struct UnboundPrefix {
    pub prefix: String,
    pub name: String,
}

/// Stack of `xmlns` declarations, one frame per open tag
#[derive(Debug, Clone)]
pub struct NamespaceBindings {
    frames: Vec<Vec<(String, String)>>,
}

impl NamespaceBindings {
    /// Bindings with only the reserved `xml` prefix
    pub fn new() -> Self {
        Self {
            frames: vec![vec![("xml".to_string(), XML_NS.to_string())]],
        }
    }

    /// Open a frame for a new tag
    pub fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Drop the bindings of a closed tag
    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Bind a prefix in the current frame; `""` is the default namespace
    pub fn bind(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push((prefix.into(), uri.into()));
        }
    }

    /// Current binding of a prefix
    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Resolve `prefix:local` or `local`; unprefixed names take the default namespace
    pub fn resolve(&self, raw: &str) -> Result<QName, UnboundPrefix> {
        let raw = raw.trim();
        match raw.split_once(':') {
            Some((prefix, local)) if !prefix.is_empty() => match self.lookup(prefix) {
                Some(uri) if !uri.is_empty() => Ok(QName::new(Some(uri), local)),
                _ => Err(UnboundPrefix {
                    prefix: prefix.to_string(),
                    name: raw.to_string(),
                }),
            },
            _ => Ok(QName::new(self.lookup(""), raw)),
        }
    }

    /// Render a name with a prefix that is currently bound to its namespace
    pub fn prefixed(&self, name: &QName) -> Option<String> {
        let default = self.lookup("").filter(|uri| !uri.is_empty());
        match name.namespace() {
            None => default.is_none().then(|| name.local().to_string()),
            Some(ns) if default == Some(ns) => Some(name.local().to_string()),
            Some(ns) => self
                .frames
                .iter()
                .rev()
                .flat_map(|frame| frame.iter().rev())
                .map(|(prefix, _)| prefix.as_str())
                .find(|prefix| !prefix.is_empty() && self.lookup(prefix) == Some(ns))
                .map(|prefix| format!("{prefix}:{}", name.local())),
        }
    }
}

impl Default for NamespaceBindings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> NamespaceBindings {
        let mut b = NamespaceBindings::new();
        b.push_frame();
        b.bind("xs", XSD_NS);
        b.bind("tns", "urn:person");
        b
    }

    #[test]
    fn test_qname_full_and_equality() {
        let a = QName::new(Some("urn:a"), "Item");
        let b = QName::from_clark("{urn:a}Item");
        assert_eq!(a, b);
        assert_eq!(a.full(), "{urn:a}Item");
        assert_eq!(QName::new(Some(""), "x"), QName::new(None, "x"));
        assert_ne!(a, QName::new(Some("urn:b"), "Item"));
    }

    #[test]
    fn test_resolve_prefixed() {
        let b = bindings();
        let name = b.resolve("xs:string").unwrap();
        assert_eq!(name.namespace(), Some(XSD_NS));
        assert_eq!(name.local(), "string");
    }

    #[test]
    fn test_resolve_unprefixed_uses_default() {
        let mut b = bindings();
        assert_eq!(b.resolve("Person").unwrap().namespace(), None);

        b.push_frame();
        b.bind("", "urn:person");
        assert_eq!(b.resolve("Person").unwrap().namespace(), Some("urn:person"));

        b.pop_frame();
        assert_eq!(b.resolve("Person").unwrap().namespace(), None);
    }

    #[test]
    fn test_resolve_unbound_prefix() {
        let b = bindings();
        let err = b.resolve("foo:Bar").unwrap_err();
        assert_eq!(err.prefix, "foo");
        assert_eq!(err.name, "foo:Bar");
    }

    #[test]
    fn test_xml_prefix_always_bound() {
        let b = NamespaceBindings::new();
        assert_eq!(b.resolve("xml:lang").unwrap().namespace(), Some(XML_NS));
    }

    #[test]
    fn test_shadowed_prefix_not_used_for_rendering() {
        let mut b = bindings();
        b.push_frame();
        b.bind("tns", "urn:other");
        let name = QName::new(Some("urn:person"), "Person");
        assert_eq!(b.prefixed(&name), None);
        b.bind("p", "urn:person");
        assert_eq!(b.prefixed(&name).as_deref(), Some("p:Person"));
    }

    #[test]
    fn test_round_trip_for_expressible_names() {
        let mut b = bindings();
        b.push_frame();
        b.bind("", "urn:default");

        let names = [
            QName::new(Some(XSD_NS), "int"),
            QName::new(Some("urn:person"), "Person"),
            QName::new(Some("urn:default"), "Thing"),
            QName::new(Some(XML_NS), "lang"),
        ];

        for name in names {
            let rendered = b.prefixed(&name).expect("name should be expressible");
            assert_eq!(b.resolve(&rendered).unwrap(), name);
        }

        assert_eq!(b.prefixed(&QName::new(None, "bare")), None);
    }
}
