//! Declarations of the intermediate model

use crate::model::ModuleId;
use serde::{Deserialize, Serialize};

/// Handle of a type declaration inside a [`crate::SchemaModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub usize);

/// Built-in target types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    String,
    Number,
    Boolean,
    Date,
    Any,
}

impl Primitive {
    /// TypeScript spelling of the primitive
    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
            Primitive::Date => "Date",
            Primitive::Any => "any",
        }
    }
}

/// Reference to a type from a member, base, alias target or union variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeRef {
    /// Built-in type
    Primitive(Primitive),

    /// Named or anonymous declaration in some module
    Decl(TypeId),

    /// String literal (enumeration value)
    Literal(String),

    /// Sequence of the inner type
    Array(Box<TypeRef>),
}

impl TypeRef {
    /// Wrap in a sequence type
    #[must_use]
    pub fn array(inner: TypeRef) -> Self {
        TypeRef::Array(Box::new(inner))
    }

    /// Strip any sequence wrappers
    pub fn element(&self) -> &TypeRef {
        match self {
            TypeRef::Array(inner) => inner.element(),
            other => other,
        }
    }

    /// Whether this is a sequence type
    pub fn is_array(&self) -> bool {
        matches!(self, TypeRef::Array(_))
    }

    /// The declaration this reference points at, if any
    pub fn decl(&self) -> Option<TypeId> {
        match self.element() {
            TypeRef::Decl(id) => Some(*id),
            _ => None,
        }
    }
}

/// Shape of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclKind {
    /// Instantiable root type (document root)
    Class,
    /// Structured type with members
    Interface,
    /// Another name for a type
    Alias,
    /// One of several types or literals
    Union,
}

/// Origin of a member in the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    Element,
    Attribute,
    /// Text content of simple-content or mixed types
    Content,
}

/// A named member of a structured type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Target identifier (provisional until sanitized)
    pub name: String,

    /// Name in the schema
    pub xml_name: String,

    /// Element, attribute or text content
    pub kind: MemberKind,

    /// Type of the member, `Array` for repeated members
    pub type_ref: TypeRef,

    /// Member may be absent (`minOccurs="0"` or optional attribute)
    pub optional: bool,

    /// Documentation from the schema
    pub comment: Option<String>,
}

impl Member {
    /// Create a required member whose identifier is the schema name
    pub fn new(xml_name: impl Into<String>, kind: MemberKind, type_ref: TypeRef) -> Self {
        let xml_name = xml_name.into();
        Self {
            name: xml_name.clone(),
            xml_name,
            kind,
            type_ref,
            optional: false,
            comment: None,
        }
    }

    /// Mark as optional
    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Attach documentation
    #[must_use]
    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }
}

/// A type declaration owned by one module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    /// Owning module
    pub module: ModuleId,

    /// Target identifier; `None` for anonymous types rendered inline
    pub name: Option<String>,

    /// Name in the schema
    pub xml_name: Option<String>,

    pub kind: DeclKind,

    /// Base type for derived structured types
    pub base: Option<TypeRef>,

    /// Members of classes and interfaces, in schema order
    pub members: Vec<Member>,

    /// Alternatives of unions
    pub variants: Vec<TypeRef>,

    /// Target of aliases
    pub target: Option<TypeRef>,

    /// Documentation from the schema
    pub comment: Option<String>,
}

impl TypeDecl {
    /// Create an empty declaration
    pub fn new(module: ModuleId, name: Option<String>, kind: DeclKind) -> Self {
        Self {
            module,
            xml_name: name.clone(),
            name,
            kind,
            base: None,
            members: Vec::new(),
            variants: Vec::new(),
            target: None,
            comment: None,
        }
    }

    /// Whether the declaration is rendered inline
    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    /// Find a member by its schema name
    pub fn member(&self, xml_name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.xml_name == xml_name)
    }

    /// All type references held by this declaration
    pub fn type_refs(&self) -> impl Iterator<Item = &TypeRef> {
        self.base
            .iter()
            .chain(self.members.iter().map(|m| &m.type_ref))
            .chain(self.variants.iter())
            .chain(self.target.iter())
    }

    /// Literal values of a union of literals
    pub fn literals(&self) -> Vec<&str> {
        self.variants
            .iter()
            .filter_map(|v| match v {
                TypeRef::Literal(value) => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }
}
