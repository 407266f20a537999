//! Built-in simple types of the XML Schema namespace

use xsd_ir::Primitive;

/// Every built-in type name and the primitive it lowers to
pub const BUILTINS: &[(&str, Primitive)] = &[
    ("anyType", Primitive::Any),
    ("anySimpleType", Primitive::Any),
    // string family
    ("string", Primitive::String),
    ("normalizedString", Primitive::String),
    ("token", Primitive::String),
    ("language", Primitive::String),
    ("Name", Primitive::String),
    ("NCName", Primitive::String),
    ("NMTOKEN", Primitive::String),
    ("NMTOKENS", Primitive::String),
    ("ID", Primitive::String),
    ("IDREF", Primitive::String),
    ("IDREFS", Primitive::String),
    ("ENTITY", Primitive::String),
    ("ENTITIES", Primitive::String),
    ("QName", Primitive::String),
    ("NOTATION", Primitive::String),
    ("anyURI", Primitive::String),
    ("base64Binary", Primitive::String),
    ("hexBinary", Primitive::String),
    ("duration", Primitive::String),
    ("gYear", Primitive::String),
    ("gYearMonth", Primitive::String),
    ("gMonth", Primitive::String),
    ("gMonthDay", Primitive::String),
    ("gDay", Primitive::String),
    // numeric
    ("decimal", Primitive::Number),
    ("float", Primitive::Number),
    ("double", Primitive::Number),
    ("integer", Primitive::Number),
    ("nonPositiveInteger", Primitive::Number),
    ("negativeInteger", Primitive::Number),
    ("nonNegativeInteger", Primitive::Number),
    ("positiveInteger", Primitive::Number),
    ("long", Primitive::Number),
    ("int", Primitive::Number),
    ("short", Primitive::Number),
    ("byte", Primitive::Number),
    ("unsignedLong", Primitive::Number),
    ("unsignedInt", Primitive::Number),
    ("unsignedShort", Primitive::Number),
    ("unsignedByte", Primitive::Number),
    ("boolean", Primitive::Boolean),
    ("date", Primitive::Date),
    ("dateTime", Primitive::Date),
    ("time", Primitive::Date),
];

/// Attributes predeclared in the `xml` namespace
pub const XML_ATTRIBUTES: &[&str] = &["lang", "space", "base", "id"];

/// Primitive for a built-in type name
pub fn primitive(local: &str) -> Option<Primitive> {
    BUILTINS
        .iter()
        .find(|(name, _)| *name == local)
        .map(|(_, primitive)| *primitive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_lookup() {
        assert_eq!(primitive("string"), Some(Primitive::String));
        assert_eq!(primitive("int"), Some(Primitive::Number));
        assert_eq!(primitive("boolean"), Some(Primitive::Boolean));
        assert_eq!(primitive("dateTime"), Some(Primitive::Date));
        assert_eq!(primitive("anyType"), Some(Primitive::Any));
        assert_eq!(primitive("Person"), None);
    }

    #[test]
    fn test_builtin_names_unique() {
        let mut names: Vec<&str> = BUILTINS.iter().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), BUILTINS.len());
    }
}
