//! Identifier sanitization pass.
//!
//! Declaration names are made unique per module and member names per
//! declaration. Reserved words get a `_` suffix as declaration names only. Names are always derived from the schema name, so running
//! the pass again yields the same identifiers.

use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, trace};
use xsd_ir::{SchemaModel, TypeId};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier regex must compile")
});

/// TypeScript reserved and strict-mode words
const RESERVED: &[&str] = &[
    "any", "as", "boolean", "break", "case", "catch", "class", "const", "constructor",
    "continue", "debugger", "declare", "default", "delete", "do", "else", "enum", "export",
    "extends", "false", "finally", "for", "from", "function", "get", "if", "implements",
    "import", "in", "instanceof", "interface", "let", "module", "namespace", "new", "null",
    "number", "of", "package", "private", "protected", "public", "require", "return", "set",
    "static", "string", "super", "switch", "symbol", "this", "throw", "true", "try", "type",
    "typeof", "var", "void", "while", "with", "yield",
];

/// Whether `name` can be used as a declaration identifier as is
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name) && !RESERVED.contains(&name)
}

/// Turn an arbitrary schema name into a valid identifier
pub fn safe_identifier(raw: &str) -> String {
    if is_valid_identifier(raw) {
        return raw.to_string();
    }

    let mut name = strip_invalid(raw);
    if RESERVED.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

/// Turn an arbitrary schema name into a property name.
///
/// Reserved words are valid property names and are kept.
pub fn safe_property(raw: &str) -> String {
    if IDENTIFIER.is_match(raw) {
        return raw.to_string();
    }
    strip_invalid(raw)
}

fn strip_invalid(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$'))
        .collect();

    if name.is_empty() {
        name.push('_');
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Append the smallest free numeric suffix (`Item`, `Item2`, `Item3`, ...)
pub(crate) fn unique_name(base: &str, taken: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    let mut counter = 2;
    while taken.contains(&name) {
        name = format!("{base}{counter}");
        counter += 1;
    }
    taken.insert(name.clone());
    name
}

/// A declaration whose identifier changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub old: String,
    pub new: String,
}

/// Rewrites declaration and member identifiers of a model
#[derive(Debug, Default)]
pub struct Sanitize {
    /// Schema name to identifier, applied before the generic rules
    overrides: HashMap<String, String>,
    renames: BTreeMap<TypeId, Rename>,
}

impl Sanitize {
    pub fn new(overrides: HashMap<String, String>) -> Self {
        Self {
            overrides,
            renames: BTreeMap::new(),
        }
    }

    /// Sanitize every module of the model
    pub fn exec(&mut self, model: &mut SchemaModel) {
        let modules: Vec<_> = model.modules().iter().map(|m| m.id).collect();
        for module in modules {
            let mut taken = HashSet::new();
            let types = model.module(module).types.clone();

            for id in types {
                let decl = model.type_decl(id);
                let Some(current) = decl.name.clone() else {
                    continue;
                };
                let source = decl.xml_name.clone().unwrap_or_else(|| current.clone());
                let base = match self.overrides.get(&source) {
                    Some(custom) => safe_identifier(custom),
                    None => safe_identifier(&source),
                };
                let name = unique_name(&base, &mut taken);

                if name != current {
                    trace!("Renaming {} to {}", current, name);
                    self.renames
                        .entry(id)
                        .and_modify(|rename| rename.new.clone_from(&name))
                        .or_insert_with(|| Rename {
                            old: current,
                            new: name.clone(),
                        });
                    model.type_decl_mut(id).name = Some(name);
                }
            }
        }

        let ids: Vec<TypeId> = model.types().map(|(id, _)| id).collect();
        for id in ids {
            let mut taken = HashSet::new();
            for member in &mut model.type_decl_mut(id).members {
                member.name = unique_name(&safe_property(&member.xml_name), &mut taken);
            }
        }
    }

    /// The rename table collected by all `exec` runs
    pub fn finish(self) -> BTreeMap<TypeId, Rename> {
        debug!("Sanitize renamed {} declarations", self.renames.len());
        self.renames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xsd_ir::{DeclKind, Member, MemberKind, Primitive, TypeDecl, TypeRef};

    fn add(model: &mut SchemaModel, module: xsd_ir::ModuleId, name: &str) -> TypeId {
        model.add_type(TypeDecl::new(module, Some(name.to_string()), DeclKind::Interface))
    }

    #[test]
    fn test_safe_identifier() {
        assert_eq!(safe_identifier("Person"), "Person");
        assert_eq!(safe_identifier("first-name"), "firstname");
        assert_eq!(safe_identifier("3dModel"), "_3dModel");
        assert_eq!(safe_identifier("class"), "class_");
        assert_eq!(safe_identifier("string"), "string_");
        assert_eq!(safe_identifier("é"), "_");
        assert_eq!(safe_identifier("a.b"), "ab");
    }

    #[test]
    fn test_safe_property_keeps_reserved_words() {
        assert_eq!(safe_property("default"), "default");
        assert_eq!(safe_property("class"), "class");
        assert_eq!(safe_property("first-name"), "firstname");
        assert_eq!(safe_property("1st"), "_1st");
        assert_eq!(safe_property("-"), "_");
    }

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("_x1"));
        assert!(is_valid_identifier("$ref"));
        assert!(!is_valid_identifier("1x"));
        assert!(!is_valid_identifier("interface"));
        assert!(!is_valid_identifier("a-b"));
    }

    #[test]
    fn test_collisions_get_numeric_suffixes() {
        let mut model = SchemaModel::new();
        let module = model.add_module("urn:a", "a");
        let first = add(&mut model, module, "Item");
        let second = add(&mut model, module, "Item");
        let third = add(&mut model, module, "It-em");

        let mut sanitize = Sanitize::default();
        sanitize.exec(&mut model);

        assert_eq!(model.type_decl(first).name.as_deref(), Some("Item"));
        assert_eq!(model.type_decl(second).name.as_deref(), Some("Item2"));
        assert_eq!(model.type_decl(third).name.as_deref(), Some("Item3"));

        let renames = sanitize.finish();
        assert_eq!(renames.len(), 2);
        assert_eq!(
            renames[&second],
            Rename {
                old: "Item".to_string(),
                new: "Item2".to_string()
            }
        );
    }

    #[test]
    fn test_same_name_in_other_module_is_kept() {
        let mut model = SchemaModel::new();
        let a = model.add_module("urn:a", "a");
        let b = model.add_module("urn:b", "b");
        let in_a = add(&mut model, a, "Item");
        let in_b = add(&mut model, b, "Item");

        Sanitize::default().exec(&mut model);
        assert_eq!(model.type_decl(in_a).name, model.type_decl(in_b).name);
    }

    #[test]
    fn test_overrides_apply_first() {
        let mut model = SchemaModel::new();
        let module = model.add_module("urn:a", "a");
        let renamed = add(&mut model, module, "PurchaseOrderType");
        let plain = add(&mut model, module, "Order");

        let overrides = HashMap::from([("PurchaseOrderType".to_string(), "Order".to_string())]);
        let mut sanitize = Sanitize::new(overrides);
        sanitize.exec(&mut model);

        assert_eq!(model.type_decl(renamed).name.as_deref(), Some("Order"));
        assert_eq!(model.type_decl(plain).name.as_deref(), Some("Order2"));
    }

    #[test]
    fn test_members_are_unique_per_type() {
        let mut model = SchemaModel::new();
        let module = model.add_module("urn:a", "a");
        let mut decl = TypeDecl::new(module, Some("T".to_string()), DeclKind::Interface);
        let text = TypeRef::Primitive(Primitive::String);
        decl.members = vec![
            Member::new("id", MemberKind::Element, text.clone()),
            Member::new("id", MemberKind::Attribute, text.clone()),
            Member::new("default", MemberKind::Element, text.clone()),
            Member::new("class", MemberKind::Attribute, text),
        ];
        let id = model.add_type(decl);

        Sanitize::default().exec(&mut model);
        let names: Vec<&str> = model
            .type_decl(id)
            .members
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "id2", "default", "class"]);
    }

    #[test]
    fn test_exec_is_idempotent() {
        let mut model = SchemaModel::new();
        let module = model.add_module("urn:a", "a");
        for name in ["Item", "Item", "class", "9lives"] {
            add(&mut model, module, name);
        }

        let mut sanitize = Sanitize::default();
        sanitize.exec(&mut model);
        let once: Vec<Option<String>> = model.types().map(|(_, d)| d.name.clone()).collect();
        sanitize.exec(&mut model);
        let twice: Vec<Option<String>> = model.types().map(|(_, d)| d.name.clone()).collect();

        assert_eq!(once, twice);
        assert_eq!(sanitize.finish().len(), 3);
    }
}
