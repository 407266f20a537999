//! Import injection pass

use crate::sanitize::{safe_identifier, unique_name};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, trace};
use xsd_ir::{Import, ModuleId, SchemaModel, Traversal, TypeId, TypeRef, walk_module};

/// Imports recorded by [`AddImports::exec`], per importing module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportsAdded {
    pub modules: BTreeMap<ModuleId, BTreeSet<ModuleId>>,
}

impl ImportsAdded {
    /// Total number of recorded imports
    pub fn len(&self) -> usize {
        self.modules.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects the modules referenced from one module
struct Dependencies<'m> {
    model: &'m SchemaModel,
    module: ModuleId,
    found: BTreeSet<ModuleId>,
}

impl Traversal for Dependencies<'_> {
    fn visit_type_ref(&mut self, _owner: TypeId, type_ref: &TypeRef) {
        if let TypeRef::Decl(id) = type_ref {
            let target = self.model.type_decl(*id).module;
            if target != self.module {
                self.found.insert(target);
            }
        }
    }
}

fn dependencies(model: &SchemaModel, module: ModuleId) -> BTreeSet<ModuleId> {
    let mut visitor = Dependencies {
        model,
        module,
        found: BTreeSet::new(),
    };
    walk_module(model, module, &mut visitor);
    visitor.found
}

/// Adds an import for every module a module references
#[derive(Debug, Default, Clone, Copy)]
pub struct AddImports;

impl AddImports {
    pub fn new() -> Self {
        Self
    }

    /// Record an import per (module, referenced module)
    pub fn exec(&self, model: &mut SchemaModel) -> ImportsAdded {
        let mut added = ImportsAdded::default();
        let modules: Vec<ModuleId> = model.modules().iter().map(|m| m.id).collect();

        for module in modules {
            for target in dependencies(model, module) {
                let info = model.module(module);
                if info.imports.iter().any(|import| import.module == target) {
                    continue;
                }
                let alias = model.module(target).alias.clone();
                trace!("{} imports {}", model.module(module).path, model.module(target).path);

                model.module_mut(module).imports.push(Import {
                    module: target,
                    alias,
                });
                added.modules.entry(module).or_default().insert(target);
            }
        }

        debug!("Added {} imports", added.len());
        added
    }

    /// Drop imports that are no longer referenced, order the rest by path and
    /// give them aliases distinct from each other and from local names
    pub fn finish(&self, model: &mut SchemaModel, added: &ImportsAdded) {
        let modules: Vec<ModuleId> = model.modules().iter().map(|m| m.id).collect();

        for module in modules {
            let used = dependencies(model, module);
            let mut imports = std::mem::take(&mut model.module_mut(module).imports);

            let before = imports.len();
            imports.retain(|import| used.contains(&import.module));
            if imports.len() < before {
                trace!(
                    "Dropped {} unused imports from {}",
                    before - imports.len(),
                    model.module(module).path
                );
            }
            imports.sort_by(|a, b| model.module(a.module).path.cmp(&model.module(b.module).path));

            let mut taken: HashSet<String> = model
                .module(module)
                .types
                .iter()
                .filter_map(|id| model.type_decl(*id).name.clone())
                .collect();
            for import in &mut imports {
                let base = safe_identifier(&model.module(import.module).alias);
                import.alias = unique_name(&base, &mut taken);
            }

            model.module_mut(module).imports = imports;
        }

        debug!("Finished imports ({} recorded by exec)", added.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xsd_ir::{DeclKind, Member, MemberKind, TypeDecl};

    fn referencing(model: &mut SchemaModel, from: ModuleId, name: &str, to: TypeId) -> TypeId {
        let mut decl = TypeDecl::new(from, Some(name.to_string()), DeclKind::Interface);
        decl.members
            .push(Member::new("field", MemberKind::Element, TypeRef::Decl(to)));
        model.add_type(decl)
    }

    #[test]
    fn test_exec_records_cross_module_references() {
        let mut model = SchemaModel::new();
        let main = model.add_module("urn:main", "main");
        let common = model.add_module("urn:common", "common");
        let code = model.add_type(TypeDecl::new(common, Some("Code".into()), DeclKind::Alias));
        let local = model.add_type(TypeDecl::new(main, Some("Local".into()), DeclKind::Alias));
        referencing(&mut model, main, "A", code);
        referencing(&mut model, main, "B", code);
        referencing(&mut model, main, "C", local);

        let added = AddImports::new().exec(&mut model);

        assert_eq!(added.len(), 1);
        assert_eq!(
            model.module(main).imports,
            vec![Import {
                module: common,
                alias: "common".to_string()
            }]
        );
        assert!(model.module(common).imports.is_empty());
    }

    #[test]
    fn test_finish_sorts_and_dedupes_aliases() {
        let mut model = SchemaModel::new();
        let main = model.add_module("urn:main", "main");
        let zeta = model.add_module("urn:z", "z/types");
        let alpha = model.add_module("urn:a", "a/types");
        let z_type = model.add_type(TypeDecl::new(zeta, Some("Z".into()), DeclKind::Alias));
        let a_type = model.add_type(TypeDecl::new(alpha, Some("A".into()), DeclKind::Alias));
        referencing(&mut model, main, "UsesZ", z_type);
        referencing(&mut model, main, "types", a_type);

        let imports = AddImports::new();
        let added = imports.exec(&mut model);
        imports.finish(&mut model, &added);

        let result: Vec<(ModuleId, &str)> = model
            .module(main)
            .imports
            .iter()
            .map(|i| (i.module, i.alias.as_str()))
            .collect();
        // `types` is taken by a local declaration
        assert_eq!(result, vec![(alpha, "types2"), (zeta, "types3")]);
    }

    #[test]
    fn test_finish_drops_unreferenced_imports() {
        let mut model = SchemaModel::new();
        let main = model.add_module("urn:main", "main");
        let other = model.add_module("urn:other", "other");
        let target = model.add_type(TypeDecl::new(other, Some("T".into()), DeclKind::Alias));
        let holder = referencing(&mut model, main, "Holder", target);

        let imports = AddImports::new();
        let added = imports.exec(&mut model);
        model.type_decl_mut(holder).members.clear();
        imports.finish(&mut model, &added);

        assert!(model.module(main).imports.is_empty());
    }
}
