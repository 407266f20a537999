//! Visitor over the type references of a module

use crate::decl::{TypeId, TypeRef};
use crate::model::{ModuleId, SchemaModel};
use std::collections::HashSet;

/// Trait for walking declarations and the type references they hold
pub trait Traversal {
    /// Visit a reference held by `owner` (after stripping array wrappers)
    fn visit_type_ref(&mut self, owner: TypeId, type_ref: &TypeRef);

    /// Called when entering a declaration
    fn enter(&mut self, _id: TypeId) {}

    /// Called when leaving a declaration
    fn leave(&mut self, _id: TypeId) {}

    /// Returns true if traversal should continue
    fn should_continue(&self) -> bool {
        true
    }
}

/// Walk every named declaration of a module.
///
/// Anonymous declarations referenced from the module are walked as part of
/// the declaration that holds them; named declarations are not followed.
pub fn walk_module<T: Traversal>(model: &SchemaModel, module: ModuleId, visitor: &mut T) {
    let mut seen = HashSet::new();
    for id in &model.module(module).types {
        walk_recursive(model, *id, visitor, &mut seen);
    }
}

/// Walk a single declaration and the anonymous declarations nested in it
pub fn walk_type<T: Traversal>(model: &SchemaModel, id: TypeId, visitor: &mut T) {
    walk_recursive(model, id, visitor, &mut HashSet::new());
}

fn walk_recursive<T: Traversal>(
    model: &SchemaModel,
    id: TypeId,
    visitor: &mut T,
    seen: &mut HashSet<TypeId>,
) {
    if !visitor.should_continue() || !seen.insert(id) {
        return;
    }

    visitor.enter(id);

    let decl = model.type_decl(id);
    for type_ref in decl.type_refs() {
        let element = type_ref.element();
        visitor.visit_type_ref(id, element);

        if let TypeRef::Decl(target) = element {
            if model.type_decl(*target).is_anonymous() {
                walk_recursive(model, *target, visitor, seen);
            }
        }
    }

    visitor.leave(id);
}
