//! TypeScript declaration emitter

use crate::{Error, Result};
use tracing::{debug, trace};
use xsd_ir::{DeclKind, Member, ModuleId, SchemaModel, TypeDecl, TypeRef};

/// Extension of emitted files
pub const EXTENSION: &str = ".d.ts";

/// Text of one emitted module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedModule {
    /// Virtual output path including the extension
    pub path: String,
    pub text: String,
}

/// Renders the modules of a finalized model as `.d.ts` files
pub struct TypeScript<'m> {
    model: &'m SchemaModel,
}

impl<'m> TypeScript<'m> {
    pub fn new(model: &'m SchemaModel) -> Self {
        Self { model }
    }

    /// Render every module that declares at least one type
    pub fn render_all(&self) -> Result<Vec<RenderedModule>> {
        let mut rendered = Vec::new();
        for info in self.model.modules() {
            if info.types.is_empty() {
                trace!("Skipping empty module {}", info.path);
                continue;
            }
            rendered.push(RenderedModule {
                path: format!("{}{EXTENSION}", info.path),
                text: self.render_module(info.id)?,
            });
        }
        debug!("Rendered {} modules", rendered.len());
        Ok(rendered)
    }

    /// Render one module: imports, then every named declaration in order
    pub fn render_module(&self, module: ModuleId) -> Result<String> {
        let info = self.model.get_module(module)?;
        let mut out = String::new();

        for import in &info.imports {
            out.push_str(&format!(
                "import * as {} from \"{}\";\n",
                import.alias,
                self.model.relative_path(module, import.module)
            ));
        }

        for (idx, id) in info.types.iter().enumerate() {
            if idx > 0 || !info.imports.is_empty() {
                out.push('\n');
            }
            let decl = self.model.get_type(*id)?;
            self.render_decl(module, decl, &mut out)?;
        }
        Ok(out)
    }

    fn render_decl(&self, module: ModuleId, decl: &TypeDecl, out: &mut String) -> Result<()> {
        let name = decl.name.as_deref().unwrap_or_default();
        push_comment(out, decl.comment.as_deref(), 0);

        match decl.kind {
            DeclKind::Interface | DeclKind::Class => {
                let keyword = if decl.kind == DeclKind::Class {
                    "class"
                } else {
                    "interface"
                };
                out.push_str(&format!("export {keyword} {name}"));
                if let Some(base) = &decl.base {
                    out.push_str(&format!(" extends {}", self.render_ref(module, base, 0)?));
                }
                out.push(' ');
                out.push_str(&self.render_members(module, &decl.members, 0)?);
                out.push('\n');
            }
            DeclKind::Alias | DeclKind::Union => {
                out.push_str(&format!(
                    "export type {name} = {};\n",
                    self.render_body(module, decl, 0)?
                ));
            }
        }
        Ok(())
    }

    /// Right-hand side of an alias or union, also used for inline types
    fn render_body(&self, module: ModuleId, decl: &TypeDecl, indent: usize) -> Result<String> {
        match decl.kind {
            DeclKind::Alias => match &decl.target {
                Some(target) => self.render_ref(module, target, indent),
                None => Ok("any".to_string()),
            },
            DeclKind::Union => {
                if decl.variants.is_empty() {
                    return Ok("never".to_string());
                }
                let variants = decl
                    .variants
                    .iter()
                    .map(|variant| self.render_ref(module, variant, indent))
                    .collect::<Result<Vec<_>>>()?;
                Ok(variants.join(" | "))
            }
            DeclKind::Interface | DeclKind::Class => {
                let members = self.render_members(module, &decl.members, indent)?;
                match &decl.base {
                    Some(base) => Ok(format!("{} & {members}", self.render_ref(module, base, indent)?)),
                    None => Ok(members),
                }
            }
        }
    }

    fn render_members(&self, module: ModuleId, members: &[Member], indent: usize) -> Result<String> {
        if members.is_empty() {
            return Ok("{}".to_string());
        }

        let pad = "\t".repeat(indent + 1);
        let mut out = String::from("{\n");
        for member in members {
            push_comment(&mut out, member.comment.as_deref(), indent + 1);
            out.push_str(&format!(
                "{pad}{}{}: {};\n",
                member.name,
                if member.optional { "?" } else { "" },
                self.render_ref(module, &member.type_ref, indent + 1)?
            ));
        }
        out.push_str(&"\t".repeat(indent));
        out.push('}');
        Ok(out)
    }

    fn render_ref(&self, module: ModuleId, type_ref: &TypeRef, indent: usize) -> Result<String> {
        match type_ref {
            TypeRef::Primitive(primitive) => Ok(primitive.keyword().to_string()),
            TypeRef::Literal(value) => Ok(serde_json::Value::String(value.clone()).to_string()),
            TypeRef::Array(inner) => {
                let element = self.render_ref(module, inner, indent)?;
                if self.is_simple(inner) {
                    Ok(format!("{element}[]"))
                } else {
                    Ok(format!("Array<{element}>"))
                }
            }
            TypeRef::Decl(id) => {
                let decl = self.model.get_type(*id)?;
                match &decl.name {
                    None => self.render_body(module, decl, indent),
                    Some(name) if decl.module == module => Ok(name.clone()),
                    Some(name) => {
                        let info = self.model.module(module);
                        let import = info
                            .imports
                            .iter()
                            .find(|import| import.module == decl.module)
                            .ok_or_else(|| {
                                Error::missing_import(&info.path, &self.model.module(decl.module).path)
                            })?;
                        Ok(format!("{}.{name}", import.alias))
                    }
                }
            }
        }
    }

    /// Whether `T[]` can be written without parentheses
    fn is_simple(&self, type_ref: &TypeRef) -> bool {
        match type_ref {
            TypeRef::Primitive(_) | TypeRef::Literal(_) => true,
            TypeRef::Array(inner) => self.is_simple(inner),
            TypeRef::Decl(id) => self
                .model
                .get_type(*id)
                .is_ok_and(|decl| !decl.is_anonymous()),
        }
    }
}

fn push_comment(out: &mut String, comment: Option<&str>, indent: usize) {
    let Some(text) = comment.filter(|text| !text.trim().is_empty()) else {
        return;
    };
    let pad = "\t".repeat(indent);
    let text = text.replace("*/", "*\\/");
    let lines: Vec<&str> = text.lines().collect();

    if let [line] = lines.as_slice() {
        out.push_str(&format!("{pad}/** {line} */\n"));
        return;
    }

    out.push_str(&format!("{pad}/**\n"));
    for line in lines {
        out.push_str(format!("{pad} * {line}").trim_end());
        out.push('\n');
    }
    out.push_str(&format!("{pad} */\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use xsd_ir::{Import, MemberKind, Primitive};

    fn string() -> TypeRef {
        TypeRef::Primitive(Primitive::String)
    }

    fn person_model() -> (SchemaModel, ModuleId) {
        let mut model = SchemaModel::new();
        let module = model.add_module("http://example.com/person", "example.com/person");

        let mut color = TypeDecl::new(module, Some("Color".into()), DeclKind::Union);
        color.variants = vec![
            TypeRef::Literal("red".into()),
            TypeRef::Literal("green".into()),
            TypeRef::Literal("blue".into()),
        ];
        let color = model.add_type(color);

        let mut person = TypeDecl::new(module, Some("Person".into()), DeclKind::Interface);
        person.comment = Some("A natural person.".into());
        person.members = vec![
            Member::new("name", MemberKind::Element, string()),
            Member::new("age", MemberKind::Element, TypeRef::Primitive(Primitive::Number))
                .optional(true),
            Member::new("nickname", MemberKind::Element, TypeRef::array(string())),
            Member::new("favourite", MemberKind::Element, TypeRef::Decl(color)).optional(true),
        ];
        let person = model.add_type(person);

        let mut document = TypeDecl::new(module, Some("document".into()), DeclKind::Class);
        document.members = vec![Member::new("person", MemberKind::Element, TypeRef::Decl(person))];
        model.add_type(document);

        (model, module)
    }

    #[test]
    fn test_render_person_module() {
        let (model, module) = person_model();
        let text = TypeScript::new(&model).render_module(module).unwrap();

        assert_eq!(
            text,
            "export type Color = \"red\" | \"green\" | \"blue\";\n\
             \n\
             /** A natural person. */\n\
             export interface Person {\n\
             \tname: string;\n\
             \tage?: number;\n\
             \tnickname: string[];\n\
             \tfavourite?: Color;\n\
             }\n\
             \n\
             export class document {\n\
             \tperson: Person;\n\
             }\n"
        );
    }

    #[test]
    fn test_render_cross_module_reference() {
        let mut model = SchemaModel::new();
        let main = model.add_module("urn:main", "urn/main");
        let common = model.add_module("urn:common", "urn/common");
        let code = model.add_type(TypeDecl::new(common, Some("Code".into()), DeclKind::Alias));

        let mut holder = TypeDecl::new(main, Some("Holder".into()), DeclKind::Interface);
        holder.base = Some(TypeRef::Decl(code));
        model.add_type(holder);

        let renderer = TypeScript::new(&model);
        assert!(matches!(
            renderer.render_module(main),
            Err(Error::MissingImport { .. })
        ));

        model.module_mut(main).imports.push(Import {
            module: common,
            alias: "common".into(),
        });
        let text = TypeScript::new(&model).render_module(main).unwrap();
        assert_eq!(
            text,
            "import * as common from \"./common\";\n\nexport interface Holder extends common.Code {}\n"
        );
    }

    #[test]
    fn test_render_inline_types() {
        let mut model = SchemaModel::new();
        let module = model.add_module("urn:a", "a");

        let mut line = TypeDecl::new(module, None, DeclKind::Interface);
        line.members = vec![Member::new("sku", MemberKind::Element, string())];
        let line = model.add_type(line);

        let mut state = TypeDecl::new(module, None, DeclKind::Union);
        state.variants = vec![TypeRef::Literal("open".into()), TypeRef::Literal("closed".into())];
        let state = model.add_type(state);

        let mut order = TypeDecl::new(module, Some("Order".into()), DeclKind::Interface);
        order.members = vec![
            Member::new("line", MemberKind::Element, TypeRef::array(TypeRef::Decl(line))),
            Member::new("state", MemberKind::Attribute, TypeRef::Decl(state)),
        ];
        model.add_type(order);

        let text = TypeScript::new(&model).render_module(module).unwrap();
        assert_eq!(
            text,
            "export interface Order {\n\
             \tline: Array<{\n\
             \t\tsku: string;\n\
             \t}>;\n\
             \tstate: \"open\" | \"closed\";\n\
             }\n"
        );
    }

    #[test]
    fn test_render_all_skips_empty_modules() {
        let (mut model, _) = person_model();
        model.add_module("urn:empty", "empty");

        let rendered = TypeScript::new(&model).render_all().unwrap();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].path, "example.com/person.d.ts");
    }

    #[test]
    fn test_comments_and_literal_escaping() {
        let mut out = String::new();
        push_comment(&mut out, Some("First line\nSecond */ line"), 1);
        assert_eq!(out, "\t/**\n\t * First line\n\t * Second *\\/ line\n\t */\n");

        let model = SchemaModel::new();
        let quoted = TypeScript::new(&model)
            .render_ref(ModuleId(0), &TypeRef::Literal("say \"hi\"".into()), 0)
            .unwrap();
        assert_eq!(quoted, "\"say \\\"hi\\\"\"");
    }
}
