//! Compile orchestration

use crate::options::CompileOptions;
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
use xsd_export::{
    AddImports, CacheWriter, InMemoryWriter, RenderedModule, Sanitize, TargetModel, TypeScript,
    Writer, export_namespace,
};
use xsd_ir::SchemaModel;
use xsd_schema::{Context, Fetcher, Loader, NamespaceId};

/// Compile the schema at `url` into TypeScript declaration files.
///
/// Returns the files by virtual path, or `None` when `options.cache` sends
/// them to disk instead.
pub async fn compile(
    url: &str,
    options: &CompileOptions,
    fetcher: Arc<dyn Fetcher>,
) -> Result<Option<BTreeMap<String, String>>> {
    info!("Compiling {}", url);

    let mut ctx = Context::new();
    let namespace = Loader::new(&mut ctx, fetcher)
        .with_options(options.fetch_options())
        .with_default_namespace(options.namespace.clone())
        .import(url)
        .await
        .map_err(|source| Error::load(url, source))?;

    for diagnostic in &ctx.diagnostics {
        warn!("{}", diagnostic);
    }

    let model = build_model(&ctx, namespace, options)
        .map_err(|source| Error::export("export", url, source))?;
    let modules = TypeScript::new(&model)
        .render_all()
        .map_err(|source| Error::export("render", url, source))?;

    match &options.cache {
        Some(dir) => {
            let mut writer = CacheWriter::new(dir);
            emit(&mut writer, &modules).map_err(|source| Error::export("write", url, source))?;
            Ok(None)
        }
        None => {
            let mut writer = InMemoryWriter::new();
            emit(&mut writer, &modules).map_err(|source| Error::export("write", url, source))?;
            Ok(Some(writer.into_files()))
        }
    }
}

/// Export a loaded namespace and run the import and sanitize passes
pub fn build_model(
    ctx: &Context,
    namespace: NamespaceId,
    options: &CompileOptions,
) -> xsd_export::Result<SchemaModel> {
    let mut target = TargetModel::new();
    export_namespace(ctx, namespace, &mut target, &options.export_options())?;
    let mut model = target.into_model();

    let imports = AddImports::new();
    let added = imports.exec(&mut model);

    let overrides: HashMap<String, String> = options
        .overrides
        .iter()
        .map(|(from, to)| (from.clone(), to.clone()))
        .collect();
    let mut sanitize = Sanitize::new(overrides);
    sanitize.exec(&mut model);
    for (id, rename) in sanitize.finish() {
        debug!("Type #{} renamed from {} to {}", id.0, rename.old, rename.new);
    }

    imports.finish(&mut model, &added);
    Ok(model)
}

fn emit(writer: &mut dyn Writer, modules: &[RenderedModule]) -> xsd_export::Result<()> {
    for module in modules {
        writer.write(&module.path, &module.text)?;
    }
    writer.finish()
}
