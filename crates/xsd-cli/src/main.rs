//! # xsd-cli
//!
//! `xsdc`: compiles an XML Schema and everything it imports into TypeScript
//! declaration files.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use xsd_pipeline::{CompileOptions, compile, load_overrides};
use xsd_schema::{CachingFetcher, DefaultFetcher};

const DEFAULT_OUT: &str = "xmlns";

#[derive(Parser)]
#[command(name = "xsdc")]
#[command(about = "XML Schema to TypeScript declaration compiler")]
#[command(version)]
struct Cli {
    /// URL or path of the schema to compile
    url: String,

    /// Output directory for written files (implies --cache)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Write files and an index below the output directory (default `xmlns`) instead of printing them
    #[arg(long)]
    cache: bool,

    /// Refuse to read schemas from local paths
    #[arg(long)]
    no_local: bool,

    /// Fetch remote schemas from this host instead
    #[arg(long)]
    force_host: Option<String>,

    /// Fetch remote schemas from this port instead (with --force-host)
    #[arg(long)]
    force_port: Option<u16>,

    /// Namespace for a schema without targetNamespace
    #[arg(long)]
    namespace: Option<String>,

    /// Name of the root class listing global elements
    #[arg(long)]
    document: Option<String>,

    /// JSON or YAML file mapping schema names to identifiers
    #[arg(long = "override", value_name = "FILE")]
    overrides: Option<PathBuf>,

    /// JSON or YAML file with compile options
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Options from the config file with the flags applied on top
    fn options(&self) -> anyhow::Result<CompileOptions> {
        let mut options = match &self.config {
            Some(path) => CompileOptions::from_file(path)?,
            None => CompileOptions::default(),
        };

        if self.no_local {
            options.allow_local = false;
        }
        if self.cache || self.out.is_some() {
            let out = self
                .out
                .clone()
                .or_else(|| options.cache.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT));
            options.cache = Some(out);
        }
        if let Some(host) = &self.force_host {
            options.force_host = Some(host.clone());
        }
        if let Some(port) = self.force_port {
            options.force_port = Some(port);
        }
        if let Some(namespace) = &self.namespace {
            options.namespace = Some(namespace.clone());
        }
        if let Some(document) = &self.document {
            options.document.clone_from(document);
        }
        if let Some(path) = &self.overrides {
            options.overrides.extend(load_overrides(path)?);
        }
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = cli.options()?;
    let fetcher = Arc::new(CachingFetcher::new(DefaultFetcher::new()));

    let files = compile(&cli.url, &options, fetcher)
        .await
        .with_context(|| format!("Failed to compile {}", cli.url))?;

    match files {
        Some(files) => {
            for (path, text) in files {
                println!("// {path}");
                print!("{text}");
            }
        }
        None => {
            if let Some(dir) = &options.cache {
                tracing::info!("Declarations written to {}", dir.display());
            }
        }
    }
    Ok(())
}
