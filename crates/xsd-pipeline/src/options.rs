//! Compile options and configuration files

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use xsd_export::ExportOptions;
use xsd_schema::FetchOptions;

/// Options of one compile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CompileOptions {
    /// Permit plain paths and `file:` URLs
    pub allow_local: bool,

    /// Write into this directory instead of returning the files
    pub cache: Option<PathBuf>,

    /// Replace the host of remote schema URLs
    pub force_host: Option<String>,

    /// Replace the port of remote schema URLs (only together with `force_host`)
    pub force_port: Option<u16>,

    /// Namespace for an entry document without `targetNamespace`
    pub namespace: Option<String>,

    /// Name of the root class listing global elements
    pub document: String,

    /// Schema name to identifier overrides
    pub overrides: BTreeMap<String, String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            allow_local: true,
            cache: None,
            force_host: None,
            force_port: None,
            namespace: None,
            document: "document".to_string(),
            overrides: BTreeMap::new(),
        }
    }
}

impl CompileOptions {
    /// Read options from a JSON or YAML file (chosen by extension)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options: Self = parse_file(path)?;
        debug!("Loaded compile options from {}", path.display());
        Ok(options)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            allow_local_paths: self.allow_local,
            force_host: self.force_host.clone(),
            force_port: self.force_host.as_ref().and(self.force_port),
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            document: self.document.clone(),
        }
    }
}

/// Read a schema-name to identifier table from a JSON or YAML file
pub fn load_overrides(path: impl AsRef<Path>) -> Result<BTreeMap<String, String>> {
    parse_file(path.as_ref())
}

fn parse_file<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|err| Error::config(&display, err))?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "yaml" | "yml"));
    if is_yaml {
        serde_yaml::from_str(&text).map_err(|err| Error::config(&display, err))
    } else {
        serde_json::from_str(&text).map_err(|err| Error::config(&display, err))
    }
}
