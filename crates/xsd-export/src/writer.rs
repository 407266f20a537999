//! Output sinks for rendered modules

use crate::sanitize::{safe_identifier, unique_name};
use crate::typescript::EXTENSION;
use crate::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default name of the index file written by [`CacheWriter`]
pub const INDEX_NAME: &str = "_index.d.ts";

const TEMP_SUFFIX: &str = ".tmp";

/// Receives rendered files by virtual path
pub trait Writer {
    /// Store `contents` under a `/`-separated virtual path
    fn write(&mut self, path: &str, contents: &str) -> Result<()>;

    /// Called once after the last write
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects files in a sorted map
#[derive(Debug, Default, Clone)]
pub struct InMemoryWriter {
    files: BTreeMap<String, String>,
}

impl InMemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    pub fn into_files(self) -> BTreeMap<String, String> {
        self.files
    }
}

impl Writer for InMemoryWriter {
    fn write(&mut self, path: &str, contents: &str) -> Result<()> {
        self.files.insert(path.to_string(), contents.to_string());
        Ok(())
    }
}

/// Writes files below a root directory and finishes with an index file
/// re-exporting every module.
///
/// Files are staged until [`Writer::finish`], which writes each one to a
/// temporary sibling and renames them into place only once all of them were
/// written. A failed write leaves the cache directory as it was.
#[derive(Debug)]
pub struct CacheWriter {
    root: PathBuf,
    index_name: Option<String>,
    staged: BTreeMap<String, String>,
}

impl CacheWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_name: Some(INDEX_NAME.to_string()),
            staged: BTreeMap::new(),
        }
    }

    /// Change or disable (`None`) the index file
    #[must_use]
    pub fn with_index(mut self, index_name: Option<String>) -> Self {
        self.index_name = index_name;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target(&self, path: &str) -> Result<PathBuf> {
        let mut target = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(Error::write(path, "path escapes the output directory"));
            }
            target.push(segment);
        }
        Ok(target)
    }

    fn index(&self) -> String {
        let mut taken = HashSet::new();
        let mut out = String::new();
        for path in self.staged.keys() {
            let module = path.strip_suffix(EXTENSION).unwrap_or(path);
            let base = module.rsplit('/').next().unwrap_or(module);
            let alias = unique_name(&safe_identifier(base), &mut taken);
            out.push_str(&format!("export * as {alias} from \"./{module}\";\n"));
        }
        out
    }

    /// Write every file next to its target, recording (temporary, target) pairs in `done`
    fn write_temporaries(
        &self,
        files: &[(String, String)],
        done: &mut Vec<(PathBuf, PathBuf)>,
    ) -> Result<()> {
        for (path, contents) in files {
            let target = self.target(path)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|err| Error::write(path, err))?;
            }
            let mut temporary = target.clone().into_os_string();
            temporary.push(TEMP_SUFFIX);
            let temporary = PathBuf::from(temporary);

            fs::write(&temporary, contents).map_err(|err| Error::write(path, err))?;
            done.push((temporary, target));
        }
        Ok(())
    }
}

impl Writer for CacheWriter {
    fn write(&mut self, path: &str, contents: &str) -> Result<()> {
        self.target(path)?;
        self.staged.insert(path.to_string(), contents.to_string());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut files: Vec<(String, String)> = self
            .staged
            .iter()
            .map(|(path, contents)| (path.clone(), contents.clone()))
            .collect();
        if let Some(index_name) = &self.index_name {
            files.push((index_name.clone(), self.index()));
        }

        let mut temporaries = Vec::with_capacity(files.len());
        if let Err(err) = self.write_temporaries(&files, &mut temporaries) {
            for (temporary, _) in &temporaries {
                if let Err(cleanup) = fs::remove_file(temporary) {
                    warn!("Could not remove {}: {}", temporary.display(), cleanup);
                }
            }
            return Err(err);
        }

        for (temporary, target) in temporaries {
            fs::rename(&temporary, &target)
                .map_err(|err| Error::write(target.display().to_string(), err))?;
            debug!("Wrote {}", target.display());
        }

        info!("Wrote {} modules to {}", self.staged.len(), self.root.display());
        Ok(())
    }
}
