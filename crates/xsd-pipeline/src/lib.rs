#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # xsd-pipeline
//!
//! The `compile` entry point: load a schema closure, export it, finalize the
//! model and hand the rendered declaration files to a writer.
//!
//! Every compile builds a fresh [`xsd_schema::Context`]. All modules are
//! rendered before the first write, so a failing compile produces no output.

pub mod compile;
pub mod options;

pub use compile::{build_model, compile};
pub use options::{CompileOptions, load_overrides};

use thiserror::Error;

/// Errors that can occur while compiling
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to load '{url}': {source}")]
    Load {
        url: String,
        #[source]
        source: xsd_schema::Error,
    },

    #[error("Failed to {stage} '{url}': {source}")]
    Export {
        stage: &'static str,
        url: String,
        #[source]
        source: xsd_export::Error,
    },

    #[error("Invalid configuration in '{path}': {message}")]
    Config { path: String, message: String },
}

impl Error {
    /// Wrap a loader failure
    pub fn load(url: impl Into<String>, source: xsd_schema::Error) -> Self {
        Self::Load {
            url: url.into(),
            source,
        }
    }

    /// Wrap a failure of a stage after loading
    pub fn export(stage: &'static str, url: impl Into<String>, source: xsd_export::Error) -> Self {
        Self::Export {
            stage,
            url: url.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Config {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
