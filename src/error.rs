//! Error types shared by the rule store, the hook transport and side-effect handlers.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to load a declarative rule document.
///
/// A missing file is not an error (it loads as an empty rule set); these
/// variants only cover files that exist but cannot be used.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("embedded default policy is invalid: {0}")]
    Embedded(#[source] toml::de::Error),
}

/// A hook payload that cannot be validated.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("no input received within {0} ms")]
    Timeout(u128),

    #[error("no input received")]
    Empty,

    #[error("failed to read input: {0}")]
    Read(#[from] std::io::Error),

    #[error("input is not a valid hook payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing or empty field: {0}")]
    MissingField(&'static str),

    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

/// Failure reported by a post-decision handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{handler}: {source}")]
    Io {
        handler: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}: no home directory")]
    NoHome(&'static str),

    #[error("{0}: panicked")]
    Panicked(String),
}
