//! Conversion error types

use std::path::PathBuf;
use thiserror::Error;

use crate::mesh::MeshError;

/// Errors that abort a model conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The scene importer could not parse or post-process the source file
    #[error("failed to import {path:?}: {message}")]
    Import { path: PathBuf, message: String },

    /// A mesh bone references a node name that does not exist in the hierarchy
    #[error("bone '{name}' does not resolve to any node in the scene hierarchy")]
    UnresolvedBone { name: String },

    /// A mesh stream could not be populated
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

impl ConvertError {
    pub(crate) fn import(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Import {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
