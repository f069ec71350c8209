//! Error taxonomy for package resolution and activation.

use std::path::PathBuf;

use thiserror::Error;

use crate::package::{Requirement, Version};

#[derive(Debug, Error)]
pub enum Error {
    /// A version, requirement or specification file is malformed
    #[error("parse error: {0}")]
    Parse(String),

    /// No installed version of the package exists on any root
    #[error("could not find package '{0}' in any repository root")]
    UnknownPackage(String),

    /// The package is installed, but no version satisfies the requirement
    #[error("could not find package '{name}' ({requirement}) in any repository root")]
    NoMatchingVersion { name: String, requirement: Requirement },

    /// The resolved package does not ship the requested file
    #[error("package '{name}' does not contain '{}'", .file.display())]
    FileNotFound { name: String, file: PathBuf },

    /// The package is already active at another version
    #[error("can't activate {name}-{requested}, already activated {name}-{active}")]
    VersionConflict {
        name: String,
        active: Version,
        requested: Version,
    },

    /// A guarded capability is not present in this process
    #[error("{0}")]
    CapabilityUnavailable(String),

    /// An auto-load file of an activated package failed to load
    #[error("failed to load '{}' for package '{name}'", .file.display())]
    LoadFailed {
        name: String,
        file: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Failure reported by the runtime while answering a direct request
    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
