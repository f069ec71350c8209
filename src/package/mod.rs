//! Package model
//!
//! Versions and requirements, installed package specifications, their
//! discovery on disk, and the registry that indexes them.

mod discovery;
mod registry;
mod spec;
mod version;

pub use discovery::{DEFAULT_SCOPE_DIR, SpecFile, find_spec_files};
pub use registry::Registry;
pub use spec::{GEMS_DIR, PackageSpec, SPEC_EXTENSION, SPECIFICATIONS_DIR};
pub use version::{Constraint, Op, Requirement, Version};
