pub mod config;
pub mod environment;
pub mod error;
pub mod package;
pub mod paths;
pub mod runtime;
pub mod searcher;

pub use config::Config;
pub use environment::{Environment, FeatureLoader, LogLoader};
pub use error::{Error, Result};
pub use package::{PackageSpec, Registry, Requirement, Version};
pub use paths::RepositoryPaths;
pub use searcher::Searcher;
