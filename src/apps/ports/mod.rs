//! Ports for the external collaborators the brokers consult.

pub mod directory;
pub mod loader;
pub mod resolver;

pub use directory::{AppDirectory, AppDirectoryError, AppDirectoryResult};
pub use loader::{ModuleLoader, ModuleLoaderError, ModuleLoaderResult, StartRequest};
pub use resolver::{ResolverUi, ResolverUiError, ResolverUiResult};
