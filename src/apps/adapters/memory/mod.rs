//! In-memory collaborator adapters.

mod directory;
mod loader;
mod resolver;

pub use directory::InMemoryAppDirectory;
pub use loader::InMemoryModuleLoader;
pub use resolver::InMemoryResolverUi;
