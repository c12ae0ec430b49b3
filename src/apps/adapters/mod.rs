//! Adapter implementations for the collaborator ports.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileAppDirectory;
pub use memory::{InMemoryAppDirectory, InMemoryModuleLoader, InMemoryResolverUi};
