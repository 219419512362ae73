pub mod filesystem;

// Re-export common types
pub use filesystem::{FilesystemStorage, MirrorStorage};
