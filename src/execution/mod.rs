//! Applying suggestions to the filesystem

pub mod applier;
pub mod backup;

pub use applier::RenameApplier;
pub use backup::BackupStore;
