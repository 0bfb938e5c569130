// src/repository/mod.rs
//! Repository module for data access layer
//!
//! This module provides the data access layer abstraction. It includes the
//! trait definitions plus an in-memory and a JSON file implementation.

pub mod file;
pub mod memory;
pub mod traits;

// Re-export commonly used types and traits
pub use file::FileRepositoryManager;
pub use memory::MemoryRepositoryManager;
pub use traits::*;

/// Repository manager trait that provides access to all repositories
pub trait RepositoryManager: Send + Sync + 'static {
    type ProjectRepo: ProjectRepository;
    type DocumentRepo: DocumentRepository;
    type InsightRepo: InsightRepository;
    type ReviewRepo: ReviewRepository;

    /// Get project repository
    fn projects(&self) -> &Self::ProjectRepo;

    /// Get document repository
    fn documents(&self) -> &Self::DocumentRepo;

    /// Get insight record repository
    fn insights(&self) -> &Self::InsightRepo;

    /// Get review table repository
    fn reviews(&self) -> &Self::ReviewRepo;
}
