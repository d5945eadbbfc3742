//! Installation system for platform-specific binaries
//!
//! This module selects the catalog entries matching the host, downloads and
//! extracts them, and verifies the resulting binary. Network retrieval,
//! archive extraction and process execution sit behind the traits in
//! [`traits`] so the orchestration can be exercised without them.

pub mod binary;
pub mod cache;
pub mod catalog;
pub mod fetcher;
pub mod platform;
pub mod progress;
pub mod traits;
pub mod verifier;
pub mod version;
pub mod wrapper;

// Re-exports for convenience
pub use binary::{ArchiveKind, HttpArchiveFetcher, ProcessProbe};
pub use cache::{BinaryCache, CacheStatus};
pub use catalog::{Catalog, SourceEntry};
pub use fetcher::Fetcher;
pub use progress::{ProgressBus, ProgressEvent, ProgressRecord, SubscriptionId};
pub use traits::*;
pub use verifier::Verifier;
pub use version::VersionRange;
pub use wrapper::{BinWrapper, BinWrapperBuilder, Configuration, DEFAULT_STRIP_COMPONENTS};
