//! Default HTTP, extraction and process collaborators

pub mod extract;
pub mod http;
pub mod process;

// Re-exports
pub use extract::ArchiveKind;
pub use http::HttpArchiveFetcher;
pub use process::ProcessProbe;
