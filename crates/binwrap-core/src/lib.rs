//! Provisioning of platform-specific native binaries.
//!
//! A host application declares where its helper binary can be downloaded for
//! each operating system and architecture. This crate picks the sources that
//! match the running host, downloads and extracts them unless the binary is
//! already installed, and checks that the result runs and reports an
//! acceptable version.
//!
//! # Architecture Overview
//!
//! - **Catalog and platform selection**: tagged download sources and the
//!   filter choosing those for the host
//! - **Fetching**: concurrent download and extraction of every selected source
//! - **Verification**: probing the installed binary and its version
//! - **Progress**: a typed, multi-subscriber event bus per session
//! - **Configuration**: a validated builder and a YAML manifest loader
//!
//! ```no_run
//! use binwrap_core::BinWrapper;
//!
//! # async fn example() -> Result<(), binwrap_core::BinWrapError> {
//! let wrapper = BinWrapper::builder()
//!     .src("https://example.com/tool-linux-x64.tar.gz", Some("linux"), Some("x64"))
//!     .src("https://example.com/tool-darwin-arm64.tar.gz", Some("darwin"), Some("arm64"))
//!     .dest("vendor")
//!     .use_binary("bin/tool")
//!     .version("^1.2.0")
//!     .build()?;
//!
//! wrapper.run().await?;
//! println!("ready: {}", wrapper.path().display());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod installation;

pub use config::{Manifest, ManifestLoader};
pub use errors::{BinWrapError, BinWrapResult};
pub use installation::{
    BinWrapper, BinWrapperBuilder, Catalog, Configuration, Platform, ProgressBus, ProgressEvent,
    ProgressRecord, SourceEntry, VersionRange,
};
