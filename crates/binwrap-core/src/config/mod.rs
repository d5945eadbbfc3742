//! Manifest configuration
//!
//! A manifest is a YAML file describing one binary: where it is installed,
//! which version it must report and where to download it for each
//! platform. It is the on-disk counterpart of
//! [`BinWrapperBuilder`](crate::installation::BinWrapperBuilder).

pub mod loader;
pub mod types;


pub use loader::ManifestLoader;
pub use types::Manifest;
