//! Selection of catalog entries for the host platform

use crate::errors::{BinWrapError, BinWrapResult};
use crate::installation::catalog::{Catalog, SourceEntry};
use crate::installation::traits::Platform;

/// Whether `entry` may be installed on `platform`
pub fn matches(entry: &SourceEntry, platform: &Platform) -> bool {
    let os_matches = entry.os.as_deref().map_or(true, |os| os == platform.os);
    let arch_matches = entry.arch.as_deref().map_or(true, |arch| arch == platform.arch);
    os_matches && arch_matches
}

/// Select the entries matching `platform`, in catalog order.
///
/// Fails with `UnsupportedPlatform` when nothing matches.
pub fn select<'a>(catalog: &'a Catalog, platform: &Platform) -> BinWrapResult<Vec<&'a SourceEntry>> {
    let selected: Vec<&SourceEntry> = catalog
        .entries()
        .iter()
        .filter(|entry| matches(entry, platform))
        .collect();

    if selected.is_empty() {
        return Err(BinWrapError::UnsupportedPlatform {
            os: platform.os.clone(),
            arch: platform.arch.clone(),
        });
    }

    log::debug!(
        "{} of {} catalog entries match {}",
        selected.len(),
        catalog.len(),
        platform
    );
    Ok(selected)
}
