//! Archive extraction with leading path component stripping
//!
//! Every member lands inside the destination: paths, symlink targets and
//! hard link sources are checked after stripping, and nothing is written
//! through a symlink extracted earlier.

use crate::errors::{BinWrapError, BinWrapResult};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use zip::ZipArchive;

/// Payload formats the extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Tar,
    Zip,
    /// Not an archive: written as a single file
    Raw,
}

impl ArchiveKind {
    /// Detect the format from the URL file name, falling back to magic bytes
    pub fn detect(url: &str, data: &[u8]) -> Self {
        let name = file_name_from_url(url).to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            ArchiveKind::TarGz
        } else if name.ends_with(".tar") {
            ArchiveKind::Tar
        } else if name.ends_with(".zip") {
            ArchiveKind::Zip
        } else if data.starts_with(&[0x1f, 0x8b]) {
            ArchiveKind::TarGz
        } else if data.starts_with(b"PK\x03\x04") {
            ArchiveKind::Zip
        } else if data.len() > 262 && &data[257..262] == b"ustar" {
            ArchiveKind::Tar
        } else {
            ArchiveKind::Raw
        }
    }
}

/// Last path segment of a URL, ignoring query and fragment
pub fn file_name_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// Drop `strip` leading components from an archive member path.
///
/// Returns `None` when nothing is left. Members that would land outside the
/// destination are rejected.
pub fn strip_path(member: &Path, strip: usize) -> BinWrapResult<Option<PathBuf>> {
    let mut stripped = PathBuf::new();
    for component in member.components().skip(strip) {
        match component {
            Component::Normal(part) => stripped.push(part),
            Component::CurDir => {}
            _ => return Err(escapes(member)),
        }
    }
    Ok(if stripped.as_os_str().is_empty() {
        None
    } else {
        Some(stripped)
    })
}

fn escapes(member: &Path) -> BinWrapError {
    BinWrapError::filesystem(member, "archive entry escapes the destination directory")
}

/// Refuse to write `relative` through an already extracted symbolic link
fn ensure_no_symlink_parents(destination: &Path, relative: &Path) -> BinWrapResult<()> {
    let mut current = destination.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                return Err(BinWrapError::filesystem(
                    &current,
                    "archive entry would be written through a symbolic link",
                ))
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(BinWrapError::filesystem(&current, e)),
        }
    }
    Ok(())
}

/// A symlink target, resolved from the link's own directory, must stay
/// inside the destination
fn check_symlink_target(relative: &Path, target: &Path) -> BinWrapResult<()> {
    let mut depth = relative.components().count().saturating_sub(1);
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => depth -= 1,
            _ => return Err(escapes(relative)),
        }
    }
    Ok(())
}

/// Create the parents of `target` and clear a stale link in its place
fn prepare_target(destination: &Path, relative: &Path, target: &Path) -> BinWrapResult<()> {
    ensure_no_symlink_parents(destination, relative)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| BinWrapError::filesystem(parent, e))?;
    }
    if let Ok(metadata) = fs::symlink_metadata(target) {
        if metadata.file_type().is_symlink() {
            fs::remove_file(target).map_err(|e| BinWrapError::filesystem(target, e))?;
        }
    }
    Ok(())
}

/// Extract `data` into `destination`. Blocking; run it off the async runtime.
pub fn extract(
    kind: ArchiveKind,
    url: &str,
    data: &[u8],
    destination: &Path,
    strip: usize,
) -> BinWrapResult<()> {
    fs::create_dir_all(destination).map_err(|e| BinWrapError::filesystem(destination, e))?;

    match kind {
        ArchiveKind::TarGz => extract_tar(GzDecoder::new(Cursor::new(data)), destination, strip),
        ArchiveKind::Tar => extract_tar(Cursor::new(data), destination, strip),
        ArchiveKind::Zip => extract_zip(data, destination, strip),
        ArchiveKind::Raw => {
            let name = file_name_from_url(url);
            let name = if name.is_empty() { "download" } else { name };
            let target = destination.join(name);
            fs::write(&target, data).map_err(|e| BinWrapError::filesystem(&target, e))
        }
    }
}

fn extract_tar<R: Read>(reader: R, destination: &Path, strip: usize) -> BinWrapResult<()> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);

    let entries = archive
        .entries()
        .map_err(|e| BinWrapError::filesystem(destination, format!("Failed to read tar entries: {}", e)))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| {
            BinWrapError::filesystem(destination, format!("Failed to read tar entry: {}", e))
        })?;
        let member = entry
            .path()
            .map_err(|e| BinWrapError::filesystem(destination, format!("Failed to get entry path: {}", e)))?
            .into_owned();

        let Some(relative) = strip_path(&member, strip)? else {
            continue;
        };
        let target = destination.join(&relative);
        prepare_target(destination, &relative, &target)?;

        match entry.header().entry_type() {
            EntryType::Link => {
                let link = link_name(&entry, &member)?;
                let source = strip_path(&link, strip)?.ok_or_else(|| escapes(&link))?;
                ensure_no_symlink_parents(destination, &source)?;
                let source = destination.join(source);
                if target.exists() {
                    fs::remove_file(&target).map_err(|e| BinWrapError::filesystem(&target, e))?;
                }
                fs::hard_link(&source, &target).map_err(|e| {
                    BinWrapError::filesystem(&target, format!("Failed to link {}: {}", source.display(), e))
                })?;
                continue;
            }
            EntryType::Symlink => {
                check_symlink_target(&relative, &link_name(&entry, &member)?)?;
            }
            _ => {}
        }
        entry
            .unpack(&target)
            .map_err(|e| BinWrapError::filesystem(&target, format!("Failed to extract: {}", e)))?;
    }
    Ok(())
}

fn link_name<R: Read>(entry: &tar::Entry<'_, R>, member: &Path) -> BinWrapResult<PathBuf> {
    entry
        .link_name()
        .map_err(|e| BinWrapError::filesystem(member, format!("Failed to read link name: {}", e)))?
        .map(|link| link.into_owned())
        .ok_or_else(|| BinWrapError::filesystem(member, "link entry without a target"))
}

fn extract_zip(data: &[u8], destination: &Path, strip: usize) -> BinWrapResult<()> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| BinWrapError::filesystem(destination, format!("Failed to read zip archive: {}", e)))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| BinWrapError::filesystem(destination, format!("Failed to read zip entry: {}", e)))?;

        let member = file.enclosed_name().ok_or_else(|| {
            BinWrapError::filesystem(file.name(), "archive entry escapes the destination directory")
        })?;
        let Some(relative) = strip_path(&member, strip)? else {
            continue;
        };
        let target = destination.join(&relative);

        if file.is_dir() {
            ensure_no_symlink_parents(destination, &relative)?;
            fs::create_dir_all(&target).map_err(|e| BinWrapError::filesystem(&target, e))?;
            continue;
        }
        prepare_target(destination, &relative, &target)?;
        let mut outfile = File::create(&target).map_err(|e| BinWrapError::filesystem(&target, e))?;
        io::copy(&mut file, &mut outfile).map_err(|e| BinWrapError::filesystem(&target, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))
                    .map_err(|e| BinWrapError::filesystem(&target, e))?;
            }
        }
    }
    Ok(())
}
