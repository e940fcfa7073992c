use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, info, warn};
use zip::ZipArchive;

use crate::error::{Error, Result};

/// Relative path for an entry name, or `None` when writing it would land
/// outside the destination (absolute, drive-prefixed, `..`, NUL, empty).
pub fn enclosed_path(name: &str) -> Option<PathBuf> {
    if name.is_empty() || name.contains('\0') {
        return None;
    }
    let path = Path::new(name);
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(relative)
}

/// Unpack an in-memory zip into `dest`, in archive order.
///
/// Returns every entry name, including entries that were not written:
/// an existing path is left untouched, and names that would escape `dest`
/// are never written. A failure part-way leaves earlier entries on disk.
pub fn extract_archive(bytes: Vec<u8>, dest: &Path) -> Result<Vec<String>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    info!("Extracting {} entries into {:?}", archive.len(), dest);

    let mut names = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        names.push(name.clone());

        let Some(relative) = enclosed_path(&name) else {
            warn!("Skipping entry with unsafe path: {}", name);
            continue;
        };
        let target = dest.join(relative);

        if target.exists() {
            error!("Extracted file already exists: {:?}", target);
            continue;
        }

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| Error::io(&target, e))?;
        let written = io::copy(&mut entry, &mut out).map_err(|e| Error::io(&target, e))?;
        debug!(bytes = written, "Extracted {}", name);
    }

    info!("Extracting done");
    Ok(names)
}
