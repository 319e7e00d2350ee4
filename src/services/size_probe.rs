use camino::Utf8Path;
use std::fs;
use thiserror::Error;
use walkdir::WalkDir;

/// Errors raised while measuring files on disk
#[derive(Error, Debug)]
pub enum SizeProbeError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SizeProbeError {
    fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Total size in bytes of every regular file below `dir`.
///
/// A single unreadable entry aborts the whole measurement, and so does a
/// dangling symbolic link. Links to files count at the size of their target;
/// links to folders are not descended into.
pub fn total_size(dir: &Utf8Path) -> Result<u64, SizeProbeError> {
    let mut total: u64 = 0;
    let mut files: usize = 0;

    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| dir.to_string());
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
            SizeProbeError::io(path, source)
        })?;

        let file_type = entry.file_type();
        let len = if file_type.is_file() {
            entry
                .metadata()
                .map_err(|e| {
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("metadata unavailable"));
                    SizeProbeError::io(entry.path().display().to_string(), source)
                })?
                .len()
        } else if file_type.is_symlink() {
            // Linked files count at their target's size; linked folders are not descended
            let target = fs::metadata(entry.path())
                .map_err(|e| SizeProbeError::io(entry.path().display().to_string(), e))?;
            if !target.is_file() {
                continue;
            }
            target.len()
        } else {
            continue;
        };

        total = total.saturating_add(len);
        files += 1;
    }

    tracing::debug!("Measured {}: {} bytes in {} files", dir, total, files);
    Ok(total)
}

/// Size in bytes of a single file.
pub fn file_size(path: &Utf8Path) -> Result<u64, SizeProbeError> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| SizeProbeError::io(path.as_str(), e))
}
