//! Filesystem operations module.
//!
//! This module provides the low-level writes a backup performs:
//! - Creating destination directories if absent
//! - Copying files with metadata preservation

use std::fs;
use std::io;
use std::path::Path;

use crate::error::EngineError;

/// Create `path` and any missing ancestors. Existing directories are left
/// untouched.
///
/// # Returns
/// `true` if the directory had to be created, `false` if it already existed.
///
/// # Errors
/// Returns `DirectoryCreationFailed` if creation fails or `path` exists as a
/// non-directory.
pub fn create_dir_if_absent(path: &Path) -> Result<bool, EngineError> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(false),
        Ok(_) => Err(EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path).map_err(|e| EngineError::DirectoryCreationFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(true)
        }
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Copy a file from source to destination, preserving permissions and the
/// modification time.
///
/// The destination's parent directory must already exist.
///
/// # Returns
/// Number of bytes copied
///
/// An existing read-only destination is made writable before it is replaced.
///
/// # Errors
/// `ReadError` for failures on the source side, including a source that is
/// not a regular file. `WriteError` for the destination, including a
/// destination that is the source itself (same path, symlink or hard link).
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, EngineError> {
    // Only regular files are opened; a FIFO would block until a writer appears.
    let src_metadata = fs::metadata(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;
    if !src_metadata.is_file() {
        return Err(EngineError::ReadError {
            path: src.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        });
    }

    match fs::metadata(dst) {
        Ok(dst_metadata) => {
            if is_same_file(&src_metadata, &dst_metadata, src, dst) {
                return Err(EngineError::WriteError {
                    path: dst.to_path_buf(),
                    source: io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("destination is the same file as {}", src.display()),
                    ),
                });
            }
            make_writable(dst, dst_metadata.permissions())?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            })
        }
    }

    let mut src_file = fs::File::open(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            }
        } else {
            EngineError::ReadError {
                path: src.to_path_buf(),
                source: e,
            }
        }
    })?;
    drop(dst_file);

    fs::set_permissions(dst, src_metadata.permissions()).map_err(|e| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;

    if let Ok(mtime) = src_metadata.modified() {
        filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime)).map_err(
            |e| EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            },
        )?;
    }

    Ok(bytes_copied)
}

#[cfg(unix)]
fn is_same_file(a: &fs::Metadata, b: &fs::Metadata, _a_path: &Path, _b_path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn is_same_file(_a: &fs::Metadata, _b: &fs::Metadata, a_path: &Path, b_path: &Path) -> bool {
    match (fs::canonicalize(a_path), fs::canonicalize(b_path)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Give the owner write access so an existing read-only copy can be replaced.
/// The source's permissions are applied again once the copy is written.
fn make_writable(path: &Path, mut permissions: fs::Permissions) -> Result<(), EngineError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = permissions.mode();
        if mode & 0o200 != 0 {
            return Ok(());
        }
        permissions.set_mode(mode | 0o200);
    }
    #[cfg(not(unix))]
    {
        if !permissions.readonly() {
            return Ok(());
        }
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
    }

    fs::set_permissions(path, permissions).map_err(|e| EngineError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}
