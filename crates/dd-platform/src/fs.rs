//! Directory creation

use crate::{PlatformError, PlatformResult};
use std::io::ErrorKind;
use std::path::Path;

/// Create a single directory
///
/// Succeeds if `path` already exists as a directory. A missing parent yields
/// [`PlatformError::FileNotFound`]; an existing non-directory at `path` or
/// any other failure yields [`PlatformError::FileIo`].
pub fn make_dir(path: impl AsRef<Path>) -> PlatformResult<()> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(PlatformError::InvalidParameter("directory path is empty"));
    }

    match std::fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(PlatformError::FileNotFound(path.to_path_buf()))
        }
        Err(source) => Err(PlatformError::FileIo {
            path: path.to_path_buf(),
            source,
        }),
    }
}
