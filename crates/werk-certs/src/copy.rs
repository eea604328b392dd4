//! Copying certificate material to its canonical location.

use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Mode of every certificate destination directory.
pub const CERT_DIR_MODE: u32 = 0o700;

const PEM_EXTENSION: &str = ".pem";

/// Create `dir` if needed and restrict it to its owner.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or its mode set.
pub async fn prepare_private_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::io(dir, e))?;
    tokio::fs::set_permissions(dir, Permissions::from_mode(CERT_DIR_MODE))
        .await
        .map_err(|e| Error::io(dir, e))
}

/// Copy every `*.pem` file in `source` into `dest`.
///
/// `dest` is created with owner-only permissions. Symlinks are followed so
/// the copies hold the current content, not links. Existing files are
/// overwritten and anything that is not a PEM file is skipped.
///
/// Returns the written paths in name order.
///
/// # Errors
///
/// Returns an error if a directory cannot be read or prepared, or a file
/// cannot be copied.
pub async fn copy_pem_files(dest: &Path, source: &Path) -> Result<Vec<PathBuf>> {
    prepare_private_dir(dest).await?;

    let mut entries = tokio::fs::read_dir(source)
        .await
        .map_err(|e| Error::io(source, e))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(source, e))? {
        paths.push(entry.path());
    }
    paths.sort();

    let mut written = Vec::new();
    for path in paths {
        let Some(name) = path.file_name() else {
            continue;
        };
        if !name.to_string_lossy().ends_with(PEM_EXTENSION) {
            debug!(path = %path.display(), "skipping non-PEM file");
            continue;
        }
        let resolved = tokio::fs::canonicalize(&path)
            .await
            .map_err(|e| Error::io(&path, e))?;
        debug!(path = %path.display(), resolved = %resolved.display(), "resolved certificate file");

        let content = tokio::fs::read(&resolved)
            .await
            .map_err(|e| Error::io(&resolved, e))?;
        let target = dest.join(name);
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| Error::io(&target, e))?;
        info!(path = %target.display(), "wrote certificate file");
        written.push(target);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn copies_pem_files_through_symlinks() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("archive");
        let live = dir.path().join("live");
        std::fs::create_dir_all(&archive).unwrap();
        std::fs::create_dir_all(&live).unwrap();
        std::fs::write(archive.join("cert1.pem"), "CERT").unwrap();
        std::fs::write(archive.join("privkey1.pem"), "KEY").unwrap();
        std::os::unix::fs::symlink(archive.join("cert1.pem"), live.join("cert.pem")).unwrap();
        std::os::unix::fs::symlink(archive.join("privkey1.pem"), live.join("privkey.pem")).unwrap();
        std::fs::write(live.join("README"), "not a cert").unwrap();

        let dest = dir.path().join("le_certs/rasenmaeher");
        let written = copy_pem_files(&dest, &live).await.unwrap();

        assert_eq!(written, vec![dest.join("cert.pem"), dest.join("privkey.pem")]);
        assert_eq!(std::fs::read_to_string(dest.join("cert.pem")).unwrap(), "CERT");
        assert!(!std::fs::symlink_metadata(dest.join("cert.pem")).unwrap().file_type().is_symlink());
        assert!(!dest.join("README").exists());
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, CERT_DIR_MODE);
    }

    #[tokio::test]
    async fn overwrites_existing_files() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src");
        let dest = dir.path().join("dest");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(source.join("fullchain.pem"), "NEW").unwrap();
        std::fs::write(dest.join("fullchain.pem"), "OLD").unwrap();

        copy_pem_files(&dest, &source).await.unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("fullchain.pem")).unwrap(), "NEW");
    }

    #[tokio::test]
    async fn missing_source_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = copy_pem_files(&dir.path().join("dest"), &dir.path().join("absent"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[tokio::test]
    async fn dangling_symlink_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("live");
        std::fs::create_dir_all(&source).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.pem"), source.join("cert.pem")).unwrap();

        let err = copy_pem_files(&dir.path().join("dest"), &source).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
