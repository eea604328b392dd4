//! On-disk signing keypair.
//!
//! The keypair is generated on first use and reused afterwards. There is
//! no locking: two processes running their first invocation at the same
//! time may both generate, and the last writer wins.

use std::fs::{OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use rcgen::KeyPair;
use tracing::{debug, info};
use werk_config::Config;

use crate::error::{Error, Result};
use crate::token::{Issuer, Verifier};

/// Mode of the directory holding the private key.
pub const PRIVATE_DIR_MODE: u32 = 0o700;

/// Mode of the directory holding the public key.
pub const PUBLIC_DIR_MODE: u32 = 0o755;

/// Mode of the private key file.
pub const PRIVATE_KEY_MODE: u32 = 0o600;

/// Locations of the deployment signing keypair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    private_key_path: PathBuf,
    public_key_path: PathBuf,
}

impl KeyMaterial {
    /// Creates key material at explicit paths.
    #[must_use]
    pub fn new(private_key_path: impl Into<PathBuf>, public_key_path: impl Into<PathBuf>) -> Self {
        Self {
            private_key_path: private_key_path.into(),
            public_key_path: public_key_path.into(),
        }
    }

    /// Creates key material at the configured paths.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.private_key_path(), config.public_key_path())
    }

    /// Path of the private key.
    #[must_use]
    pub fn private_key_path(&self) -> &Path {
        &self.private_key_path
    }

    /// Path of the public key.
    #[must_use]
    pub fn public_key_path(&self) -> &Path {
        &self.public_key_path
    }

    /// Directory holding the public key.
    #[must_use]
    pub fn public_key_dir(&self) -> &Path {
        self.public_key_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Makes sure the keypair exists, generating it if either file is
    /// missing.
    ///
    /// Directory modes are (re)applied on every call. Existing key files
    /// are not inspected.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be prepared or generation
    /// fails.
    pub async fn ensure_keypair(&self) -> Result<(PathBuf, PathBuf)> {
        let private_dir = parent_dir(&self.private_key_path);
        let public_dir = parent_dir(&self.public_key_path);
        prepare_dir(&private_dir, PRIVATE_DIR_MODE).await?;
        prepare_dir(&public_dir, PUBLIC_DIR_MODE).await?;

        let private_exists = path_exists(&self.private_key_path).await?;
        let public_exists = path_exists(&self.public_key_path).await?;
        if private_exists && public_exists {
            debug!(
                private = %self.private_key_path.display(),
                public = %self.public_key_path.display(),
                "keypair already present"
            );
            return Ok((self.private_key_path.clone(), self.public_key_path.clone()));
        }

        let private_path = self.private_key_path.clone();
        let public_path = self.public_key_path.clone();
        tokio::task::spawn_blocking(move || generate_keypair(&private_path, &public_path))
            .await
            .map_err(|e| Error::Task {
                reason: e.to_string(),
            })??;

        info!(
            private = %self.private_key_path.display(),
            public = %self.public_key_path.display(),
            "generated signing keypair"
        );
        Ok((self.private_key_path.clone(), self.public_key_path.clone()))
    }

    /// Returns an issuer bound to the private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypair cannot be ensured or loaded.
    pub async fn issuer(&self) -> Result<Issuer> {
        let (private_key_path, _) = self.ensure_keypair().await?;
        let pem = tokio::fs::read(&private_key_path)
            .await
            .map_err(|e| Error::io(&private_key_path, e))?;
        Issuer::from_pem(&pem)
    }

    /// Returns a verifier bound to the public key directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypair cannot be ensured or the directory
    /// holds no valid keys.
    pub async fn verifier(&self) -> Result<Verifier> {
        self.ensure_keypair().await?;
        Verifier::from_dir(self.public_key_dir()).await
    }

    /// Copies the public key into `dir` as `file_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypair cannot be ensured or the copy fails.
    pub async fn publish_public_key(&self, dir: &Path, file_name: &str) -> Result<PathBuf> {
        let (_, public_key_path) = self.ensure_keypair().await?;
        let target = dir.join(file_name);
        if target == public_key_path {
            return Ok(target);
        }
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::io(dir, e))?;
        tokio::fs::copy(&public_key_path, &target)
            .await
            .map_err(|e| Error::io(&target, e))?;
        debug!(target = %target.display(), "published public key");
        Ok(target)
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

async fn prepare_dir(dir: &Path, mode: u32) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::io(dir, e))?;
    tokio::fs::set_permissions(dir, Permissions::from_mode(mode))
        .await
        .map_err(|e| Error::io(dir, e))
}

async fn path_exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| Error::io(path, e))
}

fn generate_keypair(private_path: &Path, public_path: &Path) -> Result<()> {
    let key_pair = KeyPair::generate().map_err(|e| Error::KeyGeneration {
        reason: format!("failed to generate key pair: {e}"),
    })?;

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(PRIVATE_KEY_MODE)
        .open(private_path)
        .map_err(|e| Error::io(private_path, e))?;
    // mode() only applies on creation
    file.set_permissions(Permissions::from_mode(PRIVATE_KEY_MODE))
        .map_err(|e| Error::io(private_path, e))?;
    file.write_all(key_pair.serialize_pem().as_bytes())
        .map_err(|e| Error::io(private_path, e))?;

    std::fs::write(public_path, key_pair.public_key_pem()).map_err(|e| Error::io(public_path, e))
}
