//! Development certificates through mkcert.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};
use werk_config::{CertBackendKind, Config, KeyType};
use werk_exec::{AllowedProgram, DEFAULT_TIMEOUT, SafeCommand};

use crate::Acquisition;
use crate::copy::{copy_pem_files, prepare_private_dir};
use crate::error::{Error, Result};

/// Leaf certificate written by mkcert.
pub const CERT_FILE: &str = "cert.pem";
/// Private key written by mkcert.
pub const KEY_FILE: &str = "privkey.pem";
/// Leaf certificate followed by the local CA root.
pub const FULLCHAIN_FILE: &str = "fullchain.pem";
/// Root certificate inside the mkcert CA directory.
pub const CA_ROOT_FILE: &str = "rootCA.pem";
/// Name of the published CA root.
pub const PUBLISHED_CA_FILE: &str = "miniwerk_ca.pem";

/// Issues the deployment certificate from a locally trusted CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCaBackend {
    program: String,
    cert_dir: PathBuf,
    keytype: KeyType,
    fqdns: Vec<String>,
    destination: PathBuf,
    ca_public_dir: PathBuf,
    dry_run: bool,
    timeout: Duration,
}

impl LocalCaBackend {
    /// Creates the backend from the resolved configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            program: config.mkcert_bin.clone(),
            cert_dir: config.mk_cert_dir(),
            keytype: config.keytype,
            fqdns: config.fqdns(),
            destination: config.cert_copy_dir(),
            ca_public_dir: config.ca_public_path.clone(),
            dry_run: config.ci,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the process timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program that will be run.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Canonical certificate directory.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Where the CA root is published.
    #[must_use]
    pub fn published_ca_path(&self) -> PathBuf {
        self.ca_public_dir.join(PUBLISHED_CA_FILE)
    }

    /// Arguments passed to mkcert, one trailing argument per name.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--cert-file".to_string(),
            self.cert_dir.join(CERT_FILE).display().to_string(),
            "--key-file".to_string(),
            self.cert_dir.join(KEY_FILE).display().to_string(),
        ];
        if self.keytype == KeyType::Ecdsa {
            args.push("--ecdsa".to_string());
        }
        args.extend(self.fqdns.iter().cloned());
        args
    }

    /// The mkcert invocation.
    #[must_use]
    pub fn command(&self) -> SafeCommand {
        SafeCommand::new(AllowedProgram::Mkcert)
            .with_program_path(&self.program)
            .args(self.args())
            .timeout(self.timeout)
    }

    /// Runs mkcert, builds the full chain, copies the PEM files and
    /// publishes the CA root.
    ///
    /// The output directory is prepared even in dry-run mode; nothing else
    /// happens then.
    ///
    /// # Errors
    ///
    /// Returns an error if mkcert fails, the CA root cannot be located, or
    /// any file operation fails.
    pub async fn acquire(&self) -> Result<Acquisition> {
        prepare_private_dir(&self.cert_dir).await?;
        let args = self.args();
        if self.dry_run {
            info!(program = %self.program, "running under CI, not calling mkcert");
            return Ok(self.acquisition(args, false));
        }

        self.command().run_checked().await?;
        let ca_root = self.ca_root().await?;
        self.write_fullchain(&ca_root).await?;
        copy_pem_files(&self.destination, &self.cert_dir).await?;
        self.publish_ca_root(&ca_root).await?;
        info!(destination = %self.destination.display(), "local CA certificates in place");
        Ok(self.acquisition(args, true))
    }

    /// Location of the local CA root certificate, as reported by mkcert.
    ///
    /// # Errors
    ///
    /// Returns an error if mkcert fails or reports nothing.
    pub async fn ca_root(&self) -> Result<PathBuf> {
        let output = SafeCommand::new(AllowedProgram::Mkcert)
            .with_program_path(&self.program)
            .arg("-CAROOT")
            .timeout(self.timeout)
            .run_checked()
            .await?;
        let caroot = output.stdout_lossy().trim().to_string();
        if caroot.is_empty() {
            return Err(Error::CaRoot(format!("'{} -CAROOT' printed nothing", self.program)));
        }
        debug!(caroot = %caroot, "located local CA");
        Ok(Path::new(&caroot).join(CA_ROOT_FILE))
    }

    async fn write_fullchain(&self, ca_root: &Path) -> Result<()> {
        let cert_path = self.cert_dir.join(CERT_FILE);
        let mut fullchain = tokio::fs::read(&cert_path)
            .await
            .map_err(|e| Error::io(&cert_path, e))?;
        let root = tokio::fs::read(ca_root)
            .await
            .map_err(|e| Error::io(ca_root, e))?;
        fullchain.extend_from_slice(&root);

        let fullchain_path = self.cert_dir.join(FULLCHAIN_FILE);
        tokio::fs::write(&fullchain_path, fullchain)
            .await
            .map_err(|e| Error::io(&fullchain_path, e))
    }

    async fn publish_ca_root(&self, ca_root: &Path) -> Result<()> {
        tokio::fs::create_dir_all(&self.ca_public_dir)
            .await
            .map_err(|e| Error::io(&self.ca_public_dir, e))?;
        let target = self.published_ca_path();
        tokio::fs::copy(ca_root, &target)
            .await
            .map_err(|e| Error::io(&target, e))?;
        info!(path = %target.display(), "published local CA root");
        Ok(())
    }

    fn acquisition(&self, args: Vec<String>, executed: bool) -> Acquisition {
        Acquisition {
            backend: CertBackendKind::LocalCa,
            program: self.program.clone(),
            args,
            destination: self.destination.clone(),
            executed,
        }
    }
}
