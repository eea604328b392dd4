//! TLS certificate acquisition for miniwerk.
//!
//! Two interchangeable backends cover every name of the deployment:
//!
//! - [`AcmeBackend`]: a public ACME authority through `certbot`
//! - [`LocalCaBackend`]: a locally trusted development CA through `mkcert`
//!
//! [`CertBackend`] selects one of them from the configuration. Both end by
//! copying their PEM files into the same canonical directory, and both
//! skip every external call when the configuration is marked as CI.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod acme;
mod copy;
mod error;
mod local_ca;

use std::path::{Path, PathBuf};

use serde::Serialize;
use werk_config::{CertBackendKind, Config};

pub use acme::AcmeBackend;
pub use copy::{copy_pem_files, prepare_private_dir, CERT_DIR_MODE};
pub use error::{Error, Result};
pub use local_ca::{
    LocalCaBackend, CA_ROOT_FILE, CERT_FILE, FULLCHAIN_FILE, KEY_FILE, PUBLISHED_CA_FILE,
};

/// Outcome of a successful acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acquisition {
    /// Backend that handled the request.
    pub backend: CertBackendKind,
    /// Program that was (or would have been) run.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Canonical certificate directory.
    pub destination: PathBuf,
    /// Whether the program actually ran.
    pub executed: bool,
}

/// The certificate backend selected by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertBackend {
    /// ACME through certbot.
    Acme(AcmeBackend),
    /// Local CA through mkcert.
    LocalCa(LocalCaBackend),
}

impl CertBackend {
    /// Selects and builds the configured backend.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        match config.cert_backend() {
            CertBackendKind::Acme => Self::Acme(AcmeBackend::from_config(config)),
            CertBackendKind::LocalCa => Self::LocalCa(LocalCaBackend::from_config(config)),
        }
    }

    /// Which backend this is.
    #[must_use]
    pub fn kind(&self) -> CertBackendKind {
        match self {
            Self::Acme(_) => CertBackendKind::Acme,
            Self::LocalCa(_) => CertBackendKind::LocalCa,
        }
    }

    /// Program the backend runs.
    #[must_use]
    pub fn program(&self) -> &str {
        match self {
            Self::Acme(b) => b.program(),
            Self::LocalCa(b) => b.program(),
        }
    }

    /// Arguments the backend passes to its program.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::Acme(b) => b.args(),
            Self::LocalCa(b) => b.args(),
        }
    }

    /// Canonical certificate directory.
    #[must_use]
    pub fn destination(&self) -> &Path {
        match self {
            Self::Acme(b) => b.destination(),
            Self::LocalCa(b) => b.destination(),
        }
    }

    /// Obtains the certificates.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend program fails or any file
    /// operation fails. Nothing is retried.
    pub async fn acquire(&self) -> Result<Acquisition> {
        match self {
            Self::Acme(b) => b.acquire().await,
            Self::LocalCa(b) => b.acquire().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use werk_config::EnvSource;

    fn config(extra: &[(&str, &str)]) -> Config {
        let mut source = EnvSource::from_pairs([
            ("MW_DOMAIN", "example.com"),
            ("MW_LE_EMAIL", "ops@example.com"),
            ("MW_DATA_PATH", "/tmp/miniwerk-test"),
            ("CI", "true"),
        ]);
        for (key, value) in extra {
            source.set(key, *value);
        }
        Config::from_env(&source).unwrap()
    }

    #[test]
    fn selects_acme_by_default() {
        let backend = CertBackend::from_config(&config(&[]));
        assert_eq!(backend.kind(), CertBackendKind::Acme);
        assert_eq!(backend.program(), "certbot");
        assert_eq!(backend.args().first().map(String::as_str), Some("certonly"));
        assert_eq!(backend.destination(), Path::new("/le_certs/rasenmaeher"));
    }

    #[test]
    fn selects_local_ca_when_requested() {
        let backend = CertBackend::from_config(&config(&[("MW_MKCERT", "1")]));
        assert_eq!(backend.kind(), CertBackendKind::LocalCa);
        assert_eq!(backend.program(), "mkcert");
        assert_eq!(backend.args().first().map(String::as_str), Some("--cert-file"));
    }

    #[tokio::test]
    async fn dry_run_acquisition_reports_arguments() {
        let backend = CertBackend::from_config(&config(&[("MW_CERTBOT_BIN", "/nonexistent/certbot")]));
        let acquisition = backend.acquire().await.unwrap();
        assert!(!acquisition.executed);
        assert_eq!(acquisition.args, backend.args());
        assert_eq!(acquisition.program, "/nonexistent/certbot");
    }
}
