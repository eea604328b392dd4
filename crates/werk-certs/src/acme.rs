//! ACME certificates through certbot.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;
use werk_config::{CertBackendKind, Config};
use werk_exec::{AllowedProgram, DEFAULT_TIMEOUT, SafeCommand};

use crate::Acquisition;
use crate::copy::copy_pem_files;
use crate::error::Result;

/// Obtains or renews the deployment certificate from an ACME authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcmeBackend {
    program: String,
    config_dir: PathBuf,
    work_dir: PathBuf,
    live_dir: PathBuf,
    cert_name: String,
    email: String,
    fqdns: Vec<String>,
    staging: bool,
    destination: PathBuf,
    dry_run: bool,
    timeout: Duration,
}

impl AcmeBackend {
    /// Creates the backend from the resolved configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            program: config.certbot_bin.clone(),
            config_dir: config.le_config_path(),
            work_dir: config.le_work_path(),
            live_dir: config.le_live_path(),
            cert_name: config.le_cert_name.clone(),
            email: config.le_email.clone(),
            fqdns: config.fqdns(),
            staging: config.le_test,
            destination: config.cert_copy_dir(),
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

    /// Arguments passed to certbot.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "certonly",
            "--non-interactive",
            "--standalone",
            "--expand",
            "--keep-until-expiring",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.extend([
            "--config-dir".to_string(),
            self.config_dir.display().to_string(),
            "--work-dir".to_string(),
            self.work_dir.display().to_string(),
            "--cert-name".to_string(),
            self.cert_name.clone(),
            "--agree-tos".to_string(),
            "--no-eff-email".to_string(),
            "-m".to_string(),
            self.email.clone(),
            "--domains".to_string(),
            self.fqdns.join(","),
        ]);
        if self.staging {
            args.push("--staging".to_string());
        }
        args
    }

    /// The certbot invocation.
    #[must_use]
    pub fn command(&self) -> SafeCommand {
        SafeCommand::new(AllowedProgram::Certbot)
            .with_program_path(&self.program)
            .args(self.args())
            .timeout(self.timeout)
    }

    /// Runs certbot and copies the live certificate files.
    ///
    /// In dry-run mode nothing is run or copied.
    ///
    /// # Errors
    ///
    /// Returns an error if certbot fails or the copy fails.
    pub async fn acquire(&self) -> Result<Acquisition> {
        let args = self.args();
        if self.dry_run {
            info!(program = %self.program, "running under CI, not calling certbot");
            return Ok(self.acquisition(args, false));
        }

        self.command().run_checked().await?;
        copy_pem_files(&self.destination, &self.live_dir).await?;
        info!(destination = %self.destination.display(), "ACME certificates in place");
        Ok(self.acquisition(args, true))
    }

    fn acquisition(&self, args: Vec<String>, executed: bool) -> Acquisition {
        Acquisition {
            backend: CertBackendKind::Acme,
            program: self.program.clone(),
            args,
            destination: self.destination.clone(),
            executed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_case::test_case;
    use werk_config::EnvSource;

    use crate::error::Error;

    fn config(dir: &TempDir, extra: &[(&str, &str)]) -> Config {
        let data = dir.path().join("data");
        let copy = dir.path().join("le_certs");
        let mut source = EnvSource::from_pairs([
            ("MW_DOMAIN", "example.com"),
            ("MW_LE_EMAIL", "ops@example.com"),
            ("MW_SUBDOMAINS", "mtls"),
            ("MW_PRODUCTS", "fake,tak"),
            ("CI", "true"),
        ]);
        source.set("MW_DATA_PATH", data.display().to_string());
        source.set("MW_LE_COPY_PATH", copy.display().to_string());
        for (key, value) in extra {
            source.set(key, *value);
        }
        Config::from_env(&source).unwrap()
    }

    #[test]
    fn args_layout() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, &[("MW_LE_TEST", "false")]);
        let backend = AcmeBackend::from_config(&cfg);
        let conf = dir.path().join("data/le/conf").display().to_string();
        let work = dir.path().join("data/le/work").display().to_string();

        assert_eq!(
            backend.args(),
            vec![
                "certonly",
                "--non-interactive",
                "--standalone",
                "--expand",
                "--keep-until-expiring",
                "--config-dir",
                conf.as_str(),
                "--work-dir",
                work.as_str(),
                "--cert-name",
                "rasenmaeher",
                "--agree-tos",
                "--no-eff-email",
                "-m",
                "ops@example.com",
                "--domains",
                "mtls.example.com,fake.example.com,mtls.fake.example.com,tak.example.com,\
                 mtls.tak.example.com,kc.example.com,mtls.kc.example.com,example.com",
            ]
        );
    }

    #[test_case("true", true ; "test mode")]
    #[test_case("false", false ; "production")]
    fn staging_flag_follows_test_mode(le_test: &str, expected: bool) {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, &[("MW_LE_TEST", le_test)]);
        let args = AcmeBackend::from_config(&cfg).args();
        assert_eq!(args.iter().any(|a| a == "--staging"), expected);
    }

    #[tokio::test]
    async fn dry_run_spawns_nothing() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, &[("MW_CERTBOT_BIN", "/nonexistent/certbot")]);

        let acquisition = AcmeBackend::from_config(&cfg).acquire().await.unwrap();

        assert!(!acquisition.executed);
        assert_eq!(acquisition.backend, CertBackendKind::Acme);
        assert!(acquisition.args.contains(&"ops@example.com".to_string()));
        assert!(acquisition.args.contains(&"rasenmaeher".to_string()));
        assert!(acquisition.args.iter().any(|a| a.contains("kc.example.com")));
        assert_eq!(acquisition.destination, dir.path().join("le_certs/rasenmaeher"));
        assert!(!acquisition.destination.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_certbot_is_fatal() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, &[("CI", "false"), ("MW_CERTBOT_BIN", "false")]);

        let err = AcmeBackend::from_config(&cfg).acquire().await.unwrap_err();

        assert_eq!(err.exit_code(), Some(1));
        assert!(!dir.path().join("le_certs/rasenmaeher").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_copies_live_certificates() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, &[("CI", "false"), ("MW_CERTBOT_BIN", "true")]);
        let live = cfg.le_live_path();
        std::fs::create_dir_all(&live).unwrap();
        std::fs::write(live.join("fullchain.pem"), "CHAIN").unwrap();
        std::fs::write(live.join("privkey.pem"), "KEY").unwrap();
        std::fs::write(live.join("README"), "docs").unwrap();

        let acquisition = AcmeBackend::from_config(&cfg).acquire().await.unwrap();

        assert!(acquisition.executed);
        let dest = dir.path().join("le_certs/rasenmaeher");
        assert_eq!(std::fs::read_to_string(dest.join("fullchain.pem")).unwrap(), "CHAIN");
        assert!(dest.join("privkey.pem").exists());
        assert!(!dest.join("README").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_live_dir_after_success_is_io_error() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, &[("CI", "false"), ("MW_CERTBOT_BIN", "true")]);

        let err = AcmeBackend::from_config(&cfg).acquire().await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
