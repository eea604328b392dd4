//! CSR bootstrap tokens.
//!
//! - [`TokenClaims`]: claims carried by a bootstrap token
//! - [`Issuer`]: signs tokens with the deployment private key
//! - [`Verifier`]: checks tokens against every published public key

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Default token lifetime in hours.
const DEFAULT_EXPIRY_HOURS: i64 = 24;

/// Signing algorithm of every token. Not RS256: verifiers need an EC key.
pub const ALGORITHM: Algorithm = Algorithm::ES256;

/// Extension of public key files in the verification directory.
const PUBLIC_KEY_EXTENSION: &str = "pub";

/// Generate a random single-use nonce.
#[must_use]
pub fn new_nonce() -> String {
    URL_SAFE_NO_PAD.encode(uuid::Uuid::new_v4().as_bytes())
}

/// Claims of a bootstrap token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject, the FQDN of the product the token was issued for.
    pub sub: String,
    /// Whether the bearer may submit a certificate signing request.
    pub csr: bool,
    /// Per-issuance random value.
    pub nonce: String,
    /// Issued at time (Unix timestamp).
    pub iat: i64,
    /// Not before time (Unix timestamp).
    pub nbf: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

impl TokenClaims {
    /// Creates claims for `sub` valid for `lifetime` from now.
    #[must_use]
    pub fn new(sub: impl Into<String>, csr: bool, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.into(),
            csr,
            nonce: new_nonce(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        }
    }

    /// Checks if the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Signs bootstrap tokens.
#[derive(Clone)]
pub struct Issuer {
    key: EncodingKey,
    lifetime: Duration,
}

impl Issuer {
    /// Creates an issuer from a PKCS#8 PEM encoded EC private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be parsed.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let key = EncodingKey::from_ec_pem(pem).map_err(|e| Error::JwtError {
            reason: format!("invalid signing key: {e}"),
        })?;
        Ok(Self {
            key,
            lifetime: Duration::hours(DEFAULT_EXPIRY_HOURS),
        })
    }

    /// Sets the token lifetime.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Returns the token lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues a fresh token for `sub`.
    ///
    /// Every call yields a new nonce.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue(&self, sub: &str, csr: bool) -> Result<String> {
        let claims = TokenClaims::new(sub, csr, self.lifetime);
        debug!(sub, csr, exp = claims.exp, "issuing token");
        self.issue_claims(&claims)
    }

    /// Signs arbitrary claims.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue_claims(&self, claims: &TokenClaims) -> Result<String> {
        encode(&Header::new(ALGORITHM), claims, &self.key).map_err(|e| Error::JwtError {
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Issuer")
            .field("algorithm", &ALGORITHM)
            .field("lifetime", &self.lifetime)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Verifies bootstrap tokens against a directory of public keys.
#[derive(Clone)]
pub struct Verifier {
    dir: PathBuf,
    keys: Vec<(PathBuf, DecodingKey)>,
}

impl Verifier {
    /// Loads every `*.pub` file in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read, a key file is not
    /// a valid EC public key, or no key is found.
    pub async fn from_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| Error::io(&dir, e))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&dir, e))? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == PUBLIC_KEY_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut keys = Vec::with_capacity(paths.len());
        for path in paths {
            let pem = tokio::fs::read(&path).await.map_err(|e| Error::io(&path, e))?;
            let key = DecodingKey::from_ec_pem(&pem).map_err(|e| Error::InvalidKey {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            keys.push((path, key));
        }

        if keys.is_empty() {
            return Err(Error::NoPublicKeys { dir });
        }
        debug!(dir = %dir.display(), count = keys.len(), "loaded verification keys");
        Ok(Self { dir, keys })
    }

    /// Directory the keys were loaded from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of loaded keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Verifies `token` and returns its claims.
    ///
    /// The token is accepted if it verifies under any loaded key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenExpired`] for an expired token and
    /// [`Error::InvalidToken`] if no key verifies it.
    pub fn decode(&self, token: &str) -> Result<TokenClaims> {
        let validation = validation();
        let mut last_error = None;
        for (path, key) in &self.keys {
            match decode::<TokenClaims>(token, key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                    return Err(Error::TokenExpired);
                }
                Err(e) => {
                    debug!(key = %path.display(), error = %e, "token not verified by key");
                    last_error = Some(e);
                }
            }
        }
        Err(Error::InvalidToken {
            reason: last_error.map_or_else(|| "no keys".to_string(), |e| e.to_string()),
        })
    }
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<&Path> = self.keys.iter().map(|(path, _)| path.as_path()).collect();
        f.debug_struct("Verifier")
            .field("dir", &self.dir)
            .field("keys", &paths)
            .finish()
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(ALGORITHM);
    validation.set_required_spec_claims(&["exp", "nbf", "sub"]);
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation
}
