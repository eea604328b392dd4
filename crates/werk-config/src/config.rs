//! Resolved deployment configuration.
//!
//! [`Config`] is built once per invocation from an [`EnvSource`] and is
//! immutable afterwards. All paths, names and the FQDN list other crates
//! need are exposed as derived accessors so there is a single place that
//! knows the on-disk layout.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domains::{build_fqdns_from, split_list};
use crate::error::{ConfigError, Result};
use crate::source::EnvSource;

/// Prefix of every configuration variable.
pub const ENV_PREFIX: &str = "MW_";

/// Delimiter between a product name and its setting.
pub const NESTED_DELIMITER: &str = "__";

/// Name of the orchestrator service.
pub const ORCHESTRATOR_NAME: &str = "rasenmaeher";

/// File name of every product manifest.
pub const PRODUCT_MANIFEST_FILE: &str = "kraftwerk-init.json";

/// File name of the orchestrator manifest.
pub const ORCHESTRATOR_MANIFEST_FILE: &str = "kraftwerk-rasenmaeher-init.json";

/// File name of the distributed token verification key.
pub const PUBLIC_KEY_FILE: &str = "kraftwerk.pub";

/// Products that have settings without any explicit configuration.
pub const BUILTIN_PRODUCTS: &[&str] = &["fake", "tak", "kc"];

const DEFAULT_SUBDOMAINS: &str = "fake,mtls";
const DEFAULT_PRODUCTS: &str = "fake,tak";
const DEFAULT_CERT_NAME: &str = "rasenmaeher";
const DEFAULT_PRODUCT_API_PORT: u16 = 4625;
const DEFAULT_HTTPS_PORT: u16 = 443;

static LABEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?$").unwrap_or_else(|_| unreachable!())
});

static HOSTNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?)*$")
        .unwrap_or_else(|_| unreachable!())
});

/// Key algorithm requested from the local CA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// RSA keys.
    Rsa,
    /// ECDSA keys.
    #[default]
    Ecdsa,
}

impl FromStr for KeyType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rsa" => Ok(Self::Rsa),
            "ecdsa" => Ok(Self::Ecdsa),
            other => Err(format!("expected 'rsa' or 'ecdsa', got '{other}'")),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => write!(f, "rsa"),
            Self::Ecdsa => write!(f, "ecdsa"),
        }
    }
}

/// Which certificate backend a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertBackendKind {
    /// Public ACME authority through certbot.
    Acme,
    /// Local development CA through mkcert.
    LocalCa,
}

/// Endpoint settings of one product (or the orchestrator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSettings {
    /// Host label of the integration API; the product name when unset.
    pub api_host: Option<String>,
    /// Port of the integration API.
    pub api_port: u16,
    /// Base path of the integration API.
    pub api_base: String,
    /// Host label of the user-facing service; the product name when unset.
    pub user_host: Option<String>,
    /// Port of the user-facing service.
    pub user_port: u16,
    /// Base path of the user-facing service.
    pub user_base: String,
}

impl ProductSettings {
    /// Defaults for a product integration API on `api_port`.
    #[must_use]
    pub fn with_api_port(api_port: u16) -> Self {
        Self {
            api_host: None,
            api_port,
            api_base: "/".to_string(),
            user_host: None,
            user_port: DEFAULT_HTTPS_PORT,
            user_base: "/".to_string(),
        }
    }

    /// API host label, falling back to `product`.
    #[must_use]
    pub fn api_host_or<'a>(&'a self, product: &'a str) -> &'a str {
        self.api_host.as_deref().unwrap_or(product)
    }

    /// User-facing host label, falling back to `product`.
    #[must_use]
    pub fn user_host_or<'a>(&'a self, product: &'a str) -> &'a str {
        self.user_host.as_deref().unwrap_or(product)
    }

    fn apply(&mut self, field: &str, value: &str, key: &str) -> Result<()> {
        match field {
            "API_HOST" => self.api_host = Some(parse_label(key, value)?),
            "API_PORT" => self.api_port = parse_port(key, value)?,
            "API_BASE" => self.api_base = value.to_string(),
            "USER_HOST" => self.user_host = Some(parse_label(key, value)?),
            "USER_PORT" => self.user_port = parse_port(key, value)?,
            "USER_BASE" => self.user_base = value.to_string(),
            _ => warn!(key, "ignoring unknown product setting"),
        }
        Ok(())
    }
}

impl Default for ProductSettings {
    fn default() -> Self {
        Self::with_api_port(DEFAULT_PRODUCT_API_PORT)
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Domain under which the deployment operates.
    pub domain: String,
    /// Contact address given to the ACME authority.
    pub le_email: String,
    /// Use the ACME staging environment.
    pub le_test: bool,
    /// Extra subdomains to get certificates for.
    pub subdomains: Vec<String>,
    /// Configured products, in order.
    pub products: Vec<String>,
    /// Where certificates and keys are copied to.
    pub le_copy_path: PathBuf,
    /// Persistent data root.
    pub data_path: PathBuf,
    /// Root directory of manifests, one subdirectory per product.
    pub manifests_base: PathBuf,
    /// Certificate lineage name.
    pub le_cert_name: String,
    /// Common name of the deployment certificate.
    pub cert_cn: String,
    /// Use the local CA instead of ACME.
    pub mkcert: bool,
    /// Key algorithm for the local CA.
    pub keytype: KeyType,
    /// Directory the local CA root is published to.
    pub ca_public_path: PathBuf,
    /// ACME client program.
    pub certbot_bin: String,
    /// Local CA program.
    pub mkcert_bin: String,
    /// Running in CI: never call external programs.
    pub ci: bool,
    /// Orchestrator endpoint settings.
    pub rasenmaeher: ProductSettings,
    /// Settings of every configured product that has them.
    pub product_settings: BTreeMap<String, ProductSettings>,
}

impl Config {
    /// Resolve the configuration from a settings snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if a required setting is missing or any value is
    /// invalid. No partial configuration is returned.
    pub fn from_env(source: &EnvSource) -> Result<Self> {
        let reader = Reader { source };

        let domain = reader.required("DOMAIN")?.to_lowercase();
        if !HOSTNAME_REGEX.is_match(&domain) {
            return Err(ConfigError::invalid(
                reader.key("DOMAIN"),
                format!("'{domain}' is not a valid hostname"),
            ));
        }

        let le_email = reader.required("LE_EMAIL")?.to_string();
        if !le_email.contains('@') {
            return Err(ConfigError::invalid(
                reader.key("LE_EMAIL"),
                format!("'{le_email}' is not an e-mail address"),
            ));
        }

        let subdomains = reader.labels("SUBDOMAINS", DEFAULT_SUBDOMAINS)?;
        let products = reader.labels("PRODUCTS", DEFAULT_PRODUCTS)?;
        for (idx, product) in products.iter().enumerate() {
            if products[..idx].contains(product) {
                return Err(ConfigError::DuplicateProduct {
                    name: product.clone(),
                });
            }
        }

        let data_path = PathBuf::from(reader.optional("DATA_PATH").unwrap_or("/data/persistent"));
        let cert_cn = reader
            .optional("CERT_CN")
            .map_or_else(|| domain.clone(), ToString::to_string);
        let ci = match source.get("CI") {
            Some(value) => parse_bool("CI", value)?,
            None => reader.bool("CI", false)?,
        };

        let mut rasenmaeher = ProductSettings::with_api_port(DEFAULT_HTTPS_PORT);
        reader.apply_nested(ORCHESTRATOR_NAME, &mut rasenmaeher)?;

        let mut product_settings = BTreeMap::new();
        for product in &products {
            let builtin = BUILTIN_PRODUCTS.contains(&product.as_str());
            if !builtin && !reader.has_nested(product) {
                debug!(product = %product, "no settings for product");
                continue;
            }
            let mut settings = ProductSettings::default();
            reader.apply_nested(product, &mut settings)?;
            product_settings.insert(product.clone(), settings);
        }

        let keytype = match reader.optional("KEYTYPE") {
            Some(value) => value
                .parse()
                .map_err(|reason: String| ConfigError::invalid(reader.key("KEYTYPE"), reason))?,
            None => KeyType::default(),
        };

        Ok(Self {
            domain,
            le_email,
            le_test: reader.bool("LE_TEST", true)?,
            subdomains,
            products,
            le_copy_path: PathBuf::from(reader.optional("LE_COPY_PATH").unwrap_or("/le_certs")),
            data_path,
            manifests_base: PathBuf::from(reader.optional("MANIFESTS_BASE").unwrap_or("/pvarki")),
            le_cert_name: reader
                .optional("LE_CERT_NAME")
                .unwrap_or(DEFAULT_CERT_NAME)
                .to_string(),
            cert_cn,
            mkcert: reader.bool("MKCERT", false)?,
            keytype,
            ca_public_path: PathBuf::from(reader.optional("CA_PUBLIC_PATH").unwrap_or("/ca_public")),
            certbot_bin: reader.optional("CERTBOT_BIN").unwrap_or("certbot").to_string(),
            mkcert_bin: reader.optional("MKCERT_BIN").unwrap_or("mkcert").to_string(),
            ci,
            rasenmaeher,
            product_settings,
        })
    }

    /// Which certificate backend this configuration selects.
    #[must_use]
    pub fn cert_backend(&self) -> CertBackendKind {
        if self.mkcert {
            CertBackendKind::LocalCa
        } else {
            CertBackendKind::Acme
        }
    }

    /// Every name the deployment certificate must cover.
    #[must_use]
    pub fn fqdns(&self) -> Vec<String> {
        build_fqdns_from(&self.domain, &self.subdomains, &self.products)
    }

    /// First label of the domain.
    #[must_use]
    pub fn deployment_name(&self) -> &str {
        self.domain.split('.').next().unwrap_or(&self.domain)
    }

    /// Settings of `product`, if it has any.
    #[must_use]
    pub fn product(&self, product: &str) -> Option<&ProductSettings> {
        self.product_settings.get(product)
    }

    /// `product.domain`.
    #[must_use]
    pub fn product_fqdn(&self, product: &str) -> String {
        format!("{product}.{}", self.domain)
    }

    /// ACME client configuration directory.
    #[must_use]
    pub fn le_config_path(&self) -> PathBuf {
        self.data_path.join("le").join("conf")
    }

    /// ACME client work directory.
    #[must_use]
    pub fn le_work_path(&self) -> PathBuf {
        self.data_path.join("le").join("work")
    }

    /// Directory the ACME client keeps the current certificate links in.
    #[must_use]
    pub fn le_live_path(&self) -> PathBuf {
        self.le_config_path().join("live").join(&self.le_cert_name)
    }

    /// Local CA output directory.
    #[must_use]
    pub fn mk_cert_dir(&self) -> PathBuf {
        self.data_path.join("mkcert")
    }

    /// Canonical certificate destination.
    #[must_use]
    pub fn cert_copy_dir(&self) -> PathBuf {
        self.le_copy_path.join(&self.le_cert_name)
    }

    /// Token signing key.
    #[must_use]
    pub fn private_key_path(&self) -> PathBuf {
        self.data_path.join("private").join("jwt.key")
    }

    /// Token verification key.
    #[must_use]
    pub fn public_key_path(&self) -> PathBuf {
        self.manifests_base.join("publickeys").join(PUBLIC_KEY_FILE)
    }

    /// Orchestrator manifest location.
    #[must_use]
    pub fn orchestrator_manifest_path(&self) -> PathBuf {
        self.manifests_base
            .join(ORCHESTRATOR_NAME)
            .join(ORCHESTRATOR_MANIFEST_FILE)
    }

    /// Manifest location of `product`.
    #[must_use]
    pub fn product_manifest_path(&self, product: &str) -> PathBuf {
        self.manifests_base.join(product).join(PRODUCT_MANIFEST_FILE)
    }

    /// Manifest location of every configured product, in configuration order.
    #[must_use]
    pub fn product_manifest_paths(&self) -> Vec<(String, PathBuf)> {
        self.products
            .iter()
            .map(|product| (product.clone(), self.product_manifest_path(product)))
            .collect()
    }

    /// Orchestrator base URI; the port is omitted when it is 443.
    #[must_use]
    pub fn orchestrator_uri(&self) -> String {
        orchestrator_uri(&self.domain, self.rasenmaeher.api_port)
    }

    /// Orchestrator mTLS base URI.
    #[must_use]
    pub fn orchestrator_mtls_uri(&self) -> String {
        mtls_uri(&self.orchestrator_uri())
    }
}

/// Build the orchestrator base URI for `domain` and `port`.
#[must_use]
pub fn orchestrator_uri(domain: &str, port: u16) -> String {
    if port == DEFAULT_HTTPS_PORT {
        format!("https://{domain}/")
    } else {
        format!("https://{domain}:{port}/")
    }
}

/// Rewrite an `https://` URI to its `https://mtls.` variant.
#[must_use]
pub fn mtls_uri(uri: &str) -> String {
    uri.replacen("https://", "https://mtls.", 1)
}

/// Parse a boolean setting.
///
/// # Errors
///
/// Returns an error for anything other than the accepted spellings.
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::invalid(
            key,
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ConfigError::invalid(
            key,
            format!("expected a port number, got '{value}'"),
        )),
    }
}

fn parse_label(key: &str, value: &str) -> Result<String> {
    let value = value.trim().to_lowercase();
    if LABEL_REGEX.is_match(&value) {
        Ok(value)
    } else {
        Err(ConfigError::invalid(
            key,
            format!("'{value}' is not a valid DNS label"),
        ))
    }
}

fn env_name(product: &str) -> String {
    product.to_uppercase().replace('-', "_")
}

struct Reader<'a> {
    source: &'a EnvSource,
}

impl Reader<'_> {
    fn key(&self, field: &str) -> String {
        format!("{ENV_PREFIX}{field}")
    }

    fn optional(&self, field: &str) -> Option<&str> {
        self.source.get(&self.key(field))
    }

    fn required(&self, field: &str) -> Result<&str> {
        match self.optional(field).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ConfigError::Missing {
                key: self.key(field),
            }),
        }
    }

    fn bool(&self, field: &str, default: bool) -> Result<bool> {
        self.optional(field)
            .map_or(Ok(default), |value| parse_bool(&self.key(field), value))
    }

    fn labels(&self, field: &str, default: &str) -> Result<Vec<String>> {
        let key = self.key(field);
        split_list(self.optional(field).unwrap_or(default))
            .iter()
            .map(|label| parse_label(&key, label))
            .collect()
    }

    fn nested_prefix(product: &str) -> String {
        format!("{ENV_PREFIX}{}{NESTED_DELIMITER}", env_name(product))
    }

    fn has_nested(&self, product: &str) -> bool {
        let prefix = Self::nested_prefix(product);
        self.source.with_prefix(&prefix).next().is_some()
    }

    fn apply_nested(&self, product: &str, settings: &mut ProductSettings) -> Result<()> {
        let prefix = Self::nested_prefix(product);
        for (field, value) in self.source.with_prefix(&prefix) {
            let key = format!("{prefix}{field}");
            settings.apply(field, value, &key)?;
        }
        Ok(())
    }
}
