//! Configuration for miniwerk.
//!
//! Settings come from `MW_`-prefixed environment variables (optionally
//! seeded from a dotenv file) and are resolved once into an immutable
//! [`Config`]. Per-product endpoint settings use nested keys of the form
//! `MW_<PRODUCT>__<FIELD>`.
//!
//! ```
//! use werk_config::{Config, EnvSource};
//!
//! let source = EnvSource::from_pairs([
//!     ("MW_DOMAIN", "example.com"),
//!     ("MW_LE_EMAIL", "ops@example.com"),
//!     ("MW_SUBDOMAINS", "mtls"),
//! ]);
//! let config = Config::from_env(&source).unwrap();
//! assert_eq!(config.deployment_name(), "example");
//! assert_eq!(config.fqdns().last().map(String::as_str), Some("example.com"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
pub mod domains;
mod error;
mod source;

pub use config::{
    mtls_uri, orchestrator_uri, parse_bool, CertBackendKind, Config, KeyType, ProductSettings,
    BUILTIN_PRODUCTS, ENV_PREFIX, NESTED_DELIMITER, ORCHESTRATOR_MANIFEST_FILE, ORCHESTRATOR_NAME,
    PRODUCT_MANIFEST_FILE, PUBLIC_KEY_FILE,
};
pub use domains::{build_fqdns, build_fqdns_from, split_list, RESERVED_PRODUCT};
pub use error::{ConfigError, Result};
pub use source::EnvSource;
