//! CLI command implementations.
//!
//! - [`config`] - Dump the resolved configuration
//! - [`certs`] - Certificate acquisition
//! - [`manifests`] - Manifest generation
//! - [`init`] - Manifests followed by certificates

pub mod certs;
pub mod config;
pub mod init;
pub mod manifests;

pub use certs::CertsCommand;
pub use config::ConfigCommand;
pub use init::InitCommand;
pub use manifests::ManifestsCommand;
