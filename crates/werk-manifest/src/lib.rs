//! Bootstrap manifests for miniwerk.
//!
//! The orchestrator reads one manifest listing every product's endpoints.
//! Each product reads its own manifest holding the orchestrator URIs and a
//! signed token that lets it request its client certificate once. The
//! verification key is published next to every manifest.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod types;
mod writer;

pub use error::{Error, Result};
pub use types::{
    InitEndpoint, MtlsEndpoint, OrchestratorLink, OrchestratorManifest, ProductEndpoints,
    ProductIdentity, ProductManifest,
};
pub use writer::ManifestWriter;
