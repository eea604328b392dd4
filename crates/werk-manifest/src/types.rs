//! JSON documents read by the orchestrator and products at startup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Manifest of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorManifest {
    /// Deployment domain.
    pub dns: String,
    /// Deployment name, the first label of the domain.
    pub deployment: String,
    /// Endpoints of every product with settings.
    pub products: BTreeMap<String, ProductEndpoints>,
}

/// Where the orchestrator finds one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEndpoints {
    /// Integration API base URL.
    pub api: String,
    /// User-facing URL.
    pub uri: String,
    /// Common name of the product's client certificate.
    pub certcn: String,
}

/// Manifest of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductManifest {
    /// Deployment name, the first label of the domain.
    pub deployment: String,
    /// How to reach and enroll with the orchestrator.
    pub rasenmaeher: OrchestratorLink,
    /// The product itself.
    pub product: ProductIdentity,
}

/// Orchestrator section of a product manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorLink {
    /// First-contact endpoint and bootstrap token.
    pub init: InitEndpoint,
    /// Mutual TLS endpoint used after enrollment.
    pub mtls: MtlsEndpoint,
    /// Common name of the orchestrator certificate.
    pub certcn: String,
}

/// First-contact endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitEndpoint {
    /// Orchestrator base URI.
    pub base_uri: String,
    /// Signed token allowing one certificate signing request.
    pub csr_jwt: String,
}

/// Mutual TLS endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MtlsEndpoint {
    /// Orchestrator mTLS base URI.
    pub base_uri: String,
}

/// Product section of a product manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductIdentity {
    /// DNS name of the product.
    pub dns: String,
}
