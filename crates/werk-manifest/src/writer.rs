//! Writing manifests to disk.
//!
//! Manifests are written once. If the target file exists it is left
//! untouched and its path is returned, so repeated runs keep the token
//! that was handed out first.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info};
use werk_config::{Config, PUBLIC_KEY_FILE};
use werk_jwt::KeyMaterial;

use crate::error::{Error, Result};
use crate::types::{
    InitEndpoint, MtlsEndpoint, OrchestratorLink, OrchestratorManifest, ProductEndpoints,
    ProductIdentity, ProductManifest,
};

/// Writes the orchestrator and product manifests of one deployment.
#[derive(Debug, Clone)]
pub struct ManifestWriter<'a> {
    config: &'a Config,
    keys: KeyMaterial,
}

impl<'a> ManifestWriter<'a> {
    /// Creates a writer using the configured key material.
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self::with_keys(config, KeyMaterial::from_config(config))
    }

    /// Creates a writer using explicit key material.
    #[must_use]
    pub fn with_keys(config: &'a Config, keys: KeyMaterial) -> Self {
        Self { config, keys }
    }

    /// Key material used for tokens and the published public key.
    #[must_use]
    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }

    /// Builds the orchestrator manifest.
    ///
    /// Products without settings are logged and left out.
    #[must_use]
    pub fn orchestrator_manifest(&self) -> OrchestratorManifest {
        let domain = &self.config.domain;
        let mut products = BTreeMap::new();
        for product in &self.config.products {
            let Some(settings) = self.config.product(product) else {
                error!(product = %product, "no settings for product, leaving it out");
                continue;
            };
            let endpoints = ProductEndpoints {
                api: format!(
                    "https://{}.{domain}:{}{}",
                    settings.api_host_or(product),
                    settings.api_port,
                    settings.api_base
                ),
                uri: format!(
                    "https://{}.{domain}:{}{}",
                    settings.user_host_or(product),
                    settings.user_port,
                    settings.user_base
                ),
                certcn: self.config.product_fqdn(product),
            };
            products.insert(product.clone(), endpoints);
        }
        OrchestratorManifest {
            dns: domain.clone(),
            deployment: self.config.deployment_name().to_string(),
            products,
        }
    }

    /// Builds the manifest of `product` around `token`.
    #[must_use]
    pub fn product_manifest(&self, product: &str, token: String) -> ProductManifest {
        ProductManifest {
            deployment: self.config.deployment_name().to_string(),
            rasenmaeher: OrchestratorLink {
                init: InitEndpoint {
                    base_uri: self.config.orchestrator_uri(),
                    csr_jwt: token,
                },
                mtls: MtlsEndpoint {
                    base_uri: self.config.orchestrator_mtls_uri(),
                },
                certcn: self.config.cert_cn.clone(),
            },
            product: ProductIdentity {
                dns: self.config.product_fqdn(product),
            },
        }
    }

    /// Writes the orchestrator manifest unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the key material or any file operation fails.
    pub async fn write_orchestrator_manifest(&self) -> Result<PathBuf> {
        let path = self.config.orchestrator_manifest_path();
        if exists(&path).await? {
            info!(path = %path.display(), "manifest already exists, not overwriting");
            return Ok(path);
        }
        let dir = manifest_dir(&path);
        self.prepare(dir).await?;
        write_json_atomic(&path, &self.orchestrator_manifest()).await?;
        info!(path = %path.display(), "wrote orchestrator manifest");
        Ok(path)
    }

    /// Writes the manifest of `product` unless it already exists.
    ///
    /// A fresh token is issued for every manifest actually written.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not configured, or the key
    /// material or any file operation fails.
    pub async fn write_product_manifest(&self, product: &str) -> Result<PathBuf> {
        if !self.config.products.iter().any(|p| p == product) {
            return Err(Error::UnknownProduct {
                name: product.to_string(),
            });
        }
        let path = self.config.product_manifest_path(product);
        if exists(&path).await? {
            info!(path = %path.display(), "manifest already exists, not overwriting");
            return Ok(path);
        }
        let dir = manifest_dir(&path);
        self.prepare(dir).await?;

        let issuer = self.keys.issuer().await?;
        let token = issuer.issue(&self.config.product_fqdn(product), true)?;
        write_json_atomic(&path, &self.product_manifest(product, token)).await?;
        info!(path = %path.display(), product, "wrote product manifest");
        Ok(path)
    }

    /// Writes the manifest of every configured product that has settings,
    /// in configuration order.
    ///
    /// Returns the paths written or already present.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub async fn write_all_product_manifests(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(self.config.products.len());
        for product in &self.config.products {
            if self.config.product(product).is_none() {
                error!(product = %product, "no settings for product, skipping manifest");
                continue;
            }
            paths.push(self.write_product_manifest(product).await?);
        }
        Ok(paths)
    }

    /// Writes the orchestrator manifest followed by every product manifest.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub async fn write_all(&self) -> Result<Vec<PathBuf>> {
        let mut paths = vec![self.write_orchestrator_manifest().await?];
        paths.extend(self.write_all_product_manifests().await?);
        Ok(paths)
    }

    async fn prepare(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::io(dir, e))?;
        self.keys.publish_public_key(dir, PUBLIC_KEY_FILE).await?;
        Ok(())
    }
}

fn manifest_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| Error::io(path, e))
}

/// Serializes `value` and moves it into place, so readers never see a
/// partial file.
async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value)?;
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, content)
        .await
        .map_err(|e| Error::io(&temp_path, e))?;
    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| Error::io(path, e))
}
