//! Signing keypair and bootstrap tokens for miniwerk.
//!
//! Products prove their first contact with the orchestrator by presenting
//! a short-lived ES256 token issued here and embedded in their manifest.
//! The orchestrator verifies it against the public keys published next to
//! the manifests.
//!
//! Keys are ECDSA P-256 and tokens are signed with ES256. Consumers that
//! only accept RS256 tokens or an RSA `kraftwerk.pub` cannot verify them;
//! they must accept an EC public key and the ES256 algorithm.
//!
//! - [`KeyMaterial`]: ensures the keypair exists and hands out capabilities
//! - [`Issuer`]: signs [`TokenClaims`]
//! - [`Verifier`]: checks tokens against a directory of public keys

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod keys;
mod token;

pub use error::{Error, Result};
pub use keys::{KeyMaterial, PRIVATE_DIR_MODE, PRIVATE_KEY_MODE, PUBLIC_DIR_MODE};
pub use token::{new_nonce, Issuer, TokenClaims, Verifier, ALGORITHM};
