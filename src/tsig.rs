//! Transaction signatures (RFC 8945) for update and transfer requests.

use std::fmt;
use std::sync::Arc;

use data_encoding::BASE64;
use hickory_proto::dnssec::rdata::tsig::TsigAlgorithm;
use hickory_proto::dnssec::tsig::TSigner;
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::error::Rfc2136Error;
use crate::rr::parse_fqdn;

/// Allowed clock skew between us and the server, in seconds.
pub const TSIG_FUDGE: u16 = 300;

/// Shared key used to sign requests.
#[derive(Clone, Deserialize)]
pub struct TsigConfig {
    pub key_name: String,
    /// Base64 encoded shared secret.
    pub secret: Zeroizing<String>,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
}

fn default_algorithm() -> String {
    "hmac-sha256".into()
}

impl fmt::Debug for TsigConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsigConfig")
            .field("key_name", &self.key_name)
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl TsigConfig {
    pub fn new(
        key_name: impl Into<String>,
        secret: impl Into<String>,
        algorithm: impl Into<String>,
    ) -> Self {
        TsigConfig {
            key_name: key_name.into(),
            secret: Zeroizing::new(secret.into()),
            algorithm: algorithm.into(),
        }
    }

    /// Builds the signer, checking key name, secret and algorithm.
    pub fn signer(&self) -> Result<Signer, Rfc2136Error> {
        let algorithm = parse_algorithm(&self.algorithm)?;
        let key_name = parse_fqdn(&self.key_name).map_err(|error| {
            Rfc2136Error::AuthConfiguration(format!("key name {:?}: {error}", self.key_name))
        })?;
        let secret = Zeroizing::new(BASE64.decode(self.secret.trim().as_bytes()).map_err(
            |error| Rfc2136Error::AuthConfiguration(format!("secret is not base64: {error}")),
        )?);
        if secret.is_empty() {
            return Err(Rfc2136Error::AuthConfiguration("secret is empty".into()));
        }

        let signer = TSigner::new(secret.to_vec(), algorithm, key_name, TSIG_FUDGE)
            .map_err(|error| Rfc2136Error::AuthConfiguration(error.to_string()))?;
        Ok(Signer {
            inner: Arc::new(signer),
            algorithm: self.algorithm.clone(),
        })
    }
}

/// Maps an algorithm name such as `hmac-sha512` to one we can sign with.
pub fn parse_algorithm(name: &str) -> Result<TsigAlgorithm, Rfc2136Error> {
    let normalized = name.trim().trim_end_matches('.').to_ascii_lowercase();
    let digest = normalized.strip_prefix("hmac-").unwrap_or(&normalized);
    match digest {
        "sha256" => Ok(TsigAlgorithm::HmacSha256),
        "sha384" => Ok(TsigAlgorithm::HmacSha384),
        "sha512" => Ok(TsigAlgorithm::HmacSha512),
        _ => Err(Rfc2136Error::AuthConfiguration(format!(
            "unsupported TSIG algorithm {name:?}"
        ))),
    }
}

/// A ready to use request signer.
#[derive(Clone)]
pub struct Signer {
    inner: Arc<TSigner>,
    algorithm: String,
}

impl Signer {
    pub fn tsigner(&self) -> &TSigner {
        &self.inner
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}
