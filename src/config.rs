use std::time::Duration;

use serde::Deserialize;

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::filter::DomainFilter;
use crate::rr::TimeToLive;
use crate::tsig::TsigConfig;

/// Everything the provider needs to publish and read records.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub host: String,
    pub port: u16,

    /// Zones updates may address. Empty means the root zone.
    pub zones: Vec<String>,

    pub tsig: Option<TsigConfig>,

    /// Send requests unsigned even when `tsig` is set.
    pub insecure: bool,

    /// Sign zone transfer requests too.
    pub tsig_axfr: bool,

    /// Deliver updates over TCP rather than UDP.
    pub use_tcp: bool,

    pub min_ttl: TimeToLive,

    /// Endpoints per update message.
    pub batch_size: usize,

    /// Read records via zone transfer. When disabled no records are reported.
    pub axfr: bool,

    /// Log update messages instead of sending them.
    pub dry_run: bool,

    /// Seconds to wait for any single exchange with the server.
    pub timeout_secs: u64,

    pub domain_filter: DomainFilter,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            host: "127.0.0.1".into(),
            port: 53,
            zones: Vec::new(),
            tsig: None,
            insecure: false,
            tsig_axfr: true,
            use_tcp: true,
            min_ttl: TimeToLive::ZERO,
            batch_size: DEFAULT_BATCH_SIZE,
            axfr: true,
            dry_run: false,
            timeout_secs: 10,
            domain_filter: DomainFilter::default(),
        }
    }
}

impl ProviderConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            host: self.host.clone(),
            port: self.port,
            use_tcp: self.use_tcp,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// Whether requests will carry a signature.
    pub fn is_signed(&self) -> bool {
        self.tsig.is_some() && !self.insecure
    }
}

/// Where and how to reach the name server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub use_tcp: bool,
    pub timeout: Duration,
}
