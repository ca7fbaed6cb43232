pub mod batch;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod provider;
pub mod reader;
pub mod rr;
pub mod tsig;
pub mod update;

pub use self::client::{DnsTransport, TransferRequest, Transport, UpdateRequest};
pub use self::config::{ProviderConfig, TransportConfig};
pub use self::error::{Rfc2136Error, TransferError, TransportError};
pub use self::filter::DomainFilter;
pub use self::provider::{Provider, Records};
pub use self::rr::{ChangeSet, Endpoint, TimeToLive, Zone, Zones};
pub use self::tsig::TsigConfig;
pub use self::update::{Change, MessageBuilder, Transaction};
