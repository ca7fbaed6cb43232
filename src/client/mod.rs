//! Delivery of update and transfer requests to the authoritative server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::Record;
use tracing::{debug, instrument, warn};

use crate::config::TransportConfig;
use crate::error::{Rfc2136Error, TransferError, TransportError};
use crate::rr::Zone;
use crate::update::Transaction;

mod tcp;
mod udp;

/// A signed UPDATE message together with the transaction it encodes.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    transaction: Transaction,
    message: Message,
}

impl UpdateRequest {
    pub fn new(transaction: Transaction, message: Message) -> Self {
        UpdateRequest {
            transaction,
            message,
        }
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn zone(&self) -> &Zone {
        self.transaction.zone()
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}

/// An AXFR query for one zone.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    zone: Zone,
    message: Message,
}

impl TransferRequest {
    pub fn new(zone: Zone, message: Message) -> Self {
        TransferRequest { zone, message }
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}

/// The network side of the provider.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Delivers one update and waits for the server's verdict.
    async fn send(&self, request: UpdateRequest) -> Result<(), Rfc2136Error>;

    /// Performs a full zone transfer, returning every record or nothing.
    async fn transfer(&self, request: TransferRequest) -> Result<Vec<Record>, Rfc2136Error>;
}

#[async_trait::async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: UpdateRequest) -> Result<(), Rfc2136Error> {
        (**self).send(request).await
    }

    async fn transfer(&self, request: TransferRequest) -> Result<Vec<Record>, Rfc2136Error> {
        (**self).transfer(request).await
    }
}

/// Talks to a name server over TCP or UDP.
///
/// Every request opens its own connection. Zone transfers always use TCP.
#[derive(Debug, Clone)]
pub struct DnsTransport {
    config: Arc<TransportConfig>,
}

impl DnsTransport {
    pub fn new(config: TransportConfig) -> Self {
        DnsTransport {
            config: Arc::new(config),
        }
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    async fn resolve(&self) -> Result<SocketAddr, TransportError> {
        let host = self.config.host.as_str();
        tokio::net::lookup_host((host, self.config.port))
            .await?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no address found for {host}"),
                )
                .into()
            })
    }

    /// Resolves the server and runs one request/response exchange, both
    /// bounded by the configured timeout.
    async fn exchange(&self, message: Message) -> Result<Message, TransportError> {
        let exchange = async {
            let addr = self.resolve().await?;
            if self.config.use_tcp {
                tcp::exchange(addr, message).await
            } else {
                udp::exchange(addr, message).await
            }
        };

        tokio::time::timeout(self.timeout(), exchange)
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    async fn fetch(&self, message: Message) -> Result<Vec<Record>, TransferError> {
        let fetch = async {
            let addr = self.resolve().await?;
            tcp::transfer(addr, message).await
        };

        tokio::time::timeout(self.timeout(), fetch)
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}

#[async_trait::async_trait]
impl Transport for DnsTransport {
    #[instrument(skip_all, fields(dns.zone = %request.zone(), dns.id = request.message().id()))]
    async fn send(&self, request: UpdateRequest) -> Result<(), Rfc2136Error> {
        let zone = request.zone().apex().clone();
        let response = self.exchange(request.into_message()).await?;

        match response.response_code() {
            ResponseCode::NoError => {
                debug!("update accepted");
                Ok(())
            }
            code => {
                warn!(%code, "update rejected");
                Err(Rfc2136Error::ServerRejected { zone, code })
            }
        }
    }

    #[instrument(skip_all, fields(dns.zone = %request.zone()))]
    async fn transfer(&self, request: TransferRequest) -> Result<Vec<Record>, Rfc2136Error> {
        let zone = request.zone().apex().clone();
        match self.fetch(request.into_message()).await {
            Ok(records) => {
                debug!(records = records.len(), "zone transfer complete");
                Ok(records)
            }
            Err(source) => Err(Rfc2136Error::Transfer { zone, source }),
        }
    }
}
