use std::net::SocketAddr;

use futures::{SinkExt as _, StreamExt as _};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{Record, RecordType};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::trace;

use crate::codec::DnsCodec;
use crate::error::{TransferError, TransportError};

type DnsFramed = Framed<TcpStream, DnsCodec<Message, Message>>;

async fn connect(addr: SocketAddr) -> Result<DnsFramed, TransportError> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    trace!(%addr, "connected");
    Ok(Framed::new(stream, DnsCodec::tcp()))
}

/// Sends one message and reads its response.
pub(super) async fn exchange(addr: SocketAddr, message: Message) -> Result<Message, TransportError> {
    let id = message.id();
    let mut framed = connect(addr).await?;
    framed.send(message).await?;

    let response = framed.next().await.ok_or(TransportError::Closed)??;
    if response.id() != id {
        return Err(TransportError::Mismatched {
            expected: id,
            actual: response.id(),
        });
    }
    Ok(response)
}

/// Runs an AXFR, collecting records up to and including the closing SOA.
pub(super) async fn transfer(addr: SocketAddr, message: Message) -> Result<Vec<Record>, TransferError> {
    let id = message.id();
    let mut framed = connect(addr).await?;
    framed.send(message).await?;

    let mut records: Vec<Record> = Vec::new();
    while let Some(response) = framed.next().await {
        let response = response?;
        if response.id() != id {
            return Err(TransportError::Mismatched {
                expected: id,
                actual: response.id(),
            }
            .into());
        }
        if response.response_code() != ResponseCode::NoError {
            return Err(TransferError::Refused(response.response_code()));
        }

        trace!(answers = response.answers().len(), "transfer message");
        for record in response.answers() {
            let is_soa = record.record_type() == RecordType::SOA;
            if records.is_empty() && !is_soa {
                return Err(TransferError::MissingSoa);
            }
            let closing = is_soa && !records.is_empty();
            records.push(record.clone());
            if closing {
                return Ok(records);
            }
        }
    }

    Err(TransferError::Incomplete)
}
