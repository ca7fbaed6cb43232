#![allow(unused)]

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, Once};

use futures::{SinkExt as _, StreamExt as _};
use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::{Name, Record, RecordType};
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::codec::Framed;
use tokio_util::udp::UdpFramed;

use rfc2136_provider::codec::DnsCodec;
use rfc2136_provider::rr::{Endpoint, parse_fqdn};
use rfc2136_provider::update::Change;
use rfc2136_provider::{
    Rfc2136Error, TransferError, TransferRequest, Transport, TransportError, UpdateRequest,
};

/// Registers a global default tracing subscriber when called for the first time. This is intended
/// for use in tests.
pub fn subscribe() {
    static INSTALL_TRACING_SUBSCRIBER: Once = Once::new();
    INSTALL_TRACING_SUBSCRIBER.call_once(|| {
        let subscriber = tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).unwrap();
    });
}

pub fn name(s: &str) -> Name {
    parse_fqdn(s).unwrap()
}

/// A transport that never touches the network.
///
/// Updates are recorded in the order they were sent. Transfers answer from
/// the records registered per zone.
#[derive(Default)]
pub struct StubTransport {
    sent: Mutex<Vec<UpdateRequest>>,
    transfers: Mutex<Vec<Name>>,
    zones: Mutex<BTreeMap<Name, Result<Vec<Record>, ResponseCode>>>,
    reject_after: Option<usize>,
    hang: bool,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `count` updates, then rejects the rest with REFUSED.
    pub fn reject_after(mut self, count: usize) -> Self {
        self.reject_after = Some(count);
        self
    }

    /// Never completes a request.
    pub fn hanging() -> Self {
        StubTransport {
            hang: true,
            ..Default::default()
        }
    }

    pub fn with_zone(self, zone: &str, records: Vec<Record>) -> Self {
        self.zones.lock().unwrap().insert(name(zone), Ok(records));
        self
    }

    pub fn with_refused_zone(self, zone: &str) -> Self {
        self.zones
            .lock()
            .unwrap()
            .insert(name(zone), Err(ResponseCode::Refused));
        self
    }

    pub fn sent(&self) -> Vec<UpdateRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn transfers(&self) -> Vec<Name> {
        self.transfers.lock().unwrap().clone()
    }

    /// Every record sent, with its direction, in wire order.
    pub fn changes(&self) -> Vec<(bool, Record)> {
        self.sent()
            .iter()
            .flat_map(|request| {
                request
                    .transaction()
                    .changes()
                    .map(|change| (change.is_deletion(), change.record().clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn deletions(&self) -> Vec<Record> {
        self.changes()
            .into_iter()
            .filter_map(|(deletion, record)| deletion.then_some(record))
            .collect()
    }

    pub fn insertions(&self) -> Vec<Record> {
        self.changes()
            .into_iter()
            .filter_map(|(deletion, record)| (!deletion).then_some(record))
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: UpdateRequest) -> Result<(), Rfc2136Error> {
        if self.hang {
            futures::future::pending::<()>().await;
        }

        let mut sent = self.sent.lock().unwrap();
        if self.reject_after.is_some_and(|limit| sent.len() >= limit) {
            return Err(Rfc2136Error::ServerRejected {
                zone: request.zone().apex().clone(),
                code: ResponseCode::Refused,
            });
        }
        sent.push(request);
        Ok(())
    }

    async fn transfer(&self, request: TransferRequest) -> Result<Vec<Record>, Rfc2136Error> {
        if self.hang {
            futures::future::pending::<()>().await;
        }

        let zone = request.zone().apex().clone();
        self.transfers.lock().unwrap().push(zone.clone());
        match self.zones.lock().unwrap().get(&zone).cloned() {
            Some(Ok(records)) => Ok(records),
            Some(Err(code)) => Err(Rfc2136Error::Transfer {
                zone,
                source: TransferError::Refused(code),
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// Renders a record the way the server would see it in a zone file.
pub fn describe(record: &Record) -> String {
    format!(
        "{} {} {} {}",
        record.name(),
        record.ttl(),
        record.record_type(),
        record.data()
    )
}

/// Requests received by a fake server.
pub type Received = Arc<Mutex<Vec<Message>>>;

/// Builds the response skeleton for `request`.
pub fn reply(request: &Message, code: ResponseCode) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_response_code(code);
    response.add_queries(request.queries().to_vec());
    response
}

/// Serves DNS over TCP on a loopback port. Each request is answered with
/// whatever messages `handler` returns, then the connection is closed.
pub async fn spawn_tcp<F>(handler: F) -> (SocketAddr, Received)
where
    F: Fn(&Message) -> Vec<Message> + Send + Sync + 'static,
{
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Received::default();
    let handler = Arc::new(handler);

    let log = received.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = handler.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let mut framed = Framed::new(stream, DnsCodec::<Message, Message>::tcp());
                if let Some(Ok(request)) = framed.next().await {
                    log.lock().unwrap().push(request.clone());
                    for response in handler(&request) {
                        if framed.send(response).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    (addr, received)
}

/// Serves DNS over UDP on a loopback port, one response per datagram.
pub async fn spawn_udp<F>(handler: F) -> (SocketAddr, Received)
where
    F: Fn(&Message) -> Message + Send + Sync + 'static,
{
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = socket.local_addr().unwrap();
    let received = Received::default();

    let log = received.clone();
    tokio::spawn(async move {
        let mut framed = UdpFramed::new(socket, DnsCodec::<Message, Message>::udp());
        while let Some(Ok((request, peer))) = framed.next().await {
            log.lock().unwrap().push(request.clone());
            let response = handler(&request);
            if framed.send((response, peer)).await.is_err() {
                return;
            }
        }
    });

    (addr, received)
}
