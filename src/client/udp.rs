use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use futures::{SinkExt as _, StreamExt as _};
use hickory_proto::op::Message;
use tokio::net::UdpSocket;
use tokio_util::udp::UdpFramed;
use tracing::{debug, warn};

use crate::codec::DnsCodec;
use crate::error::TransportError;

/// Sends one datagram and waits for the matching reply.
///
/// Datagrams from other peers, or carrying another id, are ignored.
pub(super) async fn exchange(addr: SocketAddr, message: Message) -> Result<Message, TransportError> {
    let bind = if addr.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = UdpSocket::bind(bind).await?;
    let mut framed = UdpFramed::new(socket, DnsCodec::<Message, Message>::udp());

    let id = message.id();
    framed.send((message, addr)).await?;

    loop {
        let (response, from) = framed.next().await.ok_or(TransportError::Closed)??;
        if from != addr || response.id() != id {
            debug!(%from, id = response.id(), "ignoring unexpected datagram");
            continue;
        }
        if response.truncated() {
            warn!("response was truncated, consider using TCP");
        }
        return Ok(response);
    }
}
