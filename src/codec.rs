//! Message framing for `tokio_util` transports.

use std::fmt;
use std::marker::PhantomData;

use bytes::{Buf, BufMut, BytesMut};
use hickory_proto::ProtoError;
use hickory_proto::op::{Edns, Header, Message};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncodable, BinEncoder};
use hickory_proto::udp::MAX_RECEIVE_BUFFER_SIZE;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{error, trace};

/// How messages are delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Stream transports: each message follows a two byte big-endian length (RFC 1035 4.2.2).
    LengthPrefixed,
    /// Datagram transports: one message per datagram.
    Datagram,
}

/// Encodes `Req` and decodes `Res` DNS messages.
pub struct DnsCodec<Req, Res> {
    framing: Framing,
    max_size: u16,
    marker: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res> fmt::Debug for DnsCodec<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsCodec")
            .field("framing", &self.framing)
            .field("max_size", &self.max_size)
            .finish()
    }
}

impl<Req, Res> Clone for DnsCodec<Req, Res> {
    fn clone(&self) -> Self {
        Self::new(self.framing, self.max_size)
    }
}

impl<Req, Res> DnsCodec<Req, Res> {
    pub fn tcp() -> Self {
        Self::new(Framing::LengthPrefixed, u16::MAX)
    }

    pub fn udp() -> Self {
        Self::new(Framing::Datagram, MAX_RECEIVE_BUFFER_SIZE as u16)
    }

    pub fn new(framing: Framing, max_size: u16) -> Self {
        DnsCodec {
            framing,
            max_size,
            marker: PhantomData,
        }
    }

    /// Splits the next complete message off `src`, if one has arrived.
    fn next_frame(&self, src: &mut BytesMut) -> Option<BytesMut> {
        match self.framing {
            Framing::Datagram => (!src.is_empty()).then(|| src.split()),
            Framing::LengthPrefixed => {
                let prefix = src.get(..2)?;
                let length = usize::from(u16::from_be_bytes([prefix[0], prefix[1]]));
                if src.len() < length + 2 {
                    src.reserve(length + 2 - src.len());
                    return None;
                }
                src.advance(2);
                Some(src.split_to(length))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame was consumed but could not be parsed.
    #[error("dropping undecodable message of {1} bytes")]
    DropMessage(#[source] ProtoError, usize),

    #[error("cannot encode message: {0}")]
    Protocol(#[source] ProtoError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

impl<Req, Res> Decoder for DnsCodec<Req, Res>
where
    Res: for<'a> BinDecodable<'a>,
{
    type Item = Res;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = self.next_frame(src) else {
            return Ok(None);
        };
        trace!(len = frame.len(), "decoding message");

        let mut decoder = BinDecoder::new(&frame);
        Res::read(&mut decoder)
            .map(Some)
            .map_err(|error| CodecError::DropMessage(error, frame.len()))
    }
}

/// The parts of a message the encoder inspects.
pub trait DnsMessage {
    fn header(&self) -> &Header;
    fn extensions(&self) -> Option<&Edns>;
}

impl DnsMessage for Message {
    fn header(&self) -> &Header {
        self.header()
    }

    fn extensions(&self) -> Option<&Edns> {
        self.extensions().as_ref()
    }
}

impl<Req, Res> Encoder<Req> for DnsCodec<Req, Res>
where
    Req: DnsMessage + BinEncodable,
{
    type Error = CodecError;

    fn encode(&mut self, message: Req, dst: &mut BytesMut) -> Result<(), Self::Error> {
        trace!(
            id = message.header().id(),
            op_code = ?message.header().op_code(),
            "encoding message",
        );

        // a datagram may not exceed what the peer advertised
        let max_size = match (self.framing, message.extensions()) {
            (Framing::Datagram, Some(edns)) => edns.max_payload().min(self.max_size),
            _ => self.max_size,
        };

        let mut buffer = Vec::with_capacity(512);
        let emitted = {
            let mut encoder = BinEncoder::new(&mut buffer);
            encoder.set_max_size(max_size);
            message.emit(&mut encoder)
        };
        emitted.map_err(|error| {
            error!(%error, "failed to encode message");
            CodecError::Protocol(error)
        })?;

        if self.framing == Framing::LengthPrefixed {
            let length = u16::try_from(buffer.len()).map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "message exceeds 65535 bytes")
            })?;
            dst.reserve(buffer.len() + 2);
            dst.put_u16(length);
        } else {
            dst.reserve(buffer.len());
        }
        dst.put_slice(&buffer);
        Ok(())
    }
}
