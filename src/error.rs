use std::io;

use hickory_proto::ProtoError;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{Name, RecordType};

use crate::codec::CodecError;

/// Errors raised while publishing or reading records.
#[derive(Debug, thiserror::Error)]
pub enum Rfc2136Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("{name} does not belong to any configured zone")]
    NotOwned { name: Name },

    #[error("authentication configuration: {0}")]
    AuthConfiguration(String),

    #[error("invalid DNS name {name:?}: {source}")]
    InvalidName {
        name: String,
        #[source]
        source: ProtoError,
    },

    #[error("update pair {index} does not match: {old} -> {new}")]
    UnpairedUpdate {
        index: usize,
        old: String,
        new: String,
    },

    #[error("{name} {record_type}: cannot encode target {target:?}")]
    InvalidTarget {
        name: Name,
        record_type: RecordType,
        target: String,
    },

    #[error("update for zone {zone} contains out-of-zone record {name}")]
    ZoneMismatch { zone: Name, name: Name },

    #[error("server rejected update for zone {zone}: {code}")]
    ServerRejected { zone: Name, code: ResponseCode },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("zone transfer of {zone} failed: {source}")]
    Transfer {
        zone: Name,
        #[source]
        source: TransferError,
    },
}

/// Failures talking to the name server.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("dns protocol error: {0}")]
    Protocol(#[from] ProtoError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("timed out waiting for the server")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("Connection closed")]
    Closed,

    #[error("response id {actual} does not match request id {expected}")]
    Mismatched { expected: u16, actual: u16 },
}

/// Why a zone transfer produced no records.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("server refused the transfer: {0}")]
    Refused(ResponseCode),

    #[error("transfer ended before the closing SOA record")]
    Incomplete,

    #[error("transfer did not start with an SOA record")]
    MissingSoa,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<CodecError> for TransportError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::IO(err) => TransportError::Io(err),
            CodecError::DropMessage(proto_error, _) => TransportError::Protocol(proto_error),
            CodecError::Protocol(proto_error) => TransportError::Protocol(proto_error),
        }
    }
}

impl From<CodecError> for TransferError {
    fn from(err: CodecError) -> Self {
        TransferError::Transport(err.into())
    }
}
