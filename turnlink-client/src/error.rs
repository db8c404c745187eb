use std::{io, sync::Arc};
use thiserror::Error;
use turnlink_proto::{MessageType, ProtoError, TransactionId};

#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("Proto Error {0}")]
    Proto(#[from] ProtoError),

    #[error("Query Failed")]
    QueryFailed,

    #[error("Invalid Message Class {0:?}")]
    InvalidMessageClass(MessageType),

    #[error("Allocation Failure")]
    AllocationFailure,

    #[error("Create Permission Failure")]
    CreatePermissionFailure,

    #[error("Duplicate Transaction {0:?}")]
    DuplicateTransaction(TransactionId),

    // Shared so that a single failure can be handed to every pending caller
    #[error("Transport Error {0}")]
    Transport(Arc<io::Error>),

    #[error("Transport Closed")]
    TransportClosed,

    #[error("Client Closed")]
    Closed,
}

impl From<io::Error> for ClientError {
    fn from(value: io::Error) -> Self {
        ClientError::Transport(Arc::new(value))
    }
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Operation Unsupported")]
    OperationUnsupported,

    #[error("Not Connected")]
    NotConnected,

    #[error("Channel Closed")]
    Closed,

    #[error("IO Error {0}")]
    Io(#[from] io::Error),

    #[error("Proto Error {0}")]
    Proto(#[from] ProtoError),
}
