pub mod coding;
pub mod error;
pub mod wire;

pub use error::ProtoError;
pub use wire::{
    AddressFamily, ChannelNumber, Transport, xor_address,
    attribute::{Attribute, AttributeType, ResolvedAttribute},
    integrity::{Credential, IntegrityKey},
    message::{Message, MessageBuilder, MessageHeader, TransactionId},
    method::{MessageClass, MessageType},
};
