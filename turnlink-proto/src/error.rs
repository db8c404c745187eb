use crate::{coding::CodingError, wire::attribute::AttributeType};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ProtoError {
    #[error("Malformed Packet {0}")]
    MalformedPacket(#[from] CodingError),

    #[error("Need More Data")]
    NeedMoreData,

    #[error("Invalid Attribute Format {0:?}")]
    InvalidAttributeFormat(AttributeType),

    #[error("Unsupported Attribute {0:?}")]
    UnsupportedAttribute(AttributeType),

    #[error("Unknown Attribute Type {0:#06x}")]
    UnknownAttributeType(u16),

    #[error("Attribute Missing {0:?}")]
    AttrMissing(AttributeType),

    #[error("Message Integrity Already Applied")]
    IntegrityAlreadyApplied,

    #[error("MI Error {0}")]
    MessageIntegrityFailed(String),
}
