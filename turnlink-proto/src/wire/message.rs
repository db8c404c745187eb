use super::{
    MAGIC_COOKIE, STUN_HEADER_LEN, TRAN_ID_LENGTH, Transport,
    attribute::{Attribute, AttributeType, ResolvedAttribute},
    integrity::IntegrityKey,
    method::{MessageClass, MessageType},
    util,
};
use crate::{
    coding::{CodingError, Decode, Encode},
    error::ProtoError,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::SocketAddr;
use tracing::Span;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId([u8; TRAN_ID_LENGTH]);

impl TransactionId {
    pub fn new() -> Self {
        TransactionId(util::generate_tid())
    }

    pub fn as_bytes(&self) -> &[u8; TRAN_ID_LENGTH] {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[u8; TRAN_ID_LENGTH]> for TransactionId {
    fn from(value: [u8; TRAN_ID_LENGTH]) -> Self {
        TransactionId(value)
    }
}

impl std::fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex_string = self.0.iter().fold(String::new(), |mut str, val| {
            str = str + &format!("{val:02x}");
            str
        });
        write!(f, "{hex_string}")
    }
}

impl Decode for TransactionId {
    type Output = Self;
    fn decode<B: Buf>(buffer: &mut B) -> Result<Self::Output, ProtoError> {
        if buffer.remaining() < TRAN_ID_LENGTH {
            return Err(ProtoError::NeedMoreData);
        }
        let mut tid = [0u8; TRAN_ID_LENGTH];
        buffer.copy_to_slice(&mut tid);
        Ok(TransactionId(tid))
    }
}

impl Encode for TransactionId {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<(), ProtoError> {
        buffer.put_slice(&self.0);
        Ok(())
    }
}

#[derive(Debug)]
pub struct Cookie(u32);

impl Cookie {
    pub const MAGIC: Cookie = Cookie(MAGIC_COOKIE);
}

impl Encode for Cookie {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<(), ProtoError> {
        buffer.put_u32(self.0);
        Ok(())
    }
}

impl Decode for Cookie {
    type Output = Cookie;
    fn decode<B: Buf>(buffer: &mut B) -> Result<Self::Output, ProtoError> {
        let val = buffer.try_get_u32().map_err(|_| ProtoError::NeedMoreData)?;
        match val {
            MAGIC_COOKIE => Ok(Cookie(val)),
            _ => Err(CodingError::InvalidCookie(val))?,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub typ: MessageType,
    /// Length of the body, not including the 20 byte header.
    pub length: u16,
    pub transaction_id: TransactionId,
}

impl MessageHeader {
    pub fn cookie(&self) -> u32 {
        MAGIC_COOKIE
    }

    pub(crate) fn encode_with_length<B: BufMut>(&self, length: u16, buffer: &mut B) -> Result<(), ProtoError> {
        self.typ.encode(buffer)?;
        length.encode(buffer)?;
        Cookie::MAGIC.encode(buffer)?;
        self.transaction_id.encode(buffer)
    }
}

/// A STUN message. `header.length` always matches the serialized attribute section in `body`.
#[derive(Debug, Clone)]
pub struct Message {
    pub(crate) header: MessageHeader,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) body: Bytes,
    pub(crate) integrity: bool,
}

impl Message {
    pub fn new(typ: MessageType, transaction_id: TransactionId, attributes: Vec<Attribute>) -> Result<Self, ProtoError> {
        let mut body = BytesMut::new();
        for attr in attributes.iter() {
            attr.encode(&mut body)?;
        }

        let length = u16::try_from(body.len()).map_err(|_| CodingError::MessageTooLarge(body.len()))?;
        let integrity = attributes.iter().any(|attr| attr.is(AttributeType::MessageIntegrity));

        Ok(Self {
            header: MessageHeader {
                typ,
                length,
                transaction_id,
            },
            attributes,
            body: body.freeze(),
            integrity,
        })
    }

    pub fn builder(typ: MessageType) -> MessageBuilder {
        MessageBuilder::new(typ, TransactionId::new())
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn typ(&self) -> MessageType {
        self.header.typ
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.header.transaction_id
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Serialized attribute section, including per-attribute padding.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn has_integrity(&self) -> bool {
        self.integrity
    }

    pub fn attribute(&self, kind: AttributeType) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.is(kind))
    }

    pub fn resolve(&self, kind: AttributeType) -> Result<ResolvedAttribute, ProtoError> {
        self.attribute(kind)
            .ok_or(ProtoError::AttrMissing(kind))?
            .resolve(&self.header.transaction_id)
    }

    pub fn span(&self) -> Span {
        let typ = self.header.typ;
        let tid = self.header.transaction_id;
        match typ.class() {
            MessageClass::Indication => tracing::trace_span!("StunMessage", ?typ, ?tid),
            _ => tracing::info_span!("StunMessage", ?typ, ?tid),
        }
    }
}

impl Decode for Message {
    type Output = Self;
    fn decode<B: Buf>(buffer: &mut B) -> Result<Self::Output, ProtoError> {
        // Expects the header to be contiguous. Nothing is consumed until the whole packet is available.
        let header = buffer.chunk();
        if header.len() < STUN_HEADER_LEN {
            return Err(ProtoError::NeedMoreData);
        }

        let length = u16::from_be_bytes([header[2], header[3]]) as usize;
        if buffer.remaining() < STUN_HEADER_LEN + length {
            return Err(ProtoError::NeedMoreData);
        }

        let mut packet = buffer.copy_to_bytes(STUN_HEADER_LEN + length);

        // Order of decoding is important.
        let typ = MessageType::decode(&mut packet)?;
        let length = u16::decode(&mut packet)?;
        let _cookie = Cookie::decode(&mut packet)?;
        let transaction_id = TransactionId::decode(&mut packet)?;

        let body = packet.clone();
        let mut attributes = Vec::new();
        while packet.has_remaining() {
            attributes.push(Attribute::decode(&mut packet)?);
        }

        let integrity = attributes.iter().any(|attr| attr.is(AttributeType::MessageIntegrity));

        Ok(Self {
            header: MessageHeader {
                typ,
                length,
                transaction_id,
            },
            attributes,
            body,
            integrity,
        })
    }
}

impl Encode for Message {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<(), ProtoError> {
        self.header.encode_with_length(self.header.length, buffer)?;
        buffer.put_slice(&self.body);
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum PendingAttribute {
    Typed(ResolvedAttribute),
    Raw(Attribute),
}

/// Collects attributes for an unsigned message. Typed attributes are encoded against the
/// builder's transaction id when the message is built.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    typ: MessageType,
    transaction_id: TransactionId,
    attributes: Vec<PendingAttribute>,
}

impl MessageBuilder {
    pub fn new(typ: MessageType, transaction_id: TransactionId) -> Self {
        Self {
            typ,
            transaction_id,
            attributes: Vec::new(),
        }
    }

    pub fn binding_request() -> Self {
        Message::builder(MessageType::BindingRequest)
    }

    pub fn allocate_request() -> Self {
        Message::builder(MessageType::AllocateRequest).attribute(ResolvedAttribute::RequestedTransport(Transport::Udp))
    }

    pub fn create_permission(peer_addr: SocketAddr) -> Self {
        Message::builder(MessageType::CreatePermission).attribute(ResolvedAttribute::XorPeerAddress(peer_addr))
    }

    pub fn send_indication(peer_addr: SocketAddr, data: Bytes) -> Self {
        Message::builder(MessageType::SendIndication)
            .attribute(ResolvedAttribute::XorPeerAddress(peer_addr))
            .attribute(ResolvedAttribute::Data(data))
    }

    pub fn typ(&self) -> MessageType {
        self.typ
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn attribute(mut self, attr: ResolvedAttribute) -> Self {
        self.attributes.push(PendingAttribute::Typed(attr));
        self
    }

    pub fn raw_attribute(mut self, attr: Attribute) -> Self {
        self.attributes.push(PendingAttribute::Raw(attr));
        self
    }

    pub fn build(self) -> Result<Message, ProtoError> {
        let tid = self.transaction_id;
        let attributes = self
            .attributes
            .into_iter()
            .map(|attr| match attr {
                PendingAttribute::Typed(attr) => attr.encode(&tid),
                PendingAttribute::Raw(attr) => Ok(attr),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Message::new(self.typ, tid, attributes)
    }

    pub fn build_with_integrity(self, key: &IntegrityKey) -> Result<Message, ProtoError> {
        let mut message = self.build()?;
        message.attach_integrity(key)?;
        Ok(message)
    }
}
