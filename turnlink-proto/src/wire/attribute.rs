use super::{
    AddressFamily, ChannelNumber, MAX_TEXT_BYTES, MAX_TEXT_CHARS, MAX_USERNAME_BYTES, MI_DIGEST_LENGTH, Transport,
    message::TransactionId, util,
};
use crate::{
    coding::{CodingError, Decode, Encode},
    compute_padding,
    error::ProtoError,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::SocketAddr;

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum AttributeType {
    // STUN
    MappedAddress,
    Username,
    MessageIntegrity,
    ErrorCode,
    UnknownAttributes,
    Realm,
    Nonce,
    XorMappedAddress,
    Software,
    AlternateServer,
    Fingerprint,
    // TURN
    ChannelNumber,
    Lifetime,
    XorPeerAddress,
    Data,
    XorRelayedAddress,
    RequestedAddressFamily,
    EvenPort,
    RequestedTransport,
    DontFragment,
    ReservationToken,
    AdditionalAddressFamily,
    AddressErrorCode,
    Icmp,
}

impl TryFrom<u16> for AttributeType {
    type Error = ProtoError;
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            0x0001 => Self::MappedAddress,
            0x0006 => Self::Username,
            0x0008 => Self::MessageIntegrity,
            0x0009 => Self::ErrorCode,
            0x000A => Self::UnknownAttributes,
            0x0014 => Self::Realm,
            0x0015 => Self::Nonce,
            0x0020 => Self::XorMappedAddress,
            0x8022 => Self::Software,
            0x8023 => Self::AlternateServer,
            0x8028 => Self::Fingerprint,
            0x000C => Self::ChannelNumber,
            0x000D => Self::Lifetime,
            0x0012 => Self::XorPeerAddress,
            0x0013 => Self::Data,
            0x0016 => Self::XorRelayedAddress,
            0x0017 => Self::RequestedAddressFamily,
            0x0018 => Self::EvenPort,
            0x0019 => Self::RequestedTransport,
            0x001A => Self::DontFragment,
            0x0022 => Self::ReservationToken,
            0x8000 => Self::AdditionalAddressFamily,
            0x8001 => Self::AddressErrorCode,
            0x8004 => Self::Icmp,
            x => return Err(ProtoError::UnknownAttributeType(x)),
        })
    }
}

impl From<AttributeType> for u16 {
    fn from(value: AttributeType) -> Self {
        match value {
            AttributeType::MappedAddress => 0x0001,
            AttributeType::Username => 0x0006,
            AttributeType::MessageIntegrity => 0x0008,
            AttributeType::ErrorCode => 0x0009,
            AttributeType::UnknownAttributes => 0x000A,
            AttributeType::Realm => 0x0014,
            AttributeType::Nonce => 0x0015,
            AttributeType::XorMappedAddress => 0x0020,
            AttributeType::Software => 0x8022,
            AttributeType::AlternateServer => 0x8023,
            AttributeType::Fingerprint => 0x8028,
            AttributeType::ChannelNumber => 0x000C,
            AttributeType::Lifetime => 0x000D,
            AttributeType::XorPeerAddress => 0x0012,
            AttributeType::Data => 0x0013,
            AttributeType::XorRelayedAddress => 0x0016,
            AttributeType::RequestedAddressFamily => 0x0017,
            AttributeType::EvenPort => 0x0018,
            AttributeType::RequestedTransport => 0x0019,
            AttributeType::DontFragment => 0x001A,
            AttributeType::ReservationToken => 0x0022,
            AttributeType::AdditionalAddressFamily => 0x8000,
            AttributeType::AddressErrorCode => 0x8001,
            AttributeType::Icmp => 0x8004,
        }
    }
}

/// Raw attribute as it appears on the wire. `typ` may not map to a known [`AttributeType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub typ: u16,
    pub value: Bytes,
}

impl Attribute {
    pub fn new(typ: AttributeType, value: Bytes) -> Self {
        Self { typ: typ.into(), value }
    }

    pub fn kind(&self) -> Option<AttributeType> {
        AttributeType::try_from(self.typ).ok()
    }

    pub fn is(&self, kind: AttributeType) -> bool {
        self.typ == u16::from(kind)
    }

    // Header + value + padding
    pub fn wire_len(&self) -> usize {
        super::ATTR_HEADER_LENGTH + self.value.len() + compute_padding!(self.value.len())
    }

    pub fn resolve(&self, tid: &TransactionId) -> Result<ResolvedAttribute, ProtoError> {
        let kind = AttributeType::try_from(self.typ)?;
        ResolvedAttribute::decode_value(kind, self.value.clone(), tid)
    }
}

impl Decode for Attribute {
    type Output = Self;
    fn decode<B: Buf>(buffer: &mut B) -> Result<Self::Output, ProtoError> {
        let typ = u16::decode(buffer).map_err(|_| CodingError::TruncatedAttribute)?;
        let alen = usize::decode(buffer).map_err(|_| CodingError::TruncatedAttribute)?;

        if buffer.remaining() < alen {
            return Err(CodingError::TruncatedAttribute)?;
        }

        let value = buffer.copy_to_bytes(alen);

        let padding = compute_padding!(alen);
        if buffer.remaining() < padding {
            return Err(CodingError::MissingPadding)?;
        }
        buffer.advance(padding);

        Ok(Self { typ, value })
    }
}

impl Encode for Attribute {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<(), ProtoError> {
        self.typ.encode(buffer)?;
        self.value.len().encode(buffer)?;
        buffer.put_slice(&self.value);
        buffer.put_bytes(0x00, compute_padding!(self.value.len()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAttribute {
    MappedAddress(SocketAddr),
    /// Must be the same address family as the server that sent it.
    AlternateServer(SocketAddr),
    XorMappedAddress(SocketAddr),
    XorPeerAddress(SocketAddr),
    XorRelayedAddress(SocketAddr),
    /// Encode only. Decoding a USERNAME is unsupported.
    Username(String),
    /// At most 128 characters and 763 bytes, as are `Nonce` and `Software`.
    Realm(String),
    Nonce(String),
    Software(String),
    MessageIntegrity([u8; MI_DIGEST_LENGTH]),
    ChannelNumber(ChannelNumber),
    /// Allocation lifetime in seconds.
    Lifetime(u32),
    Data(Bytes),
    RequestedAddressFamily(AddressFamily),
    EvenPort(bool),
    DontFragment,
    /// Encode only.
    RequestedTransport(Transport),
}

impl ResolvedAttribute {
    pub fn kind(&self) -> AttributeType {
        match self {
            Self::MappedAddress(_) => AttributeType::MappedAddress,
            Self::AlternateServer(_) => AttributeType::AlternateServer,
            Self::XorMappedAddress(_) => AttributeType::XorMappedAddress,
            Self::XorPeerAddress(_) => AttributeType::XorPeerAddress,
            Self::XorRelayedAddress(_) => AttributeType::XorRelayedAddress,
            Self::Username(_) => AttributeType::Username,
            Self::Realm(_) => AttributeType::Realm,
            Self::Nonce(_) => AttributeType::Nonce,
            Self::Software(_) => AttributeType::Software,
            Self::MessageIntegrity(_) => AttributeType::MessageIntegrity,
            Self::ChannelNumber(_) => AttributeType::ChannelNumber,
            Self::Lifetime(_) => AttributeType::Lifetime,
            Self::Data(_) => AttributeType::Data,
            Self::RequestedAddressFamily(_) => AttributeType::RequestedAddressFamily,
            Self::EvenPort(_) => AttributeType::EvenPort,
            Self::DontFragment => AttributeType::DontFragment,
            Self::RequestedTransport(_) => AttributeType::RequestedTransport,
        }
    }

    pub fn decode_value(kind: AttributeType, mut buffer: Bytes, tid: &TransactionId) -> Result<Self, ProtoError> {
        let invalid = ProtoError::InvalidAttributeFormat(kind);

        Ok(match kind {
            AttributeType::MappedAddress => Self::MappedAddress(util::parse_address(kind, buffer)?),
            AttributeType::AlternateServer => Self::AlternateServer(util::parse_address(kind, buffer)?),
            AttributeType::XorMappedAddress => Self::XorMappedAddress(util::parse_xor_address(kind, buffer, tid)?),
            AttributeType::XorPeerAddress => Self::XorPeerAddress(util::parse_xor_address(kind, buffer, tid)?),
            AttributeType::XorRelayedAddress => Self::XorRelayedAddress(util::parse_xor_address(kind, buffer, tid)?),
            AttributeType::Realm => Self::Realm(parse_text(kind, buffer)?),
            AttributeType::Nonce => Self::Nonce(parse_text(kind, buffer)?),
            AttributeType::Software => Self::Software(parse_text(kind, buffer)?),
            AttributeType::MessageIntegrity => {
                let digest: [u8; MI_DIGEST_LENGTH] = buffer.as_ref().try_into().map_err(|_| invalid)?;
                Self::MessageIntegrity(digest)
            }
            AttributeType::ChannelNumber => match buffer.len() {
                4 => match (buffer.get_u16(), buffer.get_u16()) {
                    (number, 0) => Self::ChannelNumber(ChannelNumber(number)),
                    _ => return Err(invalid),
                },
                _ => return Err(invalid),
            },
            AttributeType::Lifetime => match buffer.len() {
                4 => Self::Lifetime(buffer.get_u32()),
                _ => return Err(invalid),
            },
            AttributeType::Data => Self::Data(buffer),
            AttributeType::RequestedAddressFamily => match buffer.as_ref() {
                [family, 0, 0, 0] => Self::RequestedAddressFamily(AddressFamily::from_u8(*family).ok_or(invalid)?),
                _ => return Err(invalid),
            },
            AttributeType::EvenPort => match buffer.as_ref() {
                [flags] => Self::EvenPort(flags & 0b1 == 0b1),
                _ => return Err(invalid),
            },
            AttributeType::DontFragment => match buffer.is_empty() {
                true => Self::DontFragment,
                false => return Err(invalid),
            },
            // Recognised on the wire, intentionally not decoded.
            AttributeType::Username
            | AttributeType::ErrorCode
            | AttributeType::UnknownAttributes
            | AttributeType::Fingerprint
            | AttributeType::RequestedTransport
            | AttributeType::ReservationToken
            | AttributeType::AdditionalAddressFamily
            | AttributeType::AddressErrorCode
            | AttributeType::Icmp => return Err(ProtoError::UnsupportedAttribute(kind)),
        })
    }

    pub fn encode_value(&self, tid: &TransactionId) -> Result<Bytes, ProtoError> {
        let kind = self.kind();
        let mut data = BytesMut::new();

        match self {
            Self::MappedAddress(addr) | Self::AlternateServer(addr) => return Ok(util::bytes_address(*addr)),
            Self::XorMappedAddress(addr) | Self::XorPeerAddress(addr) | Self::XorRelayedAddress(addr) => {
                return Ok(util::bytes_xor_address(*addr, tid));
            }
            Self::Username(username) => match username.len() <= MAX_USERNAME_BYTES {
                true => data.put_slice(username.as_bytes()),
                false => return Err(ProtoError::InvalidAttributeFormat(kind)),
            },
            Self::Realm(text) | Self::Nonce(text) | Self::Software(text) => {
                check_text(kind, text)?;
                data.put_slice(text.as_bytes());
            }
            Self::MessageIntegrity(digest) => data.put_slice(digest),
            Self::ChannelNumber(ChannelNumber(number)) => {
                data.put_u16(*number);
                data.put_u16(0x0000);
            }
            Self::Lifetime(secs) => data.put_u32(*secs),
            Self::Data(payload) => return Ok(payload.clone()),
            Self::RequestedAddressFamily(family) => {
                data.put_u8(family.to_u8());
                data.put_bytes(0x00, 3);
            }
            Self::EvenPort(even) => data.put_u8(*even as u8),
            Self::DontFragment => (),
            Self::RequestedTransport(transport) => {
                data.put_u8(*transport as u8);
                data.put_bytes(0x00, 3);
            }
        }

        Ok(data.freeze())
    }

    pub fn encode(&self, tid: &TransactionId) -> Result<Attribute, ProtoError> {
        Ok(Attribute::new(self.kind(), self.encode_value(tid)?))
    }
}

fn check_text(kind: AttributeType, text: &str) -> Result<(), ProtoError> {
    match text.len() <= MAX_TEXT_BYTES && text.chars().count() <= MAX_TEXT_CHARS {
        true => Ok(()),
        false => Err(ProtoError::InvalidAttributeFormat(kind)),
    }
}

fn parse_text(kind: AttributeType, buffer: Bytes) -> Result<String, ProtoError> {
    if buffer.len() > MAX_TEXT_BYTES {
        return Err(ProtoError::InvalidAttributeFormat(kind));
    }

    let text = String::from_utf8(buffer.to_vec()).map_err(|_| ProtoError::InvalidAttributeFormat(kind))?;
    check_text(kind, &text)?;
    Ok(text)
}

#[cfg(test)]
mod test {
    use super::*;

    fn resolve(kind: AttributeType, value: &'static [u8]) -> Result<ResolvedAttribute, ProtoError> {
        Attribute::new(kind, Bytes::from_static(value)).resolve(&TransactionId::new())
    }

    #[test]
    fn unknown_vs_unsupported_test() {
        let tid = TransactionId::new();
        let unknown = Attribute { typ: 0x0024, value: Bytes::from_static(&[0x6e, 0x00, 0x01, 0xff]) };
        assert_eq!(unknown.kind(), None);
        assert_eq!(unknown.resolve(&tid), Err(ProtoError::UnknownAttributeType(0x0024)));

        let unsupported = [
            AttributeType::Username,
            AttributeType::ErrorCode,
            AttributeType::UnknownAttributes,
            AttributeType::Fingerprint,
            AttributeType::RequestedTransport,
            AttributeType::ReservationToken,
            AttributeType::AdditionalAddressFamily,
            AttributeType::AddressErrorCode,
            AttributeType::Icmp,
        ];

        for kind in unsupported {
            let attr = Attribute::new(kind, Bytes::from_static(&[0x11, 0x00, 0x00, 0x00]));
            assert_eq!(attr.resolve(&tid), Err(ProtoError::UnsupportedAttribute(kind)));
        }
    }

    #[test]
    fn text_bound_test() {
        // 129 characters, 258 bytes
        let text = "é".repeat(129);
        let attr = Attribute::new(AttributeType::Realm, Bytes::from(text.clone()));
        assert_eq!(
            attr.resolve(&TransactionId::new()),
            Err(ProtoError::InvalidAttributeFormat(AttributeType::Realm))
        );

        // 128 characters
        let text = "é".repeat(128);
        for kind in [AttributeType::Realm, AttributeType::Nonce, AttributeType::Software] {
            let attr = Attribute::new(kind, Bytes::from(text.clone()));
            let resolved = attr.resolve(&TransactionId::new()).unwrap();
            assert_eq!(resolved.kind(), kind);
        }

        // 764 bytes, under the character bound would not matter
        let attr = Attribute::new(AttributeType::Nonce, Bytes::from(vec![b'a'; 764]));
        assert_eq!(
            attr.resolve(&TransactionId::new()),
            Err(ProtoError::InvalidAttributeFormat(AttributeType::Nonce))
        );

        let invalid_utf8 = resolve(AttributeType::Software, &[0xff, 0xfe]);
        assert_eq!(invalid_utf8, Err(ProtoError::InvalidAttributeFormat(AttributeType::Software)));

        let too_long = ResolvedAttribute::Software("x".repeat(129)).encode(&TransactionId::new());
        assert_eq!(too_long, Err(ProtoError::InvalidAttributeFormat(AttributeType::Software)));
    }

    #[test]
    fn fixed_size_attrs_test() {
        let digest = [0xabu8; 20];
        assert_eq!(resolve(AttributeType::MessageIntegrity, &[0xab; 20]).unwrap(), ResolvedAttribute::MessageIntegrity(digest));
        assert_eq!(
            resolve(AttributeType::MessageIntegrity, &[0xab; 16]),
            Err(ProtoError::InvalidAttributeFormat(AttributeType::MessageIntegrity))
        );

        assert_eq!(
            resolve(AttributeType::ChannelNumber, &[0x40, 0x01, 0x00, 0x00]).unwrap(),
            ResolvedAttribute::ChannelNumber(ChannelNumber(0x4001))
        );
        assert_eq!(
            resolve(AttributeType::ChannelNumber, &[0x40, 0x01, 0x00, 0x01]),
            Err(ProtoError::InvalidAttributeFormat(AttributeType::ChannelNumber))
        );

        assert_eq!(resolve(AttributeType::Lifetime, &[0x00, 0x00, 0x02, 0x58]).unwrap(), ResolvedAttribute::Lifetime(600));
        assert_eq!(
            resolve(AttributeType::Lifetime, &[0x00, 0x02, 0x58]),
            Err(ProtoError::InvalidAttributeFormat(AttributeType::Lifetime))
        );

        assert_eq!(
            resolve(AttributeType::RequestedAddressFamily, &[0x02, 0x00, 0x00, 0x00]).unwrap(),
            ResolvedAttribute::RequestedAddressFamily(AddressFamily::IPv6)
        );
        assert_eq!(
            resolve(AttributeType::RequestedAddressFamily, &[0x01, 0x00, 0x01, 0x00]),
            Err(ProtoError::InvalidAttributeFormat(AttributeType::RequestedAddressFamily))
        );

        assert_eq!(resolve(AttributeType::EvenPort, &[0x80]).unwrap(), ResolvedAttribute::EvenPort(false));
        assert_eq!(resolve(AttributeType::EvenPort, &[0x01]).unwrap(), ResolvedAttribute::EvenPort(true));
        assert_eq!(resolve(AttributeType::DontFragment, &[]).unwrap(), ResolvedAttribute::DontFragment);
        assert_eq!(
            resolve(AttributeType::Data, b"hello").unwrap(),
            ResolvedAttribute::Data(Bytes::from_static(b"hello"))
        );
    }

    #[test]
    fn attribute_decode_test() {
        // Realm "rtc.com" with one byte of padding
        let mut buffer = Bytes::from_static(&[0x00, 0x14, 0x00, 0x07, b'r', b't', b'c', b'.', b'c', b'o', b'm', 0x00]);
        let attr = Attribute::decode(&mut buffer).unwrap();
        assert_eq!(attr.kind(), Some(AttributeType::Realm));
        assert_eq!(attr.value.as_ref(), b"rtc.com");
        assert_eq!(attr.wire_len(), 12);
        assert!(!buffer.has_remaining());

        let mut buffer = Bytes::from_static(&[0x00, 0x14, 0x00, 0x07, b'r', b't', b'c', b'.', b'c', b'o', b'm']);
        assert_eq!(Attribute::decode(&mut buffer), Err(CodingError::MissingPadding.into()));

        let mut buffer = Bytes::from_static(&[0x00, 0x14, 0x00, 0x07, b'r', b't']);
        assert_eq!(Attribute::decode(&mut buffer), Err(CodingError::TruncatedAttribute.into()));

        let mut buffer = Bytes::from_static(&[0x00, 0x14, 0x00]);
        assert_eq!(Attribute::decode(&mut buffer), Err(CodingError::TruncatedAttribute.into()));
    }

    #[test]
    fn typed_encode_test() {
        let tid = TransactionId::new();
        let attrs = [
            ResolvedAttribute::XorPeerAddress("198.51.100.9:60000".parse().unwrap()),
            ResolvedAttribute::MappedAddress("[2001:db8::1]:3478".parse().unwrap()),
            ResolvedAttribute::Realm("example.org".into()),
            ResolvedAttribute::ChannelNumber(ChannelNumber(0x4abc)),
            ResolvedAttribute::Lifetime(3600),
            ResolvedAttribute::RequestedAddressFamily(AddressFamily::IPv4),
            ResolvedAttribute::EvenPort(true),
            ResolvedAttribute::DontFragment,
            ResolvedAttribute::Data(Bytes::from_static(b"payload")),
        ];

        for attr in attrs {
            assert_eq!(attr.encode(&tid).unwrap().resolve(&tid).unwrap(), attr);
        }

        let transport = ResolvedAttribute::RequestedTransport(Transport::Udp).encode(&tid).unwrap();
        assert_eq!(transport.value.as_ref(), &[17, 0, 0, 0]);
    }
}
