use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{
    AddressFamily, MAGIC_COOKIE, MAGIC_COOKIE_MASK, TRAN_ID_LENGTH, attribute::AttributeType, message::TransactionId,
};
use crate::error::ProtoError;

pub(crate) fn generate_tid() -> [u8; TRAN_ID_LENGTH] {
    rand::random()
}

/// Applies the XOR-MAPPED-ADDRESS transform. The transform is its own inverse.
pub fn xor_address(addr: SocketAddr, tid: &TransactionId) -> SocketAddr {
    let port = addr.port() ^ MAGIC_COOKIE_MASK;
    match addr.ip() {
        IpAddr::V4(ip) => SocketAddr::new(IpAddr::V4(Ipv4Addr::from_bits(ip.to_bits() ^ MAGIC_COOKIE)), port),
        IpAddr::V6(ip) => {
            let mut mask = [0u8; 16];
            mask[..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
            mask[4..16].copy_from_slice(tid.as_bytes());

            let ip = ip.to_bits() ^ u128::from_be_bytes(mask);
            SocketAddr::new(IpAddr::V6(Ipv6Addr::from_bits(ip)), port)
        }
    }
}

//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |0 0 0 0 0 0 0 0|    Family     |           Port                |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                 Address (32 bits or 128 bits)                 |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
pub(crate) fn parse_address(kind: AttributeType, data: Bytes) -> Result<SocketAddr, ProtoError> {
    let mut buffer = Bytes::clone(&data);
    let invalid = ProtoError::InvalidAttributeFormat(kind);

    if buffer.remaining() < 4 || buffer.get_u8() != 0x00 {
        return Err(invalid);
    }

    let family = AddressFamily::from_u8(buffer.get_u8()).ok_or(invalid.clone())?;
    let port = buffer.get_u16();

    if buffer.remaining() != family.address_len() {
        return Err(invalid);
    }

    let ip = match family {
        AddressFamily::IPv4 => IpAddr::V4(Ipv4Addr::from_bits(buffer.get_u32())),
        AddressFamily::IPv6 => IpAddr::V6(Ipv6Addr::from_bits(buffer.get_u128())),
    };

    Ok(SocketAddr::new(ip, port))
}

pub(crate) fn parse_xor_address(kind: AttributeType, data: Bytes, tid: &TransactionId) -> Result<SocketAddr, ProtoError> {
    Ok(xor_address(parse_address(kind, data)?, tid))
}

pub(crate) fn bytes_address(addr: SocketAddr) -> Bytes {
    let mut data = BytesMut::new();
    data.put_u8(0x00);

    match addr.ip() {
        IpAddr::V4(ip) => {
            data.put_u8(AddressFamily::IPv4.to_u8());
            data.put_u16(addr.port());
            data.put_u32(ip.to_bits());
        }
        IpAddr::V6(ip) => {
            data.put_u8(AddressFamily::IPv6.to_u8());
            data.put_u16(addr.port());
            data.put_u128(ip.to_bits());
        }
    };

    data.freeze()
}

pub(crate) fn bytes_xor_address(addr: SocketAddr, tid: &TransactionId) -> Bytes {
    bytes_address(xor_address(addr, tid))
}

#[cfg(test)]
mod test {
    use super::*;

    // 103.148.33.185 - 54110
    const XOR_ADDRESS: Bytes = Bytes::from_static(&[0x00, 0x01, 0xf2, 0x4c, 0x46, 0x86, 0x85, 0xfb]);

    // RFC 5769 sample transaction id
    const TID: [u8; 12] = [0xb7, 0xe7, 0xa7, 0x01, 0xbc, 0x34, 0xd6, 0x86, 0xfa, 0x87, 0xdf, 0xae];

    #[test]
    fn xor_addr_test() {
        let actual = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(103, 148, 33, 185)), 54110);
        let result = parse_xor_address(AttributeType::XorPeerAddress, XOR_ADDRESS, &TransactionId::from(TID)).unwrap();
        assert_eq!(actual, result);
    }

    #[test]
    fn xor_addr_v6_test() {
        let tid = TransactionId::from(TID);
        let addr: SocketAddr = "[2001:db8:1234:5678:11:2233:4455:6677]:32853".parse().unwrap();
        let expected = hex::decode("0002a1470113a9faa5d3f179bc25f4b5bed2b9d9").unwrap();

        assert_eq!(bytes_xor_address(addr, &tid).as_ref(), expected.as_slice());
        assert_eq!(parse_xor_address(AttributeType::XorMappedAddress, Bytes::from(expected), &tid).unwrap(), addr);
    }

    #[test]
    fn xor_involution_test() {
        let tid = TransactionId::new();
        for addr in ["203.0.113.5:54321", "0.0.0.0:0", "[::1]:3478", "[fe80::1:2:3:4]:65535"] {
            let addr: SocketAddr = addr.parse().unwrap();
            assert_eq!(xor_address(xor_address(addr, &tid), &tid), addr);
        }
    }

    #[test]
    fn address_format_test() {
        let kind = AttributeType::MappedAddress;
        // Non-zero reserved byte
        let data = Bytes::from_static(&[0x01, 0x01, 0x00, 0x50, 0x7f, 0x00, 0x00, 0x01]);
        assert_eq!(parse_address(kind, data), Err(ProtoError::InvalidAttributeFormat(kind)));
        // IPv6 family with an IPv4 sized address
        let data = Bytes::from_static(&[0x00, 0x02, 0x00, 0x50, 0x7f, 0x00, 0x00, 0x01]);
        assert_eq!(parse_address(kind, data), Err(ProtoError::InvalidAttributeFormat(kind)));
        // Trailing byte
        let data = Bytes::from_static(&[0x00, 0x01, 0x00, 0x50, 0x7f, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(parse_address(kind, data), Err(ProtoError::InvalidAttributeFormat(kind)));
        // Unknown family
        let data = Bytes::from_static(&[0x00, 0x03, 0x00, 0x50, 0x7f, 0x00, 0x00, 0x01]);
        assert_eq!(parse_address(kind, data), Err(ProtoError::InvalidAttributeFormat(kind)));

        let data = Bytes::from_static(&[0x00, 0x01, 0x00, 0x50, 0x7f, 0x00, 0x00, 0x01]);
        assert_eq!(parse_address(kind, data).unwrap(), "127.0.0.1:80".parse().unwrap());
    }
}
