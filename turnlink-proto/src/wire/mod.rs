use rand::Rng;

pub mod attribute;
pub mod integrity;
pub mod message;
pub mod method;
pub(crate) mod util;

pub use util::xor_address;

#[macro_export]
macro_rules! compute_padding {
    ($val:expr) => {
        match $val % 4 {
            0 => 0,
            x => 4 - x,
        }
    };
}

pub const STUN_HEADER_LEN: usize = 20;

pub(crate) const TRAN_ID_LENGTH: usize = 12;
pub(crate) const MI_ATTR_LENGTH: usize = 24;
pub(crate) const MI_DIGEST_LENGTH: usize = 20;
pub(crate) const ATTR_HEADER_LENGTH: usize = 4;

pub const MAGIC_COOKIE: u32 = 0x2112A442u32;
pub(crate) const MAGIC_COOKIE_MASK: u16 = 0x2112u16;

pub(crate) const MAX_TEXT_BYTES: usize = 763;
pub(crate) const MAX_TEXT_CHARS: usize = 128;
pub(crate) const MAX_USERNAME_BYTES: usize = 513;

const MIN_CHANNEL_NUMBER: u16 = 0x4000;
const MAX_CHANNEL_NUMBER: u16 = 0x4FFF;

pub(crate) const IPV4_ADDRESS_FAMILY: u8 = 0x01;
pub(crate) const IPV6_ADDRESS_FAMILY: u8 = 0x02;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AddressFamily {
    IPv4,
    IPv6,
}

impl AddressFamily {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            IPV4_ADDRESS_FAMILY => Some(Self::IPv4),
            IPV6_ADDRESS_FAMILY => Some(Self::IPv6),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::IPv4 => IPV4_ADDRESS_FAMILY,
            Self::IPv6 => IPV6_ADDRESS_FAMILY,
        }
    }

    // Size of the address carried by an address attribute of this family.
    pub(crate) fn address_len(self) -> usize {
        match self {
            Self::IPv4 => 4,
            Self::IPv6 => 16,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Transport {
    Tcp = 0x06,
    Udp = 0x11,
}

/// TURN channel number. Client-chosen numbers live in `0x4000..=0x4FFF`.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct ChannelNumber(pub u16);

impl ChannelNumber {
    pub fn random() -> Self {
        ChannelNumber(rand::rng().random_range(MIN_CHANNEL_NUMBER..=MAX_CHANNEL_NUMBER))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn padding_test() {
        assert_eq!(compute_padding!(0usize), 0);
        assert_eq!(compute_padding!(1usize), 3);
        assert_eq!(compute_padding!(7usize), 1);
        assert_eq!(compute_padding!(20usize), 0);
    }

    #[test]
    fn random_channel_number_test() {
        for _ in 0..64 {
            let ChannelNumber(number) = ChannelNumber::random();
            assert!((MIN_CHANNEL_NUMBER..=MAX_CHANNEL_NUMBER).contains(&number));
        }
    }
}
