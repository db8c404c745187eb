use super::{
    MI_ATTR_LENGTH, MI_DIGEST_LENGTH,
    attribute::{Attribute, AttributeType},
    message::Message,
};
use crate::{
    coding::{CodingError, Encode},
    error::ProtoError,
};
use bytes::{BufMut, Bytes, BytesMut};
use ring::hmac::{self, HMAC_SHA1_FOR_LEGACY_USE_ONLY, Key};

/// Credentials used to derive the MESSAGE-INTEGRITY key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    LongTerm {
        username: String,
        realm: String,
        password: String,
    },
    ShortTerm {
        username: String,
        password: String,
    },
}

impl Credential {
    pub fn key(&self) -> IntegrityKey {
        match self {
            Self::LongTerm {
                username,
                realm,
                password,
            } => IntegrityKey::long_term(username, realm, password),
            Self::ShortTerm { password, .. } => IntegrityKey::short_term(password),
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Self::LongTerm { username, .. } | Self::ShortTerm { username, .. } => username,
        }
    }

    pub fn realm(&self) -> Option<&str> {
        match self {
            Self::LongTerm { realm, .. } => Some(realm),
            Self::ShortTerm { .. } => None,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct IntegrityKey(Vec<u8>);

impl IntegrityKey {
    /// MD5(username ":" realm ":" password)
    pub fn long_term(username: &str, realm: &str, password: &str) -> Self {
        let credential = format!("{username}:{realm}:{password}");
        IntegrityKey(md5::compute(credential).to_vec())
    }

    pub fn short_term(password: &str) -> Self {
        IntegrityKey(password.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn hmac_key(&self) -> Key {
        Key::new(HMAC_SHA1_FOR_LEGACY_USE_ONLY, &self.0)
    }
}

impl std::fmt::Debug for IntegrityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IntegrityKey(<redacted>)")
    }
}

impl Message {
    /// Appends MESSAGE-INTEGRITY. The digest covers the header, with its length already
    /// counting the MI attribute, followed by every attribute present so far.
    pub fn attach_integrity(&mut self, key: &IntegrityKey) -> Result<(), ProtoError> {
        if self.integrity {
            return Err(ProtoError::IntegrityAlreadyApplied);
        }

        let length = self.body.len() + MI_ATTR_LENGTH;
        let length = u16::try_from(length).map_err(|_| CodingError::MessageTooLarge(length))?;

        let challenge = self.challenge(length, self.body.len())?;
        let tag = hmac::sign(&key.hmac_key(), &challenge);

        let attr = Attribute::new(AttributeType::MessageIntegrity, Bytes::copy_from_slice(tag.as_ref()));
        let mut body = BytesMut::with_capacity(length as usize);
        body.put_slice(&self.body);
        attr.encode(&mut body)?;

        self.attributes.push(attr);
        self.body = body.freeze();
        self.header.length = length;
        self.integrity = true;
        Ok(())
    }

    /// Checks the first MESSAGE-INTEGRITY attribute against `key`. Attributes after it are ignored.
    pub fn verify_integrity(&self, key: &IntegrityKey) -> Result<(), ProtoError> {
        let mut offset = 0;
        let mut digest = None;
        for attr in self.attributes.iter() {
            if attr.is(AttributeType::MessageIntegrity) {
                digest = Some(&attr.value);
                break;
            }
            offset += attr.wire_len();
        }

        let digest = match digest {
            Some(digest) if digest.len() == MI_DIGEST_LENGTH => digest,
            Some(_) => return Err(ProtoError::InvalidAttributeFormat(AttributeType::MessageIntegrity)),
            None => return Err(ProtoError::AttrMissing(AttributeType::MessageIntegrity)),
        };

        let challenge = self.challenge((offset + MI_ATTR_LENGTH) as u16, offset)?;
        hmac::verify(&key.hmac_key(), &challenge, digest)
            .map_err(|_| ProtoError::MessageIntegrityFailed("MI Check Failed".into()))
    }

    // Header carrying `length` followed by the first `upto` bytes of the body
    fn challenge(&self, length: u16, upto: usize) -> Result<BytesMut, ProtoError> {
        let mut challenge = BytesMut::new();
        self.header.encode_with_length(length, &mut challenge)?;
        challenge.extend_from_slice(&self.body[..upto]);
        Ok(challenge)
    }
}
