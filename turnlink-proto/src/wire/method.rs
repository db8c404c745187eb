use crate::{
    coding::{CodingError, Decode, Encode},
    error::ProtoError,
};
use bytes::{Buf, BufMut};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MessageClass {
    Request,
    Indication,
    Success,
    Error,
}

// Closed set of message types. Anything else on the wire is a malformed packet.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum MessageType {
    BindingRequest,
    BindingResponse,
    BindingErrorResponse,
    SharedSecretRequest,
    SharedSecretResponse,
    SharedSecretErrorResponse,
    AllocateRequest,
    AllocateResponse,
    AllocateErrorResponse,
    Send,
    SendIndication,
    DataRequest,
    DataIndication,
    CreatePermission,
    CreatePermissionSuccess,
    CreatePermissionErrorResponse,
    ChannelBind,
    ChannelBindSuccess,
    ChannelBindErrorResponse,
}

impl MessageType {
    pub fn class(&self) -> MessageClass {
        match self {
            Self::BindingRequest
            | Self::SharedSecretRequest
            | Self::AllocateRequest
            | Self::Send
            | Self::DataRequest
            | Self::CreatePermission
            | Self::ChannelBind => MessageClass::Request,
            Self::SendIndication | Self::DataIndication => MessageClass::Indication,
            Self::BindingResponse
            | Self::SharedSecretResponse
            | Self::AllocateResponse
            | Self::CreatePermissionSuccess
            | Self::ChannelBindSuccess => MessageClass::Success,
            Self::BindingErrorResponse
            | Self::SharedSecretErrorResponse
            | Self::AllocateErrorResponse
            | Self::CreatePermissionErrorResponse
            | Self::ChannelBindErrorResponse => MessageClass::Error,
        }
    }
}

impl TryFrom<u16> for MessageType {
    type Error = CodingError;
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            0x0001 => Self::BindingRequest,
            0x0101 => Self::BindingResponse,
            0x0111 => Self::BindingErrorResponse,
            0x0002 => Self::SharedSecretRequest,
            0x0102 => Self::SharedSecretResponse,
            0x0112 => Self::SharedSecretErrorResponse,
            0x0003 => Self::AllocateRequest,
            0x0103 => Self::AllocateResponse,
            0x0113 => Self::AllocateErrorResponse,
            0x0006 => Self::Send,
            0x0016 => Self::SendIndication,
            0x0007 => Self::DataRequest,
            0x0017 => Self::DataIndication,
            0x0008 => Self::CreatePermission,
            0x0108 => Self::CreatePermissionSuccess,
            0x0118 => Self::CreatePermissionErrorResponse,
            0x0009 => Self::ChannelBind,
            0x0109 => Self::ChannelBindSuccess,
            0x0119 => Self::ChannelBindErrorResponse,
            x => return Err(CodingError::UnknownMessageType(x)),
        })
    }
}

impl From<MessageType> for u16 {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::BindingRequest => 0x0001,
            MessageType::BindingResponse => 0x0101,
            MessageType::BindingErrorResponse => 0x0111,
            MessageType::SharedSecretRequest => 0x0002,
            MessageType::SharedSecretResponse => 0x0102,
            MessageType::SharedSecretErrorResponse => 0x0112,
            MessageType::AllocateRequest => 0x0003,
            MessageType::AllocateResponse => 0x0103,
            MessageType::AllocateErrorResponse => 0x0113,
            MessageType::Send => 0x0006,
            MessageType::SendIndication => 0x0016,
            MessageType::DataRequest => 0x0007,
            MessageType::DataIndication => 0x0017,
            MessageType::CreatePermission => 0x0008,
            MessageType::CreatePermissionSuccess => 0x0108,
            MessageType::CreatePermissionErrorResponse => 0x0118,
            MessageType::ChannelBind => 0x0009,
            MessageType::ChannelBindSuccess => 0x0109,
            MessageType::ChannelBindErrorResponse => 0x0119,
        }
    }
}

impl Decode for MessageType {
    type Output = Self;
    fn decode<B: Buf>(buffer: &mut B) -> Result<Self::Output, ProtoError> {
        Ok(u16::decode(buffer)?.try_into()?)
    }
}

impl Encode for MessageType {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<(), ProtoError> {
        buffer.put_u16(u16::from(*self));
        Ok(())
    }
}
