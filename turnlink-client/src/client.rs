use crate::{
    config::ClientConfig,
    driver::{Command, Driver},
    error::ClientError,
    router::ChannelBinding,
    transport::{Transport, UdpTransport},
};
use std::net::SocketAddr;
use tokio::sync::{
    mpsc::{self, UnboundedSender, WeakUnboundedSender},
    oneshot, watch,
};
use tracing::{Instrument, instrument};
use turnlink_proto::{
    AttributeType, Credential, IntegrityKey, Message, MessageBuilder, MessageClass, MessageType, ResolvedAttribute,
    coding::Encode,
};

/// Handle to a STUN client. Clones share the same transport and transaction table, which
/// live in a driver task that ends once every handle is dropped or the transport fails.
#[derive(Debug, Clone)]
pub struct StunClient {
    commands: UnboundedSender<Command>,
    error: watch::Receiver<Option<ClientError>>,
    server_addr: SocketAddr,
    local_addr: SocketAddr,
    signer: Option<(Credential, IntegrityKey)>,
    software: Option<String>,
}

impl StunClient {
    /// Binds a UDP transport for `config.server_addr`. Must be called within a tokio runtime.
    pub fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = UdpTransport::bind(config.server_addr)?;
        Self::with_transport(transport, config)
    }

    pub fn with_transport<T: Transport>(transport: T, config: &ClientConfig) -> Result<Self, ClientError> {
        let local_addr = transport.local_addr()?;
        let server_addr = config.server_addr;

        let (commands, mailbox) = mpsc::unbounded_channel();
        let (error_tx, error) = watch::channel(None);

        let span = tracing::info_span!("StunClient", server = %server_addr, local = %local_addr);
        tokio::spawn(Driver::new(transport, server_addr, mailbox, error_tx).run().instrument(span));

        Ok(Self {
            commands,
            error,
            server_addr,
            local_addr,
            signer: config.credential().map(|credential| {
                let key = credential.key();
                (credential, key)
            }),
            software: config.software.clone(),
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The terminal error, once the client has stopped.
    pub fn error(&self) -> Option<ClientError> {
        self.error.borrow().clone()
    }

    /// Waits until the client stops and returns why.
    pub async fn closed(&self) -> ClientError {
        let mut error = self.error.clone();
        match error.wait_for(Option::is_some).await {
            Ok(error) => error.clone().unwrap_or(ClientError::Closed),
            Err(_) => ClientError::Closed,
        }
    }

    fn terminal_error(&self) -> ClientError {
        self.error().unwrap_or(ClientError::Closed)
    }

    /// Finishes a request. SOFTWARE is added when configured; with credentials USERNAME,
    /// REALM (long-term only) and MESSAGE-INTEGRITY follow.
    pub fn prepare(&self, mut builder: MessageBuilder) -> Result<Message, ClientError> {
        if let Some(software) = &self.software {
            builder = builder.attribute(ResolvedAttribute::Software(software.clone()));
        }

        let message = match &self.signer {
            Some((credential, key)) => {
                builder = builder.attribute(ResolvedAttribute::Username(credential.username().into()));
                if let Some(realm) = credential.realm() {
                    builder = builder.attribute(ResolvedAttribute::Realm(realm.into()));
                }
                builder.build_with_integrity(key)?
            }
            None => builder.build()?,
        };

        Ok(message)
    }

    /// Sends a request and waits for the response carrying the same transaction id.
    /// There is no retransmission; the call waits until answered or the transport fails.
    #[instrument(skip_all, fields(typ = ?message.typ(), tid = ?message.transaction_id()))]
    pub async fn send(&self, message: Message) -> Result<Message, ClientError> {
        self.query(message, None).await
    }

    /// `channel` is bound by the driver if the response is a CreatePermission success.
    pub(crate) async fn query(&self, message: Message, channel: Option<ChannelBinding>) -> Result<Message, ClientError> {
        if message.typ().class() != MessageClass::Request {
            return Err(ClientError::InvalidMessageClass(message.typ()));
        }

        let (reply, response) = oneshot::channel();
        let command = Command::Query {
            tid: message.transaction_id(),
            typ: message.typ(),
            data: message.bytes()?,
            reply,
            channel,
        };

        self.commands.send(command).map_err(|_| self.terminal_error())?;
        response.await.map_err(|_| self.terminal_error())?
    }

    /// Fire-and-forget. Transport failures surface through `error` and `closed`.
    pub fn indicate(&self, message: Message) -> Result<(), ClientError> {
        if message.typ().class() != MessageClass::Indication {
            return Err(ClientError::InvalidMessageClass(message.typ()));
        }

        let command = Command::Indicate { data: message.bytes()? };
        self.commands.send(command).map_err(|_| self.terminal_error())
    }

    /// Returns the reflexive address from XOR-MAPPED-ADDRESS or MAPPED-ADDRESS, whichever comes first.
    #[instrument(skip(self))]
    pub async fn request_binding(&self) -> Result<SocketAddr, ClientError> {
        let response = self.send(self.prepare(MessageBuilder::binding_request())?).await?;
        if response.typ() != MessageType::BindingResponse {
            tracing::warn!(typ = ?response.typ(), "binding rejected");
            return Err(ClientError::QueryFailed);
        }

        let attr = response
            .attributes()
            .iter()
            .find(|attr| attr.is(AttributeType::MappedAddress) || attr.is(AttributeType::XorMappedAddress))
            .ok_or(ClientError::QueryFailed)?;

        match attr.resolve(&response.transaction_id())? {
            ResolvedAttribute::MappedAddress(addr) | ResolvedAttribute::XorMappedAddress(addr) => Ok(addr),
            _ => Err(ClientError::QueryFailed),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakUnboundedSender<Command> {
        self.commands.downgrade()
    }
}
