use crate::{
    driver::Command,
    error::ChannelError,
    transport::{MAX_DATAGRAM_LEN, bind_udp},
};
use bytes::{Bytes, BytesMut};
use socket2::SockRef;
use std::net::SocketAddr;
use tokio::{
    net::UdpSocket,
    sync::mpsc::{UnboundedReceiver, WeakUnboundedSender},
};
use turnlink_proto::{MessageBuilder, coding::Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOption {
    ReuseAddress(bool),
    RecvBufferSize(usize),
    SendBufferSize(usize),
    Ttl(u32),
}

/// Channel to one peer through the relay. Writes become send indications and reads are fed
/// by data indications from the peer's host address.
#[derive(Debug)]
pub struct RelayedChannel {
    client: WeakUnboundedSender<Command>,
    peer_addr: SocketAddr,
    relayed_addr: SocketAddr,
    inbound: UnboundedReceiver<Bytes>,
}

impl RelayedChannel {
    pub(crate) fn new(
        client: WeakUnboundedSender<Command>,
        peer_addr: SocketAddr,
        relayed_addr: SocketAddr,
        inbound: UnboundedReceiver<Bytes>,
    ) -> Self {
        Self {
            client,
            peer_addr,
            relayed_addr,
            inbound,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn relayed_addr(&self) -> SocketAddr {
        self.relayed_addr
    }

    /// Hands `data` to the client as a send indication. No acknowledgement is awaited;
    /// transport failures surface through `StunClient::error`.
    pub fn write(&self, data: Bytes) -> Result<(), ChannelError> {
        let message = MessageBuilder::send_indication(self.peer_addr, data).build()?;
        let commands = self.client.upgrade().ok_or(ChannelError::Closed)?;
        commands
            .send(Command::Indicate { data: message.bytes()? })
            .map_err(|_| ChannelError::Closed)
    }

    /// `None` once the client has stopped.
    pub async fn read(&mut self) -> Option<Bytes> {
        self.inbound.recv().await
    }

    pub fn bind(&mut self, _local_addr: SocketAddr) -> Result<(), ChannelError> {
        Err(ChannelError::OperationUnsupported)
    }

    pub fn connect(&mut self, _peer_addr: SocketAddr) -> Result<(), ChannelError> {
        Err(ChannelError::OperationUnsupported)
    }

    pub fn reconfigure(&mut self, _peer_addr: SocketAddr) -> Result<(), ChannelError> {
        Err(ChannelError::OperationUnsupported)
    }

    pub fn set_option(&self, _option: ChannelOption) -> Result<(), ChannelError> {
        Err(ChannelError::OperationUnsupported)
    }
}

/// Plain UDP socket with an optional default peer.
#[derive(Debug)]
pub struct DirectChannel {
    socket: UdpSocket,
    peer_addr: Option<SocketAddr>,
    buffer: BytesMut,
}

impl DirectChannel {
    pub fn bind(local_addr: SocketAddr) -> Result<Self, ChannelError> {
        Ok(Self {
            socket: bind_udp(local_addr)?,
            peer_addr: None,
            buffer: BytesMut::with_capacity(MAX_DATAGRAM_LEN),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn connect(&mut self, peer_addr: SocketAddr) -> Result<(), ChannelError> {
        self.peer_addr = Some(peer_addr);
        Ok(())
    }

    pub async fn write(&self, data: Bytes) -> Result<(), ChannelError> {
        let peer_addr = self.peer_addr.ok_or(ChannelError::NotConnected)?;
        self.socket.send_to(&data, peer_addr).await?;
        Ok(())
    }

    pub async fn read(&mut self) -> Result<(Bytes, SocketAddr), ChannelError> {
        self.buffer.reserve(MAX_DATAGRAM_LEN);
        let (len, remote) = self.socket.recv_buf_from(&mut self.buffer).await?;
        Ok((self.buffer.split_to(len).freeze(), remote))
    }

    pub fn set_option(&self, option: ChannelOption) -> Result<(), ChannelError> {
        let socket = SockRef::from(&self.socket);
        match option {
            ChannelOption::ReuseAddress(reuse) => socket.set_reuse_address(reuse)?,
            ChannelOption::RecvBufferSize(size) => socket.set_recv_buffer_size(size)?,
            ChannelOption::SendBufferSize(size) => socket.set_send_buffer_size(size)?,
            ChannelOption::Ttl(ttl) => socket.set_ttl(ttl)?,
        }
        Ok(())
    }
}

/// A path to a peer, either straight over UDP or through a TURN relay.
#[derive(Debug)]
pub enum PeerStream {
    Direct(DirectChannel),
    Relayed(RelayedChannel),
}

impl PeerStream {
    pub async fn write(&self, data: Bytes) -> Result<(), ChannelError> {
        match self {
            Self::Direct(channel) => channel.write(data).await,
            Self::Relayed(channel) => channel.write(data),
        }
    }

    /// Next payload and where it came from. `None` once a relayed stream's client has stopped.
    pub async fn read(&mut self) -> Result<Option<(Bytes, SocketAddr)>, ChannelError> {
        match self {
            Self::Direct(channel) => channel.read().await.map(Some),
            Self::Relayed(channel) => Ok(channel.read().await.map(|data| (data, channel.peer_addr()))),
        }
    }

    pub fn connect(&mut self, peer_addr: SocketAddr) -> Result<(), ChannelError> {
        match self {
            Self::Direct(channel) => channel.connect(peer_addr),
            Self::Relayed(channel) => channel.connect(peer_addr),
        }
    }

    pub fn set_option(&self, option: ChannelOption) -> Result<(), ChannelError> {
        match self {
            Self::Direct(channel) => channel.set_option(option),
            Self::Relayed(channel) => channel.set_option(option),
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Direct(channel) => channel.peer_addr(),
            Self::Relayed(channel) => Some(channel.peer_addr()),
        }
    }
}

impl From<DirectChannel> for PeerStream {
    fn from(value: DirectChannel) -> Self {
        Self::Direct(value)
    }
}

impl From<RelayedChannel> for PeerStream {
    fn from(value: RelayedChannel) -> Self {
        Self::Relayed(value)
    }
}
