use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::{
    fmt::Debug,
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};
use tokio::net::UdpSocket;
use turnlink_proto::wire::STUN_HEADER_LEN;

// Largest STUN message the 16 bit length field can describe
pub(crate) const MAX_DATAGRAM_LEN: usize = STUN_HEADER_LEN + u16::MAX as usize;

/// Datagram transport driven by the client. The client never opens sockets outside of it.
#[async_trait]
pub trait Transport: Debug + Send + 'static {
    async fn send_to(&mut self, data: Bytes, addr: SocketAddr) -> Result<(), io::Error>;

    /// Cancel Safety : Implementations must be cancel safe, this is polled inside `select!`.
    /// `Ok(None)` means the transport is closed.
    async fn recv_from(&mut self) -> Result<Option<(Bytes, SocketAddr)>, io::Error>;

    fn local_addr(&self) -> Result<SocketAddr, io::Error>;
}

#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    buffer: BytesMut,
}

impl UdpTransport {
    /// Binds an ephemeral port on the unspecified address of the server's family.
    pub fn bind(server_addr: SocketAddr) -> Result<Self, io::Error> {
        let address = match server_addr {
            SocketAddr::V4(_) => IpAddr::from(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::from(Ipv6Addr::UNSPECIFIED),
        };
        let socket = bind_udp(SocketAddr::new(address, 0))?;
        Ok(Self {
            socket,
            buffer: BytesMut::with_capacity(MAX_DATAGRAM_LEN),
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&mut self, data: Bytes, addr: SocketAddr) -> Result<(), io::Error> {
        self.socket.send_to(&data, addr).await?;
        Ok(())
    }

    // recv_buf_from is cancel safe
    async fn recv_from(&mut self) -> Result<Option<(Bytes, SocketAddr)>, io::Error> {
        self.buffer.reserve(MAX_DATAGRAM_LEN);
        let (len, remote) = self.socket.recv_buf_from(&mut self.buffer).await?;
        Ok(Some((self.buffer.split_to(len).freeze(), remote)))
    }

    fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.socket.local_addr()
    }
}

/// Creates a non-blocking tokio UDP socket with SO_REUSEADDR set. Must be called within a runtime.
pub(crate) fn bind_udp(local_addr: SocketAddr) -> Result<UdpSocket, io::Error> {
    let socket = Socket::new(Domain::for_address(local_addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SockAddr::from(local_addr))?;
    UdpSocket::from_std(socket.into())
}


#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn udp_transport_test() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();

        let mut transport = UdpTransport::bind(server_addr).unwrap();
        let local_addr = transport.local_addr().unwrap();
        assert!(local_addr.is_ipv4());
        assert_ne!(local_addr.port(), 0);

        transport.send_to(Bytes::from_static(b"ping"), server_addr).await.unwrap();
        let mut buffer = [0u8; 16];
        let (len, from) = server.recv_from(&mut buffer).await.unwrap();
        assert_eq!(&buffer[..len], b"ping");
        assert_eq!(from.port(), local_addr.port());

        server.send_to(b"pong", from).await.unwrap();
        let (data, remote) = transport.recv_from().await.unwrap().unwrap();
        assert_eq!(data.as_ref(), b"pong");
        assert_eq!(remote, server_addr);
    }

    #[tokio::test]
    async fn large_datagram_test() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let mut transport = UdpTransport::bind(server_addr).unwrap();
        let target = SocketAddr::new(server_addr.ip(), transport.local_addr().unwrap().port());

        // Bigger than a typical MTU, still a valid STUN length
        let large: Vec<u8> = (0..5000).map(|i| i as u8).collect();
        server.send_to(&large, target).await.unwrap();
        server.send_to(b"small", target).await.unwrap();

        let (data, _) = transport.recv_from().await.unwrap().unwrap();
        assert_eq!(data.as_ref(), large.as_slice());
        let (data, _) = transport.recv_from().await.unwrap().unwrap();
        assert_eq!(data.as_ref(), b"small");
    }
}
