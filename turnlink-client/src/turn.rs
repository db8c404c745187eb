use crate::{
    channel::RelayedChannel,
    client::StunClient,
    config::ClientConfig,
    error::ClientError,
    transport::Transport,
};
use std::{net::SocketAddr, ops::Deref, time::Duration};
use tokio::sync::mpsc;
use tracing::instrument;
use turnlink_proto::{AttributeType, MessageBuilder, MessageType, ResolvedAttribute};

/// A `StunClient` that also speaks the TURN allocation methods.
#[derive(Debug, Clone)]
pub struct TurnClient(StunClient);

impl TurnClient {
    pub fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(TurnClient(StunClient::connect(config)?))
    }

    pub fn with_transport<T: Transport>(transport: T, config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(TurnClient(StunClient::with_transport(transport, config)?))
    }

    /// Requests a UDP relay. Anything but an allocate success carrying XOR-RELAYED-ADDRESS
    /// is an `AllocationFailure`.
    #[instrument(skip(self))]
    pub async fn request_allocation(&self) -> Result<Allocation, ClientError> {
        let response = self.send(self.prepare(MessageBuilder::allocate_request())?).await?;
        if response.typ() != MessageType::AllocateResponse {
            tracing::warn!(typ = ?response.typ(), "allocation rejected");
            return Err(ClientError::AllocationFailure);
        }

        let relayed_addr = match response.resolve(AttributeType::XorRelayedAddress) {
            Ok(ResolvedAttribute::XorRelayedAddress(addr)) => addr,
            Ok(_) => return Err(ClientError::AllocationFailure),
            Err(e) => {
                tracing::warn!("allocation without relayed address : {e}");
                return Err(ClientError::AllocationFailure);
            }
        };

        let lifetime = match response.resolve(AttributeType::Lifetime) {
            Ok(ResolvedAttribute::Lifetime(secs)) => Some(Duration::from_secs(u64::from(secs))),
            _ => None,
        };

        tracing::info!(%relayed_addr, ?lifetime, "allocated");
        Ok(Allocation {
            relayed_addr,
            lifetime,
            client: self.0.clone(),
        })
    }
}

impl Deref for TurnClient {
    type Target = StunClient;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A relay address reserved on the server. It lives as long as the client's session;
/// refresh and deletion are not modeled.
#[derive(Debug, Clone)]
pub struct Allocation {
    relayed_addr: SocketAddr,
    lifetime: Option<Duration>,
    client: StunClient,
}

impl Allocation {
    /// Address peers send to in order to reach this client.
    pub fn relayed_addr(&self) -> SocketAddr {
        self.relayed_addr
    }

    pub fn lifetime(&self) -> Option<Duration> {
        self.lifetime
    }

    /// Installs a permission for `peer_addr` and returns a channel fed by its data indications.
    #[instrument(skip(self))]
    pub async fn create_channel(&self, peer_addr: SocketAddr) -> Result<RelayedChannel, ClientError> {
        let request = self.client.prepare(MessageBuilder::create_permission(peer_addr))?;
        let (inbound, reader) = mpsc::unbounded_channel();
        let response = self.client.query(request, Some((peer_addr, inbound))).await?;
        if response.typ() != MessageType::CreatePermissionSuccess {
            tracing::warn!(typ = ?response.typ(), "permission rejected");
            return Err(ClientError::CreatePermissionFailure);
        }

        Ok(RelayedChannel::new(
            self.client.downgrade(),
            peer_addr,
            self.relayed_addr,
            reader,
        ))
    }
}
