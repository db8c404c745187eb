use crate::{
    error::ClientError,
    router::{ChannelBinding, Reply, Router},
    transport::Transport,
};
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::sync::{mpsc::UnboundedReceiver, watch};
use turnlink_proto::{Message, MessageType, TransactionId, coding::Decode};

#[derive(Debug)]
pub(crate) enum Command {
    Query {
        tid: TransactionId,
        typ: MessageType,
        data: Bytes,
        reply: Reply,
        // Installed by the router when a CreatePermission succeeds
        channel: Option<ChannelBinding>,
    },
    Indicate {
        data: Bytes,
    },
}

#[derive(Debug)]
enum DriverState {
    // Every strong client handle is gone
    Released,
    Failed(ClientError),
}

/// Owns the transport and the routing tables. Handles talk to it only through `Command`s.
#[derive(Debug)]
pub(crate) struct Driver<T: Transport> {
    transport: T,
    server_addr: SocketAddr,
    router: Router,
    commands: UnboundedReceiver<Command>,
    error: watch::Sender<Option<ClientError>>,
}

impl<T: Transport> Driver<T> {
    pub(crate) fn new(
        transport: T,
        server_addr: SocketAddr,
        commands: UnboundedReceiver<Command>,
        error: watch::Sender<Option<ClientError>>,
    ) -> Self {
        Self {
            transport,
            server_addr,
            router: Router::default(),
            commands,
            error,
        }
    }

    async fn transmit(&mut self, data: Bytes) -> Result<(), DriverState> {
        self.transport
            .send_to(data, self.server_addr)
            .await
            .map_err(|e| DriverState::Failed(e.into()))
    }

    async fn process_command(&mut self, command: Command) -> Result<(), DriverState> {
        match command {
            Command::Query { tid, typ, data, reply, channel } => {
                if self.router.is_pending(&tid) {
                    tracing::warn!(?tid, "transaction id already pending");
                    let _ = reply.send(Err(ClientError::DuplicateTransaction(tid)));
                    return Ok(());
                }
                self.router.register(tid, typ, reply, channel);
                self.transmit(data).await
            }
            Command::Indicate { data } => self.transmit(data).await,
        }
    }

    fn process_datagram(&mut self, mut data: Bytes, source: SocketAddr) {
        match Message::decode(&mut data) {
            Ok(message) => {
                let span = message.span();
                let _guard = span.enter();
                tracing::trace!(?source, "received");
                self.router.route(message);
            }
            Err(e) => tracing::warn!(?source, "discarding datagram : {e}"),
        }
    }

    // Driver Event Loop
    pub(crate) async fn run(mut self) {
        loop {
            let state = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.process_command(command).await,
                    None => Err(DriverState::Released),
                },
                read = self.transport.recv_from() => match read {
                    Ok(Some((data, source))) => {
                        self.process_datagram(data, source);
                        Ok(())
                    }
                    Ok(None) => Err(DriverState::Failed(ClientError::TransportClosed)),
                    Err(e) => Err(DriverState::Failed(e.into())),
                },
            };

            if let Err(state) = state {
                let error = match state {
                    DriverState::Released => {
                        tracing::info!("client released");
                        ClientError::Closed
                    }
                    DriverState::Failed(error) => {
                        tracing::error!("transport failure : {error}");
                        error
                    }
                };

                // Pending callers and channel readers observe the failure before the mailbox closes
                self.router.fail_all(error.clone());
                self.error.send_replace(Some(error));
                break;
            }
        }
    }
}
