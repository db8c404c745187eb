use crate::{error::ClientError, transaction_counter};
use bytes::Bytes;
use opentelemetry::{KeyValue, global};
use std::{collections::HashMap, net::SocketAddr};
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use turnlink_proto::{AttributeType, Message, MessageType, ResolvedAttribute, TransactionId};

pub(crate) type Reply = oneshot::Sender<Result<Message, ClientError>>;

/// Peer and inbound sender of a relayed channel awaiting its permission.
pub(crate) type ChannelBinding = (SocketAddr, UnboundedSender<Bytes>);

#[derive(Debug)]
struct PendingQuery {
    typ: MessageType,
    reply: Reply,
    channel: Option<ChannelBinding>,
}

/// Pending transactions and the peer to channel table. Owned by the driver task alone.
#[derive(Debug, Default)]
pub(crate) struct Router {
    queries: HashMap<TransactionId, PendingQuery>,
    channels: Vec<(SocketAddr, UnboundedSender<Bytes>)>,
}

impl Router {
    pub(crate) fn is_pending(&self, tid: &TransactionId) -> bool {
        self.queries.contains_key(tid)
    }

    pub(crate) fn register(&mut self, tid: TransactionId, typ: MessageType, reply: Reply, channel: Option<ChannelBinding>) {
        transaction_counter!(1, typ);
        self.queries.insert(tid, PendingQuery { typ, reply, channel });
    }

    fn add_channel(&mut self, peer_addr: SocketAddr, inbound: UnboundedSender<Bytes>) {
        tracing::debug!(?peer_addr, "relayed channel registered");
        self.channels.push((peer_addr, inbound));
    }

    pub(crate) fn route(&mut self, message: Message) {
        if message.typ() == MessageType::DataIndication {
            return self.deliver(message);
        }

        match self.queries.remove(&message.transaction_id()) {
            Some(PendingQuery { typ, reply, channel }) => {
                transaction_counter!(-1, typ);
                // Bound before the caller wakes, so indications queued behind the success reach it
                if let Some((peer_addr, inbound)) =
                    channel.filter(|_| message.typ() == MessageType::CreatePermissionSuccess)
                {
                    self.add_channel(peer_addr, inbound);
                }
                if reply.send(Ok(message)).is_err() {
                    tracing::debug!("caller gone before the response arrived");
                }
            }
            None => tracing::debug!("no transaction expects this message, discarding"),
        }
    }

    // Data indications are matched against channels by host address only
    fn deliver(&mut self, message: Message) {
        let (Ok(ResolvedAttribute::XorPeerAddress(peer_addr)), Ok(ResolvedAttribute::Data(data))) = (
            message.resolve(AttributeType::XorPeerAddress),
            message.resolve(AttributeType::Data),
        ) else {
            return tracing::warn!("data indication without a usable peer address or data");
        };

        self.channels.retain(|(_, inbound)| !inbound.is_closed());
        match self.channels.iter().find(|(addr, _)| same_host(addr, &peer_addr)) {
            Some((_, inbound)) => {
                if inbound.send(data).is_err() {
                    tracing::warn!(?peer_addr, "relayed channel closed")
                }
            }
            None => tracing::debug!(?peer_addr, "no channel bound to peer"),
        }
    }

    /// Fails every pending transaction with `error` and forgets every channel.
    pub(crate) fn fail_all(&mut self, error: ClientError) {
        for (_, PendingQuery { typ, reply, .. }) in self.queries.drain() {
            transaction_counter!(-1, typ);
            let _ = reply.send(Err(error.clone()));
        }
        self.channels.clear();
    }
}

fn same_host(lhs: &SocketAddr, rhs: &SocketAddr) -> bool {
    match (lhs, rhs) {
        (SocketAddr::V4(lhs), SocketAddr::V4(rhs)) => lhs.ip().to_bits() == rhs.ip().to_bits(),
        (SocketAddr::V6(lhs), SocketAddr::V6(rhs)) => lhs.ip().to_bits() == rhs.ip().to_bits(),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io;
    use tokio::sync::{mpsc, oneshot::error::TryRecvError};
    use turnlink_proto::MessageBuilder;

    fn response(tid: TransactionId) -> Message {
        MessageBuilder::new(MessageType::BindingResponse, tid)
            .attribute(ResolvedAttribute::XorMappedAddress("203.0.113.5:54321".parse().unwrap()))
            .build()
            .unwrap()
    }

    fn data_indication(peer_addr: &str, data: &'static [u8]) -> Message {
        MessageBuilder::new(MessageType::DataIndication, TransactionId::new())
            .attribute(ResolvedAttribute::XorPeerAddress(peer_addr.parse().unwrap()))
            .attribute(ResolvedAttribute::Data(Bytes::from_static(data)))
            .build()
            .unwrap()
    }

    #[test]
    fn reverse_order_matching_test() {
        let mut router = Router::default();
        let (first_tid, second_tid) = (TransactionId::new(), TransactionId::new());
        let (first_reply, mut first) = oneshot::channel();
        let (second_reply, mut second) = oneshot::channel();

        router.register(first_tid, MessageType::BindingRequest, first_reply, None);
        router.register(second_tid, MessageType::BindingRequest, second_reply, None);

        router.route(response(second_tid));
        assert_eq!(first.try_recv().unwrap_err(), TryRecvError::Empty);
        router.route(response(first_tid));

        assert_eq!(first.try_recv().unwrap().unwrap().transaction_id(), first_tid);
        assert_eq!(second.try_recv().unwrap().unwrap().transaction_id(), second_tid);
        assert!(!router.is_pending(&first_tid));
        assert!(!router.is_pending(&second_tid));
    }

    #[test]
    fn unmatched_response_test() {
        let mut router = Router::default();
        let tid = TransactionId::new();
        let (reply, mut pending) = oneshot::channel();
        router.register(tid, MessageType::AllocateRequest, reply, None);

        router.route(response(TransactionId::new()));

        assert!(router.is_pending(&tid));
        assert_eq!(pending.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn relay_demux_test() {
        let mut router = Router::default();
        let (a_send, mut a_recv) = mpsc::unbounded_channel();
        let (b_send, mut b_recv) = mpsc::unbounded_channel();
        let (c_send, mut c_recv) = mpsc::unbounded_channel();

        router.add_channel("192.0.2.10:5000".parse().unwrap(), a_send);
        router.add_channel("192.0.2.20:5000".parse().unwrap(), b_send);
        router.add_channel("[::ffff:192.0.2.30]:5000".parse().unwrap(), c_send);

        // Port is not part of the match
        router.route(data_indication("192.0.2.20:6000", b"to-b"));
        assert_eq!(b_recv.try_recv().unwrap().as_ref(), b"to-b");
        assert!(a_recv.try_recv().is_err());

        // Same address bytes in the other family never match
        router.route(data_indication("192.0.2.30:5000", b"v4"));
        assert!(c_recv.try_recv().is_err());
        router.route(data_indication("[::ffff:192.0.2.30]:7000", b"v6"));
        assert_eq!(c_recv.try_recv().unwrap().as_ref(), b"v6");

        // Unknown peer is dropped
        router.route(data_indication("198.51.100.1:5000", b"nobody"));
        assert!(a_recv.try_recv().is_err());
        assert!(b_recv.try_recv().is_err());
        assert!(c_recv.try_recv().is_err());
    }

    #[test]
    fn data_indication_not_matched_as_response_test() {
        let mut router = Router::default();
        let indication = data_indication("192.0.2.10:5000", b"data");
        let (reply, mut pending) = oneshot::channel();
        router.register(indication.transaction_id(), MessageType::BindingRequest, reply, None);

        router.route(indication);
        assert_eq!(pending.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    fn permission_response(typ: MessageType, tid: TransactionId) -> Message {
        MessageBuilder::new(typ, tid).build().unwrap()
    }

    #[test]
    fn permission_success_binds_channel_test() {
        let mut router = Router::default();
        let tid = TransactionId::new();
        let (reply, mut pending) = oneshot::channel();
        let (inbound, mut channel) = mpsc::unbounded_channel();
        router.register(
            tid,
            MessageType::CreatePermission,
            reply,
            Some(("192.0.2.10:5000".parse().unwrap(), inbound)),
        );

        // Success and the first indication are routed before the caller looks at the reply
        router.route(permission_response(MessageType::CreatePermissionSuccess, tid));
        router.route(data_indication("192.0.2.10:5000", b"early"));

        assert_eq!(pending.try_recv().unwrap().unwrap().typ(), MessageType::CreatePermissionSuccess);
        assert_eq!(channel.try_recv().unwrap().as_ref(), b"early");
    }

    #[test]
    fn permission_error_skips_channel_test() {
        let mut router = Router::default();
        let tid = TransactionId::new();
        let (reply, mut pending) = oneshot::channel();
        let (inbound, mut channel) = mpsc::unbounded_channel();
        router.register(
            tid,
            MessageType::CreatePermission,
            reply,
            Some(("192.0.2.10:5000".parse().unwrap(), inbound)),
        );

        router.route(permission_response(MessageType::CreatePermissionErrorResponse, tid));
        router.route(data_indication("192.0.2.10:5000", b"denied"));

        assert_eq!(pending.try_recv().unwrap().unwrap().typ(), MessageType::CreatePermissionErrorResponse);
        assert!(matches!(channel.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
    }

    #[test]
    fn fail_all_test() {
        let mut router = Router::default();
        let (first_reply, mut first) = oneshot::channel();
        let (second_reply, mut second) = oneshot::channel();
        let (inbound, mut channel) = mpsc::unbounded_channel();

        router.register(TransactionId::new(), MessageType::BindingRequest, first_reply, None);
        router.register(TransactionId::new(), MessageType::CreatePermission, second_reply, None);
        router.add_channel("192.0.2.10:5000".parse().unwrap(), inbound);

        router.fail_all(io::Error::from(io::ErrorKind::ConnectionRefused).into());

        for pending in [&mut first, &mut second] {
            match pending.try_recv().unwrap() {
                Err(ClientError::Transport(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionRefused),
                other => panic!("unexpected {other:?}"),
            }
        }

        // Channel table is cleared, so the inbound side observes the close
        assert!(matches!(channel.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
    }
}
