pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod transport;
pub mod turn;

mod driver;
mod router;

pub use channel::{ChannelOption, DirectChannel, PeerStream, RelayedChannel};
pub use client::StunClient;
pub use config::ClientConfig;
pub use error::{ChannelError, ClientError};
pub use transport::{Transport, UdpTransport};
pub use turn::{Allocation, TurnClient};
pub use turnlink_proto::{
    AttributeType, Credential, IntegrityKey, Message, MessageBuilder, MessageType, ProtoError, ResolvedAttribute, TransactionId,
};

#[macro_export]
macro_rules! transaction_counter {
    ($val:expr, $typ:expr) => {
        let transaction_counter = global::meter("turnlink-client")
            .i64_up_down_counter("stun.pending-transactions")
            .with_description("Pending Transactions")
            .build();

        transaction_counter.add($val, &[KeyValue::new("type", format!("{:?}", $typ))]);
    };
}
