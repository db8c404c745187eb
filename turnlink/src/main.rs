use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    time::Duration,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turnlink_client::{ClientConfig, DirectChannel, PeerStream, TurnClient};

pub fn setup_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[derive(Parser, Debug)]
struct TurnArgs {
    #[arg(long)]
    config: Option<String>,
    /// Seconds to wait for the relayed greetings
    #[arg(long, default_value_t = 5)]
    wait: u64,
}

async fn print_incoming(label: &'static str, mut stream: PeerStream, wait: Duration) {
    loop {
        match tokio::time::timeout(wait, stream.read()).await {
            Ok(Ok(Some((data, from)))) => println!("{label} <- {from} : {}", String::from_utf8_lossy(&data)),
            Ok(Ok(None)) => break tracing::info!(label, "stream closed"),
            Ok(Err(e)) => break tracing::error!(label, "read error : {e}"),
            Err(_) => break,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();

    let args = TurnArgs::parse();
    let config = match args.config {
        Some(config) => config,
        None => std::env::var("TURNLINK_CONFIG").unwrap_or("./turnlink.conf".into()),
    };

    let config = ClientConfig::from_file(&config).with_context(|| format!("Unable to load config : {config}"))?;
    tracing::info!("Client Config : {:?}", config.server_addr);

    let client = TurnClient::connect(&config).context("Unable to bind client transport")?;
    let my_addr = client.request_binding().await.context("Binding request failed")?;
    let allocation = client.request_allocation().await.context("Allocation failed")?;
    println!("reflexive address {my_addr}, relayed address {}", allocation.relayed_addr());

    // The peer is a local socket reachable on our reflexive address
    let local = match my_addr {
        SocketAddr::V4(_) => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
        SocketAddr::V6(_) => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
    };
    let mut direct = DirectChannel::bind(local)?;
    let their_addr = SocketAddr::new(my_addr.ip(), direct.local_addr()?.port());

    let relayed = allocation.create_channel(their_addr).await.context("Create permission failed")?;
    direct.connect(allocation.relayed_addr())?;

    let direct = PeerStream::from(direct);
    let relayed = PeerStream::from(relayed);

    direct.write(Bytes::from_static(b"Hello")).await?;
    relayed.write(Bytes::from_static(b"Test")).await?;

    let wait = Duration::from_secs(args.wait);
    tokio::select! {
        _ = async { tokio::join!(print_incoming("direct", direct, wait), print_incoming("relayed", relayed, wait)) } => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
    }

    if let Some(error) = client.error() {
        tracing::error!("client stopped : {error}");
    }

    Ok(())
}
