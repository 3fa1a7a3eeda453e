use anyhow::{bail, Context, Result};
use neopixel_tree::command::{Command, CommandCategory};
use neopixel_tree::config::NetworkConfig;
use neopixel_tree::network::UdpClient;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const QUERY_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("error,neopixel_tree=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let Some(raw_command) = env::args().nth(1) else {
        bail!("usage: neopixel-tree-send <json-command>");
    };
    let command: Command =
        serde_json::from_str(&raw_command).context("unable to parse command")?;

    let device: SocketAddr = match env::var("NEOPIXEL_TREE_DEVICE") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid value for NEOPIXEL_TREE_DEVICE: {value}"))?,
        Err(_) => SocketAddr::from(([127, 0, 0, 1], NetworkConfig::DEFAULT_PORT)),
    };

    let mut client = UdpClient::new(device, NetworkConfig::DEFAULT_MAX_DATAGRAM_SIZE);
    client.start().await?;

    if command.category() != CommandCategory::System {
        client.send(&command).await?;
        return Ok(());
    }

    let reply = client.query(&command, QUERY_TIMEOUT).await?;

    match command {
        Command::Readback => println!("{reply:?}"),
        _ => println!("{}", String::from_utf8_lossy(&reply)),
    }

    Ok(())
}
