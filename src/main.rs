use anyhow::Result;
use neopixel_tree::config::{load_config, Config};
use neopixel_tree::device::task::DeviceTask;
use neopixel_tree::device::{Device, DeviceHandle};
use neopixel_tree::events::EventServer;
use neopixel_tree::network::UdpServer;
use std::future::Future;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_graceful_shutdown::{IntoSubsystem, SubsystemBuilder, SubsystemHandle, Toplevel};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("error,neopixel_tree=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = load_config()?;

    RuntimeWithInstantShutdown::new()?.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let (device_tx, device_rx) = mpsc::channel(32);
    let device_handle = DeviceHandle::new(device_tx);

    let device = Device::new(
        config.strip.pixel_count,
        config.animation.clone(),
        config.events.publish_interval(),
    );
    let device_task = DeviceTask::new(
        device_rx,
        device,
        config.animation.tick_interval(),
        config.events.publish_interval(),
    );

    let udp_server = UdpServer::bind(
        config.network.listen,
        device_handle.clone(),
        config.strip.pixel_count,
        config.network.max_datagram_size,
    )
    .await?;
    let event_server = EventServer::bind(config.events.listen, device_handle).await?;

    info!(
        "starting tree with {} pixels, protocol version {}",
        config.strip.pixel_count,
        neopixel_tree::command::PROTOCOL_VERSION
    );

    let root_subsystem = async |s: SubsystemHandle| {
        s.start(SubsystemBuilder::new("Device", device_task.into_subsystem()));
        s.start(SubsystemBuilder::new(
            "UdpServer",
            udp_server.into_subsystem(),
        ));
        s.start(SubsystemBuilder::new("Events", event_server.into_subsystem()));
    };

    Toplevel::new(root_subsystem)
        .catch_signals()
        .handle_shutdown_requests(Duration::from_millis(1000))
        .await
        .map_err(Into::into)
}

/// Drops the runtime without waiting on blocking tasks left behind by
/// subsystems that were cancelled mid-flight.
struct RuntimeWithInstantShutdown(Option<Runtime>);

impl RuntimeWithInstantShutdown {
    pub fn new() -> Result<Self> {
        Ok(Self(Some(
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?,
        )))
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        match &self.0 {
            Some(runtime) => runtime.block_on(future),
            None => unreachable!("runtime is only taken on drop"),
        }
    }
}

impl Drop for RuntimeWithInstantShutdown {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}
