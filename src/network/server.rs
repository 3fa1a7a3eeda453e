use crate::command::Command;
use crate::device::DeviceHandle;
use crate::network::codec::decode;
use anyhow::{Context, Error, Result};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tokio_graceful_shutdown::{FutureExt, IntoSubsystem, SubsystemHandle};
use tracing::{debug, info, instrument, warn};

/// Reported by devices that have no hardware reset register.
pub const RESET_REASON: &str = "SIM_RST_POWERON";

/// Receives command datagrams, answers diagnostics and forwards everything
/// else to the device.
#[derive(Debug)]
pub struct UdpServer {
    socket: UdpSocket,
    device: DeviceHandle,
    pixel_count: usize,
    max_datagram_size: usize,
    started_at: Instant,
    last_datagram: Vec<u8>,
}

impl UdpServer {
    pub async fn bind(
        listen: SocketAddr,
        device: DeviceHandle,
        pixel_count: usize,
        max_datagram_size: usize,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(listen)
            .await
            .with_context(|| format!("unable to bind UDP socket on {listen}"))?;

        Ok(Self {
            socket,
            device,
            pixel_count,
            max_datagram_size,
            started_at: Instant::now(),
            last_datagram: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    #[instrument(skip(self))]
    async fn process(&mut self) -> Result<()> {
        info!("listening for commands on {}", self.local_addr()?);

        // One spare byte so oversized datagrams can be told apart.
        let mut buffer = vec![0; self.max_datagram_size + 1];

        loop {
            let (length, sender) = match self.socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(err) => {
                    warn!("failed to receive datagram: {}", err);
                    continue;
                }
            };

            if length > self.max_datagram_size {
                debug!("dropping oversized datagram from {}", sender);
                continue;
            }

            self.handle_datagram(&buffer[..length], sender).await?;
        }
    }

    async fn handle_datagram(&mut self, datagram: &[u8], sender: SocketAddr) -> Result<()> {
        let command = match decode(datagram, self.pixel_count) {
            Ok(command) => command,
            Err(err) => {
                debug!("dropping datagram from {}: {}", sender, err);
                self.last_datagram = datagram.to_vec();
                return Ok(());
            }
        };

        let reply = match command {
            Command::ResetInfo => RESET_REASON.as_bytes().to_vec(),
            Command::Uptime => self.started_at.elapsed().as_millis().to_string().into_bytes(),
            Command::Readback => self.last_datagram.clone(),
            command => {
                self.last_datagram = datagram.to_vec();
                self.device.dispatch(command).await?;
                return Ok(());
            }
        };

        if let Err(err) = self.socket.send_to(&reply, sender).await {
            warn!("failed to answer diagnostic request from {}: {}", sender, err);
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl IntoSubsystem<Error> for UdpServer {
    async fn run(mut self, subsys: SubsystemHandle) -> Result<()> {
        if let Ok(result) = self.process().cancel_on_shutdown(&subsys).await {
            result?;
        }

        Ok(())
    }
}
