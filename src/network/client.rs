use crate::command::Command;
use crate::network::codec::encode;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("datagram of {length} bytes exceeds the device buffer of {max} bytes")]
    DatagramTooLarge { length: usize, max: usize },
    #[error("transport is not started")]
    NotStarted,
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SendOutcome {
    Sent,
    /// An identical datagram went out within the debounce window.
    Suppressed,
}

/// Remembers the last transmitted datagram to skip identical repeats.
#[derive(Debug)]
pub struct Debounce {
    window: Duration,
    last: Option<(Vec<u8>, Instant)>,
}

impl Debounce {
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn should_send(&self, datagram: &[u8], now: Instant) -> bool {
        match &self.last {
            Some((last, sent_at)) => {
                last.as_slice() != datagram || now.duration_since(*sent_at) >= self.window
            }
            None => true,
        }
    }

    pub fn record(&mut self, datagram: Vec<u8>, now: Instant) {
        self.last = Some((datagram, now));
    }
}

/// Sends commands to a device. Fire-and-forget, except for diagnostic queries.
#[derive(Debug)]
pub struct UdpClient {
    device: SocketAddr,
    max_datagram_size: usize,
    socket: Option<UdpSocket>,
    debounce: Option<Debounce>,
}

impl UdpClient {
    pub fn new(device: SocketAddr, max_datagram_size: usize) -> Self {
        Self {
            device,
            max_datagram_size,
            socket: None,
            debounce: None,
        }
    }

    #[must_use]
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(Debounce::new(window));
        self
    }

    pub fn device(&self) -> SocketAddr {
        self.device
    }

    pub fn is_started(&self) -> bool {
        self.socket.is_some()
    }

    pub async fn start(&mut self) -> Result<(), TransportError> {
        if self.socket.is_some() {
            return Ok(());
        }

        let bind_addr: SocketAddr = if self.device.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(self.device).await?;
        info!("transport to {} started", self.device);
        self.socket = Some(socket);

        Ok(())
    }

    pub fn stop(&mut self) {
        if self.socket.take().is_some() {
            info!("transport to {} stopped", self.device);
        }
    }

    pub async fn restart(&mut self) -> Result<(), TransportError> {
        self.stop();
        self.start().await
    }

    pub async fn send(&mut self, command: &Command) -> Result<SendOutcome, TransportError> {
        let datagram = self.encode_checked(command)?;
        let socket = self.socket.as_ref().ok_or(TransportError::NotStarted)?;
        let now = Instant::now();

        if let Some(debounce) = &self.debounce {
            if !debounce.should_send(&datagram, now) {
                debug!("suppressing repeated datagram: {:?}", datagram);
                return Ok(SendOutcome::Suppressed);
            }
        }

        if let Err(err) = socket.send(&datagram).await {
            warn!("failed to send datagram: {}", err);
            return Err(err.into());
        }

        if let Some(debounce) = &mut self.debounce {
            debounce.record(datagram, now);
        }

        Ok(SendOutcome::Sent)
    }

    /// Sends a diagnostic request and waits for the single reply datagram.
    pub async fn query(
        &mut self,
        command: &Command,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let datagram = self.encode_checked(command)?;
        let socket = self.socket.as_ref().ok_or(TransportError::NotStarted)?;
        socket.send(&datagram).await?;

        let mut buffer = vec![0; u16::MAX as usize];
        let length = time::timeout(timeout, socket.recv(&mut buffer))
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;
        buffer.truncate(length);

        Ok(buffer)
    }

    fn encode_checked(&self, command: &Command) -> Result<Vec<u8>, TransportError> {
        let datagram = encode(command);

        if datagram.len() > self.max_datagram_size {
            return Err(TransportError::DatagramTooLarge {
                length: datagram.len(),
                max: self.max_datagram_size,
            });
        }

        Ok(datagram)
    }
}
