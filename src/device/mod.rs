use crate::command::Command;
pub use crate::device::broadcast::{StateSnapshot, Subscription};
pub use crate::device::state::Device;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

pub mod animation;
pub mod broadcast;
pub mod pixels;
pub mod state;
pub mod task;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device task is no longer running")]
    Disconnected,
}

#[derive(Debug)]
pub enum DeviceRequest {
    Dispatch(Command),
    Subscribe(oneshot::Sender<Subscription>),
}

/// Cloneable handle through which other tasks reach the device task.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    tx: mpsc::Sender<DeviceRequest>,
}

impl DeviceHandle {
    pub fn new(tx: mpsc::Sender<DeviceRequest>) -> Self {
        Self { tx }
    }

    pub async fn dispatch(&self, command: Command) -> Result<(), DeviceError> {
        self.tx
            .send(DeviceRequest::Dispatch(command))
            .await
            .map_err(|_| DeviceError::Disconnected)
    }

    /// Returns the current state together with a feed of published updates.
    pub async fn subscribe(&self) -> Result<Subscription, DeviceError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(DeviceRequest::Subscribe(tx))
            .await
            .map_err(|_| DeviceError::Disconnected)?;

        rx.await.map_err(|_| DeviceError::Disconnected)
    }
}
