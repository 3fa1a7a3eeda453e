use crate::device::state::Device;
use crate::device::DeviceRequest;
use anyhow::{Error, Result};
use std::time::Duration;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_graceful_shutdown::{FutureExt, IntoSubsystem, SubsystemHandle};
use tracing::{debug, info, instrument};

/// Runs command dispatch, animation frames and broadcast flushes on a single
/// task so that none of them ever interleave.
#[derive(Debug)]
pub struct DeviceTask {
    rx: mpsc::Receiver<DeviceRequest>,
    device: Device,
    tick_interval: Duration,
    flush_interval: Duration,
}

impl DeviceTask {
    pub fn new(
        rx: mpsc::Receiver<DeviceRequest>,
        device: Device,
        tick_interval: Duration,
        flush_interval: Duration,
    ) -> Self {
        Self {
            rx,
            device,
            tick_interval,
            flush_interval,
        }
    }

    #[instrument(skip(self))]
    async fn process(&mut self) -> Result<()> {
        info!("device running with {} pixels", self.device.pixels().len());

        let mut frame_ticker = interval(self.tick_interval);
        frame_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut flush_ticker = interval(self.flush_interval);
        flush_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                request = self.rx.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
                _ = frame_ticker.tick() => {
                    self.device.tick(Instant::now());
                }
                _ = flush_ticker.tick() => self.device.flush(Instant::now()),
            }
        }

        Ok(())
    }

    fn handle_request(&mut self, request: DeviceRequest) {
        match request {
            DeviceRequest::Dispatch(command) => {
                debug!("dispatching command: {:?}", command);
                self.device.dispatch(command, Instant::now());
            }
            DeviceRequest::Subscribe(reply) => {
                if reply.send(self.device.subscribe()).is_err() {
                    debug!("subscriber went away before attaching");
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl IntoSubsystem<Error> for DeviceTask {
    async fn run(mut self, subsys: SubsystemHandle) -> Result<()> {
        if let Ok(result) = self.process().cancel_on_shutdown(&subsys).await {
            result?;
        }

        Ok(())
    }
}
