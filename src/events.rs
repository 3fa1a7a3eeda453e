use crate::device::{DeviceHandle, Subscription};
use anyhow::{Context, Error, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::{self, Stream};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_graceful_shutdown::{FutureExt, IntoSubsystem, SubsystemHandle};
use tracing::{debug, info, instrument, warn};

/// Serves device state snapshots as server-sent events on `/events`.
#[derive(Debug)]
pub struct EventServer {
    listener: TcpListener,
    device: DeviceHandle,
}

impl EventServer {
    pub async fn bind(listen: SocketAddr, device: DeviceHandle) -> Result<Self> {
        let listener = TcpListener::bind(listen)
            .await
            .with_context(|| format!("unable to bind event server on {listen}"))?;

        Ok(Self { listener, device })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    #[instrument(skip(self))]
    async fn process(self) -> Result<()> {
        info!("serving state events on http://{}/events", self.local_addr()?);

        let app = router(self.device);
        axum::serve(self.listener, app).await?;

        Ok(())
    }
}

pub fn router(device: DeviceHandle) -> Router {
    Router::new()
        .route("/events", get(events))
        .with_state(device)
}

async fn events(State(device): State<DeviceHandle>) -> Response {
    match device.subscribe().await {
        Ok(subscription) => {
            debug!("event stream opened");
            Sse::new(snapshot_events(subscription))
                .keep_alive(KeepAlive::default())
                .into_response()
        }
        Err(err) => {
            warn!("unable to subscribe to device state: {}", err);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

/// Emits the state at subscription time, then the latest state after every
/// publish. Ends when the device goes away.
fn snapshot_events(
    subscription: Subscription,
) -> impl Stream<Item = Result<Event, axum::Error>> {
    let Subscription { current, updates } = subscription;

    stream::unfold((Some(current), updates), |(first, mut updates)| async move {
        let snapshot = match first {
            Some(snapshot) => snapshot,
            None => {
                updates.changed().await.ok()?;
                updates.borrow_and_update().clone()
            }
        };

        Some((Event::default().json_data(&snapshot), (None, updates)))
    })
}

#[async_trait::async_trait]
impl IntoSubsystem<Error> for EventServer {
    async fn run(self, subsys: SubsystemHandle) -> Result<()> {
        if let Ok(result) = self.process().cancel_on_shutdown(&subsys).await {
            result?;
        }

        Ok(())
    }
}
