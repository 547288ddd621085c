//! Event processing loop shared across all input modes.
//!
//! Pulls [`EngineEvent`]s from any [`EventSource`] and forwards them to the
//! proximity engine until the source ends or shutdown is requested.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::source::{EngineEvent, EventSource, SourceEvent};
use crate::proximity::{EngineHandle, EngineStats};

/// Log a progress line every this many events.
const PROGRESS_INTERVAL: u64 = 100;

/// Drives an [`EngineHandle`] from an event source.
///
/// Built with [`new()`](ProcessingLoop::new), then consumed by
/// [`run()`](ProcessingLoop::run).
pub struct ProcessingLoop {
    handle: EngineHandle,
    cancel_token: CancellationToken,
}

impl ProcessingLoop {
    pub fn new(handle: EngineHandle, cancel_token: CancellationToken) -> Self {
        Self {
            handle,
            cancel_token,
        }
    }

    /// Run until the source is exhausted or cancellation.
    ///
    /// Returns engine statistics as of the last forwarded event.
    pub async fn run<S: EventSource>(self, source: &mut S) -> Result<EngineStats> {
        let mut events_processed = 0u64;

        info!("📍 Processing engine events from {}...", source.source_name());

        loop {
            let event = tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("[ProcessingLoop] Shutdown signal received");
                    break;
                }
                result = source.next_event() => {
                    match result {
                        Ok(ev) => ev,
                        Err(e) => {
                            warn!("[ProcessingLoop] Source error: {}", e);
                            break;
                        }
                    }
                }
            };

            let event = match event {
                SourceEvent::Event(e) => e,
                SourceEvent::Eof => {
                    info!(
                        "[ProcessingLoop] Source reached end ({} events processed)",
                        events_processed
                    );
                    break;
                }
            };

            events_processed += 1;
            self.dispatch(event).await?;

            if events_processed % PROGRESS_INTERVAL == 0 {
                let stats = self.handle.stats().await?;
                info!(
                    "📈 Progress: {} events | Regions: {} | Delivered: {} | Throttled: {}",
                    events_processed, stats.active_regions, stats.delivered, stats.throttled
                );
            }
        }

        self.handle.stats().await
    }

    async fn dispatch(&self, event: EngineEvent) -> Result<()> {
        match event {
            EngineEvent::Location(sample) => {
                debug!(lat = sample.lat, lon = sample.lon, ts = %sample.timestamp, "Location event");
                self.handle.location_update(sample).await
            }
            EngineEvent::Stores { stores } => {
                self.handle
                    .store_set_changed(EngineEvent::into_stores(stores))
                    .await
            }
            EngineEvent::Authorization { status } => {
                self.handle.authorization_changed(status).await
            }
        }
    }
}
