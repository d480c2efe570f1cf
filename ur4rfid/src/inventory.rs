//! Inventory stream processing
//!
//! The processor polls a streaming [`Reader`], filters detections through a
//! [`Deduplicator`] it owns, and sends crossing events to a bounded channel.
//! Whoever delivers the events reports back through an [`OutcomeReporter`],
//! which feeds the retry backoff.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use ur4rfid_types::TagCrossing;

use crate::dedup::{DedupConfig, DedupStats, Deduplicator};
use crate::error::Result;
use crate::reader::Reader;

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug)]
struct Outcome {
    epc: String,
    succeeded: bool,
    at: Instant,
}

/// Reports delivery outcomes of emitted events
#[derive(Debug, Clone)]
pub struct OutcomeReporter {
    tx: mpsc::UnboundedSender<Outcome>,
}

impl OutcomeReporter {
    /// Report whether delivering the event for `epc` succeeded
    ///
    /// Returns false once the processor is gone.
    pub fn report(&self, epc: impl Into<String>, succeeded: bool) -> bool {
        self.tx
            .send(Outcome {
                epc: epc.into(),
                succeeded,
                at: Instant::now(),
            })
            .is_ok()
    }
}

/// Inventory processor
pub struct InventoryProcessor {
    reader: Reader,
    dedup: Deduplicator,
    events: mpsc::Sender<TagCrossing>,
    outcomes: mpsc::UnboundedReceiver<Outcome>,
    poll_interval: Duration,
    sweep_interval: Duration,
    last_sweep: Instant,
}

impl InventoryProcessor {
    /// Create a processor with its event receiver and outcome reporter
    pub fn new(
        reader: Reader,
        config: DedupConfig,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<TagCrossing>, OutcomeReporter) {
        let (events, events_rx) = mpsc::channel(capacity.max(1));
        let (outcomes_tx, outcomes) = mpsc::unbounded_channel();

        let poll_interval = reader.config().poll_interval;
        let sweep_interval = config.window;

        let processor = Self {
            reader,
            dedup: Deduplicator::new(config),
            events,
            outcomes,
            poll_interval,
            sweep_interval,
            last_sweep: Instant::now(),
        };

        (processor, events_rx, OutcomeReporter { tx: outcomes_tx })
    }

    /// Set the interval between reader polls
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the interval between dedup sweeps
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Dedup counters so far
    pub fn stats(&self) -> DedupStats {
        self.dedup.stats()
    }

    /// Deduplicator state
    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    /// Poll once and emit the detections that pass the deduplicator
    ///
    /// Returns the number of events sent. Stops early if the event receiver
    /// is gone. Waits for room in the event channel when it is full.
    pub async fn step(&mut self) -> Result<usize> {
        let never = std::future::pending::<()>();
        tokio::pin!(never);

        Ok(self.poll_once(never).await?.unwrap_or_default())
    }

    /// Poll once, giving up on a full event channel when `shutdown` completes
    ///
    /// Returns `None` if `shutdown` completed first.
    async fn poll_once<F>(&mut self, mut shutdown: Pin<&mut F>) -> Result<Option<usize>>
    where
        F: Future<Output = ()>,
    {
        self.apply_outcomes();

        let detections = self.reader.poll_inventory().await?;
        let mut sent = 0;

        for detection in detections {
            if !self
                .dedup
                .should_emit(&detection.epc, detection.antenna, Instant::now())
            {
                continue;
            }

            tokio::select! {
                biased;
                delivered = self.events.send(detection.crossing()) => {
                    if delivered.is_err() {
                        debug!("Event receiver dropped");
                        break;
                    }
                }
                _ = shutdown.as_mut() => {
                    debug!("Shutdown while event channel is full, dropping {}", detection.epc);
                    return Ok(None);
                }
            }
            sent += 1;
        }

        let now = Instant::now();
        if now.saturating_duration_since(self.last_sweep) >= self.sweep_interval {
            self.dedup.sweep(now);
            self.last_sweep = now;
        }

        Ok(Some(sent))
    }

    /// Run until `shutdown` completes, the event receiver is dropped, or the
    /// reader fails
    ///
    /// Polls that fail because inventory is paused or stopped are retried on
    /// the next tick. Returns the final dedup counters.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<DedupStats>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Inventory processor started on {}", self.reader.port_name());

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Inventory processor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.poll_once(shutdown.as_mut()).await {
                        Ok(Some(_)) => {}
                        Ok(None) => {
                            info!("Inventory processor shutting down");
                            break;
                        }
                        Err(e) if e.is_recoverable() => debug!("Inventory poll skipped: {}", e),
                        Err(e) => {
                            warn!("Inventory processor stopped: {}", e);
                            return Err(e);
                        }
                    }

                    if self.events.is_closed() {
                        info!("Event receiver dropped, stopping inventory processor");
                        break;
                    }
                }
            }
        }

        self.apply_outcomes();
        Ok(self.dedup.stats())
    }

    fn apply_outcomes(&mut self) {
        while let Ok(outcome) = self.outcomes.try_recv() {
            self.dedup
                .record_outcome(&outcome.epc, outcome.succeeded, outcome.at);
        }
    }
}
