//! Worker thread: drains the hand-off slot into the slow processing stage.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, warn};

use crate::handoff::{Claim, HandoffReceiver};
use crate::{Lifecycle, PipelineState, PipelineStats, Processed, Processor};

pub struct ProcessingWorker<P: Processor> {
    processor: P,
    receiver: HandoffReceiver,
    lifecycle: Lifecycle,
    stats: Arc<PipelineStats>,
    poll_interval: Duration,
    results: Sender<Processed<P::Output>>,
}

impl<P: Processor> ProcessingWorker<P> {
    pub fn new(
        processor: P,
        receiver: HandoffReceiver,
        lifecycle: Lifecycle,
        stats: Arc<PipelineStats>,
        poll_interval: Duration,
        results: Sender<Processed<P::Output>>,
    ) -> Self {
        Self {
            processor,
            receiver,
            lifecycle,
            stats,
            poll_interval,
            results,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("worker".into())
            .spawn(move || self.run())
    }

    /// Process windows while `Running`/`Stopping`, then keep going until
    /// the slot is empty once `Draining` starts.
    pub fn run(mut self) {
        info!("worker started");
        loop {
            if self.lifecycle.state() >= PipelineState::Draining && self.receiver.is_empty() {
                break;
            }
            match self.receiver.take_timeout(self.poll_interval) {
                Ok(claim) => self.handle(claim),
                Err(RecvTimeoutError::Timeout) => continue,
                // sampler gone and nothing left in the slot
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("worker stopped");
    }

    fn handle(&mut self, claim: Claim) {
        let sequence = claim.sequence();
        let started = Instant::now();
        debug!(
            "processing window #{sequence} ({} frames, {:?} in slot, newest frame {:?} old at sampling)",
            claim.len(),
            claim.sampled_at().elapsed(),
            claim.staleness().unwrap_or_default()
        );

        let processor = &mut self.processor;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| processor.process(&claim)));
        // free the slot whatever happened above
        drop(claim);
        let latency = started.elapsed();

        match outcome {
            Ok(Ok(output)) => {
                self.stats.window_processed();
                info!("window #{sequence} processed in {latency:?}");
                let processed = Processed {
                    sequence,
                    output,
                    latency,
                };
                match self.results.try_send(processed) {
                    Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                    Err(TrySendError::Full(_)) => {
                        debug!("results channel full, result of window #{sequence} discarded")
                    }
                }
            }
            Ok(Err(e)) => {
                self.stats.processing_failed();
                warn!("window #{sequence} failed after {latency:?}: {e:#}");
            }
            Err(payload) => {
                self.stats.processing_failed();
                error!(
                    "processing panicked on window #{sequence}: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}
