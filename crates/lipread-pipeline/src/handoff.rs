//! Single-slot hand-off between the sampler and the worker.
//!
//! Two capacity-1 crossbeam channels: one carries the window, the other a
//! single credit. An offer must win the credit before it may place a
//! window; the credit only comes back when the worker drops its
//! [`Claim`], i.e. after processing finished (or failed, or panicked).
//! So at most one window is ever in {slot, active processing call} and an
//! occupied slot is never overwritten.

use std::fmt;
use std::ops::Deref;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::Window;

/// Offer side, owned by the sampler.
pub struct HandoffSender {
    windows: Sender<Window>,
    credits: Receiver<()>,
    credit_return: Sender<()>,
}

/// Take side, owned by the worker.
pub struct HandoffReceiver {
    windows: Receiver<Window>,
    credit_return: Sender<()>,
}

/// Why an offer did not go through. The window is handed back.
#[derive(Debug)]
pub enum OfferError {
    /// The slot stayed occupied for the whole timeout.
    Full(Window),
    /// The worker side is gone.
    Closed(Window),
}

impl OfferError {
    pub fn into_window(self) -> Window {
        match self {
            Self::Full(w) | Self::Closed(w) => w,
        }
    }
}

impl fmt::Display for OfferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(w) => write!(f, "hand-off slot busy, window #{} dropped", w.sequence()),
            Self::Closed(w) => write!(f, "hand-off closed, window #{} dropped", w.sequence()),
        }
    }
}

impl std::error::Error for OfferError {}

/// A taken window. Dropping the claim frees the slot for the next offer.
pub struct Claim {
    window: Window,
    credit_return: Sender<()>,
}

impl Claim {
    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl Deref for Claim {
    type Target = Window;

    fn deref(&self) -> &Window {
        &self.window
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        let _ = self.credit_return.try_send(());
    }
}

/// Create a connected sender/receiver pair with one free slot.
pub fn channel() -> (HandoffSender, HandoffReceiver) {
    let (window_tx, window_rx) = bounded::<Window>(1);
    let (credit_tx, credit_rx) = bounded::<()>(1);
    let _ = credit_tx.try_send(());

    (
        HandoffSender {
            windows: window_tx,
            credits: credit_rx,
            credit_return: credit_tx.clone(),
        },
        HandoffReceiver {
            windows: window_rx,
            credit_return: credit_tx,
        },
    )
}

impl HandoffSender {
    /// Place `window` in the slot, waiting up to `timeout` for it to free
    /// up. A refused window is returned inside the error and is not retried.
    pub fn offer(&self, window: Window, timeout: Duration) -> Result<(), OfferError> {
        match self.credits.recv_timeout(timeout) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => return Err(OfferError::Full(window)),
            Err(RecvTimeoutError::Disconnected) => return Err(OfferError::Closed(window)),
        }
        match self.windows.try_send(window) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(w)) => {
                let _ = self.credit_return.try_send(());
                Err(OfferError::Full(w))
            }
            Err(TrySendError::Disconnected(w)) => {
                let _ = self.credit_return.try_send(());
                Err(OfferError::Closed(w))
            }
        }
    }
}

impl HandoffReceiver {
    /// Wait up to `wait` for a window.
    pub fn take_timeout(&self, wait: Duration) -> Result<Claim, RecvTimeoutError> {
        let window = self.windows.recv_timeout(wait)?;
        Ok(Claim {
            window,
            credit_return: self.credit_return.clone(),
        })
    }

    /// True when no window is waiting in the slot.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
