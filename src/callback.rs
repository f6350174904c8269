//! Completion and receive callbacks.
//!
//! Send-side completion and receive-side delivery both happen through
//! object-safe traits so application code can plug in stateless handlers.
//! The receive callback on a live connection is replaceable mid-stream
//! through [`ReceiverCell`], an atomic swap cell: the read loop loads the
//! current callback once per delivery.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::FramewireError;
use crate::protocol::Message;

/// Completion callback for one send operation.
pub trait SendCallback: Send + Sync {
    /// The frame was fully written to the channel.
    fn on_send_complete(&self);

    /// The frame could not be sent; the buffer has been returned to the
    /// pool.
    fn on_exception(&self, error: &FramewireError);
}

/// Receiver of decoded messages for one connection.
pub trait ReceiveCallback: Send + Sync {
    /// A complete typed value arrived.
    fn receive(&self, message: Message);

    /// A payload inside an intact frame was malformed. The connection
    /// continues.
    fn exception(&self, error: FramewireError);
}

/// Atomically replaceable [`ReceiveCallback`] reference.
///
/// `ArcSwap` requires a sized pointee, so the trait object rides inside a
/// private slot struct.
pub struct ReceiverCell {
    slot: ArcSwap<Slot>,
}

struct Slot(Arc<dyn ReceiveCallback>);

impl ReceiverCell {
    pub fn new(callback: Arc<dyn ReceiveCallback>) -> Self {
        Self {
            slot: ArcSwap::from_pointee(Slot(callback)),
        }
    }

    /// Swap in a new callback; deliveries already in flight keep the one
    /// they loaded.
    pub fn replace(&self, callback: Arc<dyn ReceiveCallback>) {
        self.slot.store(Arc::new(Slot(callback)));
    }

    /// Load the current callback.
    pub fn current(&self) -> Arc<dyn ReceiveCallback> {
        self.slot.load().0.clone()
    }
}
