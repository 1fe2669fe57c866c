//! Single-slot ports connecting two graph nodes.
//!
//! A connection holds at most one batch. The producer side (`OutputPort`)
//! pushes into the empty slot and eventually finishes; the consumer side
//! (`InputPort`) pulls, announces whether it currently wants data, and may
//! close the connection early to cancel upstream work.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use setflow_core::id::PortId;
use setflow_core::types::RowBatch;

use crate::traits::OpError;

#[derive(Debug, Default)]
struct PortState {
    slot: Option<RowBatch>,
    /// Producer will push nothing more.
    finished: bool,
    /// Consumer is gone; producer should stop.
    closed: bool,
    /// Consumer asked for data.
    needed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<PortState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PortState> {
        // A poisoned port only means another node panicked mid-update; the
        // slot itself is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a connected pair of ports.
pub fn connect(id: PortId) -> (OutputPort, InputPort) {
    let shared = Arc::new(Shared::default());
    (
        OutputPort {
            id,
            shared: Arc::clone(&shared),
        },
        InputPort { id, shared },
    )
}

#[derive(Debug)]
pub struct OutputPort {
    id: PortId,
    shared: Arc<Shared>,
}

impl OutputPort {
    pub fn id(&self) -> PortId {
        self.id
    }

    /// The slot is empty and the consumer is still attached.
    pub fn can_push(&self) -> bool {
        let st = self.shared.lock();
        !st.closed && !st.finished && st.slot.is_none()
    }

    pub fn push(&self, batch: RowBatch) -> Result<(), OpError> {
        let mut st = self.shared.lock();
        if st.closed || st.finished {
            return Err(OpError::invariant(format!(
                "push into {} after it was closed",
                self.id
            )));
        }
        if st.slot.is_some() {
            return Err(OpError::invariant(format!(
                "push into {} while its slot is full",
                self.id
            )));
        }
        st.slot = Some(batch);
        Ok(())
    }

    /// No more batches will be pushed. A batch already in the slot stays
    /// readable.
    pub fn finish(&self) {
        self.shared.lock().finished = true;
    }

    /// Either this side finished or the consumer closed the connection.
    pub fn is_finished(&self) -> bool {
        let st = self.shared.lock();
        st.closed || st.finished
    }

    /// The consumer closed the connection.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn is_needed(&self) -> bool {
        self.shared.lock().needed
    }
}

#[derive(Debug)]
pub struct InputPort {
    id: PortId,
    shared: Arc<Shared>,
}

impl InputPort {
    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn has_data(&self) -> bool {
        self.shared.lock().slot.is_some()
    }

    /// Nothing left to read: the producer finished and the slot is drained,
    /// or this side closed the connection.
    pub fn is_finished(&self) -> bool {
        let st = self.shared.lock();
        st.closed || (st.finished && st.slot.is_none())
    }

    pub fn pull(&self) -> Result<RowBatch, OpError> {
        let mut st = self.shared.lock();
        let batch = st
            .slot
            .take()
            .ok_or_else(|| OpError::invariant(format!("pull from empty {}", self.id)))?;
        st.needed = false;
        Ok(batch)
    }

    pub fn set_needed(&self) {
        self.shared.lock().needed = true;
    }

    pub fn set_not_needed(&self) {
        self.shared.lock().needed = false;
    }

    pub fn is_needed(&self) -> bool {
        self.shared.lock().needed
    }

    /// Detach from the producer and drop any batch in flight.
    pub fn close(&self) {
        let mut st = self.shared.lock();
        st.closed = true;
        st.needed = false;
        st.slot = None;
    }
}
