//! Built-in graph endpoints: an in-memory source and a collecting sink.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use setflow_core::types::RowBatch;
use setflow_operators::{InputPort, OpError, OutputPort, Processor, Status};

/// Emits a fixed list of batches, one per free output slot, then finishes.
pub struct BatchSource {
    output: OutputPort,
    batches: VecDeque<RowBatch>,
}

impl BatchSource {
    pub fn new(output: OutputPort, batches: Vec<RowBatch>) -> Self {
        Self {
            output,
            batches: batches.into(),
        }
    }
}

impl Processor for BatchSource {
    fn name(&self) -> &'static str {
        "batch_source"
    }

    fn prepare(&mut self) -> Result<Status, OpError> {
        if self.output.is_finished() {
            if !self.batches.is_empty() {
                debug!(
                    dropped = self.batches.len(),
                    "consumer closed, dropping remaining batches"
                );
            }
            self.batches.clear();
            return Ok(Status::Finished);
        }
        if !self.output.can_push() {
            return Ok(Status::PortFull);
        }
        match self.batches.pop_front() {
            Some(batch) => {
                self.output.push(batch)?;
                if self.batches.is_empty() {
                    self.output.finish();
                    return Ok(Status::Finished);
                }
                Ok(Status::PortFull)
            }
            None => {
                self.output.finish();
                Ok(Status::Finished)
            }
        }
    }

    fn work(&mut self) -> Result<(), OpError> {
        Err(OpError::invariant("batch_source never asks for work()"))
    }
}

/// Handle to the batches a [`CollectSink`] received.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    inner: Arc<Mutex<Vec<RowBatch>>>,
}

impl Collected {
    fn lock(&self) -> MutexGuard<'_, Vec<RowBatch>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the collected batches out.
    pub fn take(&self) -> Vec<RowBatch> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Terminal node keeping every batch it receives, zero-row ones included.
///
/// With a row limit the sink closes its input once the limit is reached,
/// which cancels everything upstream.
pub struct CollectSink {
    input: InputPort,
    held: Option<RowBatch>,
    out: Collected,
    rows: usize,
    limit: Option<usize>,
}

impl CollectSink {
    pub fn new(input: InputPort) -> (Self, Collected) {
        let out = Collected::default();
        let sink = Self {
            input,
            held: None,
            out: out.clone(),
            rows: 0,
            limit: None,
        };
        (sink, out)
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|l| self.rows >= l)
    }
}

impl Processor for CollectSink {
    fn name(&self) -> &'static str {
        "collect_sink"
    }

    fn prepare(&mut self) -> Result<Status, OpError> {
        if self.held.is_some() {
            return Ok(Status::Ready);
        }
        if self.limit_reached() {
            if !self.input.is_finished() {
                debug!(rows = self.rows, "row limit reached, closing input");
                self.input.close();
            }
            return Ok(Status::Finished);
        }
        if self.input.is_finished() {
            return Ok(Status::Finished);
        }
        self.input.set_needed();
        if !self.input.has_data() {
            return Ok(Status::NeedData);
        }
        self.held = Some(self.input.pull()?);
        Ok(Status::Ready)
    }

    fn work(&mut self) -> Result<(), OpError> {
        let mut batch = self
            .held
            .take()
            .ok_or_else(|| OpError::invariant("collect_sink work() without a batch"))?;
        if let Some(limit) = self.limit {
            let room = limit.saturating_sub(self.rows);
            if batch.num_rows() > room {
                let mask: Vec<bool> = (0..batch.num_rows()).map(|i| i < room).collect();
                batch = batch.into_filtered(&mask)?;
            }
        }
        self.rows += batch.num_rows();
        self.out.lock().push(batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Executor;
    use setflow_core::id::PortId;
    use setflow_core::types::{Column, Scalar};
    use setflow_operators::connect;

    fn ints(v: &[i64]) -> RowBatch {
        RowBatch {
            columns: vec![Column::new("x", v.iter().copied().map(Scalar::I64).collect())],
        }
    }

    #[test]
    fn source_to_sink_keeps_every_batch() {
        let (out, inp) = connect(PortId::new(0));
        let (sink, collected) = CollectSink::new(inp);
        let mut exec = Executor::new(1);
        exec.add(Box::new(BatchSource::new(
            out,
            vec![ints(&[1]), ints(&[]), ints(&[2, 3])],
        )));
        exec.add(Box::new(sink));
        exec.run().unwrap();
        let got = collected.take();
        assert_eq!(got.len(), 3);
        assert_eq!(got[1].num_rows(), 0);
        assert!(collected.is_empty());
    }

    #[test]
    fn empty_source_finishes_sink() {
        let (out, inp) = connect(PortId::new(0));
        let (sink, collected) = CollectSink::new(inp);
        let mut exec = Executor::new(1);
        exec.add(Box::new(BatchSource::new(out, vec![])));
        exec.add(Box::new(sink));
        exec.run().unwrap();
        assert_eq!(collected.len(), 0);
    }

    #[test]
    fn limit_truncates_and_cancels_source() {
        let (out, inp) = connect(PortId::new(0));
        let (sink, collected) = CollectSink::new(inp);
        let mut exec = Executor::new(1);
        exec.add(Box::new(BatchSource::new(
            out,
            vec![ints(&[1, 2]), ints(&[3, 4]), ints(&[5])],
        )));
        exec.add(Box::new(sink.with_limit(Some(3))));
        exec.run().unwrap();
        let rows: usize = collected.take().iter().map(RowBatch::num_rows).sum();
        assert_eq!(rows, 3);
    }
}
