//! Deduplicating write buffer
//!
//! The buffer is the only shared mutable state in a crawl stage. Workers
//! call [`DedupBuffer::accept`] concurrently; records are checked against
//! the seen-set and staged under one lock, and whichever caller fills a
//! batch becomes the flusher. Only one flusher runs at a time, so batches
//! reach the sink in acceptance order.

use crate::config::IdentityKey;
use crate::pipeline::traits::{PipelineError, RecordSink};
use crate::record::Record;
use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Outcome of offering a record to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// The record was new and is staged (or already flushed)
    Staged,
    /// A record with the same identity key was seen earlier; dropped
    Duplicate,
}

/// Counters describing what a buffer has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub accepted: usize,
    pub duplicates: usize,
    pub flushed_records: usize,
    pub flush_batches: usize,
}

struct BufferState<R> {
    seen: HashSet<String>,
    staged: Vec<R>,
    flush_in_flight: bool,
    closed: bool,
    stats: BufferStats,
}

/// In-memory staging area that drops duplicates and flushes in batches
pub struct DedupBuffer<R: Record, S: RecordSink<R>> {
    state: Mutex<BufferState<R>>,
    flush_done: Condvar,
    sink: Mutex<S>,
    batch_limit: usize,
    identity: IdentityKey,
    close_timeout: Duration,
    destination: String,
}

impl<R: Record, S: RecordSink<R>> DedupBuffer<R, S> {
    /// Creates a buffer in front of `sink`
    ///
    /// A `batch_limit` of zero is treated as one.
    pub fn new(sink: S, batch_limit: usize, identity: IdentityKey) -> Self {
        let destination = sink.destination();
        Self {
            state: Mutex::new(BufferState {
                seen: HashSet::new(),
                staged: Vec::new(),
                flush_in_flight: false,
                closed: false,
                stats: BufferStats::default(),
            }),
            flush_done: Condvar::new(),
            sink: Mutex::new(sink),
            batch_limit: batch_limit.max(1),
            identity,
            close_timeout: Duration::from_secs(3),
            destination,
        }
    }

    /// Sets how long [`close`](Self::close) waits for an in-flight flush
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Seeds the seen-set, e.g. from keys already present in the sink
    ///
    /// Returns the number of keys that were not already known.
    pub fn preload<I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut state = self.lock_state();
        keys.into_iter()
            .filter(|key| state.seen.insert(key.clone()))
            .count()
    }

    /// Offers a record to the buffer
    ///
    /// Duplicates are dropped and logged. When the staged batch reaches the
    /// limit and no flush is running, this call writes it out before
    /// returning; if another caller is already flushing, that flusher
    /// drains the new batch as well.
    pub fn accept(&self, record: R) -> Result<Acceptance, PipelineError> {
        let batch = {
            let mut state = self.lock_state();
            if state.closed {
                return Err(PipelineError::Closed {
                    destination: self.destination.clone(),
                });
            }

            let key = record.identity_key(self.identity).to_string();
            if state.seen.contains(&key) {
                state.stats.duplicates += 1;
                tracing::warn!(
                    "Duplicate {} found: {}. Item dropped.",
                    R::KIND,
                    key
                );
                return Ok(Acceptance::Duplicate);
            }

            state.seen.insert(key);
            state.staged.push(record);
            state.stats.accepted += 1;

            if state.staged.len() >= self.batch_limit && !state.flush_in_flight {
                state.flush_in_flight = true;
                Some(std::mem::take(&mut state.staged))
            } else {
                None
            }
        };

        if let Some(batch) = batch {
            self.drain(batch)?;
        }

        Ok(Acceptance::Staged)
    }

    /// Writes every staged record to the sink
    ///
    /// Waits (bounded) for an in-flight flush first so batches stay in
    /// acceptance order. Flushing an empty buffer is a no-op.
    pub fn flush(&self) -> Result<(), PipelineError> {
        let (mut state, timed_out) = self.wait_for_idle();
        if timed_out {
            return Err(PipelineError::FlushTimeout {
                destination: self.destination.clone(),
                waited: self.close_timeout,
            });
        }

        if state.staged.is_empty() {
            return Ok(());
        }

        state.flush_in_flight = true;
        let batch = std::mem::take(&mut state.staged);
        drop(state);

        self.drain(batch)
    }

    /// Flushes the remaining records and rejects further input
    ///
    /// If a flush is in flight, waits up to the close timeout for it. When
    /// the wait times out the remainder is still written, so nothing staged
    /// is lost, but it may land after the in-flight batch finishes.
    pub fn close(&self) -> Result<BufferStats, PipelineError> {
        let (mut state, timed_out) = self.wait_for_idle();
        state.closed = true;
        let batch = std::mem::take(&mut state.staged);

        if timed_out {
            tracing::warn!(
                "Flush to {} still running after {:?}; writing {} remaining record(s) anyway",
                self.destination,
                self.close_timeout,
                batch.len()
            );
            drop(state);
            self.write_batch(&batch)?;
            let mut state = self.lock_state();
            state.stats.flushed_records += batch.len();
            if !batch.is_empty() {
                state.stats.flush_batches += 1;
            }
            return Ok(state.stats);
        }

        if !batch.is_empty() {
            state.flush_in_flight = true;
            drop(state);
            self.drain(batch)?;
        } else {
            drop(state);
        }

        let stats = self.stats();
        tracing::debug!(
            "Closed buffer for {}: {} accepted, {} duplicates, {} flushed in {} batch(es)",
            self.destination,
            stats.accepted,
            stats.duplicates,
            stats.flushed_records,
            stats.flush_batches
        );
        Ok(stats)
    }

    pub fn stats(&self) -> BufferStats {
        self.lock_state().stats
    }

    /// Number of records currently waiting for a flush
    pub fn staged_len(&self) -> usize {
        self.lock_state().staged.len()
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Writes `batch` and any full batches staged meanwhile
    ///
    /// The caller must have set `flush_in_flight`; it is cleared here.
    fn drain(&self, mut batch: Vec<R>) -> Result<(), PipelineError> {
        loop {
            let written = self.write_batch(&batch);

            let mut state = self.lock_state();
            if let Err(e) = written {
                state.flush_in_flight = false;
                self.flush_done.notify_all();
                return Err(e);
            }

            state.stats.flushed_records += batch.len();
            state.stats.flush_batches += 1;

            if state.staged.len() >= self.batch_limit {
                batch = std::mem::take(&mut state.staged);
                continue;
            }

            state.flush_in_flight = false;
            self.flush_done.notify_all();
            return Ok(());
        }
    }

    fn write_batch(&self, batch: &[R]) -> Result<(), PipelineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        sink.append(batch).map_err(|source| PipelineError::Flush {
            destination: self.destination.clone(),
            records: batch.len(),
            source,
        })?;

        tracing::debug!(
            "Flushed {} {} record(s) to {}",
            batch.len(),
            R::KIND,
            self.destination
        );
        Ok(())
    }

    /// Locks the state once no flush is in flight, or after the close timeout
    fn wait_for_idle(&self) -> (MutexGuard<'_, BufferState<R>>, bool) {
        let state = self.lock_state();
        let (state, wait) = self
            .flush_done
            .wait_timeout_while(state, self.close_timeout, |s| s.flush_in_flight)
            .unwrap_or_else(PoisonError::into_inner);
        let timed_out = wait.timed_out() && state.flush_in_flight;
        (state, timed_out)
    }

    fn lock_state(&self) -> MutexGuard<'_, BufferState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
