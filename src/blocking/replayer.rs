//! Provide OplogReplayer, which drives a whole replay.

use bson::Document;
use std::io::Read;
use std::time::{Duration, Instant};
use tracing::{error, info};

use super::applier::{apply_operation, ApplyOutcome};
use super::oplog_reader::OplogReader;
use super::store::Store;
use super::time_helper;
use crate::error::{ConvertError, ReplayError, Result};
use crate::oplog;
use crate::operation::Operation;
use crate::throttle::RateController;
use crate::{NAMESPACE_KEY, OP_KEY};

const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

/// Replay progress.  `Completed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    /// replay not started.
    Idle,
    /// reading and applying entries.
    Running,
    /// whole log applied.
    Completed,
    /// stopped at the first failed entry.
    Aborted,
}

/// Counters of a completed replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    /// operations applied against the store.
    pub applied: u64,
    /// entries dropped, like system namespace changes.
    pub dropped: u64,
    /// applied updates and removes whose document didn't exist.
    pub missing: u64,
    /// wall time of the replay.
    pub elapsed: Duration,
}

/// Replay an oplog stream against a [Store], one entry at a time, in log order.
///
/// The first failed entry aborts the whole replay, nothing is retried or skipped.  Re-running
/// the same log from the start is always safe because every operation is applied idempotently.
///
/// # Example
/// ```
/// use bson::doc;
/// use oplog_replay::{MemoryStore, Namespace, OplogReplayer, RateController};
///
/// let mut log = vec![];
/// doc! {"v": 2, "op": "i", "ns": "a.b", "o": {"_id": "x", "val": 1}}.to_writer(&mut log).unwrap();
///
/// let mut replayer = OplogReplayer::new(MemoryStore::new(), RateController::new(1000.0).unwrap());
/// let summary = replayer.replay(log.as_slice()).unwrap();
/// assert_eq!(summary.applied, 1);
/// assert!(replayer.store().get(&Namespace::new("a", "b"), "x").is_some());
/// ```
pub struct OplogReplayer<S> {
    store: S,
    rate: RateController,
    state: ReplayState,
    applied: u64,
    dropped: u64,
    missing: u64,
    progress_interval: u64,
}

impl<S: Store> OplogReplayer<S> {
    /// create a replayer which applies operations against `store`, paced by `rate`.
    pub fn new(store: S, rate: RateController) -> Self {
        OplogReplayer {
            store,
            rate,
            state: ReplayState::Idle,
            applied: 0,
            dropped: 0,
            missing: 0,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// log progress every `interval` applied operations, 0 disables progress logs.
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// current state.
    pub fn state(&self) -> ReplayState {
        self.state
    }

    /// operations applied so far, only ever grows.
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// get target store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// take target store back.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Replay every entry of `reader` until EOF.
    ///
    /// A replayer runs once, calling it again after it started returns an error.
    pub fn replay<R: Read>(&mut self, reader: R) -> Result<ReplaySummary> {
        if self.state != ReplayState::Idle {
            return Err(ReplayError::AlreadyStarted);
        }
        self.state = ReplayState::Running;
        let start = Instant::now();
        info!(speed = self.rate.ops_per_second(), "Begin to replay oplog.");

        let mut reader = OplogReader::new(reader);
        match self.replay_entries(&mut reader, start) {
            Ok(()) => {
                self.state = ReplayState::Completed;
                let summary = self.summary(start.elapsed());
                info!(
                    applied = summary.applied,
                    dropped = summary.dropped,
                    missing = summary.missing,
                    elapsed_secs = summary.elapsed.as_secs_f64(),
                    "Replay oplog complete."
                );
                Ok(summary)
            }
            Err(e) => {
                self.state = ReplayState::Aborted;
                error!(
                    applied = self.applied,
                    entries = reader.entries_read(),
                    %e,
                    "Replay oplog aborted."
                );
                Err(e)
            }
        }
    }

    fn replay_entries<R: Read>(&mut self, reader: &mut OplogReader<R>, start: Instant) -> Result<()> {
        while let Some(entry) = reader.next_entry()? {
            let entry_no = reader.entries_read();
            let op = match oplog::convert(&entry) {
                Ok(Some(op)) => op,
                Ok(None) => {
                    self.dropped += 1;
                    continue;
                }
                Err(source) => return Err(convert_error(entry_no, &entry, source)),
            };

            // dropped entries don't count, pacing is on applied operations only.
            let wait = self.rate.wait_before(self.applied, start);
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }

            match apply_operation(&op, &mut self.store) {
                Ok(ApplyOutcome::Written) => {}
                Ok(ApplyOutcome::Missing) => self.missing += 1,
                Err(source) => return Err(apply_error(entry_no, &op, source)),
            }
            self.applied += 1;

            if self.progress_interval > 0 && self.applied % self.progress_interval == 0 {
                info!(applied = self.applied, entries = entry_no, "Replay progress.");
            }
        }
        Ok(())
    }

    fn summary(&self, elapsed: Duration) -> ReplaySummary {
        ReplaySummary {
            applied: self.applied,
            dropped: self.dropped,
            missing: self.missing,
            elapsed,
        }
    }
}

fn convert_error(entry_no: u64, entry: &Document, source: ConvertError) -> ReplayError {
    ReplayError::ConvertError {
        entry: entry_no,
        op: entry.get_str(OP_KEY).unwrap_or("<missing>").to_string(),
        ns: entry.get_str(NAMESPACE_KEY).unwrap_or("<missing>").to_string(),
        ts: time_helper::entry_time(entry)
            .map(|t| format!(", ts: {}", t))
            .unwrap_or_default(),
        source,
    }
}

fn apply_error(entry_no: u64, op: &Operation, source: ReplayError) -> ReplayError {
    ReplayError::ApplyError {
        entry: entry_no,
        kind: op.kind().as_str(),
        ns: op.namespace().to_string(),
        id: op.id(),
        source: Box::new(source),
    }
}
