// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for scrape telemetry.
//!
//! The acquisition pipeline emits `ProgressEvent`s while it drives the
//! listing page, which flow through a `tokio::sync::broadcast` channel to
//! all subscribers (the CLI progress printer, tests). When no subscriber
//! exists, events are silently dropped.

use crate::convergence::Phase;
use serde::{Deserialize, Serialize};

/// A progress event emitted during a scrape run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of progress event.
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// The listing page loaded.
    Navigated {
        url: String,
        attempt: u32,
        load_time_ms: u64,
    },
    /// One scroll cycle finished and was sampled.
    CycleCompleted {
        cycle: u32,
        items: u64,
        height: u64,
        height_delta: i64,
        no_new_items_streak: u32,
        no_height_change_streak: u32,
    },
    /// A "load more" control was clicked.
    AffordanceActivated { cycle: u32 },
    /// The main loop ended.
    ConvergenceFinished { phase: Phase, cycles: u32, items: u64 },
    /// One of the trailing passes after the main loop.
    FinalPass { pass: u32, items: u64 },
    /// Records were read off the converged page.
    Extracted { records: usize, candidates: usize },
    /// The batch was committed.
    Persisted {
        saved: usize,
        updated: usize,
        skipped: usize,
        failed: usize,
    },
    /// A non-fatal warning occurred.
    Warning { message: String },
}

/// Sender handle for emitting progress events.
///
/// Backed by a `tokio::sync::broadcast` channel so multiple listeners can
/// subscribe independently. When no listeners exist, `send()` returns an error
/// which we silently ignore.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
///
/// 256 events covers a typical run's cycle events between receiver polls;
/// a slow receiver sees `Lagged` rather than stalling the scrape.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Convenience helper: emit a progress event, silently ignoring send errors
/// (which occur when no receivers are listening).
pub fn emit(tx: &Option<ProgressSender>, run_id: &str, seq: &mut u64, event: ProgressEventKind) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(ProgressEvent {
            run_id: run_id.to_string(),
            seq: *seq,
            event,
        });
    }
}

/// A run id plus its sequence counter, threaded through one scrape.
#[derive(Debug, Clone)]
pub struct Reporter {
    tx: Option<ProgressSender>,
    run_id: String,
    seq: u64,
}

impl Reporter {
    pub fn new(tx: Option<ProgressSender>) -> Self {
        Self {
            tx,
            run_id: uuid::Uuid::new_v4().to_string(),
            seq: 0,
        }
    }

    /// A reporter that drops everything.
    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn emit(&mut self, event: ProgressEventKind) {
        emit(&self.tx, &self.run_id, &mut self.seq, event);
    }
}
