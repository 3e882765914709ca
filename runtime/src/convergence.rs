// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Convergence driver: keep nudging an infinite-scroll listing until it stops
//! producing new content.
//!
//! Completion cannot be observed directly, so it is inferred from two noisy
//! signals, the product-cell count and the document height. Each cycle
//! scrolls, clicks any "load more" control, waits, and re-samples. When both
//! signals have stayed flat for long enough and no "load more" control is
//! left on the page, the listing is considered converged.
//!
//! The decision logic lives in [`ConvergenceState`] as pure transitions so it
//! can be tested without a page; [`ConvergenceDriver`] only performs the I/O.

use crate::progress::{ProgressEventKind, Reporter};
use crate::scripts;
use crate::session::{RenderSession, SessionError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the driver is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Main loop: scroll, click, settle, sample.
    Scrolling,
    /// Both streaks met; checking for a remaining "load more" control.
    Probing,
    /// Stable and nothing left to click.
    Converged,
    /// The acquisition deadline passed.
    TimedOut,
    /// The cycle cap was hit before convergence. Extraction still proceeds.
    Exhausted,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Converged | Self::TimedOut | Self::Exhausted)
    }
}

/// When to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Consecutive cycles without new items.
    pub item_streak: u32,
    /// Consecutive cycles without height change.
    pub height_streak: u32,
    /// Hard cap on main-loop cycles.
    pub max_cycles: u32,
    /// Trailing passes after the main loop.
    pub final_passes: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            item_streak: 15,
            height_streak: 8,
            max_cycles: 500,
            final_passes: 10,
        }
    }
}

/// How long to wait after each kind of nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// After the scroll script.
    pub scroll_settle: Duration,
    /// Extra wait after clicking "load more".
    pub affordance_settle: Duration,
    /// End-of-cycle wait before re-sampling.
    pub settle: Duration,
    /// Wait after each trailing-pass scroll.
    pub final_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            scroll_settle: Duration::from_secs(1),
            affordance_settle: Duration::from_secs(3),
            settle: Duration::from_secs(4),
            final_settle: Duration::from_secs(3),
        }
    }
}

impl Timing {
    /// No waiting at all.
    pub const ZERO: Self = Self {
        scroll_settle: Duration::ZERO,
        affordance_settle: Duration::ZERO,
        settle: Duration::ZERO,
        final_settle: Duration::ZERO,
    };
}

/// One reading of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub count: u64,
    pub height: u64,
}

/// Counters carried between cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceState {
    pub previous_count: u64,
    pub previous_height: u64,
    pub no_new_items_streak: u32,
    pub no_height_change_streak: u32,
    /// Cycles run so far, including ones whose sample failed.
    pub attempt: u32,
    pub phase: Phase,
}

impl Default for ConvergenceState {
    fn default() -> Self {
        Self {
            previous_count: 0,
            previous_height: 0,
            no_new_items_streak: 0,
            no_height_change_streak: 0,
            attempt: 0,
            phase: Phase::Scrolling,
        }
    }
}

impl ConvergenceState {
    /// Fold one end-of-cycle sample into the state.
    ///
    /// `None` (a failed sample) counts the attempt but leaves every streak
    /// and baseline as it was. Moves to `Probing` once both streaks meet
    /// their thresholds, or to `Exhausted` at the cycle cap.
    pub fn observe(&mut self, sample: Option<Sample>, thresholds: &Thresholds) {
        self.attempt += 1;

        if let Some(sample) = sample {
            if sample.count == self.previous_count {
                self.no_new_items_streak += 1;
            } else {
                self.no_new_items_streak = 0;
            }
            if sample.height == self.previous_height {
                self.no_height_change_streak += 1;
            } else {
                self.no_height_change_streak = 0;
            }
            self.previous_count = sample.count;
            self.previous_height = sample.height;
        }

        self.phase = if self.streaks_met(thresholds) {
            Phase::Probing
        } else if self.attempt >= thresholds.max_cycles {
            Phase::Exhausted
        } else {
            Phase::Scrolling
        };
    }

    pub fn streaks_met(&self, thresholds: &Thresholds) -> bool {
        self.no_new_items_streak >= thresholds.item_streak
            && self.no_height_change_streak >= thresholds.height_streak
    }

    /// Settle a `Probing` state with the affordance check's answer.
    ///
    /// Converges exactly when [`should_terminate`] holds. A control still on
    /// the page resets the item streak. A failed check is treated as "keep
    /// scrolling" without touching the streaks, so the next cycle probes again.
    pub fn resolve_probe(&mut self, affordance_present: Option<bool>, thresholds: &Thresholds) {
        if self.phase != Phase::Probing {
            return;
        }
        self.phase = match affordance_present {
            Some(present) if should_terminate(self, thresholds, present) => Phase::Converged,
            Some(true) => {
                self.no_new_items_streak = 0;
                self.after_continue(thresholds)
            }
            _ => self.after_continue(thresholds),
        };
    }

    fn after_continue(&self, thresholds: &Thresholds) -> Phase {
        if self.attempt >= thresholds.max_cycles {
            Phase::Exhausted
        } else {
            Phase::Scrolling
        }
    }

    /// Record a trailing-pass sample: only growth is kept.
    pub fn observe_final(&mut self, sample: Option<Sample>) -> bool {
        match sample {
            Some(s) if s.count > self.previous_count => {
                self.previous_count = s.count;
                self.previous_height = s.height;
                true
            }
            _ => false,
        }
    }
}

/// Pure termination predicate: stable on both signals and nothing to click.
pub fn should_terminate(state: &ConvergenceState, thresholds: &Thresholds, affordance_present: bool) -> bool {
    state.streaks_met(thresholds) && !affordance_present
}

/// What the driver achieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvergenceOutcome {
    pub phase: Phase,
    pub cycles: u32,
    pub items: u64,
    pub height: u64,
    pub final_passes: u32,
}

/// Runs the scroll loop against one session.
pub struct ConvergenceDriver<'a> {
    session: &'a RenderSession,
    thresholds: Thresholds,
    timing: Timing,
    reporter: &'a mut Reporter,
    state: ConvergenceState,
}

impl<'a> ConvergenceDriver<'a> {
    pub fn new(
        session: &'a RenderSession,
        thresholds: Thresholds,
        timing: Timing,
        reporter: &'a mut Reporter,
    ) -> Self {
        Self {
            session,
            thresholds,
            timing,
            reporter,
            state: ConvergenceState::default(),
        }
    }

    /// Drive the page to convergence (or the cap, or the deadline), then run
    /// the trailing passes. Never fails: a deadline expiry is reported as
    /// [`Phase::TimedOut`].
    pub async fn run(mut self) -> ConvergenceOutcome {
        let mut final_passes = 0;
        if let Err(e) = self.main_loop().await {
            debug!(error = %e, "convergence interrupted");
            self.state.phase = Phase::TimedOut;
            self.emit_finished();
        } else if let Err(e) = self.final_passes(&mut final_passes).await {
            debug!(error = %e, "final passes interrupted");
            self.state.phase = Phase::TimedOut;
        }

        let outcome = ConvergenceOutcome {
            phase: self.state.phase,
            cycles: self.state.attempt,
            items: self.state.previous_count,
            height: self.state.previous_height,
            final_passes,
        };
        match outcome.phase {
            Phase::TimedOut => warn!(
                cycles = outcome.cycles,
                items = outcome.items,
                "deadline expired before the listing converged"
            ),
            Phase::Exhausted => warn!(
                cycles = outcome.cycles,
                items = outcome.items,
                "cycle cap reached; extracting what loaded"
            ),
            _ => info!(cycles = outcome.cycles, items = outcome.items, "listing converged"),
        }
        outcome
    }

    async fn main_loop(&mut self) -> Result<(), SessionError> {
        while !self.state.phase.is_terminal() {
            self.cycle().await?;
        }
        self.emit_finished();
        Ok(())
    }

    fn emit_finished(&mut self) {
        self.reporter.emit(ProgressEventKind::ConvergenceFinished {
            phase: self.state.phase,
            cycles: self.state.attempt,
            items: self.state.previous_count,
        });
    }

    async fn cycle(&mut self) -> Result<(), SessionError> {
        let cycle = self.state.attempt + 1;
        let before = self.sample().await?;

        self.attempt_script(&scripts::SCROLL, "scroll").await?;
        self.session.settle(self.timing.scroll_settle).await?;

        if self.click_more().await? {
            self.reporter.emit(ProgressEventKind::AffordanceActivated { cycle });
            info!(cycle, "clicked load-more control");
            self.session.settle(self.timing.affordance_settle).await?;
        }

        self.session.settle(self.timing.settle).await?;

        let after = self.sample().await?;
        self.state.observe(after, &self.thresholds);

        if let Some(after) = after {
            let height_delta = after.height as i64 - before.map_or(after.height, |b| b.height) as i64;
            info!(
                cycle,
                items = after.count,
                height = after.height,
                height_delta,
                "scroll cycle"
            );
            self.reporter.emit(ProgressEventKind::CycleCompleted {
                cycle,
                items: after.count,
                height: after.height,
                height_delta,
                no_new_items_streak: self.state.no_new_items_streak,
                no_height_change_streak: self.state.no_height_change_streak,
            });
        }

        if self.state.phase == Phase::Probing {
            let present = self.probe::<bool>(&scripts::AFFORDANCE_PRESENT, "affordance check").await?;
            if present == Some(true) {
                info!(cycle, "page looks stable but a load-more control remains; continuing");
            }
            self.state.resolve_probe(present, &self.thresholds);
        }
        Ok(())
    }

    async fn final_passes(&mut self, done: &mut u32) -> Result<(), SessionError> {
        for pass in 1..=self.thresholds.final_passes {
            if self.click_more().await? {
                info!(pass, "clicked load-more control in final pass");
                self.session.settle(self.timing.settle).await?;
            }
            if self.attempt_script(&scripts::FINAL_SCROLL, "final scroll").await? {
                self.session.settle(self.timing.final_settle).await?;
                let sample = self.sample().await?;
                if self.state.observe_final(sample) {
                    info!(pass, items = self.state.previous_count, "final pass found more products");
                }
            }
            *done = pass;
            self.reporter.emit(ProgressEventKind::FinalPass {
                pass,
                items: self.state.previous_count,
            });
        }
        Ok(())
    }

    async fn sample(&mut self) -> Result<Option<Sample>, SessionError> {
        self.probe(&scripts::SAMPLE, "sample").await
    }

    async fn click_more(&mut self) -> Result<bool, SessionError> {
        Ok(self.probe::<bool>(&scripts::CLICK_MORE, "load-more click").await? == Some(true))
    }

    /// Run a side-effect script; whether it ran without error.
    async fn attempt_script(&mut self, script: &str, what: &str) -> Result<bool, SessionError> {
        Ok(self.probe::<serde_json::Value>(script, what).await?.is_some())
    }

    /// Evaluate a script whose failure only means "no information".
    /// A deadline expiry is the one error that escapes.
    async fn probe<T: serde::de::DeserializeOwned>(
        &mut self,
        script: &str,
        what: &str,
    ) -> Result<Option<T>, SessionError> {
        match self.session.evaluate_as::<T>(script).await {
            Ok(value) => Ok(Some(value)),
            Err(SessionError::Timeout) => Err(SessionError::Timeout),
            Err(e) => {
                let message = format!("{what} failed: {e}");
                warn!(attempt = self.state.attempt, "{message}");
                self.reporter.emit(ProgressEventKind::Warning { message });
                Ok(None)
            }
        }
    }
}
