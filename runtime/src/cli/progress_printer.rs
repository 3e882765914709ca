// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renders scrape progress events as human-readable stderr lines.

use crate::cli::output::Styled;
use crate::convergence::Phase;
use crate::progress::{ProgressEventKind, ProgressReceiver};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Print events until every sender is gone.
pub fn spawn(mut rx: ProgressReceiver, s: Styled) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = render(&event.event, &s) {
                        eprintln!("{line}");
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// One line for an event, or `None` for events not worth a line.
pub fn render(event: &ProgressEventKind, s: &Styled) -> Option<String> {
    let line = match event {
        ProgressEventKind::Navigated {
            url,
            attempt,
            load_time_ms,
        } => format!("  {} Loaded {url} (attempt {attempt}, {load_time_ms}ms)", s.ok_sym()),
        ProgressEventKind::CycleCompleted {
            cycle,
            items,
            height,
            height_delta,
            no_new_items_streak,
            no_height_change_streak,
        } => format!(
            "  {} cycle {cycle:>3}: {items} products, height {height} ({height_delta:+}), flat {no_new_items_streak}/{no_height_change_streak}",
            s.dim("·")
        ),
        ProgressEventKind::AffordanceActivated { cycle } => {
            format!("  {} cycle {cycle:>3}: clicked \"show more\"", s.dim("·"))
        }
        ProgressEventKind::ConvergenceFinished { phase, cycles, items } => {
            let sym = match phase {
                Phase::Converged => s.ok_sym(),
                _ => s.warn_sym(),
            };
            let phase = match phase {
                Phase::Converged => "converged",
                Phase::Exhausted => "hit the cycle cap",
                Phase::TimedOut => "ran out of time",
                Phase::Scrolling | Phase::Probing => "stopped",
            };
            format!("  {sym} Listing {phase} after {cycles} cycles with {items} products")
        }
        ProgressEventKind::FinalPass { .. } => return None,
        ProgressEventKind::Extracted { records, candidates } => {
            format!("  {} Extracted {records} products from {candidates} cells", s.ok_sym())
        }
        ProgressEventKind::Persisted {
            saved,
            updated,
            skipped,
            failed,
        } => format!(
            "  {} Saved {saved} new, updated {updated}, skipped {skipped}, failed {failed}",
            s.ok_sym()
        ),
        ProgressEventKind::Warning { message } => format!("  {} {message}", s.warn_sym()),
    };
    Some(line)
}
