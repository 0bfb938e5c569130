// src/services/progress.rs
//! Analysis progress tracking.
//!
//! A run moves `idle -> processing -> {completed | error}`. Website runs pass
//! through `finalizing` before completing. Every producer of progress (remote
//! polling and local simulation) writes through one [`ProgressSink`], which
//! keeps the value non-decreasing and reserves 100 for completion.

use log::debug;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;

use crate::storage::InsightSource;

/// Simulated progress stops here until a terminal event arrives.
pub const SIMULATION_CEILING: u8 = 95;

/// Highest value reachable before the completed transition.
const MAX_IN_FLIGHT: u8 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Idle,
    Processing,
    Finalizing,
    Completed,
    Error,
}

impl ProcessingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingState::Completed | ProcessingState::Error)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ProcessingState::Processing | ProcessingState::Finalizing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingStatus {
    pub status: ProcessingState,
    pub progress: u8,
    pub message: String,
}

impl ProcessingStatus {
    pub fn idle() -> Self {
        Self {
            status: ProcessingState::Idle,
            progress: 0,
            message: String::new(),
        }
    }
}

/// Human readable phase for a progress value.
pub fn phase_label(source: InsightSource, progress: u8) -> &'static str {
    match progress {
        0..=9 => "Starting analysis",
        10..=39 => match source {
            InsightSource::Website => "Crawling website pages",
            InsightSource::Document => "Reading documents",
        },
        40..=69 => "Processing content",
        70..=94 => "Generating strategic insights",
        _ => "Finalizing analysis",
    }
}

/// Next value of the locally simulated progress curve.
///
/// Steps shrink as the value approaches [`SIMULATION_CEILING`], which it never
/// passes.
pub fn next_simulated_progress(current: u8) -> u8 {
    let step = match current {
        0..=29 => 8,
        30..=59 => 5,
        60..=79 => 3,
        80..=94 => 1,
        _ => 0,
    };
    current.saturating_add(step).min(SIMULATION_CEILING).max(current)
}

/// Single writer of one run's [`ProcessingStatus`].
pub struct ProgressSink {
    tx: watch::Sender<ProcessingStatus>,
    source: InsightSource,
}

impl ProgressSink {
    pub fn new(source: InsightSource) -> Self {
        let (tx, _rx) = watch::channel(ProcessingStatus::idle());
        Self { tx, source }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessingStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> ProcessingStatus {
        self.tx.borrow().clone()
    }

    pub fn source(&self) -> InsightSource {
        self.source
    }

    /// `idle -> processing`.
    pub fn start(&self) -> bool {
        let source = self.source;
        self.tx.send_if_modified(|status| {
            if status.status != ProcessingState::Idle {
                return false;
            }
            *status = ProcessingStatus {
                status: ProcessingState::Processing,
                progress: 0,
                message: phase_label(source, 0).to_string(),
            };
            true
        })
    }

    /// Merge a progress report. Lower values than the current one are
    /// ignored, and anything at or above 100 is held at 99 until
    /// [`complete`](Self::complete).
    pub fn advance(&self, progress: u8) -> bool {
        let source = self.source;
        self.tx.send_if_modified(|status| {
            if !status.status.is_active() {
                return false;
            }
            let next = progress.min(MAX_IN_FLIGHT).max(status.progress);
            if next == status.progress {
                return false;
            }
            status.progress = next;
            if status.status == ProcessingState::Processing {
                status.message = phase_label(source, next).to_string();
            }
            true
        })
    }

    /// `processing -> finalizing`.
    pub fn finalize(&self, message: &str) -> bool {
        self.tx.send_if_modified(|status| {
            if status.status != ProcessingState::Processing {
                return false;
            }
            status.status = ProcessingState::Finalizing;
            status.progress = status.progress.max(SIMULATION_CEILING);
            status.message = message.to_string();
            true
        })
    }

    /// Any active state `-> completed` at 100.
    pub fn complete(&self, message: &str) -> bool {
        self.tx.send_if_modified(|status| {
            if !status.status.is_active() {
                return false;
            }
            *status = ProcessingStatus {
                status: ProcessingState::Completed,
                progress: 100,
                message: message.to_string(),
            };
            true
        })
    }

    /// Complete, then run `callback` once after `delay`.
    pub fn complete_then<F>(&self, message: &str, delay: Duration, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.complete(message) {
            return false;
        }
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        true
    }

    /// Any non-terminal state `-> error`. Progress is left where it was.
    pub fn fail(&self, message: &str) -> bool {
        self.tx.send_if_modified(|status| {
            if status.status.is_terminal() {
                return false;
            }
            debug!("Analysis run failed at {}%: {}", status.progress, message);
            status.status = ProcessingState::Error;
            status.message = message.to_string();
            true
        })
    }
}
