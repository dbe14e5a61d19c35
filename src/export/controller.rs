//! Extraction-retry controller.
//!
//! Drives one round through
//! `Selecting -> Loading -> Checking -> {Ready, Refreshing} -> Ready | Exhausted`.
//! Content checks are bounded per whole-round attempt, and whole-round
//! attempts (which also cover selection failures) are bounded separately.

use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{RetrySettings, TimingConfig};
use crate::scraper::Session;
use crate::types::ExportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Selecting,
    Loading,
    Checking,
    Refreshing,
    Ready,
    Exhausted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Selecting => "selecting",
            Phase::Loading => "loading",
            Phase::Checking => "checking",
            Phase::Refreshing => "refreshing",
            Phase::Ready => "ready",
            Phase::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// Content-check bookkeeping for one whole-round attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptState {
    pub attempt_number: u32,
    pub max_attempts: u32,
    pub content_ready: bool,
}

impl AttemptState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt_number: 0,
            max_attempts: max_attempts.max(1),
            content_ready: false,
        }
    }

    pub fn has_remaining(&self) -> bool {
        self.attempt_number < self.max_attempts
    }
}

/// Bank-specific hooks for one round
#[allow(async_fn_in_trait)]
pub trait RoundDriver {
    /// Apply the round selection (dropdown + change event, search click, ...)
    async fn select<S: Session>(&self, session: &S) -> Result<(), ExportError>;

    /// Whether real data is on the page
    async fn is_ready<S: Session>(&self, session: &S) -> Result<bool, ExportError>;

    /// Return to a clean page before re-selecting
    async fn refresh<S: Session>(&self, session: &S) -> Result<(), ExportError> {
        session.reload().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready { checks: u32, round_attempts: u32 },
    Exhausted { checks: u32, last_error: Option<String> },
}

/// Outcome plus the phases visited, in order
#[derive(Debug, Clone)]
pub struct ControllerRun {
    pub readiness: Readiness,
    pub trace: Vec<Phase>,
}

impl ControllerRun {
    /// `ready after 2 checks (attempt 1): selecting > loading > ...`
    pub fn describe(&self) -> String {
        let outcome = match &self.readiness {
            Readiness::Ready {
                checks,
                round_attempts,
            } => format!("ready after {} checks (attempt {})", checks, round_attempts),
            Readiness::Exhausted { checks, .. } => format!("exhausted after {} checks", checks),
        };
        let phases: Vec<String> = self.trace.iter().map(Phase::to_string).collect();
        format!("{}: {}", outcome, phases.join(" > "))
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionController {
    pub max_round_attempts: u32,
    pub max_data_checks: u32,
    pub post_selection_wait: Duration,
    pub refresh_wait: Duration,
}

impl ExtractionController {
    pub fn new(retry: &RetrySettings, timing: &TimingConfig) -> Self {
        Self {
            max_round_attempts: retry.max_round_attempts.max(1),
            max_data_checks: retry.max_data_checks.max(1),
            post_selection_wait: timing.post_selection_wait(),
            refresh_wait: timing.refresh_wait(),
        }
    }

    async fn refresh_and_reselect<S: Session, D: RoundDriver>(
        &self,
        session: &S,
        driver: &D,
    ) -> Result<(), ExportError> {
        driver.refresh(session).await?;
        driver.select(session).await
    }

    /// Run one round until its content is ready or attempts run out
    pub async fn run<S: Session, D: RoundDriver>(
        &self,
        session: &S,
        driver: &D,
        label: &str,
    ) -> ControllerRun {
        let mut trace = Vec::new();
        let mut checks = 0;
        let mut last_error: Option<String> = None;

        for round_attempt in 1..=self.max_round_attempts {
            if round_attempt > 1 {
                trace.push(Phase::Refreshing);
                if let Err(e) = driver.refresh(session).await {
                    warn!("{}: refresh before attempt {} failed: {}", label, round_attempt, e);
                    last_error = Some(e.to_string());
                }
                sleep(self.refresh_wait).await;
            }

            trace.push(Phase::Selecting);
            if let Err(e) = driver.select(session).await {
                warn!(
                    "{}: selection failed (attempt {}/{}): {}",
                    label, round_attempt, self.max_round_attempts, e
                );
                last_error = Some(e.to_string());
                continue;
            }

            trace.push(Phase::Loading);
            sleep(self.post_selection_wait).await;

            let mut state = AttemptState::new(self.max_data_checks);
            loop {
                trace.push(Phase::Checking);
                state.attempt_number += 1;
                checks += 1;

                state.content_ready = match driver.is_ready(session).await {
                    Ok(ready) => ready,
                    Err(e) => {
                        warn!("{}: content check failed: {}", label, e);
                        last_error = Some(e.to_string());
                        false
                    }
                };

                if state.content_ready {
                    trace.push(Phase::Ready);
                    if checks > 1 {
                        info!("{}: content ready after {} checks", label, checks);
                    }
                    return ControllerRun {
                        readiness: Readiness::Ready {
                            checks,
                            round_attempts: round_attempt,
                        },
                        trace,
                    };
                }

                if !state.has_remaining() {
                    debug!(
                        "{}: no data after {}/{} checks",
                        label, state.attempt_number, state.max_attempts
                    );
                    break;
                }

                trace.push(Phase::Refreshing);
                debug!(
                    "{}: no data yet (check {}/{}), refreshing",
                    label, state.attempt_number, state.max_attempts
                );
                if let Err(e) = self.refresh_and_reselect(session, driver).await {
                    warn!("{}: refresh/re-select failed: {}", label, e);
                    last_error = Some(e.to_string());
                    break;
                }
                sleep(self.refresh_wait).await;
            }
        }

        warn!("{}: exhausted after {} checks", label, checks);
        trace.push(Phase::Exhausted);
        ControllerRun {
            readiness: Readiness::Exhausted { checks, last_error },
            trace,
        }
    }
}
