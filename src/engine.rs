//! Task engine: the tick/response state machine.
//!
//! ```text
//! NotStarted --start--> Running --last tick scored--> Completed
//!                ^---stop---'
//! Running: AwaitingResponse -> (Focus) -> AwaitingResponse -> ...
//! ```
//!
//! The engine owns no thread. Self-paced runs move on when the presentation
//! layer sends a forced submission; timed runs move on when the caller calls
//! [`TaskEngine::poll`] after the current deadline has passed. Every mutation
//! goes through `&mut self`, so a result can never be recorded halfway through
//! an advance.

use crate::clock::{Clock, SystemClock};
use crate::config::{Pacing, TaskConfig};
use crate::error::{NBackError, Result};
use crate::events::{EventNotifier, ListenerId, TaskEvent, TaskListener};
use crate::result::{ResultLog, TickResult};
use crate::sequence::Sequence;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A number is on screen and the tick is open for a response
    AwaitingResponse,
    /// The neutral marker is on screen between two numbers
    Focus,
}

#[derive(Debug)]
pub struct TaskEngine<C: Clock = SystemClock> {
    config: TaskConfig,
    sequence: Sequence,
    results: ResultLog,
    notifier: EventNotifier,
    clock: C,
    has_started: bool,
    is_completed: bool,
    has_result_for_this_tick: bool,
    time_started_ms: Option<u64>,
    phase: Phase,
    /// End of the current timed phase; `None` when self-paced or stopped
    deadline_ms: Option<u64>,
}

impl TaskEngine<SystemClock> {
    pub fn new(config: TaskConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<C: Clock> TaskEngine<C> {
    /// Engine over a freshly generated sequence
    pub fn with_clock(config: TaskConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let sequence = Sequence::generate(&config, &mut rand::thread_rng())?;
        Ok(Self::assemble(config, sequence, clock))
    }

    /// Engine over a known sequence, which must match `config` and be unplayed
    pub fn with_sequence(config: TaskConfig, sequence: Sequence, clock: C) -> Result<Self> {
        config.validate()?;
        if sequence.n() != config.n || sequence.len() != config.sequence_length {
            return Err(NBackError::InvalidConfiguration(format!(
                "sequence is {}-back with {} numbers, config wants {}-back with {}",
                sequence.n(),
                sequence.len(),
                config.n,
                config.sequence_length
            )));
        }
        if let Some(&out) = sequence
            .numbers()
            .iter()
            .find(|&&v| !config.number_range.contains(&v))
        {
            return Err(NBackError::InvalidConfiguration(format!(
                "sequence number {} is outside {}..={}",
                out,
                config.number_range.start(),
                config.number_range.end()
            )));
        }
        if sequence.position().is_some() {
            return Err(NBackError::InvalidConfiguration(
                "sequence has already been advanced".to_string(),
            ));
        }
        Ok(Self::assemble(config, sequence, clock))
    }

    fn assemble(config: TaskConfig, sequence: Sequence, clock: C) -> Self {
        let results = ResultLog::with_capacity(config.sequence_length);
        Self {
            config,
            sequence,
            results,
            notifier: EventNotifier::new(),
            clock,
            has_started: false,
            is_completed: false,
            has_result_for_this_tick: false,
            time_started_ms: None,
            phase: Phase::AwaitingResponse,
            deadline_ms: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn results(&self) -> &ResultLog {
        &self.results
    }

    pub fn all_results(&self) -> &[TickResult] {
        self.results.all()
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn has_result_for_this_tick(&self) -> bool {
        self.has_result_for_this_tick
    }

    pub fn run_state(&self) -> RunState {
        if self.is_completed {
            RunState::Completed
        } else if self.has_started {
            RunState::Running
        } else {
            RunState::NotStarted
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_number(&self) -> Option<u32> {
        self.sequence.current()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.sequence.position()
    }

    /// Clock reading taken at the first `start`
    pub fn time_started_ms(&self) -> Option<u64> {
        self.time_started_ms
    }

    /// When `poll` next has work to do, if anything is scheduled
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }

    // ── Listeners ────────────────────────────────────────────────────

    pub fn add_event_listener<L: TaskListener + 'static>(&mut self, listener: L) -> ListenerId {
        self.notifier.subscribe(listener)
    }

    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin the run, or resume it after `stop`.
    ///
    /// The first call shows the first number. Calling it while running is a
    /// no-op; a resumed timed run gets a full phase before the next transition.
    pub fn start(&mut self) -> Result<()> {
        if self.is_completed {
            return Err(NBackError::Completed);
        }
        if self.has_started {
            return Ok(());
        }

        let now = self.clock.now_ms();
        self.has_started = true;

        if self.time_started_ms.is_none() {
            self.time_started_ms = Some(now);
            info!(
                n = self.config.n,
                length = self.config.sequence_length,
                pacing = self.config.pacing.label(),
                "task started"
            );
            self.show_next(now)?;
        } else {
            self.deadline_ms = self.phase_deadline(now);
            debug!(index = ?self.sequence.position(), "task resumed");
        }
        Ok(())
    }

    /// Pause the run. Results are kept and any pending timed transition is
    /// cancelled.
    pub fn stop(&mut self) {
        if self.has_started {
            self.has_started = false;
            self.deadline_ms = None;
            debug!(results = self.results.len(), "task stopped");
        }
    }

    /// Entry point for subject input.
    ///
    /// A non-forced submission records the judgment. A forced submission in a
    /// self-paced run records `is_target` as a forced result if nothing was
    /// recorded yet and then moves on to the next number (or completes). Timed
    /// runs never advance here; the clock decides.
    pub fn submit_result(&mut self, is_target: bool, was_forced: bool) -> Result<()> {
        if self.is_completed {
            return Err(NBackError::Completed);
        }
        if !self.has_started {
            debug!("ignoring response before start");
            return Err(NBackError::NotStarted);
        }

        match self.config.pacing {
            Pacing::SelfPaced if was_forced => {
                if !self.has_result_for_this_tick {
                    self.record_result(is_target, true)?;
                }
                let now = self.clock.now_ms();
                self.end_tick(now)
            }
            _ => self.record_result(is_target, was_forced),
        }
    }

    /// The subject's explicit target / not-target judgment
    pub fn respond(&mut self, is_target: bool) -> Result<()> {
        self.submit_result(is_target, false)
    }

    /// Generic "next" action: defaults to "not target" if no response was given
    pub fn force_advance(&mut self) -> Result<()> {
        self.submit_result(false, true)
    }

    /// Run any timed transitions that are due.
    ///
    /// An expired tick is scored with the configured timeout response (as a
    /// forced result) unless the subject already answered, then the focus
    /// marker is shown if configured, then the next number. Catches up on
    /// several transitions if called late. No-op for self-paced runs and while
    /// stopped.
    pub fn poll(&mut self) -> Result<()> {
        let Pacing::Timed {
            focus_duration_ms, ..
        } = self.config.pacing
        else {
            return Ok(());
        };

        while self.has_started && !self.is_completed {
            let now = self.clock.now_ms();
            let Some(deadline) = self.deadline_ms.filter(|d| now >= *d) else {
                break;
            };

            match self.phase {
                Phase::AwaitingResponse => {
                    if !self.has_result_for_this_tick {
                        self.record_result(self.config.timeout_response, true)?;
                    }
                    if focus_duration_ms > 0 && self.sequence.has_next() {
                        self.enter_focus(deadline, focus_duration_ms);
                    } else {
                        self.end_tick(now)?;
                    }
                }
                Phase::Focus => self.end_tick(now)?,
            }
        }
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Score the current tick. At most once per tick.
    fn record_result(&mut self, is_target: bool, was_forced: bool) -> Result<()> {
        let index = self.sequence.position().ok_or(NBackError::NotStarted)?;
        if self.has_result_for_this_tick {
            debug!(index, "rejected duplicate response");
            return Err(NBackError::DuplicateResponse { index });
        }

        let now = self.clock.now_ms();
        let was_target = self.sequence.is_target();
        let started = self.time_started_ms.unwrap_or(now);
        let result = TickResult {
            index,
            number: self.sequence.numbers()[index],
            was_correct: is_target == was_target,
            was_target,
            was_forced,
            elapsed_since_start_ms: now.saturating_sub(started),
            elapsed_since_number_shown_ms: now.saturating_sub(self.sequence.time_shown_ms()),
        };

        debug!(
            index,
            correct = result.was_correct,
            forced = was_forced,
            latency_ms = result.elapsed_since_number_shown_ms,
            "recorded result"
        );
        self.results.append(result);
        self.has_result_for_this_tick = true;
        Ok(())
    }

    /// The current tick is scored; show the next number or finish the run
    fn end_tick(&mut self, now: u64) -> Result<()> {
        if self.sequence.has_next() {
            self.show_next(now)
        } else {
            self.complete();
            Ok(())
        }
    }

    fn show_next(&mut self, now: u64) -> Result<()> {
        let number = self.sequence.advance(now)?;
        let index = self.sequence.position().unwrap_or_default();
        self.has_result_for_this_tick = false;
        self.phase = Phase::AwaitingResponse;
        self.deadline_ms = self.phase_deadline(now);
        debug!(index, number, "tick");
        self.notifier.notify(TaskEvent::Tick { index, number });
        Ok(())
    }

    fn enter_focus(&mut self, from_ms: u64, focus_duration_ms: u64) {
        self.phase = Phase::Focus;
        self.deadline_ms = Some(from_ms.saturating_add(focus_duration_ms));
        let after_index = self.sequence.position().unwrap_or_default();
        self.notifier.notify(TaskEvent::Focus { after_index });
    }

    fn complete(&mut self) {
        self.is_completed = true;
        self.deadline_ms = None;
        let stats = self.results.summary_stats();
        info!(
            results = stats.total,
            correct = stats.correct,
            hits = stats.hits,
            false_alarms = stats.false_alarms,
            "task complete"
        );
        self.notifier.notify(TaskEvent::Complete {
            results: self.results.len(),
        });
    }

    fn phase_deadline(&self, now: u64) -> Option<u64> {
        match (self.config.pacing, self.phase) {
            (Pacing::SelfPaced, _) => None,
            (
                Pacing::Timed {
                    tick_interval_ms, ..
                },
                Phase::AwaitingResponse,
            ) => Some(now.saturating_add(tick_interval_ms)),
            (
                Pacing::Timed {
                    focus_duration_ms, ..
                },
                Phase::Focus,
            ) => Some(now.saturating_add(focus_duration_ms)),
        }
    }
}
