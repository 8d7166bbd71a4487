//! Session state machine.
//!
//! Owns the phase, the calculation list, the current question index and the
//! mistake counter. Every mutation goes through a [`SessionAction`] or the
//! matching typed method.
//!
//! ## Transitions
//!
//! - **submit**: records the answer on the current question, counts a
//!   mistake when wrong, advances unless already on the last question
//! - **skip**: marks the current question skipped, always counts a mistake,
//!   advances under the same rule
//! - **move to phase**: resets mistakes and index; entering practice or test
//!   clears every answer and rearranges the same set
//!
//! Reaching the last question never wraps or signals anything. Consumers
//! check [`Session::is_complete`].

use crate::{generator, sequencing};
use crate::{AnswerOutcome, Calculation, DrillConfig, Operation, Phase, SessionStats};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Absolute tolerance for division answers
pub const DIVISION_TOLERANCE: f64 = 0.01;

/// Outcome cue for the UI feedback sink
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feedback {
    Correct,
    Wrong,
}

/// Receiver of transient correct/wrong cues
///
/// `position` is the index of the question that was answered.
pub trait FeedbackSink {
    fn notify(&mut self, feedback: Feedback, position: usize);
}

impl<F> FeedbackSink for F
where
    F: FnMut(Feedback, usize),
{
    fn notify(&mut self, feedback: Feedback, position: usize) {
        self(feedback, position)
    }
}

/// Closed set of session transitions
#[derive(Clone, Debug, PartialEq)]
pub enum SessionAction {
    SetCalculations(Vec<Calculation>),
    SetCurrentIndex(usize),
    SubmitAnswer(f64),
    SkipQuestion,
    MoveToPhase(Phase),
    ResetSession,
}

/// Answer tallies for the current run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Progress {
    pub completed: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub skipped: usize,
    pub total: usize,
}

impl Progress {
    /// Rounded percentage of correct answers over the whole set
    pub fn accuracy_percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.correct as f64 / self.total as f64) * 100.0).round() as u32
    }
}

/// Check a submitted value against the expected answer
pub fn is_answer_correct(operation: Operation, expected: i64, value: f64) -> bool {
    match operation {
        Operation::Division => (value - expected as f64).abs() < DIVISION_TOLERANCE,
        _ => value == expected as f64,
    }
}

/// Transient state of one phase run
#[derive(Clone, Debug)]
pub struct Session {
    phase: Phase,
    config: DrillConfig,
    calculations: Vec<Calculation>,
    current_index: usize,
    mistakes: u32,
    rng: StdRng,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Session with a deterministic shuffle order
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            phase: Phase::Learning,
            config: DrillConfig::default(),
            calculations: Vec::new(),
            current_index: 0,
            mistakes: 0,
            rng,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &DrillConfig {
        &self.config
    }

    pub fn calculations(&self) -> &[Calculation] {
        &self.calculations
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }

    pub fn current(&self) -> Option<&Calculation> {
        self.calculations.get(self.current_index)
    }

    /// Apply a transition
    ///
    /// Returns the feedback produced by `SubmitAnswer`, `None` otherwise.
    pub fn apply(&mut self, action: SessionAction) -> Option<Feedback> {
        match action {
            SessionAction::SetCalculations(list) => {
                self.set_calculations(list);
                None
            }
            SessionAction::SetCurrentIndex(index) => {
                self.set_current_index(index);
                None
            }
            SessionAction::SubmitAnswer(value) => self.submit_answer(value, None),
            SessionAction::SkipQuestion => {
                self.skip_question();
                None
            }
            SessionAction::MoveToPhase(phase) => {
                self.move_to_phase(phase);
                None
            }
            SessionAction::ResetSession => {
                self.reset_session();
                None
            }
        }
    }

    /// Replace the calculation list, leaving everything else alone
    pub fn set_calculations(&mut self, calculations: Vec<Calculation>) {
        self.calculations = calculations;
    }

    /// Set the index directly; callers keep it within bounds
    pub fn set_current_index(&mut self, index: usize) {
        self.current_index = index;
    }

    /// Adopt a drill configuration
    ///
    /// The list is regenerated only when the configuration differs from the
    /// one in force (or nothing has been generated yet). A regenerated list
    /// resets the index and mistakes and is rearranged for practice and
    /// test. Returns whether a new list was generated.
    pub fn configure(&mut self, config: DrillConfig) -> bool {
        if config == self.config && !self.calculations.is_empty() {
            return false;
        }
        let calculations = generator::generate_for(&config);
        tracing::info!(
            "Configured {:?} base {} range [{}, {}]{}: {} calculations",
            config.operation,
            config.base_number,
            config.range_min,
            config.range_max,
            if config.is_square_numbers { " (squares)" } else { "" },
            calculations.len()
        );
        self.config = config;
        self.calculations = calculations;
        // A new set starts a fresh attempt in the current phase
        self.move_to_phase(self.phase);
        true
    }

    /// Verify the current index refers to a question
    ///
    /// An out-of-range index is a caller bug: it asserts in debug builds and
    /// turns the transition into a logged no-op otherwise.
    fn check_index(&self) -> bool {
        let in_bounds = self.current_index < self.calculations.len();
        debug_assert!(
            in_bounds,
            "current index {} out of bounds for {} calculations",
            self.current_index,
            self.calculations.len()
        );
        if !in_bounds {
            tracing::error!(
                "Ignoring transition: index {} out of bounds ({} calculations)",
                self.current_index,
                self.calculations.len()
            );
        }
        in_bounds
    }

    fn advance(&mut self) {
        if self.current_index + 1 < self.calculations.len() {
            self.current_index += 1;
        }
    }

    /// Record an answer for the current question
    pub fn submit_answer(
        &mut self,
        value: f64,
        sink: Option<&mut dyn FeedbackSink>,
    ) -> Option<Feedback> {
        if !self.check_index() {
            return None;
        }

        let position = self.current_index;
        let calc = &mut self.calculations[position];
        let correct = is_answer_correct(calc.operation, calc.answer, value);
        calc.outcome = AnswerOutcome::Answered { value, correct };

        tracing::debug!(
            "Answered {} = {} with {} ({})",
            calc.question(),
            calc.answer,
            value,
            if correct { "correct" } else { "wrong" }
        );

        if !correct {
            self.mistakes += 1;
        }

        let feedback = if correct {
            Feedback::Correct
        } else {
            Feedback::Wrong
        };
        if let Some(sink) = sink {
            sink.notify(feedback, position);
        }

        self.advance();
        Some(feedback)
    }

    /// Skip the current question; skipping always counts as a mistake
    pub fn skip_question(&mut self) {
        if !self.check_index() {
            return;
        }
        let position = self.current_index;
        self.calculations[position].outcome = AnswerOutcome::Skipped;
        self.mistakes += 1;
        tracing::debug!("Skipped question {}", position);
        self.advance();
    }

    /// Enter a phase with a fresh attempt at the current set
    pub fn move_to_phase(&mut self, phase: Phase) {
        tracing::info!("Moving from {} to {}", self.phase, phase);
        self.phase = phase;
        self.reset_session();

        if matches!(phase, Phase::Practice | Phase::Test) && !self.calculations.is_empty() {
            for calc in &mut self.calculations {
                calc.reset_attempt();
            }
            sequencing::arrange(&mut self.calculations, &mut self.rng);
        }
    }

    /// Zero the mistake counter and index without touching the list
    pub fn reset_session(&mut self) {
        self.mistakes = 0;
        self.current_index = 0;
    }

    /// Every question answered or skipped (an empty set is never complete)
    pub fn is_complete(&self) -> bool {
        !self.calculations.is_empty() && self.calculations.iter().all(Calculation::is_completed)
    }

    /// Flip answer visibility for one learning-table entry
    pub fn toggle_answer(&mut self, index: usize) {
        if let Some(calc) = self.calculations.get_mut(index) {
            calc.show_answer = !calc.show_answer;
        }
    }

    pub fn set_all_answers_visible(&mut self, visible: bool) {
        for calc in &mut self.calculations {
            calc.show_answer = visible;
        }
    }

    pub fn all_answers_visible(&self) -> bool {
        !self.calculations.is_empty() && self.calculations.iter().all(|c| c.show_answer)
    }

    pub fn all_answers_hidden(&self) -> bool {
        !self.calculations.is_empty() && self.calculations.iter().all(|c| !c.show_answer)
    }

    pub fn progress(&self) -> Progress {
        let mut progress = Progress {
            total: self.calculations.len(),
            ..Progress::default()
        };
        for calc in &self.calculations {
            match calc.outcome {
                AnswerOutcome::Pending => {}
                AnswerOutcome::Answered { correct, .. } => {
                    progress.completed += 1;
                    if correct {
                        progress.correct += 1;
                    }
                }
                AnswerOutcome::Skipped => {
                    progress.completed += 1;
                    progress.skipped += 1;
                }
            }
        }
        progress.incorrect = progress.completed - progress.correct;
        progress
    }

    /// Summary of a finished run, `None` until complete
    pub fn stats(&self, now: DateTime<Utc>) -> Option<SessionStats> {
        if !self.is_complete() {
            return None;
        }
        let operation = self.config.operation?;
        Some(SessionStats {
            mistakes: self.mistakes,
            total_questions: self.calculations.len(),
            operation,
            base_number: self.config.base_number,
            range_min: self.config.range_min,
            range_max: self.config.range_max,
            completed_at: now,
            phase: self.phase,
        })
    }
}
