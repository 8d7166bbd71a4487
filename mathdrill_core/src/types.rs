//! Core domain types for mathdrill.
//!
//! This module defines the fundamental types used throughout the system:
//! - Operations and phases
//! - Calculations and their answer outcome
//! - Drill configuration
//! - Session statistics, achievements and profiles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

// ============================================================================
// Operation and Phase
// ============================================================================

/// Arithmetic operation a calculation set is built around
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Addition,
    Subtraction,
    Multiplication,
    Division,
}

impl Operation {
    /// All operations in display order
    pub const ALL: [Operation; 4] = [
        Operation::Addition,
        Operation::Subtraction,
        Operation::Multiplication,
        Operation::Division,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Addition => "addition",
            Operation::Subtraction => "subtraction",
            Operation::Multiplication => "multiplication",
            Operation::Division => "division",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Addition => "+",
            Operation::Subtraction => "−",
            Operation::Multiplication => "×",
            Operation::Division => "÷",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "addition" => Ok(Operation::Addition),
            "subtraction" => Ok(Operation::Subtraction),
            "multiplication" => Ok(Operation::Multiplication),
            "division" => Ok(Operation::Division),
            other => Err(Error::Other(format!("Unknown operation: {}", other))),
        }
    }
}

/// Phase of a drill run
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Learning,
    Practice,
    Test,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Learning => "learning",
            Phase::Practice => "practice",
            Phase::Test => "test",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "learning" => Ok(Phase::Learning),
            "practice" => Ok(Phase::Practice),
            "test" => Ok(Phase::Test),
            other => Err(Error::Other(format!("Unknown phase: {}", other))),
        }
    }
}

// ============================================================================
// Calculation Types
// ============================================================================

/// Answer state of a single calculation
///
/// Answered and skipped are mutually exclusive by construction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOutcome {
    #[default]
    Pending,
    Answered { value: f64, correct: bool },
    Skipped,
}

/// One generated arithmetic question
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Calculation {
    pub id: String,
    pub operation: Operation,
    pub operand1: i64,
    pub operand2: i64,
    pub answer: i64,
    #[serde(default)]
    pub outcome: AnswerOutcome,
    #[serde(default)]
    pub show_answer: bool,
}

impl Calculation {
    pub fn user_answer(&self) -> Option<f64> {
        match self.outcome {
            AnswerOutcome::Answered { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_correct(&self) -> Option<bool> {
        match self.outcome {
            AnswerOutcome::Answered { correct, .. } => Some(correct),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, AnswerOutcome::Skipped)
    }

    /// Answered or skipped
    pub fn is_completed(&self) -> bool {
        !matches!(self.outcome, AnswerOutcome::Pending)
    }

    /// Clear the answer state for a fresh attempt
    pub fn reset_attempt(&mut self) {
        self.outcome = AnswerOutcome::Pending;
        self.show_answer = false;
    }

    /// Render as `7 × 3`
    pub fn question(&self) -> String {
        format!(
            "{} {} {}",
            self.operand1,
            self.operation.symbol(),
            self.operand2
        )
    }
}

// ============================================================================
// Drill Configuration
// ============================================================================

pub const DEFAULT_BASE_NUMBER: i64 = 2;
pub const DEFAULT_RANGE_MIN: i64 = 2;
pub const DEFAULT_RANGE_MAX: i64 = 10;

/// Smallest base number or range value a drill accepts
pub const DRILL_VALUE_MIN: i64 = 2;
/// Largest base number or range value a drill accepts
pub const DRILL_VALUE_MAX: i64 = 20;

/// Clamp a base number or range value into the accepted bounds
pub fn clamp_drill_value(value: i64) -> i64 {
    value.clamp(DRILL_VALUE_MIN, DRILL_VALUE_MAX)
}

/// Everything the generator needs to build a calculation set
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DrillConfig {
    pub operation: Option<Operation>,
    pub base_number: i64,
    pub range_min: i64,
    pub range_max: i64,
    pub is_square_numbers: bool,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            operation: None,
            base_number: DEFAULT_BASE_NUMBER,
            range_min: DEFAULT_RANGE_MIN,
            range_max: DEFAULT_RANGE_MAX,
            is_square_numbers: false,
        }
    }
}

impl DrillConfig {
    pub fn new(operation: Operation, base_number: i64, range_min: i64, range_max: i64) -> Self {
        Self {
            operation: Some(operation),
            base_number,
            range_min,
            range_max,
            is_square_numbers: false,
        }
    }

    pub fn squares(range_min: i64, range_max: i64) -> Self {
        Self {
            operation: Some(Operation::Multiplication),
            is_square_numbers: true,
            range_min,
            range_max,
            ..Self::default()
        }
    }

    /// An operation has been chosen
    pub fn is_configured(&self) -> bool {
        self.operation.is_some()
    }

    /// Size of the configured range (0 for an inverted range)
    pub fn question_count(&self) -> usize {
        if self.range_max < self.range_min {
            0
        } else {
            (self.range_max.abs_diff(self.range_min) as usize).saturating_add(1)
        }
    }

    /// Reject base numbers and range values outside
    /// `DRILL_VALUE_MIN..=DRILL_VALUE_MAX`
    ///
    /// The base number is not checked for square numbers, which ignore it.
    /// An inverted range is accepted and generates nothing.
    pub fn validate(&self) -> Result<(), Error> {
        let bounds = DRILL_VALUE_MIN..=DRILL_VALUE_MAX;
        let mut checks = vec![("range minimum", self.range_min), ("range maximum", self.range_max)];
        if !self.is_square_numbers {
            checks.insert(0, ("base number", self.base_number));
        }
        for (what, value) in checks {
            if !bounds.contains(&value) {
                return Err(Error::Other(format!(
                    "{} {} is outside {}..={}",
                    what, value, DRILL_VALUE_MIN, DRILL_VALUE_MAX
                )));
            }
        }
        Ok(())
    }

    /// Copy with every value clamped into the accepted bounds
    pub fn clamped(&self) -> Self {
        Self {
            base_number: clamp_drill_value(self.base_number),
            range_min: clamp_drill_value(self.range_min),
            range_max: clamp_drill_value(self.range_max),
            ..self.clone()
        }
    }
}

// ============================================================================
// Session Statistics
// ============================================================================

/// Summary of a completed phase run
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub mistakes: u32,
    pub total_questions: usize,
    pub operation: Operation,
    pub base_number: i64,
    pub range_min: i64,
    pub range_max: i64,
    pub completed_at: DateTime<Utc>,
    pub phase: Phase,
}

// ============================================================================
// Achievements
// ============================================================================

/// Medal tier
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AchievementType {
    Bronze,
    Silver,
    Gold,
    Rainbow,
}

impl fmt::Display for AchievementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AchievementType::Bronze => "bronze",
            AchievementType::Silver => "silver",
            AchievementType::Gold => "gold",
            AchievementType::Rainbow => "rainbow",
        };
        f.write_str(name)
    }
}

/// Operation an achievement was earned for; rainbow spans all of them
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum AchievementOperation {
    Op(Operation),
    All,
}

impl From<AchievementOperation> for String {
    fn from(value: AchievementOperation) -> Self {
        match value {
            AchievementOperation::Op(op) => op.as_str().to_string(),
            AchievementOperation::All => "all".to_string(),
        }
    }
}

impl TryFrom<String> for AchievementOperation {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "all" {
            Ok(AchievementOperation::All)
        } else {
            value.parse().map(AchievementOperation::Op)
        }
    }
}

impl fmt::Display for AchievementOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AchievementOperation::Op(op) => op.fmt(f),
            AchievementOperation::All => f.write_str("all"),
        }
    }
}

/// An earned medal
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AchievementType,
    pub operation: AchievementOperation,
    pub base_number: i64,
    pub total_questions: usize,
    pub earned_at: DateTime<Utc>,
}

// ============================================================================
// Profile
// ============================================================================

pub const GUEST_PROFILE_ID: &str = "guest";

/// A learner profile with append-only history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub is_guest: bool,
    #[serde(default)]
    pub stats: Vec<SessionStats>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl Profile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_guest: false,
            stats: Vec::new(),
            achievements: Vec::new(),
            created_at: now,
            last_used: now,
        }
    }

    /// In-memory profile that is never written to durable storage
    pub fn guest(now: DateTime<Utc>) -> Self {
        Self {
            is_guest: true,
            ..Self::new(GUEST_PROFILE_ID, "Guest", now)
        }
    }
}
