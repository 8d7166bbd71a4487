//! Achievement evaluation.
//!
//! Medals are awarded only for a perfect test run. The tier depends on how
//! many questions the run had:
//!
//! | questions | tier   |
//! |-----------|--------|
//! | ≤ 9       | bronze |
//! | 10–15     | silver |
//! | 19        | gold   |
//! | 16–18     | none   |
//!
//! A tier medal is held once per (operation, base number, question count).
//! The rainbow medal is held once per base number and requires gold.

use crate::{
    Achievement, AchievementOperation, AchievementType, Operation, Phase, Profile, SessionStats,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Question count of a full range, the only size that earns gold
pub const FULL_RANGE_QUESTIONS: usize = 19;

/// Which rule gates the rainbow medal
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RainbowRule {
    /// A perfect full-range run for a base number that already had gold
    /// (any operation) before this run
    #[default]
    PriorGold,
    /// Gold held for the base number in all four operations, counting a
    /// gold earned by this run
    AllOperationsGold,
}

/// Rules applied when a test run is recorded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AchievementPolicy {
    pub rainbow_rule: RainbowRule,
    /// False when the rainbow countdown ran out during the run
    pub allow_rainbow: bool,
}

impl Default for AchievementPolicy {
    fn default() -> Self {
        Self {
            rainbow_rule: RainbowRule::PriorGold,
            allow_rainbow: true,
        }
    }
}

impl AchievementPolicy {
    pub fn new(rainbow_rule: RainbowRule) -> Self {
        Self {
            rainbow_rule,
            allow_rainbow: true,
        }
    }

    pub fn evaluate(
        &self,
        profile: &Profile,
        stats: &SessionStats,
        now: DateTime<Utc>,
    ) -> Vec<Achievement> {
        let mut earned = evaluate_with(self.rainbow_rule, profile, stats, now);
        if !self.allow_rainbow {
            earned.retain(|a| a.kind != AchievementType::Rainbow);
        }
        earned
    }
}

/// Tier for a run of `total_questions`
pub fn tier_for(total_questions: usize) -> Option<AchievementType> {
    match total_questions {
        0..=9 => Some(AchievementType::Bronze),
        10..=15 => Some(AchievementType::Silver),
        FULL_RANGE_QUESTIONS => Some(AchievementType::Gold),
        _ => None,
    }
}

fn has_gold(achievements: &[Achievement], base_number: i64) -> bool {
    achievements
        .iter()
        .any(|a| a.kind == AchievementType::Gold && a.base_number == base_number)
}

fn has_rainbow(achievements: &[Achievement], base_number: i64) -> bool {
    achievements
        .iter()
        .any(|a| a.kind == AchievementType::Rainbow && a.base_number == base_number)
}

/// New achievements for a run under the default rainbow rule
///
/// Does not modify the profile; the caller appends the result.
pub fn evaluate(profile: &Profile, stats: &SessionStats, now: DateTime<Utc>) -> Vec<Achievement> {
    evaluate_with(RainbowRule::PriorGold, profile, stats, now)
}

/// New achievements for a run under `rule`
pub fn evaluate_with(
    rule: RainbowRule,
    profile: &Profile,
    stats: &SessionStats,
    now: DateTime<Utc>,
) -> Vec<Achievement> {
    let mut earned = Vec::new();

    if stats.phase != Phase::Test || stats.mistakes > 0 {
        return earned;
    }

    let Some(tier) = tier_for(stats.total_questions) else {
        return earned;
    };

    let millis = now.timestamp_millis();
    let already_held = profile.achievements.iter().any(|a| {
        a.operation == AchievementOperation::Op(stats.operation)
            && a.base_number == stats.base_number
            && a.total_questions == stats.total_questions
    });

    if !already_held {
        earned.push(Achievement {
            id: format!(
                "{}-{}-{}-{}",
                stats.operation, stats.base_number, stats.total_questions, millis
            ),
            kind: tier,
            operation: AchievementOperation::Op(stats.operation),
            base_number: stats.base_number,
            total_questions: stats.total_questions,
            earned_at: now,
        });
    }

    if stats.total_questions == FULL_RANGE_QUESTIONS
        && !has_rainbow(&profile.achievements, stats.base_number)
    {
        let qualifies = match rule {
            RainbowRule::PriorGold => has_gold(&profile.achievements, stats.base_number),
            RainbowRule::AllOperationsGold => Operation::ALL.iter().all(|op| {
                profile
                    .achievements
                    .iter()
                    .chain(earned.iter())
                    .any(|a| {
                        a.kind == AchievementType::Gold
                            && a.base_number == stats.base_number
                            && a.operation == AchievementOperation::Op(*op)
                    })
            }),
        };

        if qualifies {
            earned.push(Achievement {
                id: format!("rainbow-{}-{}", stats.base_number, millis),
                kind: AchievementType::Rainbow,
                operation: AchievementOperation::All,
                base_number: stats.base_number,
                total_questions: FULL_RANGE_QUESTIONS,
                earned_at: now,
            });
        }
    }

    for achievement in &earned {
        tracing::info!(
            "Profile {} earned {} for {} base {} ({} questions)",
            profile.id,
            achievement.kind,
            achievement.operation,
            achievement.base_number,
            achievement.total_questions
        );
    }

    earned
}

/// Number of medals per tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AchievementCounts {
    pub bronze: usize,
    pub silver: usize,
    pub gold: usize,
    pub rainbow: usize,
}

pub fn counts(achievements: &[Achievement]) -> AchievementCounts {
    let mut counts = AchievementCounts::default();
    for achievement in achievements {
        match achievement.kind {
            AchievementType::Bronze => counts.bronze += 1,
            AchievementType::Silver => counts.silver += 1,
            AchievementType::Gold => counts.gold += 1,
            AchievementType::Rainbow => counts.rainbow += 1,
        }
    }
    counts
}

/// Achievements grouped for display, rainbow medals separately
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AchievementGroups<'a> {
    pub rainbow: Vec<&'a Achievement>,
    pub addition: Vec<&'a Achievement>,
    pub subtraction: Vec<&'a Achievement>,
    pub multiplication: Vec<&'a Achievement>,
    pub division: Vec<&'a Achievement>,
}

impl<'a> AchievementGroups<'a> {
    pub fn for_operation(&self, operation: Operation) -> &[&'a Achievement] {
        match operation {
            Operation::Addition => &self.addition,
            Operation::Subtraction => &self.subtraction,
            Operation::Multiplication => &self.multiplication,
            Operation::Division => &self.division,
        }
    }
}

pub fn group_by_operation(achievements: &[Achievement]) -> AchievementGroups<'_> {
    let mut groups = AchievementGroups::default();
    for achievement in achievements {
        match achievement.operation {
            AchievementOperation::All => groups.rainbow.push(achievement),
            AchievementOperation::Op(Operation::Addition) => groups.addition.push(achievement),
            AchievementOperation::Op(Operation::Subtraction) => {
                groups.subtraction.push(achievement)
            }
            AchievementOperation::Op(Operation::Multiplication) => {
                groups.multiplication.push(achievement)
            }
            AchievementOperation::Op(Operation::Division) => groups.division.push(achievement),
        }
    }
    groups
}

/// Whether a timed rainbow challenge should be offered for this run
pub fn should_offer_rainbow_challenge(
    profile: Option<&Profile>,
    base_number: i64,
    total_questions: usize,
) -> bool {
    let Some(profile) = profile else {
        return false;
    };
    total_questions == FULL_RANGE_QUESTIONS
        && has_gold(&profile.achievements, base_number)
        && !has_rainbow(&profile.achievements, base_number)
}
